//! Attendance report rendering: CSV export and student search over the
//! daemon's JSON student listing.

use anyhow::Context;
use serde_json::Value;
use std::io::Write;

/// Write the full attendance dataset as CSV, one row per attendance
/// record. Returns the number of data rows written.
pub fn write_csv<W: Write>(students: &[Value], out: W) -> anyhow::Result<usize> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "Student ID",
        "Roll No",
        "Name",
        "Date",
        "Status",
        "Check-in Time",
    ])?;

    let mut rows = 0usize;
    for student in students {
        let id = str_field(student, "id");
        let roll_no = str_field(student, "roll_no");
        let name = str_field(student, "name");
        for record in array_field(student, "attendance") {
            writer.write_record([
                id,
                roll_no,
                name,
                str_field(record, "date"),
                str_field(record, "status"),
                str_field(record, "check_in_time"),
            ])?;
            rows += 1;
        }
    }
    writer.flush().context("failed to flush CSV output")?;
    Ok(rows)
}

/// Find one student by name substring (case-insensitive), exact id, or
/// exact roll number — the report page's search rule.
pub fn find_student<'a>(students: &'a [Value], term: &str) -> Option<&'a Value> {
    let term_lower = term.to_lowercase();
    students.iter().find(|s| {
        str_field(s, "name").to_lowercase().contains(&term_lower)
            || str_field(s, "id").eq_ignore_ascii_case(term)
            || str_field(s, "roll_no").eq_ignore_ascii_case(term)
    })
}

pub fn str_field<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or("")
}

pub fn array_field<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}
