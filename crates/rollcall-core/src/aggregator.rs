//! Absence alert aggregation, run after every attendance mutation.

use crate::types::{sort_by_priority, Alert, AlertKind, AttendanceStatus, Student};
use chrono::{Duration, NaiveDateTime};

/// Days of missing/absent attendance before guardians are alerted.
pub const CONSECUTIVE_ABSENCE_DAYS: u32 = 3;

/// Rescan the scope's students and rebuild its alert list.
///
/// Pre-existing ProxyAttempt alerts (produced by the kiosk, never by this
/// pass) are preserved; every other alert is replaced by this batch. New
/// alerts are deduplicated by (kind, student name) and the combined list
/// is ordered by kind priority.
pub fn reassess(students: &[Student], existing: &[Alert], now: NaiveDateTime) -> Vec<Alert> {
    let mut fresh: Vec<Alert> = Vec::new();

    for student in students {
        if absent_for_window(student, now) {
            fresh.push(Alert {
                id: format!("absence-{}", student.id),
                kind: AlertKind::ConsecutiveAbsence,
                message: "Student has been absent for 3 consecutive days. Please contact \
                          the guardian."
                    .to_string(),
                student_name: Some(student.name.clone()),
                timestamp: now,
                image: None,
            });
        }

        // Independently of the window check: the most recent record being
        // an explicit Absent triggers an SMS notice when a phone is on file.
        if let (Some(record), Some(phone)) = (student.latest_record(), student.phone.as_deref()) {
            if record.status == AttendanceStatus::Absent {
                fresh.push(Alert {
                    id: format!("absence-sms-{}", student.id),
                    kind: AlertKind::StudentAbsenceSms,
                    message: format!(
                        "SMS notification for absence sent to student's phone ({phone})."
                    ),
                    student_name: Some(student.name.clone()),
                    timestamp: now,
                    image: None,
                });
            }
        }
    }

    // Dedup within the batch by (kind, student name).
    let mut unique: Vec<Alert> = Vec::with_capacity(fresh.len());
    for alert in fresh {
        let dup = unique
            .iter()
            .any(|a| a.kind == alert.kind && a.student_name == alert.student_name);
        if !dup {
            unique.push(alert);
        }
    }

    let mut combined: Vec<Alert> = existing
        .iter()
        .filter(|a| a.kind == AlertKind::ProxyAttempt)
        .cloned()
        .collect();
    combined.extend(unique);
    sort_by_priority(&mut combined);
    combined
}

/// True when the student has no Present/Late record on any of the
/// `CONSECUTIVE_ABSENCE_DAYS` calendar days immediately preceding `now`'s
/// date. A day with no record at all counts as absent.
fn absent_for_window(student: &Student, now: NaiveDateTime) -> bool {
    let today = now.date();
    for offset in 1..=i64::from(CONSECUTIVE_ABSENCE_DAYS) {
        let day = today - Duration::days(offset);
        if let Some(record) = student.record_for(day) {
            if record.status.is_checked_in() {
                return false;
            }
        }
    }
    true
}
