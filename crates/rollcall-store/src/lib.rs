//! rollcall-store — Year-scoped persistence on SQLite.
//!
//! Students, attendance, alerts, and the subscription gate live in one
//! SQLite database, accessed asynchronously through `tokio-rusqlite`.
//! The store is the single writer for a scope; the kiosk engine and the
//! management interface both mutate through it. Face descriptors are
//! encrypted before they touch disk.

pub mod crypto;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rollcall_core::types::Subscription;
use rollcall_core::{Alert, AlertKind, AttendanceRecord, AttendanceStatus, FaceDescriptor, Student};
use thiserror::Error;
use tokio_rusqlite::Connection;

pub use crypto::{CipherError, DescriptorCipher};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";
const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] tokio_rusqlite::Error),
    #[error("descriptor cipher: {0}")]
    Cipher(#[from] CipherError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS students (
    id          TEXT PRIMARY KEY,
    year        TEXT NOT NULL,
    name        TEXT NOT NULL,
    roll_no     TEXT NOT NULL,
    phone       TEXT,
    face_image  TEXT,
    descriptor  BLOB,
    last_seen   TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_students_year ON students(year);

CREATE TABLE IF NOT EXISTS attendance (
    student_id    TEXT NOT NULL REFERENCES students(id) ON DELETE CASCADE,
    date          TEXT NOT NULL,
    status        TEXT NOT NULL,
    check_in_time TEXT,
    PRIMARY KEY (student_id, date)
);

CREATE TABLE IF NOT EXISTS alerts (
    id           TEXT NOT NULL,
    year         TEXT NOT NULL,
    kind         TEXT NOT NULL,
    message      TEXT NOT NULL,
    student_name TEXT,
    timestamp    TEXT NOT NULL,
    image        TEXT,
    position     INTEGER NOT NULL,
    PRIMARY KEY (id, year)
);

CREATE TABLE IF NOT EXISTS subscription (
    id         INTEGER PRIMARY KEY CHECK (id = 1),
    plan       TEXT NOT NULL,
    is_trial   INTEGER NOT NULL,
    expires_at TEXT NOT NULL
);
";

/// Handle to the kiosk database. Clone-safe; all access funnels through
/// one background connection.
#[derive(Clone)]
pub struct Store {
    conn: Connection,
    cipher: DescriptorCipher,
}

struct StudentRow {
    id: String,
    name: String,
    roll_no: String,
    phone: Option<String>,
    face_image: Option<String>,
    descriptor: Option<Vec<u8>>,
    last_seen: String,
}

struct AttendanceRow {
    student_id: String,
    date: String,
    status: String,
    check_in_time: Option<String>,
}

struct AlertRow {
    id: String,
    kind: String,
    message: String,
    student_name: Option<String>,
    timestamp: String,
    image: Option<String>,
}

impl Store {
    pub async fn open(path: &std::path::Path, secret: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path.to_path_buf()).await?;
        Self::init(conn, secret).await
    }

    pub async fn open_in_memory(secret: &str) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn, secret).await
    }

    async fn init(conn: Connection, secret: &str) -> Result<Self, StoreError> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;
        tracing::debug!("store schema ready");
        Ok(Self {
            conn,
            cipher: DescriptorCipher::from_secret(secret),
        })
    }

    pub async fn add_student(&self, year: &str, student: &Student) -> Result<(), StoreError> {
        let descriptor = match &student.descriptor {
            Some(d) => Some(self.cipher.seal(&d.values)?),
            None => None,
        };
        let year = year.to_string();
        let s = student.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO students (id, year, name, roll_no, phone, face_image, descriptor, last_seen)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    rusqlite::params![
                        s.id,
                        year,
                        s.name,
                        s.roll_no,
                        s.phone,
                        s.face_image,
                        descriptor,
                        s.last_seen,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Edit profile fields. Descriptor and face image are only replaced
    /// when a new capture is supplied.
    pub async fn update_student(
        &self,
        id: &str,
        name: &str,
        roll_no: &str,
        phone: Option<&str>,
        capture: Option<(&FaceDescriptor, &str)>,
    ) -> Result<bool, StoreError> {
        let sealed = match capture {
            Some((descriptor, image)) => Some((self.cipher.seal(&descriptor.values)?, image.to_string())),
            None => None,
        };
        let id = id.to_string();
        let name = name.to_string();
        let roll_no = roll_no.to_string();
        let phone = phone.map(str::to_string);
        let changed = self
            .conn
            .call(move |conn| {
                let n = match sealed {
                    Some((blob, image)) => conn.execute(
                        "UPDATE students SET name = ?2, roll_no = ?3, phone = ?4,
                         descriptor = ?5, face_image = ?6 WHERE id = ?1",
                        rusqlite::params![id, name, roll_no, phone, blob, image],
                    )?,
                    None => conn.execute(
                        "UPDATE students SET name = ?2, roll_no = ?3, phone = ?4 WHERE id = ?1",
                        rusqlite::params![id, name, roll_no, phone],
                    )?,
                };
                Ok(n > 0)
            })
            .await?;
        Ok(changed)
    }

    /// Terminal removal: the student row and every attendance record.
    pub async fn remove_student(&self, id: &str) -> Result<bool, StoreError> {
        let id = id.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let n = conn.execute("DELETE FROM students WHERE id = ?1", [&id])?;
                Ok(n > 0)
            })
            .await?;
        Ok(removed)
    }

    /// All students in a scope, attendance most-recent-first.
    pub async fn students(&self, year: &str) -> Result<Vec<Student>, StoreError> {
        let year = year.to_string();
        let (student_rows, attendance_rows) = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, name, roll_no, phone, face_image, descriptor, last_seen
                     FROM students WHERE year = ?1 ORDER BY roll_no",
                )?;
                let students = stmt
                    .query_map([&year], |row| {
                        Ok(StudentRow {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            roll_no: row.get(2)?,
                            phone: row.get(3)?,
                            face_image: row.get(4)?,
                            descriptor: row.get(5)?,
                            last_seen: row.get(6)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut stmt = conn.prepare(
                    "SELECT a.student_id, a.date, a.status, a.check_in_time
                     FROM attendance a JOIN students s ON s.id = a.student_id
                     WHERE s.year = ?1 ORDER BY a.date DESC",
                )?;
                let attendance = stmt
                    .query_map([&year], |row| {
                        Ok(AttendanceRow {
                            student_id: row.get(0)?,
                            date: row.get(1)?,
                            status: row.get(2)?,
                            check_in_time: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                Ok((students, attendance))
            })
            .await?;

        let mut students = Vec::with_capacity(student_rows.len());
        for row in student_rows {
            let descriptor = match row.descriptor {
                Some(blob) => Some(FaceDescriptor::new(self.cipher.open(&blob)?)),
                None => None,
            };
            students.push(Student {
                id: row.id,
                name: row.name,
                roll_no: row.roll_no,
                phone: row.phone,
                face_image: row.face_image,
                descriptor,
                last_seen: row.last_seen,
                attendance: Vec::new(),
            });
        }

        for row in attendance_rows {
            let record = AttendanceRecord {
                date: parse_date(&row.date)?,
                status: parse_status(&row.status)?,
                check_in_time: row
                    .check_in_time
                    .as_deref()
                    .map(parse_time)
                    .transpose()?,
            };
            if let Some(student) = students.iter_mut().find(|s| s.id == row.student_id) {
                student.attendance.push(record);
            }
        }

        Ok(students)
    }

    /// Upsert one attendance record, keeping one record per (student,
    /// date), and refresh the last-seen label on a live check-in.
    pub async fn mark_attendance(
        &self,
        student_id: &str,
        date: NaiveDate,
        status: AttendanceStatus,
        check_in_time: Option<NaiveTime>,
    ) -> Result<bool, StoreError> {
        let student_id = student_id.to_string();
        let date = date.format(DATE_FMT).to_string();
        let status = status.as_str().to_string();
        let time = check_in_time.map(|t| t.format(TIME_FMT).to_string());
        let last_seen = check_in_time.map(|t| format!("Today, {}", t.format("%H:%M")));

        let marked = self
            .conn
            .call(move |conn| {
                let exists: bool = conn
                    .query_row(
                        "SELECT COUNT(*) FROM students WHERE id = ?1",
                        [&student_id],
                        |row| row.get::<_, i64>(0),
                    )
                    .map(|n| n > 0)?;
                if !exists {
                    return Ok(false);
                }
                conn.execute(
                    "INSERT INTO attendance (student_id, date, status, check_in_time)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (student_id, date) DO UPDATE
                     SET status = excluded.status, check_in_time = excluded.check_in_time",
                    rusqlite::params![student_id, date, status, time],
                )?;
                if let Some(label) = last_seen {
                    conn.execute(
                        "UPDATE students SET last_seen = ?2 WHERE id = ?1",
                        rusqlite::params![student_id, label],
                    )?;
                }
                Ok(true)
            })
            .await?;
        Ok(marked)
    }

    pub async fn alerts(&self, year: &str) -> Result<Vec<Alert>, StoreError> {
        let year = year.to_string();
        let rows = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, message, student_name, timestamp, image
                     FROM alerts WHERE year = ?1 ORDER BY position",
                )?;
                let alerts = stmt
                    .query_map([&year], |row| {
                        Ok(AlertRow {
                            id: row.get(0)?,
                            kind: row.get(1)?,
                            message: row.get(2)?,
                            student_name: row.get(3)?,
                            timestamp: row.get(4)?,
                            image: row.get(5)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(alerts)
            })
            .await?;

        rows.into_iter().map(alert_from_row).collect()
    }

    /// Append one alert (kiosk proxy escalations), re-sorting the scope
    /// by kind priority.
    pub async fn append_alert(&self, year: &str, alert: Alert) -> Result<(), StoreError> {
        let mut alerts = self.alerts(year).await?;
        alerts.push(alert);
        rollcall_core::types::sort_by_priority(&mut alerts);
        self.replace_alerts(year, &alerts).await
    }

    /// Replace the scope's whole alert list (the aggregator's
    /// full-replace contract).
    pub async fn replace_alerts(&self, year: &str, alerts: &[Alert]) -> Result<(), StoreError> {
        let year = year.to_string();
        let rows: Vec<(String, String, String, Option<String>, String, Option<String>)> = alerts
            .iter()
            .map(|a| {
                (
                    a.id.clone(),
                    a.kind.as_str().to_string(),
                    a.message.clone(),
                    a.student_name.clone(),
                    a.timestamp.format(TIMESTAMP_FMT).to_string(),
                    a.image.clone(),
                )
            })
            .collect();

        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM alerts WHERE year = ?1", [&year])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO alerts (id, year, kind, message, student_name, timestamp, image, position)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    )?;
                    for (position, (id, kind, message, student_name, timestamp, image)) in
                        rows.iter().enumerate()
                    {
                        stmt.execute(rusqlite::params![
                            id,
                            year,
                            kind,
                            message,
                            student_name,
                            timestamp,
                            image,
                            position as i64,
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn subscription(&self) -> Result<Option<Subscription>, StoreError> {
        let row = self
            .conn
            .call(|conn| {
                let result = conn.query_row(
                    "SELECT plan, is_trial, expires_at FROM subscription WHERE id = 1",
                    [],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, bool>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                );
                match result {
                    Ok(row) => Ok(Some(row)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await?;

        row.map(|(plan, is_trial, expires_at)| {
            Ok(Subscription {
                plan,
                is_trial,
                expires_at: parse_timestamp(&expires_at)?,
            })
        })
        .transpose()
    }

    pub async fn activate_subscription(&self, sub: &Subscription) -> Result<(), StoreError> {
        let plan = sub.plan.clone();
        let is_trial = sub.is_trial;
        let expires_at = sub.expires_at.format(TIMESTAMP_FMT).to_string();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO subscription (id, plan, is_trial, expires_at)
                     VALUES (1, ?1, ?2, ?3)
                     ON CONFLICT (id) DO UPDATE
                     SET plan = excluded.plan, is_trial = excluded.is_trial,
                         expires_at = excluded.expires_at",
                    rusqlite::params![plan, is_trial, expires_at],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }
}

fn alert_from_row(row: AlertRow) -> Result<Alert, StoreError> {
    Ok(Alert {
        kind: AlertKind::parse(&row.kind)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown alert kind {:?}", row.kind)))?,
        timestamp: parse_timestamp(&row.timestamp)?,
        id: row.id,
        message: row.message,
        student_name: row.student_name,
        image: row.image,
    })
}

fn parse_date(s: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(s, DATE_FMT)
        .map_err(|e| StoreError::Corrupt(format!("bad date {s:?}: {e}")))
}

fn parse_time(s: &str) -> Result<NaiveTime, StoreError> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .map_err(|e| StoreError::Corrupt(format!("bad time {s:?}: {e}")))
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, StoreError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FMT)
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {s:?}: {e}")))
}

fn parse_status(s: &str) -> Result<AttendanceStatus, StoreError> {
    AttendanceStatus::parse(s)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown attendance status {s:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const YEAR: &str = "2025-2026";

    fn student(id: &str, descriptor: Option<Vec<f32>>) -> Student {
        Student {
            id: id.into(),
            name: "Arjun Kumar".into(),
            roll_no: "11B-023".into(),
            phone: Some("+91-98100-11223".into()),
            face_image: None,
            descriptor: descriptor.map(FaceDescriptor::new),
            last_seen: "Just Enrolled".into(),
            attendance: Vec::new(),
        }
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[tokio::test]
    async fn student_roundtrip_with_descriptor() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let descriptor: Vec<f32> = (0..128).map(|i| i as f32 * 0.5).collect();
        store
            .add_student(YEAR, &student("s1", Some(descriptor.clone())))
            .await
            .unwrap();

        let students = store.students(YEAR).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].descriptor.as_ref().unwrap().values, descriptor);
        assert_eq!(students[0].phone.as_deref(), Some("+91-98100-11223"));
    }

    #[tokio::test]
    async fn descriptor_is_not_stored_in_plaintext() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let descriptor = vec![1.0f32, 2.0, 3.0, 4.0];
        store
            .add_student(YEAR, &student("s1", Some(descriptor.clone())))
            .await
            .unwrap();

        let blob: Vec<u8> = store
            .conn
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT descriptor FROM students WHERE id = 's1'",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();

        let plaintext: Vec<u8> = descriptor.iter().flat_map(|v| v.to_le_bytes()).collect();
        assert!(!blob
            .windows(plaintext.len())
            .any(|w| w == plaintext.as_slice()));
    }

    #[tokio::test]
    async fn students_are_scoped_by_year() {
        let store = Store::open_in_memory("secret").await.unwrap();
        store.add_student(YEAR, &student("s1", None)).await.unwrap();
        store
            .add_student("2026-2027", &student("s2", None))
            .await
            .unwrap();
        assert_eq!(store.students(YEAR).await.unwrap().len(), 1);
        assert_eq!(store.students("2026-2027").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn mark_attendance_keeps_one_record_per_date() {
        let store = Store::open_in_memory("secret").await.unwrap();
        store.add_student(YEAR, &student("s1", None)).await.unwrap();

        store
            .mark_attendance("s1", d(2), AttendanceStatus::Absent, None)
            .await
            .unwrap();
        store
            .mark_attendance("s1", d(2), AttendanceStatus::Present, Some(t(8, 50)))
            .await
            .unwrap();

        let students = store.students(YEAR).await.unwrap();
        assert_eq!(students[0].attendance.len(), 1);
        assert_eq!(students[0].attendance[0].status, AttendanceStatus::Present);
        assert_eq!(students[0].attendance[0].check_in_time, Some(t(8, 50)));
        assert_eq!(students[0].last_seen, "Today, 08:50");
    }

    #[tokio::test]
    async fn attendance_is_most_recent_first() {
        let store = Store::open_in_memory("secret").await.unwrap();
        store.add_student(YEAR, &student("s1", None)).await.unwrap();
        store
            .mark_attendance("s1", d(1), AttendanceStatus::Present, Some(t(9, 0)))
            .await
            .unwrap();
        store
            .mark_attendance("s1", d(3), AttendanceStatus::Late, Some(t(9, 30)))
            .await
            .unwrap();
        store
            .mark_attendance("s1", d(2), AttendanceStatus::Absent, None)
            .await
            .unwrap();

        let students = store.students(YEAR).await.unwrap();
        let dates: Vec<NaiveDate> = students[0].attendance.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![d(3), d(2), d(1)]);
    }

    #[tokio::test]
    async fn mark_attendance_unknown_student_is_false() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let marked = store
            .mark_attendance("ghost", d(1), AttendanceStatus::Present, Some(t(9, 0)))
            .await
            .unwrap();
        assert!(!marked);
    }

    #[tokio::test]
    async fn remove_student_cascades_attendance() {
        let store = Store::open_in_memory("secret").await.unwrap();
        store.add_student(YEAR, &student("s1", None)).await.unwrap();
        store
            .mark_attendance("s1", d(1), AttendanceStatus::Present, Some(t(9, 0)))
            .await
            .unwrap();

        assert!(store.remove_student("s1").await.unwrap());
        assert!(store.students(YEAR).await.unwrap().is_empty());

        let orphans: i64 = store
            .conn
            .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM attendance", [], |r| r.get(0))?))
            .await
            .unwrap();
        assert_eq!(orphans, 0);
    }

    #[tokio::test]
    async fn update_student_profile_only() {
        let store = Store::open_in_memory("secret").await.unwrap();
        store
            .add_student(YEAR, &student("s1", Some(vec![1.0, 2.0])))
            .await
            .unwrap();

        assert!(store
            .update_student("s1", "Arjun K.", "12A-001", None, None)
            .await
            .unwrap());

        let students = store.students(YEAR).await.unwrap();
        assert_eq!(students[0].name, "Arjun K.");
        assert_eq!(students[0].roll_no, "12A-001");
        assert_eq!(students[0].phone, None);
        // Descriptor untouched.
        assert_eq!(
            students[0].descriptor.as_ref().unwrap().values,
            vec![1.0, 2.0]
        );
    }

    #[tokio::test]
    async fn alerts_replace_and_keep_position_order() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let ts = d(2).and_hms_opt(9, 0, 0).unwrap();
        let mk = |id: &str, kind: AlertKind| Alert {
            id: id.into(),
            kind,
            message: "m".into(),
            student_name: None,
            timestamp: ts,
            image: None,
        };

        store
            .replace_alerts(
                YEAR,
                &[
                    mk("p", AlertKind::ProxyAttempt),
                    mk("c", AlertKind::ConsecutiveAbsence),
                ],
            )
            .await
            .unwrap();

        let alerts = store.alerts(YEAR).await.unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].id, "p");
        assert_eq!(alerts[1].id, "c");

        // Replace wipes the previous list.
        store
            .replace_alerts(YEAR, &[mk("x", AlertKind::StudentAbsenceSms)])
            .await
            .unwrap();
        let alerts = store.alerts(YEAR).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, "x");
    }

    #[tokio::test]
    async fn append_alert_sorts_by_priority() {
        let store = Store::open_in_memory("secret").await.unwrap();
        let ts = d(2).and_hms_opt(9, 0, 0).unwrap();
        store
            .replace_alerts(
                YEAR,
                &[Alert {
                    id: "sms".into(),
                    kind: AlertKind::StudentAbsenceSms,
                    message: "m".into(),
                    student_name: None,
                    timestamp: ts,
                    image: None,
                }],
            )
            .await
            .unwrap();

        store
            .append_alert(
                YEAR,
                Alert {
                    id: "proxy".into(),
                    kind: AlertKind::ProxyAttempt,
                    message: "m".into(),
                    student_name: None,
                    timestamp: ts,
                    image: Some("/tmp/p.jpg".into()),
                },
            )
            .await
            .unwrap();

        let alerts = store.alerts(YEAR).await.unwrap();
        assert_eq!(alerts[0].id, "proxy");
        assert_eq!(alerts[1].id, "sms");
    }

    #[tokio::test]
    async fn subscription_roundtrip() {
        let store = Store::open_in_memory("secret").await.unwrap();
        assert!(store.subscription().await.unwrap().is_none());

        let sub = Subscription {
            plan: "Term".into(),
            is_trial: false,
            expires_at: d(30).and_hms_opt(0, 0, 0).unwrap(),
        };
        store.activate_subscription(&sub).await.unwrap();
        assert_eq!(store.subscription().await.unwrap(), Some(sub.clone()));

        // Re-activation overwrites the single row.
        let trial = Subscription {
            plan: "Trial".into(),
            is_trial: true,
            expires_at: d(9).and_hms_opt(0, 0, 0).unwrap(),
        };
        store.activate_subscription(&trial).await.unwrap();
        assert_eq!(store.subscription().await.unwrap(), Some(trial));
    }
}
