use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// A face descriptor: fixed-length embedding produced by the recognition
/// network (128 dimensions for the bundled model).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDescriptor {
    pub values: Vec<f32>,
}

impl FaceDescriptor {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    /// Euclidean distance to another descriptor. Lower = more similar.
    pub fn distance(&self, other: &FaceDescriptor) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Present" => Some(AttendanceStatus::Present),
            "Absent" => Some(AttendanceStatus::Absent),
            "Late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }

    /// Present and Late both count as a completed check-in for the day.
    pub fn is_checked_in(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::Late)
    }
}

impl std::fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attendance entry. Unique per (student, date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in_time: Option<NaiveTime>,
}

/// An enrolled student. `attendance` is ordered most-recent-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_no: String,
    pub phone: Option<String>,
    /// Path of the JPEG captured at enrollment, if any.
    pub face_image: Option<String>,
    /// Face embedding captured at enrollment. Students without one can
    /// never be matched by the kiosk.
    pub descriptor: Option<FaceDescriptor>,
    pub last_seen: String,
    pub attendance: Vec<AttendanceRecord>,
}

impl Student {
    /// The attendance record for a given calendar date, if one exists.
    pub fn record_for(&self, date: NaiveDate) -> Option<&AttendanceRecord> {
        self.attendance.iter().find(|r| r.date == date)
    }

    /// The most recent attendance record.
    pub fn latest_record(&self) -> Option<&AttendanceRecord> {
        self.attendance.first()
    }

    /// Upsert an attendance record: any existing entry for `date` is
    /// dropped, then the new one is prepended. Keeps the one-record-per-date
    /// invariant and most-recent-first ordering.
    pub fn mark(&mut self, date: NaiveDate, status: AttendanceStatus, time: Option<NaiveTime>) {
        self.attendance.retain(|r| r.date != date);
        self.attendance.insert(
            0,
            AttendanceRecord {
                date,
                status,
                check_in_time: time,
            },
        );
        if let Some(t) = time {
            self.last_seen = format!("Today, {}", t.format("%H:%M"));
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    ProxyAttempt,
    ConsecutiveAbsence,
    StudentAbsenceSms,
}

impl AlertKind {
    /// Fixed display priority. Alert lists are ordered by this, not by time.
    pub fn priority(&self) -> u8 {
        match self {
            AlertKind::ProxyAttempt => 0,
            AlertKind::ConsecutiveAbsence => 1,
            AlertKind::StudentAbsenceSms => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::ProxyAttempt => "ProxyAttempt",
            AlertKind::ConsecutiveAbsence => "ConsecutiveAbsence",
            AlertKind::StudentAbsenceSms => "StudentAbsenceSms",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ProxyAttempt" => Some(AlertKind::ProxyAttempt),
            "ConsecutiveAbsence" => Some(AlertKind::ConsecutiveAbsence),
            "StudentAbsenceSms" => Some(AlertKind::StudentAbsenceSms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    pub message: String,
    pub student_name: Option<String>,
    pub timestamp: NaiveDateTime,
    /// Path of the captured frame JPEG for proxy alerts.
    pub image: Option<String>,
}

/// Sort alerts by kind priority, preserving relative order within a kind.
pub fn sort_by_priority(alerts: &mut [Alert]) {
    alerts.sort_by_key(|a| a.kind.priority());
}

/// Subscription gate. Expired or missing subscriptions lock the kiosk
/// and enrollment; nothing else about billing is modeled here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub plan: String,
    pub is_trial: bool,
    pub expires_at: NaiveDateTime,
}

impl Subscription {
    pub fn is_active(&self, now: NaiveDateTime) -> bool {
        self.expires_at > now
    }
}
