//! Check-in decisions: present, late, or already checked in.

use crate::types::{AttendanceRecord, AttendanceStatus};
use chrono::{NaiveDateTime, NaiveTime};

/// Outcome of presenting a matched student to the kiosk.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckInDecision {
    /// A Present/Late record already exists for today. Carries that
    /// record's check-in time; the caller must not mutate attendance.
    AlreadyCheckedIn { check_in_time: Option<NaiveTime> },
    /// Mark the student with this status and check-in time.
    Marked {
        status: AttendanceStatus,
        time: NaiveTime,
    },
}

/// Decide what a successful face match means for today's attendance.
///
/// `today_record` is the student's existing record for `now`'s date, if
/// any. An existing Present/Late record wins (idempotence guard: a second
/// match in the same day — or same tick — observes the first write and
/// reports it). An Absent record is superseded by the live check-in.
/// The cutoff is an exclusive upper bound for being on time: arriving at
/// exactly the cutoff is Present, one second after is Late.
pub fn decide(
    today_record: Option<&AttendanceRecord>,
    now: NaiveDateTime,
    cutoff: NaiveTime,
) -> CheckInDecision {
    if let Some(record) = today_record {
        if record.status.is_checked_in() {
            return CheckInDecision::AlreadyCheckedIn {
                check_in_time: record.check_in_time,
            };
        }
    }

    let status = if now.time() > cutoff {
        AttendanceStatus::Late
    } else {
        AttendanceStatus::Present
    };

    CheckInDecision::Marked {
        status,
        time: now.time(),
    }
}
