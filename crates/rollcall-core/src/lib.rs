//! rollcall-core — Attendance kiosk domain logic.
//!
//! Pure state machines and decision functions: descriptor matching,
//! check-in decisions, unknown-presence escalation, the kiosk display
//! state machine, and the absence-alert aggregator. No I/O; time comes
//! in through the [`Clock`] trait so every timing rule is unit-testable.

pub mod aggregator;
pub mod clock;
pub mod decision;
pub mod escalator;
pub mod kiosk;
pub mod matcher;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use kiosk::{
    AttendanceMark, KioskConfig, KioskMachine, KioskState, ScanResult, ScanStatus, TickOutcome,
};
pub use matcher::{EuclideanMatcher, MatchOutcome};
pub use types::{
    Alert, AlertKind, AttendanceRecord, AttendanceStatus, FaceDescriptor, Student, Subscription,
};
