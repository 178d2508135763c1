//! Kiosk display state machine and per-tick recognition orchestration.
//!
//! The machine is pure: it consumes one frame's descriptors plus the
//! current student set and returns what happened as data. The engine
//! applies the returned mutation/alert to the store and owns all timers.

use crate::decision::{self, CheckInDecision};
use crate::escalator::{CycleObservation, UnknownPresenceEscalator};
use crate::matcher::{EuclideanMatcher, MatchOutcome};
use crate::types::{AttendanceStatus, FaceDescriptor, Student};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

/// Seconds a scan result stays on screen before the kiosk idles again.
pub const DEFAULT_RESULT_DWELL_SECS: i64 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskState {
    Idle,
    Processing,
    Result { until: NaiveDateTime },
}

/// Events the display state machine responds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KioskEvent {
    ScanStarted,
    OutcomeReady { until: NaiveDateTime },
    DwellElapsed,
}

/// Pure transition function. Events that make no sense in the current
/// state leave it unchanged.
pub fn transition(state: KioskState, event: KioskEvent) -> KioskState {
    match (state, event) {
        (KioskState::Idle, KioskEvent::ScanStarted) => KioskState::Processing,
        (KioskState::Processing, KioskEvent::OutcomeReady { until }) => {
            KioskState::Result { until }
        }
        (KioskState::Result { .. }, KioskEvent::DwellElapsed) => KioskState::Idle,
        (state, _) => state,
    }
}

/// What the kiosk displays for one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStatus {
    Present,
    Late,
    AlreadyCheckedIn,
    ProxyDetected,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanResult {
    pub status: ScanStatus,
    pub student_id: Option<String>,
    pub person_name: String,
    pub message: String,
}

/// The attendance mutation a check-in produced, to be applied by the
/// store. `None` on a result means nothing may be written.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceMark {
    pub student_id: String,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Tick observed outside `Idle` — dropped whole, preserving the
    /// at-most-one-concurrent-decision invariant.
    Skipped,
    /// Nothing decided: no face, several faces, or an unknown face that
    /// did not escalate.
    Quiet,
    CheckIn {
        result: ScanResult,
        mark: Option<AttendanceMark>,
    },
    /// Sustained unknown presence escalated. The engine captures the
    /// current frame and persists the alert with `alert_message`.
    ProxyAlert {
        result: ScanResult,
        alert_message: String,
    },
}

#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// Maximum descriptor distance for a positive match.
    pub max_distance: f32,
    /// Time-of-day after which a check-in is Late.
    pub cutoff: NaiveTime,
    pub streak_threshold: u32,
    pub cooldown_secs: i64,
    pub result_dwell_secs: i64,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            max_distance: crate::matcher::DEFAULT_MAX_DISTANCE,
            cutoff: NaiveTime::from_hms_opt(9, 15, 0).expect("valid cutoff"),
            streak_threshold: crate::escalator::DEFAULT_STREAK_THRESHOLD,
            cooldown_secs: crate::escalator::DEFAULT_COOLDOWN_SECS,
            result_dwell_secs: DEFAULT_RESULT_DWELL_SECS,
        }
    }
}

pub struct KioskMachine {
    state: KioskState,
    escalator: UnknownPresenceEscalator,
    cutoff: NaiveTime,
    max_distance: f32,
    dwell: Duration,
}

impl KioskMachine {
    pub fn new(config: &KioskConfig) -> Self {
        Self {
            state: KioskState::Idle,
            escalator: UnknownPresenceEscalator::new(
                config.streak_threshold,
                config.cooldown_secs,
            ),
            cutoff: config.cutoff,
            max_distance: config.max_distance,
            dwell: Duration::seconds(config.result_dwell_secs),
        }
    }

    pub fn state(&self) -> KioskState {
        self.state
    }

    pub fn cutoff(&self) -> NaiveTime {
        self.cutoff
    }

    /// The late-after rule is operator-adjustable at runtime.
    pub fn set_cutoff(&mut self, cutoff: NaiveTime) {
        self.cutoff = cutoff;
    }

    /// Clear an expired result display. Returns true when the kiosk
    /// returned to `Idle`. Called at the top of every tick; purely a
    /// flag-clearing step, never recognition work.
    pub fn poll_dwell(&mut self, now: NaiveDateTime) -> bool {
        if let KioskState::Result { until } = self.state {
            if now >= until {
                self.state = transition(self.state, KioskEvent::DwellElapsed);
                return true;
            }
        }
        false
    }

    /// Process one frame's descriptors against the current student set.
    pub fn on_frame(
        &mut self,
        faces: &[FaceDescriptor],
        students: &[Student],
        now: NaiveDateTime,
    ) -> TickOutcome {
        if self.state != KioskState::Idle {
            return TickOutcome::Skipped;
        }

        match faces {
            [] => {
                self.escalator.observe(CycleObservation::NoFace, now);
                TickOutcome::Quiet
            }
            [probe] => {
                let matcher = EuclideanMatcher::build(students, self.max_distance);
                match matcher.best_match(probe) {
                    MatchOutcome::Matched {
                        student_id,
                        distance,
                    } => {
                        self.escalator.observe(CycleObservation::SingleMatched, now);
                        tracing::debug!(%student_id, distance, "face matched");
                        self.check_in(&student_id, students, now)
                    }
                    MatchOutcome::Unknown => {
                        if self.escalator.observe(CycleObservation::SingleUnknown, now) {
                            self.proxy_result(now)
                        } else {
                            TickOutcome::Quiet
                        }
                    }
                }
            }
            _ => {
                // Ambiguous frame: never auto-decide between co-present faces.
                self.escalator.observe(CycleObservation::MultipleFaces, now);
                TickOutcome::Quiet
            }
        }
    }

    fn check_in(&mut self, student_id: &str, students: &[Student], now: NaiveDateTime) -> TickOutcome {
        self.state = transition(self.state, KioskEvent::ScanStarted);

        let Some(student) = students.iter().find(|s| s.id == student_id) else {
            // Matcher and student set disagree; drop the tick.
            tracing::warn!(%student_id, "matched id missing from student set");
            self.state = KioskState::Idle;
            return TickOutcome::Quiet;
        };

        let today = now.date();
        let (result, mark) = match decision::decide(student.record_for(today), now, self.cutoff) {
            CheckInDecision::AlreadyCheckedIn { check_in_time } => {
                let when = check_in_time
                    .map(|t| t.format("%H:%M").to_string())
                    .unwrap_or_else(|| "earlier".to_string());
                (
                    ScanResult {
                        status: ScanStatus::AlreadyCheckedIn,
                        student_id: Some(student.id.clone()),
                        person_name: student.name.clone(),
                        message: format!("Checked in today at {when}."),
                    },
                    None,
                )
            }
            CheckInDecision::Marked { status, time } => {
                let scan_status = match status {
                    AttendanceStatus::Late => ScanStatus::Late,
                    _ => ScanStatus::Present,
                };
                (
                    ScanResult {
                        status: scan_status,
                        student_id: Some(student.id.clone()),
                        person_name: student.name.clone(),
                        message: format!("Attendance marked at {}.", time.format("%H:%M")),
                    },
                    Some(AttendanceMark {
                        student_id: student.id.clone(),
                        date: today,
                        status,
                        time,
                    }),
                )
            }
        };

        self.state = transition(
            self.state,
            KioskEvent::OutcomeReady {
                until: now + self.dwell,
            },
        );
        TickOutcome::CheckIn { result, mark }
    }

    fn proxy_result(&mut self, now: NaiveDateTime) -> TickOutcome {
        self.state = transition(self.state, KioskEvent::ScanStarted);
        self.state = transition(
            self.state,
            KioskEvent::OutcomeReady {
                until: now + self.dwell,
            },
        );
        TickOutcome::ProxyAlert {
            result: ScanResult {
                status: ScanStatus::ProxyDetected,
                student_id: None,
                person_name: "Unknown Person".to_string(),
                message: "Security alert sent to administrator.".to_string(),
            },
            alert_message: "An unrecognized person was detected. An email alert with this \
                            image has been dispatched to the administrator."
                .to_string(),
        }
    }

    pub fn cooldown_active(&self, now: NaiveDateTime) -> bool {
        self.escalator.cooldown_active(now)
    }
}
