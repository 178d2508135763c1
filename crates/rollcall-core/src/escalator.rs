//! Unknown-presence escalation: sustained unrecognized single-face
//! presence becomes a proxy alert, debounced by streak + cooldown.

use chrono::{Duration, NaiveDateTime};

/// Consecutive qualifying cycles before an alert fires.
pub const DEFAULT_STREAK_THRESHOLD: u32 = 2;
/// Seconds during which no further escalation may fire.
pub const DEFAULT_COOLDOWN_SECS: i64 = 15;

/// What one recognition cycle observed, as far as escalation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleObservation {
    /// Exactly one face, unmatched — the qualifying condition.
    SingleUnknown,
    /// Exactly one face, matched to a student.
    SingleMatched,
    /// Zero faces in frame.
    NoFace,
    /// More than one face; ambiguous frames never escalate.
    MultipleFaces,
}

/// Debounces one lingering stranger into a single alert instead of one
/// per cycle: the streak demands sustained presence, the cooldown bounds
/// alert volume afterwards.
pub struct UnknownPresenceEscalator {
    streak: u32,
    threshold: u32,
    cooldown: Duration,
    cooldown_until: Option<NaiveDateTime>,
}

impl UnknownPresenceEscalator {
    pub fn new(threshold: u32, cooldown_secs: i64) -> Self {
        Self {
            streak: 0,
            threshold,
            cooldown: Duration::seconds(cooldown_secs),
            cooldown_until: None,
        }
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    /// Cooldown clears purely by time, regardless of activity.
    pub fn cooldown_active(&self, now: NaiveDateTime) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Feed one cycle's observation. Returns true when the escalation
    /// fires: the caller captures the frame, emits the proxy alert, and
    /// drives the kiosk to the proxy result.
    ///
    /// While cooldown is active the streak keeps counting but nothing
    /// fires; a stranger still present when it lapses escalates on the
    /// next qualifying cycle.
    pub fn observe(&mut self, observation: CycleObservation, now: NaiveDateTime) -> bool {
        match observation {
            CycleObservation::SingleUnknown => self.streak += 1,
            _ => {
                self.streak = 0;
                return false;
            }
        }

        if self.streak >= self.threshold && !self.cooldown_active(now) {
            tracing::info!(streak = self.streak, "unknown presence escalated");
            self.streak = 0;
            self.cooldown_until = Some(now + self.cooldown);
            return true;
        }
        false
    }
}

impl Default for UnknownPresenceEscalator {
    fn default() -> Self {
        Self::new(DEFAULT_STREAK_THRESHOLD, DEFAULT_COOLDOWN_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn below_threshold_never_fires() {
        let mut esc = UnknownPresenceEscalator::new(2, 15);
        assert!(!esc.observe(CycleObservation::SingleUnknown, start()));
        assert_eq!(esc.streak(), 1);
    }

    #[test]
    fn threshold_fires_exactly_once() {
        let mut esc = UnknownPresenceEscalator::new(2, 15);
        let now = start();
        assert!(!esc.observe(CycleObservation::SingleUnknown, now));
        assert!(esc.observe(
            CycleObservation::SingleUnknown,
            now + Duration::seconds(1)
        ));
        assert_eq!(esc.streak(), 0);
        assert!(esc.cooldown_active(now + Duration::seconds(2)));
    }

    #[test]
    fn no_second_fire_within_cooldown() {
        let mut esc = UnknownPresenceEscalator::new(2, 15);
        let mut now = start();
        esc.observe(CycleObservation::SingleUnknown, now);
        now += Duration::seconds(1);
        assert!(esc.observe(CycleObservation::SingleUnknown, now));

        // Streak re-reaches threshold inside the cooldown window.
        for _ in 0..5 {
            now += Duration::seconds(1);
            assert!(!esc.observe(CycleObservation::SingleUnknown, now));
        }
    }

    #[test]
    fn fires_again_after_cooldown_expires() {
        let mut esc = UnknownPresenceEscalator::new(2, 15);
        let mut now = start();
        esc.observe(CycleObservation::SingleUnknown, now);
        now += Duration::seconds(1);
        assert!(esc.observe(CycleObservation::SingleUnknown, now));

        now += Duration::seconds(16);
        assert!(!esc.cooldown_active(now));
        // Streak is 0 after firing; needs the full threshold again.
        assert!(!esc.observe(CycleObservation::SingleUnknown, now));
        now += Duration::seconds(1);
        assert!(esc.observe(CycleObservation::SingleUnknown, now));
    }

    #[test]
    fn disqualifying_cycles_reset_streak() {
        for obs in [
            CycleObservation::NoFace,
            CycleObservation::MultipleFaces,
            CycleObservation::SingleMatched,
        ] {
            let mut esc = UnknownPresenceEscalator::new(2, 15);
            let now = start();
            esc.observe(CycleObservation::SingleUnknown, now);
            assert!(!esc.observe(obs, now + Duration::seconds(1)));
            assert_eq!(esc.streak(), 0, "{obs:?} must reset the streak");
            // The interrupted streak must start over.
            assert!(!esc.observe(
                CycleObservation::SingleUnknown,
                now + Duration::seconds(2)
            ));
        }
    }

    #[test]
    fn cooldown_boundary_is_exclusive() {
        let mut esc = UnknownPresenceEscalator::new(1, 15);
        let now = start();
        assert!(esc.observe(CycleObservation::SingleUnknown, now));
        // Exactly at expiry the cooldown is no longer active.
        assert!(!esc.cooldown_active(now + Duration::seconds(15)));
        assert!(esc.cooldown_active(now + Duration::seconds(14)));
    }
}
