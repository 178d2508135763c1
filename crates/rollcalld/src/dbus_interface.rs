use crate::engine::{EngineHandle, EngineError};
use rollcall_core::types::Subscription;
use rollcall_core::{AttendanceStatus, Clock, Student};
use rollcall_store::{Store, StoreError};
use std::sync::Arc;
use zbus::interface;

/// D-Bus interface for the Rollcall kiosk daemon.
///
/// Bus name: org.rollcall.Kiosk1
/// Object path: /org/rollcall/Kiosk1
///
/// Structured payloads travel as JSON strings; descriptors never leave
/// the daemon.
pub struct KioskService {
    engine: EngineHandle,
    store: Store,
    year: String,
    clock: Arc<dyn Clock>,
}

impl KioskService {
    pub fn new(engine: EngineHandle, store: Store, year: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            engine,
            store,
            year,
            clock,
        }
    }

    async fn require_subscription(&self) -> zbus::fdo::Result<()> {
        let sub = self.store.subscription().await.map_err(store_err)?;
        let active = sub.is_some_and(|s| s.is_active(self.clock.now()));
        if active {
            Ok(())
        } else {
            Err(zbus::fdo::Error::AccessDenied(
                "no active subscription — activate a plan first".into(),
            ))
        }
    }
}

#[interface(name = "org.rollcall.Kiosk1")]
impl KioskService {
    /// Enroll a student: capture a face, extract the descriptor, store
    /// the record. Returns the new student id.
    async fn enroll(&self, name: &str, roll_no: &str, phone: &str) -> zbus::fdo::Result<String> {
        tracing::info!(name, roll_no, "enroll requested");
        self.require_subscription().await?;

        if name.trim().is_empty() || roll_no.trim().is_empty() {
            return Err(zbus::fdo::Error::InvalidArgs(
                "name and roll number are required".into(),
            ));
        }

        let capture = self.engine.capture_face().await.map_err(engine_err)?;

        let student = Student {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            roll_no: roll_no.trim().to_string(),
            phone: opt(phone),
            face_image: Some(capture.image_path),
            descriptor: Some(capture.descriptor),
            last_seen: "Just Enrolled".to_string(),
            attendance: Vec::new(),
        };
        self.store
            .add_student(&self.year, &student)
            .await
            .map_err(store_err)?;

        tracing::info!(id = %student.id, confidence = capture.confidence, "student enrolled");
        Ok(student.id)
    }

    /// Edit a student's profile. Pass `recapture = true` to take a new
    /// enrollment photo and descriptor as part of the update.
    async fn update_student(
        &self,
        id: &str,
        name: &str,
        roll_no: &str,
        phone: &str,
        recapture: bool,
    ) -> zbus::fdo::Result<bool> {
        tracing::info!(id, "update_student requested");
        let capture = if recapture {
            self.require_subscription().await?;
            Some(self.engine.capture_face().await.map_err(engine_err)?)
        } else {
            None
        };
        let capture_ref = capture
            .as_ref()
            .map(|c| (&c.descriptor, c.image_path.as_str()));

        self.store
            .update_student(id, name.trim(), roll_no.trim(), opt(phone).as_deref(), capture_ref)
            .await
            .map_err(store_err)
    }

    /// Remove a student permanently, attendance history included.
    async fn remove_student(&self, id: &str) -> zbus::fdo::Result<bool> {
        tracing::info!(id, "remove_student requested");
        self.store.remove_student(id).await.map_err(store_err)
    }

    /// All students in the active scope as JSON. Descriptors are
    /// reported only as an `enrolled` flag.
    async fn list_students(&self) -> zbus::fdo::Result<String> {
        let students = self.store.students(&self.year).await.map_err(store_err)?;
        let items: Vec<serde_json::Value> = students.iter().map(student_json).collect();
        Ok(serde_json::Value::Array(items).to_string())
    }

    /// Manually mark attendance (management UI path). Runs the absence
    /// aggregator afterwards, like every attendance mutation.
    async fn mark_attendance(&self, student_id: &str, status: &str) -> zbus::fdo::Result<bool> {
        let status = AttendanceStatus::parse(status).ok_or_else(|| {
            zbus::fdo::Error::InvalidArgs(format!(
                "unknown status {status:?} (want Present, Absent, or Late)"
            ))
        })?;

        let now = self.clock.now();
        let time = status.is_checked_in().then(|| now.time());
        let marked = self
            .store
            .mark_attendance(student_id, now.date(), status, time)
            .await
            .map_err(store_err)?;

        if marked {
            crate::engine::refresh_alerts(&self.store, &self.year, self.clock.as_ref())
                .await
                .map_err(store_err)?;
        }
        Ok(marked)
    }

    /// The scope's alert list, priority-ordered, as JSON.
    async fn list_alerts(&self) -> zbus::fdo::Result<String> {
        let alerts = self.store.alerts(&self.year).await.map_err(store_err)?;
        let items: Vec<serde_json::Value> = alerts
            .iter()
            .map(|a| {
                serde_json::json!({
                    "id": a.id,
                    "kind": a.kind.as_str(),
                    "message": a.message,
                    "student_name": a.student_name,
                    "timestamp": a.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                    "image": a.image,
                })
            })
            .collect();
        Ok(serde_json::Value::Array(items).to_string())
    }

    /// Daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let subscription = self.store.subscription().await.map_err(store_err)?;
        let now = self.clock.now();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "year": self.year,
            "scanning": self.engine.scanning(),
            "subscription": subscription.map(|s| serde_json::json!({
                "plan": s.plan,
                "is_trial": s.is_trial,
                "expires_at": s.expires_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                "active": s.is_active(now),
            })),
        })
        .to_string())
    }

    /// Activate a subscription plan for `days` days and unlock scanning.
    async fn activate_subscription(&self, plan: &str, days: u32) -> zbus::fdo::Result<bool> {
        if plan.trim().is_empty() || days == 0 {
            return Err(zbus::fdo::Error::InvalidArgs(
                "plan name and a positive duration are required".into(),
            ));
        }
        let sub = Subscription {
            plan: plan.trim().to_string(),
            is_trial: plan.trim().eq_ignore_ascii_case("trial"),
            expires_at: self.clock.now() + chrono::Duration::days(i64::from(days)),
        };
        self.store
            .activate_subscription(&sub)
            .await
            .map_err(store_err)?;
        self.engine.set_scanning(true);
        tracing::info!(plan = %sub.plan, expires_at = %sub.expires_at, "subscription activated");
        Ok(true)
    }

    /// Change the late-after cutoff, e.g. "09:15".
    async fn set_cutoff(&self, cutoff: &str) -> zbus::fdo::Result<bool> {
        let cutoff = chrono::NaiveTime::parse_from_str(cutoff, "%H:%M").map_err(|_| {
            zbus::fdo::Error::InvalidArgs(format!("invalid cutoff {cutoff:?} (want HH:MM)"))
        })?;
        self.engine.set_cutoff(cutoff).await.map_err(engine_err)?;
        Ok(true)
    }
}

fn student_json(s: &Student) -> serde_json::Value {
    serde_json::json!({
        "id": s.id,
        "name": s.name,
        "roll_no": s.roll_no,
        "phone": s.phone,
        "face_image": s.face_image,
        "last_seen": s.last_seen,
        "enrolled": s.descriptor.is_some(),
        "attendance": s.attendance.iter().map(|r| serde_json::json!({
            "date": r.date.format("%Y-%m-%d").to_string(),
            "status": r.status.as_str(),
            "check_in_time": r.check_in_time.map(|t| t.format("%H:%M").to_string()),
        })).collect::<Vec<_>>(),
    })
}

fn opt(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn store_err(e: StoreError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(format!("store: {e}"))
}

fn engine_err(e: EngineError) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(format!("engine: {e}"))
}
