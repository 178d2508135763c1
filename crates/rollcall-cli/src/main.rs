use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod report;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall attendance kiosk CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new student (captures a face at the kiosk camera)
    Enroll {
        #[arg(long)]
        name: String,
        /// Roll number, e.g. "11B-023"
        #[arg(long)]
        roll: String,
        /// Guardian phone number for absence notifications
        #[arg(long, default_value = "")]
        phone: String,
    },
    /// List enrolled students
    List,
    /// Edit a student's profile
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        roll: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// Capture a new enrollment photo and descriptor
        #[arg(long)]
        recapture: bool,
    },
    /// Remove a student permanently
    Remove { id: String },
    /// Manually mark attendance (Present, Absent, or Late)
    Mark { id: String, status: String },
    /// Show the current alert list
    Alerts,
    /// Show daemon status
    Status,
    /// Activate a subscription plan
    Activate {
        #[arg(long)]
        plan: String,
        #[arg(long)]
        days: u32,
    },
    /// Set the late-after cutoff, e.g. 09:15
    Cutoff { time: String },
    /// Export the attendance dataset as CSV
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Look up one student's attendance history by name, id, or roll no
    Search { term: String },
    /// List available camera devices
    Devices,
}

#[zbus::proxy(
    interface = "org.rollcall.Kiosk1",
    default_service = "org.rollcall.Kiosk1",
    default_path = "/org/rollcall/Kiosk1"
)]
trait Kiosk {
    async fn enroll(&self, name: &str, roll_no: &str, phone: &str) -> zbus::Result<String>;
    async fn update_student(
        &self,
        id: &str,
        name: &str,
        roll_no: &str,
        phone: &str,
        recapture: bool,
    ) -> zbus::Result<bool>;
    async fn remove_student(&self, id: &str) -> zbus::Result<bool>;
    async fn list_students(&self) -> zbus::Result<String>;
    async fn mark_attendance(&self, student_id: &str, status: &str) -> zbus::Result<bool>;
    async fn list_alerts(&self) -> zbus::Result<String>;
    async fn status(&self) -> zbus::Result<String>;
    async fn activate_subscription(&self, plan: &str, days: u32) -> zbus::Result<bool>;
    async fn set_cutoff(&self, cutoff: &str) -> zbus::Result<bool>;
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Camera listing works without the daemon.
    if let Commands::Devices = cli.command {
        let devices = rollcall_hw::Camera::list_devices();
        if devices.is_empty() {
            println!("No V4L2 capture devices found");
        } else {
            for device in devices {
                println!("{device}");
            }
        }
        return Ok(());
    }

    let conn = zbus::Connection::system()
        .await
        .context("failed to connect to the system bus — is rollcalld running?")?;
    let proxy = KioskProxy::new(&conn)
        .await
        .context("failed to create kiosk proxy")?;

    match cli.command {
        Commands::Enroll { name, roll, phone } => {
            let id = proxy.enroll(&name, &roll, &phone).await?;
            println!("Enrolled {name} ({roll}) with id {id}");
        }
        Commands::List => {
            let students = fetch_students(&proxy).await?;
            if students.is_empty() {
                println!("No students enrolled");
            }
            for s in &students {
                println!(
                    "{}  {:10}  {:24}  enrolled={}  last seen: {}",
                    report::str_field(s, "id"),
                    report::str_field(s, "roll_no"),
                    report::str_field(s, "name"),
                    s.get("enrolled").and_then(|v| v.as_bool()).unwrap_or(false),
                    report::str_field(s, "last_seen"),
                );
            }
        }
        Commands::Update {
            id,
            name,
            roll,
            phone,
            recapture,
        } => {
            let changed = proxy
                .update_student(&id, &name, &roll, &phone, recapture)
                .await?;
            println!("{}", if changed { "Updated" } else { "No such student" });
        }
        Commands::Remove { id } => {
            let removed = proxy.remove_student(&id).await?;
            println!("{}", if removed { "Removed" } else { "No such student" });
        }
        Commands::Mark { id, status } => {
            let marked = proxy.mark_attendance(&id, &status).await?;
            println!("{}", if marked { "Marked" } else { "No such student" });
        }
        Commands::Alerts => {
            let raw = proxy.list_alerts().await?;
            let alerts: Vec<serde_json::Value> =
                serde_json::from_str(&raw).context("bad alert list from daemon")?;
            if alerts.is_empty() {
                println!("No alerts");
            }
            for a in &alerts {
                let student = report::str_field(a, "student_name");
                let suffix = if student.is_empty() {
                    String::new()
                } else {
                    format!(" [{student}]")
                };
                println!(
                    "{}  {:18}{}  {}",
                    report::str_field(a, "timestamp"),
                    report::str_field(a, "kind"),
                    suffix,
                    report::str_field(a, "message"),
                );
            }
        }
        Commands::Status => {
            let raw = proxy.status().await?;
            let status: serde_json::Value =
                serde_json::from_str(&raw).context("bad status from daemon")?;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
        Commands::Activate { plan, days } => {
            proxy.activate_subscription(&plan, days).await?;
            println!("Activated plan {plan} for {days} days");
        }
        Commands::Cutoff { time } => {
            proxy.set_cutoff(&time).await?;
            println!("Cutoff set to {time}");
        }
        Commands::Export { out } => {
            let students = fetch_students(&proxy).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let rows = report::write_csv(&students, file)?;
            println!("Wrote {rows} attendance rows to {}", out.display());
        }
        Commands::Search { term } => {
            let students = fetch_students(&proxy).await?;
            match report::find_student(&students, &term) {
                Some(student) => print_history(student),
                None => println!("No student found for {term:?}"),
            }
        }
        Commands::Devices => unreachable!("handled above"),
    }

    Ok(())
}

async fn fetch_students(proxy: &KioskProxy<'_>) -> Result<Vec<serde_json::Value>> {
    let raw = proxy.list_students().await?;
    serde_json::from_str(&raw).context("bad student list from daemon")
}

fn print_history(student: &serde_json::Value) {
    println!(
        "{} — Roll No: {} | ID: {}",
        report::str_field(student, "name"),
        report::str_field(student, "roll_no"),
        report::str_field(student, "id"),
    );
    let attendance = report::array_field(student, "attendance");
    if attendance.is_empty() {
        println!("  no attendance records");
        return;
    }
    for record in attendance {
        let time = report::str_field(record, "check_in_time");
        println!(
            "  {}  {:8}  {}",
            report::str_field(record, "date"),
            report::str_field(record, "status"),
            if time.is_empty() { "-" } else { time },
        );
    }
}
