use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use gateway::types::{AttendanceStatus, AuditStatus};
use session::Role;

#[derive(Debug, Parser)]
#[clap(name = "rollcall", version, about = "QR attendance client")]
pub struct Cli {
    /// Backend root including the `/api` prefix
    #[clap(long, env = "ROLLCALL_API_URL")]
    pub api_url: Option<String>,

    /// SQLite database holding the session and the offline outbox
    #[clap(long, env = "ROLLCALL_DB", default_value = "sqlite://rollcall.db")]
    pub db: String,

    /// Emit JSON logs (also enabled by APP_ENV=production)
    #[clap(long)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Log in with an enrollment number or email address
    Login {
        identifier: String,
        #[clap(long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Create an account and log in
    Register {
        #[clap(long)]
        email: String,
        #[clap(long)]
        full_name: String,
        #[clap(long)]
        enrollment_no: Option<String>,
        #[clap(long, default_value = "student")]
        role: Role,
        #[clap(long, env = "ROLLCALL_PASSWORD", hide_env_values = true)]
        password: String,
    },

    Logout,

    /// Show the stored session
    Whoami,

    ForgotPassword {
        identifier: String,
    },

    ChangePassword {
        #[clap(long)]
        current: String,
        #[clap(long)]
        new: String,
        #[clap(long)]
        confirm: String,
    },

    /// Check in with a decoded QR payload
    Scan {
        payload: String,
        #[clap(long, allow_hyphen_values = true)]
        lat: f64,
        #[clap(long, allow_hyphen_values = true)]
        lon: f64,
    },

    /// Send queued check-ins to the backend
    Sync,

    /// List queued check-ins
    Outbox,

    Qr {
        #[clap(subcommand)]
        action: QrCommand,
    },

    /// Attendance records for one class
    Records {
        class_id: String,
        #[clap(long)]
        from: Option<NaiveDate>,
        #[clap(long)]
        to: Option<NaiveDate>,
        #[clap(long, value_enum)]
        status: Option<StatusArg>,
    },

    /// Mark a student who could not scan
    Manual {
        student_id: String,
        class_id: String,
        schedule_id: String,
        #[clap(long, value_enum, default_value = "present")]
        status: StatusArg,
        /// RFC 3339 timestamp; defaults to now
        #[clap(long)]
        at: Option<DateTime<Utc>>,
    },

    Audit {
        #[clap(long)]
        user: Option<String>,
        #[clap(long)]
        action: Option<String>,
        #[clap(long)]
        from: Option<NaiveDate>,
        #[clap(long)]
        to: Option<NaiveDate>,
        #[clap(long, value_enum)]
        status: Option<AuditStatusArg>,
    },

    Classes {
        #[clap(subcommand)]
        action: ClassCommand,
    },

    Schedules {
        #[clap(subcommand)]
        action: ScheduleCommand,
    },

    /// List all students
    Students,
}

#[derive(Debug, Subcommand)]
pub enum QrCommand {
    /// Issue a live code for one class meeting
    Generate {
        class_id: String,
        schedule_id: String,
        #[clap(long, allow_hyphen_values = true)]
        lat: f64,
        #[clap(long, allow_hyphen_values = true)]
        lon: f64,
        /// Also write the code as SVG
        #[clap(long)]
        svg: Option<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ClassCommand {
    List,
    Show {
        id: String,
    },
    Create {
        #[clap(long)]
        class_number: String,
        #[clap(long)]
        subject_code: String,
        #[clap(long)]
        subject_name: String,
        #[clap(long)]
        class_year: String,
        #[clap(long)]
        semester: String,
        #[clap(long)]
        division: String,
    },
    Enroll {
        class_id: String,
        student_id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ScheduleCommand {
    List {
        class_id: String,
    },
    Create {
        class_id: String,
        #[clap(long, default_value = "lecture")]
        session_type: String,
        #[clap(long)]
        day: String,
        #[clap(long)]
        start: String,
        #[clap(long)]
        end: String,
        #[clap(long)]
        room: String,
        #[clap(long, allow_hyphen_values = true)]
        lat: f64,
        #[clap(long, allow_hyphen_values = true)]
        lon: f64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Present,
    Late,
    Absent,
}

impl From<StatusArg> for AttendanceStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Present => AttendanceStatus::Present,
            StatusArg::Late => AttendanceStatus::Late,
            StatusArg::Absent => AttendanceStatus::Absent,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AuditStatusArg {
    Success,
    Failed,
}

impl From<AuditStatusArg> for AuditStatus {
    fn from(s: AuditStatusArg) -> Self {
        match s {
            AuditStatusArg::Success => AuditStatus::Success,
            AuditStatusArg::Failed => AuditStatus::Failed,
        }
    }
}
