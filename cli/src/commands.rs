use std::sync::Arc;

use anyhow::{Context, Result, bail};
use attendance::{
    DecodeOutcome, FixedLocator, FlowConfig, Outbox, PlaceholderBiometrics, QrSessionFlow,
    ScanFlow, ScanPhase,
};
use chrono::Utc;
use gateway::ApiClient;
use gateway::types::{
    AttendanceFilters, AuditFilters, ChangePassword, Coordinates, Credentials, Enrollment,
    ManualAttendance, NewClass, NewSchedule, Registration,
};
use session::KeyValueStore;
use tracing::info;

use crate::cli::{ClassCommand, Command, QrCommand, ScheduleCommand};

/// Everything a command needs, built once in `main`.
pub struct App {
    pub client: ApiClient,
    pub store: Arc<dyn KeyValueStore>,
    pub flow: FlowConfig,
}

impl App {
    pub async fn run(&self, command: Command) -> Result<()> {
        match command {
            Command::Login {
                identifier,
                password,
            } => {
                let session = self
                    .client
                    .auth()
                    .login(&Credentials::from_identifier(&identifier, password))
                    .await?;
                println!("logged in as {} ({})", session.user.full_name, session.role);
            }

            Command::Register {
                email,
                full_name,
                enrollment_no,
                role,
                password,
            } => {
                let registration = Registration {
                    enrollment_no,
                    email,
                    password,
                    full_name,
                    role,
                    face_embedding: None,
                };
                let session = self.client.auth().register(&registration).await?;
                println!("registered {} ({})", session.user.full_name, session.role);
            }

            Command::Logout => {
                self.client.auth().logout().await?;
                println!("logged out");
            }

            Command::Whoami => match self.client.session().load().await {
                Some(session) => {
                    println!("{}", serde_json::to_string_pretty(&session.user)?);
                }
                None => println!("not logged in"),
            },

            Command::ForgotPassword { identifier } => {
                let resp = self.client.auth().forgot_password(&identifier).await?;
                println!(
                    "{}",
                    resp.message
                        .as_deref()
                        .unwrap_or("if the account exists, reset instructions were sent")
                );
            }

            Command::ChangePassword {
                current,
                new,
                confirm,
            } => {
                let change = ChangePassword::new(&current, &new, &confirm)?;
                let resp = self.client.users().change_password(&change).await?;
                println!("{}", resp.message.as_deref().unwrap_or("password changed"));
            }

            Command::Scan { payload, lat, lon } => self.scan(&payload, lat, lon).await?,

            Command::Sync => self.sync().await?,

            Command::Outbox => {
                let outbox = Outbox::restore(self.store.as_ref()).await;
                if outbox.is_empty() {
                    println!("outbox is empty");
                }
                for item in outbox.snapshot() {
                    println!(
                        "{}  class={} schedule={}",
                        item.session_id(),
                        item.class_id(),
                        item.schedule_id()
                    );
                }
            }

            Command::Qr {
                action:
                    QrCommand::Generate {
                        class_id,
                        schedule_id,
                        lat,
                        lon,
                        svg,
                    },
            } => {
                let locator = FixedLocator::new(Coordinates::new(lat, lon)?);
                let flow = QrSessionFlow::new(
                    Arc::new(self.client.clone()),
                    self.client.guard().clone(),
                    Arc::new(locator),
                    self.flow.clone(),
                );
                let session = flow.generate(&class_id, &schedule_id).await?;

                println!("{}", session.render_terminal()?);
                println!("session  {}", session.session_id);
                println!("token    {}", session.short_token());
                println!("expires  {}", session.expired_at.to_rfc3339());

                if let Some(path) = svg {
                    std::fs::write(&path, session.render_svg()?)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("svg      {}", path.display());
                }
            }

            Command::Records {
                class_id,
                from,
                to,
                status,
            } => {
                let filters = AttendanceFilters {
                    start_date: from,
                    end_date: to,
                    status: status.map(Into::into),
                };
                let records = self.client.attendance().by_class(&class_id, &filters).await?;
                println!("{}", serde_json::to_string_pretty(&records)?);
            }

            Command::Manual {
                student_id,
                class_id,
                schedule_id,
                status,
                at,
            } => {
                let entry = ManualAttendance {
                    student_id,
                    class_id,
                    schedule_id,
                    status: status.into(),
                    attended_at: at.unwrap_or_else(Utc::now),
                };
                let record = self.client.attendance().manual(&entry).await?;
                println!("recorded {} as {:?}", record.id, record.status);
            }

            Command::Audit {
                user,
                action,
                from,
                to,
                status,
            } => {
                let filters = AuditFilters {
                    user_id: user,
                    action,
                    start_date: from,
                    end_date: to,
                    status: status.map(Into::into),
                };
                let logs = self.client.audit().logs(&filters).await?;
                println!("{}", serde_json::to_string_pretty(&logs)?);
            }

            Command::Classes { action } => self.classes(action).await?,

            Command::Schedules { action } => self.schedules(action).await?,

            Command::Students => {
                let students = self.client.users().students().await?;
                println!("{}", serde_json::to_string_pretty(&students)?);
            }
        }

        Ok(())
    }

    async fn scan(&self, payload: &str, lat: f64, lon: f64) -> Result<()> {
        let outbox = Outbox::restore(self.store.as_ref()).await;
        let flow = ScanFlow::new(
            Arc::new(self.client.clone()),
            Arc::new(FixedLocator::new(Coordinates { latitude: lat, longitude: lon })),
            Arc::new(PlaceholderBiometrics),
            outbox.clone(),
            self.flow.clone(),
        );

        flow.begin_scanning(true)?;
        let outcome = flow.on_decoded(payload).await;
        outbox.persist(self.store.as_ref()).await?;

        match outcome {
            DecodeOutcome::Finished(ScanPhase::Succeeded(record)) => {
                println!("attendance recorded ({:?})", record.status);
                Ok(())
            }
            DecodeOutcome::Finished(ScanPhase::Failed(failure)) => {
                if failure.requires_login() {
                    bail!("{failure}; run `rollcall login`");
                }
                bail!(failure)
            }
            other => bail!("scan did not complete: {other:?}"),
        }
    }

    async fn sync(&self) -> Result<()> {
        let outbox = Outbox::restore(self.store.as_ref()).await;
        let report = outbox.sync(&self.client).await?;
        outbox.persist(self.store.as_ref()).await?;

        info!(sent = report.sent, removed = report.removed, "sync finished");
        match report.result {
            None => println!("nothing to sync"),
            Some(result) => println!(
                "synced: {} recorded, {} already present, {} rejected, {} still queued",
                result.success, result.skipped, result.failed, report.remaining
            ),
        }
        Ok(())
    }

    async fn classes(&self, action: ClassCommand) -> Result<()> {
        let classes = self.client.classes();
        match action {
            ClassCommand::List => {
                println!("{}", serde_json::to_string_pretty(&classes.all().await?)?);
            }
            ClassCommand::Show { id } => {
                println!("{}", serde_json::to_string_pretty(&classes.by_id(&id).await?)?);
            }
            ClassCommand::Create {
                class_number,
                subject_code,
                subject_name,
                class_year,
                semester,
                division,
            } => {
                let class = classes
                    .create(&NewClass {
                        class_number,
                        subject_code,
                        subject_name,
                        class_year,
                        semester,
                        division,
                    })
                    .await?;
                println!("created class {}", class.id);
            }
            ClassCommand::Enroll {
                class_id,
                student_id,
            } => {
                let resp = classes
                    .enroll_student(&Enrollment {
                        class_id,
                        student_id,
                    })
                    .await?;
                println!("{}", resp.message.as_deref().unwrap_or("student enrolled"));
            }
        }
        Ok(())
    }

    async fn schedules(&self, action: ScheduleCommand) -> Result<()> {
        let schedules = self.client.schedules();
        match action {
            ScheduleCommand::List { class_id } => {
                let list = schedules.by_class(&class_id).await?;
                println!("{}", serde_json::to_string_pretty(&list)?);
            }
            ScheduleCommand::Create {
                class_id,
                session_type,
                day,
                start,
                end,
                room,
                lat,
                lon,
            } => {
                let schedule = schedules
                    .create(&NewSchedule {
                        class_id,
                        session_type,
                        day_of_week: day,
                        start_time: start,
                        end_time: end,
                        room_number: room,
                        semester: None,
                        academic_year: None,
                        location: Coordinates::new(lat, lon)?,
                    })
                    .await?;
                println!("created schedule {}", schedule.id);
            }
        }
        Ok(())
    }
}
