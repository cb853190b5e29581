//! clinic-schedule: HTTP server, carry-forward runner and admin CLI.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use clinic_schedule::api::start_api_server;
use clinic_schedule::api::types::{generate_token, hash_token};
use clinic_schedule::carry_forward::{preview_carry_forward, start_background_scheduler};
use clinic_schedule::config::{self, AppConfig};
use clinic_schedule::core_state::CoreState;
use clinic_schedule::db;
use clinic_schedule::models::{Patient, Role, RunTrigger, Staff, StaffFilter};

// ── CLI ─────────────────────────────────────────────────────────────

/// Clinic schedule service with daily appointment carry-forward.
#[derive(Parser, Debug)]
#[command(name = "clinic-schedule", version, about)]
struct Cli {
    /// SQLite database file.
    #[arg(long, global = true, env = "CLINIC_DB_PATH")]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP API and the carry-forward timer.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "CLINIC_BIND_ADDR")]
        bind: Option<SocketAddr>,

        /// Do not start the carry-forward timer.
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Run carry-forward once and print the report as JSON.
    CarryForward {
        /// Date to treat as today (YYYY-MM-DD). Defaults to today in the
        /// configured offset.
        #[arg(long)]
        date: Option<NaiveDate>,

        /// Print what would be created without writing.
        #[arg(long)]
        dry_run: bool,
    },
    /// Manage staff accounts.
    Staff {
        #[command(subcommand)]
        command: StaffCommand,
    },
    /// Manage patients.
    Patient {
        #[command(subcommand)]
        command: PatientCommand,
    },
}

#[derive(Subcommand, Debug)]
enum StaffCommand {
    /// Add a staff member and print their bearer token once.
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        /// `admin` or `staff`.
        #[arg(long, default_value = "staff")]
        role: String,
        #[arg(long)]
        session_charge: Option<f64>,
    },
    /// List staff members.
    List,
    /// Replace a staff member's bearer token and print the new one.
    RotateToken { id: Uuid },
}

#[derive(Subcommand, Debug)]
enum PatientCommand {
    /// Register a patient.
    Add {
        #[arg(long)]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Primary staff member.
        #[arg(long)]
        staff_id: Option<Uuid>,
        #[arg(long)]
        diagnosed: Option<String>,
    },
}

// ── Commands ────────────────────────────────────────────────────────

async fn serve(
    core: Arc<CoreState>,
    bind: SocketAddr,
    no_scheduler: bool,
) -> anyhow::Result<()> {
    // Fail fast on a broken database before accepting traffic.
    core.open_db().context("cannot open database")?;

    let scheduler = if core.config().carry_forward_enabled && !no_scheduler {
        Some(start_background_scheduler(core.clone()).context("cannot start carry-forward timer")?)
    } else {
        tracing::info!("Carry-forward timer disabled");
        None
    };

    let mut server = start_api_server(core, bind)
        .await
        .with_context(|| format!("cannot bind {bind}"))?;
    tracing::info!(addr = %server.addr, "Listening");

    tokio::signal::ctrl_c().await.context("cannot listen for shutdown signal")?;
    tracing::info!("Shutting down");

    server.shutdown();
    server.stopped().await;

    // Joins the timer thread; a run in progress completes first.
    if let Some(scheduler) = scheduler {
        tokio::task::spawn_blocking(move || drop(scheduler)).await?;
    }
    Ok(())
}

fn carry_forward(core: &CoreState, date: Option<NaiveDate>, dry_run: bool) -> anyhow::Result<()> {
    let today = date.unwrap_or_else(|| core.clock().today());
    if dry_run {
        let conn = core.open_db()?;
        let plan = preview_carry_forward(&conn, today)?;
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    let report = core.carry_forward(Some(today), RunTrigger::Cli)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn staff_command(core: &CoreState, command: StaffCommand) -> anyhow::Result<()> {
    let conn = core.open_db()?;
    match command {
        StaffCommand::Add {
            first_name,
            last_name,
            email,
            phone,
            role,
            session_charge,
        } => {
            let role: Role = role.parse().context("role must be `admin` or `staff`")?;
            let token = generate_token();
            let staff = Staff {
                id: Uuid::new_v4(),
                first_name,
                last_name,
                email,
                phone,
                role,
                session_charge,
                created_at: db::now_timestamp(),
            };
            db::insert_staff(&conn, &staff, Some(&hash_token(&token)))?;
            tracing::info!(staff_id = %staff.id, role = %role, "Staff member added");
            println!("id:    {}", staff.id);
            println!("token: {token}");
            println!("The token is shown only once.");
        }
        StaffCommand::List => {
            let (members, _) = db::list_staff(&conn, &StaffFilter::default())?;
            for staff in members {
                println!(
                    "{}  {:<5}  {} {} <{}>",
                    staff.id, staff.role.as_str(), staff.first_name, staff.last_name, staff.email
                );
            }
        }
        StaffCommand::RotateToken { id } => {
            let token = generate_token();
            db::set_staff_token_hash(&conn, &id, &hash_token(&token))?;
            tracing::info!(staff_id = %id, "Staff token rotated");
            println!("token: {token}");
        }
    }
    Ok(())
}

fn patient_command(core: &CoreState, command: PatientCommand) -> anyhow::Result<()> {
    let conn = core.open_db()?;
    match command {
        PatientCommand::Add {
            first_name,
            last_name,
            email,
            phone,
            staff_id,
            diagnosed,
        } => {
            if first_name.trim().is_empty() {
                bail!("first name is required");
            }
            if let Some(staff_id) = staff_id {
                if db::get_staff(&conn, &staff_id)?.is_none() {
                    bail!("unknown staff member: {staff_id}");
                }
            }
            if let Some(email) = email.as_deref() {
                if db::find_patient_by_email(&conn, email)?.is_some() {
                    bail!("a patient with email {email} already exists");
                }
            }
            let patient = Patient {
                id: Uuid::new_v4(),
                first_name,
                last_name,
                email,
                phone,
                staff_id,
                diagnosed,
                created_at: db::now_timestamp(),
            };
            db::insert_patient(&conn, &patient)?;
            println!("{}", patient.id);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();

    let cli = Cli::parse();

    let mut app_config = AppConfig::from_env()?;
    if let Some(path) = cli.db_path {
        app_config.db_path = path;
    }
    if let Command::Serve { bind: Some(bind), .. } = &cli.command {
        app_config.bind_addr = *bind;
    }

    tracing::info!("{} v{}", config::APP_NAME, config::APP_VERSION);
    app_config.log_summary();

    let core = Arc::new(CoreState::new(app_config));

    match cli.command {
        Command::Serve { no_scheduler, .. } => {
            let bind = core.config().bind_addr;
            serve(core, bind, no_scheduler).await
        }
        Command::CarryForward { date, dry_run } => {
            let core = core.clone();
            tokio::task::spawn_blocking(move || carry_forward(&core, date, dry_run)).await?
        }
        Command::Staff { command } => staff_command(&core, command),
        Command::Patient { command } => patient_command(&core, command),
    }
}
