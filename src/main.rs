use clap::{Parser, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cron_coordinator::catalog::JobStats;
use cron_coordinator::config::{
    ControlPlaneConfig, CoordinationConfig, RecordStoreConfig, TlsConfig,
};
use cron_coordinator::job::{
    ExecutionRecord, JobDraft, JobRecord, JobSpec, JobState, SystemLogEntry,
};
use cron_coordinator::{ControlPlane, MutationOutcome};

#[derive(Parser, Debug)]
#[command(name = "cronctl")]
#[command(version)]
#[command(about = "Operate distributed cron jobs through etcd and MySQL")]
#[command(propagate_version = true)]
struct Args {
    #[command(flatten)]
    stores: StoreArgs,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "table")]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Job management commands
    Job {
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Show job counters
    Stats,

    /// Show the most recent audit entries
    Log,
}

// =============================================================================
// Store Arguments
// =============================================================================

#[derive(Parser, Debug)]
struct StoreArgs {
    /// etcd endpoints (comma-separated host:port)
    #[arg(long, default_value = "127.0.0.1:2379", value_delimiter = ',')]
    etcd: Vec<String>,

    /// etcd dial timeout in milliseconds
    #[arg(long, default_value = "5000")]
    dial_timeout_ms: u64,

    /// etcd username
    #[arg(long, requires = "etcd_password")]
    etcd_user: Option<String>,

    /// etcd password
    #[arg(long)]
    etcd_password: Option<String>,

    // === TLS Options ===
    /// Enable mTLS towards etcd
    #[arg(long)]
    tls: bool,

    /// Path to CA certificate bundle (PEM format)
    #[arg(long, requires = "tls")]
    ca_cert: Option<PathBuf>,

    /// Path to client certificate (PEM format)
    #[arg(long, requires = "tls")]
    cert: Option<PathBuf>,

    /// Path to client private key (PEM format)
    #[arg(long, requires = "tls")]
    key: Option<PathBuf>,

    /// Expected server name in the etcd certificate
    #[arg(long, requires = "tls")]
    server_name: Option<String>,

    /// Fall back to plaintext when TLS material is missing.
    /// NOT recommended for production.
    #[arg(long)]
    allow_insecure: bool,

    /// Kill signal lifetime in seconds
    #[arg(long, default_value = "1")]
    kill_ttl_secs: u64,

    // === MySQL Options ===
    #[arg(long, default_value = "127.0.0.1")]
    db_host: String,

    #[arg(long, default_value = "3306")]
    db_port: u16,

    #[arg(long, default_value = "root")]
    db_user: String,

    #[arg(long, default_value = "")]
    db_password: String,

    #[arg(long, default_value = "cron")]
    db_name: String,

    /// Machine id for generated row IDs (0-1023)
    #[arg(long, default_value = "1")]
    machine_id: u16,
}

impl StoreArgs {
    fn into_config(self) -> ControlPlaneConfig {
        ControlPlaneConfig {
            machine_id: self.machine_id,
            coordination: CoordinationConfig {
                endpoints: self.etcd,
                dial_timeout_ms: self.dial_timeout_ms,
                username: self.etcd_user,
                password: self.etcd_password,
                tls: TlsConfig {
                    enabled: self.tls,
                    ca_cert_path: self.ca_cert,
                    cert_path: self.cert,
                    key_path: self.key,
                    server_name: self.server_name,
                    allow_insecure: self.allow_insecure,
                },
                kill_lease_ttl_secs: self.kill_ttl_secs,
                ..CoordinationConfig::default()
            },
            record: RecordStoreConfig {
                host: self.db_host,
                port: self.db_port,
                user: self.db_user,
                password: self.db_password,
                db_name: self.db_name,
                ..RecordStoreConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

// =============================================================================
// Job Commands
// =============================================================================

#[derive(clap::Subcommand, Debug)]
enum JobCommands {
    /// Publish a new job to all workers
    Add {
        #[command(flatten)]
        job: JobFields,
    },
    /// Edit an existing job
    Edit {
        /// Record-store job ID
        id: i64,
        #[command(flatten)]
        job: JobFields,
    },
    /// Withdraw a job from all workers and delete it
    Delete {
        /// Record-store job ID
        id: i64,
        /// Job name
        name: String,
    },
    /// Signal all workers to stop a running job
    Kill {
        /// Job name
        name: String,
    },
    /// List jobs
    List {
        /// List the definitions workers currently see instead of the record store
        #[arg(long)]
        live: bool,
    },
    /// Show the most recent runs of a job
    History {
        /// Job name
        name: String,
    },
}

#[derive(clap::Args, Debug)]
struct JobFields {
    /// Unique job name
    #[arg(long)]
    name: String,

    /// Shell command to run
    #[arg(long)]
    command: String,

    /// Cron expression
    #[arg(long)]
    cron: String,

    /// Store the job as disabled
    #[arg(long)]
    disabled: bool,
}

impl JobFields {
    fn into_draft(self) -> JobDraft {
        let state = if self.disabled {
            JobState::Disabled
        } else {
            JobState::Enabled
        };
        JobDraft::new(self.name, self.command, self.cron).with_state(state)
    }
}

// =============================================================================
// JSON Output Types
// =============================================================================

#[derive(Serialize)]
struct MutationOutput {
    rows_affected: u64,
    previous: Option<JobSpec>,
    audit_error: Option<String>,
}

impl From<&MutationOutcome> for MutationOutput {
    fn from(outcome: &MutationOutcome) -> Self {
        Self {
            rows_affected: outcome.rows_affected,
            previous: outcome.previous.clone(),
            audit_error: outcome.audit_error.as_ref().map(|e| e.to_string()),
        }
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

fn print_mutation(
    verb: &str,
    outcome: &MutationOutcome,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&MutationOutput::from(outcome))?
            );
        }
        OutputFormat::Table => {
            println!("Job {} ({} row(s) affected)", verb, outcome.rows_affected);
            if let Some(prev) = &outcome.previous {
                println!(
                    "Previous definition: {} [{}] {}",
                    prev.name, prev.cron_expr, prev.command
                );
            }
            if let Some(e) = &outcome.audit_error {
                eprintln!("Warning: audit entry not written: {}", e);
            }
        }
    }
    Ok(())
}

fn print_jobs(
    jobs: &[JobRecord],
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(jobs)?),
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("No jobs found.");
                return Ok(());
            }
            println!(
                "{:<20} {:<20} {:<10} {:<16} COMMAND",
                "ID", "NAME", "STATE", "CRON"
            );
            println!("{}", "-".repeat(90));
            for job in jobs {
                println!(
                    "{:<20} {:<20} {:<10} {:<16} {}",
                    job.id, job.name, job.state, job.cron_expr, job.command
                );
            }
            println!();
            println!("{} job(s)", jobs.len());
        }
    }
    Ok(())
}

fn print_live_jobs(
    jobs: &[JobSpec],
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(jobs)?),
        OutputFormat::Table => {
            if jobs.is_empty() {
                println!("No live jobs.");
                return Ok(());
            }
            println!("{:<20} {:<16} COMMAND", "NAME", "CRON");
            println!("{}", "-".repeat(60));
            for job in jobs {
                println!("{:<20} {:<16} {}", job.name, job.cron_expr, job.command);
            }
        }
    }
    Ok(())
}

fn print_history(
    runs: &[ExecutionRecord],
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(runs)?),
        OutputFormat::Table => {
            if runs.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }
            println!("{:<20} {:<20} {:<8} INFO", "STARTED", "STOPPED", "SECS");
            println!("{}", "-".repeat(70));
            for run in runs {
                println!(
                    "{:<20} {:<20} {:<8} {}",
                    run.start_time.format("%Y-%m-%d %H:%M:%S"),
                    run.stop_time.format("%Y-%m-%d %H:%M:%S"),
                    run.running_secs,
                    run.info.lines().next().unwrap_or("")
                );
                if !run.err.is_empty() {
                    println!("  error: {}", run.err);
                }
            }
        }
    }
    Ok(())
}

fn print_stats(
    stats: &JobStats,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
        OutputFormat::Table => {
            println!("Job Statistics");
            println!("{}", "=".repeat(40));
            println!("Total:                 {}", stats.total);
            println!("Enabled:               {}", stats.enabled);
            println!("Created today:         {}", stats.created_today);
            println!("Enabled created today: {}", stats.enabled_created_today);
        }
    }
    Ok(())
}

fn print_log(
    entries: &[SystemLogEntry],
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No audit entries.");
                return Ok(());
            }
            println!("{:<20} {:<12} {:<12} NOTE", "TIME", "SCOPE", "TYPE");
            println!("{}", "-".repeat(70));
            for entry in entries {
                println!(
                    "{:<20} {:<12} {:<12} {}",
                    entry.start_time.format("%Y-%m-%d %H:%M:%S"),
                    entry.host_scope,
                    entry.op_type,
                    entry.note
                );
            }
        }
    }
    Ok(())
}

async fn handle_job(
    plane: &ControlPlane,
    command: JobCommands,
    output_format: &OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        JobCommands::Add { job } => {
            let draft = job.into_draft();
            plane.coordinator.ensure_absent(&draft.name).await?;
            let outcome = plane.coordinator.create(&draft).await?;
            print_mutation("added", &outcome, output_format)?;
        }
        JobCommands::Edit { id, job } => {
            let outcome = plane.coordinator.update(id, &job.into_draft()).await?;
            print_mutation("edited", &outcome, output_format)?;
        }
        JobCommands::Delete { id, name } => {
            let outcome = plane.coordinator.delete(id, &name).await?;
            print_mutation("deleted", &outcome, output_format)?;
        }
        JobCommands::Kill { name } => {
            plane.coordinator.issue_kill(&name).await?;
            match output_format {
                OutputFormat::Json => println!("{}", serde_json::json!({ "killed": name })),
                OutputFormat::Table => println!("Kill signal sent for job {}", name),
            }
        }
        JobCommands::List { live } => {
            if live {
                print_live_jobs(&plane.coordinator.live_jobs().await?, output_format)?;
            } else {
                print_jobs(&plane.catalog.list_jobs().await?, output_format)?;
            }
        }
        JobCommands::History { name } => {
            print_history(&plane.catalog.execution_history(&name).await?, output_format)?;
        }
    }
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.stores.into_config();
    let plane = ControlPlane::connect(&config).await?;

    match args.command {
        Commands::Job { command } => handle_job(&plane, command, &args.output).await?,
        Commands::Stats => print_stats(&plane.catalog.stats().await?, &args.output)?,
        Commands::Log => print_log(&plane.catalog.system_logs().await?, &args.output)?,
    }

    Ok(())
}
