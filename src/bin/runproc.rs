//! runproc - minimal OCI runtime CLI
//!
//! Runs an OCI bundle's process as a plain host process, following the
//! runtime-spec command line like runc/crun.
//!
//! ## Usage
//!
//! ```sh
//! runproc create [--pid-file <path>] <id> <bundle>
//! runproc create --bundle <bundle> <id>
//! runproc start <id>
//! runproc state <id>
//! runproc kill <id> [signal]
//! runproc delete <id>
//! runproc run <id> <bundle>
//! runproc list
//! ```
//!
//! Global runc flags (`--root`, `--log`, `--log-format`, ...) are accepted
//! anywhere; see [`runproc::compat`].
//!
//! ## Environment
//!
//! - `RUNPROC_STATE_DIR`: state root when `--root` is not given
//! - `RUNPROC_HOST`: host mode for the `init` supervisor
//! - `RUNPROC_LOG`: tracing filter for stderr (default `warn`)

use clap::{Parser, Subcommand};
use runproc::compat::{self, Overrides};
use runproc::constants::{
    DEFAULT_STATE_ROOT, HOST_MODE_ENV, LOG_FILTER_ENV, OCI_VERSION, STATE_DIR_ENV,
};
use runproc::init::{self, InitOptions};
use runproc::logging;
use runproc::{Error, OciRuntime, ProcessRuntime, Result, RuntimeConfig, Signal, StateView};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

// =============================================================================
// CLI Parsing
// =============================================================================

/// Canonical command line, after [`compat::normalize`].
#[derive(Debug, Parser)]
#[command(name = "runproc")]
#[command(version, about = "Minimal OCI runtime running a bundle as a host process", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a container without starting its program
    Create(BundleArgs),

    /// Start a created container
    Start {
        /// Container ID
        id: String,
    },

    /// Print container state as JSON
    State {
        /// Container ID
        id: String,
    },

    /// Send a signal to a container (default SIGTERM)
    Kill {
        /// Container ID
        id: String,
        /// Signal name (TERM, SIGKILL) or number
        signal: Option<String>,
    },

    /// Stop a container if needed and remove it
    Delete {
        /// Container ID
        id: String,
    },

    /// Create, start and wait for a container
    Run(BundleArgs),

    /// List containers
    List,

    /// Show version info
    Version,

    /// Internal: supervise a created container until start
    #[command(hide = true)]
    Init {
        /// Start-marker poll interval
        #[arg(long, value_name = "MS", default_value_t = 100)]
        poll_interval_ms: u64,
        /// State root used by the controller
        state_root: PathBuf,
        /// Container ID
        id: String,
    },
}

#[derive(Debug, clap::Args)]
struct BundleArgs {
    /// Bundle directory
    #[arg(long, value_name = "PATH")]
    bundle: Option<PathBuf>,

    /// File to write the container PID to
    #[arg(long, value_name = "PATH")]
    pid_file: Option<PathBuf>,

    /// Container ID
    id: String,

    /// Bundle directory (when --bundle is not given)
    #[arg(value_name = "BUNDLE")]
    bundle_path: Option<PathBuf>,
}

impl BundleArgs {
    fn bundle(&self) -> Result<PathBuf> {
        self.bundle
            .clone()
            .or_else(|| self.bundle_path.clone())
            .ok_or_else(|| Error::InvalidSpec {
                path: PathBuf::new(),
                reason: format!("no bundle given for container '{}'", self.id),
            })
    }
}

// =============================================================================
// Commands
// =============================================================================

async fn cmd_create(runtime: &ProcessRuntime, args: BundleArgs) -> Result<()> {
    let bundle = args.bundle()?;
    runtime
        .create_with_pid_file(&args.id, &bundle, args.pid_file.as_deref())
        .await?;
    Ok(())
}

async fn cmd_state(runtime: &ProcessRuntime, id: &str) -> Result<()> {
    let state = runtime.state(id).await?;
    let json = serde_json::to_string_pretty(&StateView::from(&state))?;
    println!("{}", json);
    Ok(())
}

async fn cmd_kill(runtime: &ProcessRuntime, id: &str, signal: Option<&str>) -> Result<()> {
    let signal = signal.map(Signal::parse).unwrap_or_default();
    runtime.kill(id, signal).await
}

async fn cmd_run(runtime: &ProcessRuntime, args: BundleArgs) -> Result<u8> {
    let bundle = args.bundle()?;
    let code = runtime
        .run(&args.id, &bundle, args.pid_file.as_deref())
        .await?;
    Ok((code & 0xff) as u8)
}

async fn cmd_list(runtime: &ProcessRuntime) -> Result<()> {
    let states = runtime.list().await?;
    println!("ID\tPID\tSTATUS\tBUNDLE");
    for state in states {
        println!(
            "{}\t{}\t{}\t{}",
            state.id, state.pid, state.status, state.bundle
        );
    }
    Ok(())
}

fn cmd_version() {
    println!("runproc version {}", env!("CARGO_PKG_VERSION"));
    println!("spec: {}", OCI_VERSION);
}

/// Runs the supervisor; returns only with the error that stopped it.
fn cmd_init(state_root: PathBuf, id: String, poll_interval_ms: u64) -> Error {
    let opts = InitOptions {
        state_root,
        id,
        poll_interval: Duration::from_millis(poll_interval_ms),
        host_mode_env: std::env::var(HOST_MODE_ENV).is_ok_and(|v| init::is_truthy(&v)),
    };
    match init::run(&opts) {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

/// Resolves the state root: `--root`, then `RUNPROC_STATE_DIR`, then the
/// default.
fn state_root(overrides: &Overrides) -> PathBuf {
    overrides
        .root
        .clone()
        .or_else(|| {
            std::env::var_os(STATE_DIR_ENV)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        })
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_ROOT))
}

async fn dispatch(command: Commands, overrides: &Overrides) -> Result<u8> {
    if let Commands::Version = command {
        cmd_version();
        return Ok(0);
    }

    let config = RuntimeConfig::new(state_root(overrides))?;
    let runtime = ProcessRuntime::new(config)?;

    match command {
        Commands::Create(args) => cmd_create(&runtime, args).await?,
        Commands::Start { id } => runtime.start(&id).await?,
        Commands::State { id } => cmd_state(&runtime, &id).await?,
        Commands::Kill { id, signal } => cmd_kill(&runtime, &id, signal.as_deref()).await?,
        Commands::Delete { id } => runtime.delete(&id).await?,
        Commands::Run(args) => return cmd_run(&runtime, args).await,
        Commands::List => cmd_list(&runtime).await?,
        Commands::Version | Commands::Init { .. } => {
            return Err(Error::Internal("command dispatched out of order".to_string()));
        }
    }
    Ok(0)
}

// =============================================================================
// Main
// =============================================================================

fn main() -> ExitCode {
    logging::init_tracing(std::env::var(LOG_FILTER_ENV).ok().as_deref());

    let normalized = compat::normalize(std::env::args().skip(1));
    let overrides = normalized.overrides;
    let log_path = overrides.log_path.clone();

    let argv = std::iter::once("runproc".to_string()).chain(normalized.args);
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => {
            if !e.use_stderr() {
                let _ = e.print();
                return ExitCode::SUCCESS;
            }
            logging::write_error_log(log_path.as_deref(), &e.to_string());
            let _ = e.print();
            return ExitCode::FAILURE;
        }
    };

    // The supervisor ends in execve and never needs an async runtime.
    if let Commands::Init {
        poll_interval_ms,
        state_root,
        id,
    } = cli.command
    {
        let err = cmd_init(state_root, id, poll_interval_ms);
        eprintln!("error: {}", err);
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match rt.block_on(dispatch(cli.command, &overrides)) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            logging::write_error_log(log_path.as_deref(), &e.to_string());
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
