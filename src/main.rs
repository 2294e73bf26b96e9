use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use relay_bridge::automation::{HostLiveness, SysinfoProbe};
use relay_bridge::config::{load_config, BridgeConfig};
use relay_bridge::consumer::{list_entries, EntryKind};
use relay_bridge::installer::Installer;
use relay_bridge::logging::{self, FileLogSink, LogSink, TeeLogSink, TracingLogSink};
use relay_bridge::submitter::Submitter;
use relay_bridge::utils::{remove_if_present, write_atomic};
use relay_bridge::{Bridge, BridgeDirs, BridgeError, Command, DeliveryReceipt};

#[derive(Parser, Debug)]
#[command(name = "relay-bridge")]
#[command(version)]
#[command(about = "Deliver one-shot commands into a running host application")]
#[command(propagate_version = true)]
struct Args {
    /// Route every command through the job queue
    #[arg(long, global = true)]
    queued: bool,

    /// How long to wait for a queued job's result
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Return as soon as a queued job is written, without waiting
    #[arg(long, global = true)]
    no_wait: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import an audio file into the project and the active timeline
    Import {
        path: PathBuf,

        /// Import even when no composition is open
        #[arg(long)]
        no_session: bool,
    },

    /// Evaluate script text in the host
    Eval { code: String },

    /// Evaluate a script file in the host
    RunFile { path: PathBuf },

    /// Leave an audio import in the queue for the next consumer tick
    Drop { path: PathBuf },

    /// Deploy the consumer loop into the host's startup scripts
    Install,

    /// Remove deployed startup scripts
    Uninstall,

    /// Show host, queue and installation state
    Status,

    /// Pause the consumer loop (creates the stop flag)
    Stop,

    /// Resume the consumer loop (removes the stop flag)
    Resume,

    /// Launch the host if it is not running
    EnsureRunning,

    /// Start a stopped host with a one-shot startup script
    Restart { script: PathBuf },
}

fn main() -> ExitCode {
    let args = Args::parse();
    let dirs = BridgeDirs::from_env();
    let _guard = logging::init(&dirs.root().join("logs"));

    match run(args, dirs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<BridgeError>() {
                Some(bridge_error) => eprintln!("{}", bridge_error.user_message()),
                None => eprintln!("Error: {:#}", e),
            }
            ExitCode::FAILURE
        }
    }
}

fn load(args: &Args, dirs: &BridgeDirs) -> relay_bridge::Result<BridgeConfig> {
    let mut config = load_config(&dirs.config_path());
    if args.queued {
        config.prefer_queued = true;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.timing.await_timeout_ms = timeout_ms;
    }
    config.validate()?;
    Ok(config)
}

fn bridge(args: &Args, dirs: &BridgeDirs, config: BridgeConfig) -> Bridge {
    let file_sink: Arc<dyn LogSink> = Arc::new(FileLogSink::new(dirs.log_path()));
    let tracing_sink: Arc<dyn LogSink> = Arc::new(TracingLogSink);
    let sink: Arc<dyn LogSink> = Arc::new(TeeLogSink::new(vec![file_sink, tracing_sink]));
    let bridge = Bridge::from_config(config, dirs.clone()).with_sink(sink);
    if args.no_wait {
        bridge.without_await()
    } else {
        bridge
    }
}

fn deliver(bridge: &Bridge, command: Command) -> Result<()> {
    match bridge.deliver(&command)? {
        DeliveryReceipt::Executed => println!("{}: done", command.operation()),
        DeliveryReceipt::Completed(artifact) => println!(
            "{}: done in {} ms ({})",
            artifact.operation, artifact.elapsed_ms, artifact.request_id
        ),
        DeliveryReceipt::Queued(job) => println!("{}: queued as {}", command.operation(), job.id),
    }
    Ok(())
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(cwd.join(path))
}

fn run(args: Args, dirs: BridgeDirs) -> Result<()> {
    let config = load(&args, &dirs)?;
    info!(root = %dirs.root().display(), command = ?args.command, "relay-bridge starting");

    match &args.command {
        Commands::Import { path, no_session } => {
            let command = Command::ImportAudio {
                path: absolute(path.clone())?,
                requires_active_session: !no_session,
            };
            deliver(&bridge(&args, &dirs, config), command)
        }
        Commands::Eval { code } => deliver(
            &bridge(&args, &dirs, config),
            Command::run_script_text(code.clone()),
        ),
        Commands::RunFile { path } => deliver(
            &bridge(&args, &dirs, config),
            Command::run_script_file(absolute(path.clone())?),
        ),
        Commands::Drop { path } => {
            let written = Submitter::new(dirs.clone())
                .drop_file(&Command::import_audio(absolute(path.clone())?))?;
            println!("queued {}", written.display());
            Ok(())
        }
        Commands::Install => {
            let report = Installer::new(dirs.clone(), config.host, config.timing).install();
            for target in &report.targets {
                println!("  {}", target.display());
            }
            for warning in &report.warnings {
                eprintln!("warning: {}", warning);
            }
            println!("{}", report.message);
            if report.installed_count == 0 {
                anyhow::bail!("startup script was not installed");
            }
            Ok(())
        }
        Commands::Uninstall => {
            let report = Installer::new(dirs.clone(), config.host, config.timing).uninstall();
            println!("{}", report.message);
            Ok(())
        }
        Commands::Status => status(&dirs, &config),
        Commands::Stop => {
            write_atomic(&dirs.stop_flag(), b"")
                .with_context(|| format!("Failed to create {}", dirs.stop_flag().display()))?;
            println!("consumer paused");
            Ok(())
        }
        Commands::Resume => {
            remove_if_present(&dirs.stop_flag())
                .with_context(|| format!("Failed to remove {}", dirs.stop_flag().display()))?;
            println!("consumer resumed");
            Ok(())
        }
        Commands::EnsureRunning => {
            let bridge = bridge(&args, &dirs, config);
            if !bridge.is_running() {
                println!(
                    "launching {}, waiting {} ms",
                    bridge.config().host.app_name,
                    bridge.settle_delay().as_millis()
                );
            }
            bridge.ensure_running()?;
            println!("{} is running", bridge.config().host.app_name);
            Ok(())
        }
        Commands::Restart { script } => {
            let bridge = bridge(&args, &dirs, config);
            bridge.restart_with_script(script)?;
            println!("{} started with {}", bridge.config().host.app_name, script.display());
            Ok(())
        }
    }
}

fn status(dirs: &BridgeDirs, config: &BridgeConfig) -> Result<()> {
    let liveness = HostLiveness::new(Arc::new(SysinfoProbe), config.host.process_name.clone());
    let entries = list_entries(dirs)
        .with_context(|| format!("Failed to list {}", dirs.root().display()))?;
    let count = |kind: EntryKind| entries.iter().filter(|e| e.kind == kind).count();

    println!("support dir : {}", dirs.root().display());
    println!(
        "host        : {} ({})",
        config.host.app_name,
        if liveness.is_running() { "running" } else { "not running" }
    );
    println!(
        "consumer    : {}",
        if dirs.is_stopped() { "paused (stop flag present)" } else { "enabled" }
    );
    println!(
        "queue       : {} audio, {} script, {} job(s), {} result(s) pending",
        count(EntryKind::AudioImport),
        count(EntryKind::Script),
        count(EntryKind::Job),
        count(EntryKind::Artifact)
    );
    println!(
        "delivery    : {}",
        if config.prefer_queued { "queued" } else { "direct when possible" }
    );
    Ok(())
}
