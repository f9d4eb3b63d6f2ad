//! Command-line surface of the `abyss` binary: argument parsing, config
//! resolution, and the mapping from run outcomes and errors to exit codes.

use crate::AbyssController;
use abyss_core::types::exit;
use abyss_core::{parse_target, AbyssConfig, TargetSpec};
use abyss_methods::MethodRepository;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser, Debug)]
#[command(
    name = "abyss",
    about = "Layered process-termination orchestrator",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "abyss runs method scripts named layer<L>_method<M>.<ext> against a target PID,\n\
                  layer by layer, until the process no longer exists or every method has been tried.\n\
                  Pass DEBUG instead of a PID for a dry run against target 0."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Target PID, or DEBUG for a simulation run. Prompted for when omitted.
    pub target: Option<String>,

    /// Path to config file (TOML). Default: ./abyss.toml or $ABYSS_CONFIG
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory containing method scripts (or set ABYSS_METHODS_DIR)
    #[arg(short, long, global = true)]
    pub methods_dir: Option<PathBuf>,

    /// Number of layers to descend through (or set ABYSS_LAYER_COUNT)
    #[arg(short, long, global = true)]
    pub layers: Option<u32>,

    /// Per-method timeout in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Method script extension, without the dot
    #[arg(long, global = true)]
    pub extension: Option<String>,

    /// Run every script through this program (e.g. python3)
    #[arg(long, global = true)]
    pub interpreter: Option<String>,

    /// Play audio cues during the run
    #[arg(long, default_value_t = false, global = true)]
    pub sound: bool,

    /// Print the run report as JSON on stdout
    #[arg(long, default_value_t = false, global = true)]
    pub json: bool,

    /// Write logs to a file (in addition to stderr)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Dry run against target 0 without liveness checks
    Simulate,
    /// List discovered methods for every configured layer
    List,
    /// Print the effective configuration as TOML
    Config,
    /// Show version
    Version,
}

/// Run the parsed command line and return the process exit code.
pub async fn run(cli: Cli) -> i32 {
    match try_run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            exit_code_for(&e)
        }
    }
}

/// Invalid targets map to [`exit::INVALID_INPUT`]; anything else that stops
/// the CLI before or outside a run is [`exit::FAILURE`].
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<abyss_core::Error>()
        .map(|e| e.exit_code())
        .unwrap_or(exit::FAILURE)
}

async fn try_run(cli: Cli) -> anyhow::Result<i32> {
    if let Some(Commands::Version) = cli.command {
        println!("abyss v{}", env!("CARGO_PKG_VERSION"));
        return Ok(0);
    }

    let config = resolve_config(&cli)?;

    match cli.command {
        Some(Commands::Config) => {
            print!("{}", config.to_toml());
            Ok(0)
        }
        Some(Commands::List) => {
            list_methods(&config).await;
            Ok(0)
        }
        Some(Commands::Simulate) => Ok(execute(config, TargetSpec::Simulation, cli.json).await),
        Some(Commands::Version) => Ok(0),
        None => {
            let input = match cli.target {
                Some(t) => t,
                None => prompt_target().await?,
            };
            let target = parse_target(&input)?;
            Ok(execute(config, target, cli.json).await)
        }
    }
}

async fn execute(config: AbyssConfig, target: TargetSpec, json: bool) -> i32 {
    let controller = AbyssController::new(config);
    let report = controller.dispatch(target).await;

    if json {
        println!("{}", report.to_json());
    } else {
        println!(
            "{} ({} methods run, {} failed)",
            report.result,
            report.attempts.len(),
            report.failed_attempts()
        );
    }
    report.exit_code()
}

async fn list_methods(config: &AbyssConfig) {
    let count = config.layers.count;
    let repo = MethodRepository::new(&config.methods.dir, config.methods.extension.clone());
    println!("Methods in {}", repo.root().display());

    let plans = match repo.catalog(count).await {
        Ok(plans) => plans,
        Err(e) => {
            println!("{e}");
            return;
        }
    };
    for plan in &plans {
        println!("Layer {}:", plan.layer);
        for m in plan {
            println!("  {:>3}  {}", m.method, m.file_name());
        }
    }
    let empty = u64::from(count) - plans.len() as u64;
    if empty > 0 {
        println!("{empty} of {count} layers have no methods");
    }
}

async fn prompt_target() -> anyhow::Result<String> {
    print!("Enter PID of target process (or type DEBUG): ");
    std::io::stdout().flush()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?.unwrap_or_default())
}

/// Config file, then environment, then flags.
pub fn resolve_config(cli: &Cli) -> anyhow::Result<AbyssConfig> {
    resolve_config_with(cli, |key| std::env::var(key).ok())
}

/// [`resolve_config`] with the environment supplied by `env`.
pub fn resolve_config_with(
    cli: &Cli,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<AbyssConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| env("ABYSS_CONFIG").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("abyss.toml"));
    let mut config = AbyssConfig::load(&path)?;

    if let Some(dir) = env("ABYSS_METHODS_DIR") {
        config.methods.dir = PathBuf::from(dir);
    }
    if let Some(count) = env("ABYSS_LAYER_COUNT") {
        match count.trim().parse() {
            Ok(n) => config.layers.count = n,
            Err(_) => tracing::warn!("Ignoring ABYSS_LAYER_COUNT={:?}: not a number", count),
        }
    }

    if let Some(dir) = &cli.methods_dir {
        config.methods.dir = dir.clone();
    }
    if let Some(n) = cli.layers {
        config.layers.count = n;
    }
    if let Some(secs) = cli.timeout_secs {
        config.methods.timeout_secs = secs;
    }
    if let Some(ext) = &cli.extension {
        config.methods.extension = ext.clone();
    }
    if let Some(interpreter) = &cli.interpreter {
        config.methods.interpreter = Some(interpreter.clone());
    }
    if cli.sound {
        config.feedback.enabled = true;
    }

    config.methods.dir = locate_dir(&config.methods.dir);
    config.feedback.sounds_dir = locate_dir(&config.feedback.sounds_dir);
    config.validate()?;
    Ok(config)
}

/// Relative directories resolve against the working directory first, then
/// against the directory holding the binary.
fn locate_dir(dir: &Path) -> PathBuf {
    if dir.is_absolute() || dir.is_dir() {
        return dir.to_path_buf();
    }
    let beside_exe = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join(dir)));
    match beside_exe {
        Some(candidate) if candidate.is_dir() => candidate,
        _ => dir.to_path_buf(),
    }
}
