//! GenAI Installer - Entry Point
//!
//! Installs and maintains a portable ComfyUI, Automatic1111 and their
//! extension and model catalogs.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use manifest_models::Phase;
use secrecy::SecretString;
use tracing::{error, info};

use genai_installer::app::options::InstallConfig;
use genai_installer::app::run::{run, Task};
use genai_installer::app::state::AppState;
use genai_installer::apps::cuda::DEFAULT_MAX_ATTEMPTS;
use genai_installer::apps::models::ModelSet;
use genai_installer::logs::{init_logging, LogLevel, LogOptions};
use genai_installer::storage::layout::StorageLayout;
use genai_installer::storage::settings::Preferences;
use genai_installer::utils::{run_diagnostic, unquote, version_info};

#[derive(Parser, Debug)]
#[command(name = "genai-installer", version, about = "Installer for ComfyUI, Automatic1111 and their extensions")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Debug)]
struct GlobalArgs {
    /// Directory holding prefs.json and config.json (default: current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Install root for the applications
    #[arg(long, global = true)]
    root: Option<String>,

    /// Shared data root for models, custom nodes and workflows
    #[arg(long, global = true)]
    data: Option<String>,

    /// Scratch directory for downloads (default: current directory)
    #[arg(long, global = true)]
    staging: Option<PathBuf>,

    /// ComfyUI port
    #[arg(long, global = true)]
    worker_port: Option<u16>,

    /// Automatic1111 port
    #[arg(long, global = true)]
    secondary_port: Option<u16>,

    /// Run ComfyUI on the CPU
    #[arg(long, global = true, conflicts_with = "gpu")]
    cpu: bool,

    /// Run ComfyUI on an NVIDIA GPU
    #[arg(long, global = true)]
    gpu: bool,

    /// Content platform API endpoint
    #[arg(long, global = true)]
    platform_url: Option<String>,

    /// Content platform API token
    #[arg(long, global = true, env = "CIVITAI_TOKEN", hide_env_values = true)]
    platform_token: Option<String>,

    /// 7-Zip executable
    #[arg(long, global = true)]
    seven_zip: Option<String>,

    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Also write daily log files into this directory
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Hide progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the install root and the data tree, then save preferences
    Prepare,

    /// Install ComfyUI portable and its manager
    InstallApp {
        #[arg(long)]
        reinstall: bool,

        /// Continue with the custom nodes
        #[arg(long)]
        with_nodes: bool,
    },

    /// Install the custom nodes in three phases
    InstallNodes {
        #[arg(long)]
        reinstall: bool,
    },

    /// Run a single custom node phase
    RunPhase { phase: Phase },

    /// Recreate the ComfyUI links into the data tree
    Symlinks,

    /// Start ComfyUI once and stop it when it is ready
    Boot {
        /// Budget in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Load model collections: sd, sdxl or all
    LoadModels { set: ModelSet },

    /// Install large model bundles, optionally only the named ones
    InstallLarge { labels: Vec<String> },

    /// Install Automatic1111 and its extensions
    InstallSecondary {
        #[arg(long)]
        reinstall: bool,
    },

    /// Install the ffmpeg binaries
    InstallFfmpeg {
        #[arg(long)]
        reinstall: bool,
    },

    /// Reinstall torch for CUDA 11.8 when the runtime does not match
    FixCuda {
        #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
        max_attempts: u32,
    },

    /// Print version information
    Version,

    /// Print a host report
    Diagnostic,
}

impl Commands {
    fn into_task(self) -> Option<Task> {
        Some(match self {
            Commands::Prepare => Task::Prepare,
            Commands::InstallApp { reinstall, with_nodes } => Task::InstallApp { reinstall, with_nodes },
            Commands::InstallNodes { reinstall } => Task::InstallNodes { reinstall },
            Commands::RunPhase { phase } => Task::RunPhase(phase),
            Commands::Symlinks => Task::Symlinks,
            Commands::Boot { timeout } => Task::Boot {
                timeout: timeout.map(Duration::from_secs),
            },
            Commands::LoadModels { set } => Task::LoadModels(set),
            Commands::InstallLarge { labels } => Task::InstallLarge { labels },
            Commands::InstallSecondary { reinstall } => Task::InstallSecondary { reinstall },
            Commands::InstallFfmpeg { reinstall } => Task::InstallFfmpeg { reinstall },
            Commands::FixCuda { max_attempts } => Task::FixCuda { max_attempts },
            Commands::Version | Commands::Diagnostic => return None,
        })
    }
}

/// Preferences overlaid with command-line values
fn build_config(args: &GlobalArgs, mut prefs: Preferences) -> anyhow::Result<InstallConfig> {
    if let Some(root) = &args.root {
        prefs.root_path = unquote(root);
    }
    if let Some(data) = &args.data {
        prefs.data_path = unquote(data);
    }
    if let Some(port) = args.worker_port {
        prefs.comfy_port = port;
    }
    if let Some(port) = args.secondary_port {
        prefs.auto_port = port;
    }
    if args.cpu {
        prefs.use_nvidia = false;
    } else if args.gpu {
        prefs.use_nvidia = true;
    }

    let staging = match &args.staging {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Unable to read the working directory")?,
    };
    let mut config = InstallConfig::from_preferences(&prefs, staging);
    if let Some(url) = &args.platform_url {
        config.platform_url = url.clone();
    }
    if let Some(seven_zip) = &args.seven_zip {
        config.seven_zip = seven_zip.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let args = cli.global;

    if let Commands::Version = cli.command {
        println!("{}", serde_json::to_string_pretty(&version_info())?);
        return Ok(());
    }

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(LogOptions {
        log_level: args.log_level.clone(),
        log_dir: args.log_dir.clone(),
        json_format: args.json_logs,
        ..Default::default()
    })?;

    let layout = match &args.config_dir {
        Some(dir) => StorageLayout::new(dir.clone()),
        None => StorageLayout::default(),
    };
    let prefs = Preferences::load(&layout.prefs_file()).await;
    let config = build_config(&args, prefs)?;

    let Some(task) = cli.command.into_task() else {
        let report = run_diagnostic(&config.data_root, &config.seven_zip).await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    };

    let token = args.platform_token.map(SecretString::from);
    let state = AppState::init(config, layout, token, !args.no_progress)?;

    match run(&state, task).await {
        Ok(summary) if summary.is_partial() => {
            anyhow::bail!("{} item(s) failed; the rest were processed", summary.failed)
        }
        Ok(_) => {
            info!("Happy Generating");
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            Err(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_preferences() {
        let cli = Cli::parse_from([
            "genai-installer",
            "--root",
            "\"/opt/genai\"",
            "--worker-port",
            "8188",
            "--cpu",
            "--staging",
            "/tmp/stage",
            "run-phase",
            "basic",
        ]);
        let config = build_config(&cli.global, Preferences::default()).unwrap();

        assert_eq!(config.install_root, PathBuf::from("/opt/genai"));
        assert_eq!(config.worker_port, 8188);
        assert!(!config.use_gpu);
        assert_eq!(config.staging_dir, PathBuf::from("/tmp/stage"));
        assert!(matches!(cli.command, Commands::RunPhase { phase: Phase::DependencySetup }));
    }

    #[test]
    fn test_cli_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
