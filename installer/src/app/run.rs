//! Command execution and summaries

use std::time::Duration;

use colored::Colorize;
use manifest_models::Phase;
use tracing::{error, info};

use crate::app::state::AppState;
use crate::apps::cuda::{self, FixOutcome};
use crate::apps::ffmpeg::install_ffmpeg;
use crate::apps::models::{load_models, ModelSet};
use crate::apps::AppOutcome;
use crate::dispatch::{ItemReport, ItemStatus, PhaseResult};
use crate::errors::InstallerError;
use crate::filesys::dir::Dir;
use crate::storage::settings::Preferences;
use crate::supervisor::{RunOutcome, RunReport};

/// One installer command
#[derive(Debug, Clone)]
pub enum Task {
    Prepare,
    InstallApp { reinstall: bool, with_nodes: bool },
    InstallNodes { reinstall: bool },
    RunPhase(Phase),
    Symlinks,
    Boot { timeout: Option<Duration> },
    LoadModels(ModelSet),
    InstallLarge { labels: Vec<String> },
    InstallSecondary { reinstall: bool },
    InstallFfmpeg { reinstall: bool },
    FixCuda { max_attempts: u32 },
}

/// Item totals over a whole command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub installed: usize,
    pub already_installed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn add(&mut self, reports: &[ItemReport]) {
        for report in reports {
            match report.status {
                ItemStatus::Installed => self.installed += 1,
                ItemStatus::AlreadyInstalled => self.already_installed += 1,
                ItemStatus::Skipped(_) => self.skipped += 1,
                ItemStatus::Failed(_) => self.failed += 1,
            }
        }
    }

    /// Some items failed; everything else was still attempted
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Run `task` against `state`, printing per-item results
pub async fn run(state: &AppState, task: Task) -> Result<RunSummary, InstallerError> {
    info!("Running {:?}", task);
    let mut summary = RunSummary::default();

    match task {
        Task::Prepare => prepare(state).await?,
        Task::InstallApp { reinstall, with_nodes } => {
            let catalog = state.catalog().await?;
            let app = state.worker_app();
            print_app("ComfyUI", &app.install(&catalog, reinstall).await?, &mut summary);
            if with_nodes {
                if let Some(results) = app.install_nodes(&catalog.custom_nodes, reinstall).await? {
                    results.iter().for_each(|r| print_phase(r, &mut summary));
                }
            }
        }
        Task::InstallNodes { reinstall } => {
            let catalog = state.catalog().await?;
            match state.worker_app().install_nodes(&catalog.custom_nodes, reinstall).await? {
                Some(results) => results.iter().for_each(|r| print_phase(r, &mut summary)),
                None => println!("{}", "Custom nodes already installed".yellow()),
            }
        }
        Task::RunPhase(phase) => {
            let catalog = state.catalog().await?;
            let result = state.dispatcher.run_phase(&catalog.custom_nodes, phase).await;
            print_phase(&result, &mut summary);
        }
        Task::Symlinks => {
            state.worker_app().make_symlinks().await?;
            println!("{}", "Shared links created".green());
        }
        Task::Boot { timeout } => {
            let timeout = timeout.unwrap_or(state.config.boot.timeout);
            match state.dispatcher.boot(timeout).await {
                Some(report) => print_boot(&report),
                None => println!("{}", "ComfyUI could not be started".red()),
            }
        }
        Task::LoadModels(set) => {
            let catalog = state.catalog().await?;
            for collection in load_models(&state.dispatcher, &catalog, set).await {
                print_items(&collection.name, &collection.items, &mut summary);
            }
        }
        Task::InstallLarge { labels } => {
            let catalog = state.catalog().await?;
            let selected = catalog.large_installs.with_labels(&labels);
            let reports = state.dispatcher.process_items(selected.items(), true).await;
            print_items("Large installs", &reports, &mut summary);
        }
        Task::InstallSecondary { reinstall } => {
            let catalog = state.catalog().await?;
            let outcome = state.secondary_app().install(&catalog, reinstall).await?;
            print_app("Automatic1111", &outcome, &mut summary);
        }
        Task::InstallFfmpeg { reinstall } => {
            let catalog = state.catalog().await?;
            let outcome = install_ffmpeg(&state.config, state.fetcher.clone(), &catalog, reinstall).await?;
            print_app("FFmpeg", &outcome, &mut summary);
        }
        Task::FixCuda { max_attempts } => {
            let interpreter = state.config.interpreter_path();
            match cuda::fix_cuda(&interpreter, state.config.use_gpu, max_attempts).await? {
                None => println!("{}", "GPU mode is off, nothing to fix".yellow()),
                Some(FixOutcome::AlreadyCompatible) => println!("{}", "CUDA 11.8 runtime already installed".green()),
                Some(FixOutcome::Fixed(n)) => println!("{} after {} attempt(s)", "CUDA runtime fixed".green(), n),
                Some(FixOutcome::GaveUp(n)) => {
                    error!("CUDA runtime still incompatible after {} attempts", n);
                    println!("{} after {} attempt(s)", "CUDA runtime still incompatible".red(), n);
                    summary.failed += 1;
                }
            }
        }
    }

    if summary != RunSummary::default() {
        println!(
            "\n{} installed, {} already present, {} skipped, {} failed",
            summary.installed.to_string().green(),
            summary.already_installed.to_string().cyan(),
            summary.skipped.to_string().yellow(),
            summary.failed.to_string().red(),
        );
    }
    Ok(summary)
}

/// Create the install root and the shared data tree, then persist preferences
async fn prepare(state: &AppState) -> Result<(), InstallerError> {
    let config = &state.config;
    Dir::new(&config.install_root).create().await?;
    config.data_layout().setup().await?;

    let prefs: Preferences = config.to_preferences();
    prefs.save(&state.layout.prefs_file()).await?;

    println!("GenAI Path: {}", config.install_root.display().to_string().yellow());
    println!("GenAI Data Path: {}", config.data_root.display().to_string().yellow());
    println!("NVidia GPU Enabled: {}", config.use_gpu);
    Ok(())
}

fn print_app(name: &str, outcome: &AppOutcome, summary: &mut RunSummary) {
    match outcome {
        AppOutcome::AlreadyInstalled => {
            println!("{} {}", name.yellow(), "already installed (use --reinstall to replace it)");
        }
        AppOutcome::Installed(reports) => {
            println!("Install complete: {}", name.yellow());
            if !reports.is_empty() {
                print_items(name, reports, summary);
            }
        }
    }
}

fn print_phase(result: &PhaseResult, summary: &mut RunSummary) {
    print_items(&format!("Phase {}", result.phase), &result.items, summary);
    if let Some(report) = &result.boot {
        print_boot(report);
    }
}

fn print_boot(report: &RunReport) {
    let outcome = match report.outcome {
        RunOutcome::Ready => "ready".green(),
        RunOutcome::TimedOut => "timed out".red(),
        RunOutcome::Exited => "exited".yellow(),
    };
    println!("ComfyUI run: {} after {}s", outcome, report.ticks);
}

fn print_items(title: &str, reports: &[ItemReport], summary: &mut RunSummary) {
    println!("\n{}", title.cyan().bold());
    for report in reports {
        let status = match &report.status {
            ItemStatus::Installed => "installed".green(),
            ItemStatus::AlreadyInstalled => "already installed".cyan(),
            ItemStatus::Skipped(reason) => format!("skipped: {}", reason).yellow(),
            ItemStatus::Failed(reason) => format!("failed: {}", reason).red(),
        };
        println!("  {} {}", report.label, status);
    }
    summary.add(reports);
}
