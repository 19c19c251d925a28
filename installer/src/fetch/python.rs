//! Package installs for the embedded interpreter

use std::path::Path;

use tracing::{debug, info};

use crate::errors::InstallerError;
use crate::exec;

/// `<interpreter> -s -m pip install -r requirements.txt` inside `repo`
///
/// A repository without a requirements file has nothing to install.
pub async fn install_requirements(interpreter: &Path, repo: &Path) -> Result<(), InstallerError> {
    if !repo.join("requirements.txt").exists() {
        debug!("No requirements.txt in {}", repo.display());
        return Ok(());
    }

    info!("Installing requirements for {}", repo.display());
    exec::run(
        interpreter,
        ["-s", "-m", "pip", "install", "-r", "requirements.txt"],
        Some(repo),
    )
    .await
}

/// `<interpreter> -s -m pip install <args>`
pub async fn pip_install(interpreter: &Path, args: &[&str]) -> Result<(), InstallerError> {
    info!("pip install {}", args.join(" "));
    let mut full = vec!["-s", "-m", "pip", "install"];
    full.extend_from_slice(args);
    exec::run(interpreter, full, None).await
}
