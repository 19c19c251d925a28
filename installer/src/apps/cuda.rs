//! CUDA runtime repair for the embedded interpreter

use std::future::Future;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::errors::InstallerError;
use crate::exec;
use crate::fetch::python::pip_install;

/// CUDA build the ONNX runtime is compatible with
pub const REQUIRED_CUDA: &str = "11.8";

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

const TORCH_PACKAGES: [&str; 3] = [
    "torch==2.1.1+cu118",
    "torchvision==0.16.1+cu118",
    "torchaudio==2.1.1+cu118",
];

const TORCH_WHEEL_INDEX: &str = "https://download.pytorch.org/whl/torch_stable.html";

const TORCH_PROBE: &str = "import torch; print(torch.__version__); print(torch.version.cuda)";

/// How a bounded repair ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "attempts")]
pub enum FixOutcome {
    /// The first check passed, nothing was changed
    AlreadyCompatible,

    /// A check passed after this many fixes
    Fixed(u32),

    /// Still failing after this many fixes
    GaveUp(u32),
}

/// Check, fix, re-check, at most `max_attempts` fixes
pub async fn bounded_fix<C, CF, F, FF>(
    max_attempts: u32,
    mut check: C,
    mut fix: F,
) -> Result<FixOutcome, InstallerError>
where
    C: FnMut() -> CF,
    CF: Future<Output = Result<bool, InstallerError>>,
    F: FnMut() -> FF,
    FF: Future<Output = Result<(), InstallerError>>,
{
    let mut attempts = 0;
    loop {
        if check().await? {
            return Ok(match attempts {
                0 => FixOutcome::AlreadyCompatible,
                n => FixOutcome::Fixed(n),
            });
        }
        if attempts >= max_attempts {
            return Ok(FixOutcome::GaveUp(attempts));
        }
        attempts += 1;
        info!("Fixing CUDA runtime, attempt {}/{}", attempts, max_attempts);
        fix().await?;
    }
}

/// Torch version report of the interpreter carries the required CUDA build
pub fn is_compatible(probe_output: &str) -> bool {
    probe_output.lines().any(|line| line.trim() == REQUIRED_CUDA)
}

pub async fn cuda_compatible(interpreter: &Path) -> Result<bool, InstallerError> {
    let report = exec::output(interpreter, ["-c", TORCH_PROBE], None).await?;
    info!("Torch reports: {}", report.replace('\n', ", "));
    Ok(is_compatible(&report))
}

/// Replace torch with the CUDA 11.8 builds and add the GPU ONNX runtime
pub async fn reinstall_torch(interpreter: &Path) -> Result<(), InstallerError> {
    exec::run(
        interpreter,
        ["-s", "-m", "pip", "uninstall", "torch", "torchvision", "torchaudio", "-y"],
        None,
    )
    .await?;

    let mut args = TORCH_PACKAGES.to_vec();
    args.extend(["-f", TORCH_WHEEL_INDEX]);
    pip_install(interpreter, &args).await?;
    pip_install(interpreter, &["onnxruntime-gpu"]).await
}

pub async fn fix_cuda(interpreter: &Path, use_gpu: bool, max_attempts: u32) -> Result<Option<FixOutcome>, InstallerError> {
    if !use_gpu {
        info!("Non-NVIDIA install, skipping the CUDA check");
        return Ok(None);
    }

    let outcome = bounded_fix(
        max_attempts,
        || cuda_compatible(interpreter),
        || reinstall_torch(interpreter),
    )
    .await?;

    if let FixOutcome::GaveUp(n) = outcome {
        warn!("CUDA {} still not available after {} attempts", REQUIRED_CUDA, n);
    }
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_probe_output() {
        assert!(is_compatible("2.1.1+cu118\n11.8"));
        assert!(!is_compatible("2.1.2+cu121\n12.1"));
        assert!(!is_compatible("2.1.1+cpu\nNone"));
    }

    #[tokio::test]
    async fn test_passes_after_two_fixes() {
        let checks = Cell::new(0);
        let fixes = Cell::new(0);

        let outcome = bounded_fix(
            3,
            || {
                checks.set(checks.get() + 1);
                let ok = fixes.get() >= 2;
                async move { Ok::<_, InstallerError>(ok) }
            },
            || {
                fixes.set(fixes.get() + 1);
                async { Ok::<_, InstallerError>(()) }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, FixOutcome::Fixed(2));
        assert_eq!(checks.get(), 3);
        assert_eq!(fixes.get(), 2);
    }

    #[tokio::test]
    async fn test_gives_up_at_the_bound() {
        let fixes = Cell::new(0);

        let outcome = bounded_fix(
            3,
            || async { Ok::<_, InstallerError>(false) },
            || {
                fixes.set(fixes.get() + 1);
                async { Ok::<_, InstallerError>(()) }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome, FixOutcome::GaveUp(3));
        assert_eq!(fixes.get(), 3);
    }

    #[tokio::test]
    async fn test_compatible_runs_no_fix() {
        let outcome = bounded_fix(3, || async { Ok::<_, InstallerError>(true) }, || async {
            Err(InstallerError::Internal("fix should not run".to_string()))
        })
        .await
        .unwrap();
        assert_eq!(outcome, FixOutcome::AlreadyCompatible);
    }
}
