//! Shelled-out command helpers

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::errors::InstallerError;

fn command<P, I, S>(program: P, args: I, cwd: Option<&Path>) -> Command
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut cmd = Command::new(program);
    cmd.args(args);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd
}

fn describe(program: &OsStr) -> String {
    Path::new(program).display().to_string()
}

/// Run a command to completion, failing on a non-zero exit status
pub async fn run<P, I, S>(program: P, args: I, cwd: Option<&Path>) -> Result<(), InstallerError>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = describe(program.as_ref());
    debug!("Running {}", name);

    let status = command(program, args, cwd)
        .status()
        .await
        .map_err(|e| InstallerError::ProcessError(format!("Failed to run {}: {}", name, e)))?;

    if !status.success() {
        return Err(InstallerError::ProcessError(format!(
            "{} exited with {}",
            name, status
        )));
    }
    Ok(())
}

/// Run a command and capture its trimmed standard output
pub async fn output<P, I, S>(program: P, args: I, cwd: Option<&Path>) -> Result<String, InstallerError>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = describe(program.as_ref());
    let out = command(program, args, cwd)
        .stderr(Stdio::null())
        .output()
        .await
        .map_err(|e| InstallerError::ProcessError(format!("Failed to run {}: {}", name, e)))?;

    if !out.status.success() {
        return Err(InstallerError::ProcessError(format!(
            "{} exited with {}",
            name, out.status
        )));
    }
    Ok(String::from_utf8_lossy(&out.stdout).trim().to_string())
}

/// Run a command with `input` written to its standard input, then closed
pub async fn run_with_input<P, I, S>(
    program: P,
    args: I,
    cwd: Option<&Path>,
    input: &str,
) -> Result<(), InstallerError>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let name = describe(program.as_ref());
    let mut child = command(program, args, cwd)
        .stdin(Stdio::piped())
        .spawn()
        .map_err(|e| InstallerError::ProcessError(format!("Failed to run {}: {}", name, e)))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(input.as_bytes()).await?;
        stdin.shutdown().await?;
    }

    let status = child.wait().await?;
    if !status.success() {
        return Err(InstallerError::ProcessError(format!(
            "{} exited with {}",
            name, status
        )));
    }
    Ok(())
}

/// Whether a program can be launched and exits successfully
pub async fn probe(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_program_is_not_available() {
        assert!(!probe("definitely-not-a-real-binary-3f9a", &[]).await);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_process_error() {
        let err = run("sh", ["-c", "exit 3"], None).await.unwrap_err();
        assert!(matches!(err, InstallerError::ProcessError(_)));
    }

    #[tokio::test]
    async fn test_output_and_input() {
        assert_eq!(output("sh", ["-c", "echo  hi "], None).await.unwrap(), "hi");
        run_with_input("sh", ["-c", "read a; test \"$a\" = yes"], None, "yes\n")
            .await
            .unwrap();
    }
}
