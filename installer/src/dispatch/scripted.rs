//! Scripted interactive installs
//!
//! Drives a child's input from prompts seen in its output, using the same
//! scanner as the supervisor.

use std::collections::VecDeque;
use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::errors::InstallerError;
use crate::supervisor::scanner::LineScanner;

#[cfg(windows)]
const LINE_END: &str = "\r\n";

#[cfg(not(windows))]
const LINE_END: &str = "\n";

/// What a prompt is answered with
#[derive(Debug, Clone)]
pub enum Reply {
    /// Same answer every time
    Always(String),

    /// Next answer from a fixed, ordered list; nothing once exhausted
    Sequence(VecDeque<String>),
}

#[derive(Debug, Clone)]
struct PromptRule {
    pattern: String,
    reply: Reply,
}

/// Canned responses keyed by prompt substrings
#[derive(Debug, Clone, Default)]
pub struct PromptScript {
    rules: Vec<PromptRule>,
}

impl PromptScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every prompt containing `pattern` with `reply`
    pub fn always(mut self, pattern: &str, reply: &str) -> Self {
        self.rules.push(PromptRule {
            pattern: pattern.to_string(),
            reply: Reply::Always(reply.to_string()),
        });
        self
    }

    /// Answer successive prompts containing `pattern` with `replies`, in order
    pub fn sequence<I, S>(mut self, pattern: &str, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rules.push(PromptRule {
            pattern: pattern.to_string(),
            reply: Reply::Sequence(replies.into_iter().map(Into::into).collect()),
        });
        self
    }

    /// Reply for `text`, from the first rule whose pattern it contains
    pub fn answer(&mut self, text: &str) -> Option<String> {
        let rule = self.rules.iter_mut().find(|r| text.contains(&r.pattern))?;
        match &mut rule.reply {
            Reply::Always(reply) => Some(reply.clone()),
            Reply::Sequence(replies) => {
                let reply = replies.pop_front();
                if reply.is_none() {
                    warn!("No canned response left for prompt: {}", text.trim());
                }
                reply
            }
        }
    }
}

/// Answer prompts from `reader` into `writer` until the output ends
///
/// Returns the number of answers written.
pub async fn drive<R, W>(mut reader: R, mut writer: W, script: &mut PromptScript) -> Result<usize, InstallerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut scanner = LineScanner::new();
    let mut buf = vec![0u8; 4096];
    let mut answered = 0;

    loop {
        let read = reader.read(&mut buf).await?;
        if read == 0 {
            break;
        }

        let mut replies: Vec<String> = scanner
            .push(&buf[..read])
            .iter()
            .inspect(|line| debug!("> {}", line))
            .filter_map(|line| script.answer(line))
            .collect();

        if let Some(reply) = script.answer(scanner.pending()) {
            scanner.clear_pending();
            replies.push(reply);
        }

        for reply in replies {
            debug!("< {}", reply);
            writer.write_all(format!("{}{}", reply, LINE_END).as_bytes()).await?;
            writer.flush().await?;
            answered += 1;
        }
    }

    Ok(answered)
}

/// Run `program` answering its prompts from `script`
pub async fn run_scripted(
    program: &Path,
    args: &[&str],
    cwd: &Path,
    mut script: PromptScript,
) -> Result<(), InstallerError> {
    info!("Running {} non-interactively", program.display());
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| InstallerError::ProcessError(format!("Failed to run {}: {}", program.display(), e)))?;

    let (Some(stdout), Some(stdin)) = (child.stdout.take(), child.stdin.take()) else {
        return Err(InstallerError::Internal("child pipes not captured".to_string()));
    };

    let answered = drive(stdout, stdin, &mut script).await?;
    let status = child.wait().await?;
    debug!("{} answered {} prompts", program.display(), answered);

    if !status.success() {
        return Err(InstallerError::ProcessError(format!(
            "{} exited with {}",
            program.display(),
            status
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> PromptScript {
        PromptScript::new()
            .always("then press enter", "")
            .sequence("(default = [r]", ["r", "0"])
    }

    #[test]
    fn test_sequence_exhausts() {
        let mut s = script();
        assert_eq!(s.answer("Select (default = [r]").as_deref(), Some("r"));
        assert_eq!(s.answer("Select (default = [r]").as_deref(), Some("0"));
        assert_eq!(s.answer("Select (default = [r]"), None);
        assert_eq!(s.answer("Read this then press enter").as_deref(), Some(""));
        assert_eq!(s.answer("unrelated"), None);
    }

    #[tokio::test]
    async fn test_drive_answers_lines_and_partial_prompt() {
        let output: &[u8] = b"Welcome, then press enter\nPick (default = [r]\nPick (default = [r]\nlast then press enter";
        let mut written: Vec<u8> = Vec::new();
        let mut s = script();

        let answered = drive(output, &mut written, &mut s).await.unwrap();
        assert_eq!(answered, 4);
        let expected = ["", "r", "0", ""].map(|r| format!("{}{}", r, LINE_END)).concat();
        assert_eq!(String::from_utf8(written).unwrap(), expected);
    }
}
