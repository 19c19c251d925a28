//! Child output scanning
//!
//! Prompts are often printed without a trailing newline, so matching looks at
//! completed lines and at the pending partial line.

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// Splits a byte stream into lines while keeping the unterminated tail
#[derive(Debug, Default)]
pub struct LineScanner {
    pending: String,
}

impl LineScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk, returning the lines it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.push_str(&String::from_utf8_lossy(chunk));

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.find('\n') {
            let rest = self.pending.split_off(pos + 1);
            let line = std::mem::replace(&mut self.pending, rest);
            lines.push(line.trim_end_matches(['\r', '\n']).to_string());
        }
        lines
    }

    /// The unterminated tail
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Drop the tail once it has been answered
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }
}

/// First pattern contained in `text`
pub fn find_pattern<'a, S: AsRef<str>>(text: &str, patterns: &'a [S]) -> Option<&'a str> {
    patterns
        .iter()
        .map(|pattern| pattern.as_ref())
        .find(|pattern| text.contains(pattern))
}

/// Notification from the output watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// A readiness pattern appeared
    Ready(String),

    /// The stream closed or failed
    Stopped,
}

/// Watch `reader` until a pattern appears or the stream ends
///
/// Sends exactly one event. The first match wins.
pub async fn watch_output<R>(mut reader: R, patterns: Vec<String>, events: mpsc::Sender<WatchEvent>)
where
    R: AsyncRead + Unpin,
{
    let mut scanner = LineScanner::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                debug!("Output stream error: {}", e);
                break;
            }
        };

        let lines = scanner.push(&buf[..read]);
        for line in &lines {
            trace!("> {}", line);
        }

        let hit = lines
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(scanner.pending()))
            .find_map(|text| find_pattern(text, patterns.as_slice()));

        if let Some(pattern) = hit {
            let _ = events.send(WatchEvent::Ready(pattern.to_string())).await;
            return;
        }
    }

    let _ = events.send(WatchEvent::Stopped).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_and_partial() {
        let mut scanner = LineScanner::new();
        assert_eq!(scanner.push(b"Starting server\r\nTo see the"), vec!["Starting server"]);
        assert_eq!(scanner.pending(), "To see the");
        assert_eq!(scanner.push(b" GUI go to: http://127.0.0.1\n"), vec!["To see the GUI go to: http://127.0.0.1"]);
        assert_eq!(scanner.pending(), "");
    }

    #[test]
    fn test_find_pattern_first_listed() {
        let patterns = ["see the GUI", "any key to continue"];
        assert_eq!(find_pattern("Press any key to continue . . .", &patterns), Some("any key to continue"));
        assert_eq!(find_pattern("loading", &patterns), None);
    }

    #[tokio::test]
    async fn test_watch_matches_unterminated_prompt() {
        let (tx, mut rx) = mpsc::channel(1);
        let output: &[u8] = b"Install: (default = [r]";
        watch_output(output, vec!["(default = [r]".to_string()], tx).await;
        assert_eq!(rx.recv().await, Some(WatchEvent::Ready("(default = [r]".to_string())));
    }

    #[tokio::test]
    async fn test_watch_reports_stop_on_eof() {
        let (tx, mut rx) = mpsc::channel(1);
        let output: &[u8] = b"no match here\n";
        watch_output(output, vec!["ready".to_string()], tx).await;
        assert_eq!(rx.recv().await, Some(WatchEvent::Stopped));
    }
}
