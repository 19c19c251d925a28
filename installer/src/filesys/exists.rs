//! Read-only presence checks used to short-circuit installs

use std::path::{Path, PathBuf};

use tokio::fs;

/// Whether names on this platform's default filesystem compare case-insensitively
pub const CASE_INSENSITIVE: bool = cfg!(any(windows, target_os = "macos"));

/// Whether anything exists at `path`
pub async fn path_exists(path: &Path) -> bool {
    fs::metadata(path).await.is_ok()
}

fn name_contains(name: &str, term: &str) -> bool {
    if CASE_INSENSITIVE {
        name.to_lowercase().contains(&term.to_lowercase())
    } else {
        name.contains(term)
    }
}

/// Entries of `dir` whose name contains `term`
///
/// A missing or unreadable directory has no matches.
pub async fn search_for(dir: &Path, term: &str) -> Vec<PathBuf> {
    let mut matches = Vec::new();
    let Ok(mut entries) = fs::read_dir(dir).await else {
        return matches;
    };

    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name();
        if name_contains(&name.to_string_lossy(), term) {
            matches.push(entry.path());
        }
    }

    matches.sort();
    matches
}

/// Whether `dir` holds at least one entry whose name contains `term`
pub async fn contains_match(dir: &Path, term: &str) -> bool {
    !search_for(dir, term).await.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_for_substring() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("sd_xl_base_1.0")).unwrap();
        std::fs::create_dir(tmp.path().join("sd_xl_refiner_1.0")).unwrap();
        std::fs::write(tmp.path().join("notes.txt"), b"").unwrap();

        let found = search_for(tmp.path(), "sd_xl").await;
        assert_eq!(found.len(), 2);
        assert!(found[0].ends_with("sd_xl_base_1.0"));
        assert!(contains_match(tmp.path(), "notes").await);
        assert!(!contains_match(tmp.path(), "ffmpeg").await);
    }

    #[tokio::test]
    async fn test_missing_directory_has_no_matches() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(search_for(&tmp.path().join("absent"), "x").await.is_empty());
        assert!(!path_exists(&tmp.path().join("absent")).await);
        assert!(path_exists(tmp.path()).await);
    }

    #[tokio::test]
    async fn test_case_follows_platform() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("FFmpeg-6.1-full_build")).unwrap();
        assert_eq!(contains_match(tmp.path(), "ffmpeg").await, CASE_INSENSITIVE);
    }
}
