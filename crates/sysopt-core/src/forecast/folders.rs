//! Large-directory ranking for forecast recommendations

use crate::fsutil::directory_size;
use crate::models::{round_to, GrowingDirectory, BYTES_PER_GB};
use std::path::{Path, PathBuf};

/// Path fragments that mark a directory as usually safe to clean
const SAFE_TO_CLEAN: [&str; 4] = ["temp", "tmp", "cache", "downloads"];

/// How large directories are found and ranked
#[derive(Debug, Clone)]
pub struct FolderRanking {
    pub candidates: Vec<PathBuf>,
    pub max_depth: usize,
    pub threshold_gb: f64,
    pub top: usize,
}

impl FolderRanking {
    /// User download, document and cache folders plus temp directories
    pub fn platform_default(max_depth: usize, threshold_gb: f64, top: usize) -> Self {
        Self {
            candidates: default_candidates(),
            max_depth,
            threshold_gb,
            top,
        }
    }

    /// Existing candidates larger than the threshold, largest first
    pub fn rank(&self) -> Vec<GrowingDirectory> {
        let threshold_bytes = self.threshold_gb * BYTES_PER_GB;
        let mut sized: Vec<(&PathBuf, u64)> = self
            .candidates
            .iter()
            .filter(|path| path.is_dir())
            .map(|path| (path, directory_size(path, self.max_depth)))
            .filter(|(_, bytes)| *bytes as f64 > threshold_bytes)
            .collect();

        sized.sort_by(|a, b| b.1.cmp(&a.1));
        sized
            .into_iter()
            .take(self.top)
            .map(|(path, bytes)| GrowingDirectory {
                path: path.clone(),
                size_gb: round_to(bytes as f64 / BYTES_PER_GB, 2),
                safe_to_clean: is_safe_to_clean(path),
            })
            .collect()
    }
}

/// Heuristic only: true if the path mentions a temp, cache or downloads folder
pub fn is_safe_to_clean(path: &Path) -> bool {
    let lower = path.to_string_lossy().to_lowercase();
    SAFE_TO_CLEAN.iter().any(|marker| lower.contains(marker))
}

#[cfg(windows)]
fn default_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(profile) = std::env::var_os("USERPROFILE").map(PathBuf::from) {
        paths.extend(["Downloads", "Documents", "Videos"].map(|d| profile.join(d)));
    }
    if let Some(local) = dirs_next::data_local_dir() {
        paths.push(local.join("Temp"));
    }
    paths.push(PathBuf::from("C:\\Windows\\Temp"));
    paths
}

#[cfg(not(windows))]
fn default_candidates() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(home) = dirs_next::home_dir() {
        paths.push(home.join("Downloads"));
        paths.push(home.join("Documents"));
    }
    if let Some(cache) = dirs_next::cache_dir() {
        paths.push(cache);
    }
    paths.push(PathBuf::from("/tmp"));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_safe_to_clean_heuristic() {
        assert!(is_safe_to_clean(Path::new("/home/u/Downloads")));
        assert!(is_safe_to_clean(Path::new("/home/u/.cache")));
        assert!(is_safe_to_clean(Path::new("C:\\Windows\\Temp")));
        assert!(is_safe_to_clean(Path::new("/tmp")));
        assert!(!is_safe_to_clean(Path::new("/home/u/Documents")));
    }

    #[test]
    fn test_rank_filters_sorts_and_truncates() {
        let dir = TempDir::new().unwrap();
        let sizes = [("small", 10usize), ("big_cache", 300), ("mid", 200), ("huge", 400)];
        for (name, bytes) in sizes {
            let path = dir.path().join(name);
            fs::create_dir(&path).unwrap();
            fs::write(path.join("blob"), vec![0u8; bytes]).unwrap();
        }

        let ranking = FolderRanking {
            candidates: sizes
                .iter()
                .map(|(name, _)| dir.path().join(name))
                .chain([dir.path().join("missing")])
                .collect(),
            max_depth: 4,
            // 100 bytes expressed in GB
            threshold_gb: 100.0 / BYTES_PER_GB,
            top: 2,
        };

        let ranked = ranking.rank();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].path, dir.path().join("huge"));
        assert_eq!(ranked[1].path, dir.path().join("big_cache"));
        assert!(ranked[1].safe_to_clean);
    }
}
