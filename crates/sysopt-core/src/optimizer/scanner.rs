//! Read-only analysis pass
//!
//! Walks the candidate locations and turns everything that crosses an age,
//! size or pressure threshold into an [`OptimizationAction`]. Only `stat`
//! and directory listing calls are made here.

use crate::config::CoreConfig;
use crate::fsutil::directory_size;
use crate::models::{round_to, OptimizationAction, BYTES_PER_MB, MEMORY_OPTIMIZATION};
use crate::platform::HostProbe;
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

const SECS_PER_DAY: f64 = 24.0 * 60.0 * 60.0;

/// Depth limit when sizing a browser cache directory
const CACHE_SCAN_DEPTH: usize = 8;

/// A directory whose top-level old files are deletion candidates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLocation {
    pub path: PathBuf,
    pub category: String,
}

impl ScanLocation {
    pub fn new(path: impl Into<PathBuf>, category: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            category: category.into(),
        }
    }
}

/// A browser cache directory cleared as a whole once it is large enough
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserCache {
    pub path: PathBuf,
    pub browser: String,
}

impl BrowserCache {
    pub fn new(path: impl Into<PathBuf>, browser: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            browser: browser.into(),
        }
    }
}

/// Where analysis looks
#[derive(Debug, Clone, Default)]
pub struct ScanRoots {
    pub temp_locations: Vec<ScanLocation>,
    pub browser_caches: Vec<BrowserCache>,
}

impl ScanRoots {
    /// The system temp directory plus the platform's usual temp and cache dirs
    pub fn platform_default() -> Self {
        let mut roots = ScanRoots {
            temp_locations: vec![ScanLocation::new(std::env::temp_dir(), "Temporary Files")],
            browser_caches: Vec::new(),
        };
        let cache = dirs_next::cache_dir();

        if cfg!(windows) {
            if let Some(local) = &cache {
                roots
                    .temp_locations
                    .push(ScanLocation::new(local.join("Temp"), "Windows Temp Files"));
                roots.browser_caches.push(BrowserCache::new(
                    local.join("Google/Chrome/User Data/Default/Cache"),
                    "Chrome",
                ));
                roots.browser_caches.push(BrowserCache::new(
                    local.join("Microsoft/Edge/User Data/Default/Cache"),
                    "Edge",
                ));
            }
            roots
                .temp_locations
                .push(ScanLocation::new("C:\\Windows\\Temp", "Windows Temp Files"));
        } else if let Some(cache) = &cache {
            let category = if cfg!(target_os = "macos") {
                "macOS Cache"
            } else {
                "Linux Cache"
            };
            roots
                .temp_locations
                .push(ScanLocation::new(cache.clone(), category));

            if cfg!(target_os = "macos") {
                roots.browser_caches.push(BrowserCache::new(
                    cache.join("Google/Chrome/Default/Cache"),
                    "Chrome",
                ));
                roots
                    .browser_caches
                    .push(BrowserCache::new(cache.join("Firefox"), "Firefox"));
            } else {
                roots.browser_caches.push(BrowserCache::new(
                    cache.join("google-chrome/Default/Cache"),
                    "Chrome",
                ));
                roots.browser_caches.push(BrowserCache::new(
                    cache.join("chromium/Default/Cache"),
                    "Chromium",
                ));
                roots
                    .browser_caches
                    .push(BrowserCache::new(cache.join("mozilla/firefox"), "Firefox"));
            }
        }

        roots
    }
}

/// Thresholds and caps applied during analysis
#[derive(Debug, Clone)]
pub struct ScanLimits {
    pub min_age_days: u64,
    pub max_files: usize,
    pub max_files_per_directory: usize,
    pub browser_cache_threshold_bytes: u64,
    pub memory_pressure_percent: f32,
    pub scan_temp_files: bool,
    pub check_memory: bool,
    pub check_browser_caches: bool,
}

impl From<&CoreConfig> for ScanLimits {
    fn from(config: &CoreConfig) -> Self {
        Self {
            min_age_days: config.temp_file_age_days,
            max_files: config.max_scan_files,
            max_files_per_directory: config.max_files_per_directory,
            browser_cache_threshold_bytes: config.browser_cache_threshold_mb * 1024 * 1024,
            memory_pressure_percent: config.memory_pressure_percent,
            scan_temp_files: config.cleanup_temp_files,
            check_memory: config.memory_cleanup,
            check_browser_caches: config.browser_cache_cleanup,
        }
    }
}

/// Produces the actions for one analysis pass
#[derive(Debug, Clone)]
pub struct Scanner {
    roots: ScanRoots,
    limits: ScanLimits,
}

impl Scanner {
    pub fn new(roots: ScanRoots, limits: ScanLimits) -> Self {
        Self { roots, limits }
    }

    pub fn roots(&self) -> &ScanRoots {
        &self.roots
    }

    /// Run every enabled check as of `now`
    pub fn scan(&self, probe: &dyn HostProbe, now: SystemTime) -> Vec<OptimizationAction> {
        let mut actions = Vec::new();

        if self.limits.scan_temp_files {
            actions.extend(self.scan_temp_locations(now));
        }
        if self.limits.check_memory {
            actions.extend(self.check_memory(probe));
        }
        if self.limits.check_browser_caches {
            actions.extend(self.check_browser_caches());
        }

        actions
    }

    fn scan_temp_locations(&self, now: SystemTime) -> Vec<OptimizationAction> {
        let mut seen = HashSet::new();
        let mut actions = Vec::new();

        for location in &self.roots.temp_locations {
            if !seen.insert(location.path.clone()) {
                continue;
            }
            actions.extend(self.scan_old_files(location, now));
            if actions.len() >= self.limits.max_files {
                break;
            }
        }

        actions.truncate(self.limits.max_files);
        actions
    }

    /// Top-level regular files in one location older than the age threshold
    fn scan_old_files(&self, location: &ScanLocation, now: SystemTime) -> Vec<OptimizationAction> {
        let entries = match fs::read_dir(&location.path) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %location.path.display(), error = %e, "Skipping unreadable scan location");
                return Vec::new();
            }
        };

        let mut files: Vec<_> = entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .collect();
        files.sort_by_key(|entry| entry.file_name());

        let threshold = self.limits.min_age_days;
        files
            .into_iter()
            .filter_map(|entry| {
                let meta = entry.metadata().ok()?;
                let modified = meta.modified().ok()?;
                let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
                let age_days = age.as_secs_f64() / SECS_PER_DAY;
                if age_days <= threshold as f64 {
                    return None;
                }

                Some(OptimizationAction {
                    category: location.category.clone(),
                    description: format!(
                        "Delete old file: {}",
                        entry.file_name().to_string_lossy()
                    ),
                    target: Some(entry.path()),
                    size_bytes: meta.len(),
                    safe_to_delete: true,
                    reason: format!(
                        "File is {} days old (threshold {} days)",
                        age_days as u64, threshold
                    ),
                })
            })
            .take(self.limits.max_files_per_directory)
            .collect()
    }

    fn check_memory(&self, probe: &dyn HostProbe) -> Option<OptimizationAction> {
        let percent = match probe.memory_percent() {
            Ok(percent) => percent,
            Err(e) => {
                debug!(error = %e, "Memory usage unavailable, skipping memory check");
                return None;
            }
        };
        if percent <= self.limits.memory_pressure_percent {
            return None;
        }

        Some(OptimizationAction {
            category: MEMORY_OPTIMIZATION.to_string(),
            description: "Clear system cache and free unused RAM".to_string(),
            target: None,
            size_bytes: 0,
            safe_to_delete: true,
            reason: format!(
                "Memory usage at {:.1}% (threshold {:.0}%)",
                percent, self.limits.memory_pressure_percent
            ),
        })
    }

    fn check_browser_caches(&self) -> Vec<OptimizationAction> {
        self.roots
            .browser_caches
            .iter()
            .filter(|cache| cache.path.is_dir())
            .filter_map(|cache| {
                let size = directory_size(&cache.path, CACHE_SCAN_DEPTH);
                if size <= self.limits.browser_cache_threshold_bytes {
                    return None;
                }

                Some(OptimizationAction {
                    category: "Browser Cache".to_string(),
                    description: format!("Clear {} cache", cache.browser),
                    target: Some(cache.path.clone()),
                    size_bytes: size,
                    safe_to_delete: true,
                    reason: format!(
                        "Cache size: {}MB (threshold {}MB)",
                        round_to(size as f64 / BYTES_PER_MB, 1),
                        self.limits.browser_cache_threshold_bytes / (1024 * 1024)
                    ),
                })
            })
            .collect()
    }
}

/// True when `path` sits inside one of the scanned locations
///
/// Paths containing `..` are never accepted. The parent directory is resolved
/// on disk so a symlinked directory inside a root cannot point the target
/// elsewhere; the final component itself is not followed.
pub fn is_scanned_path(roots: &ScanRoots, path: &Path) -> bool {
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return false;
    }
    let target = resolve_parent(path).unwrap_or_else(|| path.to_path_buf());

    roots
        .temp_locations
        .iter()
        .map(|location| location.path.as_path())
        .chain(roots.browser_caches.iter().map(|cache| cache.path.as_path()))
        .any(|root| root_forms(root).iter().any(|form| target.starts_with(form)))
}

/// `path` with its parent canonicalized, or `None` when the parent is missing
fn resolve_parent(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?;
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty())?;
    fs::canonicalize(parent).ok().map(|dir| dir.join(name))
}

fn root_forms(root: &Path) -> Vec<PathBuf> {
    if root.components().any(|c| matches!(c, Component::ParentDir)) {
        return Vec::new();
    }
    let mut forms = vec![root.to_path_buf()];
    forms.extend(fs::canonicalize(root).ok());
    forms.extend(resolve_parent(root));
    forms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeProbe;
    use std::fs::File;
    use tempfile::TempDir;

    fn write_aged(dir: &Path, name: &str, bytes: usize, age_days: u64, now: SystemTime) {
        let path = dir.join(name);
        fs::write(&path, vec![0u8; bytes]).unwrap();
        let mtime = now - Duration::from_secs(age_days * 24 * 60 * 60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    fn limits() -> ScanLimits {
        ScanLimits::from(&CoreConfig::default())
    }

    fn temp_only(dir: &Path) -> ScanRoots {
        ScanRoots {
            temp_locations: vec![ScanLocation::new(dir, "Temporary Files")],
            browser_caches: vec![],
        }
    }

    #[test]
    fn test_only_files_older_than_threshold_selected() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        write_aged(dir.path(), "old.log", 100, 10, now);
        write_aged(dir.path(), "fresh.log", 100, 1, now);
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let scanner = Scanner::new(temp_only(dir.path()), limits());
        let actions = scanner.scan(&FakeProbe::new(), now);

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].target.as_deref(), Some(dir.path().join("old.log").as_path()));
        assert_eq!(actions[0].size_bytes, 100);
        assert!(actions[0].reason.contains("10 days old"));
    }

    #[test]
    fn test_per_directory_and_global_caps() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        let c = TempDir::new().unwrap();
        let now = SystemTime::now();
        for dir in [&a, &b, &c] {
            for i in 0..60 {
                write_aged(dir.path(), &format!("f{:03}", i), 1, 30, now);
            }
        }

        let roots = ScanRoots {
            temp_locations: vec![
                ScanLocation::new(a.path(), "A"),
                ScanLocation::new(b.path(), "B"),
                ScanLocation::new(c.path(), "C"),
            ],
            browser_caches: vec![],
        };
        let actions = Scanner::new(roots, limits()).scan(&FakeProbe::new(), now);

        assert_eq!(actions.len(), 100);
        assert_eq!(actions.iter().filter(|a| a.category == "A").count(), 50);
        assert_eq!(actions.iter().filter(|a| a.category == "B").count(), 50);
        assert_eq!(actions.iter().filter(|a| a.category == "C").count(), 0);
    }

    #[test]
    fn test_duplicate_locations_scanned_once() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        write_aged(dir.path(), "old", 1, 30, now);

        let roots = ScanRoots {
            temp_locations: vec![
                ScanLocation::new(dir.path(), "Temporary Files"),
                ScanLocation::new(dir.path(), "Windows Temp Files"),
            ],
            browser_caches: vec![],
        };
        let actions = Scanner::new(roots, limits()).scan(&FakeProbe::new(), now);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_memory_pressure_triggers_action() {
        let scanner = Scanner::new(ScanRoots::default(), limits());

        let calm = scanner.scan(&FakeProbe::with_memory(70.0), SystemTime::now());
        assert!(calm.is_empty());

        let pressured = scanner.scan(&FakeProbe::with_memory(85.5), SystemTime::now());
        assert_eq!(pressured.len(), 1);
        assert_eq!(pressured[0].category, MEMORY_OPTIMIZATION);
        assert!(pressured[0].target.is_none());
        assert!(pressured[0].reason.contains("85.5%"));
    }

    #[test]
    fn test_browser_cache_size_threshold() {
        let dir = TempDir::new().unwrap();
        let small = dir.path().join("small");
        let large = dir.path().join("large");
        fs::create_dir_all(small.join("data")).unwrap();
        fs::create_dir_all(large.join("data")).unwrap();
        fs::write(small.join("data/blob"), vec![0u8; 512]).unwrap();
        fs::write(large.join("data/blob"), vec![0u8; 4096]).unwrap();

        let roots = ScanRoots {
            temp_locations: vec![],
            browser_caches: vec![
                BrowserCache::new(&small, "Small"),
                BrowserCache::new(&large, "Large"),
                BrowserCache::new(dir.path().join("missing"), "Missing"),
            ],
        };
        let limits = ScanLimits {
            browser_cache_threshold_bytes: 1024,
            ..limits()
        };
        let actions = Scanner::new(roots.clone(), limits).scan(&FakeProbe::new(), SystemTime::now());

        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].category, "Browser Cache");
        assert_eq!(actions[0].description, "Clear Large cache");
        assert_eq!(actions[0].size_bytes, 4096);
        assert!(is_scanned_path(&roots, &large.join("data/blob")));
    }

    #[test]
    fn test_scanned_path_rejects_parent_components() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        let roots = ScanRoots {
            temp_locations: vec![ScanLocation::new(&cache, "Temporary Files")],
            browser_caches: vec![],
        };

        assert!(is_scanned_path(&roots, &cache.join("entry")));
        assert!(is_scanned_path(&roots, &cache));
        assert!(!is_scanned_path(&roots, &cache.join("../cache/entry")));
        assert!(!is_scanned_path(&roots, &cache.join("../other")));
        assert!(!is_scanned_path(&roots, &dir.path().join("other")));
    }

    #[test]
    fn test_disabled_checks_are_skipped() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        write_aged(dir.path(), "old", 1, 30, now);

        let limits = ScanLimits {
            scan_temp_files: false,
            check_memory: false,
            ..limits()
        };
        let actions = Scanner::new(temp_only(dir.path()), limits).scan(&FakeProbe::with_memory(99.0), now);
        assert!(actions.is_empty());
    }
}
