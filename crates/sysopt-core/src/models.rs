//! Core data records exchanged between the subsystems and their consumers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Category tag used for memory reclamation actions
pub const MEMORY_OPTIMIZATION: &str = "Memory Optimization";

/// Round to a fixed number of decimal places
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Disk usage of a single monitored volume at sampling time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeUsage {
    pub mount_point: PathBuf,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub percent_used: f32,
}

impl VolumeUsage {
    pub fn new(mount_point: PathBuf, total_bytes: u64, free_bytes: u64) -> Self {
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        let percent_used = if total_bytes > 0 {
            (used_bytes as f64 / total_bytes as f64 * 100.0) as f32
        } else {
            0.0
        };

        Self {
            mount_point,
            total_bytes,
            used_bytes,
            free_bytes,
            percent_used,
        }
    }
}

/// One sampled host observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub cpu_per_core: Vec<f32>,
    pub memory_percent: f32,
    pub memory_used_bytes: u64,
    pub memory_available_bytes: u64,
    pub volumes: Vec<VolumeUsage>,
    pub net_sent_bytes: u64,
    pub net_recv_bytes: u64,
    pub process_count: usize,
}

impl Metric {
    /// Usage of the first monitored volume, which feeds the disk history
    pub fn primary_disk_percent(&self) -> f32 {
        self.volumes.first().map(|v| v.percent_used).unwrap_or(0.0)
    }
}

/// Host facts that do not change while the process runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticInfo {
    pub logical_cores: usize,
    pub physical_cores: Option<usize>,
    pub total_memory_bytes: u64,
    pub boot_time: DateTime<Utc>,
}

impl StaticInfo {
    pub fn total_memory_gb(&self) -> f64 {
        round_to(self.total_memory_bytes as f64 / BYTES_PER_GB, 2)
    }
}

/// Cumulative network counters at one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkPoint {
    pub sent_bytes: u64,
    pub recv_bytes: u64,
}

/// Copy of the rolling history windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub cpu: Vec<f32>,
    pub memory: Vec<f32>,
    pub disk: Vec<f32>,
    pub network: Vec<NetworkPoint>,
}

/// A single proposed effect produced by analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationAction {
    pub category: String,
    pub description: String,
    pub target: Option<PathBuf>,
    pub size_bytes: u64,
    pub safe_to_delete: bool,
    pub reason: String,
}

impl OptimizationAction {
    pub fn is_memory_action(&self) -> bool {
        self.category == MEMORY_OPTIMIZATION
    }
}

/// Per-category roll-up of a plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub count: usize,
    pub total_bytes: u64,
    pub actions: Vec<OptimizationAction>,
}

/// Side-effect-free output of one analysis pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub actions: Vec<OptimizationAction>,
    pub total_files: usize,
    pub total_bytes: u64,
    pub categories: BTreeMap<String, CategorySummary>,
}

impl ActionPlan {
    pub fn from_actions(actions: Vec<OptimizationAction>) -> Self {
        let total_files = actions.iter().filter(|a| a.target.is_some()).count();
        let total_bytes = actions.iter().map(|a| a.size_bytes).sum();

        let mut categories: BTreeMap<String, CategorySummary> = BTreeMap::new();
        for action in &actions {
            let summary = categories.entry(action.category.clone()).or_default();
            summary.count += 1;
            summary.total_bytes += action.size_bytes;
            summary.actions.push(action.clone());
        }

        Self {
            actions,
            total_files,
            total_bytes,
            categories,
        }
    }

    pub fn total_size_mb(&self) -> f64 {
        round_to(self.total_bytes as f64 / BYTES_PER_MB, 2)
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Actions to run for an optional category selection. `None` and an
    /// empty selection both mean every action.
    pub fn selected(&self, categories: Option<&[String]>) -> Vec<OptimizationAction> {
        match categories {
            None => self.actions.clone(),
            Some(selected) if selected.is_empty() => self.actions.clone(),
            Some(selected) => self
                .actions
                .iter()
                .filter(|a| selected.iter().any(|c| c == &a.category))
                .cloned()
                .collect(),
        }
    }
}

/// Outcome of one execution run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
    pub errors: Vec<String>,
    pub actions_completed: Vec<OptimizationAction>,
}

impl ExecutionResult {
    pub fn space_freed_mb(&self) -> f64 {
        round_to(self.bytes_freed as f64 / BYTES_PER_MB, 2)
    }
}

/// One persisted disk-usage reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskSnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_gb: f64,
    pub used_gb: f64,
    pub free_gb: f64,
    pub percent_used: f64,
}

impl DiskSnapshot {
    pub fn from_usage(timestamp: DateTime<Utc>, usage: &VolumeUsage) -> Self {
        Self {
            timestamp,
            total_gb: round_to(usage.total_bytes as f64 / BYTES_PER_GB, 2),
            used_gb: round_to(usage.used_bytes as f64 / BYTES_PER_GB, 2),
            free_gb: round_to(usage.free_bytes as f64 / BYTES_PER_GB, 2),
            percent_used: round_to(usage.percent_used as f64, 1),
        }
    }
}

/// Urgency classification of a disk forecast
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WarningTier {
    Critical,
    Warning,
    Info,
    Ok,
}

impl WarningTier {
    /// Classify by days until the volume is full
    pub fn from_days(days_until_full: f64) -> Self {
        if days_until_full < 7.0 {
            WarningTier::Critical
        } else if days_until_full < 30.0 {
            WarningTier::Warning
        } else if days_until_full < 90.0 {
            WarningTier::Info
        } else {
            WarningTier::Ok
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WarningTier::Critical => "CRITICAL",
            WarningTier::Warning => "WARNING",
            WarningTier::Info => "INFO",
            WarningTier::Ok => "OK",
        }
    }
}

impl std::fmt::Display for WarningTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A large directory found under one of the candidate paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowingDirectory {
    pub path: PathBuf,
    pub size_gb: f64,
    pub safe_to_clean: bool,
}

/// Derived disk forecast, recomputed on every request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub growth_rate_gb_per_day: f64,
    pub disk_growing: bool,
    pub days_until_full: Option<f64>,
    pub current_free_gb: f64,
    pub current_used_percent: f64,
    pub warning_tier: WarningTier,
    pub growing_directories: Vec<GrowingDirectory>,
    pub recommendation: String,
}

/// Result of asking the forecaster for a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Forecast {
    Ready(Prediction),
    InsufficientData { reason: String, days_of_data: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(category: &str, path: Option<&str>, size: u64) -> OptimizationAction {
        OptimizationAction {
            category: category.to_string(),
            description: format!("Delete: {:?}", path),
            target: path.map(PathBuf::from),
            size_bytes: size,
            safe_to_delete: true,
            reason: "test".to_string(),
        }
    }

    #[test]
    fn test_plan_totals_and_grouping() {
        let plan = ActionPlan::from_actions(vec![
            action("Temporary Files", Some("/tmp/a"), 100),
            action("Temporary Files", Some("/tmp/b"), 50),
            action(MEMORY_OPTIMIZATION, None, 0),
        ]);

        assert_eq!(plan.total_files, 2);
        assert_eq!(plan.total_bytes, 150);
        assert_eq!(plan.categories.len(), 2);
        assert_eq!(plan.categories["Temporary Files"].count, 2);
        assert_eq!(plan.categories["Temporary Files"].total_bytes, 150);
        assert_eq!(plan.categories[MEMORY_OPTIMIZATION].actions.len(), 1);
    }

    #[test]
    fn test_plan_category_selection() {
        let plan = ActionPlan::from_actions(vec![
            action("Temporary Files", Some("/tmp/a"), 100),
            action("Linux Cache", Some("/home/u/.cache/x"), 10),
        ]);

        assert_eq!(plan.selected(None).len(), 2);
        let only_cache = plan.selected(Some(&["Linux Cache".to_string()]));
        assert_eq!(only_cache.len(), 1);
        assert_eq!(only_cache[0].category, "Linux Cache");
        assert_eq!(plan.selected(Some(&[])), plan.actions);
        assert!(plan.selected(Some(&["Unknown".to_string()])).is_empty());
    }

    #[test]
    fn test_warning_tier_boundaries() {
        assert_eq!(WarningTier::from_days(6.99), WarningTier::Critical);
        assert_eq!(WarningTier::from_days(7.0), WarningTier::Warning);
        assert_eq!(WarningTier::from_days(29.99), WarningTier::Warning);
        assert_eq!(WarningTier::from_days(30.0), WarningTier::Info);
        assert_eq!(WarningTier::from_days(89.99), WarningTier::Info);
        assert_eq!(WarningTier::from_days(90.0), WarningTier::Ok);
    }

    #[test]
    fn test_volume_usage_percent() {
        let usage = VolumeUsage::new(PathBuf::from("/"), 200, 50);
        assert_eq!(usage.used_bytes, 150);
        assert!((usage.percent_used - 75.0).abs() < f32::EPSILON);

        let empty = VolumeUsage::new(PathBuf::from("/"), 0, 0);
        assert_eq!(empty.percent_used, 0.0);
    }

    #[test]
    fn test_disk_snapshot_rounding() {
        let usage = VolumeUsage::new(
            PathBuf::from("/"),
            (100.0 * BYTES_PER_GB) as u64,
            (33.3333 * BYTES_PER_GB) as u64,
        );
        let snap = DiskSnapshot::from_usage(Utc::now(), &usage);
        assert_eq!(snap.total_gb, 100.0);
        assert_eq!(snap.free_gb, 33.33);
        assert_eq!(snap.used_gb, 66.67);
        assert_eq!(snap.percent_used, 66.7);
    }
}
