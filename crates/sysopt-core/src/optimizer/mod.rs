//! Optimization planner and executor
//!
//! Strict two-phase contract: [`OptimizationEngine::analyze`] is a read-only
//! scan that returns an [`ActionPlan`]; nothing is changed until the caller
//! hands a plan to [`OptimizationEngine::execute`].
//!
//! Only one plan is pending at a time and a new analysis replaces it
//! wholesale. Executions already started from an older plan are not
//! cancelled, so callers must serialize analyze/execute pairs themselves.

mod executor;
mod scanner;

pub use executor::{
    ExecutionHandle, NoProgress, ProgressSink, ProgressUpdate, COMPLETE,
};
pub use scanner::{is_scanned_path, BrowserCache, ScanLimits, ScanLocation, ScanRoots, Scanner};

use crate::context::CoreContext;
use crate::error::ExecutionError;
use crate::lifecycle::Shutdownable;
use crate::models::ActionPlan;
use crate::observability::{CoreMetrics, EventLogger};
use crate::platform::{Clock, FileOps, HostProbe, PlatformHooks};
use async_trait::async_trait;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, SystemTime};
use tokio::sync::Semaphore;
use tracing::info;

/// Analyze-then-execute engine with a fixed-size execution pool
pub struct OptimizationEngine {
    scanner: Arc<Scanner>,
    probe: Arc<dyn HostProbe>,
    files: Arc<dyn FileOps>,
    hooks: Arc<dyn PlatformHooks>,
    clock: Arc<dyn Clock>,
    metrics: CoreMetrics,
    logger: EventLogger,
    pool: Arc<Semaphore>,
    pool_size: usize,
    acquire_timeout: Duration,
    pending: RwLock<Option<ActionPlan>>,
}

impl OptimizationEngine {
    /// Engine scanning the platform's default locations
    pub fn new(ctx: &CoreContext) -> Self {
        Self::with_roots(ctx, ScanRoots::platform_default())
    }

    pub fn with_roots(ctx: &CoreContext, roots: ScanRoots) -> Self {
        let pool_size = ctx.config.worker_pool_size.max(1);
        Self {
            scanner: Arc::new(Scanner::new(roots, ScanLimits::from(ctx.config.as_ref()))),
            probe: Arc::clone(&ctx.probe),
            files: Arc::clone(&ctx.files),
            hooks: Arc::clone(&ctx.hooks),
            clock: Arc::clone(&ctx.clock),
            metrics: ctx.metrics.clone(),
            logger: EventLogger::local(),
            pool: Arc::new(Semaphore::new(pool_size)),
            pool_size,
            acquire_timeout: ctx.config.pool_acquire_timeout(),
            pending: RwLock::new(None),
        }
    }

    /// Read-only scan producing a fresh plan, which becomes the pending plan
    pub fn analyze(&self) -> ActionPlan {
        let now = SystemTime::from(self.clock.now());
        let plan = ActionPlan::from_actions(self.scanner.scan(self.probe.as_ref(), now));
        self.logger.log_plan(&plan);

        *self.pending.write().unwrap_or_else(PoisonError::into_inner) = Some(plan.clone());
        plan
    }

    /// The plan produced by the most recent analysis
    pub fn pending_plan(&self) -> Option<ActionPlan> {
        self.pending
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Start applying `plan` (optionally only `categories`) on the worker pool.
    ///
    /// Returns immediately. Must be called inside a Tokio runtime. Runs have
    /// no mid-batch cancellation: once a worker picks one up it runs to the end.
    pub fn execute(
        &self,
        plan: &ActionPlan,
        categories: Option<&[String]>,
        sink: Arc<dyn ProgressSink>,
    ) -> ExecutionHandle {
        let actions = plan.selected(categories);
        let scanner = Arc::clone(&self.scanner);
        let files = Arc::clone(&self.files);
        let hooks = Arc::clone(&self.hooks);
        let pool = Arc::clone(&self.pool);
        let metrics = self.metrics.clone();
        let logger = self.logger.clone();
        let acquire_timeout = self.acquire_timeout;

        info!(actions = actions.len(), "Queueing optimization run");

        ExecutionHandle::new(tokio::spawn(async move {
            let permit = match tokio::time::timeout(acquire_timeout, pool.acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(ExecutionError::PoolClosed),
                Err(_) => {
                    return Err(ExecutionError::PoolExhausted {
                        waited: acquire_timeout,
                    })
                }
            };

            let result = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                executor::run_batch(
                    actions,
                    scanner.roots(),
                    files.as_ref(),
                    hooks.as_ref(),
                    sink.as_ref(),
                )
            })
            .await
            .map_err(|e| ExecutionError::WorkerFailed(e.to_string()))?;

            metrics.record_execution(&result);
            logger.log_execution(&result);
            Ok(result)
        }))
    }

    /// Analyze and immediately execute the whole plan.
    ///
    /// Trades transparency for speed: the user never sees the plan before
    /// it is applied. Use [`analyze`](Self::analyze) plus
    /// [`execute`](Self::execute) when the plan should be reviewed first.
    pub fn one_click_boost(&self, sink: Arc<dyn ProgressSink>) -> ExecutionHandle {
        let plan = self.analyze();
        self.execute(&plan, None, sink)
    }

    /// Executions that could start right now without waiting
    pub fn idle_workers(&self) -> usize {
        self.pool.available_permits()
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }
}

#[async_trait]
impl Shutdownable for OptimizationEngine {
    fn name(&self) -> &str {
        "optimization-engine"
    }

    /// Close the pool to new runs; runs already holding a worker finish.
    async fn shutdown(&self) -> anyhow::Result<()> {
        self.pool.close();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::models::MEMORY_OPTIMIZATION;
    use crate::platform::StdFileOps;
    use crate::testing::{FakeProbe, ManualClock};
    use chrono::Utc;
    use std::fs::{self, File, Metadata};
    use std::io;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    struct DenyingFileOps {
        denied: PathBuf,
    }

    impl FileOps for DenyingFileOps {
        fn metadata(&self, path: &Path) -> io::Result<Metadata> {
            StdFileOps.metadata(path)
        }

        fn remove_file(&self, path: &Path) -> io::Result<()> {
            if path == self.denied {
                return Err(io::Error::from(io::ErrorKind::PermissionDenied));
            }
            StdFileOps.remove_file(path)
        }

        fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
            StdFileOps.remove_dir_all(path)
        }
    }

    fn write_old(dir: &Path, name: &str, bytes: usize) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, vec![1u8; bytes]).unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(10 * 24 * 60 * 60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        path
    }

    fn context(memory: f32) -> CoreContext {
        CoreContext::with_probe(CoreConfig::default(), Arc::new(FakeProbe::with_memory(memory)))
            .clock(Arc::new(ManualClock::at(Utc::now())))
    }

    fn roots(dir: &Path) -> ScanRoots {
        ScanRoots {
            temp_locations: vec![ScanLocation::new(dir, "Temporary Files")],
            browser_caches: vec![],
        }
    }

    #[test]
    fn test_analyze_is_idempotent_and_side_effect_free() {
        let dir = TempDir::new().unwrap();
        write_old(dir.path(), "a.tmp", 10);
        write_old(dir.path(), "b.tmp", 20);
        fs::write(dir.path().join("fresh.tmp"), b"new").unwrap();

        let engine = OptimizationEngine::with_roots(&context(80.0), roots(dir.path()));
        let first = engine.analyze();
        let second = engine.analyze();

        assert_eq!(first, second);
        assert_eq!(first.total_files, 2);
        assert_eq!(first.total_bytes, 30);
        assert_eq!(first.categories.len(), 2);
        assert!(first.categories.contains_key(MEMORY_OPTIMIZATION));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 3);
    }

    #[test]
    fn test_new_analysis_replaces_pending_plan() {
        let dir = TempDir::new().unwrap();
        let engine = OptimizationEngine::with_roots(&context(10.0), roots(dir.path()));
        assert!(engine.pending_plan().is_none());

        assert!(engine.analyze().is_empty());
        write_old(dir.path(), "late.tmp", 5);
        let plan = engine.analyze();

        assert_eq!(engine.pending_plan(), Some(plan));
        assert_eq!(engine.pending_plan().unwrap().actions.len(), 1);
    }

    #[tokio::test]
    async fn test_permission_denied_does_not_abort_batch() {
        let dir = TempDir::new().unwrap();
        let a = write_old(dir.path(), "a.tmp", 10);
        let b = write_old(dir.path(), "b.tmp", 20);
        let c = write_old(dir.path(), "c.tmp", 30);

        let ctx = context(10.0).files(Arc::new(DenyingFileOps { denied: b.clone() }));
        let engine = OptimizationEngine::with_roots(&ctx, roots(dir.path()));
        let plan = engine.analyze();
        assert_eq!(plan.actions.len(), 3);

        let result = engine.execute(&plan, None, Arc::new(NoProgress)).wait().await.unwrap();

        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("b.tmp"));
        assert!(result.errors[0].contains("permission denied"));
        assert_eq!(result.files_deleted, 2);
        assert_eq!(result.bytes_freed, 40);
        assert_eq!(result.actions_completed.len(), 2);
        assert!(!a.exists());
        assert!(b.exists());
        assert!(!c.exists());
    }

    #[tokio::test]
    async fn test_execute_filters_categories() {
        let dir = TempDir::new().unwrap();
        let file = write_old(dir.path(), "keep.tmp", 10);

        let engine = OptimizationEngine::with_roots(&context(90.0), roots(dir.path()));
        let plan = engine.analyze();

        let selected = vec![MEMORY_OPTIMIZATION.to_string()];
        let result = engine
            .execute(&plan, Some(&selected), Arc::new(NoProgress))
            .wait()
            .await
            .unwrap();

        assert_eq!(result.actions_completed.len(), 1);
        assert_eq!(result.files_deleted, 0);
        assert!(file.exists());
    }

    #[tokio::test]
    async fn test_empty_category_selection_runs_every_action() {
        let dir = TempDir::new().unwrap();
        let file = write_old(dir.path(), "gone.tmp", 10);

        let engine = OptimizationEngine::with_roots(&context(90.0), roots(dir.path()));
        let plan = engine.analyze();
        assert_eq!(plan.actions.len(), 2);

        let result = engine
            .execute(&plan, Some(&[]), Arc::new(NoProgress))
            .wait()
            .await
            .unwrap();

        assert_eq!(result.actions_completed.len(), 2);
        assert_eq!(result.files_deleted, 1);
        assert!(!file.exists());
    }

    #[tokio::test]
    async fn test_one_click_boost_reports_progress() {
        let dir = TempDir::new().unwrap();
        write_old(dir.path(), "x.tmp", 10);
        write_old(dir.path(), "y.tmp", 10);

        let engine = OptimizationEngine::with_roots(&context(10.0), roots(dir.path()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = engine.one_click_boost(Arc::new(tx)).wait().await.unwrap();

        assert_eq!(result.files_deleted, 2);
        assert!(engine.pending_plan().is_some());

        let mut updates = Vec::new();
        while let Ok(update) = rx.try_recv() {
            updates.push(update);
        }
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[0].percent, 0);
        assert_eq!(updates[1].percent, 50);
        assert!(updates[2].terminal);
    }

    #[tokio::test]
    async fn test_closed_pool_is_an_execution_level_failure() {
        let dir = TempDir::new().unwrap();
        let engine = OptimizationEngine::with_roots(&context(10.0), roots(dir.path()));
        engine.shutdown().await.unwrap();

        let err = engine
            .execute(&ActionPlan::default(), None, Arc::new(NoProgress))
            .wait()
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::PoolClosed);
    }

    #[tokio::test]
    async fn test_busy_pool_times_out_as_exhausted() {
        let dir = TempDir::new().unwrap();
        let config = CoreConfig {
            worker_pool_size: 1,
            pool_acquire_timeout_secs: 0,
            ..Default::default()
        };
        let ctx = CoreContext::with_probe(config, Arc::new(FakeProbe::new()));
        let engine = OptimizationEngine::with_roots(&ctx, roots(dir.path()));
        assert_eq!(engine.pool_size(), 1);

        let _held = engine.pool.clone().acquire_owned().await.unwrap();
        assert_eq!(engine.idle_workers(), 0);

        let err = engine
            .execute(&ActionPlan::default(), None, Arc::new(NoProgress))
            .wait()
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::PoolExhausted { .. }));
    }

    #[tokio::test]
    async fn test_wait_timeout_reports_timeout_and_handle_remains_usable() {
        let dir = TempDir::new().unwrap();
        let config = CoreConfig {
            worker_pool_size: 1,
            ..Default::default()
        };
        let ctx = CoreContext::with_probe(config, Arc::new(FakeProbe::new()));
        let engine = OptimizationEngine::with_roots(&ctx, roots(dir.path()));

        let held = engine.pool.clone().acquire_owned().await.unwrap();
        let mut handle = engine.execute(&ActionPlan::default(), None, Arc::new(NoProgress));

        let err = handle.wait_timeout(Duration::from_millis(20)).await.unwrap_err();
        assert_eq!(err, ExecutionError::Timeout(Duration::from_millis(20)));
        assert!(!handle.is_finished());

        drop(held);
        let result = handle.wait_timeout(Duration::from_secs(5)).await.unwrap();
        assert_eq!(result, crate::models::ExecutionResult::default());
    }
}
