//! Process-wide dependencies handed to every component at construction

use crate::config::CoreConfig;
use crate::observability::CoreMetrics;
use crate::platform::{
    Clock, FileOps, HostProbe, PlatformHooks, ProcessHooks, StdFileOps, SysinfoProbe, SystemClock,
};
use std::sync::Arc;

/// Explicitly constructed context owned by the entry point.
///
/// Cloning is cheap; every field is shared.
#[derive(Clone)]
pub struct CoreContext {
    pub config: Arc<CoreConfig>,
    pub probe: Arc<dyn HostProbe>,
    pub hooks: Arc<dyn PlatformHooks>,
    pub files: Arc<dyn FileOps>,
    pub clock: Arc<dyn Clock>,
    pub metrics: CoreMetrics,
}

impl CoreContext {
    /// Context backed by the real host; the probe shares the context clock
    pub fn new(config: CoreConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self::with_probe(config, Arc::new(SysinfoProbe::with_clock(Arc::clone(&clock))))
            .clock(clock)
    }

    /// Context with a caller-supplied probe and default everything else
    pub fn with_probe(config: CoreConfig, probe: Arc<dyn HostProbe>) -> Self {
        Self {
            config: Arc::new(config),
            probe,
            hooks: Arc::new(ProcessHooks),
            files: Arc::new(StdFileOps),
            clock: Arc::new(SystemClock),
            metrics: CoreMetrics::new(),
        }
    }

    pub fn hooks(mut self, hooks: Arc<dyn PlatformHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn files(mut self, files: Arc<dyn FileOps>) -> Self {
        self.files = files;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
