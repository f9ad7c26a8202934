//! Explicit shutdown capability for long-lived components

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

/// A component that holds background work or OS resources
#[async_trait]
pub trait Shutdownable: Send + Sync {
    /// Name used in shutdown logs
    fn name(&self) -> &str;

    /// Release resources; may be called more than once
    async fn shutdown(&self) -> anyhow::Result<()>;
}

/// Registry of components to shut down when the process exits
#[derive(Default, Clone)]
pub struct ResourceRegistry {
    resources: Arc<Mutex<Vec<Arc<dyn Shutdownable>>>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, resource: Arc<dyn Shutdownable>) {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(resource);
    }

    pub fn len(&self) -> usize {
        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut down every registered resource in reverse registration order.
    ///
    /// Individual failures are logged and counted, never propagated.
    pub async fn shutdown_all(&self) -> usize {
        let resources: Vec<_> = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .rev()
            .collect();

        let mut failures = 0;
        for resource in resources {
            match resource.shutdown().await {
                Ok(()) => info!(resource = resource.name(), "Resource shut down"),
                Err(e) => {
                    failures += 1;
                    warn!(resource = resource.name(), error = %e, "Resource shutdown failed");
                }
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: String,
        fail: bool,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Shutdownable for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn shutdown(&self) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(self.name.clone());
            if self.fail {
                anyhow::bail!("refused");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_shutdown_all_reverse_order_and_continues_on_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ResourceRegistry::new();
        for (name, fail) in [("first", false), ("second", true), ("third", false)] {
            registry.register(Arc::new(Recorder {
                name: name.to_string(),
                fail,
                log: log.clone(),
            }));
        }
        assert_eq!(registry.len(), 3);

        let failures = registry.shutdown_all().await;

        assert_eq!(failures, 1);
        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert!(registry.is_empty());
    }
}
