//! Process-scoped lazy backend cell

use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crate::backend::{self, BackendInfo, ScoringBackend};
use crate::config::ModelConfig;
use crate::error::{DetectorError, Result};

/// Health view of the selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendStatus {
    /// Nobody has asked for the backend yet
    NotLoaded,
    Ready(BackendInfo),
    /// The most recent load attempt failed
    Failed(String),
}

/// Builds the scoring backend on first use and hands out the same instance
/// for the rest of the process lifetime.
///
/// Concurrent first callers block on a single initialization. A failed load
/// leaves the cell empty so a later request can retry.
pub struct BackendSelector {
    cell: OnceCell<Arc<dyn ScoringBackend>>,
    last_failure: Mutex<Option<String>>,
}

impl Default for BackendSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendSelector {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
            last_failure: Mutex::new(None),
        }
    }

    /// Selector that already holds `backend`.
    pub fn with_backend(backend: Arc<dyn ScoringBackend>) -> Self {
        Self {
            cell: OnceCell::with_value(backend),
            last_failure: Mutex::new(None),
        }
    }

    /// Return the cached backend, loading it from `config` on the first call.
    /// Later calls ignore `config`.
    pub fn get_or_init(&self, config: &ModelConfig) -> Result<Arc<dyn ScoringBackend>> {
        self.get_or_init_with(|| backend::load_backend(config))
    }

    pub fn get_or_init_with<F>(&self, init: F) -> Result<Arc<dyn ScoringBackend>>
    where
        F: FnOnce() -> anyhow::Result<Box<dyn ScoringBackend>>,
    {
        let backend = self.cell.get_or_try_init(|| {
            let started = Instant::now();
            match init() {
                Ok(backend) => {
                    log::info!(
                        "Backend {} ready on {} in {:.2?}",
                        backend.info().model_name,
                        backend.info().device,
                        started.elapsed()
                    );
                    self.set_failure(None);
                    Ok(Arc::from(backend))
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    log::error!("Backend initialization failed: {}", message);
                    self.set_failure(Some(message.clone()));
                    Err(DetectorError::BackendInit(message))
                }
            }
        })?;

        Ok(Arc::clone(backend))
    }

    /// The backend if it has been initialized.
    pub fn get(&self) -> Option<Arc<dyn ScoringBackend>> {
        self.cell.get().cloned()
    }

    pub fn status(&self) -> BackendStatus {
        if let Some(backend) = self.cell.get() {
            return BackendStatus::Ready(backend.info().clone());
        }
        match self.last_failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            Some(message) => BackendStatus::Failed(message),
            None => BackendStatus::NotLoaded,
        }
    }

    fn set_failure(&self, failure: Option<String>) {
        *self.last_failure.lock().unwrap_or_else(PoisonError::into_inner) = failure;
    }
}
