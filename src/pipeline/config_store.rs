//! Published axes configuration.
//!
//! Edits build a complete new [`AxesConfig`] and swap it in under the write
//! lock; readers clone the `Arc` and never observe a half-applied edit.

use std::sync::{Arc, RwLock};

use crate::config::AxesConfig;
use crate::error::{ConfigError, PipelineError};

pub struct ConfigStore {
    current: RwLock<Arc<AxesConfig>>,
}

impl ConfigStore {
    pub fn new(initial: AxesConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
        }
    }

    /// Latest published snapshot.
    pub fn load(&self) -> Result<Arc<AxesConfig>, PipelineError> {
        self.current
            .read()
            .map(|guard| Arc::clone(&guard))
            .map_err(|_| poisoned())
    }

    /// Replace the whole configuration after validating every axis.
    pub fn publish(&self, axes: AxesConfig) -> Result<(), PipelineError> {
        validate(&axes)?;
        let mut guard = self.current.write().map_err(|_| poisoned())?;
        *guard = Arc::new(axes);
        Ok(())
    }

    /// Read-copy-update; the edit is discarded if it fails or leaves any axis
    /// invalid.
    pub fn update<F>(&self, edit: F) -> Result<Arc<AxesConfig>, PipelineError>
    where
        F: FnOnce(&mut AxesConfig) -> Result<(), PipelineError>,
    {
        let mut guard = self.current.write().map_err(|_| poisoned())?;
        let mut next = **guard;
        edit(&mut next)?;
        validate(&next)?;
        let published = Arc::new(next);
        *guard = Arc::clone(&published);
        Ok(published)
    }
}

fn validate(axes: &AxesConfig) -> Result<(), ConfigError> {
    for (_, axis) in axes.iter() {
        axis.validate()?;
    }
    Ok(())
}

fn poisoned() -> PipelineError {
    PipelineError::LockPoisoned {
        component: "ConfigStore".to_string(),
    }
}
