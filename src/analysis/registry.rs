//! Shared engines keyed by project root.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::AnalysisEngine;
use crate::error::{AnalysisError, Result};

/// One [`AnalysisEngine`] per project root.
///
/// Engines are created on first request and shared afterwards, so repeated
/// callers for the same root see the same cache and statistics. The registry
/// is owned by whoever composes the application; there is no global one.
#[derive(Default)]
pub struct EngineRegistry {
    /// `None` is the engine without a project root.
    engines: Mutex<HashMap<Option<PathBuf>, Arc<AnalysisEngine>>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The engine for `root`, created (and its config loaded) if needed.
    pub fn get_or_create(&self, root: Option<&Path>) -> Result<Arc<AnalysisEngine>> {
        let key = root.map(normalize_root);
        let mut engines = self
            .engines
            .lock()
            .map_err(|_| AnalysisError::Internal("engine registry lock poisoned".to_string()))?;

        if let Some(engine) = engines.get(&key) {
            return Ok(Arc::clone(engine));
        }

        let engine = Arc::new(AnalysisEngine::from_root(key.as_deref())?);
        engines.insert(key, Arc::clone(&engine));
        Ok(engine)
    }

    /// Clean up and drop every engine.
    pub fn reset(&self) {
        let drained: Vec<_> = match self.engines.lock() {
            Ok(mut engines) => engines.drain().map(|(_, e)| e).collect(),
            Err(_) => return,
        };
        for engine in &drained {
            engine.cleanup();
        }
        tracing::debug!(count = drained.len(), "engine registry reset");
    }

    pub fn len(&self) -> usize {
        self.engines.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn normalize_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}
