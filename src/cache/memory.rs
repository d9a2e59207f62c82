use crate::cache::{CacheError, ModelCache};
use crate::estimation::trend::TrendModel;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::warn;

#[derive(Debug, Default)]
pub struct MemoryModelCache {
    models: RwLock<HashMap<String, TrendModel>>,
}

impl MemoryModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.models.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ModelCache for MemoryModelCache {
    fn load(&self, bin_id: &str) -> Option<TrendModel> {
        match self.models.read() {
            Ok(guard) => guard.get(bin_id).cloned(),
            Err(_) => {
                warn!(bin_id, "Model cache lock poisoned, treating entry as absent");
                None
            }
        }
    }

    fn save(&self, bin_id: &str, model: &TrendModel) -> Result<(), CacheError> {
        let mut guard = self.models.write().map_err(|_| CacheError::Lock)?;
        guard.insert(bin_id.to_string(), model.clone());
        Ok(())
    }

    fn invalidate(&self, bin_id: &str) -> Result<(), CacheError> {
        let mut guard = self.models.write().map_err(|_| CacheError::Lock)?;
        guard.remove(bin_id);
        Ok(())
    }
}
