use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::handlers::Coordinates;

/// Successful lookups keyed by the raw address text, shared by every row of
/// one run. Cloning shares the same map.
#[derive(Clone, Default)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<String, Coordinates>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str) -> Option<Coordinates> {
        self.entries.lock().get(address).copied()
    }

    pub fn put(&self, address: &str, coordinates: Coordinates) {
        self.entries.lock().insert(address.to_string(), coordinates);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
