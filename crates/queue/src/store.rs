//! Local cave records the decision engine writes on install.

use std::sync::{Mutex, PoisonError};

use hearth_protocol::Cave;

/// Storage collaborator for cave records.
pub trait CaveStore: Send + Sync {
    /// Records `cave` unless another stored cave already uses its
    /// (install location, install folder). Check and write happen as one
    /// step; returns whether the cave was recorded.
    fn reserve(&self, cave: Cave) -> bool;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryCaveStore {
    caves: Mutex<Vec<Cave>>,
}

impl MemoryCaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caves(caves: Vec<Cave>) -> Self {
        Self {
            caves: Mutex::new(caves),
        }
    }

    pub fn caves(&self) -> Vec<Cave> {
        self.caves
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CaveStore for MemoryCaveStore {
    fn reserve(&self, cave: Cave) -> bool {
        let mut caves = self.caves.lock().unwrap_or_else(PoisonError::into_inner);
        let taken = caves.iter().any(|c| {
            c.id != cave.id
                && c.install_location == cave.install_location
                && c.install_folder == cave.install_folder
        });
        if taken {
            return false;
        }
        caves.retain(|c| c.id != cave.id);
        caves.push(cave);
        true
    }
}
