//! Process-wide task registry.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use courier_core::TaskId;

use crate::handle::TaskHandle;

/// Maps task IDs to their handles. Entries are added on submission and only
/// removed by an explicit operator stop.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: Arc<RwLock<HashMap<TaskId, TaskHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, handle: TaskHandle) {
        self.tasks.write().await.insert(handle.id(), handle);
    }

    pub async fn get(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &TaskId) -> Option<TaskHandle> {
        self.tasks.write().await.remove(id)
    }

    /// Point-in-time copy of every handle, for sweeps that must not hold the
    /// registry lock while they talk to tasks.
    pub async fn handles(&self) -> Vec<TaskHandle> {
        self.tasks.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{deps, input, ScriptedClient, SendRule};
    use courier_core::{TaskLimits, TaskState};
    use uuid::Uuid;

    #[tokio::test]
    async fn insert_get_remove() {
        let registry = TaskRegistry::new();
        let client = ScriptedClient::new(SendRule::always_ok());
        let state = TaskState::new(Uuid::new_v4(), input("a", "1"), &TaskLimits::default());
        let (handle, _join) = TaskHandle::spawn(state, deps(client));
        let id = handle.id();

        registry.insert(handle).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.get(&id).await.is_some());
        assert_eq!(registry.handles().await.len(), 1);

        assert!(registry.remove(&id).await.is_some());
        assert!(registry.is_empty().await);
        assert!(registry.get(&id).await.is_none());
    }
}
