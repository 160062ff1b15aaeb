use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use weavecore::{Executor, ExecutorMetadata};

/// Registry of executors keyed by node type.
///
/// Constructed once and handed to the coordinator. Registration may happen
/// while runs are in flight; a lookup sees either the old or the new entry.
pub struct ExecutorRegistry {
    executors: RwLock<HashMap<String, Arc<dyn Executor>>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self {
            executors: RwLock::new(HashMap::new()),
        }
    }

    /// Register an executor, replacing any previous one for the same type.
    ///
    /// Returns the replaced executor, if there was one.
    pub fn register(
        &self,
        node_type: impl Into<String>,
        executor: impl Executor + 'static,
    ) -> Option<Arc<dyn Executor>> {
        self.register_arc(node_type, Arc::new(executor))
    }

    /// Register an already shared executor
    pub fn register_arc(
        &self,
        node_type: impl Into<String>,
        executor: Arc<dyn Executor>,
    ) -> Option<Arc<dyn Executor>> {
        let node_type = node_type.into();
        let mut executors = self.executors.write().unwrap_or_else(PoisonError::into_inner);
        let previous = executors.insert(node_type.clone(), executor);

        if previous.is_some() {
            tracing::warn!("Replacing executor for node type: {}", node_type);
        } else {
            tracing::info!("Registering node type: {}", node_type);
        }
        previous
    }

    /// Look up the executor for a node type
    pub fn lookup(&self, node_type: &str) -> Option<Arc<dyn Executor>> {
        self.executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(node_type)
            .cloned()
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.lookup(node_type).is_some()
    }

    /// Get all registered node types, sorted
    pub fn list_node_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .executors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        types.sort();
        types
    }

    /// Get metadata for a node type
    pub fn get_metadata(&self, node_type: &str) -> Option<ExecutorMetadata> {
        self.lookup(node_type).map(|executor| executor.metadata())
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
