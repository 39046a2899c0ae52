//! HandlerRegistry - task class name -> handler.
//!
//! Built during initialization (mutable), shared read-only at runtime.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::TaskHandler;
use crate::domain::{InitializationError, TaskId};

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Handler for task class '{0}' is already registered")]
    AlreadyRegistered(String),
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
    default: Option<Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        class: impl Into<String>,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<(), RegistryError> {
        let class = class.into();
        if self.handlers.contains_key(&class) {
            return Err(RegistryError::AlreadyRegistered(class));
        }
        self.handlers.insert(class, handler);
        Ok(())
    }

    /// Handler for entries that do not name a task class.
    pub fn set_default(&mut self, handler: Arc<dyn TaskHandler>) {
        self.default = Some(handler);
    }

    pub fn get(&self, class: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(class).cloned()
    }

    /// Pick the handler for a task, or explain why there is none.
    pub fn resolve(
        &self,
        class: Option<&str>,
        task_id: &TaskId,
    ) -> Result<Arc<dyn TaskHandler>, InitializationError> {
        match class {
            Some(class) => self
                .get(class)
                .ok_or_else(|| InitializationError::UnknownTaskClass {
                    task_id: task_id.clone(),
                    class: class.to_string(),
                }),
            None => self
                .default
                .clone()
                .ok_or_else(|| InitializationError::MissingTaskClass(task_id.clone())),
        }
    }

    /// Registered class names, sorted.
    pub fn registered_classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.handlers.keys().cloned().collect();
        classes.sort();
        classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{TaskError, TaskState};
    use crate::scheduler::TaskContext;
    use crate::typed::handler_fn;

    fn ok_handler() -> Arc<dyn TaskHandler> {
        Arc::new(handler_fn(|_ctx: TaskContext| async move {
            Ok::<_, TaskError>(TaskState::CompletedSuccessfully)
        }))
    }

    #[test]
    fn register_and_get() {
        let mut registry = HandlerRegistry::new();
        registry.register("backup", ok_handler()).unwrap();

        assert!(registry.get("backup").is_some());
        assert!(registry.get("restore").is_none());
    }

    #[test]
    fn double_registration_is_rejected() {
        let mut registry = HandlerRegistry::new();
        registry.register("backup", ok_handler()).unwrap();

        let result = registry.register("backup", ok_handler());
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(c)) if c == "backup"));
    }

    #[test]
    fn resolve_reports_unknown_and_missing_class() {
        let mut registry = HandlerRegistry::new();
        registry.register("backup", ok_handler()).unwrap();
        let id = TaskId::new("T1");

        assert!(registry.resolve(Some("backup"), &id).is_ok());
        assert!(matches!(
            registry.resolve(Some("restore"), &id),
            Err(InitializationError::UnknownTaskClass { .. })
        ));
        assert!(matches!(
            registry.resolve(None, &id),
            Err(InitializationError::MissingTaskClass(_))
        ));

        registry.set_default(ok_handler());
        assert!(registry.resolve(None, &id).is_ok());
    }

    #[test]
    fn registered_classes_are_sorted() {
        let mut registry = HandlerRegistry::new();
        registry.register("restore", ok_handler()).unwrap();
        registry.register("backup", ok_handler()).unwrap();

        assert_eq!(registry.registered_classes(), vec!["backup", "restore"]);
    }
}
