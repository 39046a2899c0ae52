//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターンで port 実装を差し替え可能にする
//! - 起動時検証（Fail-fast 設計）
//! - 明確なエラーメッセージ

use std::sync::Arc;

use super::config::{ConfigError, SchedulerConfig};
use crate::impls::{DirectorySchema, InMemoryRecordStore, LoggingNotifier, TracingLogSink};
use crate::ports::{AttributeResolver, Clock, LogSink, Notifier, RecordStore, SystemClock};
use crate::scheduler::{MutationContext, Scheduler};
use crate::typed::{HandlerRegistry, RegistryError, TaskHandler};

/// Wires ports and handlers into a running [`Scheduler`].
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .register("backup", BackupHandler::default())?
///     .expect_classes(&["backup"])
///     .build()?;
/// ```
///
/// Every port has a development default: in-memory store, the standard
/// directory schema, the system clock, tracing for the task log and a
/// notifier that only logs.
///
/// # Fail-fast 設計
/// - expect_classes() で必要な task class を宣言
/// - build() 時に「期待集合 ⊆ 登録済み集合」と設定値をチェック
pub struct SchedulerBuilder {
    registry: HandlerRegistry,
    expected_classes: Option<Vec<String>>,
    config: SchedulerConfig,
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn AttributeResolver>,
    clock: Arc<dyn Clock>,
    log_sink: Arc<dyn LogSink>,
    notifier: Arc<dyn Notifier>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task classes: {0:?}. These classes were expected but have no handler.")]
    MissingTaskClasses(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SchedulerBuilder {
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            expected_classes: None,
            config: SchedulerConfig::default(),
            store: Arc::new(InMemoryRecordStore::new()),
            resolver: Arc::new(DirectorySchema::standard()),
            clock: Arc::new(SystemClock),
            log_sink: Arc::new(TracingLogSink),
            notifier: Arc::new(LoggingNotifier),
        }
    }

    /// Handler を task class 名で登録
    pub fn register(
        mut self,
        class: &str,
        handler: impl TaskHandler + 'static,
    ) -> Result<Self, RegistryError> {
        self.registry.register(class, Arc::new(handler))?;
        Ok(self)
    }

    /// Handler for entries that name no task class.
    pub fn default_handler(mut self, handler: impl TaskHandler + 'static) -> Self {
        self.registry.set_default(Arc::new(handler));
        self
    }

    /// 期待される task class のリストを設定
    pub fn expect_classes(mut self, classes: &[&str]) -> Self {
        self.expected_classes = Some(classes.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = store;
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn AttributeResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn log_sink(mut self, log_sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = log_sink;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Validate and start the scheduler.
    ///
    /// # 検証
    /// - 設定値が妥当か
    /// - expect_classes() の class が全て登録されているか
    ///
    /// Spawns the admission loop, so it must run inside a tokio runtime.
    pub fn build(self) -> Result<Scheduler, BuildError> {
        self.config.validate()?;

        if let Some(expected) = &self.expected_classes {
            let registered = self.registry.registered_classes();
            let missing: Vec<String> = expected
                .iter()
                .filter(|class| !registered.contains(class))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingTaskClasses(missing));
            }
        }

        let mutation = MutationContext {
            store: self.store,
            resolver: self.resolver,
            clock: self.clock,
            log_sink: self.log_sink,
        };
        Ok(Scheduler::start(
            self.registry,
            mutation,
            self.notifier,
            self.config,
        ))
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::domain::{TaskError, TaskState};
    use crate::scheduler::TaskContext;

    struct Noop;

    #[async_trait]
    impl TaskHandler for Noop {
        async fn run(&self, _ctx: TaskContext) -> Result<TaskState, TaskError> {
            Ok(TaskState::CompletedSuccessfully)
        }
    }

    fn noop() -> Noop {
        Noop
    }

    #[tokio::test]
    async fn test_build_success() {
        let scheduler = SchedulerBuilder::new()
            .register("backup", noop())
            .unwrap()
            .expect_classes(&["backup"])
            .build();
        assert!(scheduler.is_ok());
    }

    #[tokio::test]
    async fn test_build_missing_task_classes() {
        let scheduler = SchedulerBuilder::new()
            .register("backup", noop())
            .unwrap()
            .expect_classes(&["backup", "export"])
            .build();
        assert!(matches!(
            scheduler,
            Err(BuildError::MissingTaskClasses(missing)) if missing == vec!["export".to_string()]
        ));
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let scheduler = SchedulerBuilder::new()
            .config(SchedulerConfig {
                guard_timeout_ms: 0,
                ..SchedulerConfig::default()
            })
            .build();
        assert!(matches!(scheduler, Err(BuildError::Config(_))));
    }

    #[test]
    fn test_duplicate_class_is_rejected() {
        let result = SchedulerBuilder::new()
            .register("backup", noop())
            .unwrap()
            .register("backup", noop());
        assert!(matches!(result, Err(RegistryError::AlreadyRegistered(_))));
    }
}
