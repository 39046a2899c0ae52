//! TaskHandler trait - a task class's domain logic.
//!
//! # 学習ポイント
//! - Object-safe async trait (`Arc<dyn TaskHandler>` in the registry)
//! - Closure adapter (`handler_fn`) for small handlers and tests

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{TaskError, TaskState};
use crate::scheduler::{TaskContext, TaskRecord};

/// Domain logic of one task class.
///
/// # 使用例
/// ```ignore
/// struct BackupHandler;
///
/// #[async_trait]
/// impl TaskHandler for BackupHandler {
///     async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
///         ctx.log(Severity::Informational, 1, "backup started").await?;
///         Ok(TaskState::CompletedSuccessfully)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskHandler: Send + Sync {
    /// Task-specific checks at submission time. An error is returned to the
    /// submitter and the task is never scheduled.
    fn initialize(&self, _record: &TaskRecord) -> Result<(), TaskError> {
        Ok(())
    }

    /// Do the work and return the final state.
    ///
    /// Runs without the record lock held. Interruption is cooperative: a
    /// handler that never looks at `TaskContext::interrupted` runs to
    /// completion.
    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError>;
}

/// Handler backed by an async closure.
pub struct FnHandler<F> {
    f: F,
}

pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskState, TaskError>> + Send,
{
    FnHandler { f }
}

#[async_trait]
impl<F, Fut> TaskHandler for FnHandler<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<TaskState, TaskError>> + Send,
{
    async fn run(&self, ctx: TaskContext) -> Result<TaskState, TaskError> {
        (self.f)(ctx).await
    }
}
