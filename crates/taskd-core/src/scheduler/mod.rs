//! Scheduling engine.
//!
//! `record` holds the task state, `guard` serializes changes to it,
//! `dependency` and `ordering` decide what may run, `runner` runs it and
//! `core` ties them together behind [`Scheduler`].

mod core;
pub mod dependency;
pub mod guard;
pub mod ordering;
pub mod record;
pub mod runner;

// 主要な型を再エクスポート
pub use self::core::Scheduler;
pub use dependency::{Admission, DependencyGraph, DependencyResolver, Readiness, WaitReason};
pub use guard::{ConcurrencyGuard, MutationContext, MutationError, RecordEdit};
pub use ordering::{OrderKey, OrderingPolicy};
pub use record::TaskRecord;
pub use runner::{Interrupt, RecordGuard, TaskContext, TaskRunner};
