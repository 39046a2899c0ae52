//! Typed - task domain logic and its registry.
//!
//! Each task entry names a task class; the registry maps that name to the
//! `TaskHandler` that knows how to run it.

pub mod handler;
pub mod registry;

// 主要な trait/型 を再エクスポート
pub use self::handler::{FnHandler, TaskHandler, handler_fn};
pub use self::registry::{HandlerRegistry, RegistryError};
