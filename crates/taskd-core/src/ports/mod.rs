//! Ports - 抽象化レイヤー
//!
//! The scheduler talks to the rest of the directory server only through
//! these traits. Everything behind them is an external collaborator.
//!
//! # 設計原則
//! - The record store is the source of truth for every task entry
//! - Attribute resolution is a lookup service; an unknown field falls back
//!   to a default descriptor instead of failing
//! - Log sink and notifier are fire-and-forget from the scheduler's view

pub mod attribute_resolver;
pub mod clock;
pub mod log_sink;
pub mod notifier;
pub mod record_store;

// 主要な trait を再エクスポート
pub use self::attribute_resolver::{AttributeResolver, AttributeSyntax, AttributeType};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::log_sink::LogSink;
pub use self::notifier::{Notification, NotifyError, Notifier};
pub use self::record_store::RecordStore;
