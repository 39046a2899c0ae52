//! Impls - 実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryRecordStore**: 開発用の record store
//! - **DirectorySchema**: task 属性だけを知っている静的 schema
//! - **TracingLogSink**: task log を tracing に流す
//! - **LoggingNotifier / RecordingNotifier**: 通知の代替実装
//!
//! # 本番用実装
//! A real deployment plugs in the directory's own entry backend, schema and
//! mail transport behind the same ports.

pub mod inmem_store;
pub mod log_sink;
pub mod notifier;
pub mod schema;

// 主要な型を再エクスポート
pub use self::inmem_store::InMemoryRecordStore;
pub use self::log_sink::TracingLogSink;
pub use self::notifier::{LoggingNotifier, RecordingNotifier};
pub use self::schema::DirectorySchema;
