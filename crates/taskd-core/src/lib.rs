//! taskd-core
//!
//! Administrative task scheduler for a directory server: task records kept
//! as attribute entries, dependency-aware admission, guarded record
//! mutation and concurrent execution of task handlers.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, entry, fields, state, timestamp, log, errors）
//! - **ports**: 抽象化レイヤー（RecordStore, AttributeResolver, LogSink, Notifier, Clock）
//! - **scheduler**: TaskRecord, ConcurrencyGuard, 依存解決, 順序付け, TaskRunner, Scheduler
//! - **typed**: TaskHandler trait と class 名による HandlerRegistry
//! - **impls**: 開発・テスト用の port 実装
//! - **app**: SchedulerBuilder と設定
//! - **observability**: 集計ビュー

pub mod app;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod scheduler;
pub mod typed;
