//! App - アプリケーション層
//!
//! ports の実装と handler を組み合わせて Scheduler を起動する。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 構築とワイヤリング（Fail-fast 検証付き）
//! - **SchedulerConfig**: TOML から読む実行時設定

pub mod builder;
pub mod config;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::config::{ConfigError, SchedulerConfig};
