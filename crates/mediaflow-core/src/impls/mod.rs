//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **HttpTaskProvider**: reqwest による本番用の TaskProvider（`Dialect` でレスポンス形式を切り替え）
//! - **ScriptedProvider**: 台本どおりに応答する TaskProvider（テスト・`simulate` 用）
//! - **SpacingRateLimiter**: 投入間隔を空ける RateLimiter

pub mod dialect;
pub mod http;
pub mod rate_limiter;
pub mod scripted;

// 主要な型を再エクスポート
pub use self::dialect::{Dialect, ProviderResponse};
pub use self::http::{HttpProviderConfig, HttpTaskProvider};
pub use self::rate_limiter::SpacingRateLimiter;
pub use self::scripted::{ScriptStep, ScriptedProvider};
