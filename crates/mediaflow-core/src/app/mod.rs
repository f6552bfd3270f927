//! App - アプリケーション層
//!
//! ports を組み合わせて生成タスクのライフサイクルを駆動します。
//!
//! # 主要コンポーネント
//! - **TaskPoller**: 1 つのタスクハンドルを終端状態まで待つ
//! - **RetryOrchestrator**: submit+poll サイクルを予算内でやり直す
//! - **FallbackCoordinator**: 優先プロバイダが駄目なら代替プロバイダを 1 回だけ試す
//! - **GenerationService**: 検証・アップロードを含む入口
//! - **ServiceBuilder**: ワイヤリングと起動時検証

pub mod builder;
pub mod fallback;
pub mod orchestrator;
pub mod poller;
pub mod service;
mod wait;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, ServiceBuilder};
pub use self::fallback::{FallbackCoordinator, FallbackPolicy, Route};
pub use self::orchestrator::{RetryOrchestrator, RunReport};
pub use self::poller::{PollOutcome, TaskPoller};
pub use self::service::GenerationService;
