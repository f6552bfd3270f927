//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」。ドライバ本体（app）は
//! ここに定義された trait だけを通して外部とやり取りする。
//!
//! - TaskProvider: 生成 API（投入・状態取得）
//! - Clock: 時刻と待機
//! - RateLimiter: 投入のアドミッション制御
//! - CredentialStore: API キー
//! - MediaUploader: ローカルメディアの公開 URL 化
//! - ProgressObserver: 進捗通知
//! - IdGenerator: ID 生成

pub mod clock;
pub mod credentials;
pub mod id_generator;
pub mod progress;
pub mod provider;
pub mod rate_limiter;
pub mod uploader;

pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::credentials::{Credential, CredentialStore, StaticCredentials};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::progress::{Annotated, FnProgress, NoopProgress, ProgressObserver, RecordingProgress};
pub use self::provider::TaskProvider;
pub use self::rate_limiter::{RateLimiter, Unlimited};
pub use self::uploader::{MediaUploader, UploadError};
