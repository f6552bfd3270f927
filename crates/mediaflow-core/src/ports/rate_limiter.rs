//! RateLimiter port - 投入のアドミッション制御
//!
//! 投入の直前に `wait_for_slot` を呼ぶ。複数リクエストの投入バーストを
//! 直列化してベンダー側のレート制限を守るための共有コンポーネント。

use async_trait::async_trait;

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Suspends until a submission is permitted.
    async fn wait_for_slot(&self);
}

/// Admits everything immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

#[async_trait]
impl RateLimiter for Unlimited {
    async fn wait_for_slot(&self) {}
}
