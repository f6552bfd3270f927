//! IdGenerator port - ID 生成の抽象化
//!
//! # 実装
//! - **UlidGenerator**: Clock の時刻 + ランダム部で ULID を作る

use std::sync::Arc;

use ulid::Ulid;

use super::clock::Clock;
use crate::domain::{CycleId, GenerationId};

pub trait IdGenerator: Send + Sync {
    fn generation_id(&self) -> GenerationId;

    fn cycle_id(&self) -> CycleId;
}

/// Clock を使って現在時刻ベースの ULID を生成します。
/// ManualClock を渡せば timestamp 部分が決定的になります。
pub struct UlidGenerator {
    clock: Arc<dyn Clock>,
}

impl UlidGenerator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    fn next(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl IdGenerator for UlidGenerator {
    fn generation_id(&self) -> GenerationId {
        GenerationId::from(self.next())
    }

    fn cycle_id(&self) -> CycleId {
        CycleId::from(self.next())
    }
}
