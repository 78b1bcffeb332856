//! ID 生成能力
//!
//! 连续快速提交时也不能撞号，所以不用墙钟时间戳。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::IdStrategy;

/// ID 生成器
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

/// 进程内单调递增计数器，形如 `local-1`、`local-2`
#[derive(Debug)]
pub struct MonotonicIds {
    prefix: String,
    counter: AtomicU64,
}

impl MonotonicIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for MonotonicIds {
    fn default() -> Self {
        Self::new("local")
    }
}

impl IdGenerator for MonotonicIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{}-{}", self.prefix, n)
    }
}

/// UUID v4
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// 按配置创建生成器
pub fn from_strategy(strategy: IdStrategy) -> Arc<dyn IdGenerator> {
    match strategy {
        IdStrategy::Uuid => Arc::new(UuidIds),
        IdStrategy::Monotonic => Arc::new(MonotonicIds::default()),
    }
}
