use chrono::{DateTime, Local};

/// 时间来源
///
/// 所有 `created_at` / `updated_at` 都从这里取值，测试中可替换为 [`FixedClock`]。
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// 读取系统时间
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// 固定时间，用于测试
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Local>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Local> {
        self.0
    }
}
