// ==========================================
// 电机工厂流水线推演系统 - 调度时钟抽象
// ==========================================
// 职责: 把"等一个回合"抽象成 trait,测试可以手动驱动节拍
// ==========================================

use async_trait::async_trait;
use std::time::Duration;

// ==========================================
// Clock Trait
// ==========================================
// 用途: 回合调度器的等待原语
// 实现者: TokioClock（生产）/ ManualClock（测试）
#[async_trait]
pub trait Clock: Send + Sync {
    /// 等待指定时长后返回
    async fn after(&self, duration: Duration);
}

/// 基于 tokio 定时器的生产时钟
#[derive(Debug, Clone, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    async fn after(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// 手动时钟：忽略时长参数,每次 `tick()` 放行一次等待
///
/// 说明：
/// - 供调度器测试确定性驱动回合,不依赖真实时间。
/// - `tick()` 在无等待者时会暂存一次放行额度（Notify 语义）。
#[derive(Debug, Default)]
pub struct ManualClock {
    notify: tokio::sync::Notify,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// 放行一次等待
    pub fn tick(&self) {
        self.notify.notify_one();
    }
}

#[async_trait]
impl Clock for ManualClock {
    async fn after(&self, _duration: Duration) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_manual_clock_releases_one_wait_per_tick() {
        let clock = Arc::new(ManualClock::new());

        let waiter = {
            let clock = clock.clone();
            tokio::spawn(async move {
                clock.after(Duration::from_secs(3600)).await;
            })
        };

        // 未放行前等待不应结束
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        clock.tick();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_manual_clock_stores_pending_tick() {
        let clock = ManualClock::new();
        clock.tick();
        // 已暂存的放行额度让后续等待立即返回
        clock.after(Duration::from_secs(3600)).await;
    }

    #[tokio::test]
    async fn test_tokio_clock_waits() {
        let clock = TokioClock;
        let started = std::time::Instant::now();
        clock.after(Duration::from_millis(30)).await;
        assert!(started.elapsed() >= Duration::from_millis(25));
    }
}
