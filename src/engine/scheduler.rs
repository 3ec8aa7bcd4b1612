// ==========================================
// 电机工厂流水线推演系统 - 回合调度器
// ==========================================
// 职责: 每场推演一条节拍循环,按配置时长推进回合并广播事件
// 红线: 回合号从存储派生,内存计数一律不作数
// 红线: 推送的回合事件是唯一权威时钟,剩余秒数仅供看板展示
// ==========================================

use crate::config::RoundConfigReader;
use crate::domain::simulation::{Round, SimulationStatus};
use crate::engine::clock::Clock;
use crate::engine::events::{SimulationEvent, SimulationEventPublisher, SimulationEventType};
use crate::repository::{RepositoryError, RoundRepository, SimulationRepository};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

// ==========================================
// 调度错误
// ==========================================

/// 调度器模块错误
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("推演不存在: {0}")]
    SimulationNotFound(String),

    #[error("调度冲突: {0}")]
    Conflict(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    #[error("调度器内部错误: {0}")]
    Internal(String),

    #[error("数据访问错误: {0}")]
    Repository(#[from] RepositoryError),
}

/// 调度器操作 Result 别名
pub type SchedulerResult<T> = Result<T, SchedulerError>;

// ==========================================
// 节拍状态
// ==========================================

/// 节拍循环与状态查询共享的推演进度
struct TickState {
    /// 当前回合号（与最近落库回合一致）
    round_no: i64,
    /// 下一回合的到点时刻
    deadline: Instant,
}

/// 注册表中一场在跑推演的控制柄
struct SimulationHandle {
    stop_tx: watch::Sender<bool>,
    state: Arc<Mutex<TickState>>,
    done: Arc<AtomicBool>,
}

// 状态只有两个标量字段,锁中毒时直接取回内层值继续用
fn lock_state(state: &Mutex<TickState>) -> MutexGuard<'_, TickState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

// ==========================================
// RoundScheduler - 回合调度器
// ==========================================

/// 回合调度器
///
/// 每个 simulation_id 至多对应一条在跑的节拍循环,循环登记在注册表里；
/// 启动时拍下配置快照,改配置不影响在跑的推演。
pub struct RoundScheduler {
    simulation_repo: Arc<SimulationRepository>,
    round_repo: Arc<RoundRepository>,
    config: Arc<dyn RoundConfigReader>,
    publisher: Arc<dyn SimulationEventPublisher>,
    clock: Arc<dyn Clock>,
    registry: Mutex<HashMap<String, SimulationHandle>>,
}

impl RoundScheduler {
    pub fn new(
        simulation_repo: Arc<SimulationRepository>,
        round_repo: Arc<RoundRepository>,
        config: Arc<dyn RoundConfigReader>,
        publisher: Arc<dyn SimulationEventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            simulation_repo,
            round_repo,
            config,
            publisher,
            clock,
            registry: Mutex::new(HashMap::new()),
        }
    }

    /// 启动一场推演
    ///
    /// 创建首个回合（续接历史编号）,拉起节拍循环并广播 RoundStarted。
    ///
    /// # 返回
    /// 本次启动落库的回合；已在跑或回合史已满时返回 `Conflict`
    pub async fn start(&self, simulation_id: &str) -> SchedulerResult<Round> {
        let simulation = self
            .simulation_repo
            .find_by_id(simulation_id)?
            .ok_or_else(|| SchedulerError::SimulationNotFound(simulation_id.to_string()))?;

        // 配置快照在进注册表锁之前拍好,锁内不允许 await
        let round_duration = Duration::from_secs(
            self.config
                .get_round_duration_seconds()
                .await
                .map_err(|e| SchedulerError::ConfigError(e.to_string()))?,
        );
        let max_rounds = self
            .config
            .get_max_rounds()
            .await
            .map_err(|e| SchedulerError::ConfigError(e.to_string()))?;

        // 查重、建回合、登记控制柄在同一次锁持有内完成,并发启动只有一个能进来
        let (round, tick_loop) = {
            let mut registry = self.lock_registry()?;

            if let Some(handle) = registry.get(simulation_id) {
                if !handle.done.load(Ordering::SeqCst) {
                    return Err(SchedulerError::Conflict("推演已在进行中".to_string()));
                }
            }

            if let Some(latest) = self.round_repo.find_latest(simulation_id)? {
                if latest.round_no >= max_rounds {
                    return Err(SchedulerError::Conflict(format!(
                        "推演已达到最大回合数{},无法再次启动",
                        max_rounds
                    )));
                }
            }

            let round = self.round_repo.create_next(simulation_id)?;
            self.simulation_repo.set_running(simulation_id, true)?;

            let (stop_tx, stop_rx) = watch::channel(false);
            let state = Arc::new(Mutex::new(TickState {
                round_no: round.round_no,
                deadline: Instant::now() + round_duration,
            }));
            let done = Arc::new(AtomicBool::new(false));

            let tick_loop = TickLoop {
                simulation_id: simulation_id.to_string(),
                simulation_repo: Arc::clone(&self.simulation_repo),
                round_repo: Arc::clone(&self.round_repo),
                publisher: Arc::clone(&self.publisher),
                clock: Arc::clone(&self.clock),
                state: Arc::clone(&state),
                done: Arc::clone(&done),
                stop_rx,
                round_duration,
                max_rounds,
            };

            registry.insert(
                simulation_id.to_string(),
                SimulationHandle {
                    stop_tx,
                    state,
                    done,
                },
            );
            (round, tick_loop)
        };

        tokio::spawn(tick_loop.run());

        info!(
            simulation_id = %simulation_id,
            simulation_name = %simulation.simulation_name,
            round_no = round.round_no,
            round_duration_secs = round_duration.as_secs(),
            max_rounds,
            "推演启动"
        );
        self.publish_event(
            SimulationEvent::broadcast(
                SimulationEventType::RoundStarted,
                json!({
                    "round_no": round.round_no,
                    "round_duration_seconds": round_duration.as_secs(),
                    "max_rounds": max_rounds,
                }),
            )
            .with_simulation(simulation_id),
        );

        Ok(round)
    }

    /// 停止一场推演（幂等）
    ///
    /// 撤销注册、打断节拍等待、回写持久化运行标记并广播 SimulationStopped。
    ///
    /// # 返回
    /// - `Ok(true)`: 本次确实停掉了一条在跑的循环
    /// - `Ok(false)`: 本就没在跑,无事发生
    pub fn stop(&self, simulation_id: &str) -> SchedulerResult<bool> {
        let removed = {
            let mut registry = self.lock_registry()?;
            registry.remove(simulation_id)
        };

        match removed {
            Some(handle) => {
                let was_live = !handle.done.load(Ordering::SeqCst);
                // 循环若已自行收场,停止信号无人接收也无妨
                let _ = handle.stop_tx.send(true);
                self.clear_running_flag(simulation_id);

                if was_live {
                    let stopped_at = lock_state(&handle.state).round_no;
                    info!(
                        simulation_id = %simulation_id,
                        stopped_at_round = stopped_at,
                        "推演停止"
                    );
                    self.publish_event(
                        SimulationEvent::broadcast(
                            SimulationEventType::SimulationStopped,
                            json!({ "stopped_at_round": stopped_at }),
                        )
                        .with_simulation(simulation_id),
                    );
                }
                Ok(was_live)
            }
            None => {
                // 注册表无记录但持久化标记还挂着(进程重启残留),顺手修复
                if let Some(simulation) = self.simulation_repo.find_by_id(simulation_id)? {
                    if simulation.is_running {
                        self.clear_running_flag(simulation_id);
                    }
                }
                Ok(false)
            }
        }
    }

    /// 查询推演运行状态（无副作用,可并发调用）
    ///
    /// 在跑的推演返回注册表里的实时回合与剩余秒数；
    /// 未注册（从未启动/已停止/进程重启）统一返回未运行,绝不报错。
    pub fn status(&self, simulation_id: &str) -> SchedulerResult<SimulationStatus> {
        let live = {
            let registry = self.lock_registry()?;
            registry
                .get(simulation_id)
                .filter(|handle| !handle.done.load(Ordering::SeqCst))
                .map(|handle| {
                    let state = lock_state(&handle.state);
                    (
                        state.round_no,
                        state
                            .deadline
                            .saturating_duration_since(Instant::now())
                            .as_secs(),
                    )
                })
        };

        if let Some((round_no, seconds_remaining)) = live {
            return Ok(SimulationStatus {
                simulation_id: simulation_id.to_string(),
                is_running: true,
                current_round: round_no,
                seconds_remaining,
            });
        }

        let current_round = self
            .round_repo
            .find_latest(simulation_id)?
            .map(|round| round.round_no)
            .unwrap_or(0);
        Ok(SimulationStatus {
            simulation_id: simulation_id.to_string(),
            is_running: false,
            current_round,
            seconds_remaining: 0,
        })
    }

    /// 查询倒计时剩余秒数（仅供看板展示,权威节拍以 NewRound 事件为准）
    pub fn remaining_seconds(&self, simulation_id: &str) -> SchedulerResult<u64> {
        Ok(self.status(simulation_id)?.seconds_remaining)
    }

    /// 推演是否在跑（注册表视角）
    pub fn is_running(&self, simulation_id: &str) -> SchedulerResult<bool> {
        let registry = self.lock_registry()?;
        Ok(registry
            .get(simulation_id)
            .map(|handle| !handle.done.load(Ordering::SeqCst))
            .unwrap_or(false))
    }

    fn lock_registry(&self) -> SchedulerResult<MutexGuard<'_, HashMap<String, SimulationHandle>>> {
        self.registry
            .lock()
            .map_err(|e| SchedulerError::Internal(format!("调度注册表锁获取失败: {}", e)))
    }

    fn clear_running_flag(&self, simulation_id: &str) {
        match self.simulation_repo.set_running(simulation_id, false) {
            Ok(()) => {}
            Err(RepositoryError::NotFound { .. }) => {}
            Err(e) => {
                warn!(simulation_id = %simulation_id, error = %e, "回写运行标记失败")
            }
        }
    }

    fn publish_event(&self, event: SimulationEvent) {
        if let Err(e) = self.publisher.publish(event) {
            warn!(error = %e, "事件发布失败");
        }
    }
}

// ==========================================
// TickLoop - 节拍循环
// ==========================================

/// 一场推演的节拍循环,跑在独立 tokio 任务上
///
/// 同一推演的回合写入全部出自这一条循环,天然串行不重叠
struct TickLoop {
    simulation_id: String,
    simulation_repo: Arc<SimulationRepository>,
    round_repo: Arc<RoundRepository>,
    publisher: Arc<dyn SimulationEventPublisher>,
    clock: Arc<dyn Clock>,
    state: Arc<Mutex<TickState>>,
    done: Arc<AtomicBool>,
    stop_rx: watch::Receiver<bool>,
    round_duration: Duration,
    max_rounds: i64,
}

impl TickLoop {
    async fn run(mut self) {
        loop {
            let wait = {
                let state = lock_state(&self.state);
                state.deadline.saturating_duration_since(Instant::now())
            };

            tokio::select! {
                _ = self.clock.after(wait) => {}
                changed = self.stop_rx.changed() => {
                    match changed {
                        Ok(()) if *self.stop_rx.borrow() => break,
                        Ok(()) => continue,
                        // 发送端被回收,等同停止
                        Err(_) => break,
                    }
                }
            }

            if self.tick() {
                break;
            }
        }
        self.done.store(true, Ordering::SeqCst);
    }

    /// 处理一次到点节拍,返回 true 表示循环应当收场
    fn tick(&self) -> bool {
        // 回合号每拍都从存储重新取,进程中途重启也不会跳号
        let latest_no = match self.round_repo.find_latest(&self.simulation_id) {
            Ok(Some(round)) => round.round_no,
            Ok(None) => 0,
            Err(e) => {
                error!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "读取最新回合失败,本拍跳过"
                );
                self.advance_deadline();
                return false;
            }
        };

        if latest_no >= self.max_rounds {
            if let Err(e) = self.simulation_repo.set_running(&self.simulation_id, false) {
                error!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "暂停时回写运行标记失败"
                );
            }
            info!(
                simulation_id = %self.simulation_id,
                final_round = latest_no,
                "达到最大回合数,推演暂停"
            );
            self.publish(
                SimulationEvent::broadcast(
                    SimulationEventType::SimulationPaused,
                    json!({ "final_round": latest_no }),
                )
                .with_simulation(&self.simulation_id),
            );
            return true;
        }

        match self.round_repo.create_next(&self.simulation_id) {
            Ok(round) => {
                lock_state(&self.state).round_no = round.round_no;
                info!(
                    simulation_id = %self.simulation_id,
                    round_no = round.round_no,
                    "进入新回合"
                );
                self.publish(
                    SimulationEvent::broadcast(
                        SimulationEventType::NewRound,
                        json!({ "round_no": round.round_no }),
                    )
                    .with_simulation(&self.simulation_id),
                );
            }
            Err(e) => {
                // 写入失败不前进,下一拍以同一回合号重试,序列不留空洞
                error!(
                    simulation_id = %self.simulation_id,
                    error = %e,
                    "回合写入失败,下一拍重试"
                );
            }
        }

        self.advance_deadline();
        false
    }

    fn advance_deadline(&self) {
        let mut state = lock_state(&self.state);
        let next = state.deadline + self.round_duration;
        // 锚定推进防止节拍漂移;整拍落后(如调试停表)则重新锚定,不补发滞后回合
        state.deadline = if next <= Instant::now() {
            Instant::now() + self.round_duration
        } else {
            next
        };
    }

    fn publish(&self, event: SimulationEvent) {
        if let Err(e) = self.publisher.publish(event) {
            warn!(simulation_id = %self.simulation_id, error = %e, "事件发布失败");
        }
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{config_keys, ConfigManager};
    use crate::db;
    use crate::domain::simulation::Simulation;
    use crate::engine::clock::ManualClock;
    use crate::engine::events::NoOpEventPublisher;
    use rusqlite::Connection;

    struct TestRig {
        scheduler: RoundScheduler,
        clock: Arc<ManualClock>,
        simulation_id: String,
        simulation_repo: Arc<SimulationRepository>,
        round_repo: Arc<RoundRepository>,
    }

    fn build_rig(max_rounds: i64) -> TestRig {
        let conn = Connection::open_in_memory().unwrap();
        db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let config = ConfigManager::from_connection(Arc::clone(&conn)).unwrap();
        config
            .set_value(config_keys::ROUND_DURATION_SECONDS, "1")
            .unwrap();
        config
            .set_value(config_keys::MAX_ROUNDS, &max_rounds.to_string())
            .unwrap();

        let simulation_repo = Arc::new(SimulationRepository::new(Arc::clone(&conn)));
        let round_repo = Arc::new(RoundRepository::new(Arc::clone(&conn)));
        let clock = Arc::new(ManualClock::new());

        let simulation = Simulation::new("调度测试");
        simulation_repo.create(&simulation).unwrap();

        let scheduler = RoundScheduler::new(
            Arc::clone(&simulation_repo),
            Arc::clone(&round_repo),
            Arc::new(config),
            Arc::new(NoOpEventPublisher),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );

        TestRig {
            scheduler,
            clock,
            simulation_id: simulation.simulation_id,
            simulation_repo,
            round_repo,
        }
    }

    async fn wait_for_round(rig: &TestRig, round_no: i64) {
        for _ in 0..200 {
            let status = rig.scheduler.status(&rig.simulation_id).unwrap();
            if status.current_round >= round_no {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("等待回合{}超时", round_no);
    }

    async fn wait_until_not_running(rig: &TestRig) {
        for _ in 0..200 {
            if !rig.scheduler.is_running(&rig.simulation_id).unwrap() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("等待推演收场超时");
    }

    #[tokio::test]
    async fn test_start_creates_first_round_and_live_status() {
        let rig = build_rig(36);
        let round = rig.scheduler.start(&rig.simulation_id).await.unwrap();
        assert_eq!(round.round_no, 1);

        let status = rig.scheduler.status(&rig.simulation_id).unwrap();
        assert!(status.is_running);
        assert_eq!(status.current_round, 1);
        assert!(status.seconds_remaining <= 1);

        let persisted = rig
            .simulation_repo
            .find_by_id(&rig.simulation_id)
            .unwrap()
            .unwrap();
        assert!(persisted.is_running);
    }

    #[tokio::test]
    async fn test_double_start_conflicts() {
        let rig = build_rig(36);
        rig.scheduler.start(&rig.simulation_id).await.unwrap();

        let err = rig.scheduler.start(&rig.simulation_id).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_start_unknown_simulation() {
        let rig = build_rig(36);
        let err = rig.scheduler.start("no-such-simulation").await.unwrap_err();
        assert!(matches!(err, SchedulerError::SimulationNotFound(_)));
    }

    #[tokio::test]
    async fn test_manual_ticks_advance_rounds() {
        let rig = build_rig(36);
        rig.scheduler.start(&rig.simulation_id).await.unwrap();

        rig.clock.tick();
        wait_for_round(&rig, 2).await;
        rig.clock.tick();
        wait_for_round(&rig, 3).await;

        let numbers: Vec<i64> = rig
            .round_repo
            .list_by_simulation(&rig.simulation_id)
            .unwrap()
            .iter()
            .map(|round| round.round_no)
            .collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_pause_at_max_rounds() {
        let rig = build_rig(2);
        rig.scheduler.start(&rig.simulation_id).await.unwrap();

        rig.clock.tick();
        wait_for_round(&rig, 2).await;
        // 回合史已满,这一拍触发暂停而不是回合3
        rig.clock.tick();
        wait_until_not_running(&rig).await;

        let status = rig.scheduler.status(&rig.simulation_id).unwrap();
        assert!(!status.is_running);
        assert_eq!(status.current_round, 2);
        assert_eq!(status.seconds_remaining, 0);

        let persisted = rig
            .simulation_repo
            .find_by_id(&rig.simulation_id)
            .unwrap()
            .unwrap();
        assert!(!persisted.is_running);

        let err = rig.scheduler.start(&rig.simulation_id).await.unwrap_err();
        assert!(matches!(err, SchedulerError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let rig = build_rig(36);
        rig.scheduler.start(&rig.simulation_id).await.unwrap();

        assert!(rig.scheduler.stop(&rig.simulation_id).unwrap());
        assert!(!rig.scheduler.stop(&rig.simulation_id).unwrap());

        let status = rig.scheduler.status(&rig.simulation_id).unwrap();
        assert!(!status.is_running);
        assert_eq!(status.current_round, 1);

        let persisted = rig
            .simulation_repo
            .find_by_id(&rig.simulation_id)
            .unwrap()
            .unwrap();
        assert!(!persisted.is_running);
    }

    #[tokio::test]
    async fn test_status_for_never_started() {
        let rig = build_rig(36);

        let status = rig.scheduler.status(&rig.simulation_id).unwrap();
        assert!(!status.is_running);
        assert_eq!(status.current_round, 0);
        assert_eq!(status.seconds_remaining, 0);

        // 查完全未知的ID同样不报错
        let status = rig.scheduler.status("ghost").unwrap();
        assert!(!status.is_running);
        assert_eq!(status.current_round, 0);
    }

    #[tokio::test]
    async fn test_restart_resumes_round_numbering() {
        let rig = build_rig(36);
        rig.scheduler.start(&rig.simulation_id).await.unwrap();
        rig.clock.tick();
        wait_for_round(&rig, 2).await;

        assert!(rig.scheduler.stop(&rig.simulation_id).unwrap());
        wait_until_not_running(&rig).await;

        // 重启续接历史编号,不回到 1
        let round = rig.scheduler.start(&rig.simulation_id).await.unwrap();
        assert_eq!(round.round_no, 3);
    }
}
