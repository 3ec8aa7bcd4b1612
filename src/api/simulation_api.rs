// ==========================================
// 电机工厂流水线推演系统 - 模拟管理 API
// ==========================================
// 职责: 模拟的建删查、推演启停、状态查询与参数管理
// 红线: 所有变更型接口必须落操作日志
// ==========================================

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{config_keys, ConfigManager, RoundConfigReader};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::simulation::{Round, Simulation, SimulationStatus};
use crate::engine::scheduler::RoundScheduler;
use crate::repository::{
    ActionLogRepository, MissingBlocksRepository, OrderRepository, RoundRepository,
    SimulationRepository,
};

/// 推演参数视图
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    pub round_duration_seconds: u64, // 每回合时长(秒)
    pub max_rounds: i64,             // 最大回合数
}

// ==========================================
// SimulationApi - 模拟管理 API
// ==========================================

/// 模拟管理API
///
/// 职责：
/// 1. 模拟管理（创建、查询、删除）
/// 2. 推演控制（启动、停止、状态查询）
/// 3. 推演参数（查询、调整）
pub struct SimulationApi {
    simulation_repo: Arc<SimulationRepository>,
    round_repo: Arc<RoundRepository>,
    order_repo: Arc<OrderRepository>,
    missing_blocks_repo: Arc<MissingBlocksRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    config_manager: Arc<ConfigManager>,
    scheduler: Arc<RoundScheduler>,
}

impl SimulationApi {
    pub fn new(
        simulation_repo: Arc<SimulationRepository>,
        round_repo: Arc<RoundRepository>,
        order_repo: Arc<OrderRepository>,
        missing_blocks_repo: Arc<MissingBlocksRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        config_manager: Arc<ConfigManager>,
        scheduler: Arc<RoundScheduler>,
    ) -> Self {
        Self {
            simulation_repo,
            round_repo,
            order_repo,
            missing_blocks_repo,
            action_log_repo,
            config_manager,
            scheduler,
        }
    }

    // ==========================================
    // 模拟管理接口
    // ==========================================

    /// 创建模拟
    ///
    /// # 参数
    /// - `simulation_name`: 模拟名称
    /// - `created_by`: 创建人
    pub fn create_simulation(
        &self,
        simulation_name: &str,
        created_by: &str,
    ) -> ApiResult<Simulation> {
        if simulation_name.trim().is_empty() {
            return Err(ApiError::InvalidInput("模拟名称不能为空".to_string()));
        }
        if created_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("创建人不能为空".to_string()));
        }

        let simulation = Simulation::new(simulation_name.trim());
        self.simulation_repo.create(&simulation)?;

        let action_log = ActionLog::new(ActionType::CreateSimulation, created_by)
            .with_simulation(&simulation.simulation_id)
            .with_payload(json!({ "simulation_name": simulation.simulation_name }))
            .with_detail(format!("创建模拟: {}", simulation.simulation_name));
        self.action_log_repo.insert(&action_log)?;

        tracing::info!(
            simulation_id = %simulation.simulation_id,
            simulation_name = %simulation.simulation_name,
            "模拟已创建"
        );
        Ok(simulation)
    }

    /// 查询模拟列表（创建时间倒序）
    pub fn list_simulations(&self) -> ApiResult<Vec<Simulation>> {
        Ok(self.simulation_repo.list_all()?)
    }

    /// 按ID查询模拟
    pub fn get_simulation(&self, simulation_id: &str) -> ApiResult<Simulation> {
        self.simulation_repo
            .find_by_id(simulation_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Simulation(id={})不存在", simulation_id)))
    }

    /// 删除模拟及其全部关联数据
    ///
    /// 推演进行中的模拟拒绝删除,须先停止。
    /// 删除顺序: 缺件申请 -> 订单 -> 回合 -> 模拟本体；操作日志保留作审计。
    pub fn delete_simulation(&self, simulation_id: &str, operator: &str) -> ApiResult<()> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        if self.scheduler.is_running(simulation_id)? {
            return Err(ApiError::Conflict(
                "推演进行中,须先停止再删除".to_string(),
            ));
        }
        let simulation = self.get_simulation(simulation_id)?;

        let deleted_requests = self.missing_blocks_repo.delete_by_simulation(simulation_id)?;
        let deleted_orders = self.order_repo.delete_by_simulation(simulation_id)?;
        let deleted_rounds = self.round_repo.delete_by_simulation(simulation_id)?;
        self.simulation_repo.delete(simulation_id)?;

        let action_log = ActionLog::new(ActionType::DeleteSimulation, operator)
            .with_simulation(simulation_id)
            .with_payload(json!({
                "simulation_name": simulation.simulation_name,
                "deleted_orders": deleted_orders,
                "deleted_rounds": deleted_rounds,
                "deleted_missing_blocks_requests": deleted_requests,
            }))
            .with_detail(format!("删除模拟: {}", simulation.simulation_name));
        self.action_log_repo.insert(&action_log)?;

        tracing::info!(
            simulation_id = %simulation_id,
            deleted_orders,
            deleted_rounds,
            "模拟已删除"
        );
        Ok(())
    }

    // ==========================================
    // 推演控制接口
    // ==========================================

    /// 启动回合推演
    ///
    /// # 返回
    /// 启动落库的回合；已在跑或回合史已满返回 `Conflict`
    pub async fn start_simulation(&self, simulation_id: &str, operator: &str) -> ApiResult<Round> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let round = self.scheduler.start(simulation_id).await?;

        let action_log = ActionLog::new(ActionType::StartSimulation, operator)
            .with_simulation(simulation_id)
            .with_payload(json!({ "round_no": round.round_no }))
            .with_detail(format!("启动推演,从回合{}开始", round.round_no));
        self.action_log_repo.insert(&action_log)?;

        Ok(round)
    }

    /// 停止回合推演（幂等）
    ///
    /// # 返回
    /// - `Ok(true)`: 停掉了在跑的推演
    /// - `Ok(false)`: 本就没在跑
    pub fn stop_simulation(&self, simulation_id: &str, operator: &str) -> ApiResult<bool> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let was_running = self.scheduler.stop(simulation_id)?;

        let action_log = ActionLog::new(ActionType::StopSimulation, operator)
            .with_simulation(simulation_id)
            .with_payload(json!({ "was_running": was_running }))
            .with_detail(if was_running {
                "停止推演"
            } else {
                "停止推演(本就未在跑)"
            });
        self.action_log_repo.insert(&action_log)?;

        Ok(was_running)
    }

    /// 查询推演运行状态（无副作用）
    pub fn get_simulation_status(&self, simulation_id: &str) -> ApiResult<SimulationStatus> {
        Ok(self.scheduler.status(simulation_id)?)
    }

    // ==========================================
    // 推演参数接口
    // ==========================================

    /// 查询推演参数
    pub async fn get_config(&self) -> ApiResult<RoundConfig> {
        let round_duration_seconds = self
            .config_manager
            .get_round_duration_seconds()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        let max_rounds = self
            .config_manager
            .get_max_rounds()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        Ok(RoundConfig {
            round_duration_seconds,
            max_rounds,
        })
    }

    /// 调整推演参数
    ///
    /// 在跑的推演持有启动时的配置快照,调整在下次启动时生效。
    pub async fn update_config(
        &self,
        round_duration_seconds: Option<u64>,
        max_rounds: Option<i64>,
        operator: &str,
    ) -> ApiResult<RoundConfig> {
        if operator.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        if round_duration_seconds.is_none() && max_rounds.is_none() {
            return Err(ApiError::InvalidInput(
                "至少提供一项要调整的参数".to_string(),
            ));
        }

        if let Some(seconds) = round_duration_seconds {
            if seconds == 0 {
                return Err(ApiError::InvalidInput("回合时长必须为正".to_string()));
            }
            self.config_manager
                .set_value(config_keys::ROUND_DURATION_SECONDS, &seconds.to_string())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        }
        if let Some(rounds) = max_rounds {
            if rounds <= 0 {
                return Err(ApiError::InvalidInput("最大回合数必须为正".to_string()));
            }
            self.config_manager
                .set_value(config_keys::MAX_ROUNDS, &rounds.to_string())
                .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        }

        let action_log = ActionLog::new(ActionType::UpdateConfig, operator)
            .with_payload(json!({
                "round_duration_seconds": round_duration_seconds,
                "max_rounds": max_rounds,
            }))
            .with_detail("调整推演参数,下次启动生效");
        self.action_log_repo.insert(&action_log)?;

        self.get_config().await
    }
}

// ==========================================
// 单元测试
// ==========================================
