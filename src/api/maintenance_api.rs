// ==========================================
// 电机工厂流水线推演系统 - 检修 API
// ==========================================
// 职责: 检修工单登记、完工与占用查询
// 红线: 同一 (回合,产线) 最多一条未完成工单
// 红线: 所有变更型接口必须落操作日志
// ==========================================

use std::sync::Arc;

use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, RoundConfigReader};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::maintenance::MaintenanceOrder;
use crate::domain::types::ProductionLine;
use crate::engine::events::{
    Audience, SimulationEvent, SimulationEventPublisher, SimulationEventType,
};
use crate::engine::maintenance::MaintenanceRegistry;
use crate::repository::ActionLogRepository;

// ==========================================
// MaintenanceApi - 检修 API
// ==========================================

/// 检修API
///
/// 职责：
/// 1. 登记检修工单（带回合范围与排它校验）
/// 2. 完成检修（释放产线占用）
/// 3. 工单与占用查询
pub struct MaintenanceApi {
    maintenance_registry: Arc<MaintenanceRegistry>,
    config_manager: Arc<ConfigManager>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: Arc<dyn SimulationEventPublisher>,
}

impl MaintenanceApi {
    pub fn new(
        maintenance_registry: Arc<MaintenanceRegistry>,
        config_manager: Arc<ConfigManager>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: Arc<dyn SimulationEventPublisher>,
    ) -> Self {
        Self {
            maintenance_registry,
            config_manager,
            action_log_repo,
            event_publisher,
        }
    }

    /// 登记检修工单
    ///
    /// 回合号须落在 1..=最大回合数 之内；
    /// 同一 (回合,产线) 已有未完成工单时拒绝。
    pub async fn schedule_maintenance(
        &self,
        round_no: i64,
        line: ProductionLine,
        description: &str,
        scheduled_by: &str,
    ) -> ApiResult<MaintenanceOrder> {
        if scheduled_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("登记人不能为空".to_string()));
        }
        if description.trim().is_empty() {
            return Err(ApiError::InvalidInput("检修说明不能为空".to_string()));
        }
        let max_rounds = self
            .config_manager
            .get_max_rounds()
            .await
            .map_err(|e| ApiError::ConfigError(e.to_string()))?;
        if !(1..=max_rounds).contains(&round_no) {
            return Err(ApiError::InvalidInput(format!(
                "回合号须在1..={}之间",
                max_rounds
            )));
        }

        let order = self
            .maintenance_registry
            .schedule(round_no, line, description.trim())?;

        let action_log = ActionLog::new(ActionType::ScheduleMaintenance, scheduled_by)
            .with_payload(json!({
                "maintenance_id": order.maintenance_id,
                "round_no": round_no,
                "production_line": line.to_db(),
            }))
            .with_detail(format!(
                "登记检修: 回合{}产线{}, {}",
                round_no,
                line,
                description.trim()
            ));
        self.action_log_repo.insert(&action_log)?;

        self.publish_event(SimulationEvent::for_audience(
            SimulationEventType::MaintenanceScheduled,
            Audience::Production,
            json!({
                "maintenance_id": order.maintenance_id,
                "round_no": round_no,
                "production_line": line.to_db(),
            }),
        ));

        Ok(order)
    }

    /// 完成检修工单
    ///
    /// # 返回
    /// - `Ok(true)`: 本次完工生效,产线占用释放
    /// - `Ok(false)`: 此前已完工,幂等不变
    pub fn complete_maintenance(&self, maintenance_id: i64, completed_by: &str) -> ApiResult<bool> {
        if completed_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let changed = self.maintenance_registry.complete(maintenance_id)?;

        let action_log = ActionLog::new(ActionType::CompleteMaintenance, completed_by)
            .with_payload(json!({
                "maintenance_id": maintenance_id,
                "first_completion": changed,
            }))
            .with_detail("完成检修");
        self.action_log_repo.insert(&action_log)?;

        if changed {
            self.publish_event(SimulationEvent::for_audience(
                SimulationEventType::MaintenanceCompleted,
                Audience::Production,
                json!({ "maintenance_id": maintenance_id }),
            ));
        }
        Ok(changed)
    }

    /// 按ID查询工单
    pub fn get_maintenance(&self, maintenance_id: i64) -> ApiResult<MaintenanceOrder> {
        self.maintenance_registry
            .find_by_id(maintenance_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("MaintenanceOrder(id={})不存在", maintenance_id))
            })
    }

    /// 查询全部工单
    pub fn list_maintenance(&self) -> ApiResult<Vec<MaintenanceOrder>> {
        Ok(self.maintenance_registry.list_all()?)
    }

    /// 查询指定回合的工单
    pub fn list_by_round(&self, round_no: i64) -> ApiResult<Vec<MaintenanceOrder>> {
        Ok(self.maintenance_registry.list_by_round(round_no)?)
    }

    /// 查询 (回合,产线) 是否被检修占用
    pub fn is_line_blocked(&self, round_no: i64, line: ProductionLine) -> ApiResult<bool> {
        Ok(self.maintenance_registry.is_blocked(round_no, line)?)
    }

    fn publish_event(&self, event: SimulationEvent) {
        if let Err(e) = self.event_publisher.publish(event) {
            tracing::warn!(error = %e, "事件发布失败");
        }
    }
}

// ==========================================
// 单元测试
// ==========================================
