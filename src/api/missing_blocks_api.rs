// ==========================================
// 电机工厂流水线推演系统 - 缺件处理 API
// ==========================================
// 职责: 缺件上报、跑单员/供应商队列、补齐回流
// 红线: 上报与订单转停产同事务,补齐与订单回流同事务
// 红线: 所有变更型接口必须落操作日志
// ==========================================

use std::sync::Arc;

use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::missing_blocks::{MissingBlocksRequest, NewMissingBlocksRequest};
use crate::domain::order::Order;
use crate::domain::types::BlockCounts;
use crate::engine::events::{
    Audience, SimulationEvent, SimulationEventPublisher, SimulationEventType,
};
use crate::repository::error::RepositoryError;
use crate::repository::{ActionLogRepository, MissingBlocksRepository, OrderRepository};

// ==========================================
// MissingBlocksApi - 缺件处理 API
// ==========================================

/// 缺件处理API
///
/// 职责：
/// 1. 产线上报缺件（订单同步转 ProductionError）
/// 2. 跑单员队列与供应商队列查询
/// 3. 补齐回流（订单带插队标记回 Pending）
pub struct MissingBlocksApi {
    missing_blocks_repo: Arc<MissingBlocksRepository>,
    order_repo: Arc<OrderRepository>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: Arc<dyn SimulationEventPublisher>,
}

impl MissingBlocksApi {
    pub fn new(
        missing_blocks_repo: Arc<MissingBlocksRepository>,
        order_repo: Arc<OrderRepository>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: Arc<dyn SimulationEventPublisher>,
    ) -> Self {
        Self {
            missing_blocks_repo,
            order_repo,
            action_log_repo,
            event_publisher,
        }
    }

    // ==========================================
    // 上报接口
    // ==========================================

    /// 产线上报缺件
    ///
    /// 订单必须处于生产中；上报成功后订单转入 `ProductionError`,
    /// 申请进入跑单员队列。
    ///
    /// # 参数
    /// - `order_id`: 缺件订单
    /// - `missing`: 三色缺件数量,不能为负、不能全零
    /// - `reported_by`: 上报人
    pub fn report_missing_blocks(
        &self,
        order_id: i64,
        missing: BlockCounts,
        reported_by: &str,
    ) -> ApiResult<MissingBlocksRequest> {
        if reported_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("上报人不能为空".to_string()));
        }
        if missing.has_negative() {
            return Err(ApiError::InvalidInput("缺件数量不能为负".to_string()));
        }
        if missing.is_empty() {
            return Err(ApiError::InvalidInput("缺件数量不能全为零".to_string()));
        }

        let request = self
            .missing_blocks_repo
            .create_for_production_error(&NewMissingBlocksRequest { order_id, missing })
            .map_err(|err| match err {
                RepositoryError::StaleStatus { actual, .. } => ApiError::InvalidTransition {
                    from: actual,
                    trigger: "REPORT_MISSING_BLOCKS".to_string(),
                    reason: "订单不在生产中,无法上报缺件".to_string(),
                },
                other => other.into(),
            })?;
        let order = self.get_owning_order(order_id)?;

        let action_log = ActionLog::new(ActionType::ReportMissingBlocks, reported_by)
            .with_simulation(&order.simulation_id)
            .with_order(order_id)
            .with_payload(json!({
                "request_id": request.request_id,
                "missing": missing,
                "production_line": request.production_line.to_db(),
            }))
            .with_detail(format!("上报缺件: {}", missing));
        self.action_log_repo.insert(&action_log)?;

        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::MissingBlocksReported,
                Audience::Runners,
                json!({
                    "request_id": request.request_id,
                    "order_id": order_id,
                    "missing": missing,
                }),
            )
            .with_simulation(&order.simulation_id),
        );
        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::OrderStatusChanged,
                Audience::Production,
                json!({
                    "order_id": order_id,
                    "from": "IN_PRODUCTION",
                    "to": "PRODUCTION_ERROR",
                    "action": "REPORT_MISSING_BLOCKS",
                }),
            )
            .with_simulation(&order.simulation_id),
        );

        tracing::info!(
            request_id = request.request_id,
            order_id,
            missing = %missing,
            "产线上报缺件"
        );
        Ok(request)
    }

    // ==========================================
    // 队列与流转接口
    // ==========================================

    /// 跑单员队列（未补齐且尚未尝试取件）
    pub fn runner_queue(&self) -> ApiResult<Vec<MissingBlocksRequest>> {
        Ok(self.missing_blocks_repo.runner_queue()?)
    }

    /// 供应商队列（跑单员取件失败后转入）
    pub fn supplier_queue(&self) -> ApiResult<Vec<MissingBlocksRequest>> {
        Ok(self.missing_blocks_repo.supplier_queue()?)
    }

    /// 按ID查询缺件申请
    pub fn get_request(&self, request_id: i64) -> ApiResult<MissingBlocksRequest> {
        self.missing_blocks_repo
            .find_by_id(request_id)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("MissingBlocksRequest(id={})不存在", request_id))
            })
    }

    /// 查询订单当前未补齐的缺件申请
    pub fn find_open_by_order(&self, order_id: i64) -> ApiResult<Option<MissingBlocksRequest>> {
        Ok(self.missing_blocks_repo.find_open_by_order(order_id)?)
    }

    /// 跑单员登记一次取件尝试,申请转入供应商队列
    ///
    /// # 返回
    /// - `Ok(true)`: 本次登记生效
    /// - `Ok(false)`: 此前已登记过,幂等不变
    pub fn mark_runner_attempted(&self, request_id: i64, actor: &str) -> ApiResult<bool> {
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        let request = self.get_request(request_id)?;
        let changed = self.missing_blocks_repo.mark_runner_attempted(request_id)?;

        let order = self.get_owning_order(request.order_id)?;
        let action_log = ActionLog::new(ActionType::RunnerAttempt, actor)
            .with_simulation(&order.simulation_id)
            .with_order(request.order_id)
            .with_payload(json!({
                "request_id": request_id,
                "first_attempt": changed,
            }))
            .with_detail("跑单员取件失败,转入供应商队列");
        self.action_log_repo.insert(&action_log)?;

        Ok(changed)
    }

    /// 供应商补齐缺件,订单带插队标记回流
    ///
    /// # 返回
    /// 回流后的订单（`Pending` 且 `returned_from_missing_blocks=true`）
    pub fn resolve_missing_blocks(&self, request_id: i64, resolved_by: &str) -> ApiResult<Order> {
        if resolved_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("补齐人不能为空".to_string()));
        }

        let order_id = self
            .missing_blocks_repo
            .resolve(request_id, resolved_by)
            .map_err(|err| match err {
                RepositoryError::StaleStatus { actual, .. } => ApiError::InvalidTransition {
                    from: actual,
                    trigger: "RESOLVE_MISSING_BLOCKS".to_string(),
                    reason: "订单已不在缺件停产状态,无法回流".to_string(),
                },
                other => other.into(),
            })?;
        let order = self.get_owning_order(order_id)?;

        let action_log = ActionLog::new(ActionType::ResolveMissingBlocks, resolved_by)
            .with_simulation(&order.simulation_id)
            .with_order(order_id)
            .with_payload(json!({ "request_id": request_id }))
            .with_detail("缺件已补齐,订单插队回流");
        self.action_log_repo.insert(&action_log)?;

        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::MissingBlocksResolved,
                Audience::Suppliers,
                json!({
                    "request_id": request_id,
                    "order_id": order_id,
                }),
            )
            .with_simulation(&order.simulation_id),
        );
        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::OrderStatusChanged,
                Audience::Inventory,
                json!({
                    "order_id": order_id,
                    "from": "PRODUCTION_ERROR",
                    "to": "PENDING",
                    "action": "RESOLVE_MISSING_BLOCKS",
                }),
            )
            .with_simulation(&order.simulation_id),
        );

        tracing::info!(request_id, order_id, "缺件补齐,订单回流");
        Ok(order)
    }

    fn get_owning_order(&self, order_id: i64) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order(id={})不存在", order_id)))
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
