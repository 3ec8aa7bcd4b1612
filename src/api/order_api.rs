// ==========================================
// 电机工厂流水线推演系统 - 订单 API
// ==========================================
// 职责: 客户下单、各部门状态流转、排产队列与积木需求查询
// 红线: 状态变更必须经状态机判定 + CAS 条件更新,并发最多一个生效
// 红线: 所有变更型接口必须落操作日志
// ==========================================

use std::sync::Arc;

use serde_json::json;

use crate::api::error::{ApiError, ApiResult};
use crate::domain::action_log::{ActionLog, ActionType};
use crate::domain::order::{NewOrder, Order};
use crate::domain::types::{BlockCounts, MotorType, OrderStatus, ProductionLine};
use crate::engine::blocks;
use crate::engine::events::{
    Audience, SimulationEvent, SimulationEventPublisher, SimulationEventType,
};
use crate::engine::maintenance::MaintenanceRegistry;
use crate::engine::workflow::{OrderAction, OrderWorkflow, TransitionContext, TransitionDecision};
use crate::repository::error::RepositoryError;
use crate::repository::{
    ActionLogRepository, OrderRepository, RoundRepository, SimulationRepository,
};

// ==========================================
// OrderApi - 订单 API
// ==========================================

/// 订单API
///
/// 职责：
/// 1. 客户下单（进入 Pending）
/// 2. 部门动作驱动的状态流转（状态机判定 + CAS 写入）
/// 3. 排产队列查询（回流订单插队）
/// 4. 积木需求核算
pub struct OrderApi {
    order_repo: Arc<OrderRepository>,
    round_repo: Arc<RoundRepository>,
    simulation_repo: Arc<SimulationRepository>,
    maintenance_registry: Arc<MaintenanceRegistry>,
    action_log_repo: Arc<ActionLogRepository>,
    event_publisher: Arc<dyn SimulationEventPublisher>,
}

impl OrderApi {
    pub fn new(
        order_repo: Arc<OrderRepository>,
        round_repo: Arc<RoundRepository>,
        simulation_repo: Arc<SimulationRepository>,
        maintenance_registry: Arc<MaintenanceRegistry>,
        action_log_repo: Arc<ActionLogRepository>,
        event_publisher: Arc<dyn SimulationEventPublisher>,
    ) -> Self {
        Self {
            order_repo,
            round_repo,
            simulation_repo,
            maintenance_registry,
            action_log_repo,
            event_publisher,
        }
    }

    // ==========================================
    // 下单接口
    // ==========================================

    /// 客户下单
    ///
    /// # 参数
    /// - `simulation_id`: 所属模拟
    /// - `motor_type`: 电机型号
    /// - `quantity`: 台数,必须为正
    /// - `requested_by`: 下单人
    ///
    /// # 返回
    /// 新订单,初始状态 `Pending`,记录下单时所处回合
    pub fn place_order(
        &self,
        simulation_id: &str,
        motor_type: MotorType,
        quantity: i32,
        requested_by: &str,
    ) -> ApiResult<Order> {
        if quantity <= 0 {
            return Err(ApiError::InvalidInput("订单台数必须为正".to_string()));
        }
        if requested_by.trim().is_empty() {
            return Err(ApiError::InvalidInput("下单人不能为空".to_string()));
        }
        if self.simulation_repo.find_by_id(simulation_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Simulation(id={})不存在",
                simulation_id
            )));
        }

        let placed_in_round = self
            .round_repo
            .find_latest(simulation_id)?
            .map(|round| round.round_no);

        let order = self.order_repo.insert(&NewOrder {
            simulation_id: simulation_id.to_string(),
            motor_type,
            quantity,
            placed_in_round,
            requested_by: requested_by.trim().to_string(),
        })?;

        let action_log = ActionLog::new(ActionType::PlaceOrder, requested_by)
            .with_simulation(simulation_id)
            .with_order(order.order_id)
            .with_payload(json!({
                "motor_type": motor_type.to_db_str(),
                "quantity": quantity,
                "placed_in_round": placed_in_round,
            }))
            .with_detail(format!("下单{}台{}型电机", quantity, motor_type.to_db_str()));
        self.action_log_repo.insert(&action_log)?;

        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::OrderPlaced,
                Audience::Inventory,
                json!({
                    "order_id": order.order_id,
                    "motor_type": motor_type.to_db_str(),
                    "quantity": quantity,
                }),
            )
            .with_simulation(simulation_id),
        );

        tracing::info!(
            order_id = order.order_id,
            simulation_id = %simulation_id,
            motor_type = motor_type.to_db_str(),
            quantity,
            "客户下单"
        );
        Ok(order)
    }

    // ==========================================
    // 状态流转接口
    // ==========================================

    /// 执行一次部门动作驱动的状态流转
    ///
    /// 判定顺序: 读订单 -> 状态机判定 -> CAS 条件写入。
    /// CAS 落空说明有并发操作抢先,同样以 `InvalidTransition` 拒绝。
    /// 缺件上报不走本接口（须附缺件数量,见缺件 API）。
    pub fn transition_order(
        &self,
        order_id: i64,
        action: OrderAction,
        actor: &str,
    ) -> ApiResult<Order> {
        if actor.trim().is_empty() {
            return Err(ApiError::InvalidInput("操作人不能为空".to_string()));
        }
        if matches!(action, OrderAction::ReportMissingBlocks) {
            return Err(ApiError::InvalidInput(
                "缺件上报须走缺件接口并附三色缺件数量".to_string(),
            ));
        }

        let order = self.get_order(order_id)?;
        let ctx = TransitionContext {
            returned_from_missing_blocks: order.returned_from_missing_blocks,
            line_assigned: order.production_line.is_some(),
            line_under_maintenance: match order.production_line {
                Some(line) => self
                    .maintenance_registry
                    .is_blocked_now(&order.simulation_id, line)?,
                None => false,
            },
        };

        let next = match OrderWorkflow::evaluate(order.status, action, &ctx) {
            TransitionDecision::Allowed(next) => next,
            TransitionDecision::Denied { reason } => {
                return Err(ApiError::InvalidTransition {
                    from: order.status.to_db_str().to_string(),
                    trigger: action.as_str().to_string(),
                    reason,
                })
            }
        };

        let cas_result = match action {
            OrderAction::AssignLine(line) => {
                self.order_repo
                    .assign_line(order_id, order.status, next, line)
            }
            OrderAction::StartProduction => {
                self.order_repo.start_production(order_id, order.status)
            }
            _ => self.order_repo.update_status(order_id, order.status, next),
        };
        if let Err(err) = cas_result {
            return Err(match err {
                // 并发抢先,换成带真实动作名的拒绝
                RepositoryError::StaleStatus { actual, .. } => ApiError::InvalidTransition {
                    from: actual,
                    trigger: action.as_str().to_string(),
                    reason: "订单状态已被并发操作修改".to_string(),
                },
                other => other.into(),
            });
        }

        let updated = self.get_order(order_id)?;

        let action_log = ActionLog::new(ActionType::TransitionOrder, actor)
            .with_simulation(&updated.simulation_id)
            .with_order(order_id)
            .with_payload(json!({
                "action": action.as_str(),
                "from": order.status.to_db_str(),
                "to": next.to_db_str(),
            }))
            .with_detail(format!(
                "订单状态 {} -> {}",
                order.status.to_db_str(),
                next.to_db_str()
            ));
        self.action_log_repo.insert(&action_log)?;

        self.publish_event(
            SimulationEvent::for_audience(
                SimulationEventType::OrderStatusChanged,
                Audience::for_order_status(next),
                json!({
                    "order_id": order_id,
                    "from": order.status.to_db_str(),
                    "to": next.to_db_str(),
                    "action": action.as_str(),
                }),
            )
            .with_simulation(&updated.simulation_id),
        );

        tracing::info!(
            order_id,
            from = order.status.to_db_str(),
            to = next.to_db_str(),
            action = action.as_str(),
            "订单状态流转"
        );
        Ok(updated)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 按ID查询订单
    pub fn get_order(&self, order_id: i64) -> ApiResult<Order> {
        self.order_repo
            .find_by_id(order_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Order(id={})不存在", order_id)))
    }

    /// 查询模拟下全部订单（先来先服务序）
    pub fn list_orders(&self, simulation_id: &str) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.list_by_simulation(simulation_id)?)
    }

    /// 按状态查询订单（各部门待办看板）
    pub fn list_orders_by_status(
        &self,
        simulation_id: &str,
        status: OrderStatus,
    ) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.list_by_status(simulation_id, status)?)
    }

    /// 查询产线待开工队列
    ///
    /// 缺件回流订单排在普通订单之前,组内按订单ID先来先服务
    pub fn production_queue(
        &self,
        simulation_id: &str,
        line: ProductionLine,
    ) -> ApiResult<Vec<Order>> {
        Ok(self.order_repo.production_queue(simulation_id, line)?)
    }

    /// 核算订单的积木总需求
    pub fn block_requirements(&self, order_id: i64) -> ApiResult<BlockCounts> {
        let order = self.get_order(order_id)?;
        Ok(blocks::requirement(order.motor_type, order.quantity))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::simulation::Simulation;
    use crate::engine::events::NoOpEventPublisher;
    use crate::repository::MaintenanceRepository;
    use rusqlite::Connection;
    use std::sync::Mutex;

    struct TestRig {
        api: OrderApi,
        round_repo: Arc<RoundRepository>,
        maintenance_registry: Arc<MaintenanceRegistry>,
        simulation_id: String,
    }

    fn build_rig() -> TestRig {
        let conn = Connection::open_in_memory().unwrap();
        db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        let order_repo = Arc::new(OrderRepository::new(Arc::clone(&conn)));
        let round_repo = Arc::new(RoundRepository::new(Arc::clone(&conn)));
        let simulation_repo = Arc::new(SimulationRepository::new(Arc::clone(&conn)));
        let maintenance_registry = Arc::new(MaintenanceRegistry::new(
            Arc::new(MaintenanceRepository::new(Arc::clone(&conn))),
            Arc::clone(&round_repo),
        ));
        let action_log_repo = Arc::new(ActionLogRepository::new(Arc::clone(&conn)));

        let simulation = Simulation::new("订单接口测试");
        simulation_repo.create(&simulation).unwrap();

        let api = OrderApi::new(
            order_repo,
            Arc::clone(&round_repo),
            simulation_repo,
            Arc::clone(&maintenance_registry),
            action_log_repo,
            Arc::new(NoOpEventPublisher),
        );
        TestRig {
            api,
            round_repo,
            maintenance_registry,
            simulation_id: simulation.simulation_id,
        }
    }

    #[test]
    fn test_place_order_validation() {
        let rig = build_rig();

        let err = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 0, "客户")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));

        let err = rig
            .api
            .place_order("ghost", MotorType::A, 1, "客户")
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::B, 2, "客户")
            .unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.placed_in_round, None);

        // 有回合后下单记录当前回合号
        rig.round_repo.create_next(&rig.simulation_id).unwrap();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::B, 2, "客户")
            .unwrap();
        assert_eq!(order.placed_in_round, Some(1));
    }

    #[test]
    fn test_full_lifecycle_transitions() {
        let rig = build_rig();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 1, "客户")
            .unwrap();
        let id = order.order_id;

        let steps = [
            (OrderAction::ApproveInventory, OrderStatus::ApprovedByVoorraadbeheer),
            (
                OrderAction::AssignLine(ProductionLine::Line1),
                OrderStatus::ToProduction,
            ),
            (OrderAction::StartProduction, OrderStatus::InProduction),
            (
                OrderAction::CompleteProduction,
                OrderStatus::AwaitingAccountManagerApproval,
            ),
            (OrderAction::ManagerApprove, OrderStatus::ApprovedByAccountManager),
            (OrderAction::ConfirmDelivery, OrderStatus::Delivered),
            (OrderAction::Finalize, OrderStatus::Completed),
        ];
        for (action, expected) in steps {
            let updated = rig.api.transition_order(id, action, "操作员").unwrap();
            assert_eq!(updated.status, expected);
        }

        let updated = rig.api.get_order(id).unwrap();
        assert_eq!(updated.production_line, Some(ProductionLine::Line1));
    }

    #[test]
    fn test_denied_transition_reports_trigger() {
        let rig = build_rig();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 1, "客户")
            .unwrap();

        let err = rig
            .api
            .transition_order(order.order_id, OrderAction::CompleteProduction, "操作员")
            .unwrap_err();
        match err {
            ApiError::InvalidTransition { from, trigger, .. } => {
                assert_eq!(from, "PENDING");
                assert_eq!(trigger, "COMPLETE_PRODUCTION");
            }
            other => panic!("应拒绝非法流转: {:?}", other),
        }
        // 订单保持原状态
        let order = rig.api.get_order(order.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_report_missing_blocks_not_allowed_here() {
        let rig = build_rig();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 1, "客户")
            .unwrap();

        let err = rig
            .api
            .transition_order(order.order_id, OrderAction::ReportMissingBlocks, "产线")
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_maintenance_blocks_start_production() {
        let rig = build_rig();
        rig.round_repo.create_next(&rig.simulation_id).unwrap();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::C, 1, "客户")
            .unwrap();
        rig.api
            .transition_order(order.order_id, OrderAction::ApproveInventory, "库存部")
            .unwrap();
        rig.api
            .transition_order(
                order.order_id,
                OrderAction::AssignLine(ProductionLine::Line2),
                "计划部",
            )
            .unwrap();

        rig.maintenance_registry
            .schedule(1, ProductionLine::Line2, "产线检修")
            .unwrap();
        let err = rig
            .api
            .transition_order(order.order_id, OrderAction::StartProduction, "产线")
            .unwrap_err();
        match err {
            ApiError::InvalidTransition { reason, .. } => assert!(reason.contains("检修")),
            other => panic!("检修期间应拒绝开工: {:?}", other),
        }

        // 另一条产线的订单不受影响
        let other = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 1, "客户")
            .unwrap();
        rig.api
            .transition_order(other.order_id, OrderAction::ApproveInventory, "库存部")
            .unwrap();
        rig.api
            .transition_order(
                other.order_id,
                OrderAction::AssignLine(ProductionLine::Line1),
                "计划部",
            )
            .unwrap();
        let started = rig
            .api
            .transition_order(other.order_id, OrderAction::StartProduction, "产线")
            .unwrap();
        assert_eq!(started.status, OrderStatus::InProduction);
    }

    #[test]
    fn test_block_requirements() {
        let rig = build_rig();
        let order = rig
            .api
            .place_order(&rig.simulation_id, MotorType::A, 3, "客户")
            .unwrap();

        let counts = rig.api.block_requirements(order.order_id).unwrap();
        assert_eq!(counts, BlockCounts::new(9, 12, 6));
    }
}
