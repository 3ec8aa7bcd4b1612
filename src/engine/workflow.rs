// ==========================================
// 电机工厂流水线推演系统 - 订单状态机
// ==========================================
// 红线: 纯函数判定,不读库不写库,并发控制交给 Repository 的条件更新
// 规则: 任何 (状态,动作) 组合都有确定结果,未列入转移表的一律拒绝
// ==========================================

use crate::domain::types::{OrderStatus, ProductionLine};

// ==========================================
// 订单动作 (Order Action)
// ==========================================

/// 各部门能对订单执行的动作
///
/// 动作本身不携带执行人,执行人由 API 层写入操作日志
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderAction {
    /// 库存部审批通过
    ApproveInventory,
    /// 库存部驳回
    RejectInventory,
    /// 规划部派产线
    AssignLine(ProductionLine),
    /// 产线开工
    StartProduction,
    /// 产线完工
    CompleteProduction,
    /// 产线上报缺件
    ReportMissingBlocks,
    /// 客户经理审批通过
    ManagerApprove,
    /// 客户经理驳回返工
    ManagerReject,
    /// 确认交付
    ConfirmDelivery,
    /// 订单归档结案
    Finalize,
}

impl OrderAction {
    /// 转换为字符串标识（操作日志与事件负载用）
    pub fn as_str(&self) -> &str {
        match self {
            OrderAction::ApproveInventory => "APPROVE_INVENTORY",
            OrderAction::RejectInventory => "REJECT_INVENTORY",
            OrderAction::AssignLine(_) => "ASSIGN_LINE",
            OrderAction::StartProduction => "START_PRODUCTION",
            OrderAction::CompleteProduction => "COMPLETE_PRODUCTION",
            OrderAction::ReportMissingBlocks => "REPORT_MISSING_BLOCKS",
            OrderAction::ManagerApprove => "MANAGER_APPROVE",
            OrderAction::ManagerReject => "MANAGER_REJECT",
            OrderAction::ConfirmDelivery => "CONFIRM_DELIVERY",
            OrderAction::Finalize => "FINALIZE",
        }
    }
}

// ==========================================
// 判定上下文 (Transition Context)
// ==========================================

/// 状态机判定所需的订单外部事实
///
/// 由调用方（API 层）查好后传入,状态机自身不做任何 I/O
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext {
    /// 订单是否经缺件补齐回流（回流订单允许从 Pending 直接开工）
    pub returned_from_missing_blocks: bool,
    /// 订单是否已派产线
    pub line_assigned: bool,
    /// 订单所在产线本回合是否检修中
    pub line_under_maintenance: bool,
}

/// 状态机判定结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionDecision {
    /// 允许流转,携带目标状态
    Allowed(OrderStatus),
    /// 拒绝流转,携带原因（面向部门看板展示）
    Denied { reason: String },
}

impl TransitionDecision {
    /// 是否允许流转
    pub fn is_allowed(&self) -> bool {
        matches!(self, TransitionDecision::Allowed(_))
    }
}

// ==========================================
// OrderWorkflow - 订单状态机
// ==========================================

/// 订单状态机
///
/// 全部转移边:
/// - Pending -> ApprovedByVoorraadbeheer / RejectedByVoorraadbeheer（库存部审批）
/// - ApprovedByVoorraadbeheer -> ToProduction（规划部派产线）
/// - ToProduction -> InProduction（开工,受检修门控）
/// - Pending(回流) -> InProduction（缺件补齐后直接开工,受检修门控）
/// - InProduction -> AwaitingAccountManagerApproval（完工）
/// - InProduction -> ProductionError（上报缺件）
/// - AwaitingAccountManagerApproval -> ApprovedByAccountManager / RejectedByAccountManager
/// - RejectedByAccountManager -> InProduction（返工,受检修门控）
/// - ApprovedByAccountManager -> Delivered -> Completed
pub struct OrderWorkflow;

impl OrderWorkflow {
    /// 判定一次状态流转
    ///
    /// # 参数
    /// - `current`: 订单当前状态
    /// - `action`: 部门动作
    /// - `ctx`: 判定上下文（回流标记、派线情况、检修情况）
    ///
    /// # 返回
    /// - `Allowed(next)`: 允许流转到 next
    /// - `Denied { reason }`: 拒绝,订单保持原状态
    pub fn evaluate(
        current: OrderStatus,
        action: OrderAction,
        ctx: &TransitionContext,
    ) -> TransitionDecision {
        match (current, action) {
            // 库存部审批
            (OrderStatus::Pending, OrderAction::ApproveInventory) => {
                TransitionDecision::Allowed(OrderStatus::ApprovedByVoorraadbeheer)
            }
            (OrderStatus::Pending, OrderAction::RejectInventory) => {
                TransitionDecision::Allowed(OrderStatus::RejectedByVoorraadbeheer)
            }

            // 缺件回流订单免二次审批,直接开工
            (OrderStatus::Pending, OrderAction::StartProduction) => {
                if !ctx.returned_from_missing_blocks {
                    return TransitionDecision::Denied {
                        reason: "待审订单未经缺件回流,不能直接开工".to_string(),
                    };
                }
                Self::check_start_production(ctx)
            }

            // 规划部派产线（检修不拦派线,只拦开工）
            (OrderStatus::ApprovedByVoorraadbeheer, OrderAction::AssignLine(_)) => {
                TransitionDecision::Allowed(OrderStatus::ToProduction)
            }

            // 正常开工与客户经理驳回后的返工开工
            (OrderStatus::ToProduction, OrderAction::StartProduction)
            | (OrderStatus::RejectedByAccountManager, OrderAction::StartProduction) => {
                Self::check_start_production(ctx)
            }

            // 产线完工 / 上报缺件
            (OrderStatus::InProduction, OrderAction::CompleteProduction) => {
                TransitionDecision::Allowed(OrderStatus::AwaitingAccountManagerApproval)
            }
            (OrderStatus::InProduction, OrderAction::ReportMissingBlocks) => {
                TransitionDecision::Allowed(OrderStatus::ProductionError)
            }

            // 客户经理审批
            (OrderStatus::AwaitingAccountManagerApproval, OrderAction::ManagerApprove) => {
                TransitionDecision::Allowed(OrderStatus::ApprovedByAccountManager)
            }
            (OrderStatus::AwaitingAccountManagerApproval, OrderAction::ManagerReject) => {
                TransitionDecision::Allowed(OrderStatus::RejectedByAccountManager)
            }

            // 交付与结案
            (OrderStatus::ApprovedByAccountManager, OrderAction::ConfirmDelivery) => {
                TransitionDecision::Allowed(OrderStatus::Delivered)
            }
            (OrderStatus::Delivered, OrderAction::Finalize) => {
                TransitionDecision::Allowed(OrderStatus::Completed)
            }

            // 转移表之外的组合一律拒绝
            (status, action) => TransitionDecision::Denied {
                reason: format!("状态{}不允许执行{}", status.to_db_str(), action.as_str()),
            },
        }
    }

    /// 开工动作的共用门控: 先查派线,再查检修
    fn check_start_production(ctx: &TransitionContext) -> TransitionDecision {
        if !ctx.line_assigned {
            return TransitionDecision::Denied {
                reason: "订单尚未派产线,无法开工".to_string(),
            };
        }
        if ctx.line_under_maintenance {
            return TransitionDecision::Denied {
                reason: "产线检修中,无法开工".to_string(),
            };
        }
        TransitionDecision::Allowed(OrderStatus::InProduction)
    }
}

// ==========================================
// 单元测试
// ==========================================

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATUSES: [OrderStatus; 11] = [
        OrderStatus::Pending,
        OrderStatus::ApprovedByVoorraadbeheer,
        OrderStatus::RejectedByVoorraadbeheer,
        OrderStatus::ToProduction,
        OrderStatus::InProduction,
        OrderStatus::ProductionError,
        OrderStatus::AwaitingAccountManagerApproval,
        OrderStatus::ApprovedByAccountManager,
        OrderStatus::RejectedByAccountManager,
        OrderStatus::Delivered,
        OrderStatus::Completed,
    ];

    fn all_actions() -> Vec<OrderAction> {
        vec![
            OrderAction::ApproveInventory,
            OrderAction::RejectInventory,
            OrderAction::AssignLine(ProductionLine::Line1),
            OrderAction::StartProduction,
            OrderAction::CompleteProduction,
            OrderAction::ReportMissingBlocks,
            OrderAction::ManagerApprove,
            OrderAction::ManagerReject,
            OrderAction::ConfirmDelivery,
            OrderAction::Finalize,
        ]
    }

    /// 回流 + 已派线 + 无检修,开工门控全开的上下文
    fn widest_ctx() -> TransitionContext {
        TransitionContext {
            returned_from_missing_blocks: true,
            line_assigned: true,
            line_under_maintenance: false,
        }
    }

    #[test]
    fn test_full_transition_table() {
        let ctx = widest_ctx();
        for status in ALL_STATUSES {
            for action in all_actions() {
                let decision = OrderWorkflow::evaluate(status, action, &ctx);
                let expected = match (status, action) {
                    (OrderStatus::Pending, OrderAction::ApproveInventory) => {
                        Some(OrderStatus::ApprovedByVoorraadbeheer)
                    }
                    (OrderStatus::Pending, OrderAction::RejectInventory) => {
                        Some(OrderStatus::RejectedByVoorraadbeheer)
                    }
                    (OrderStatus::Pending, OrderAction::StartProduction) => {
                        Some(OrderStatus::InProduction)
                    }
                    (OrderStatus::ApprovedByVoorraadbeheer, OrderAction::AssignLine(_)) => {
                        Some(OrderStatus::ToProduction)
                    }
                    (OrderStatus::ToProduction, OrderAction::StartProduction) => {
                        Some(OrderStatus::InProduction)
                    }
                    (OrderStatus::RejectedByAccountManager, OrderAction::StartProduction) => {
                        Some(OrderStatus::InProduction)
                    }
                    (OrderStatus::InProduction, OrderAction::CompleteProduction) => {
                        Some(OrderStatus::AwaitingAccountManagerApproval)
                    }
                    (OrderStatus::InProduction, OrderAction::ReportMissingBlocks) => {
                        Some(OrderStatus::ProductionError)
                    }
                    (OrderStatus::AwaitingAccountManagerApproval, OrderAction::ManagerApprove) => {
                        Some(OrderStatus::ApprovedByAccountManager)
                    }
                    (OrderStatus::AwaitingAccountManagerApproval, OrderAction::ManagerReject) => {
                        Some(OrderStatus::RejectedByAccountManager)
                    }
                    (OrderStatus::ApprovedByAccountManager, OrderAction::ConfirmDelivery) => {
                        Some(OrderStatus::Delivered)
                    }
                    (OrderStatus::Delivered, OrderAction::Finalize) => {
                        Some(OrderStatus::Completed)
                    }
                    _ => None,
                };
                match expected {
                    Some(next) => assert_eq!(
                        decision,
                        TransitionDecision::Allowed(next),
                        "{:?} + {:?} 应允许",
                        status,
                        action
                    ),
                    None => assert!(
                        matches!(decision, TransitionDecision::Denied { .. }),
                        "{:?} + {:?} 应拒绝",
                        status,
                        action
                    ),
                }
            }
        }
    }

    #[test]
    fn test_pending_start_requires_returned_flag() {
        let ctx = TransitionContext {
            returned_from_missing_blocks: false,
            line_assigned: true,
            line_under_maintenance: false,
        };
        let decision =
            OrderWorkflow::evaluate(OrderStatus::Pending, OrderAction::StartProduction, &ctx);
        assert!(!decision.is_allowed());

        let returned = TransitionContext {
            returned_from_missing_blocks: true,
            ..ctx
        };
        assert_eq!(
            OrderWorkflow::evaluate(OrderStatus::Pending, OrderAction::StartProduction, &returned),
            TransitionDecision::Allowed(OrderStatus::InProduction)
        );
    }

    #[test]
    fn test_start_production_requires_assigned_line() {
        let ctx = TransitionContext {
            returned_from_missing_blocks: true,
            line_assigned: false,
            line_under_maintenance: false,
        };
        for status in [OrderStatus::Pending, OrderStatus::ToProduction] {
            match OrderWorkflow::evaluate(status, OrderAction::StartProduction, &ctx) {
                TransitionDecision::Denied { reason } => assert!(reason.contains("派产线")),
                other => panic!("应拒绝未派线开工: {:?}", other),
            }
        }
    }

    #[test]
    fn test_maintenance_blocks_start_but_not_assignment() {
        let ctx = TransitionContext {
            returned_from_missing_blocks: false,
            line_assigned: true,
            line_under_maintenance: true,
        };
        match OrderWorkflow::evaluate(OrderStatus::ToProduction, OrderAction::StartProduction, &ctx)
        {
            TransitionDecision::Denied { reason } => assert!(reason.contains("检修")),
            other => panic!("检修期间应拒绝开工: {:?}", other),
        }

        // 检修只拦开工,派线照常
        assert_eq!(
            OrderWorkflow::evaluate(
                OrderStatus::ApprovedByVoorraadbeheer,
                OrderAction::AssignLine(ProductionLine::Line2),
                &ctx
            ),
            TransitionDecision::Allowed(OrderStatus::ToProduction)
        );
    }

    #[test]
    fn test_rework_loop() {
        let ctx = widest_ctx();
        assert_eq!(
            OrderWorkflow::evaluate(
                OrderStatus::AwaitingAccountManagerApproval,
                OrderAction::ManagerReject,
                &ctx
            ),
            TransitionDecision::Allowed(OrderStatus::RejectedByAccountManager)
        );
        assert_eq!(
            OrderWorkflow::evaluate(
                OrderStatus::RejectedByAccountManager,
                OrderAction::StartProduction,
                &ctx
            ),
            TransitionDecision::Allowed(OrderStatus::InProduction)
        );
    }

    #[test]
    fn test_terminal_statuses_deny_everything() {
        let ctx = widest_ctx();
        for status in [
            OrderStatus::RejectedByVoorraadbeheer,
            OrderStatus::Completed,
        ] {
            for action in all_actions() {
                assert!(
                    !OrderWorkflow::evaluate(status, action, &ctx).is_allowed(),
                    "终态 {:?} 不应允许 {:?}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn test_production_error_only_exits_via_resolution() {
        // ProductionError 状态没有任何状态机出边,只能由缺件补齐流程写回 Pending
        let ctx = widest_ctx();
        for action in all_actions() {
            assert!(!OrderWorkflow::evaluate(OrderStatus::ProductionError, action, &ctx)
                .is_allowed());
        }
    }
}
