// ==========================================
// 电机工厂流水线推演系统 - 订单实体
// ==========================================
// 依据: 工厂流水线业务流程 - 订单全生命周期
// 职责: 定义订单持久化实体,状态变更一律走状态机
// ==========================================

use crate::domain::types::{MotorType, OrderStatus, ProductionLine};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 电机订单
///
/// 订单从客户下单进入 `Pending`，依次经过库存部、计划部、
/// 产线与客户经理，终态为 `Completed` 或 `RejectedByVoorraadbeheer`。
/// 状态字段只允许通过 CAS 条件更新修改，保证同一订单上
/// 并发操作最多一个生效。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: i64,                           // 订单ID (自增,兼做先来先服务序)
    pub simulation_id: String,                   // 所属模拟
    pub motor_type: MotorType,                   // 电机型号
    pub quantity: i32,                           // 台数,必须为正
    pub production_line: Option<ProductionLine>, // 计划部分配的产线
    pub status: OrderStatus,                     // 当前状态
    pub returned_from_missing_blocks: bool,      // 缺件补齐后回流标记(插队优先)
    pub placed_in_round: Option<i64>,            // 下单时所处回合号
    pub requested_by: String,                    // 下单人
    pub created_at: NaiveDateTime,               // 创建时间
    pub updated_at: NaiveDateTime,               // 最近状态变更时间
}

/// 新建订单的输入
///
/// order_id 由数据库自增分配，初始状态恒为 `Pending`。
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub simulation_id: String,
    pub motor_type: MotorType,
    pub quantity: i32,
    pub placed_in_round: Option<i64>,
    pub requested_by: String,
}
