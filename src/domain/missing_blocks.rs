// ==========================================
// 电机工厂流水线推演系统 - 缺件申请实体
// ==========================================
// 职责: 定义缺件补料申请的持久化实体
// 红线: 同一订单最多一张未补齐申请
// ==========================================

use crate::domain::types::{BlockCounts, MissingBlocksStatus, MotorType, ProductionLine};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 缺件补料申请
///
/// 产线上报缺件时创建，订单同步转入 `ProductionError`。
/// 先由跑单员尝试取件，取不到转入供应商队列；补齐后订单
/// 带插队标记回流 `Pending`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingBlocksRequest {
    pub request_id: i64,                 // 申请ID (自增)
    pub order_id: i64,                   // 关联订单
    pub production_line: ProductionLine, // 上报产线(订单快照)
    pub motor_type: MotorType,           // 电机型号(订单快照)
    pub quantity: i32,                   // 订单台数(订单快照)
    pub missing: BlockCounts,            // 三色缺件数量
    pub status: MissingBlocksStatus,     // 申请状态
    pub runner_attempted: bool,          // 跑单员是否已尝试取件
    pub resolved_by: Option<String>,     // 补齐人
    pub created_at: NaiveDateTime,       // 上报时间
    pub resolved_at: Option<NaiveDateTime>, // 补齐时间
}

/// 新建缺件申请的输入
///
/// 产线、型号、台数由仓储层在同一事务内从订单行快照，
/// 调用方只提供订单ID与缺件数量。
#[derive(Debug, Clone)]
pub struct NewMissingBlocksRequest {
    pub order_id: i64,
    pub missing: BlockCounts,
}
