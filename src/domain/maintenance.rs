// ==========================================
// 电机工厂流水线推演系统 - 检修工单实体
// ==========================================
// 职责: 定义产线检修登记的持久化实体
// 红线: 同一(回合,产线)最多一张未完成工单
// ==========================================

use crate::domain::types::{MaintenanceStatus, ProductionLine};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// 检修工单
///
/// 登记后该(回合,产线)禁止订单开工，`Completed` 即解除占用。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceOrder {
    pub maintenance_id: i64,             // 工单ID (自增)
    pub round_no: i64,                   // 占用的回合号
    pub production_line: ProductionLine, // 占用的产线
    pub status: MaintenanceStatus,       // 工单状态
    pub description: String,             // 检修说明
    pub created_at: NaiveDateTime,       // 登记时间
}
