// ==========================================
// 电机工厂流水线推演系统 - 操作日志领域模型
// ==========================================
// 职责: 审计追踪,替代隐式日志装饰器的显式组合
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// ActionLog - 操作日志
// ==========================================
// 红线: 所有变更型接口必须记录
// 用途: 审计追踪,演练复盘
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionLog {
    // ===== 主键 =====
    pub action_id: String,              // 日志ID (UUID)
    pub simulation_id: Option<String>,  // 关联模拟 (系统级操作可为 None)
    pub order_id: Option<i64>,          // 关联订单 (非订单操作为 None)
    pub action_type: String,            // 操作类型 (存储为字符串)
    pub action_ts: NaiveDateTime,       // 操作时间戳
    pub actor: String,                  // 操作人

    // ===== 操作负载 =====
    pub payload_json: Option<JsonValue>, // 操作参数 (JSON)

    // ===== 扩展字段 =====
    pub detail: Option<String>, // 详细描述
}

impl ActionLog {
    /// 创建一条操作日志,时间戳与日志ID自动生成
    pub fn new(action_type: ActionType, actor: &str) -> Self {
        Self {
            action_id: uuid::Uuid::new_v4().to_string(),
            simulation_id: None,
            order_id: None,
            action_type: action_type.as_str().to_string(),
            action_ts: chrono::Local::now().naive_local(),
            actor: actor.to_string(),
            payload_json: None,
            detail: None,
        }
    }

    pub fn with_simulation(mut self, simulation_id: &str) -> Self {
        self.simulation_id = Some(simulation_id.to_string());
        self
    }

    pub fn with_order(mut self, order_id: i64) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload_json = Some(payload);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    CreateSimulation,     // 创建模拟
    DeleteSimulation,     // 删除模拟
    StartSimulation,      // 启动回合推进
    StopSimulation,       // 停止回合推进
    PlaceOrder,           // 客户下单
    TransitionOrder,      // 订单状态流转
    ReportMissingBlocks,  // 产线上报缺件
    RunnerAttempt,        // 跑单员尝试取件
    ResolveMissingBlocks, // 缺件补齐
    ScheduleMaintenance,  // 登记检修
    CompleteMaintenance,  // 完成检修
    UpdateConfig,         // 调整模拟参数
}

impl ActionType {
    /// 转换为数据库存储的字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::CreateSimulation => "CREATE_SIMULATION",
            ActionType::DeleteSimulation => "DELETE_SIMULATION",
            ActionType::StartSimulation => "START_SIMULATION",
            ActionType::StopSimulation => "STOP_SIMULATION",
            ActionType::PlaceOrder => "PLACE_ORDER",
            ActionType::TransitionOrder => "TRANSITION_ORDER",
            ActionType::ReportMissingBlocks => "REPORT_MISSING_BLOCKS",
            ActionType::RunnerAttempt => "RUNNER_ATTEMPT",
            ActionType::ResolveMissingBlocks => "RESOLVE_MISSING_BLOCKS",
            ActionType::ScheduleMaintenance => "SCHEDULE_MAINTENANCE",
            ActionType::CompleteMaintenance => "COMPLETE_MAINTENANCE",
            ActionType::UpdateConfig => "UPDATE_CONFIG",
        }
    }
}
