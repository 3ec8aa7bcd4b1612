// ==========================================
// 电机工厂流水线推演系统 - 模拟与回合实体
// ==========================================
// 职责: 定义模拟会话与回合的持久化实体
// 红线: 回合号由存储派生,严格递增不跳号
// ==========================================

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 模拟会话
///
/// 一场模拟对应一组部门联合演练，回合由调度器按节拍推进。
/// `is_running` 为展示性标记，运行权威状态以调度器注册表为准。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Simulation {
    pub simulation_id: String,        // 模拟ID (UUID)
    pub simulation_name: String,      // 模拟名称
    pub is_running: bool,             // 持久化的运行标记(展示用)
    pub created_at: NaiveDateTime,    // 创建时间
}

impl Simulation {
    /// 创建一场新模拟（未运行,回合从启动时才开始落库）
    pub fn new(simulation_name: &str) -> Self {
        Self {
            simulation_id: Uuid::new_v4().to_string(),
            simulation_name: simulation_name.to_string(),
            is_running: false,
            created_at: Local::now().naive_local(),
        }
    }
}

/// 回合
///
/// 每次滴答恰好落库一行，(simulation_id, round_no) 全局唯一。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub round_id: i64,             // 回合行ID (自增)
    pub simulation_id: String,     // 所属模拟
    pub round_no: i64,             // 回合号,从 1 开始
    pub created_at: NaiveDateTime, // 开始时间
}

/// 调度器对外的运行状态视图
///
/// 未注册的模拟统一返回 `is_running=false`，不报错。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub simulation_id: String, // 模拟ID
    pub is_running: bool,      // 是否运行中
    pub current_round: i64,    // 当前回合号(未开始过为 0)
    pub seconds_remaining: u64, // 距下一回合的剩余秒数(仅展示)
}
