// ==========================================
// 电机工厂流水线推演系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、业务规则接口
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod maintenance;
pub mod missing_blocks;
pub mod order;
pub mod simulation;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use maintenance::MaintenanceOrder;
pub use missing_blocks::{MissingBlocksRequest, NewMissingBlocksRequest};
pub use order::{NewOrder, Order};
pub use simulation::{Round, Simulation, SimulationStatus};
pub use types::{
    BlockCounts, MaintenanceStatus, MissingBlocksStatus, MotorType, OrderStatus, ProductionLine,
};
