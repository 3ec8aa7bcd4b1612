// ==========================================
// 电机工厂流水线推演系统 - API 层
// ==========================================
// 职责: 对外业务接口,校验输入并编排领域操作
// 红线: 变更型接口必须落操作日志并广播事件
// ==========================================

pub mod error;
pub mod maintenance_api;
pub mod missing_blocks_api;
pub mod order_api;
pub mod simulation_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use maintenance_api::MaintenanceApi;
pub use missing_blocks_api::MissingBlocksApi;
pub use order_api::OrderApi;
pub use simulation_api::{RoundConfig, SimulationApi};
