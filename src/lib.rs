// ==========================================
// 电机工厂流水线推演系统 - 核心库
// ==========================================
// 技术栈: Rust + Tokio + SQLite
// 系统定位: 多部门流水线推演 (回合驱动,人工操作)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 调度与业务规则
pub mod engine;

// 配置层 - 推演参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 进程装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BlockCounts, MotorType, OrderStatus, ProductionLine};

// 领域实体
pub use domain::{
    ActionLog, ActionType, MaintenanceOrder, MissingBlocksRequest, MissingBlocksStatus, Order,
    Round, Simulation, SimulationStatus,
};

// 引擎
pub use engine::{
    Audience, BroadcastEventPublisher, MaintenanceRegistry, OrderAction, OrderWorkflow,
    RoundScheduler, SimulationEvent, SimulationEventPublisher, SimulationEventType,
    TransitionContext, TransitionDecision,
};

// API
pub use api::{
    ApiError, ApiResult, MaintenanceApi, MissingBlocksApi, OrderApi, RoundConfig, SimulationApi,
};

// 应用装配
pub use app::{get_default_db_path, AppState};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "电机工厂流水线推演系统";
