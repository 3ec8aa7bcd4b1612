// ==========================================
// 电机工厂流水线推演系统 - 引擎层
// ==========================================
// 职责: 回合节拍、订单状态机、检修门控、积木核算与事件发布
// 红线: Engine 不拼 SQL, 数据读写一律走 Repository
// 红线: 状态流转必须经状态机判定, 拒绝时输出 reason
// ==========================================

pub mod blocks;
pub mod clock;
pub mod events;
pub mod maintenance;
pub mod scheduler;
pub mod workflow;

// 重导出核心引擎
pub use clock::{Clock, ManualClock, TokioClock};
pub use events::{
    Audience, BroadcastEventPublisher, NoOpEventPublisher, SimulationEvent,
    SimulationEventPublisher, SimulationEventType,
};
pub use maintenance::MaintenanceRegistry;
pub use scheduler::{RoundScheduler, SchedulerError, SchedulerResult};
pub use workflow::{OrderAction, OrderWorkflow, TransitionContext, TransitionDecision};
