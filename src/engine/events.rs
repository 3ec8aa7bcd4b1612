// ==========================================
// 电机工厂流水线推演系统 - 引擎层事件发布
// ==========================================
// 职责: 定义推演事件发布 trait，实现依赖倒置
// 说明: Engine 层定义 trait，App 层选择具体实现
// 红线: 事件发布失败只记日志,绝不回滚业务写入
// ==========================================

use crate::domain::types::OrderStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::error::Error;

// ==========================================
// 推演事件类型
// ==========================================

/// 推演事件触发类型
///
/// Engine 层定义的事件类型，用于通知各部门看板
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimulationEventType {
    /// 推演启动（首回合开始）
    RoundStarted,
    /// 进入新回合
    NewRound,
    /// 达到最大回合数,推演暂停
    SimulationPaused,
    /// 推演被操作员停止
    SimulationStopped,
    /// 客户下单
    OrderPlaced,
    /// 订单状态流转
    OrderStatusChanged,
    /// 产线上报缺件
    MissingBlocksReported,
    /// 缺件补齐
    MissingBlocksResolved,
    /// 登记检修
    MaintenanceScheduled,
    /// 完成检修
    MaintenanceCompleted,
}

impl SimulationEventType {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            SimulationEventType::RoundStarted => "RoundStarted",
            SimulationEventType::NewRound => "NewRound",
            SimulationEventType::SimulationPaused => "SimulationPaused",
            SimulationEventType::SimulationStopped => "SimulationStopped",
            SimulationEventType::OrderPlaced => "OrderPlaced",
            SimulationEventType::OrderStatusChanged => "OrderStatusChanged",
            SimulationEventType::MissingBlocksReported => "MissingBlocksReported",
            SimulationEventType::MissingBlocksResolved => "MissingBlocksResolved",
            SimulationEventType::MaintenanceScheduled => "MaintenanceScheduled",
            SimulationEventType::MaintenanceCompleted => "MaintenanceCompleted",
        }
    }
}

// ==========================================
// 受众分组
// ==========================================

/// 事件受众（按部门看板分组）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    All,             // 全部门
    Inventory,       // 库存部 (voorraadbeheer)
    Planning,        // 计划部
    Production,      // 生产部
    AccountManagers, // 客户经理
    Runners,         // 跑腿员
    Suppliers,       // 供应商
}

impl Audience {
    /// 转换为字符串标识
    pub fn as_str(&self) -> &str {
        match self {
            Audience::All => "All",
            Audience::Inventory => "Inventory",
            Audience::Planning => "Planning",
            Audience::Production => "Production",
            Audience::AccountManagers => "AccountManagers",
            Audience::Runners => "Runners",
            Audience::Suppliers => "Suppliers",
        }
    }

    /// 订单进入某状态后,下一步该由哪个部门接手
    pub fn for_order_status(status: OrderStatus) -> Audience {
        match status {
            OrderStatus::Pending => Audience::Inventory,
            OrderStatus::ApprovedByVoorraadbeheer => Audience::Planning,
            OrderStatus::RejectedByVoorraadbeheer => Audience::All,
            OrderStatus::ToProduction => Audience::Production,
            OrderStatus::InProduction => Audience::Production,
            OrderStatus::ProductionError => Audience::Production,
            OrderStatus::AwaitingAccountManagerApproval => Audience::AccountManagers,
            OrderStatus::ApprovedByAccountManager => Audience::Runners,
            OrderStatus::RejectedByAccountManager => Audience::Production,
            OrderStatus::Delivered => Audience::AccountManagers,
            OrderStatus::Completed => Audience::All,
        }
    }
}

// ==========================================
// 推演事件
// ==========================================

/// 推演事件
///
/// Engine 层发布的事件，携带受众分组与 JSON 负载
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationEvent {
    /// 事件类型
    pub event_type: SimulationEventType,
    /// 所属模拟（系统级事件可为 None）
    pub simulation_id: Option<String>,
    /// 受众分组
    pub audience: Audience,
    /// 事件负载
    pub payload: JsonValue,
}

impl SimulationEvent {
    /// 创建面向全部门的事件
    pub fn broadcast(event_type: SimulationEventType, payload: JsonValue) -> Self {
        Self {
            event_type,
            simulation_id: None,
            audience: Audience::All,
            payload,
        }
    }

    /// 创建面向指定部门的事件
    pub fn for_audience(
        event_type: SimulationEventType,
        audience: Audience,
        payload: JsonValue,
    ) -> Self {
        Self {
            event_type,
            simulation_id: None,
            audience,
            payload,
        }
    }

    /// 绑定所属模拟
    pub fn with_simulation(mut self, simulation_id: &str) -> Self {
        self.simulation_id = Some(simulation_id.to_string());
        self
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 推演事件发布者 Trait
///
/// Engine 层定义，App 层选择实现
///
/// # 实现说明
/// - `BroadcastEventPublisher`: tokio broadcast 通道,供看板订阅
/// - `NoOpEventPublisher`: 单元测试或无订阅场景
pub trait SimulationEventPublisher: Send + Sync {
    /// 发布推演事件
    ///
    /// # 返回
    /// - `Ok(())`: 已交付（或按实现约定丢弃）
    /// - `Err`: 发布失败,调用方只记日志
    fn publish(&self, event: SimulationEvent) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
///
/// 用于不需要事件发布的场景（如单元测试）
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl SimulationEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: SimulationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            event_type = event.event_type.as_str(),
            audience = event.audience.as_str(),
            "NoOpEventPublisher: 跳过事件发布"
        );
        Ok(())
    }
}

/// 基于 tokio broadcast 通道的事件发布者
///
/// 看板观察者通过 `subscribe()` 拿到接收端;没有订阅者时事件直接丢弃,
/// 不算发布失败。
pub struct BroadcastEventPublisher {
    sender: tokio::sync::broadcast::Sender<SimulationEvent>,
}

impl BroadcastEventPublisher {
    /// 创建发布者
    ///
    /// # 参数
    /// - capacity: 通道容量,慢订阅者超出后按 broadcast 语义丢最旧
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SimulationEvent> {
        self.sender.subscribe()
    }

    /// 当前订阅者数量
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl SimulationEventPublisher for BroadcastEventPublisher {
    fn publish(&self, event: SimulationEvent) -> Result<(), Box<dyn Error + Send + Sync>> {
        match self.sender.send(event) {
            Ok(receiver_count) => {
                tracing::trace!(receiver_count, "推演事件已投递");
            }
            Err(tokio::sync::broadcast::error::SendError(event)) => {
                // 无订阅者不算失败
                tracing::debug!(
                    event_type = event.event_type.as_str(),
                    "当前无订阅者,事件丢弃"
                );
            }
        }
        Ok(())
    }
}
