// ==========================================
// 电机工厂流水线推演系统 - 领域类型定义
// ==========================================
// 依据: 工厂流水线业务流程 - 部门协作与订单状态体系
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 电机型号 (Motor Type)
// ==========================================
// 红线: 封闭枚举,未知型号在 API 边界拒绝
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MotorType {
    A, // 电机 A 型
    B, // 电机 B 型
    C, // 电机 C 型
}

impl fmt::Display for MotorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorType::A => write!(f, "A"),
            MotorType::B => write!(f, "B"),
            MotorType::C => write!(f, "C"),
        }
    }
}

impl MotorType {
    /// 从字符串解析电机型号（未知型号返回 None）
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "A" => Some(MotorType::A),
            "B" => Some(MotorType::B),
            "C" => Some(MotorType::C),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MotorType::A => "A",
            MotorType::B => "B",
            MotorType::C => "C",
        }
    }
}

// ==========================================
// 产线 (Production Line)
// ==========================================
// 工厂只有两条装配产线,数据库按整数 1/2 存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductionLine {
    Line1, // 1 号产线
    Line2, // 2 号产线
}

impl fmt::Display for ProductionLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductionLine::Line1 => write!(f, "1"),
            ProductionLine::Line2 => write!(f, "2"),
        }
    }
}

impl ProductionLine {
    /// 从数据库整数解析产线（1/2 之外返回 None）
    pub fn from_db(value: i64) -> Option<Self> {
        match value {
            1 => Some(ProductionLine::Line1),
            2 => Some(ProductionLine::Line2),
            _ => None,
        }
    }

    /// 转换为数据库存储的整数
    pub fn to_db(&self) -> i64 {
        match self {
            ProductionLine::Line1 => 1,
            ProductionLine::Line2 => 2,
        }
    }
}

// ==========================================
// 订单状态 (Order Status)
// ==========================================
// 红线: 封闭枚举 + 显式转换表,禁止自由字符串状态
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,                        // 待库存部审批
    ApprovedByVoorraadbeheer,       // 库存部审批通过,待计划部分配产线
    RejectedByVoorraadbeheer,       // 库存部驳回(终态)
    ToProduction,                   // 已分配产线,待开工
    InProduction,                   // 装配中
    ProductionError,                // 缺件异常,等待补件
    AwaitingAccountManagerApproval, // 装配完成,待客户经理审核
    ApprovedByAccountManager,       // 客户经理放行,待交付确认
    RejectedByAccountManager,       // 客户经理退回返工
    Delivered,                      // 已交付,待归档
    Completed,                      // 已归档(终态)
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl OrderStatus {
    /// 从数据库字符串解析订单状态（未知状态返回 None）
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "APPROVED_BY_VOORRAADBEHEER" => Some(OrderStatus::ApprovedByVoorraadbeheer),
            "REJECTED_BY_VOORRAADBEHEER" => Some(OrderStatus::RejectedByVoorraadbeheer),
            "TO_PRODUCTION" => Some(OrderStatus::ToProduction),
            "IN_PRODUCTION" => Some(OrderStatus::InProduction),
            "PRODUCTION_ERROR" => Some(OrderStatus::ProductionError),
            "AWAITING_ACCOUNT_MANAGER_APPROVAL" => {
                Some(OrderStatus::AwaitingAccountManagerApproval)
            }
            "APPROVED_BY_ACCOUNT_MANAGER" => Some(OrderStatus::ApprovedByAccountManager),
            "REJECTED_BY_ACCOUNT_MANAGER" => Some(OrderStatus::RejectedByAccountManager),
            "DELIVERED" => Some(OrderStatus::Delivered),
            "COMPLETED" => Some(OrderStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::ApprovedByVoorraadbeheer => "APPROVED_BY_VOORRAADBEHEER",
            OrderStatus::RejectedByVoorraadbeheer => "REJECTED_BY_VOORRAADBEHEER",
            OrderStatus::ToProduction => "TO_PRODUCTION",
            OrderStatus::InProduction => "IN_PRODUCTION",
            OrderStatus::ProductionError => "PRODUCTION_ERROR",
            OrderStatus::AwaitingAccountManagerApproval => "AWAITING_ACCOUNT_MANAGER_APPROVAL",
            OrderStatus::ApprovedByAccountManager => "APPROVED_BY_ACCOUNT_MANAGER",
            OrderStatus::RejectedByAccountManager => "REJECTED_BY_ACCOUNT_MANAGER",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// 是否为终态（终态订单不再参与任何转换）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::RejectedByVoorraadbeheer | OrderStatus::Completed
        )
    }
}

// ==========================================
// 缺件申请状态 (Missing Blocks Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MissingBlocksStatus {
    Pending,  // 待补件
    Resolved, // 已补件
}

impl fmt::Display for MissingBlocksStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingBlocksStatus::Pending => write!(f, "PENDING"),
            MissingBlocksStatus::Resolved => write!(f, "RESOLVED"),
        }
    }
}

impl MissingBlocksStatus {
    /// 从数据库字符串解析缺件申请状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(MissingBlocksStatus::Pending),
            "RESOLVED" => Some(MissingBlocksStatus::Resolved),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MissingBlocksStatus::Pending => "PENDING",
            MissingBlocksStatus::Resolved => "RESOLVED",
        }
    }
}

// ==========================================
// 检修工单状态 (Maintenance Status)
// ==========================================
// 非 COMPLETED 即视为占用该(回合,产线)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaintenanceStatus {
    Planned,   // 已登记
    Completed, // 已完成
}

impl fmt::Display for MaintenanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaintenanceStatus::Planned => write!(f, "PLANNED"),
            MaintenanceStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl MaintenanceStatus {
    /// 从数据库字符串解析检修状态
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PLANNED" => Some(MaintenanceStatus::Planned),
            "COMPLETED" => Some(MaintenanceStatus::Completed),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            MaintenanceStatus::Planned => "PLANNED",
            MaintenanceStatus::Completed => "COMPLETED",
        }
    }
}

// ==========================================
// 积木块数量 (Block Counts)
// ==========================================
// 值对象: 既用于缺件数量,也用于物料需求量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockCounts {
    pub blue: i32, // 蓝色积木块
    pub red: i32,  // 红色积木块
    pub gray: i32, // 灰色积木块
}

impl BlockCounts {
    pub fn new(blue: i32, red: i32, gray: i32) -> Self {
        Self { blue, red, gray }
    }

    /// 三色总量
    pub fn total(&self) -> i32 {
        self.blue + self.red + self.gray
    }

    /// 是否三色全为零（缺件上报禁止全零）
    pub fn is_empty(&self) -> bool {
        self.blue == 0 && self.red == 0 && self.gray == 0
    }

    /// 是否存在负数分量
    pub fn has_negative(&self) -> bool {
        self.blue < 0 || self.red < 0 || self.gray < 0
    }
}

impl fmt::Display for BlockCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "蓝{} 红{} 灰{}", self.blue, self.red, self.gray)
    }
}
