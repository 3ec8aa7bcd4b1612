// ==========================================
// 电机工厂流水线推演系统 - 配置层
// ==========================================
// 职责: 推演参数管理
// 存储: sim_config 表
// ==========================================

pub mod config_manager;
pub mod round_config_trait;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager};
pub use round_config_trait::RoundConfigReader;
