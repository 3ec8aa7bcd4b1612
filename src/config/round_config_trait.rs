// ==========================================
// 电机工厂流水线推演系统 - 回合配置读取 Trait
// ==========================================
// 职责: 定义回合调度器所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use async_trait::async_trait;
use std::error::Error;

// ==========================================
// RoundConfigReader Trait
// ==========================================
// 用途: 回合调度器启动时读取推演参数
// 实现者: ConfigManager（从 sim_config 表读取）
#[async_trait]
pub trait RoundConfigReader: Send + Sync {
    /// 获取单回合时长（秒）
    ///
    /// # 返回
    /// - u64: 回合时长,最小为 1
    ///
    /// # 默认值
    /// - 60
    async fn get_round_duration_seconds(&self) -> Result<u64, Box<dyn Error>>;

    /// 获取单次推演的最大回合数
    ///
    /// # 返回
    /// - i64: 最大回合数,达到后调度器自动暂停
    ///
    /// # 默认值
    /// - 36
    async fn get_max_rounds(&self) -> Result<i64, Box<dyn Error>>;
}
