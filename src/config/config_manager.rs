// ==========================================
// 电机工厂流水线推演系统 - 配置管理器
// ==========================================
// 职责: 推演参数的加载、查询、覆写管理
// 存储: sim_config 表 (单层 key-value,推演参数全局生效)
// ==========================================

use crate::config::round_config_trait::RoundConfigReader;
use crate::db::open_sqlite_connection;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use std::error::Error;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 读取单个配置项,不存在返回 None
    fn get_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM sim_config WHERE key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    fn get_or_default(&self, key: &str, default: &str) -> Result<String, Box<dyn Error>> {
        Ok(self.get_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 写入配置项（UPSERT）
    ///
    /// # 说明
    /// - 已运行中的调度任务不受影响,参数在下次启动时生效。
    pub fn set_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        conn.execute(
            "INSERT INTO sim_config (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;

        Ok(())
    }
}

// ==========================================
// RoundConfigReader Trait 实现
// ==========================================
#[async_trait]
impl RoundConfigReader for ConfigManager {
    async fn get_round_duration_seconds(&self) -> Result<u64, Box<dyn Error>> {
        let value = self.get_or_default(config_keys::ROUND_DURATION_SECONDS, "60")?;
        let seconds = value.parse::<u64>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::ROUND_DURATION_SECONDS,
                raw_value = %value,
                "回合时长配置格式错误，使用默认值 60"
            );
            60
        });
        // 回合时长为 0 会让调度器空转,配置层兜底到 1 秒
        Ok(seconds.max(1))
    }

    async fn get_max_rounds(&self) -> Result<i64, Box<dyn Error>> {
        let value = self.get_or_default(config_keys::MAX_ROUNDS, "36")?;
        let rounds = value.parse::<i64>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::MAX_ROUNDS,
                raw_value = %value,
                "最大回合数配置格式错误，使用默认值 36"
            );
            36
        });
        Ok(rounds.max(1))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 回合推进
    pub const ROUND_DURATION_SECONDS: &str = "round_duration_seconds";
    pub const MAX_ROUNDS: &str = "max_rounds";
}
