// ==========================================
// 电机工厂流水线推演系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// ==========================================

pub mod action_log_repo;
pub mod error;
pub mod maintenance_repo;
pub mod missing_blocks_repo;
pub mod order_repo;
pub mod simulation_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use maintenance_repo::MaintenanceRepository;
pub use missing_blocks_repo::MissingBlocksRepository;
pub use order_repo::OrderRepository;
pub use simulation_repo::{RoundRepository, SimulationRepository};

/// 解析 "%Y-%m-%d %H:%M:%S" 格式的时间戳列
pub(crate) fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<chrono::NaiveDateTime> {
    let raw: String = row.get(idx)?;
    chrono::NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 解析可空的时间戳列
pub(crate) fn parse_ts_opt(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<chrono::NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        Some(s) => {
            let ts = chrono::NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S").map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;
            Ok(Some(ts))
        }
        None => Ok(None),
    }
}
