// ==========================================
// 电机工厂流水线推演系统 - 操作日志仓储
// ==========================================
// 红线: 只追加不修改,日志行一旦落库不得变更
// 红线: 无外键约束,推演删除后审计记录仍须可查
// ==========================================

use crate::domain::action_log::ActionLog;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// ActionLogRepository - 操作日志仓储
// ==========================================
pub struct ActionLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ActionLogRepository {
    /// 创建新的操作日志仓储
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 追加一条操作日志,返回其 action_id
    pub fn insert(&self, log: &ActionLog) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"
            INSERT INTO action_log (
                action_id, simulation_id, order_id, action_type, actor,
                action_ts, payload_json, detail
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                log.action_id,
                log.simulation_id,
                log.order_id,
                log.action_type,
                log.actor,
                log.action_ts.format("%Y-%m-%d %H:%M:%S").to_string(),
                log.payload_json.as_ref().map(|v| v.to_string()),
                log.detail,
            ],
        )?;

        Ok(log.action_id.clone())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询最近的 N 条日志
    pub fn find_recent(&self, limit: i32) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, simulation_id, order_id, action_type, actor,
                   action_ts, payload_json, detail
            FROM action_log
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询某订单的操作轨迹（按时间正序,便于复盘）
    pub fn find_by_order(&self, order_id: i64) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, simulation_id, order_id, action_type, actor,
                   action_ts, payload_json, detail
            FROM action_log
            WHERE order_id = ?
            ORDER BY action_ts ASC, action_id ASC
            "#,
        )?;

        let logs = stmt
            .query_map(params![order_id], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询某模拟的操作日志
    pub fn find_by_simulation(
        &self,
        simulation_id: &str,
        limit: i32,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, simulation_id, order_id, action_type, actor,
                   action_ts, payload_json, detail
            FROM action_log
            WHERE simulation_id = ?
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![simulation_id, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    /// 查询指定操作类型的日志
    pub fn find_by_action_type(
        &self,
        action_type: &str,
        limit: i32,
    ) -> RepositoryResult<Vec<ActionLog>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT action_id, simulation_id, order_id, action_type, actor,
                   action_ts, payload_json, detail
            FROM action_log
            WHERE action_type = ?
            ORDER BY action_ts DESC, action_id DESC
            LIMIT ?
            "#,
        )?;

        let logs = stmt
            .query_map(params![action_type, limit], |row| self.map_row(row))?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(logs)
    }

    // ==========================================
    // 辅助方法
    // ==========================================

    /// 将数据库行映射为 ActionLog 实体
    fn map_row(&self, row: &Row) -> SqliteResult<ActionLog> {
        let action_ts_str: String = row.get(5)?;
        let action_ts = chrono::NaiveDateTime::parse_from_str(&action_ts_str, "%Y-%m-%d %H:%M:%S")
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
            })?;

        let payload_json_str: Option<String> = row.get(6)?;
        let payload_json = payload_json_str.and_then(|s| serde_json::from_str(&s).ok());

        Ok(ActionLog {
            action_id: row.get(0)?,
            simulation_id: row.get(1)?,
            order_id: row.get(2)?,
            action_type: row.get(3)?,
            actor: row.get(4)?,
            action_ts,
            payload_json,
            detail: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::action_log::ActionType;

    fn setup() -> ActionLogRepository {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::ensure_schema(&conn).unwrap();
        ActionLogRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_insert_and_find_by_order() {
        let repo = setup();

        let log = ActionLog::new(ActionType::TransitionOrder, "生产部-01")
            .with_simulation("S1")
            .with_order(7)
            .with_payload(serde_json::json!({ "from": "TO_PRODUCTION", "to": "IN_PRODUCTION" }))
            .with_detail("开工");
        repo.insert(&log).unwrap();

        let logs = repo.find_by_order(7).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "TRANSITION_ORDER");
        assert_eq!(logs[0].actor, "生产部-01");
        assert_eq!(
            logs[0].payload_json.as_ref().unwrap()["to"],
            serde_json::json!("IN_PRODUCTION")
        );
    }

    #[test]
    fn test_find_recent_respects_limit() {
        let repo = setup();

        for i in 0..5 {
            let log = ActionLog::new(ActionType::PlaceOrder, "客户A").with_order(i);
            repo.insert(&log).unwrap();
        }

        let logs = repo.find_recent(3).unwrap();
        assert_eq!(logs.len(), 3);
    }

    #[test]
    fn test_find_by_simulation_filters() {
        let repo = setup();

        repo.insert(&ActionLog::new(ActionType::StartSimulation, "计划部-01").with_simulation("S1"))
            .unwrap();
        repo.insert(&ActionLog::new(ActionType::StartSimulation, "计划部-01").with_simulation("S2"))
            .unwrap();

        assert_eq!(repo.find_by_simulation("S1", 10).unwrap().len(), 1);
        assert_eq!(repo.find_by_simulation("S2", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_find_by_action_type() {
        let repo = setup();

        repo.insert(&ActionLog::new(ActionType::PlaceOrder, "客户A").with_order(1))
            .unwrap();
        repo.insert(&ActionLog::new(ActionType::ScheduleMaintenance, "检修组-01"))
            .unwrap();

        let logs = repo.find_by_action_type("SCHEDULE_MAINTENANCE", 10).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].actor, "检修组-01");
    }
}
