// ==========================================
// 电机工厂流水线推演系统 - 检修工单仓储
// ==========================================
// 红线: 同一回合同一产线最多一张未完成检修单,冲突在事务内拦截
// ==========================================

use crate::domain::maintenance::MaintenanceOrder;
use crate::domain::types::{MaintenanceStatus, ProductionLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_ts;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// MaintenanceRepository - 检修工单仓储
// ==========================================
pub struct MaintenanceRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MaintenanceRepository {
    /// 创建新的MaintenanceRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 预约检修（事务内查重,重复预约返回Conflict）
    pub fn schedule(
        &self,
        round_no: i64,
        line: ProductionLine,
        description: &str,
    ) -> RepositoryResult<MaintenanceOrder> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let active_count: i64 = tx.query_row(
            r#"SELECT COUNT(*) FROM maintenance_order
               WHERE round_no = ? AND production_line = ? AND status != 'COMPLETED'"#,
            params![round_no, line.to_db()],
            |row| row.get(0),
        )?;

        if active_count > 0 {
            return Err(RepositoryError::Conflict(format!(
                "回合{}的产线{}已有未完成检修单",
                round_no, line
            )));
        }

        let created_at = chrono::Local::now().naive_local();

        tx.execute(
            r#"INSERT INTO maintenance_order
               (round_no, production_line, status, description, created_at)
               VALUES (?, ?, 'PLANNED', ?, ?)"#,
            params![
                round_no,
                line.to_db(),
                description,
                created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        let maintenance_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(MaintenanceOrder {
            maintenance_id,
            round_no,
            production_line: line,
            status: MaintenanceStatus::Planned,
            description: description.to_string(),
            created_at,
        })
    }

    /// 按maintenance_id查询检修单
    pub fn find_by_id(&self, maintenance_id: i64) -> RepositoryResult<Option<MaintenanceOrder>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"
            SELECT maintenance_id, round_no, production_line, status, description, created_at
            FROM maintenance_order
            WHERE maintenance_id = ?
            "#,
            params![maintenance_id],
            |row| Self::map_row(row),
        ) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 判断某回合某产线是否有未完成检修单
    pub fn has_active(&self, round_no: i64, line: ProductionLine) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let count: i64 = conn.query_row(
            r#"SELECT COUNT(*) FROM maintenance_order
               WHERE round_no = ? AND production_line = ? AND status != 'COMPLETED'"#,
            params![round_no, line.to_db()],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    /// 完成检修,产线恢复可用
    ///
    /// 返回true表示本次完成生效,false表示此前已完成（幂等）。
    pub fn complete(&self, maintenance_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            "UPDATE maintenance_order SET status = 'COMPLETED' WHERE maintenance_id = ? AND status != 'COMPLETED'",
            params![maintenance_id],
        )?;

        if rows_affected > 0 {
            return Ok(true);
        }

        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM maintenance_order WHERE maintenance_id = ?",
            params![maintenance_id],
            |row| row.get(0),
        )?;

        if exists == 0 {
            return Err(RepositoryError::NotFound {
                entity: "MaintenanceOrder".to_string(),
                id: maintenance_id.to_string(),
            });
        }

        Ok(false)
    }

    /// 查询所有检修单（按回合与产线排序）
    pub fn list_all(&self) -> RepositoryResult<Vec<MaintenanceOrder>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT maintenance_id, round_no, production_line, status, description, created_at
            FROM maintenance_order
            ORDER BY round_no ASC, production_line ASC
            "#,
        )?;

        let orders = stmt
            .query_map([], |row| Self::map_row(row))?
            .collect::<Result<Vec<MaintenanceOrder>, _>>()?;

        Ok(orders)
    }

    /// 查询某回合的检修单
    pub fn list_by_round(&self, round_no: i64) -> RepositoryResult<Vec<MaintenanceOrder>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT maintenance_id, round_no, production_line, status, description, created_at
            FROM maintenance_order
            WHERE round_no = ?
            ORDER BY production_line ASC
            "#,
        )?;

        let orders = stmt
            .query_map(params![round_no], |row| Self::map_row(row))?
            .collect::<Result<Vec<MaintenanceOrder>, _>>()?;

        Ok(orders)
    }

    /// 映射数据库行到MaintenanceOrder对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<MaintenanceOrder> {
        let line_raw: i64 = row.get(2)?;
        let production_line = ProductionLine::from_db(line_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("无法识别的产线编号: {}", line_raw).into(),
            )
        })?;

        let status_str: String = row.get(3)?;
        let status = MaintenanceStatus::from_db_str(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("无法识别的检修单状态: {}", status_str).into(),
            )
        })?;

        Ok(MaintenanceOrder {
            maintenance_id: row.get(0)?,
            round_no: row.get(1)?,
            production_line,
            status,
            description: row.get(4)?,
            created_at: parse_ts(row, 5)?,
        })
    }
}
