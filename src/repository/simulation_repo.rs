// ==========================================
// 电机工厂流水线推演系统 - 模拟与回合仓储
// ==========================================
// 红线: 回合号在事务内按 MAX(round_no)+1 分配,不跳号不重复
// ==========================================

use crate::domain::simulation::{Round, Simulation};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_ts;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// SimulationRepository - 模拟会话仓储
// ==========================================
pub struct SimulationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SimulationRepository {
    /// 创建新的SimulationRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建模拟
    pub fn create(&self, simulation: &Simulation) -> RepositoryResult<String> {
        let conn = self.get_conn()?;

        conn.execute(
            r#"INSERT INTO simulation (simulation_id, simulation_name, is_running, created_at)
               VALUES (?, ?, ?, ?)"#,
            params![
                &simulation.simulation_id,
                &simulation.simulation_name,
                simulation.is_running as i32,
                &simulation
                    .created_at
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string(),
            ],
        )?;

        Ok(simulation.simulation_id.clone())
    }

    /// 按simulation_id查询模拟
    pub fn find_by_id(&self, simulation_id: &str) -> RepositoryResult<Option<Simulation>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT simulation_id, simulation_name, is_running, created_at
               FROM simulation
               WHERE simulation_id = ?"#,
            params![simulation_id],
            |row| Self::map_row(row),
        ) {
            Ok(simulation) => Ok(Some(simulation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询所有模拟
    pub fn list_all(&self) -> RepositoryResult<Vec<Simulation>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT simulation_id, simulation_name, is_running, created_at
               FROM simulation
               ORDER BY created_at DESC"#,
        )?;

        let simulations = stmt
            .query_map([], |row| Self::map_row(row))?
            .collect::<Result<Vec<Simulation>, _>>()?;

        Ok(simulations)
    }

    /// 更新持久化的运行标记（展示用,权威状态在调度器注册表）
    pub fn set_running(&self, simulation_id: &str, is_running: bool) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            "UPDATE simulation SET is_running = ? WHERE simulation_id = ?",
            params![is_running as i32, simulation_id],
        )?;

        if rows_affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Simulation".to_string(),
                id: simulation_id.to_string(),
            });
        }

        Ok(())
    }

    /// 删除模拟
    pub fn delete(&self, simulation_id: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "DELETE FROM simulation WHERE simulation_id = ?",
            params![simulation_id],
        )?;

        Ok(())
    }

    /// 映射数据库行到Simulation对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Simulation> {
        let is_running: i32 = row.get(2)?;
        Ok(Simulation {
            simulation_id: row.get(0)?,
            simulation_name: row.get(1)?,
            is_running: is_running != 0,
            created_at: parse_ts(row, 3)?,
        })
    }
}

// ==========================================
// RoundRepository - 回合仓储
// ==========================================
pub struct RoundRepository {
    conn: Arc<Mutex<Connection>>,
}

impl RoundRepository {
    /// 创建新的RoundRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建下一回合（事务内分配回合号，保证不跳号不重复）
    ///
    /// 说明：
    /// - 在同一事务内查询 MAX(round_no) 并写入，回合号分配对同一模拟原子。
    /// - 写入失败不会留下空洞，下次调用仍从已落库的最大回合号续接。
    pub fn create_next(&self, simulation_id: &str) -> RepositoryResult<Round> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let max_round_no: Option<i64> = tx.query_row(
            "SELECT MAX(round_no) FROM round WHERE simulation_id = ?",
            params![simulation_id],
            |row| row.get(0),
        )?;

        let round_no = max_round_no.unwrap_or(0) + 1;
        let created_at = chrono::Local::now().naive_local();

        tx.execute(
            r#"INSERT INTO round (simulation_id, round_no, created_at)
               VALUES (?, ?, ?)"#,
            params![
                simulation_id,
                round_no,
                created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ],
        )?;

        let round_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(Round {
            round_id,
            simulation_id: simulation_id.to_string(),
            round_no,
            created_at,
        })
    }

    /// 查询模拟的最新回合
    pub fn find_latest(&self, simulation_id: &str) -> RepositoryResult<Option<Round>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"SELECT round_id, simulation_id, round_no, created_at
               FROM round
               WHERE simulation_id = ?
               ORDER BY round_no DESC
               LIMIT 1"#,
            params![simulation_id],
            |row| Self::map_row(row),
        ) {
            Ok(round) => Ok(Some(round)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询模拟的所有回合（按回合号升序）
    pub fn list_by_simulation(&self, simulation_id: &str) -> RepositoryResult<Vec<Round>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT round_id, simulation_id, round_no, created_at
               FROM round
               WHERE simulation_id = ?
               ORDER BY round_no ASC"#,
        )?;

        let rounds = stmt
            .query_map(params![simulation_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<Round>, _>>()?;

        Ok(rounds)
    }

    /// 删除模拟的所有回合（随模拟删除级联调用）
    pub fn delete_by_simulation(&self, simulation_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        let deleted = conn.execute(
            "DELETE FROM round WHERE simulation_id = ?",
            params![simulation_id],
        )?;

        Ok(deleted)
    }

    /// 映射数据库行到Round对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Round> {
        Ok(Round {
            round_id: row.get(0)?,
            simulation_id: row.get(1)?,
            round_no: row.get(2)?,
            created_at: parse_ts(row, 3)?,
        })
    }
}
