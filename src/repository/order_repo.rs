// ==========================================
// 电机工厂流水线推演系统 - 订单仓储
// ==========================================
// 红线: 状态更新必须带前置状态条件（CAS）,命中0行时回查区分"已变更"与"不存在"
// ==========================================

use crate::domain::order::{NewOrder, Order};
use crate::domain::types::{MotorType, OrderStatus, ProductionLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::parse_ts;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// OrderRepository - 订单仓储
// ==========================================
pub struct OrderRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OrderRepository {
    /// 创建新的OrderRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 下单（初始状态 PENDING,未分配产线）
    pub fn insert(&self, new_order: &NewOrder) -> RepositoryResult<Order> {
        let conn = self.get_conn()?;
        let now = chrono::Local::now().naive_local();
        let now_str = now.format("%Y-%m-%d %H:%M:%S").to_string();

        conn.execute(
            r#"INSERT INTO motor_order
               (simulation_id, motor_type, quantity, production_line, status,
                returned_from_missing_blocks, placed_in_round, requested_by,
                created_at, updated_at)
               VALUES (?, ?, ?, NULL, ?, 0, ?, ?, ?, ?)"#,
            params![
                &new_order.simulation_id,
                new_order.motor_type.to_db_str(),
                new_order.quantity,
                OrderStatus::Pending.to_db_str(),
                new_order.placed_in_round,
                &new_order.requested_by,
                &now_str,
                &now_str,
            ],
        )?;

        let order_id = conn.last_insert_rowid();

        Ok(Order {
            order_id,
            simulation_id: new_order.simulation_id.clone(),
            motor_type: new_order.motor_type,
            quantity: new_order.quantity,
            production_line: None,
            status: OrderStatus::Pending,
            returned_from_missing_blocks: false,
            placed_in_round: new_order.placed_in_round,
            requested_by: new_order.requested_by.clone(),
            created_at: now,
            updated_at: now,
        })
    }

    /// 按order_id查询订单
    pub fn find_by_id(&self, order_id: i64) -> RepositoryResult<Option<Order>> {
        let conn = self.get_conn()?;
        Self::find_by_id_inner(&conn, order_id)
    }

    fn find_by_id_inner(conn: &Connection, order_id: i64) -> RepositoryResult<Option<Order>> {
        match conn.query_row(
            r#"
            SELECT order_id, simulation_id, motor_type, quantity, production_line,
                   status, returned_from_missing_blocks, placed_in_round,
                   requested_by, created_at, updated_at
            FROM motor_order
            WHERE order_id = ?
            "#,
            params![order_id],
            |row| Self::map_row(row),
        ) {
            Ok(order) => Ok(Some(order)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询模拟的全部订单（按下单顺序）
    pub fn list_by_simulation(&self, simulation_id: &str) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, simulation_id, motor_type, quantity, production_line,
                   status, returned_from_missing_blocks, placed_in_round,
                   requested_by, created_at, updated_at
            FROM motor_order
            WHERE simulation_id = ?
            ORDER BY order_id ASC
            "#,
        )?;

        let orders = stmt
            .query_map(params![simulation_id], |row| Self::map_row(row))?
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(orders)
    }

    /// 按状态查询订单（先到先处理,按order_id升序）
    pub fn list_by_status(
        &self,
        simulation_id: &str,
        status: OrderStatus,
    ) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, simulation_id, motor_type, quantity, production_line,
                   status, returned_from_missing_blocks, placed_in_round,
                   requested_by, created_at, updated_at
            FROM motor_order
            WHERE simulation_id = ? AND status = ?
            ORDER BY order_id ASC
            "#,
        )?;

        let orders = stmt
            .query_map(params![simulation_id, status.to_db_str()], |row| {
                Self::map_row(row)
            })?
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(orders)
    }

    /// 查询产线待开工队列
    ///
    /// 说明：
    /// - 包含三类可开工状态: 已派产线待生产、缺件补齐退回、客户经理驳回返工。
    /// - 缺件补齐退回的订单优先,其余按下单顺序。
    pub fn production_queue(
        &self,
        simulation_id: &str,
        line: ProductionLine,
    ) -> RepositoryResult<Vec<Order>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT order_id, simulation_id, motor_type, quantity, production_line,
                   status, returned_from_missing_blocks, placed_in_round,
                   requested_by, created_at, updated_at
            FROM motor_order
            WHERE simulation_id = ?
              AND production_line = ?
              AND (status = 'TO_PRODUCTION'
                   OR (status = 'PENDING' AND returned_from_missing_blocks = 1)
                   OR status = 'REJECTED_BY_ACCOUNT_MANAGER')
            ORDER BY returned_from_missing_blocks DESC, order_id ASC
            "#,
        )?;

        let orders = stmt
            .query_map(params![simulation_id, line.to_db()], |row| {
                Self::map_row(row)
            })?
            .collect::<Result<Vec<Order>, _>>()?;

        Ok(orders)
    }

    /// 状态迁移（CAS,前置状态不匹配返回StaleStatus）
    pub fn update_status(
        &self,
        order_id: i64,
        expected: OrderStatus,
        new_status: OrderStatus,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now_str = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let rows_affected = conn.execute(
            r#"UPDATE motor_order
               SET status = ?, updated_at = ?
               WHERE order_id = ? AND status = ?"#,
            params![
                new_status.to_db_str(),
                &now_str,
                order_id,
                expected.to_db_str()
            ],
        )?;

        if rows_affected == 0 {
            return Err(Self::stale_or_not_found(&conn, order_id, expected)?);
        }

        Ok(())
    }

    /// 派工到产线（CAS,同一语句写入产线与新状态）
    pub fn assign_line(
        &self,
        order_id: i64,
        expected: OrderStatus,
        new_status: OrderStatus,
        line: ProductionLine,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now_str = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let rows_affected = conn.execute(
            r#"UPDATE motor_order
               SET status = ?, production_line = ?, updated_at = ?
               WHERE order_id = ? AND status = ?"#,
            params![
                new_status.to_db_str(),
                line.to_db(),
                &now_str,
                order_id,
                expected.to_db_str()
            ],
        )?;

        if rows_affected == 0 {
            return Err(Self::stale_or_not_found(&conn, order_id, expected)?);
        }

        Ok(())
    }

    /// 开工（CAS,进入生产中并在同一语句清除缺件退回标记）
    pub fn start_production(&self, order_id: i64, expected: OrderStatus) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let now_str = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        let rows_affected = conn.execute(
            r#"UPDATE motor_order
               SET status = 'IN_PRODUCTION', returned_from_missing_blocks = 0, updated_at = ?
               WHERE order_id = ? AND status = ?"#,
            params![&now_str, order_id, expected.to_db_str()],
        )?;

        if rows_affected == 0 {
            return Err(Self::stale_or_not_found(&conn, order_id, expected)?);
        }

        Ok(())
    }

    /// 删除模拟的所有订单（随模拟删除级联调用）
    pub fn delete_by_simulation(&self, simulation_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        let deleted = conn.execute(
            "DELETE FROM motor_order WHERE simulation_id = ?",
            params![simulation_id],
        )?;

        Ok(deleted)
    }

    /// CAS命中0行后回查,区分状态已变更与订单不存在
    fn stale_or_not_found(
        conn: &Connection,
        order_id: i64,
        expected: OrderStatus,
    ) -> RepositoryResult<RepositoryError> {
        match Self::find_by_id_inner(conn, order_id)? {
            Some(order) => Ok(RepositoryError::StaleStatus {
                entity: "Order".to_string(),
                id: order_id.to_string(),
                expected: expected.to_db_str().to_string(),
                actual: order.status.to_db_str().to_string(),
            }),
            None => Ok(RepositoryError::NotFound {
                entity: "Order".to_string(),
                id: order_id.to_string(),
            }),
        }
    }

    /// 映射数据库行到Order对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Order> {
        let motor_type_str: String = row.get(2)?;
        let motor_type = MotorType::from_str(&motor_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("无法识别的电机型号: {}", motor_type_str).into(),
            )
        })?;

        let line_raw: Option<i64> = row.get(4)?;
        let production_line = match line_raw {
            Some(v) => Some(ProductionLine::from_db(v).ok_or_else(|| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Integer,
                    format!("无法识别的产线编号: {}", v).into(),
                )
            })?),
            None => None,
        };

        let status_str: String = row.get(5)?;
        let status = OrderStatus::from_db_str(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                5,
                rusqlite::types::Type::Text,
                format!("无法识别的订单状态: {}", status_str).into(),
            )
        })?;

        let returned: i32 = row.get(6)?;

        Ok(Order {
            order_id: row.get(0)?,
            simulation_id: row.get(1)?,
            motor_type,
            quantity: row.get(3)?,
            production_line,
            status,
            returned_from_missing_blocks: returned != 0,
            placed_in_round: row.get(7)?,
            requested_by: row.get(8)?,
            created_at: parse_ts(row, 9)?,
            updated_at: parse_ts(row, 10)?,
        })
    }
}
