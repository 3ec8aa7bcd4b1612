// ==========================================
// 电机工厂流水线推演系统 - 缺件申请仓储
// ==========================================
// 红线: 报缺与补齐各自是一个事务,订单状态与申请状态要么同时落库要么同时回滚
// 红线: 同一订单最多一条未补齐申请,由部分唯一索引兜底
// ==========================================

use crate::domain::missing_blocks::{MissingBlocksRequest, NewMissingBlocksRequest};
use crate::domain::types::{BlockCounts, MissingBlocksStatus, MotorType, OrderStatus, ProductionLine};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{parse_ts, parse_ts_opt};
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

// ==========================================
// MissingBlocksRepository - 缺件申请仓储
// ==========================================
pub struct MissingBlocksRepository {
    conn: Arc<Mutex<Connection>>,
}

impl MissingBlocksRepository {
    /// 创建新的MissingBlocksRepository实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 报缺：订单进入生产异常并创建缺件申请（单事务）
    ///
    /// 说明：
    /// - 订单必须处于生产中,否则返回StaleStatus并整体回滚。
    /// - 产线、型号、数量从订单快照进申请,补齐员无需回查订单。
    pub fn create_for_production_error(
        &self,
        new_request: &NewMissingBlocksRequest,
    ) -> RepositoryResult<MissingBlocksRequest> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let (motor_type_str, quantity, line_raw, status_str): (String, i32, Option<i64>, String) =
            match tx.query_row(
                r#"SELECT motor_type, quantity, production_line, status
                   FROM motor_order
                   WHERE order_id = ?"#,
                params![new_request.order_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            ) {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(RepositoryError::NotFound {
                        entity: "Order".to_string(),
                        id: new_request.order_id.to_string(),
                    });
                }
                Err(e) => return Err(e.into()),
            };

        if status_str != OrderStatus::InProduction.to_db_str() {
            return Err(RepositoryError::StaleStatus {
                entity: "Order".to_string(),
                id: new_request.order_id.to_string(),
                expected: OrderStatus::InProduction.to_db_str().to_string(),
                actual: status_str,
            });
        }

        let motor_type = MotorType::from_str(&motor_type_str).ok_or_else(|| {
            RepositoryError::FieldValueError {
                field: "motor_type".to_string(),
                message: format!("无法识别的电机型号: {}", motor_type_str),
            }
        })?;

        // 生产中的订单必然已派产线,缺产线说明数据被手工改坏
        let line_value = line_raw.ok_or_else(|| RepositoryError::FieldValueError {
            field: "production_line".to_string(),
            message: format!("订单{}处于生产中但未派产线", new_request.order_id),
        })?;
        let production_line =
            ProductionLine::from_db(line_value).ok_or_else(|| RepositoryError::FieldValueError {
                field: "production_line".to_string(),
                message: format!("无法识别的产线编号: {}", line_value),
            })?;

        let created_at = chrono::Local::now().naive_local();
        let created_at_str = created_at.format("%Y-%m-%d %H:%M:%S").to_string();

        tx.execute(
            r#"UPDATE motor_order
               SET status = 'PRODUCTION_ERROR', updated_at = ?
               WHERE order_id = ?"#,
            params![&created_at_str, new_request.order_id],
        )?;

        tx.execute(
            r#"INSERT INTO missing_blocks_request
               (order_id, production_line, motor_type, quantity,
                missing_blue, missing_red, missing_gray,
                status, runner_attempted, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, 'PENDING', 0, ?)"#,
            params![
                new_request.order_id,
                line_value,
                motor_type.to_db_str(),
                quantity,
                new_request.missing.blue,
                new_request.missing.red,
                new_request.missing.gray,
                &created_at_str,
            ],
        )?;

        let request_id = tx.last_insert_rowid();
        tx.commit()?;

        Ok(MissingBlocksRequest {
            request_id,
            order_id: new_request.order_id,
            production_line,
            motor_type,
            quantity,
            missing: new_request.missing,
            status: MissingBlocksStatus::Pending,
            runner_attempted: false,
            resolved_by: None,
            created_at,
            resolved_at: None,
        })
    }

    /// 按request_id查询缺件申请
    pub fn find_by_id(&self, request_id: i64) -> RepositoryResult<Option<MissingBlocksRequest>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"
            SELECT request_id, order_id, production_line, motor_type, quantity,
                   missing_blue, missing_red, missing_gray,
                   status, runner_attempted, resolved_by, created_at, resolved_at
            FROM missing_blocks_request
            WHERE request_id = ?
            "#,
            params![request_id],
            |row| Self::map_row(row),
        ) {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 查询订单的未补齐申请
    pub fn find_open_by_order(
        &self,
        order_id: i64,
    ) -> RepositoryResult<Option<MissingBlocksRequest>> {
        let conn = self.get_conn()?;

        match conn.query_row(
            r#"
            SELECT request_id, order_id, production_line, motor_type, quantity,
                   missing_blue, missing_red, missing_gray,
                   status, runner_attempted, resolved_by, created_at, resolved_at
            FROM missing_blocks_request
            WHERE order_id = ? AND status = 'PENDING'
            "#,
            params![order_id],
            |row| Self::map_row(row),
        ) {
            Ok(request) => Ok(Some(request)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// 跑腿员队列：未补齐且尚未尝试取件的申请（先报先处理）
    pub fn runner_queue(&self) -> RepositoryResult<Vec<MissingBlocksRequest>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT request_id, order_id, production_line, motor_type, quantity,
                   missing_blue, missing_red, missing_gray,
                   status, runner_attempted, resolved_by, created_at, resolved_at
            FROM missing_blocks_request
            WHERE status = 'PENDING' AND runner_attempted = 0
            ORDER BY request_id ASC
            "#,
        )?;

        let requests = stmt
            .query_map([], |row| Self::map_row(row))?
            .collect::<Result<Vec<MissingBlocksRequest>, _>>()?;

        Ok(requests)
    }

    /// 供应商队列：跑腿员取件失败、等待供应商补货的申请
    pub fn supplier_queue(&self) -> RepositoryResult<Vec<MissingBlocksRequest>> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT request_id, order_id, production_line, motor_type, quantity,
                   missing_blue, missing_red, missing_gray,
                   status, runner_attempted, resolved_by, created_at, resolved_at
            FROM missing_blocks_request
            WHERE status = 'PENDING' AND runner_attempted = 1
            ORDER BY request_id ASC
            "#,
        )?;

        let requests = stmt
            .query_map([], |row| Self::map_row(row))?
            .collect::<Result<Vec<MissingBlocksRequest>, _>>()?;

        Ok(requests)
    }

    /// 标记跑腿员已尝试取件,申请转入供应商队列
    ///
    /// 返回true表示本次标记生效,false表示此前已标记过（幂等）。
    pub fn mark_runner_attempted(&self, request_id: i64) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE missing_blocks_request
               SET runner_attempted = 1
               WHERE request_id = ? AND status = 'PENDING' AND runner_attempted = 0"#,
            params![request_id],
        )?;

        if rows_affected > 0 {
            return Ok(true);
        }

        let row: Option<(String, i32)> = match conn.query_row(
            "SELECT status, runner_attempted FROM missing_blocks_request WHERE request_id = ?",
            params![request_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ) {
            Ok(row) => Some(row),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(e.into()),
        };

        match row {
            None => Err(RepositoryError::NotFound {
                entity: "MissingBlocksRequest".to_string(),
                id: request_id.to_string(),
            }),
            Some((status, _)) if status == MissingBlocksStatus::Resolved.to_db_str() => {
                Err(RepositoryError::AlreadyResolved { request_id })
            }
            Some(_) => Ok(false),
        }
    }

    /// 补齐：申请关闭并把订单退回待处理（单事务）
    ///
    /// 说明：
    /// - 重复补齐返回AlreadyResolved,不产生第二次订单回退。
    /// - 订单回退写入退回标记,开工时该订单可走快速通道。
    /// - 任何一步失败整体回滚,申请保持未补齐。
    ///
    /// 返回被退回订单的order_id。
    pub fn resolve(&self, request_id: i64, resolved_by: &str) -> RepositoryResult<i64> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let (order_id, status_str): (i64, String) = match tx.query_row(
            "SELECT order_id, status FROM missing_blocks_request WHERE request_id = ?",
            params![request_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        ) {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(RepositoryError::NotFound {
                    entity: "MissingBlocksRequest".to_string(),
                    id: request_id.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        if status_str == MissingBlocksStatus::Resolved.to_db_str() {
            return Err(RepositoryError::AlreadyResolved { request_id });
        }

        let now_str = chrono::Local::now()
            .naive_local()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();

        tx.execute(
            r#"UPDATE missing_blocks_request
               SET status = 'RESOLVED', resolved_by = ?, resolved_at = ?
               WHERE request_id = ?"#,
            params![resolved_by, &now_str, request_id],
        )?;

        let rows_affected = tx.execute(
            r#"UPDATE motor_order
               SET status = 'PENDING', returned_from_missing_blocks = 1, updated_at = ?
               WHERE order_id = ? AND status = 'PRODUCTION_ERROR'"#,
            params![&now_str, order_id],
        )?;

        if rows_affected == 0 {
            let actual: String = tx.query_row(
                "SELECT status FROM motor_order WHERE order_id = ?",
                params![order_id],
                |row| row.get(0),
            )?;
            // 未提交的事务随返回丢弃,申请保持未补齐
            return Err(RepositoryError::StaleStatus {
                entity: "Order".to_string(),
                id: order_id.to_string(),
                expected: OrderStatus::ProductionError.to_db_str().to_string(),
                actual,
            });
        }

        tx.commit()?;
        Ok(order_id)
    }

    /// 删除模拟相关的所有缺件申请（随模拟删除级联调用）
    pub fn delete_by_simulation(&self, simulation_id: &str) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;

        let deleted = conn.execute(
            r#"DELETE FROM missing_blocks_request
               WHERE order_id IN (SELECT order_id FROM motor_order WHERE simulation_id = ?)"#,
            params![simulation_id],
        )?;

        Ok(deleted)
    }

    /// 映射数据库行到MissingBlocksRequest对象
    fn map_row(row: &rusqlite::Row) -> rusqlite::Result<MissingBlocksRequest> {
        let line_raw: i64 = row.get(2)?;
        let production_line = ProductionLine::from_db(line_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Integer,
                format!("无法识别的产线编号: {}", line_raw).into(),
            )
        })?;

        let motor_type_str: String = row.get(3)?;
        let motor_type = MotorType::from_str(&motor_type_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("无法识别的电机型号: {}", motor_type_str).into(),
            )
        })?;

        let status_str: String = row.get(8)?;
        let status = MissingBlocksStatus::from_db_str(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                8,
                rusqlite::types::Type::Text,
                format!("无法识别的缺件申请状态: {}", status_str).into(),
            )
        })?;

        let runner_attempted: i32 = row.get(9)?;

        Ok(MissingBlocksRequest {
            request_id: row.get(0)?,
            order_id: row.get(1)?,
            production_line,
            motor_type,
            quantity: row.get(4)?,
            missing: BlockCounts {
                blue: row.get(5)?,
                red: row.get(6)?,
                gray: row.get(7)?,
            },
            status,
            runner_attempted: runner_attempted != 0,
            resolved_by: row.get(10)?,
            created_at: parse_ts(row, 11)?,
            resolved_at: parse_ts_opt(row, 12)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::order::NewOrder;
    use crate::domain::simulation::Simulation;
    use crate::repository::order_repo::OrderRepository;
    use crate::repository::simulation_repo::SimulationRepository;

    struct Fixture {
        conn: Arc<Mutex<Connection>>,
        orders: OrderRepository,
        requests: MissingBlocksRepository,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        db::configure_sqlite_connection(&conn).unwrap();
        db::ensure_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));

        SimulationRepository::new(conn.clone())
            .create(&Simulation {
                simulation_id: "S1".to_string(),
                simulation_name: "测试模拟".to_string(),
                is_running: false,
                created_at: chrono::Local::now().naive_local(),
            })
            .unwrap();

        Fixture {
            orders: OrderRepository::new(conn.clone()),
            requests: MissingBlocksRepository::new(conn.clone()),
            conn,
        }
    }

    fn order_in_production(fixture: &Fixture) -> i64 {
        let order = fixture
            .orders
            .insert(&NewOrder {
                simulation_id: "S1".to_string(),
                motor_type: MotorType::B,
                quantity: 2,
                placed_in_round: Some(1),
                requested_by: "客户A".to_string(),
            })
            .unwrap();

        fixture
            .orders
            .update_status(
                order.order_id,
                OrderStatus::Pending,
                OrderStatus::ApprovedByVoorraadbeheer,
            )
            .unwrap();
        fixture
            .orders
            .assign_line(
                order.order_id,
                OrderStatus::ApprovedByVoorraadbeheer,
                OrderStatus::ToProduction,
                ProductionLine::Line1,
            )
            .unwrap();
        fixture
            .orders
            .start_production(order.order_id, OrderStatus::ToProduction)
            .unwrap();

        order.order_id
    }

    #[test]
    fn test_report_snapshots_order_fields() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);

        let request = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(0, 2, 0),
            })
            .unwrap();

        assert_eq!(request.order_id, order_id);
        assert_eq!(request.production_line, ProductionLine::Line1);
        assert_eq!(request.motor_type, MotorType::B);
        assert_eq!(request.quantity, 2);
        assert_eq!(request.missing.red, 2);
        assert_eq!(request.status, MissingBlocksStatus::Pending);

        let order = fixture.orders.find_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::ProductionError);
    }

    #[test]
    fn test_report_requires_in_production() {
        let fixture = setup();
        let order = fixture
            .orders
            .insert(&NewOrder {
                simulation_id: "S1".to_string(),
                motor_type: MotorType::A,
                quantity: 1,
                placed_in_round: Some(1),
                requested_by: "客户A".to_string(),
            })
            .unwrap();

        let result = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id: order.order_id,
                missing: BlockCounts::new(1, 0, 0),
            });

        assert!(matches!(result, Err(RepositoryError::StaleStatus { .. })));
        // 回滚后不应留下半截申请
        assert!(fixture
            .requests
            .find_open_by_order(order.order_id)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_open_request_rejected_by_index() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);

        fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(1, 0, 0),
            })
            .unwrap();

        // 订单已进入生产异常,第二次报缺在状态检查处被拦下
        let second = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(0, 1, 0),
            });
        assert!(matches!(second, Err(RepositoryError::StaleStatus { .. })));
    }

    #[test]
    fn test_resolve_returns_order_with_flag() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);
        let request = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(0, 0, 1),
            })
            .unwrap();

        let returned_order_id = fixture
            .requests
            .resolve(request.request_id, "跑腿员-01")
            .unwrap();
        assert_eq!(returned_order_id, order_id);

        let order = fixture.orders.find_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.returned_from_missing_blocks);

        let reread = fixture
            .requests
            .find_by_id(request.request_id)
            .unwrap()
            .unwrap();
        assert_eq!(reread.status, MissingBlocksStatus::Resolved);
        assert_eq!(reread.resolved_by.as_deref(), Some("跑腿员-01"));
        assert!(reread.resolved_at.is_some());
    }

    #[test]
    fn test_resolve_twice_is_already_resolved() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);
        let request = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(2, 0, 0),
            })
            .unwrap();

        fixture
            .requests
            .resolve(request.request_id, "跑腿员-01")
            .unwrap();
        let second = fixture.requests.resolve(request.request_id, "供应商-01");

        match second {
            Err(RepositoryError::AlreadyResolved { request_id }) => {
                assert_eq!(request_id, request.request_id);
            }
            other => panic!("期望AlreadyResolved,实际: {:?}", other),
        }

        // 订单只回退一次
        let order = fixture.orders.find_by_id(order_id).unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[test]
    fn test_runner_queue_handover_to_supplier() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);
        let request = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(1, 1, 0),
            })
            .unwrap();

        assert_eq!(fixture.requests.runner_queue().unwrap().len(), 1);
        assert!(fixture.requests.supplier_queue().unwrap().is_empty());

        assert!(fixture
            .requests
            .mark_runner_attempted(request.request_id)
            .unwrap());
        // 重复标记幂等
        assert!(!fixture
            .requests
            .mark_runner_attempted(request.request_id)
            .unwrap());

        assert!(fixture.requests.runner_queue().unwrap().is_empty());
        assert_eq!(fixture.requests.supplier_queue().unwrap().len(), 1);
    }

    #[test]
    fn test_mark_attempted_after_resolve() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);
        let request = fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(1, 0, 0),
            })
            .unwrap();

        fixture
            .requests
            .resolve(request.request_id, "跑腿员-01")
            .unwrap();

        let result = fixture.requests.mark_runner_attempted(request.request_id);
        assert!(matches!(
            result,
            Err(RepositoryError::AlreadyResolved { .. })
        ));
    }

    #[test]
    fn test_delete_by_simulation() {
        let fixture = setup();
        let order_id = order_in_production(&fixture);
        fixture
            .requests
            .create_for_production_error(&NewMissingBlocksRequest {
                order_id,
                missing: BlockCounts::new(1, 0, 0),
            })
            .unwrap();

        let deleted = fixture.requests.delete_by_simulation("S1").unwrap();
        assert_eq!(deleted, 1);

        let remaining: i64 = fixture
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM missing_blocks_request", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(remaining, 0);
    }
}
