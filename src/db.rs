// ==========================================
// 电机工厂流水线推演系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为，避免“部分模块外键开启/部分不开启”
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 建表语句幂等，启动时自动补齐缺失表
// ==========================================

use rusqlite::Connection;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 幂等建表
///
/// 红线:
/// - round 表 (simulation_id, round_no) 唯一,是回合号不重复的最后防线
/// - missing_blocks_request 对每个订单最多一行 PENDING (部分唯一索引)
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS simulation (
            simulation_id   TEXT PRIMARY KEY,
            simulation_name TEXT NOT NULL,
            is_running      INTEGER NOT NULL DEFAULT 0,
            created_at      TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS round (
            round_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            simulation_id TEXT NOT NULL REFERENCES simulation(simulation_id),
            round_no      INTEGER NOT NULL,
            created_at    TEXT NOT NULL,
            UNIQUE (simulation_id, round_no)
        );

        CREATE TABLE IF NOT EXISTS motor_order (
            order_id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            simulation_id                TEXT NOT NULL REFERENCES simulation(simulation_id),
            motor_type                   TEXT NOT NULL,
            quantity                     INTEGER NOT NULL,
            production_line              INTEGER,
            status                       TEXT NOT NULL DEFAULT 'PENDING',
            returned_from_missing_blocks INTEGER NOT NULL DEFAULT 0,
            placed_in_round              INTEGER,
            requested_by                 TEXT NOT NULL,
            created_at                   TEXT NOT NULL,
            updated_at                   TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_motor_order_sim_status
          ON motor_order(simulation_id, status);

        CREATE INDEX IF NOT EXISTS idx_motor_order_line_status
          ON motor_order(production_line, status);

        CREATE TABLE IF NOT EXISTS missing_blocks_request (
            request_id      INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id        INTEGER NOT NULL REFERENCES motor_order(order_id),
            production_line INTEGER NOT NULL,
            motor_type      TEXT NOT NULL,
            quantity        INTEGER NOT NULL,
            missing_blue    INTEGER NOT NULL DEFAULT 0,
            missing_red     INTEGER NOT NULL DEFAULT 0,
            missing_gray    INTEGER NOT NULL DEFAULT 0,
            status          TEXT NOT NULL DEFAULT 'PENDING',
            runner_attempted INTEGER NOT NULL DEFAULT 0,
            resolved_by     TEXT,
            created_at      TEXT NOT NULL,
            resolved_at     TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS uq_missing_blocks_open_per_order
          ON missing_blocks_request(order_id) WHERE status = 'PENDING';

        CREATE INDEX IF NOT EXISTS idx_missing_blocks_status
          ON missing_blocks_request(status, runner_attempted);

        CREATE TABLE IF NOT EXISTS maintenance_order (
            maintenance_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            round_no        INTEGER NOT NULL,
            production_line INTEGER NOT NULL,
            status          TEXT NOT NULL DEFAULT 'PLANNED',
            description     TEXT NOT NULL DEFAULT '',
            created_at      TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_maintenance_round_line
          ON maintenance_order(round_no, production_line, status);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id     TEXT PRIMARY KEY,
            simulation_id TEXT,
            order_id      INTEGER,
            action_type   TEXT NOT NULL,
            actor         TEXT NOT NULL,
            action_ts     TEXT NOT NULL,
            payload_json  TEXT,
            detail        TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_action_log_ts ON action_log(action_ts);
        CREATE INDEX IF NOT EXISTS idx_action_log_order ON action_log(order_id);

        CREATE TABLE IF NOT EXISTS sim_config (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}
