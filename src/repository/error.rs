// ==========================================
// 电机工厂流水线推演系统 - 仓储层错误类型
// ==========================================
// 职责: 仓储层统一错误枚举,CAS 落空/重复补齐/排期撞车各自独立成变体
// 红线: rusqlite 错误必须先归类再上抛,禁止把原始错误字符串直接透传给部门
// ==========================================

use thiserror::Error;

/// 仓储层错误
///
/// 并发相关的三个变体 (StaleStatus / Conflict / AlreadyResolved) 是
/// API 层区分"重读重试"与"直接放弃"的依据,不得合并
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// CAS 条件更新落空: 数据库中的当前状态与调用方读到的不一致
    #[error("{entity}(id={id}) 状态已被抢先修改: 期望 {expected}, 实际 {actual}")]
    StaleStatus {
        entity: String,
        id: String,
        expected: String,
        actual: String,
    },

    /// 互斥资源撞车,例如同轮同产线重复排保养
    #[error("资源冲突: {0}")]
    Conflict(String),

    /// 缺件申请已是补齐终态,跑腿员/补件员的后续操作一律拒绝
    #[error("缺件申请(request_id={request_id})已补齐,不接受重复处理")]
    AlreadyResolved { request_id: i64 },

    #[error("{entity}(id={id})不存在")]
    NotFound { entity: String, id: String },

    /// 连接 Mutex 中毒或拿锁失败
    #[error("数据库连接锁不可用: {0}")]
    LockError(String),

    /// 行数据还原不成领域类型,多半是手工改库留下的脏数据
    #[error("字段{field}取值非法: {message}")]
    FieldValueError { field: String, message: String },

    #[error("唯一约束冲突: {0}")]
    UniqueViolation(String),

    #[error("外键约束不满足: {0}")]
    ForeignKeyViolation(String),

    /// 其余 SQLite 故障统一归入此变体
    #[error("数据库操作失败: {0}")]
    Database(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// rusqlite 错误归类
// 约束类错误靠 SQLite 报错文本区分:
// "UNIQUE constraint failed" / "FOREIGN KEY constraint failed" 是固定措辞
// ==========================================
impl From<rusqlite::Error> for RepositoryError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::QueryReturnedNoRows => RepositoryError::NotFound {
                entity: "记录".to_string(),
                id: "?".to_string(),
            },
            rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.contains("UNIQUE constraint") => {
                RepositoryError::UniqueViolation(msg)
            }
            rusqlite::Error::SqliteFailure(_, Some(msg))
                if msg.contains("FOREIGN KEY constraint") =>
            {
                RepositoryError::ForeignKeyViolation(msg)
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

/// Result 类型别名
pub type RepositoryResult<T> = Result<T, RepositoryError>;
