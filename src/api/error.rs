// ==========================================
// 电机工厂流水线推演系统 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,把 Repository/调度器错误转换为面向部门的业务错误
// 红线: 所有拒绝必须带显式原因,部门看板原样展示
// ==========================================

use crate::engine::scheduler::SchedulerError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
///
/// 错误信息面向部门操作员,原因必须完整可读
#[derive(Error, Debug)]
pub enum ApiError {
    /// 状态机拒绝的流转（含并发抢先导致的状态过期）
    #[error("无效的状态流转: {reason} (当前状态={from}, 动作={trigger})")]
    InvalidTransition {
        from: String,
        trigger: String,
        reason: String,
    },

    #[error("输入不合法: {0}")]
    InvalidInput(String),

    #[error("目标不存在: {0}")]
    NotFound(String),

    #[error("冲突: {0}")]
    Conflict(String),

    #[error("缺件申请已补齐: request_id={0}")]
    AlreadyResolved(i64),

    #[error("数据访问失败: {0}")]
    DatabaseError(String),

    #[error("配置读取失败: {0}")]
    ConfigError(String),

    #[error("内部异常: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 把仓储层的技术错误转换为部门可读的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制: CAS 落空说明状态已被别的部门抢先改掉
            RepositoryError::StaleStatus {
                entity,
                id,
                expected,
                actual,
            } => ApiError::InvalidTransition {
                from: actual.clone(),
                trigger: "CONCURRENT_UPDATE".to_string(),
                reason: format!(
                    "{}(id={})状态已被并发操作修改,期望{},实际{}",
                    entity, id, expected, actual
                ),
            },
            RepositoryError::Conflict(msg) => ApiError::Conflict(msg),
            RepositoryError::AlreadyResolved { request_id } => {
                ApiError::AlreadyResolved(request_id)
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}不存在: id={}", entity, id))
            }

            // 唯一约束撞车对部门而言就是一次资源冲突
            RepositoryError::UniqueViolation(msg) => {
                ApiError::Conflict(format!("资源已存在: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::InvalidInput(format!("关联数据不存在: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}取值非法: {}", field, message))
            }

            // 数据访问故障
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseError(format!("连接锁不可用: {}", msg))
            }
            RepositoryError::Database(msg) => ApiError::DatabaseError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SchedulerError 转换
// ==========================================
impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::SimulationNotFound(id) => {
                ApiError::NotFound(format!("Simulation不存在: id={}", id))
            }
            SchedulerError::Conflict(msg) => ApiError::Conflict(msg),
            SchedulerError::ConfigError(msg) => ApiError::ConfigError(msg),
            SchedulerError::Internal(msg) => ApiError::InternalError(msg),
            SchedulerError::Repository(err) => ApiError::from(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stale_status_becomes_invalid_transition() {
        let repo_err = RepositoryError::StaleStatus {
            entity: "Order".to_string(),
            id: "7".to_string(),
            expected: "PENDING".to_string(),
            actual: "APPROVED_BY_VOORRAADBEHEER".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::InvalidTransition { from, reason, .. } => {
                assert_eq!(from, "APPROVED_BY_VOORRAADBEHEER");
                assert!(reason.contains("并发"));
            }
            other => panic!("应转换为InvalidTransition: {:?}", other),
        }
    }

    #[test]
    fn test_not_found_conversion() {
        let repo_err = RepositoryError::NotFound {
            entity: "Order".to_string(),
            id: "99".to_string(),
        };
        let api_err: ApiError = repo_err.into();
        match api_err {
            ApiError::NotFound(msg) => {
                assert!(msg.contains("Order"));
                assert!(msg.contains("99"));
            }
            other => panic!("应转换为NotFound: {:?}", other),
        }
    }

    #[test]
    fn test_already_resolved_conversion() {
        let api_err: ApiError = RepositoryError::AlreadyResolved { request_id: 3 }.into();
        assert!(matches!(api_err, ApiError::AlreadyResolved(3)));
    }

    #[test]
    fn test_unique_violation_becomes_conflict() {
        let repo_err = RepositoryError::UniqueViolation(
            "UNIQUE constraint failed: maintenance_schedule.round_no".to_string(),
        );
        let api_err: ApiError = repo_err.into();
        assert!(matches!(api_err, ApiError::Conflict(_)));
    }

    #[test]
    fn test_scheduler_conflict_conversion() {
        let api_err: ApiError = SchedulerError::Conflict("推演已在进行中".to_string()).into();
        match api_err {
            ApiError::Conflict(msg) => assert!(msg.contains("已在进行中")),
            other => panic!("应转换为Conflict: {:?}", other),
        }
    }
}
