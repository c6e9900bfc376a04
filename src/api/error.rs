// ==========================================
// 轨道测量任务管理 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 把 Repository / Engine 错误转换为用户友好的错误消息
// 红线: 所有错误信息必须包含显式原因
// ==========================================

use crate::engine::context::Notice;
use crate::engine::error::{EngineError, MissionCandidate};
use crate::repository::error::RepositoryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误 (阻断)
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("资源冲突: {0}")]
    ResourceConflict(String),

    #[error("分类字段已锁定: {0}")]
    ClassificationLocked(String),

    // ==========================================
    // 文件归档
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    /// 多个任务匹配, 需要用户选择后调用 attach_to
    #[error("找到 {} 个匹配任务, 请选择", .0.len())]
    MultipleMatches(Vec<MissionCandidate>),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::StoredValueError(msg) => ApiError::DatabaseError(msg),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Repository(e) => e.into(),
            EngineError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            EngineError::ClassificationLocked { .. } => ApiError::ClassificationLocked(err.to_string()),
            EngineError::ResourceConflict { .. } => ApiError::ResourceConflict(err.to_string()),
            EngineError::MultipleMatches(candidates) => ApiError::MultipleMatches(candidates),
            EngineError::NoMatchingMission(_) | EngineError::ParseError(_) => {
                ApiError::ImportError(err.to_string())
            }
            EngineError::PlanningWeekMissing(_) => ApiError::ImportError(err.to_string()),
            EngineError::ValidationFailed(_)
            | EngineError::QuantityMismatch { .. }
            | EngineError::WeekdayMisalignment(_)
            | EngineError::InvalidDateRange { .. }
            | EngineError::CodeGeneration(_) => ApiError::ValidationError(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        RepositoryError::from(err).into()
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

// ==========================================
// WriteOutcome - 成功写入 + 非阻断提示
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteOutcome<T> {
    pub value: T,
    pub notices: Vec<Notice>,
}

impl<T> WriteOutcome<T> {
    pub fn has_notice(&self, key: &str) -> bool {
        self.notices.iter().any(|n| n.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_conversion() {
        let api_err: ApiError = RepositoryError::not_found("Mission", 42).into();
        match api_err {
            ApiError::NotFound(msg) => assert!(msg.contains("42")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_engine_validation_maps_to_validation_error() {
        let api_err: ApiError = EngineError::QuantityMismatch {
            cart_type: "LYNX".to_string(),
            required: 2,
            assigned: 1,
        }
        .into();
        assert!(matches!(api_err, ApiError::ValidationError(ref m) if m.contains("LYNX")));
    }
}
