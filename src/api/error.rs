// ==========================================
// 学年升级批处理 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型,把引擎/仓储错误转换为可区分的业务错误
// 传输层按 code() 映射状态码,按 Display 展示原因
// ==========================================

use crate::engine::error::PromotionError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
/// 所有错误信息必须包含显式原因
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 资源未找到
    // ==========================================
    #[error("升级规则不存在: {0}")]
    RuleNotFound(String),

    #[error("升级批次不存在: {0}")]
    BatchNotFound(String),

    #[error("升级记录不存在: {0}")]
    RecordNotFound(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 批次状态守卫
    // ==========================================
    #[error("批次不是草稿状态: batch_id={batch_id}, status={status}")]
    BatchNotDraft { batch_id: String, status: String },

    #[error("批次已处理: {0}")]
    BatchAlreadyProcessed(String),

    #[error("批次已取消: {0}")]
    BatchCancelled(String),

    #[error("批次当前不可处理: batch_id={batch_id}, status={status}")]
    BatchNotProcessable { batch_id: String, status: String },

    // ==========================================
    // 完整性
    // ==========================================
    #[error("存在待定决策: batch_id={batch_id}, pending={pending}")]
    PendingDecisionsExist { batch_id: String, pending: usize },

    #[error("升级记录缺少目标班级: record_id={record_id}, student_id={student_id}")]
    MissingTargetClass { record_id: String, student_id: String },

    #[error("来源范围内没有在读学生: {0}")]
    NoStudentsInSourceScope(String),

    // ==========================================
    // 输入校验
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("无效的决策: {0}")]
    InvalidDecision(String),

    #[error("来源学年与目标学年相同: {0}")]
    InvalidAcademicYearPair(String),

    #[error("来源范围已存在未取消的批次: {0}")]
    DuplicateBatchForSource(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

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

impl ApiError {
    /// 稳定的错误码,供传输层映射
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::RuleNotFound(_) => "RULE_NOT_FOUND",
            ApiError::BatchNotFound(_) => "BATCH_NOT_FOUND",
            ApiError::RecordNotFound(_) => "RECORD_NOT_FOUND",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BatchNotDraft { .. } => "BATCH_NOT_DRAFT",
            ApiError::BatchAlreadyProcessed(_) => "BATCH_ALREADY_PROCESSED",
            ApiError::BatchCancelled(_) => "BATCH_CANCELLED",
            ApiError::BatchNotProcessable { .. } => "BATCH_NOT_PROCESSABLE",
            ApiError::PendingDecisionsExist { .. } => "PENDING_DECISIONS_EXIST",
            ApiError::MissingTargetClass { .. } => "MISSING_TARGET_CLASS",
            ApiError::NoStudentsInSourceScope(_) => "NO_STUDENTS_IN_SOURCE_SCOPE",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::InvalidDecision(_) => "INVALID_DECISION",
            ApiError::InvalidAcademicYearPair(_) => "INVALID_ACADEMIC_YEAR_PAIR",
            ApiError::DuplicateBatchForSource(_) => "DUPLICATE_BATCH_FOR_SOURCE",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseTransactionError(_) => "DATABASE_TRANSACTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "INTERNAL_ERROR",
        }
    }
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
            RepositoryError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            RepositoryError::LockError(msg) => ApiError::DatabaseError(format!("数据库锁获取失败: {}", msg)),
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::DatabaseError(format!("外键约束违反: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 PromotionError 转换(保持错误种类)
// ==========================================
impl From<PromotionError> for ApiError {
    fn from(err: PromotionError) -> Self {
        match err {
            PromotionError::RuleNotFound(id) => ApiError::RuleNotFound(id),
            PromotionError::BatchNotFound(id) => ApiError::BatchNotFound(id),
            PromotionError::RecordNotFound(id) => ApiError::RecordNotFound(id),
            PromotionError::BatchNotDraft { batch_id, status } => ApiError::BatchNotDraft {
                batch_id,
                status: status.to_string(),
            },
            PromotionError::BatchAlreadyProcessed(id) => ApiError::BatchAlreadyProcessed(id),
            PromotionError::BatchCancelled(id) => ApiError::BatchCancelled(id),
            PromotionError::BatchNotProcessable { batch_id, status } => ApiError::BatchNotProcessable {
                batch_id,
                status: status.to_string(),
            },
            PromotionError::PendingDecisionsExist { batch_id, pending } => {
                ApiError::PendingDecisionsExist { batch_id, pending }
            }
            PromotionError::MissingTargetClass {
                record_id, student_id, ..
            } => ApiError::MissingTargetClass { record_id, student_id },
            PromotionError::NoStudentsInSourceScope {
                academic_year_id,
                class_id,
                section_id,
            } => ApiError::NoStudentsInSourceScope(format!(
                "year={}, class={}, section={}",
                academic_year_id,
                class_id,
                section_id.as_deref().unwrap_or("*")
            )),
            PromotionError::InvalidDecision(msg) => ApiError::InvalidDecision(msg),
            PromotionError::InvalidAcademicYearPair(msg) => ApiError::InvalidAcademicYearPair(msg),
            PromotionError::DuplicateBatchForSource { existing_batch_id } => {
                ApiError::DuplicateBatchForSource(existing_batch_id)
            }
            PromotionError::Repository {
                operation,
                entity_id,
                source,
            } => match ApiError::from(source) {
                ApiError::DatabaseError(msg) => {
                    ApiError::DatabaseError(format!("{}({}): {}", operation, entity_id, msg))
                }
                ApiError::DatabaseTransactionError(msg) => {
                    ApiError::DatabaseTransactionError(format!("{}({}): {}", operation, entity_id, msg))
                }
                other => other,
            },
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::BatchStatus;

    #[test]
    fn test_promotion_error_keeps_kind() {
        let err: ApiError = PromotionError::BatchNotDraft {
            batch_id: "b1".to_string(),
            status: BatchStatus::Completed,
        }
        .into();
        assert_eq!(err.code(), "BATCH_NOT_DRAFT");
        assert!(err.to_string().contains("completed"));

        let err: ApiError = PromotionError::PendingDecisionsExist {
            batch_id: "b1".to_string(),
            pending: 2,
        }
        .into();
        assert_eq!(err.code(), "PENDING_DECISIONS_EXIST");
    }

    #[test]
    fn test_lost_claim_maps_to_not_processable() {
        // 抢占失败（revision 已变化）统一报告为不可处理
        let err: ApiError = PromotionError::BatchNotProcessable {
            batch_id: "b1".to_string(),
            status: BatchStatus::Draft,
        }
        .into();
        assert_eq!(err.code(), "BATCH_NOT_PROCESSABLE");
    }

    #[test]
    fn test_repository_error_carries_operation() {
        let err: ApiError = PromotionError::Repository {
            operation: "insert_batch",
            entity_id: "b1".to_string(),
            source: RepositoryError::DatabaseQueryError("disk I/O error".to_string()),
        }
        .into();
        assert_eq!(err.code(), "DATABASE_ERROR");
        let msg = err.to_string();
        assert!(msg.contains("insert_batch(b1)"));
        assert!(msg.contains("disk I/O error"));
    }

    #[test]
    fn test_repository_not_found_maps_to_not_found() {
        let err: ApiError = RepositoryError::not_found("PromotionRecord", "r9").into();
        assert_eq!(err.code(), "NOT_FOUND");
    }
}
