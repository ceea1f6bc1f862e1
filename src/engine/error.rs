// ==========================================
// 学年升级批处理 - 引擎层错误类型
// ==========================================
// 职责: 区分状态守卫、完整性、输入校验三类业务错误
// 持久化错误带上操作名与实体 id 原样上抛,不重试
// ==========================================

use crate::domain::types::BatchStatus;
use crate::repository::error::RepositoryError;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PromotionError {
    // ===== 未找到 =====
    #[error("升级规则不存在: {0}")]
    RuleNotFound(String),

    #[error("升级批次不存在: {0}")]
    BatchNotFound(String),

    #[error("升级记录不存在: {0}")]
    RecordNotFound(String),

    // ===== 状态守卫 =====
    #[error("批次不是草稿状态: batch_id={batch_id}, status={status}")]
    BatchNotDraft { batch_id: String, status: BatchStatus },

    #[error("批次已处理: {0}")]
    BatchAlreadyProcessed(String),

    #[error("批次已取消: {0}")]
    BatchCancelled(String),

    #[error("批次当前不可处理: batch_id={batch_id}, status={status}")]
    BatchNotProcessable { batch_id: String, status: BatchStatus },

    // ===== 完整性 =====
    #[error("存在待定决策: batch_id={batch_id}, pending={pending}")]
    PendingDecisionsExist { batch_id: String, pending: usize },

    #[error("升级记录缺少目标班级: batch_id={batch_id}, record_id={record_id}, student_id={student_id}")]
    MissingTargetClass {
        batch_id: String,
        record_id: String,
        student_id: String,
    },

    #[error("来源范围内没有在读学生: year={academic_year_id}, class={class_id}, section={section_id:?}")]
    NoStudentsInSourceScope {
        academic_year_id: String,
        class_id: String,
        section_id: Option<String>,
    },

    // ===== 输入校验 =====
    #[error("无效的决策: {0}")]
    InvalidDecision(String),

    #[error("来源学年与目标学年相同: {0}")]
    InvalidAcademicYearPair(String),

    #[error("来源范围已存在未取消的批次: {existing_batch_id}")]
    DuplicateBatchForSource { existing_batch_id: String },

    // ===== 持久化 =====
    #[error("持久化失败: operation={operation}, id={entity_id}: {source}")]
    Repository {
        operation: &'static str,
        entity_id: String,
        #[source]
        source: RepositoryError,
    },
}

/// Result 类型别名
pub type PromotionResult<T> = Result<T, PromotionError>;

/// 为持久化结果附加操作上下文
pub trait RepoContext<T> {
    fn ctx(self, operation: &'static str, entity_id: &str) -> PromotionResult<T>;
}

impl<T, E> RepoContext<T> for Result<T, E>
where
    E: Into<RepositoryError>,
{
    fn ctx(self, operation: &'static str, entity_id: &str) -> PromotionResult<T> {
        self.map_err(|e| PromotionError::Repository {
            operation,
            entity_id: entity_id.to_string(),
            source: e.into(),
        })
    }
}

/// 获取共享连接（锁中毒视为持久化错误）
pub(crate) fn lock_connection<'a>(
    conn: &'a Arc<Mutex<Connection>>,
    entity_id: &str,
) -> PromotionResult<MutexGuard<'a, Connection>> {
    conn.lock()
        .map_err(|e| RepositoryError::LockError(e.to_string()))
        .ctx("lock_connection", entity_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctx_wraps_repository_error() {
        let raw: Result<(), rusqlite::Error> = Err(rusqlite::Error::QueryReturnedNoRows);
        let err = raw.ctx("load_batch", "b1").unwrap_err();
        match err {
            PromotionError::Repository {
                operation,
                entity_id,
                source,
            } => {
                assert_eq!(operation, "load_batch");
                assert_eq!(entity_id, "b1");
                assert!(matches!(source, RepositoryError::NotFound { .. }));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
