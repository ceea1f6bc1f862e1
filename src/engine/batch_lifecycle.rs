// ==========================================
// 学年升级批处理 - 批次生命周期
// ==========================================
// 状态机: draft → processing → completed
//         draft → cancelled
//         draft → (删除)
// 处理失败时事务回滚,processing 写入随之撤销,批次回到 draft
// completed / cancelled 为终态,没有出边
// ==========================================

use crate::domain::promotion::PromotionBatch;
use crate::domain::types::BatchStatus;
use crate::engine::error::{lock_connection, PromotionError, PromotionResult, RepoContext};
use crate::engine::record_manager::RecordManager;
use crate::repository::batch_repo::PromotionBatchRepository;
use crate::repository::enrollment_repo::EnrollmentGateway;
use crate::repository::performance_repo::PerformanceSource;
use crate::repository::record_repo::PromotionRecordRepository;
use chrono::Local;
use rusqlite::{Connection, TransactionBehavior};
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

// ==========================================
// BatchTransition - 状态迁移
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchTransition {
    Cancel,
    Delete,
    Edit, // 修改记录（不改变状态,但要求 draft）
    BeginProcessing,
    Complete,
}

pub struct BatchStateMachine;

impl BatchStateMachine {
    /// 迁移后的状态;不允许时返回 None
    ///
    /// Delete / Edit 不产生新状态,允许时返回当前状态
    pub fn next_status(current: BatchStatus, transition: BatchTransition) -> Option<BatchStatus> {
        use BatchStatus::*;
        use BatchTransition::*;

        match (current, transition) {
            (Draft, Cancel) => Some(Cancelled),
            (Draft, Delete) => Some(Draft),
            (Draft, Edit) => Some(Draft),
            (Draft, BeginProcessing) => Some(Processing),
            (Processing, Complete) => Some(Completed),
            _ => None,
        }
    }

    /// 校验迁移,不允许时给出对应的状态错误
    pub fn ensure(batch: &PromotionBatch, transition: BatchTransition) -> PromotionResult<BatchStatus> {
        if let Some(next) = Self::next_status(batch.status, transition) {
            return Ok(next);
        }

        let batch_id = batch.batch_id.clone();
        Err(match transition {
            BatchTransition::Cancel | BatchTransition::Delete | BatchTransition::Edit => {
                PromotionError::BatchNotDraft {
                    batch_id,
                    status: batch.status,
                }
            }
            BatchTransition::BeginProcessing | BatchTransition::Complete => match batch.status {
                BatchStatus::Completed => PromotionError::BatchAlreadyProcessed(batch_id),
                BatchStatus::Cancelled => PromotionError::BatchCancelled(batch_id),
                status => PromotionError::BatchNotProcessable { batch_id, status },
            },
        })
    }
}

/// 创建批次参数
#[derive(Debug, Clone)]
pub struct NewBatch {
    pub source_academic_year_id: String,
    pub source_class_id: String,
    pub source_section_id: Option<String>,
    pub dest_academic_year_id: String,
    pub dest_class_id: Option<String>,
    pub notes: Option<String>,
}

// ==========================================
// BatchLifecycleManager - 批次创建/取消/删除
// ==========================================
pub struct BatchLifecycleManager {
    conn: Arc<Mutex<Connection>>,
    batch_repo: Arc<PromotionBatchRepository>,
    enrollments: Arc<dyn EnrollmentGateway>,
    performance: Arc<dyn PerformanceSource>,
}

impl BatchLifecycleManager {
    pub fn new(
        conn: Arc<Mutex<Connection>>,
        batch_repo: Arc<PromotionBatchRepository>,
        enrollments: Arc<dyn EnrollmentGateway>,
        performance: Arc<dyn PerformanceSource>,
    ) -> Self {
        Self {
            conn,
            batch_repo,
            enrollments,
            performance,
        }
    }

    /// 创建批次并快照全部在读学生
    ///
    /// # 返回
    /// - `Ok(batch)`: 新批次(draft),total_students = 记录数
    /// - `Err(InvalidAcademicYearPair)`: 来源与目标学年相同
    /// - `Err(DuplicateBatchForSource)`: 同一来源范围已有未取消批次
    /// - `Err(NoStudentsInSourceScope)`: 来源范围没有 active 学籍
    pub fn create_batch(&self, tenant_id: &str, req: &NewBatch, actor: &str) -> PromotionResult<PromotionBatch> {
        if req.source_academic_year_id == req.dest_academic_year_id {
            return Err(PromotionError::InvalidAcademicYearPair(
                req.source_academic_year_id.clone(),
            ));
        }

        let now = Local::now().naive_local();
        let mut batch = PromotionBatch {
            batch_id: uuid::Uuid::new_v4().to_string(),
            tenant_id: tenant_id.to_string(),
            source_academic_year_id: req.source_academic_year_id.clone(),
            source_class_id: req.source_class_id.clone(),
            source_section_id: req.source_section_id.clone(),
            dest_academic_year_id: req.dest_academic_year_id.clone(),
            dest_class_id: req.dest_class_id.clone(),
            status: BatchStatus::Draft,
            total_students: 0,
            promoted_count: 0,
            retained_count: 0,
            transferred_count: 0,
            notes: req.notes.clone(),
            created_by: actor.to_string(),
            created_at: now,
            processed_at: None,
            processed_by: None,
            cancelled_at: None,
            cancelled_by: None,
            cancellation_reason: None,
            revision: 1,
        };

        let mut conn = lock_connection(&self.conn, &batch.batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_create_batch", &batch.batch_id)?;

        if let Some(existing) = PromotionBatchRepository::find_open_for_source_in(
            &tx,
            tenant_id,
            &req.source_academic_year_id,
            &req.source_class_id,
            req.source_section_id.as_deref(),
        )
        .ctx("find_open_batch", &req.source_class_id)?
        {
            return Err(PromotionError::DuplicateBatchForSource {
                existing_batch_id: existing.batch_id,
            });
        }

        let records = RecordManager::snapshot_records_in(
            &tx,
            &batch,
            self.enrollments.as_ref(),
            self.performance.as_ref(),
            now,
        )?;
        batch.total_students = records.len() as i32;

        PromotionBatchRepository::insert_in(&tx, &batch).ctx("insert_batch", &batch.batch_id)?;
        PromotionRecordRepository::insert_batch_in(&tx, &records).ctx("insert_records", &batch.batch_id)?;
        tx.commit().ctx("commit_create_batch", &batch.batch_id)?;

        info!(
            tenant_id,
            batch_id = %batch.batch_id,
            source_class_id = %batch.source_class_id,
            total_students = batch.total_students,
            "升级批次已创建"
        );
        Ok(batch)
    }

    /// 取消批次（仅 draft,理由由调用方校验非空）
    pub fn cancel_batch(
        &self,
        tenant_id: &str,
        batch_id: &str,
        reason: &str,
        actor: &str,
    ) -> PromotionResult<PromotionBatch> {
        let batch = self.load(tenant_id, batch_id)?;
        BatchStateMachine::ensure(&batch, BatchTransition::Cancel)?;

        let rows = self
            .batch_repo
            .mark_cancelled(tenant_id, batch_id, reason, actor, Local::now().naive_local())
            .ctx("cancel_batch", batch_id)?;

        // 读取与更新之间状态被改变
        let current = self.load(tenant_id, batch_id)?;
        if rows == 0 {
            BatchStateMachine::ensure(&current, BatchTransition::Cancel)?;
        }

        info!(tenant_id, batch_id, actor, "升级批次已取消");
        Ok(current)
    }

    /// 删除批次及其记录（仅 draft）
    ///
    /// # 返回
    /// - `Ok(batch)`: 删除前的批次快照
    pub fn delete_batch(&self, tenant_id: &str, batch_id: &str) -> PromotionResult<PromotionBatch> {
        let mut conn = lock_connection(&self.conn, batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_delete_batch", batch_id)?;

        let batch = PromotionBatchRepository::find_by_id_in(&tx, tenant_id, batch_id)
            .ctx("load_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))?;
        BatchStateMachine::ensure(&batch, BatchTransition::Delete)?;

        let rows = PromotionBatchRepository::delete_in(&tx, tenant_id, batch_id).ctx("delete_batch", batch_id)?;
        debug!(batch_id, rows, "删除批次行");
        tx.commit().ctx("commit_delete_batch", batch_id)?;

        info!(tenant_id, batch_id, "升级批次已删除");
        Ok(batch)
    }

    /// 读取批次,不存在时返回 BatchNotFound
    pub fn load(&self, tenant_id: &str, batch_id: &str) -> PromotionResult<PromotionBatch> {
        self.batch_repo
            .find_by_id(tenant_id, batch_id)
            .ctx("load_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))
    }
}
