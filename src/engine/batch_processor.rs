// ==========================================
// 学年升级批处理 - 批次处理器
// ==========================================
// 原子边界: 一个 IMMEDIATE 事务包住
//   抢占(draft→processing) → 逐条创建/结束学籍 → 回写记录 → 完成批次
// 任何一步失败整体回滚;processing 写入随之撤销,批次回到 draft
// 并发: 抢占以 (status='draft', revision) 条件更新,第二个调用方看到非 draft
// ==========================================

use crate::config::PromotionSettings;
use crate::domain::enrollment::NewEnrollment;
use crate::domain::promotion::{PromotionBatch, PromotionRecord};
use crate::domain::types::Decision;
use crate::engine::batch_lifecycle::{BatchStateMachine, BatchTransition};
use crate::engine::error::{lock_connection, PromotionError, PromotionResult, RepoContext};
use crate::engine::roll_number::RollNumberAllocator;
use crate::repository::batch_repo::PromotionBatchRepository;
use crate::repository::enrollment_repo::EnrollmentGateway;
use crate::repository::record_repo::PromotionRecordRepository;
use chrono::{Local, NaiveDate};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// 处理参数
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessOptions {
    /// 为未指定学号的升级/留级学生按目标分班顺序分配学号
    pub generate_roll_numbers: bool,
    /// 原学籍的结束日期,默认当天
    pub completion_date: Option<NaiveDate>,
}

/// 处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub batch: PromotionBatch,
    pub promoted: i32,
    pub retained: i32,
    pub transferred: i32,
    pub enrollments_created: usize,
    pub source_enrollments_completed: usize,
    pub roll_numbers_generated: usize,
}

#[derive(Debug, Default)]
struct Counters {
    promoted: i32,
    retained: i32,
    transferred: i32,
    enrollments_created: usize,
    source_enrollments_completed: usize,
    roll_numbers_generated: usize,
}

// ==========================================
// BatchProcessor - 批次处理器
// ==========================================
pub struct BatchProcessor {
    conn: Arc<Mutex<Connection>>,
    enrollments: Arc<dyn EnrollmentGateway>,
}

impl BatchProcessor {
    pub fn new(conn: Arc<Mutex<Connection>>, enrollments: Arc<dyn EnrollmentGateway>) -> Self {
        Self { conn, enrollments }
    }

    /// 处理批次
    ///
    /// # 返回
    /// - `Ok(outcome)`: 批次已 completed,计数与学籍均已落库
    /// - `Err(BatchAlreadyProcessed / BatchCancelled / BatchNotProcessable)`: 状态不允许,无任何写入
    /// - `Err(PendingDecisionsExist / MissingTargetClass)`: 已回滚,批次仍为 draft
    /// - `Err(Repository)`: 持久化失败,已回滚
    pub fn process(
        &self,
        tenant_id: &str,
        batch_id: &str,
        options: &ProcessOptions,
        settings: &PromotionSettings,
        actor: &str,
    ) -> PromotionResult<ProcessOutcome> {
        let mut conn = lock_connection(&self.conn, batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_process", batch_id)?;

        let batch = PromotionBatchRepository::find_by_id_in(&tx, tenant_id, batch_id)
            .ctx("load_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))?;
        let next = BatchStateMachine::ensure(&batch, BatchTransition::BeginProcessing)?;

        let claimed = PromotionBatchRepository::claim_for_processing_in(&tx, tenant_id, batch_id, batch.revision)
            .ctx("claim_batch", batch_id)?;
        if claimed == 0 {
            return Err(PromotionError::BatchNotProcessable {
                batch_id: batch_id.to_string(),
                status: batch.status,
            });
        }
        debug!(tenant_id, batch_id, revision = batch.revision, "批次已进入 processing");

        let batch = PromotionBatch {
            status: next,
            revision: batch.revision + 1,
            ..batch
        };

        match self.run_claimed(&tx, &batch, options, settings, actor) {
            Ok(outcome) => {
                tx.commit().ctx("commit_process", batch_id)?;
                info!(
                    tenant_id,
                    batch_id,
                    promoted = outcome.promoted,
                    retained = outcome.retained,
                    transferred = outcome.transferred,
                    enrollments_created = outcome.enrollments_created,
                    actor,
                    "升级批次处理完成"
                );
                Ok(outcome)
            }
            Err(err) => {
                if let Err(rb) = tx.rollback() {
                    warn!(batch_id, error = %rb, "回滚失败,依赖连接关闭时撤销");
                }
                warn!(tenant_id, batch_id, error = %err, "升级批次处理被拒绝,已回滚到 draft");
                Err(err)
            }
        }
    }

    fn run_claimed(
        &self,
        tx: &Transaction<'_>,
        batch: &PromotionBatch,
        options: &ProcessOptions,
        settings: &PromotionSettings,
        actor: &str,
    ) -> PromotionResult<ProcessOutcome> {
        let tenant_id = batch.tenant_id.as_str();
        let batch_id = batch.batch_id.as_str();

        let records = PromotionRecordRepository::list_by_batch_in(tx, tenant_id, batch_id)
            .ctx("list_records", batch_id)?;

        // 1. 完整性: 任一 pending 即整体拒绝
        let pending = records.iter().filter(|r| r.is_pending()).count();
        if pending > 0 {
            return Err(PromotionError::PendingDecisionsExist {
                batch_id: batch_id.to_string(),
                pending,
            });
        }

        let completion_date = options
            .completion_date
            .unwrap_or_else(|| Local::now().date_naive());

        let mut allocator = RollNumberAllocator::new(settings.roll_number_start);
        if options.generate_roll_numbers {
            Self::reserve_manual_numbers(&mut allocator, batch, &records, settings);
        }

        // 2-4. 逐条处理
        let mut counters = Counters::default();
        let now = Local::now().naive_local();

        for mut record in records {
            match record.decision {
                Decision::Promote => {
                    let class_id = record.target_class_id.clone().ok_or_else(|| {
                        PromotionError::MissingTargetClass {
                            batch_id: batch_id.to_string(),
                            record_id: record.record_id.clone(),
                            student_id: record.student_id.clone(),
                        }
                    })?;
                    let section_id = record.target_section_id.clone();
                    self.enroll(tx, batch, &mut record, class_id, section_id, options, &mut allocator, &mut counters)?;
                    counters.promoted += 1;
                }
                Decision::Retain => {
                    let class_id = batch.source_class_id.clone();
                    let section_id = Self::retain_section(&record, settings);
                    self.enroll(tx, batch, &mut record, class_id, section_id, options, &mut allocator, &mut counters)?;
                    counters.retained += 1;
                }
                Decision::Transfer => {
                    counters.transferred += 1;
                }
                Decision::Pending => {
                    return Err(PromotionError::PendingDecisionsExist {
                        batch_id: batch_id.to_string(),
                        pending: 1,
                    });
                }
            }

            // 3. 结束来源学年的 active 学籍;已结束的跳过
            match self
                .enrollments
                .get_active_enrollment(tx, tenant_id, &record.student_id, &batch.source_academic_year_id)
                .ctx("get_active_enrollment", &record.student_id)?
            {
                Some(active) => {
                    self.enrollments
                        .complete_enrollment(tx, tenant_id, &active.enrollment_id, completion_date)
                        .ctx("complete_enrollment", &active.enrollment_id)?;
                    counters.source_enrollments_completed += 1;
                }
                None => {
                    debug!(batch_id, student_id = %record.student_id, "来源学籍已非 active,跳过");
                }
            }

            // 4. 回写记录
            record.updated_at = now;
            PromotionRecordRepository::update_in(tx, &record).ctx("update_record", &record.record_id)?;
        }

        // 5. 完成批次
        let completed = BatchStateMachine::ensure(batch, BatchTransition::Complete)?;
        PromotionBatchRepository::mark_completed_in(
            tx,
            tenant_id,
            batch_id,
            counters.promoted,
            counters.retained,
            counters.transferred,
            now,
            actor,
        )
        .ctx("complete_batch", batch_id)?;

        let finished = PromotionBatchRepository::find_by_id_in(tx, tenant_id, batch_id)
            .ctx("reload_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))?;
        if finished.status != completed {
            return Err(PromotionError::BatchNotProcessable {
                batch_id: batch_id.to_string(),
                status: finished.status,
            });
        }

        Ok(ProcessOutcome {
            batch: finished,
            promoted: counters.promoted,
            retained: counters.retained,
            transferred: counters.transferred,
            enrollments_created: counters.enrollments_created,
            source_enrollments_completed: counters.source_enrollments_completed,
            roll_numbers_generated: counters.roll_numbers_generated,
        })
    }

    /// 创建目标学年学籍,并把学籍号/目标/学号写回记录
    #[allow(clippy::too_many_arguments)]
    fn enroll(
        &self,
        tx: &Transaction<'_>,
        batch: &PromotionBatch,
        record: &mut PromotionRecord,
        class_id: String,
        section_id: Option<String>,
        options: &ProcessOptions,
        allocator: &mut RollNumberAllocator,
        counters: &mut Counters,
    ) -> PromotionResult<()> {
        let roll_number = match record.target_roll_number.clone() {
            Some(n) => Some(n),
            None if options.generate_roll_numbers => {
                counters.roll_numbers_generated += 1;
                Some(allocator.next(&class_id, section_id.as_deref()))
            }
            None => None,
        };

        let new = NewEnrollment {
            tenant_id: batch.tenant_id.clone(),
            student_id: record.student_id.clone(),
            academic_year_id: batch.dest_academic_year_id.clone(),
            class_id: class_id.clone(),
            section_id: section_id.clone(),
            roll_number: roll_number.clone(),
        };
        let enrollment_id = self
            .enrollments
            .create_enrollment(tx, &new)
            .ctx("create_enrollment", &record.student_id)?;

        record.target_class_id = Some(class_id);
        record.target_section_id = section_id;
        record.target_roll_number = roll_number;
        record.destination_enrollment_id = Some(enrollment_id);
        counters.enrollments_created += 1;
        Ok(())
    }

    /// 留级目标分班: 记录指定优先,否则按配置沿用来源分班
    fn retain_section(record: &PromotionRecord, settings: &PromotionSettings) -> Option<String> {
        record.target_section_id.clone().or_else(|| {
            if settings.retain_keep_source_section {
                record.source_section_id.clone()
            } else {
                None
            }
        })
    }

    /// 人工指定的学号先登记,自动分配时避开
    fn reserve_manual_numbers(
        allocator: &mut RollNumberAllocator,
        batch: &PromotionBatch,
        records: &[PromotionRecord],
        settings: &PromotionSettings,
    ) {
        for record in records {
            let Some(roll) = record.target_roll_number.as_deref() else {
                continue;
            };
            match record.decision {
                Decision::Promote => {
                    if let Some(class_id) = record.target_class_id.as_deref() {
                        allocator.reserve(class_id, record.target_section_id.as_deref(), roll);
                    }
                }
                Decision::Retain => {
                    let section = Self::retain_section(record, settings);
                    allocator.reserve(&batch.source_class_id, section.as_deref(), roll);
                }
                Decision::Transfer | Decision::Pending => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promotion::PerformanceSnapshot;

    fn record(decision: Decision, target_section: Option<&str>, source_section: Option<&str>) -> PromotionRecord {
        let ts = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        PromotionRecord {
            record_id: "r1".to_string(),
            batch_id: "b1".to_string(),
            tenant_id: "t1".to_string(),
            seq_no: 1,
            student_id: "s1".to_string(),
            source_enrollment_id: "e1".to_string(),
            source_section_id: source_section.map(str::to_string),
            source_roll_number: None,
            decision,
            target_class_id: None,
            target_section_id: target_section.map(str::to_string),
            target_roll_number: None,
            auto_decided: false,
            decision_reason: None,
            retention_reason: None,
            transfer_destination: None,
            overridden_by: None,
            overridden_at: None,
            override_reason: None,
            destination_enrollment_id: None,
            performance: PerformanceSnapshot::default(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn test_retain_section_prefers_record_target() {
        let settings = PromotionSettings::default();
        let r = record(Decision::Retain, Some("B"), Some("A"));
        assert_eq!(BatchProcessor::retain_section(&r, &settings).as_deref(), Some("B"));

        let r = record(Decision::Retain, None, Some("A"));
        assert_eq!(BatchProcessor::retain_section(&r, &settings).as_deref(), Some("A"));

        let settings = PromotionSettings {
            retain_keep_source_section: false,
            ..PromotionSettings::default()
        };
        assert_eq!(BatchProcessor::retain_section(&r, &settings), None);
    }
}
