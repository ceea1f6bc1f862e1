// ==========================================
// 学年升级批处理 - 升级记录管理
// ==========================================
// 职责: 创建批次时快照记录;草稿期的人工覆写与规则自动判定
// 红线: 只有 draft 批次的记录可以修改
// ==========================================

use crate::config::PromotionSettings;
use crate::domain::promotion::{PromotionBatch, PromotionRecord, RecordSummary};
use crate::domain::types::Decision;
use crate::engine::batch_lifecycle::{BatchStateMachine, BatchTransition};
use crate::engine::decision_evaluator::DecisionEvaluator;
use crate::engine::error::{lock_connection, PromotionError, PromotionResult, RepoContext};
use crate::repository::batch_repo::PromotionBatchRepository;
use crate::repository::enrollment_repo::EnrollmentGateway;
use crate::repository::performance_repo::PerformanceSource;
use crate::repository::record_repo::PromotionRecordRepository;
use crate::repository::rule_repo::PromotionRuleRepository;
use chrono::{Local, NaiveDateTime};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// 单条人工覆写
///
/// `None` 表示保留原值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub record_id: String,
    pub decision: Decision,
    pub target_class_id: Option<String>,
    pub target_section_id: Option<String>,
    pub target_roll_number: Option<String>,
    pub decision_reason: Option<String>,
    pub retention_reason: Option<String>,
    pub transfer_destination: Option<String>,
    pub override_reason: Option<String>,
}

impl RecordUpdate {
    /// 应用到记录上:清除自动判定标记,写入覆写人/时间/理由
    pub fn apply(&self, record: &mut PromotionRecord, actor: &str, now: NaiveDateTime) {
        record.decision = self.decision;

        if let Some(v) = &self.target_class_id {
            record.target_class_id = Some(v.clone());
        }
        if let Some(v) = &self.target_section_id {
            record.target_section_id = Some(v.clone());
        }
        if let Some(v) = self.target_roll_number.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            record.target_roll_number = Some(v.to_string());
        }
        if let Some(v) = &self.decision_reason {
            record.decision_reason = Some(v.clone());
        }
        if let Some(v) = &self.retention_reason {
            record.retention_reason = Some(v.clone());
        }
        if let Some(v) = &self.transfer_destination {
            record.transfer_destination = Some(v.clone());
        }

        record.auto_decided = false;
        record.overridden_by = Some(actor.to_string());
        record.overridden_at = Some(now);
        record.override_reason = self.override_reason.clone();
        record.updated_at = now;
    }
}

/// 批量覆写结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateOutcome {
    pub updated: Vec<String>,
    pub skipped: Vec<String>, // 批次内不存在的 record_id
}

/// 自动判定汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoDecideSummary {
    pub evaluated: usize,
    pub promote: usize,
    pub retain: usize,
    pub pending: usize,
    pub skipped_manual: usize,
    pub rule_applied: bool,
}

/// 记录列表 + 汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordListing {
    pub batch_id: String,
    pub records: Vec<PromotionRecord>,
    pub summary: RecordSummary,
}

// ==========================================
// RecordManager - 升级记录管理
// ==========================================
pub struct RecordManager {
    conn: Arc<Mutex<Connection>>,
    record_repo: Arc<PromotionRecordRepository>,
}

impl RecordManager {
    pub fn new(conn: Arc<Mutex<Connection>>, record_repo: Arc<PromotionRecordRepository>) -> Self {
        Self { conn, record_repo }
    }

    /// 为来源范围内每个 active 学籍生成一条 pending 记录
    ///
    /// 批次有目标班级时预填 target_class_id(不预填学号)
    pub fn snapshot_records_in(
        conn: &Connection,
        batch: &PromotionBatch,
        enrollments: &dyn EnrollmentGateway,
        performance: &dyn PerformanceSource,
        now: NaiveDateTime,
    ) -> PromotionResult<Vec<PromotionRecord>> {
        let active = enrollments
            .list_active_in_scope(
                conn,
                &batch.tenant_id,
                &batch.source_academic_year_id,
                &batch.source_class_id,
                batch.source_section_id.as_deref(),
            )
            .ctx("list_active_enrollments", &batch.source_class_id)?;

        if active.is_empty() {
            return Err(PromotionError::NoStudentsInSourceScope {
                academic_year_id: batch.source_academic_year_id.clone(),
                class_id: batch.source_class_id.clone(),
                section_id: batch.source_section_id.clone(),
            });
        }

        let mut records = Vec::with_capacity(active.len());
        for (idx, enrollment) in active.into_iter().enumerate() {
            let snapshot = performance
                .snapshot_for(
                    conn,
                    &batch.tenant_id,
                    &enrollment.student_id,
                    &batch.source_academic_year_id,
                )
                .ctx("load_performance", &enrollment.student_id)?
                .unwrap_or_default();

            records.push(PromotionRecord {
                record_id: uuid::Uuid::new_v4().to_string(),
                batch_id: batch.batch_id.clone(),
                tenant_id: batch.tenant_id.clone(),
                seq_no: idx as i32 + 1,
                student_id: enrollment.student_id,
                source_enrollment_id: enrollment.enrollment_id,
                source_section_id: enrollment.section_id,
                source_roll_number: enrollment.roll_number,
                decision: Decision::Pending,
                target_class_id: batch.dest_class_id.clone(),
                target_section_id: None,
                target_roll_number: None,
                auto_decided: false,
                decision_reason: None,
                retention_reason: None,
                transfer_destination: None,
                overridden_by: None,
                overridden_at: None,
                override_reason: None,
                destination_enrollment_id: None,
                performance: snapshot,
                created_at: now,
                updated_at: now,
            });
        }

        debug!(batch_id = %batch.batch_id, count = records.len(), "记录快照完成");
        Ok(records)
    }

    /// 批次记录 + 汇总
    pub fn list_records(&self, tenant_id: &str, batch_id: &str) -> PromotionResult<RecordListing> {
        let records = self
            .record_repo
            .list_by_batch(tenant_id, batch_id)
            .ctx("list_records", batch_id)?;
        let summary = RecordSummary::from_records(&records);
        Ok(RecordListing {
            batch_id: batch_id.to_string(),
            records,
            summary,
        })
    }

    /// 单条人工覆写
    pub fn update_record(
        &self,
        tenant_id: &str,
        batch_id: &str,
        update: &RecordUpdate,
        actor: &str,
    ) -> PromotionResult<PromotionRecord> {
        Self::ensure_decided(update)?;

        let mut conn = lock_connection(&self.conn, batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_update_record", &update.record_id)?;

        Self::load_editable_batch(&tx, tenant_id, batch_id)?;

        let mut record = PromotionRecordRepository::list_by_batch_in(&tx, tenant_id, batch_id)
            .ctx("list_records", batch_id)?
            .into_iter()
            .find(|r| r.record_id == update.record_id)
            .ok_or_else(|| PromotionError::RecordNotFound(update.record_id.clone()))?;

        update.apply(&mut record, actor, Local::now().naive_local());
        PromotionRecordRepository::update_in(&tx, &record).ctx("update_record", &record.record_id)?;
        PromotionBatchRepository::bump_revision_in(&tx, tenant_id, batch_id).ctx("bump_revision", batch_id)?;
        tx.commit().ctx("commit_update_record", &record.record_id)?;

        info!(
            tenant_id,
            batch_id,
            record_id = %record.record_id,
            decision = %record.decision,
            actor,
            "升级记录已人工覆写"
        );
        Ok(record)
    }

    /// 批量人工覆写
    ///
    /// 先校验全部决策(任一无效则整体失败),批次内不存在的 record_id 跳过
    pub fn bulk_update(
        &self,
        tenant_id: &str,
        batch_id: &str,
        updates: &[RecordUpdate],
        actor: &str,
    ) -> PromotionResult<BulkUpdateOutcome> {
        for update in updates {
            Self::ensure_decided(update)?;
        }

        let mut conn = lock_connection(&self.conn, batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_bulk_update", batch_id)?;

        Self::load_editable_batch(&tx, tenant_id, batch_id)?;

        let mut by_id: HashMap<String, PromotionRecord> =
            PromotionRecordRepository::list_by_batch_in(&tx, tenant_id, batch_id)
                .ctx("list_records", batch_id)?
                .into_iter()
                .map(|r| (r.record_id.clone(), r))
                .collect();

        let now = Local::now().naive_local();
        let mut outcome = BulkUpdateOutcome::default();

        for update in updates {
            match by_id.get_mut(&update.record_id) {
                Some(record) => {
                    update.apply(record, actor, now);
                    PromotionRecordRepository::update_in(&tx, record).ctx("update_record", &record.record_id)?;
                    outcome.updated.push(update.record_id.clone());
                }
                None => {
                    debug!(batch_id, record_id = %update.record_id, "批量覆写跳过未知记录");
                    outcome.skipped.push(update.record_id.clone());
                }
            }
        }

        if !outcome.updated.is_empty() {
            PromotionBatchRepository::bump_revision_in(&tx, tenant_id, batch_id).ctx("bump_revision", batch_id)?;
        }
        tx.commit().ctx("commit_bulk_update", batch_id)?;

        info!(
            tenant_id,
            batch_id,
            updated = outcome.updated.len(),
            skipped = outcome.skipped.len(),
            actor,
            "批量覆写完成"
        );
        Ok(outcome)
    }

    /// 按来源班级规则自动判定
    ///
    /// 人工覆写过的记录默认跳过;判定结果非 pending 时置 auto_decided
    pub fn auto_decide(
        &self,
        tenant_id: &str,
        batch_id: &str,
        settings: &PromotionSettings,
    ) -> PromotionResult<AutoDecideSummary> {
        let mut conn = lock_connection(&self.conn, batch_id)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .ctx("begin_auto_decide", batch_id)?;

        let batch = Self::load_editable_batch(&tx, tenant_id, batch_id)?;
        let rule = PromotionRuleRepository::find_by_class_in(&tx, tenant_id, &batch.source_class_id)
            .ctx("load_rule", &batch.source_class_id)?;

        let records = PromotionRecordRepository::list_by_batch_in(&tx, tenant_id, batch_id)
            .ctx("list_records", batch_id)?;

        let now = Local::now().naive_local();
        let mut summary = AutoDecideSummary {
            rule_applied: rule.as_ref().map(|r| r.is_active && r.auto_promote).unwrap_or(false),
            ..Default::default()
        };

        for mut record in records {
            if record.is_manual_override() && !settings.auto_decide_overwrite_manual {
                summary.skipped_manual += 1;
                continue;
            }

            let eval = DecisionEvaluator::evaluate(&record, rule.as_ref(), batch.dest_class_id.as_deref());
            summary.evaluated += 1;

            record.decision = eval.decision;
            record.decision_reason = Some(eval.reason.clone());
            record.auto_decided = eval.decision != Decision::Pending;
            record.overridden_by = None;
            record.overridden_at = None;
            record.override_reason = None;

            match eval.decision {
                Decision::Promote => {
                    summary.promote += 1;
                    // 上一轮留级写入的来源班级不能作为升级目标
                    let previous = record
                        .target_class_id
                        .take()
                        .filter(|class_id| *class_id != batch.source_class_id);
                    record.target_class_id = batch.dest_class_id.clone().or(previous);
                    record.retention_reason = None;
                }
                Decision::Retain => {
                    summary.retain += 1;
                    record.target_class_id = Some(batch.source_class_id.clone());
                    record.retention_reason = Some(eval.reason);
                }
                Decision::Pending => summary.pending += 1,
                Decision::Transfer => {}
            }
            record.updated_at = now;

            PromotionRecordRepository::update_in(&tx, &record).ctx("update_record", &record.record_id)?;
        }

        if summary.evaluated > 0 {
            PromotionBatchRepository::bump_revision_in(&tx, tenant_id, batch_id).ctx("bump_revision", batch_id)?;
        }
        tx.commit().ctx("commit_auto_decide", batch_id)?;

        info!(
            tenant_id,
            batch_id,
            evaluated = summary.evaluated,
            promote = summary.promote,
            retain = summary.retain,
            pending = summary.pending,
            skipped_manual = summary.skipped_manual,
            "自动判定完成"
        );
        Ok(summary)
    }

    fn ensure_decided(update: &RecordUpdate) -> PromotionResult<()> {
        if update.decision == Decision::Pending {
            return Err(PromotionError::InvalidDecision(format!(
                "人工覆写不能设为 pending: record_id={}",
                update.record_id
            )));
        }
        Ok(())
    }

    fn load_editable_batch(tx: &Transaction<'_>, tenant_id: &str, batch_id: &str) -> PromotionResult<PromotionBatch> {
        let batch = PromotionBatchRepository::find_by_id_in(tx, tenant_id, batch_id)
            .ctx("load_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))?;
        BatchStateMachine::ensure(&batch, BatchTransition::Edit)?;
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::promotion::PerformanceSnapshot;
    use chrono::NaiveDate;

    fn record() -> PromotionRecord {
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
            source_section_id: Some("A".to_string()),
            source_roll_number: Some("4".to_string()),
            decision: Decision::Promote,
            target_class_id: Some("c6".to_string()),
            target_section_id: None,
            target_roll_number: None,
            auto_decided: true,
            decision_reason: Some("meets all promotion criteria".to_string()),
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
    fn test_apply_marks_manual_override() {
        let mut r = record();
        let update = RecordUpdate {
            record_id: "r1".to_string(),
            decision: Decision::Transfer,
            target_class_id: None,
            target_section_id: None,
            target_roll_number: None,
            decision_reason: None,
            retention_reason: None,
            transfer_destination: Some("City Public School".to_string()),
            override_reason: Some("family relocated".to_string()),
        };
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        update.apply(&mut r, "principal", now);

        assert_eq!(r.decision, Decision::Transfer);
        assert!(!r.auto_decided);
        assert!(r.is_manual_override());
        assert_eq!(r.overridden_by.as_deref(), Some("principal"));
        assert_eq!(r.transfer_destination.as_deref(), Some("City Public School"));
        // 未提供的字段保留原值
        assert_eq!(r.target_class_id.as_deref(), Some("c6"));
        assert_eq!(r.decision_reason.as_deref(), Some("meets all promotion criteria"));
    }

    #[test]
    fn test_apply_trims_roll_number() {
        let mut r = record();
        let update = RecordUpdate {
            record_id: "r1".to_string(),
            decision: Decision::Promote,
            target_class_id: None,
            target_section_id: None,
            target_roll_number: Some(" 3 ".to_string()),
            decision_reason: None,
            retention_reason: None,
            transfer_destination: None,
            override_reason: None,
        };
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();

        update.apply(&mut r, "registrar", now);
        assert_eq!(r.target_roll_number.as_deref(), Some("3"));

        // 空白学号视为未提供
        let blank = RecordUpdate {
            target_roll_number: Some("   ".to_string()),
            ..update
        };
        blank.apply(&mut r, "registrar", now);
        assert_eq!(r.target_roll_number.as_deref(), Some("3"));
    }

    #[test]
    fn test_pending_override_rejected() {
        let update = RecordUpdate {
            record_id: "r1".to_string(),
            decision: Decision::Pending,
            target_class_id: None,
            target_section_id: None,
            target_roll_number: None,
            decision_reason: None,
            retention_reason: None,
            transfer_destination: None,
            override_reason: None,
        };
        assert!(matches!(
            RecordManager::ensure_decided(&update),
            Err(PromotionError::InvalidDecision(_))
        ));
    }
}
