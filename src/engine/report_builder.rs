// ==========================================
// 学年升级批处理 - 报表构建
// ==========================================
// 只读投影: 记录 + 学生身份 → 扁平行
// ==========================================

use crate::domain::promotion::PromotionRecord;
use crate::domain::report::{PromotionReport, PromotionReportRow};
use crate::domain::types::Decision;
use crate::engine::error::{PromotionError, PromotionResult, RepoContext};
use crate::repository::batch_repo::PromotionBatchRepository;
use crate::repository::record_repo::PromotionRecordRepository;
use crate::repository::student_repo::StudentRepository;
use std::sync::Arc;

pub struct ReportBuilder {
    batch_repo: Arc<PromotionBatchRepository>,
    record_repo: Arc<PromotionRecordRepository>,
    student_repo: Arc<StudentRepository>,
}

impl ReportBuilder {
    pub fn new(
        batch_repo: Arc<PromotionBatchRepository>,
        record_repo: Arc<PromotionRecordRepository>,
        student_repo: Arc<StudentRepository>,
    ) -> Self {
        Self {
            batch_repo,
            record_repo,
            student_repo,
        }
    }

    pub fn build(&self, tenant_id: &str, batch_id: &str) -> PromotionResult<PromotionReport> {
        let batch = self
            .batch_repo
            .find_by_id(tenant_id, batch_id)
            .ctx("load_batch", batch_id)?
            .ok_or_else(|| PromotionError::BatchNotFound(batch_id.to_string()))?;

        let records = self
            .record_repo
            .list_by_batch(tenant_id, batch_id)
            .ctx("list_records", batch_id)?;
        let students = self
            .student_repo
            .map_for_batch(tenant_id, batch_id)
            .ctx("load_students", batch_id)?;

        let rows = records
            .iter()
            .map(|record| {
                let student = students.get(&record.student_id);
                PromotionReportRow {
                    record_id: record.record_id.clone(),
                    student_id: record.student_id.clone(),
                    student_name: student.map(|s| s.full_name.clone()),
                    admission_no: student.and_then(|s| s.admission_no.clone()),
                    source_class_id: batch.source_class_id.clone(),
                    source_section_id: record.source_section_id.clone(),
                    source_roll_number: record.source_roll_number.clone(),
                    decision: record.decision,
                    target_class_id: record.target_class_id.clone(),
                    target_section_id: record.target_section_id.clone(),
                    target_roll_number: record.target_roll_number.clone(),
                    auto_decided: record.auto_decided,
                    reason: report_reason(record),
                    destination_enrollment_id: record.destination_enrollment_id.clone(),
                }
            })
            .collect();

        Ok(PromotionReport {
            batch_id: batch.batch_id,
            source_academic_year_id: batch.source_academic_year_id,
            source_class_id: batch.source_class_id,
            source_section_id: batch.source_section_id,
            dest_academic_year_id: batch.dest_academic_year_id,
            dest_class_id: batch.dest_class_id,
            status: batch.status,
            total_students: batch.total_students,
            promoted_count: batch.promoted_count,
            retained_count: batch.retained_count,
            transferred_count: batch.transferred_count,
            processed_at: batch.processed_at,
            rows,
        })
    }
}

/// 报表理由列
///
/// retain → 留级理由,缺失时退回决策理由;transfer → 转出去向;其余 → 决策理由
pub fn report_reason(record: &PromotionRecord) -> Option<String> {
    match record.decision {
        Decision::Retain => record
            .retention_reason
            .clone()
            .or_else(|| record.decision_reason.clone()),
        Decision::Transfer => record.transfer_destination.clone(),
        Decision::Promote | Decision::Pending => record.decision_reason.clone(),
    }
}
