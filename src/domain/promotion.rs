// ==========================================
// 学年升级批处理 - 升级领域模型
// ==========================================
// 实体: promotion_rule / promotion_batch / promotion_record
// 红线: 计数器只在 status=completed 后有意义
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{BatchStatus, Decision};

// ==========================================
// PromotionRule - 班级升级规则
// ==========================================
// 约束: 每个 (tenant_id, class_id) 至多一条
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionRule {
    pub rule_id: String,
    pub tenant_id: String,
    pub class_id: String,
    pub min_attendance_pct: Option<f64>,    // 最低出勤率(%)
    pub min_overall_marks_pct: Option<f64>, // 最低总成绩(%)
    pub min_subjects_passed: Option<i32>,   // 最少及格科目数
    pub auto_promote: bool,                 // 是否按阈值自动判定
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// ==========================================
// PerformanceSnapshot - 学业表现快照
// ==========================================
// 任一指标缺失时,评估器跳过对应阈值(不视为不达标)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub attendance_pct: Option<f64>,
    pub overall_marks_pct: Option<f64>,
    pub subjects_passed: Option<i32>,
}

// ==========================================
// PromotionBatch - 升级批次
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionBatch {
    pub batch_id: String,
    pub tenant_id: String,

    // ===== 来源范围 =====
    pub source_academic_year_id: String,
    pub source_class_id: String,
    pub source_section_id: Option<String>,

    // ===== 目标 =====
    pub dest_academic_year_id: String,
    pub dest_class_id: Option<String>, // 批次级默认目标班级

    // ===== 状态与计数 =====
    pub status: BatchStatus,
    pub total_students: i32, // 创建时快照的记录数,此后不变
    pub promoted_count: i32,
    pub retained_count: i32,
    pub transferred_count: i32,

    // ===== 审计 =====
    pub notes: Option<String>,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub processed_at: Option<NaiveDateTime>,
    pub processed_by: Option<String>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub cancelled_by: Option<String>,
    pub cancellation_reason: Option<String>,

    pub revision: i32, // 乐观锁：批次修订号
}

impl PromotionBatch {
    pub fn is_draft(&self) -> bool {
        self.status == BatchStatus::Draft
    }

    /// 已完成批次的计数器之和
    pub fn decided_total(&self) -> i32 {
        self.promoted_count + self.retained_count + self.transferred_count
    }
}

// ==========================================
// PromotionRecord - 学生升级记录
// ==========================================
// 红线: destination_enrollment_id 只在处理成功时写入一次,transfer 永不写入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub record_id: String,
    pub batch_id: String,
    pub tenant_id: String,
    pub seq_no: i32, // 创建顺序,决定自动学号分配顺序

    // ===== 来源 =====
    pub student_id: String,
    pub source_enrollment_id: String,
    pub source_section_id: Option<String>,
    pub source_roll_number: Option<String>,

    // ===== 决策 =====
    pub decision: Decision,
    pub target_class_id: Option<String>,
    pub target_section_id: Option<String>,
    pub target_roll_number: Option<String>,
    pub auto_decided: bool,
    pub decision_reason: Option<String>,
    pub retention_reason: Option<String>,
    pub transfer_destination: Option<String>,

    // ===== 人工覆写 =====
    pub overridden_by: Option<String>,
    pub overridden_at: Option<NaiveDateTime>,
    pub override_reason: Option<String>,

    // ===== 处理结果 =====
    pub destination_enrollment_id: Option<String>,

    // ===== 表现快照 =====
    pub performance: PerformanceSnapshot,

    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PromotionRecord {
    pub fn is_pending(&self) -> bool {
        self.decision == Decision::Pending
    }

    pub fn is_manual_override(&self) -> bool {
        !self.auto_decided && self.overridden_at.is_some()
    }
}

/// 记录列表汇总
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSummary {
    pub total: usize,
    pub pending: usize,
    pub promote: usize,
    pub retain: usize,
    pub transfer: usize,
    pub auto_decided: usize,
    pub manual_overrides: usize,
}

impl RecordSummary {
    pub fn from_records(records: &[PromotionRecord]) -> Self {
        let mut summary = RecordSummary {
            total: records.len(),
            ..Default::default()
        };
        for record in records {
            match record.decision {
                Decision::Pending => summary.pending += 1,
                Decision::Promote => summary.promote += 1,
                Decision::Retain => summary.retain += 1,
                Decision::Transfer => summary.transfer += 1,
            }
            if record.auto_decided {
                summary.auto_decided += 1;
            }
            if record.is_manual_override() {
                summary.manual_overrides += 1;
            }
        }
        summary
    }
}
