// ==========================================
// 学年升级批处理 - 报表模型
// ==========================================
// 只读投影,不参与任何写入
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::domain::types::{BatchStatus, Decision};

/// 报表行（一名学生一行）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionReportRow {
    pub record_id: String,
    pub student_id: String,
    pub student_name: Option<String>,
    pub admission_no: Option<String>,

    pub source_class_id: String,
    pub source_section_id: Option<String>,
    pub source_roll_number: Option<String>,

    pub decision: Decision,
    pub target_class_id: Option<String>,
    pub target_section_id: Option<String>,
    pub target_roll_number: Option<String>,

    pub auto_decided: bool,
    pub reason: Option<String>, // 按决策类型取值,见 ReportBuilder
    pub destination_enrollment_id: Option<String>,
}

/// 报表(批次头 + 明细行)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionReport {
    pub batch_id: String,
    pub source_academic_year_id: String,
    pub source_class_id: String,
    pub source_section_id: Option<String>,
    pub dest_academic_year_id: String,
    pub dest_class_id: Option<String>,
    pub status: BatchStatus,
    pub total_students: i32,
    pub promoted_count: i32,
    pub retained_count: i32,
    pub transferred_count: i32,
    pub processed_at: Option<NaiveDateTime>,
    pub rows: Vec<PromotionReportRow>,
}
