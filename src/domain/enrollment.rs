// ==========================================
// 学年升级批处理 - 学籍与学生领域模型
// ==========================================
// 学籍(enrollment)归学籍模块所有,本引擎只通过网关创建/结束学籍
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::EnrollmentStatus;

// ==========================================
// Enrollment - 学籍
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Enrollment {
    pub enrollment_id: String,
    pub tenant_id: String,
    pub student_id: String,
    pub academic_year_id: String,
    pub class_id: String,
    pub section_id: Option<String>,
    pub roll_number: Option<String>,
    pub status: EnrollmentStatus,
    pub completed_on: Option<NaiveDate>,
    pub created_at: NaiveDateTime,
}

/// 新建学籍参数
#[derive(Debug, Clone)]
pub struct NewEnrollment {
    pub tenant_id: String,
    pub student_id: String,
    pub academic_year_id: String,
    pub class_id: String,
    pub section_id: Option<String>,
    pub roll_number: Option<String>,
}

// ==========================================
// Student - 学生身份(报表用)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub student_id: String,
    pub tenant_id: String,
    pub full_name: String,
    pub admission_no: Option<String>,
}
