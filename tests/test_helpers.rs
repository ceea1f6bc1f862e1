// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、学生/学籍/成绩种子数据、常用查询
// ==========================================

#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tempfile::NamedTempFile;

use school_promotion::api::{CreateBatchRequest, PromotionApi, RecordUpdateRequest};
use school_promotion::app::AppState;
use school_promotion::logging;

pub const TENANT: &str = "tenant-a";
pub const OTHER_TENANT: &str = "tenant-b";
pub const YEAR_2025: &str = "ay-2025";
pub const YEAR_2026: &str = "ay-2026";
pub const ACTOR: &str = "admin";

// ==========================================
// API测试环境
// ==========================================

/// API测试环境
///
/// 临时文件需要与环境同生命周期
pub struct ApiTestEnv {
    pub _temp_file: NamedTempFile,
    pub db_path: String,
    pub state: AppState,
    pub api: Arc<PromotionApi>,
}

impl ApiTestEnv {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        logging::init_test();
        let temp_file = NamedTempFile::new()?;
        let db_path = temp_file.path().to_string_lossy().to_string();
        let state = AppState::new(db_path.clone())?;
        let api = state.promotion_api.clone();

        Ok(Self {
            _temp_file: temp_file,
            db_path,
            state,
            api,
        })
    }

    /// 同一数据库文件上再开一套独立连接(模拟另一个进程)
    pub fn second_state(&self) -> AppState {
        AppState::new(self.db_path.clone()).expect("无法打开第二个连接")
    }

    // ==========================================
    // 种子数据
    // ==========================================

    /// 新增学生并登记 active 学籍,返回学籍ID
    #[allow(clippy::too_many_arguments)]
    pub fn seed_student(
        &self,
        tenant_id: &str,
        student_id: &str,
        full_name: &str,
        year: &str,
        class_id: &str,
        section_id: Option<&str>,
        roll_number: Option<&str>,
    ) -> String {
        let conn = self.state.conn.lock().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO student (student_id, tenant_id, full_name, admission_no) VALUES (?1, ?2, ?3, ?4)",
            params![student_id, tenant_id, full_name, format!("ADM-{}", student_id)],
        )
        .unwrap();

        let enrollment_id = format!("enr-{}-{}", student_id, year);
        conn.execute(
            r#"INSERT INTO enrollment
               (enrollment_id, tenant_id, student_id, academic_year_id, class_id, section_id,
                roll_number, status, completed_on, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'active', NULL, '2025-04-01 08:00:00')"#,
            params![enrollment_id, tenant_id, student_id, year, class_id, section_id, roll_number],
        )
        .unwrap();
        enrollment_id
    }

    /// 批量种子: class 下 n 名学生,学号从 1 开始
    pub fn seed_class(&self, tenant_id: &str, class_id: &str, section_id: Option<&str>, n: usize) -> Vec<String> {
        (1..=n)
            .map(|i| {
                let student_id = format!("{}-{}-s{}", class_id, section_id.unwrap_or("x"), i);
                self.seed_student(
                    tenant_id,
                    &student_id,
                    &format!("学生{}", i),
                    YEAR_2025,
                    class_id,
                    section_id,
                    Some(&i.to_string()),
                );
                student_id
            })
            .collect()
    }

    pub fn seed_performance(
        &self,
        tenant_id: &str,
        student_id: &str,
        attendance_pct: Option<f64>,
        overall_marks_pct: Option<f64>,
        subjects_passed: Option<i32>,
    ) {
        let conn = self.state.conn.lock().unwrap();
        conn.execute(
            r#"INSERT OR REPLACE INTO student_performance
               (tenant_id, student_id, academic_year_id, attendance_pct, overall_marks_pct, subjects_passed)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
            params![tenant_id, student_id, YEAR_2025, attendance_pct, overall_marks_pct, subjects_passed],
        )
        .unwrap();
    }

    /// 直接改学籍状态(模拟学籍模块的外部操作)
    pub fn set_enrollment_status(&self, enrollment_id: &str, status: &str) {
        let conn = self.state.conn.lock().unwrap();
        conn.execute(
            "UPDATE enrollment SET status = ?1 WHERE enrollment_id = ?2",
            params![status, enrollment_id],
        )
        .unwrap();
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn count_enrollments(&self, tenant_id: &str, year: &str, class_id: &str) -> i64 {
        let conn = self.state.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM enrollment WHERE tenant_id = ?1 AND academic_year_id = ?2 AND class_id = ?3",
            params![tenant_id, year, class_id],
            |row| row.get(0),
        )
        .unwrap()
    }

    pub fn count_year_enrollments(&self, tenant_id: &str, year: &str) -> i64 {
        let conn = self.state.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM enrollment WHERE tenant_id = ?1 AND academic_year_id = ?2",
            params![tenant_id, year],
            |row| row.get(0),
        )
        .unwrap()
    }

    /// (status, completed_on)
    pub fn enrollment_state(&self, enrollment_id: &str) -> Option<(String, Option<String>)> {
        let conn = self.state.conn.lock().unwrap();
        conn.query_row(
            "SELECT status, completed_on FROM enrollment WHERE enrollment_id = ?1",
            params![enrollment_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()
        .unwrap()
    }

    /// (class_id, section_id, roll_number)
    pub fn enrollment_target(&self, enrollment_id: &str) -> (String, Option<String>, Option<String>) {
        let conn = self.state.conn.lock().unwrap();
        conn.query_row(
            "SELECT class_id, section_id, roll_number FROM enrollment WHERE enrollment_id = ?1",
            params![enrollment_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .unwrap()
    }

    pub fn action_types(&self, tenant_id: &str, batch_id: &str) -> Vec<String> {
        self.api
            .list_action_logs(tenant_id, batch_id)
            .unwrap()
            .into_iter()
            .map(|log| log.action_type.as_str().to_string())
            .collect()
    }
}

// ==========================================
// 请求构造
// ==========================================

pub fn batch_request(class_id: &str, section_id: Option<&str>, dest_class_id: Option<&str>) -> CreateBatchRequest {
    CreateBatchRequest {
        source_academic_year_id: YEAR_2025.to_string(),
        source_class_id: class_id.to_string(),
        source_section_id: section_id.map(str::to_string),
        dest_academic_year_id: YEAR_2026.to_string(),
        dest_class_id: dest_class_id.map(str::to_string),
        notes: None,
    }
}

pub fn decide(record_id: &str, decision: &str, target_class_id: Option<&str>) -> RecordUpdateRequest {
    RecordUpdateRequest {
        record_id: record_id.to_string(),
        decision: decision.to_string(),
        target_class_id: target_class_id.map(str::to_string),
        override_reason: Some("班主任确认".to_string()),
        ..Default::default()
    }
}
