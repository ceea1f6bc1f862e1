// ==========================================
// 学年升级批处理 - 学业表现来源
// ==========================================
// student_performance 由成绩/考勤模块汇总写入,本引擎只读
// ==========================================

use crate::domain::promotion::PerformanceSnapshot;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension};

/// 学业表现读取契约
pub trait PerformanceSource: Send + Sync {
    /// 学生在指定学年的表现快照;无数据返回 None
    fn snapshot_for(
        &self,
        conn: &Connection,
        tenant_id: &str,
        student_id: &str,
        academic_year_id: &str,
    ) -> RepositoryResult<Option<PerformanceSnapshot>>;
}

#[derive(Debug, Default, Clone)]
pub struct SqlitePerformanceSource;

impl SqlitePerformanceSource {
    pub fn new() -> Self {
        Self
    }
}

impl PerformanceSource for SqlitePerformanceSource {
    fn snapshot_for(
        &self,
        conn: &Connection,
        tenant_id: &str,
        student_id: &str,
        academic_year_id: &str,
    ) -> RepositoryResult<Option<PerformanceSnapshot>> {
        let snapshot = conn
            .query_row(
                r#"SELECT attendance_pct, overall_marks_pct, subjects_passed
                   FROM student_performance
                   WHERE tenant_id = ?1 AND student_id = ?2 AND academic_year_id = ?3"#,
                params![tenant_id, student_id, academic_year_id],
                |row| {
                    Ok(PerformanceSnapshot {
                        attendance_pct: row.get(0)?,
                        overall_marks_pct: row.get(1)?,
                        subjects_passed: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(snapshot)
    }
}
