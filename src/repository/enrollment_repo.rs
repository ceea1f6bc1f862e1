// ==========================================
// 学年升级批处理 - 学籍网关
// ==========================================
// 学籍归学籍模块所有;本引擎只经由 EnrollmentGateway 访问
// 所有方法都接收调用方的连接/事务,以便与批次处理组成同一原子边界
// ==========================================

use crate::db::{fmt_date, fmt_ts, get_opt_date, get_ts};
use crate::domain::enrollment::{Enrollment, NewEnrollment};
use crate::domain::types::EnrollmentStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};

const ENROLLMENT_COLUMNS: &str = r#"enrollment_id, tenant_id, student_id, academic_year_id,
       class_id, section_id, roll_number, status, completed_on, created_at"#;

/// 学籍协作方契约
pub trait EnrollmentGateway: Send + Sync {
    /// 来源范围内的 active 学籍（按学号、学生编号排序）
    ///
    /// section_id 为 None 时取整个班级
    fn list_active_in_scope(
        &self,
        conn: &Connection,
        tenant_id: &str,
        academic_year_id: &str,
        class_id: &str,
        section_id: Option<&str>,
    ) -> RepositoryResult<Vec<Enrollment>>;

    /// 新建 active 学籍,返回 enrollment_id
    fn create_enrollment(&self, conn: &Connection, new: &NewEnrollment) -> RepositoryResult<String>;

    /// 学生在指定学年的 active 学籍
    fn get_active_enrollment(
        &self,
        conn: &Connection,
        tenant_id: &str,
        student_id: &str,
        academic_year_id: &str,
    ) -> RepositoryResult<Option<Enrollment>>;

    /// 将学籍置为 completed
    fn complete_enrollment(
        &self,
        conn: &Connection,
        tenant_id: &str,
        enrollment_id: &str,
        completed_on: NaiveDate,
    ) -> RepositoryResult<()>;
}

// ==========================================
// SqliteEnrollmentGateway - 基于 enrollment 表的实现
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct SqliteEnrollmentGateway;

impl SqliteEnrollmentGateway {
    pub fn new() -> Self {
        Self
    }
}

impl EnrollmentGateway for SqliteEnrollmentGateway {
    fn list_active_in_scope(
        &self,
        conn: &Connection,
        tenant_id: &str,
        academic_year_id: &str,
        class_id: &str,
        section_id: Option<&str>,
    ) -> RepositoryResult<Vec<Enrollment>> {
        // ?4 为 NULL 时不过滤 section
        let sql = format!(
            r#"SELECT {} FROM enrollment
               WHERE tenant_id = ?1 AND academic_year_id = ?2 AND class_id = ?3
                 AND (?4 IS NULL OR section_id = ?4)
                 AND status = 'active'
               ORDER BY roll_number IS NULL, CAST(roll_number AS INTEGER), roll_number, student_id"#,
            ENROLLMENT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![tenant_id, academic_year_id, class_id, section_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create_enrollment(&self, conn: &Connection, new: &NewEnrollment) -> RepositoryResult<String> {
        let enrollment_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Local::now().naive_local();

        conn.execute(
            r#"INSERT INTO enrollment (
                enrollment_id, tenant_id, student_id, academic_year_id,
                class_id, section_id, roll_number, status, completed_on, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, ?9)"#,
            params![
                enrollment_id,
                new.tenant_id,
                new.student_id,
                new.academic_year_id,
                new.class_id,
                new.section_id,
                new.roll_number,
                EnrollmentStatus::Active.as_str(),
                fmt_ts(&now),
            ],
        )?;

        Ok(enrollment_id)
    }

    fn get_active_enrollment(
        &self,
        conn: &Connection,
        tenant_id: &str,
        student_id: &str,
        academic_year_id: &str,
    ) -> RepositoryResult<Option<Enrollment>> {
        let sql = format!(
            r#"SELECT {} FROM enrollment
               WHERE tenant_id = ?1 AND student_id = ?2 AND academic_year_id = ?3
                 AND status = 'active'
               ORDER BY created_at DESC
               LIMIT 1"#,
            ENROLLMENT_COLUMNS
        );
        let enrollment = conn
            .query_row(&sql, params![tenant_id, student_id, academic_year_id], map_row)
            .optional()?;
        Ok(enrollment)
    }

    fn complete_enrollment(
        &self,
        conn: &Connection,
        tenant_id: &str,
        enrollment_id: &str,
        completed_on: NaiveDate,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE enrollment SET status = 'completed', completed_on = ?1
               WHERE tenant_id = ?2 AND enrollment_id = ?3"#,
            params![fmt_date(&completed_on), tenant_id, enrollment_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("Enrollment", enrollment_id));
        }
        Ok(())
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Enrollment> {
    let status_str: String = row.get(7)?;
    let status = EnrollmentStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown enrollment status: {}", status_str).into(),
        )
    })?;

    Ok(Enrollment {
        enrollment_id: row.get(0)?,
        tenant_id: row.get(1)?,
        student_id: row.get(2)?,
        academic_year_id: row.get(3)?,
        class_id: row.get(4)?,
        section_id: row.get(5)?,
        roll_number: row.get(6)?,
        status,
        completed_on: get_opt_date(row, 8)?,
        created_at: get_ts(row, 9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{configure_sqlite_connection, init_schema};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO student (student_id, tenant_id, full_name) VALUES ('s1', 't1', 'Asha')",
            [],
        )
        .unwrap();
        conn
    }

    fn new_enrollment(year: &str, section: Option<&str>) -> NewEnrollment {
        NewEnrollment {
            tenant_id: "t1".to_string(),
            student_id: "s1".to_string(),
            academic_year_id: year.to_string(),
            class_id: "c5".to_string(),
            section_id: section.map(str::to_string),
            roll_number: Some("7".to_string()),
        }
    }

    #[test]
    fn test_active_lookup_is_scoped_to_year() {
        let conn = setup();
        let gw = SqliteEnrollmentGateway::new();

        let old_id = gw.create_enrollment(&conn, &new_enrollment("y1", Some("A"))).unwrap();
        let new_id = gw.create_enrollment(&conn, &new_enrollment("y2", Some("A"))).unwrap();

        let active_y1 = gw.get_active_enrollment(&conn, "t1", "s1", "y1").unwrap().unwrap();
        assert_eq!(active_y1.enrollment_id, old_id);

        gw.complete_enrollment(&conn, "t1", &old_id, NaiveDate::from_ymd_opt(2026, 3, 31).unwrap())
            .unwrap();
        assert!(gw.get_active_enrollment(&conn, "t1", "s1", "y1").unwrap().is_none());

        let active_y2 = gw.get_active_enrollment(&conn, "t1", "s1", "y2").unwrap().unwrap();
        assert_eq!(active_y2.enrollment_id, new_id);
    }

    #[test]
    fn test_scope_without_section_covers_whole_class() {
        let conn = setup();
        let gw = SqliteEnrollmentGateway::new();
        gw.create_enrollment(&conn, &new_enrollment("y1", Some("A"))).unwrap();

        let all = gw.list_active_in_scope(&conn, "t1", "y1", "c5", None).unwrap();
        assert_eq!(all.len(), 1);

        let other_section = gw.list_active_in_scope(&conn, "t1", "y1", "c5", Some("B")).unwrap();
        assert!(other_section.is_empty());

        let other_tenant = gw.list_active_in_scope(&conn, "t2", "y1", "c5", None).unwrap();
        assert!(other_tenant.is_empty());
    }

    #[test]
    fn test_complete_unknown_enrollment_is_not_found() {
        let conn = setup();
        let gw = SqliteEnrollmentGateway::new();
        let err = gw
            .complete_enrollment(&conn, "t1", "missing", NaiveDate::from_ymd_opt(2026, 3, 31).unwrap())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }
}
