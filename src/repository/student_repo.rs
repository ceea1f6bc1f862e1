// ==========================================
// 学年升级批处理 - 学生身份查询
// ==========================================
// 只读;报表用来补全姓名与学号
// ==========================================

use crate::domain::enrollment::Student;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct StudentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl StudentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 批次内学生身份映射（student_id → Student）
    pub fn map_for_batch(&self, tenant_id: &str, batch_id: &str) -> RepositoryResult<HashMap<String, Student>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT s.student_id, s.tenant_id, s.full_name, s.admission_no
               FROM student s
               JOIN promotion_record r
                 ON r.student_id = s.student_id AND r.tenant_id = s.tenant_id
               WHERE r.tenant_id = ?1 AND r.batch_id = ?2"#,
        )?;

        let students = stmt
            .query_map(params![tenant_id, batch_id], |row| {
                Ok(Student {
                    student_id: row.get(0)?,
                    tenant_id: row.get(1)?,
                    full_name: row.get(2)?,
                    admission_no: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(students
            .into_iter()
            .map(|s| (s.student_id.clone(), s))
            .collect())
    }
}
