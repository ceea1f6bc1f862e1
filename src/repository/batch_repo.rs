// ==========================================
// 学年升级批处理 - 升级批次仓储
// ==========================================
// 红线: Repository 不含业务逻辑,状态守卫写在 WHERE 条件里
// 并发: draft → processing 以 (status, revision) 条件更新,影响行数为 0 即抢占失败
// ==========================================

use crate::db::{fmt_ts, get_opt_ts, get_ts};
use crate::domain::promotion::PromotionBatch;
use crate::domain::types::BatchStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDateTime;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const BATCH_COLUMNS: &str = r#"batch_id, tenant_id, source_academic_year_id, source_class_id,
       source_section_id, dest_academic_year_id, dest_class_id, status,
       total_students, promoted_count, retained_count, transferred_count,
       notes, created_by, created_at, processed_at, processed_by,
       cancelled_at, cancelled_by, cancellation_reason, revision"#;

/// 批次列表过滤条件
#[derive(Debug, Clone, Default)]
pub struct BatchListFilter {
    pub status: Option<BatchStatus>,
    pub source_academic_year_id: Option<String>,
    pub source_class_id: Option<String>,
}

// ==========================================
// PromotionBatchRepository - 升级批次仓储
// ==========================================
pub struct PromotionBatchRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PromotionBatchRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作（事务内）
    // ==========================================

    /// 插入批次
    pub fn insert_in(conn: &Connection, batch: &PromotionBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"INSERT INTO promotion_batch (
                batch_id, tenant_id, source_academic_year_id, source_class_id,
                source_section_id, dest_academic_year_id, dest_class_id, status,
                total_students, promoted_count, retained_count, transferred_count,
                notes, created_by, created_at, processed_at, processed_by,
                cancelled_at, cancelled_by, cancellation_reason, revision
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21
            )"#,
            params![
                batch.batch_id,
                batch.tenant_id,
                batch.source_academic_year_id,
                batch.source_class_id,
                batch.source_section_id,
                batch.dest_academic_year_id,
                batch.dest_class_id,
                batch.status.as_str(),
                batch.total_students,
                batch.promoted_count,
                batch.retained_count,
                batch.transferred_count,
                batch.notes,
                batch.created_by,
                fmt_ts(&batch.created_at),
                batch.processed_at.as_ref().map(fmt_ts),
                batch.processed_by,
                batch.cancelled_at.as_ref().map(fmt_ts),
                batch.cancelled_by,
                batch.cancellation_reason,
                batch.revision,
            ],
        )?;
        Ok(())
    }

    /// 抢占批次进入 processing
    ///
    /// # 返回
    /// - `Ok(1)`: 抢占成功
    /// - `Ok(0)`: 状态已不是 draft 或 revision 已变化
    pub fn claim_for_processing_in(
        conn: &Connection,
        tenant_id: &str,
        batch_id: &str,
        expected_revision: i32,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            r#"UPDATE promotion_batch
               SET status = 'processing', revision = revision + 1
               WHERE tenant_id = ?1 AND batch_id = ?2
                 AND status = 'draft' AND revision = ?3"#,
            params![tenant_id, batch_id, expected_revision],
        )?;
        Ok(rows)
    }

    /// 写入最终计数并置为 completed
    pub fn mark_completed_in(
        conn: &Connection,
        tenant_id: &str,
        batch_id: &str,
        promoted: i32,
        retained: i32,
        transferred: i32,
        processed_at: NaiveDateTime,
        processed_by: &str,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE promotion_batch
               SET status = 'completed',
                   promoted_count = ?1, retained_count = ?2, transferred_count = ?3,
                   processed_at = ?4, processed_by = ?5, revision = revision + 1
               WHERE tenant_id = ?6 AND batch_id = ?7 AND status = 'processing'"#,
            params![
                promoted,
                retained,
                transferred,
                fmt_ts(&processed_at),
                processed_by,
                tenant_id,
                batch_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::DatabaseTransactionError(format!(
                "批次{}不在 processing 状态,无法完成",
                batch_id
            )));
        }
        Ok(())
    }

    /// 删除批次及其记录
    pub fn delete_in(conn: &Connection, tenant_id: &str, batch_id: &str) -> RepositoryResult<usize> {
        // 显式删除记录（不依赖连接是否开启 foreign_keys）
        conn.execute(
            "DELETE FROM promotion_record WHERE tenant_id = ?1 AND batch_id = ?2",
            params![tenant_id, batch_id],
        )?;
        let rows = conn.execute(
            "DELETE FROM promotion_batch WHERE tenant_id = ?1 AND batch_id = ?2 AND status = 'draft'",
            params![tenant_id, batch_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 写入操作（独立连接）
    // ==========================================

    /// 取消批次（仅 draft）
    ///
    /// # 返回
    /// - `Ok(0)`: 批次已不是 draft
    pub fn mark_cancelled(
        &self,
        tenant_id: &str,
        batch_id: &str,
        reason: &str,
        cancelled_by: &str,
        cancelled_at: NaiveDateTime,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let rows = conn.execute(
            r#"UPDATE promotion_batch
               SET status = 'cancelled', cancellation_reason = ?1,
                   cancelled_by = ?2, cancelled_at = ?3, revision = revision + 1
               WHERE tenant_id = ?4 AND batch_id = ?5 AND status = 'draft'"#,
            params![reason, cancelled_by, fmt_ts(&cancelled_at), tenant_id, batch_id],
        )?;
        Ok(rows)
    }

    /// 递增修订号（记录被修改时调用,使并发中的处理请求失效）
    pub fn bump_revision_in(conn: &Connection, tenant_id: &str, batch_id: &str) -> RepositoryResult<usize> {
        let rows = conn.execute(
            r#"UPDATE promotion_batch SET revision = revision + 1
               WHERE tenant_id = ?1 AND batch_id = ?2 AND status = 'draft'"#,
            params![tenant_id, batch_id],
        )?;
        Ok(rows)
    }

    // ==========================================
    // 查询操作
    // ==========================================

    pub fn find_by_id(&self, tenant_id: &str, batch_id: &str) -> RepositoryResult<Option<PromotionBatch>> {
        let conn = self.get_conn()?;
        Self::find_by_id_in(&conn, tenant_id, batch_id)
    }

    pub fn find_by_id_in(
        conn: &Connection,
        tenant_id: &str,
        batch_id: &str,
    ) -> RepositoryResult<Option<PromotionBatch>> {
        let sql = format!(
            "SELECT {} FROM promotion_batch WHERE tenant_id = ?1 AND batch_id = ?2",
            BATCH_COLUMNS
        );
        let batch = conn
            .query_row(&sql, params![tenant_id, batch_id], map_row)
            .optional()?;
        Ok(batch)
    }

    /// 查找与来源范围重叠的未取消批次
    ///
    /// 整班批次（section 为空）与该班任一分班批次互相重叠;
    /// 指定 section 时匹配同分班或整班批次
    pub fn find_open_for_source_in(
        conn: &Connection,
        tenant_id: &str,
        source_academic_year_id: &str,
        source_class_id: &str,
        source_section_id: Option<&str>,
    ) -> RepositoryResult<Option<PromotionBatch>> {
        let sql = format!(
            r#"SELECT {} FROM promotion_batch
               WHERE tenant_id = ?1
                 AND source_academic_year_id = ?2
                 AND source_class_id = ?3
                 AND (?4 IS NULL OR source_section_id IS NULL OR source_section_id = ?4)
                 AND status <> 'cancelled'
               ORDER BY created_at DESC
               LIMIT 1"#,
            BATCH_COLUMNS
        );
        let batch = conn
            .query_row(
                &sql,
                params![tenant_id, source_academic_year_id, source_class_id, source_section_id],
                map_row,
            )
            .optional()?;
        Ok(batch)
    }

    /// 批次列表（可选过滤,按创建时间倒序）
    pub fn list(
        &self,
        tenant_id: &str,
        filter: &BatchListFilter,
        limit: i64,
    ) -> RepositoryResult<Vec<PromotionBatch>> {
        let conn = self.get_conn()?;

        let mut sql = format!(
            "SELECT {} FROM promotion_batch WHERE tenant_id = ?1",
            BATCH_COLUMNS
        );
        let mut values: Vec<Value> = vec![Value::from(tenant_id.to_string())];
        let mut idx = 2;

        if let Some(status) = filter.status {
            sql.push_str(&format!(" AND status = ?{}", idx));
            values.push(Value::from(status.as_str().to_string()));
            idx += 1;
        }
        if let Some(year) = filter
            .source_academic_year_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sql.push_str(&format!(" AND source_academic_year_id = ?{}", idx));
            values.push(Value::from(year.to_string()));
            idx += 1;
        }
        if let Some(class_id) = filter
            .source_class_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sql.push_str(&format!(" AND source_class_id = ?{}", idx));
            values.push(Value::from(class_id.to_string()));
            idx += 1;
        }

        sql.push_str(&format!(" ORDER BY created_at DESC, batch_id LIMIT ?{}", idx));
        values.push(Value::from(limit));

        let mut stmt = conn.prepare(&sql)?;
        let batches = stmt
            .query_map(params_from_iter(values.iter()), map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PromotionBatch> {
    let status_str: String = row.get(7)?;
    let status = BatchStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown batch status: {}", status_str).into(),
        )
    })?;

    Ok(PromotionBatch {
        batch_id: row.get(0)?,
        tenant_id: row.get(1)?,
        source_academic_year_id: row.get(2)?,
        source_class_id: row.get(3)?,
        source_section_id: row.get(4)?,
        dest_academic_year_id: row.get(5)?,
        dest_class_id: row.get(6)?,
        status,
        total_students: row.get(8)?,
        promoted_count: row.get(9)?,
        retained_count: row.get(10)?,
        transferred_count: row.get(11)?,
        notes: row.get(12)?,
        created_by: row.get(13)?,
        created_at: get_ts(row, 14)?,
        processed_at: get_opt_ts(row, 15)?,
        processed_by: row.get(16)?,
        cancelled_at: get_opt_ts(row, 17)?,
        cancelled_by: row.get(18)?,
        cancellation_reason: row.get(19)?,
        revision: row.get(20)?,
    })
}
