// ==========================================
// 学年升级批处理 - 升级记录仓储
// ==========================================
// 红线: Repository 不含业务逻辑
// 顺序: 所有列表按 seq_no 升序,与创建顺序一致
// ==========================================

use crate::db::{fmt_ts, get_opt_ts, get_ts};
use crate::domain::promotion::{PerformanceSnapshot, PromotionRecord};
use crate::domain::types::Decision;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

const RECORD_COLUMNS: &str = r#"record_id, batch_id, tenant_id, seq_no, student_id,
       source_enrollment_id, source_section_id, source_roll_number, decision,
       target_class_id, target_section_id, target_roll_number, auto_decided,
       decision_reason, retention_reason, transfer_destination,
       overridden_by, overridden_at, override_reason, destination_enrollment_id,
       attendance_pct, overall_marks_pct, subjects_passed, created_at, updated_at"#;

// ==========================================
// PromotionRecordRepository - 升级记录仓储
// ==========================================
pub struct PromotionRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PromotionRecordRepository {
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

    /// 批量插入记录
    ///
    /// # 参数
    /// - `conn`: 调用方的事务
    /// - `records`: 待插入记录(seq_no 由调用方分配)
    ///
    /// # 返回
    /// - `Ok(count)`: 插入条数
    pub fn insert_batch_in(conn: &Connection, records: &[PromotionRecord]) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare(
            r#"INSERT INTO promotion_record (
                record_id, batch_id, tenant_id, seq_no, student_id,
                source_enrollment_id, source_section_id, source_roll_number, decision,
                target_class_id, target_section_id, target_roll_number, auto_decided,
                decision_reason, retention_reason, transfer_destination,
                overridden_by, overridden_at, override_reason, destination_enrollment_id,
                attendance_pct, overall_marks_pct, subjects_passed, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )"#,
        )?;

        let mut count = 0;
        for r in records {
            stmt.execute(params![
                r.record_id,
                r.batch_id,
                r.tenant_id,
                r.seq_no,
                r.student_id,
                r.source_enrollment_id,
                r.source_section_id,
                r.source_roll_number,
                r.decision.as_str(),
                r.target_class_id,
                r.target_section_id,
                r.target_roll_number,
                r.auto_decided,
                r.decision_reason,
                r.retention_reason,
                r.transfer_destination,
                r.overridden_by,
                r.overridden_at.as_ref().map(fmt_ts),
                r.override_reason,
                r.destination_enrollment_id,
                r.performance.attendance_pct,
                r.performance.overall_marks_pct,
                r.performance.subjects_passed,
                fmt_ts(&r.created_at),
                fmt_ts(&r.updated_at),
            ])?;
            count += 1;
        }
        Ok(count)
    }

    /// 覆盖记录的可变字段
    ///
    /// 只改决策、目标、理由、覆写元数据和处理结果;来源与快照字段不可变
    pub fn update_in(conn: &Connection, record: &PromotionRecord) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"UPDATE promotion_record SET
                decision = ?1,
                target_class_id = ?2,
                target_section_id = ?3,
                target_roll_number = ?4,
                auto_decided = ?5,
                decision_reason = ?6,
                retention_reason = ?7,
                transfer_destination = ?8,
                overridden_by = ?9,
                overridden_at = ?10,
                override_reason = ?11,
                destination_enrollment_id = ?12,
                updated_at = ?13
            WHERE tenant_id = ?14 AND record_id = ?15"#,
            params![
                record.decision.as_str(),
                record.target_class_id,
                record.target_section_id,
                record.target_roll_number,
                record.auto_decided,
                record.decision_reason,
                record.retention_reason,
                record.transfer_destination,
                record.overridden_by,
                record.overridden_at.as_ref().map(fmt_ts),
                record.override_reason,
                record.destination_enrollment_id,
                fmt_ts(&record.updated_at),
                record.tenant_id,
                record.record_id,
            ],
        )?;

        if rows == 0 {
            return Err(RepositoryError::not_found("PromotionRecord", &record.record_id));
        }
        Ok(())
    }

    // ==========================================
    // 查询操作
    // ==========================================

    /// 批次下全部记录（seq_no 升序）
    pub fn list_by_batch(&self, tenant_id: &str, batch_id: &str) -> RepositoryResult<Vec<PromotionRecord>> {
        let conn = self.get_conn()?;
        Self::list_by_batch_in(&conn, tenant_id, batch_id)
    }

    pub fn list_by_batch_in(
        conn: &Connection,
        tenant_id: &str,
        batch_id: &str,
    ) -> RepositoryResult<Vec<PromotionRecord>> {
        let sql = format!(
            "SELECT {} FROM promotion_record WHERE tenant_id = ?1 AND batch_id = ?2 ORDER BY seq_no",
            RECORD_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![tenant_id, batch_id], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 按 record_id 查询（限定批次）
    pub fn find_in_batch(
        &self,
        tenant_id: &str,
        batch_id: &str,
        record_id: &str,
    ) -> RepositoryResult<Option<PromotionRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT {} FROM promotion_record WHERE tenant_id = ?1 AND batch_id = ?2 AND record_id = ?3",
            RECORD_COLUMNS
        );
        let record = conn
            .query_row(&sql, params![tenant_id, batch_id, record_id], map_row)
            .optional()?;
        Ok(record)
    }

    /// 批次记录数
    pub fn count_by_batch(&self, tenant_id: &str, batch_id: &str) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM promotion_record WHERE tenant_id = ?1 AND batch_id = ?2",
            params![tenant_id, batch_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<PromotionRecord> {
    let decision_str: String = row.get(8)?;
    let decision = Decision::parse(&decision_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown decision: {}", decision_str).into(),
        )
    })?;

    Ok(PromotionRecord {
        record_id: row.get(0)?,
        batch_id: row.get(1)?,
        tenant_id: row.get(2)?,
        seq_no: row.get(3)?,
        student_id: row.get(4)?,
        source_enrollment_id: row.get(5)?,
        source_section_id: row.get(6)?,
        source_roll_number: row.get(7)?,
        decision,
        target_class_id: row.get(9)?,
        target_section_id: row.get(10)?,
        target_roll_number: row.get(11)?,
        auto_decided: row.get(12)?,
        decision_reason: row.get(13)?,
        retention_reason: row.get(14)?,
        transfer_destination: row.get(15)?,
        overridden_by: row.get(16)?,
        overridden_at: get_opt_ts(row, 17)?,
        override_reason: row.get(18)?,
        destination_enrollment_id: row.get(19)?,
        performance: PerformanceSnapshot {
            attendance_pct: row.get(20)?,
            overall_marks_pct: row.get(21)?,
            subjects_passed: row.get(22)?,
        },
        created_at: get_ts(row, 23)?,
        updated_at: get_ts(row, 24)?,
    })
}
