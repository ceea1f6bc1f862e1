// ==========================================
// 学年升级批处理 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表入口,所有表按 tenant_id 隔离
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 时间戳存储格式
pub const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 日期存储格式
pub const DATE_FMT: &str = "%Y-%m-%d";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化全部表结构（幂等）
///
/// student / enrollment / student_performance 由兄弟模块维护,
/// 这里建表只为保证独立部署和测试时结构一致。
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
        );

        CREATE TABLE IF NOT EXISTS config_scope (
            scope_id TEXT PRIMARY KEY,
            scope_type TEXT NOT NULL,
            scope_key TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            UNIQUE(scope_type, scope_key)
        );

        INSERT OR IGNORE INTO config_scope (scope_id, scope_type, scope_key)
        VALUES ('global', 'GLOBAL', 'global');

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL REFERENCES config_scope(scope_id) ON DELETE CASCADE,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now', 'localtime')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS student (
            student_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            full_name TEXT NOT NULL,
            admission_no TEXT
        );

        CREATE TABLE IF NOT EXISTS enrollment (
            enrollment_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            student_id TEXT NOT NULL REFERENCES student(student_id),
            academic_year_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            section_id TEXT,
            roll_number TEXT,
            status TEXT NOT NULL CHECK(status IN ('active', 'completed', 'transferred', 'dropout')),
            completed_on TEXT,
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_enrollment_scope
            ON enrollment(tenant_id, academic_year_id, class_id, section_id, status);
        CREATE INDEX IF NOT EXISTS idx_enrollment_student
            ON enrollment(tenant_id, student_id, status);

        CREATE TABLE IF NOT EXISTS student_performance (
            tenant_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            academic_year_id TEXT NOT NULL,
            attendance_pct REAL,
            overall_marks_pct REAL,
            subjects_passed INTEGER,
            PRIMARY KEY (tenant_id, student_id, academic_year_id)
        );

        CREATE TABLE IF NOT EXISTS promotion_rule (
            rule_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            min_attendance_pct REAL,
            min_overall_marks_pct REAL,
            min_subjects_passed INTEGER,
            auto_promote INTEGER NOT NULL DEFAULT 0,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(tenant_id, class_id)
        );

        CREATE TABLE IF NOT EXISTS promotion_batch (
            batch_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            source_academic_year_id TEXT NOT NULL,
            source_class_id TEXT NOT NULL,
            source_section_id TEXT,
            dest_academic_year_id TEXT NOT NULL,
            dest_class_id TEXT,
            status TEXT NOT NULL CHECK(status IN ('draft', 'processing', 'completed', 'cancelled')),
            total_students INTEGER NOT NULL DEFAULT 0,
            promoted_count INTEGER NOT NULL DEFAULT 0,
            retained_count INTEGER NOT NULL DEFAULT 0,
            transferred_count INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            processed_at TEXT,
            processed_by TEXT,
            cancelled_at TEXT,
            cancelled_by TEXT,
            cancellation_reason TEXT,
            revision INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_promotion_batch_source
            ON promotion_batch(tenant_id, source_academic_year_id, source_class_id);
        CREATE INDEX IF NOT EXISTS idx_promotion_batch_status
            ON promotion_batch(tenant_id, status);

        CREATE TABLE IF NOT EXISTS promotion_record (
            record_id TEXT PRIMARY KEY,
            batch_id TEXT NOT NULL REFERENCES promotion_batch(batch_id) ON DELETE CASCADE,
            tenant_id TEXT NOT NULL,
            seq_no INTEGER NOT NULL,
            student_id TEXT NOT NULL,
            source_enrollment_id TEXT NOT NULL,
            source_section_id TEXT,
            source_roll_number TEXT,
            decision TEXT NOT NULL CHECK(decision IN ('pending', 'promote', 'retain', 'transfer')),
            target_class_id TEXT,
            target_section_id TEXT,
            target_roll_number TEXT,
            auto_decided INTEGER NOT NULL DEFAULT 0,
            decision_reason TEXT,
            retention_reason TEXT,
            transfer_destination TEXT,
            overridden_by TEXT,
            overridden_at TEXT,
            override_reason TEXT,
            destination_enrollment_id TEXT,
            attendance_pct REAL,
            overall_marks_pct REAL,
            subjects_passed INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(batch_id, student_id)
        );
        CREATE INDEX IF NOT EXISTS idx_promotion_record_batch
            ON promotion_record(batch_id, seq_no);

        CREATE TABLE IF NOT EXISTS action_log (
            action_id TEXT PRIMARY KEY,
            tenant_id TEXT NOT NULL,
            batch_id TEXT,
            action_type TEXT NOT NULL,
            action_ts TEXT NOT NULL,
            actor TEXT NOT NULL,
            payload_json TEXT,
            detail TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_action_log_batch
            ON action_log(tenant_id, batch_id, action_ts DESC);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}

// ==========================================
// 行映射辅助
// ==========================================

/// 格式化时间戳
pub fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(DATETIME_FMT).to_string()
}

/// 格式化日期
pub fn fmt_date(date: &NaiveDate) -> String {
    date.format(DATE_FMT).to_string()
}

/// 读取必填时间戳列
pub fn get_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DATETIME_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// 读取可空时间戳列
pub fn get_opt_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => NaiveDateTime::parse_from_str(&raw, DATETIME_FMT)
            .map(Some)
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
            }),
        None => Ok(None),
    }
}

/// 读取可空日期列
pub fn get_opt_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    Ok(row
        .get::<_, Option<String>>(idx)?
        .and_then(|s| NaiveDate::parse_from_str(&s, DATE_FMT).ok()))
}
