// ==========================================
// 学年升级批处理 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// 所有仓储与引擎共用一个连接;跨进程并发由 SQLite 写锁串行化
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::PromotionApi;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{BatchLifecycleManager, BatchProcessor, RecordManager, ReportBuilder};
use crate::repository::{
    action_log_repo::ActionLogRepository,
    batch_repo::PromotionBatchRepository,
    enrollment_repo::{EnrollmentGateway, SqliteEnrollmentGateway},
    performance_repo::{PerformanceSource, SqlitePerformanceSource},
    record_repo::PromotionRecordRepository,
    rule_repo::PromotionRuleRepository,
    student_repo::StudentRepository,
};

/// 应用状态
///
/// 包含 API 实例和共享资源
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 升级批处理API
    pub promotion_api: Arc<PromotionApi>,

    /// 配置管理(租户级覆盖)
    pub config_manager: Arc<ConfigManager>,

    /// 共享连接(测试与运维脚本直接读写用)
    pub conn: Arc<Mutex<Connection>>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    ///
    /// # 返回
    /// - Ok(AppState): 应用状态实例
    /// - Err(String): 初始化错误
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开连接并幂等建表
    /// 2. 初始化所有Repository与外部数据源
    /// 3. 初始化引擎并创建API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("无法打开数据库: {}", e))?;
        init_schema(&conn).map_err(|e| format!("数据库建表失败: {}", e))?;

        Ok(Self::from_connection(db_path, Arc::new(Mutex::new(conn))))
    }

    /// 基于已打开的连接组装(调用方负责建表)
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Self {
        // ==========================================
        // Repository层
        // ==========================================
        let rule_repo = Arc::new(PromotionRuleRepository::new(conn.clone()));
        let batch_repo = Arc::new(PromotionBatchRepository::new(conn.clone()));
        let record_repo = Arc::new(PromotionRecordRepository::new(conn.clone()));
        let student_repo = Arc::new(StudentRepository::new(conn.clone()));
        let action_log_repo = Arc::new(ActionLogRepository::new(conn.clone()));
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));

        // 学籍与成绩由兄弟模块维护,这里只按约定的表结构读写
        let enrollments: Arc<dyn EnrollmentGateway> = Arc::new(SqliteEnrollmentGateway::new());
        let performance: Arc<dyn PerformanceSource> = Arc::new(SqlitePerformanceSource::new());

        // ==========================================
        // Engine层
        // ==========================================
        let lifecycle = Arc::new(BatchLifecycleManager::new(
            conn.clone(),
            batch_repo.clone(),
            enrollments.clone(),
            performance,
        ));
        let record_manager = Arc::new(RecordManager::new(conn.clone(), record_repo.clone()));
        let processor = Arc::new(BatchProcessor::new(conn.clone(), enrollments));
        let report_builder = Arc::new(ReportBuilder::new(
            batch_repo.clone(),
            record_repo,
            student_repo,
        ));

        // ==========================================
        // API层
        // ==========================================
        let promotion_api = Arc::new(PromotionApi::new(
            rule_repo,
            batch_repo,
            action_log_repo,
            config_manager.clone(),
            lifecycle,
            record_manager,
            processor,
            report_builder,
        ));

        tracing::info!("AppState初始化完成");

        Self {
            db_path,
            promotion_api,
            config_manager,
            conn,
        }
    }
}

/// 获取默认数据库路径
///
/// 优先级: 环境变量 SCHOOL_PROMOTION_DB > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("SCHOOL_PROMOTION_DB") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./school_promotion.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("school-promotion");
        // 目录创建失败时退回当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("school_promotion.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_builds_on_fresh_file() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = tmp.path().to_string_lossy().to_string();

        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.db_path, path);
        assert!(state.promotion_api.list_rules("t1").unwrap().is_empty());
    }
}
