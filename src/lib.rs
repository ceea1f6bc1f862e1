// ==========================================
// 学年升级批处理 - 核心库
// ==========================================
// 定位: 多租户学校管理后台的学年末升级/留级批处理
// 技术栈: Rust + SQLite
// 流程: 建批次(快照) -> 覆写/自动判定 -> 处理(单事务) -> 报表
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 租户配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - 组装
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{BatchStatus, Decision, EnrollmentStatus};

// 领域实体
pub use domain::{
    ActionLog, ActionType, PerformanceSnapshot, PromotionBatch, PromotionRecord, PromotionReport,
    PromotionRule,
};

// 引擎
pub use engine::{
    BatchLifecycleManager, BatchProcessor, DecisionEvaluator, PromotionError, RecordManager,
    ReportBuilder, RollNumberAllocator,
};

// API
pub use api::{ApiError, ApiResult, PromotionApi};

// ==========================================
// 系统常量
// ==========================================

/// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 系统名称
pub const APP_NAME: &str = "学年升级批处理";
