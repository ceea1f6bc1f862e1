// ==========================================
// 学年升级批处理 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod action_log;
pub mod enrollment;
pub mod promotion;
pub mod report;
pub mod types;

// 重导出核心类型
pub use action_log::{ActionLog, ActionType};
pub use enrollment::{Enrollment, NewEnrollment, Student};
pub use promotion::{
    PerformanceSnapshot, PromotionBatch, PromotionRecord, PromotionRule, RecordSummary,
};
pub use report::{PromotionReport, PromotionReportRow};
pub use types::{BatchStatus, Decision, EnrollmentStatus};
