// ==========================================
// 学年升级批处理 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 事务: `*_in` 关联函数接收调用方的 &Connection(可为 Transaction),
//       由引擎层决定原子边界
// ==========================================

pub mod action_log_repo;
pub mod batch_repo;
pub mod enrollment_repo;
pub mod error;
pub mod performance_repo;
pub mod record_repo;
pub mod rule_repo;
pub mod student_repo;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use batch_repo::{BatchListFilter, PromotionBatchRepository};
pub use enrollment_repo::{EnrollmentGateway, SqliteEnrollmentGateway};
pub use error::{RepositoryError, RepositoryResult};
pub use performance_repo::{PerformanceSource, SqlitePerformanceSource};
pub use record_repo::PromotionRecordRepository;
pub use rule_repo::PromotionRuleRepository;
pub use student_repo::StudentRepository;
