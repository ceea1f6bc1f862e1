// ==========================================
// 学年升级批处理 - 引擎层
// ==========================================
// 职责: 决策评估、批次状态机、记录管理、批次处理、报表
// 红线: 评估器不拼 SQL、无 I/O;所有判定必须输出 reason
// 事务: 引擎持有共享连接,开启事务后以 &Connection 传给仓储 `*_in` 函数
// ==========================================

pub mod batch_lifecycle;
pub mod batch_processor;
pub mod decision_evaluator;
pub mod error;
pub mod record_manager;
pub mod report_builder;
pub mod roll_number;

// 重导出核心引擎
pub use batch_lifecycle::{BatchLifecycleManager, BatchStateMachine, BatchTransition, NewBatch};
pub use batch_processor::{BatchProcessor, ProcessOptions, ProcessOutcome};
pub use decision_evaluator::{DecisionEvaluator, Evaluation};
pub use error::{PromotionError, PromotionResult};
pub use record_manager::{AutoDecideSummary, BulkUpdateOutcome, RecordListing, RecordManager, RecordUpdate};
pub use report_builder::ReportBuilder;
pub use roll_number::RollNumberAllocator;
