// ==========================================
// 学年升级批处理 - API 层
// ==========================================
// 职责: 面向传输层的业务接口(参数校验、错误归类、操作日志)
// ==========================================

pub mod error;
pub mod promotion_api;
pub mod validator;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use promotion_api::{
    BatchListQuery, CreateBatchRequest, ProcessBatchRequest, PromotionApi, RecordUpdateRequest,
    RuleInput,
};
