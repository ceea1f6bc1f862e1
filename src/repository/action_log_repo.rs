// ==========================================
// 学年升级批处理 - 操作日志数据仓储
// ==========================================
// 红线: 所有写入必须记录
// 日志写入失败不得影响业务操作,由调用方降级为 warn
// ==========================================

mod core;
mod queries;

#[cfg(test)]
mod tests;

pub use core::ActionLogRepository;
