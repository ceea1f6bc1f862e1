// ==========================================
// 学年升级批处理 - 配置层
// ==========================================
// 职责: 系统配置管理,支持 global → tenant 覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod promotion_settings;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, ConfigScope};
pub use promotion_settings::PromotionSettings;
