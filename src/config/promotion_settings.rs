use serde::{Deserialize, Serialize};

/// 升级批处理参数（每次调用解析一次的值对象）
///
/// 来源：config_kv,租户作用域覆盖 global
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionSettings {
    /// 自动学号起始值
    pub roll_number_start: u32,

    /// 留级学生沿用原分班（记录未指定目标分班时）
    pub retain_keep_source_section: bool,

    /// 自动判定是否覆盖人工覆写的记录
    pub auto_decide_overwrite_manual: bool,

    /// 列表默认条数
    pub list_default_limit: i64,

    /// 列表最大条数
    pub list_max_limit: i64,
}

impl Default for PromotionSettings {
    fn default() -> Self {
        Self {
            roll_number_start: 1,
            retain_keep_source_section: true,
            auto_decide_overwrite_manual: false,
            list_default_limit: 200,
            list_max_limit: 2000,
        }
    }
}

impl PromotionSettings {
    /// 将调用方请求的条数收敛到 [1, list_max_limit]
    pub fn clamp_limit(&self, requested: Option<i64>) -> i64 {
        match requested {
            Some(n) if n > 0 => n.min(self.list_max_limit),
            _ => self.list_default_limit.min(self.list_max_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_limit() {
        let s = PromotionSettings::default();
        assert_eq!(s.clamp_limit(None), 200);
        assert_eq!(s.clamp_limit(Some(0)), 200);
        assert_eq!(s.clamp_limit(Some(-5)), 200);
        assert_eq!(s.clamp_limit(Some(50)), 50);
        assert_eq!(s.clamp_limit(Some(10_000)), 2000);
    }
}
