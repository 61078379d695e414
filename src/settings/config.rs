/// 分析配置定义

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 分析配置（构造后不可变，显式传入各引擎）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 截图采样间隔（秒）
    pub sampling_interval_seconds: u32,

    /// 有效时长上限倍数：单次间隔最多计入 采样间隔 × 倍数 的活跃时长
    pub active_gap_multiplier: u32,

    /// 默认空闲阈值（秒）：超过此间隔视为新会话
    pub idle_threshold_seconds: u32,

    /// 按分类覆盖空闲阈值（秒）
    pub category_idle_overrides: HashMap<String, u32>,

    /// 相似度阈值 0-1
    pub similarity_threshold: f32,

    /// 相似分组的最小成员数
    pub min_group_size: usize,

    /// 相似度计算的时间窗口（小时）
    pub time_window_hours: f64,

    /// 语义搜索默认返回数量
    pub search_limit: usize,

    /// 部署使用的向量维度，未设置时取最小 id 记录的维度
    pub embedding_dimensions: Option<usize>,

    /// 展示分组的时间窗口（秒）
    pub display_window_seconds: u32,

    /// 展示分组要求的最少关键词重叠数
    pub min_keyword_overlap: usize,

    /// 上下文定位默认前后条数
    pub context_size: usize,

    /// 结果缓存有效期（秒）
    pub cache_ttl_seconds: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_interval_seconds: 5,
            active_gap_multiplier: 2,
            idle_threshold_seconds: 300, // 5分钟
            category_idle_overrides: HashMap::new(),
            similarity_threshold: 0.85,
            min_group_size: 2,
            time_window_hours: 24.0,
            search_limit: 10,
            embedding_dimensions: None,
            display_window_seconds: 300,
            min_keyword_overlap: 1,
            context_size: 3,
            cache_ttl_seconds: 600,
        }
    }
}

impl AnalysisConfig {
    /// 指定分类的空闲阈值（秒）
    pub fn idle_threshold_for(&self, category: &str) -> i64 {
        self.category_idle_overrides
            .get(category)
            .copied()
            .unwrap_or(self.idle_threshold_seconds) as i64
    }

    /// 单次间隔计入活跃时长的上限（秒）
    pub fn active_gap_cap_seconds(&self) -> i64 {
        self.sampling_interval_seconds as i64 * self.active_gap_multiplier as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();

        assert_eq!(config.sampling_interval_seconds, 5);
        assert_eq!(config.idle_threshold_seconds, 300);
        assert_eq!(config.active_gap_cap_seconds(), 10);
        assert!(config.category_idle_overrides.is_empty());
        assert!(config.embedding_dimensions.is_none());
    }

    #[test]
    fn test_idle_threshold_override() {
        let mut config = AnalysisConfig::default();
        config.category_idle_overrides.insert("communication".to_string(), 120);

        assert_eq!(config.idle_threshold_for("communication"), 120);
        assert_eq!(config.idle_threshold_for("work"), 300);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "idle_threshold_seconds: 600\nsimilarity_threshold: 0.9\n";
        let config: AnalysisConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.idle_threshold_seconds, 600);
        assert_eq!(config.similarity_threshold, 0.9);
        assert_eq!(config.sampling_interval_seconds, 5);
        assert_eq!(config.min_group_size, 2);
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: AnalysisConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }
}
