/// 分析配置加载与校验
///
/// 配置以 YAML 文件保存，加载后校验一次，之后只以不可变值传递

use std::fs;
use std::path::Path;

use crate::error::{AppError, AppResult};

pub mod config;
pub use config::AnalysisConfig;

/// 从 YAML 文件加载配置，文件不存在时使用默认配置
pub fn load_config(path: &Path) -> AppResult<AnalysisConfig> {
    if !path.exists() {
        log::info!("Config {} not found, using defaults", path.display());
        return Ok(AnalysisConfig::default());
    }

    let content = fs::read_to_string(path)?;
    let config: AnalysisConfig = serde_yaml::from_str(&content)?;
    validate_config(&config)?;

    Ok(config)
}

/// 将配置写入 YAML 文件
pub fn save_config(path: &Path, config: &AnalysisConfig) -> AppResult<()> {
    validate_config(config)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let yaml = serde_yaml::to_string(config)?;
    fs::write(path, yaml)?;

    Ok(())
}

/// 校验配置
pub fn validate_config(config: &AnalysisConfig) -> AppResult<()> {
    if config.sampling_interval_seconds == 0 {
        return Err(AppError::config(2, "采样间隔必须大于 0"));
    }

    if config.active_gap_multiplier == 0 {
        return Err(AppError::config(3, "有效时长倍数必须大于 0"));
    }

    if config.idle_threshold_seconds == 0 {
        return Err(AppError::config(4, "空闲阈值必须大于 0"));
    }

    if let Some((category, _)) = config
        .category_idle_overrides
        .iter()
        .find(|(_, seconds)| **seconds == 0)
    {
        return Err(AppError::config(5, format!("分类 {} 的空闲阈值必须大于 0", category)));
    }

    if !is_valid_threshold(config.similarity_threshold) {
        return Err(AppError::config(
            6,
            format!("相似度阈值必须在 0-1 之间，当前值: {}", config.similarity_threshold),
        ));
    }

    if config.min_group_size == 0 {
        return Err(AppError::config(7, "最小分组大小必须大于 0"));
    }

    if !is_valid_window(config.time_window_hours) {
        return Err(AppError::config(
            8,
            format!("时间窗口必须大于 0 小时，当前值: {}", config.time_window_hours),
        ));
    }

    if config.search_limit == 0 {
        return Err(AppError::config(9, "搜索数量上限必须大于 0"));
    }

    if config.embedding_dimensions == Some(0) {
        return Err(AppError::config(10, "向量维度必须大于 0"));
    }

    if config.display_window_seconds == 0 {
        return Err(AppError::config(11, "展示分组时间窗口必须大于 0"));
    }

    Ok(())
}

/// 阈值是否在 [0, 1] 内
pub(crate) fn is_valid_threshold(value: f32) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// 时间窗口是否为正数
pub(crate) fn is_valid_window(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0
}
