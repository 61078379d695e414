// 模块声明
mod error;
pub mod db;
pub mod settings;
pub mod analysis;
pub mod export;

// 导出错误类型供其他模块使用
pub use error::{AppError, AppResult};

pub use analysis::{
    ActivityAnalyzer, DailyReport, ResultCache, SearchResult, Session, SimilarityGroup, TaskContext,
    TaskSummary, TimeWindow,
};
pub use db::records::RecordStore;
pub use db::schema::{ActivityRecord, WindowData};
pub use db::Database;
pub use settings::AnalysisConfig;

use chrono::Utc;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// 数据目录
fn data_dir() -> AppResult<PathBuf> {
    let dir = dirs::data_local_dir()
        .ok_or_else(|| AppError::io(4, "无法确定本地数据目录"))?
        .join("work-recall");
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// 分析当天记录并导出报表
pub fn run() -> AppResult<()> {
    // 初始化日志
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let data_dir = data_dir()?;
    let config = settings::load_config(&data_dir.join("config.yaml"))?;
    info!("data_dir={}, idle_threshold={}s", data_dir.display(), config.idle_threshold_seconds);

    // 初始化数据库
    let db = Database::new(data_dir.join("work-recall.db"))?;
    db.initialize()?;

    let ttl = Duration::from_secs(config.cache_ttl_seconds);
    let window = TimeWindow::ending_now(config.time_window_hours);
    let (min_group_size, similarity_threshold) = (config.min_group_size, config.similarity_threshold);
    let analyzer = ActivityAnalyzer::new(Arc::new(db), config)?;

    let today = Utc::now().date_naive();
    let report = analyzer.analyze_date(today)?;

    let cache = ResultCache::new();
    let groups = analyzer.find_similar_task_groups(min_group_size, similarity_threshold, Some(window), &cache, ttl)?;
    info!("Found {} similarity groups in the last {}h", groups.len(), window.hours);

    let export_dir = data_dir.join("exports");
    let files = export::export_daily_report(&report, &export_dir)?;
    let groups_file = export::export_similarity_groups(&groups, today, &export_dir)?;
    info!(
        "Exported {}, {}, {}",
        files.task_summaries.display(),
        files.sessions.display(),
        groups_file.display()
    );

    Ok(())
}
