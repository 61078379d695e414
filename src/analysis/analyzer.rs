/// 活动分析器
///
/// 组合记录存储与各分析组件：
/// 1. 日报 - 会话重建 + 任务汇总 + 展示分组
/// 2. 语义搜索 - 以记录为查询的相似记录检索
/// 3. 相似分组 - 时间窗口内的相似记录分组（结果可缓存）
/// 4. 上下文定位 - 记录前后相邻的记录

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::db::records::RecordStore;
use crate::db::schema::ActivityRecord;
use crate::db::Database;
use crate::error::{AppError, AppResult};
use crate::settings::{is_valid_threshold, validate_config, AnalysisConfig};

use super::cache::{content_hash, ResultCache};
use super::context_locator::{self, TaskContext};
use super::display_grouper::{DisplayGroup, DisplayGrouper};
use super::session_reconstructor::{Session, SessionReconstructor};
use super::similarity::{SearchResult, SimilarityEngine, SimilarityGroup};
use super::task_summary::{summarize_tasks, TaskSummary};
use super::window::{TimeWindow, WindowAnchor};

/// 单日分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub date: NaiveDate,
    pub record_count: usize,
    pub sessions: Vec<Session>,
    pub task_summaries: Vec<TaskSummary>,
    pub display_groups: Vec<DisplayGroup>,
}

/// 活动分析器
pub struct ActivityAnalyzer {
    store: RecordStore,
    config: AnalysisConfig,
    reconstructor: SessionReconstructor,
    similarity: SimilarityEngine,
    display_grouper: DisplayGrouper,
}

impl ActivityAnalyzer {
    /// 创建分析器，配置在此校验一次
    pub fn new(db: Arc<Database>, config: AnalysisConfig) -> AppResult<Self> {
        validate_config(&config)?;

        Ok(Self {
            store: RecordStore::new(db, config.embedding_dimensions),
            reconstructor: SessionReconstructor::new(config.clone()),
            similarity: SimilarityEngine::new(&config),
            display_grouper: DisplayGrouper::new(config.clone()),
            config,
        })
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// 分析指定 UTC 日期
    pub fn analyze_date(&self, date: NaiveDate) -> AppResult<DailyReport> {
        let records = self.store.load_records_for_date(date)?;
        Ok(self.build_report(date, &records))
    }

    /// 基于已加载的记录生成日报
    pub fn build_report(&self, date: NaiveDate, records: &[ActivityRecord]) -> DailyReport {
        let sessions = self.reconstructor.reconstruct(records);
        let task_summaries = summarize_tasks(&sessions);
        let display_groups = self.display_grouper.group_records(records);

        log::info!(
            "Analyzed {}: {} records, {} sessions, {} tasks, {} display groups",
            date,
            records.len(),
            sessions.len(),
            task_summaries.len(),
            display_groups.len()
        );

        DailyReport {
            date,
            record_count: records.len(),
            sessions,
            task_summaries,
            display_groups,
        }
    }

    /// 语义搜索（窗口以当前时间为准）
    pub fn semantic_search(
        &self,
        query_id: i64,
        limit: usize,
        similarity_threshold: f32,
        time_window: Option<TimeWindow>,
    ) -> AppResult<Vec<SearchResult>> {
        self.semantic_search_at(query_id, limit, similarity_threshold, time_window, Utc::now())
    }

    /// 语义搜索（指定当前时间）
    pub fn semantic_search_at(
        &self,
        query_id: i64,
        limit: usize,
        similarity_threshold: f32,
        time_window: Option<TimeWindow>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<SearchResult>> {
        validate_search_arguments(limit, similarity_threshold, time_window.as_ref())?;

        let Some(query) = self.store.load_record(query_id)? else {
            log::warn!("Query record {} not found, nothing to search", query_id);
            return Ok(Vec::new());
        };

        let candidates = match time_window {
            Some(window) => {
                let (start, end) = window.bounds(now, Some(query.timestamp));
                self.store.load_records(start, end)?
            }
            None => self.store.load_all()?,
        };

        self.similarity
            .semantic_search(&candidates, &query, limit, similarity_threshold)
    }

    /// 相似任务分组（窗口以当前时间为准）
    pub fn find_similar_task_groups(
        &self,
        min_group_size: usize,
        similarity_threshold: f32,
        time_window: Option<TimeWindow>,
        cache: &ResultCache<Vec<SimilarityGroup>>,
        ttl: Duration,
    ) -> AppResult<Vec<SimilarityGroup>> {
        self.find_similar_task_groups_at(min_group_size, similarity_threshold, time_window, cache, ttl, Utc::now())
    }

    /// 相似任务分组（指定当前时间）
    ///
    /// 分组没有查询记录，Record 锚点按 Now 处理
    pub fn find_similar_task_groups_at(
        &self,
        min_group_size: usize,
        similarity_threshold: f32,
        time_window: Option<TimeWindow>,
        cache: &ResultCache<Vec<SimilarityGroup>>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<SimilarityGroup>> {
        if !is_valid_threshold(similarity_threshold) {
            return Err(AppError::invalid_threshold(similarity_threshold));
        }
        if min_group_size == 0 {
            return Err(AppError::invalid_group_size(min_group_size));
        }

        let records = match time_window {
            Some(window) => {
                window.validate()?;
                if window.anchor == WindowAnchor::Record {
                    log::debug!("Record-anchored window has no query record for grouping, using now");
                }
                let (start, end) = window.bounds(now, None);
                self.store.load_records(start, end)?
            }
            None => self.store.load_all()?,
        };

        let key = content_hash(&records, &format!("groups:{}:{}", min_group_size, similarity_threshold));
        cache.get_or_try_insert(key, ttl, || {
            self.similarity
                .find_similar_task_groups(&records, min_group_size, similarity_threshold)
        })
    }

    /// 上下文定位
    ///
    /// 记录不存在时返回 Ok(None)
    pub fn get_task_context(&self, record_id: i64, context_size: usize) -> AppResult<Option<TaskContext>> {
        let records = self.store.load_all()?;
        let context = context_locator::get_task_context(&records, record_id, context_size);

        if context.is_none() {
            log::debug!("Record {} not found in timeline", record_id);
        }

        Ok(context)
    }
}

fn validate_search_arguments(limit: usize, threshold: f32, window: Option<&TimeWindow>) -> AppResult<()> {
    if !is_valid_threshold(threshold) {
        return Err(AppError::invalid_threshold(threshold));
    }
    if limit == 0 {
        return Err(AppError::invalid_limit(limit));
    }
    if let Some(window) = window {
        window.validate()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    fn analyzer_with(records: &[ActivityRecord]) -> ActivityAnalyzer {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let analyzer = ActivityAnalyzer::new(db, AnalysisConfig::default()).unwrap();
        analyzer.store().insert_records(records).unwrap();
        analyzer
    }

    fn record(id: i64, seconds: i64, task: &str, embedding: Vec<f32>) -> ActivityRecord {
        ActivityRecord::new(id, base() + ChronoDuration::seconds(seconds), task, "work").with_embedding(embedding)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let config = AnalysisConfig {
            similarity_threshold: 2.0,
            ..Default::default()
        };
        assert!(ActivityAnalyzer::new(db, config).is_err());
    }

    #[test]
    fn test_analyze_date() {
        let analyzer = analyzer_with(&[
            record(1, 0, "rust coding", vec![1.0, 0.0]),
            record(2, 5, "rust coding", vec![1.0, 0.0]),
            record(3, 10, "rust coding", vec![1.0, 0.0]),
            record(4, 3600, "email", vec![0.0, 1.0]),
        ]);

        let report = analyzer.analyze_date(base().date_naive()).unwrap();
        assert_eq!(report.record_count, 4);
        assert_eq!(report.sessions.len(), 2);
        assert_eq!(report.task_summaries.len(), 2);
        assert_eq!(report.display_groups.len(), 2);

        let empty = analyzer
            .analyze_date(NaiveDate::from_ymd_opt(2024, 3, 5).unwrap())
            .unwrap();
        assert!(empty.sessions.is_empty());
    }

    #[test]
    fn test_semantic_search_with_record_window() {
        let analyzer = analyzer_with(&[
            record(1, 0, "a", vec![1.0, 0.0]),
            record(2, 60, "a", vec![1.0, 0.1]),
            record(3, 7200 * 3, "a", vec![1.0, 0.0]),
        ]);

        let results = analyzer
            .semantic_search(1, 10, 0.5, Some(TimeWindow::around_record(1.0)))
            .unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.record_id).collect();
        assert_eq!(ids, vec![2]);

        let unbounded = analyzer.semantic_search(1, 10, 0.5, None).unwrap();
        assert_eq!(unbounded.len(), 2);
        assert_eq!(unbounded[0].record_id, 3);
    }

    #[test]
    fn test_semantic_search_unknown_query() {
        let analyzer = analyzer_with(&[record(1, 0, "a", vec![1.0, 0.0])]);
        assert!(analyzer.semantic_search(99, 10, 0.5, None).unwrap().is_empty());
    }

    #[test]
    fn test_semantic_search_validates_eagerly() {
        let analyzer = analyzer_with(&[]);
        let err = analyzer
            .semantic_search(1, 10, 0.5, Some(TimeWindow::ending_now(0.0)))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(2, _)));
        assert!(analyzer.semantic_search(1, 10, -1.0, None).unwrap_err().is_validation());
    }

    #[test]
    fn test_find_similar_task_groups_with_cache() {
        let analyzer = analyzer_with(&[
            record(1, 0, "a", vec![1.0, 0.0]),
            record(2, 10, "b", vec![1.0, 0.0]),
            record(3, 20, "c", vec![0.0, 1.0]),
        ]);
        let cache = ResultCache::new();
        let ttl = Duration::from_secs(60);
        let now = base() + ChronoDuration::hours(1);

        let groups = analyzer
            .find_similar_task_groups_at(2, 0.9, Some(TimeWindow::ending_now(2.0)), &cache, ttl, now)
            .unwrap();
        assert_eq!(groups, vec![SimilarityGroup { member_ids: vec![1, 2] }]);
        assert_eq!(cache.len(), 1);

        let again = analyzer
            .find_similar_task_groups_at(2, 0.9, Some(TimeWindow::ending_now(2.0)), &cache, ttl, now)
            .unwrap();
        assert_eq!(groups, again);
        assert_eq!(cache.len(), 1);

        let outside = analyzer
            .find_similar_task_groups_at(2, 0.9, Some(TimeWindow::ending_now(0.1)), &cache, ttl, now)
            .unwrap();
        assert!(outside.is_empty());
    }

    #[test]
    fn test_get_task_context() {
        let records: Vec<ActivityRecord> = (1..=10)
            .map(|id| record(id, id * 5, "a", vec![1.0, 0.0]))
            .collect();
        let analyzer = analyzer_with(&records);

        let context = analyzer.get_task_context(5, 2).unwrap().unwrap();
        assert_eq!(context.before, vec![3, 4]);
        assert_eq!(context.after, vec![6, 7]);

        assert!(analyzer.get_task_context(42, 2).unwrap().is_none());
    }
}
