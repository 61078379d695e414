/// 会话重建器 - 将稀疏的截图记录还原为连续的工作会话
///
/// 核心算法：
/// 1. 按任务标签拆分记录，每个任务内按时间排序（不信任输入顺序）
/// 2. 逐条遍历，间隔超过分类空闲阈值或分类变化时结束当前会话
/// 3. 活跃时长每步最多计入 采样间隔 × 倍数，避免长间隔虚增
/// 4. 按记录密度和间隔结构计算置信度

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::schema::ActivityRecord;
use crate::settings::AnalysisConfig;

/// 密度在置信度中的权重
const DENSITY_WEIGHT: f64 = 0.7;
/// 活跃覆盖率在置信度中的权重
const COVERAGE_WEIGHT: f64 = 0.3;
/// 每个超过上限的间隔扣除的置信度
const GAP_PENALTY_PER_GAP: f64 = 0.05;
/// 间隔扣分上限
const MAX_GAP_PENALTY: f64 = 0.3;
/// 单条记录会话的置信度
const SINGLE_RECORD_CONFIDENCE: f64 = 0.0;

/// 置信度等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,   // >= 0.8
    Medium, // 0.5 - 0.8
    Low,    // < 0.5
}

impl ConfidenceLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::High
        } else if score >= 0.5 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// 工作会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub task_label: String,
    pub category: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_elapsed_seconds: i64,
    pub active_duration_seconds: i64,
    pub record_count: usize,
    pub record_ids: Vec<i64>,
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
}

impl Session {
    pub fn total_minutes(&self) -> f64 {
        self.total_elapsed_seconds as f64 / 60.0
    }

    pub fn active_minutes(&self) -> f64 {
        self.active_duration_seconds as f64 / 60.0
    }
}

/// 构建中的会话
struct OpenSession<'a> {
    task_label: &'a str,
    category: &'a str,
    start: DateTime<Utc>,
    last: DateTime<Utc>,
    active_seconds: i64,
    large_gaps: usize,
    record_ids: Vec<i64>,
}

impl<'a> OpenSession<'a> {
    fn open(record: &'a ActivityRecord) -> Self {
        Self {
            task_label: &record.task_label,
            category: &record.category,
            start: record.timestamp,
            last: record.timestamp,
            active_seconds: 0,
            large_gaps: 0,
            record_ids: vec![record.id],
        }
    }

    fn extend(&mut self, record: &ActivityRecord, gap_seconds: i64, cap_seconds: i64) {
        if gap_seconds > cap_seconds {
            self.large_gaps += 1;
        }
        self.active_seconds += gap_seconds.min(cap_seconds);
        self.last = record.timestamp;
        self.record_ids.push(record.id);
    }

    fn close(self, sampling_interval_seconds: i64) -> Session {
        let total_elapsed_seconds = (self.last - self.start).num_seconds();
        let record_count = self.record_ids.len();
        let confidence = session_confidence(
            record_count,
            total_elapsed_seconds,
            self.active_seconds,
            self.large_gaps,
            sampling_interval_seconds,
        );

        Session {
            task_label: self.task_label.to_string(),
            category: self.category.to_string(),
            start: self.start,
            end: self.last,
            total_elapsed_seconds,
            active_duration_seconds: self.active_seconds,
            record_count,
            record_ids: self.record_ids,
            confidence,
            confidence_level: ConfidenceLevel::from_score(confidence),
        }
    }
}

/// 计算会话置信度
///
/// 密度 = 记录数 / 按采样间隔应有的记录数（上限 1），
/// 覆盖率 = 活跃时长 / 总时长，每个超过上限的间隔额外扣分。
/// 间隔的大小体现在覆盖率中（超出上限的部分不计入活跃时长），扣分只看间隔个数
pub fn session_confidence(
    record_count: usize,
    total_elapsed_seconds: i64,
    active_seconds: i64,
    large_gaps: usize,
    sampling_interval_seconds: i64,
) -> f64 {
    if record_count <= 1 || total_elapsed_seconds <= 0 || sampling_interval_seconds <= 0 {
        return SINGLE_RECORD_CONFIDENCE;
    }

    let expected = (total_elapsed_seconds / sampling_interval_seconds + 1) as f64;
    let density = (record_count as f64 / expected).min(1.0);
    let coverage = (active_seconds as f64 / total_elapsed_seconds as f64).clamp(0.0, 1.0);
    let gap_penalty = (GAP_PENALTY_PER_GAP * large_gaps as f64).min(MAX_GAP_PENALTY);

    (DENSITY_WEIGHT * density + COVERAGE_WEIGHT * coverage - gap_penalty).clamp(0.0, 1.0)
}

/// 会话重建器
#[derive(Debug, Clone)]
pub struct SessionReconstructor {
    config: AnalysisConfig,
}

impl SessionReconstructor {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// 重建所有任务的会话，结果按开始时间排序
    pub fn reconstruct(&self, records: &[ActivityRecord]) -> Vec<Session> {
        let mut by_task: BTreeMap<&str, Vec<&ActivityRecord>> = BTreeMap::new();
        for record in records {
            by_task.entry(record.task_label.as_str()).or_default().push(record);
        }

        let mut sessions: Vec<Session> = by_task
            .into_values()
            .flat_map(|task_records| self.reconstruct_task(task_records))
            .collect();

        sessions.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.task_label.cmp(&b.task_label)));
        sessions
    }

    /// 重建单个任务的会话
    fn reconstruct_task(&self, mut records: Vec<&ActivityRecord>) -> Vec<Session> {
        let is_sorted = records
            .windows(2)
            .all(|pair| (pair[0].timestamp, pair[0].id) <= (pair[1].timestamp, pair[1].id));
        if !is_sorted {
            log::debug!(
                "Records for task {:?} arrived out of order, sorting",
                records.first().map(|r| r.task_label.as_str()).unwrap_or_default()
            );
            records.sort_by_key(|record| (record.timestamp, record.id));
        }

        let cap_seconds = self.config.active_gap_cap_seconds();
        let interval_seconds = self.config.sampling_interval_seconds as i64;

        let mut sessions = Vec::new();
        let mut current: Option<OpenSession> = None;

        for record in records {
            current = Some(match current.take() {
                None => OpenSession::open(record),
                Some(mut open) => {
                    let gap_seconds = (record.timestamp - open.last).num_seconds();
                    let idle_threshold = self.config.idle_threshold_for(open.category);

                    // 同一时刻的类别变化不切分会话，相邻会话不共享任何时刻
                    let category_changed = gap_seconds > 0 && record.category != open.category;
                    if gap_seconds > idle_threshold || category_changed {
                        sessions.push(open.close(interval_seconds));
                        OpenSession::open(record)
                    } else {
                        open.extend(record, gap_seconds, cap_seconds);
                        open
                    }
                }
            });
        }

        if let Some(open) = current {
            sessions.push(open.close(interval_seconds));
        }

        sessions
    }
}
