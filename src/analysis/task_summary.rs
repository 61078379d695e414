/// 任务汇总 - 按任务聚合会话，供报表和导出使用

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::session_reconstructor::{ConfidenceLevel, Session};

/// 任务汇总
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSummary {
    pub task_label: String,
    /// 覆盖记录最多的分类
    pub category: String,
    pub total_minutes: f64,
    pub active_minutes: f64,
    pub session_count: usize,
    pub record_count: usize,
    /// 按记录数加权的会话置信度
    pub confidence: f64,
    pub confidence_level: ConfidenceLevel,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

/// 按任务聚合会话，结果按首次出现时间排序
pub fn summarize_tasks(sessions: &[Session]) -> Vec<TaskSummary> {
    let mut by_task: BTreeMap<&str, Vec<&Session>> = BTreeMap::new();
    for session in sessions {
        by_task.entry(session.task_label.as_str()).or_default().push(session);
    }

    let mut summaries: Vec<TaskSummary> = by_task
        .into_iter()
        .filter_map(|(task_label, task_sessions)| summarize_task(task_label, &task_sessions))
        .collect();

    summaries.sort_by(|a, b| {
        a.first_seen
            .cmp(&b.first_seen)
            .then_with(|| a.task_label.cmp(&b.task_label))
    });
    summaries
}

fn summarize_task(task_label: &str, sessions: &[&Session]) -> Option<TaskSummary> {
    let first_seen = sessions.iter().map(|s| s.start).min()?;
    let last_seen = sessions.iter().map(|s| s.end).max()?;

    let record_count: usize = sessions.iter().map(|s| s.record_count).sum();
    let total_seconds: i64 = sessions.iter().map(|s| s.total_elapsed_seconds).sum();
    let active_seconds: i64 = sessions.iter().map(|s| s.active_duration_seconds).sum();

    let confidence = if record_count == 0 {
        0.0
    } else {
        sessions
            .iter()
            .map(|s| s.confidence * s.record_count as f64)
            .sum::<f64>()
            / record_count as f64
    };

    Some(TaskSummary {
        task_label: task_label.to_string(),
        category: dominant_category(sessions),
        total_minutes: total_seconds as f64 / 60.0,
        active_minutes: active_seconds as f64 / 60.0,
        session_count: sessions.len(),
        record_count,
        confidence,
        confidence_level: ConfidenceLevel::from_score(confidence),
        first_seen,
        last_seen,
    })
}

/// 记录数最多的分类，数量相同时取字典序最小的
fn dominant_category(sessions: &[&Session]) -> String {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for session in sessions {
        *counts.entry(session.category.as_str()).or_insert(0) += session.record_count;
    }

    counts
        .into_iter()
        .max_by(|(cat_a, count_a), (cat_b, count_b)| count_a.cmp(count_b).then_with(|| cat_b.cmp(cat_a)))
        .map(|(category, _)| category.to_string())
        .unwrap_or_else(|| "other".to_string())
}
