/// 分析结果导出模块
///
/// 文件名以分析日期命名：
/// - task_sessions_YYYY-MM-DD.csv: 按任务汇总
/// - sessions_YYYY-MM-DD.csv: 会话明细
/// - similarity_groups_YYYY-MM-DD.json: 相似分组成员列表

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analysis::{DailyReport, Session, SimilarityGroup, TaskSummary};

const TASK_SUMMARY_HEADER: &[&str] = &[
    "task_label",
    "category",
    "total_minutes",
    "active_minutes",
    "session_count",
    "record_count",
    "confidence",
    "confidence_level",
    "first_seen",
    "last_seen",
];

const SESSION_HEADER: &[&str] = &[
    "task_label",
    "category",
    "start",
    "end",
    "total_elapsed_seconds",
    "active_duration_seconds",
    "record_count",
    "confidence",
    "confidence_level",
];

/// 导出的文件
#[derive(Debug, Clone)]
pub struct ExportedFiles {
    pub task_summaries: PathBuf,
    pub sessions: PathBuf,
}

/// 导出单日报表
pub fn export_daily_report(report: &DailyReport, dir: &Path) -> Result<ExportedFiles> {
    fs::create_dir_all(dir)
        .with_context(|| format!("创建导出目录失败: {}", dir.display()))?;

    let task_summaries = dir.join(export_file_name("task_sessions", report.date, "csv"));
    let rows: Vec<Vec<String>> = report.task_summaries.iter().map(task_summary_row).collect();
    write_csv(&task_summaries, TASK_SUMMARY_HEADER, &rows)?;

    let sessions = dir.join(export_file_name("sessions", report.date, "csv"));
    let rows: Vec<Vec<String>> = report.sessions.iter().map(session_row).collect();
    write_csv(&sessions, SESSION_HEADER, &rows)?;

    log::info!(
        "Exported {} tasks and {} sessions to {}",
        report.task_summaries.len(),
        report.sessions.len(),
        dir.display()
    );

    Ok(ExportedFiles { task_summaries, sessions })
}

/// 导出相似分组（成员 id 列表的列表）
pub fn export_similarity_groups(groups: &[SimilarityGroup], date: NaiveDate, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .with_context(|| format!("创建导出目录失败: {}", dir.display()))?;

    let path = dir.join(export_file_name("similarity_groups", date, "json"));
    let member_lists: Vec<&Vec<i64>> = groups.iter().map(|g| &g.member_ids).collect();
    let json = serde_json::to_string_pretty(&member_lists)?;
    fs::write(&path, json)
        .with_context(|| format!("写入文件失败: {}", path.display()))?;

    Ok(path)
}

/// 导出文件名
pub fn export_file_name(prefix: &str, date: NaiveDate, extension: &str) -> String {
    format!("{}_{}.{}", prefix, date.format("%Y-%m-%d"), extension)
}

fn task_summary_row(summary: &TaskSummary) -> Vec<String> {
    vec![
        summary.task_label.clone(),
        summary.category.clone(),
        format!("{:.2}", summary.total_minutes),
        format!("{:.2}", summary.active_minutes),
        summary.session_count.to_string(),
        summary.record_count.to_string(),
        format!("{:.3}", summary.confidence),
        summary.confidence_level.as_str().to_string(),
        format_time(summary.first_seen),
        format_time(summary.last_seen),
    ]
}

fn session_row(session: &Session) -> Vec<String> {
    vec![
        session.task_label.clone(),
        session.category.clone(),
        format_time(session.start),
        format_time(session.end),
        session.total_elapsed_seconds.to_string(),
        session.active_duration_seconds.to_string(),
        session.record_count.to_string(),
        format!("{:.3}", session.confidence),
        session.confidence_level.as_str().to_string(),
    ]
}

fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_csv(path: &Path, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut content = String::new();
    content.push_str(&header.join(","));
    content.push('\n');

    for row in rows {
        let line = row.iter().map(|field| csv_field(field)).collect::<Vec<_>>().join(",");
        content.push_str(&line);
        content.push('\n');
    }

    fs::write(path, content)
        .with_context(|| format!("写入文件失败: {}", path.display()))
}

/// 含逗号、引号或换行的字段加引号，内部引号加倍
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
