/// 上下文定位 - 返回某条记录在时间线上前后相邻的记录

use serde::{Deserialize, Serialize};

use crate::db::schema::ActivityRecord;

/// 记录上下文
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskContext {
    pub record_id: i64,
    /// 之前的记录（时间升序）
    pub before: Vec<i64>,
    /// 之后的记录（时间升序）
    pub after: Vec<i64>,
}

impl TaskContext {
    pub fn has_neighbors(&self) -> bool {
        !self.before.is_empty() || !self.after.is_empty()
    }
}

/// 查找记录上下文
///
/// 记录不存在时返回 None；存在但没有相邻记录时返回空的 before/after
pub fn get_task_context(records: &[ActivityRecord], record_id: i64, context_size: usize) -> Option<TaskContext> {
    let mut timeline: Vec<&ActivityRecord> = records.iter().collect();
    timeline.sort_by_key(|record| (record.timestamp, record.id));

    let position = timeline.iter().position(|record| record.id == record_id)?;

    let before_start = position.saturating_sub(context_size);
    let after_end = (position + 1 + context_size).min(timeline.len());

    Some(TaskContext {
        record_id,
        before: timeline[before_start..position].iter().map(|r| r.id).collect(),
        after: timeline[position + 1..after_end].iter().map(|r| r.id).collect(),
    })
}
