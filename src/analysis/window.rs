/// 时间窗口 - 限制相似度计算的候选范围

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::settings::is_valid_window;

/// 窗口锚点
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowAnchor {
    /// [now - hours, now]
    Now,
    /// [t - hours, t + hours]，t 为查询记录的时间
    Record,
}

/// 时间窗口
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub hours: f64,
    pub anchor: WindowAnchor,
}

impl TimeWindow {
    pub fn ending_now(hours: f64) -> Self {
        Self { hours, anchor: WindowAnchor::Now }
    }

    pub fn around_record(hours: f64) -> Self {
        Self { hours, anchor: WindowAnchor::Record }
    }

    /// 窗口大小必须为正数
    pub fn validate(&self) -> AppResult<()> {
        if is_valid_window(self.hours) {
            Ok(())
        } else {
            Err(AppError::invalid_window(self.hours))
        }
    }

    /// 计算窗口起止时间（闭区间）
    ///
    /// 锚点为 Record 但没有记录时间时退化为 Now
    pub fn bounds(&self, now: DateTime<Utc>, record_time: Option<DateTime<Utc>>) -> (DateTime<Utc>, DateTime<Utc>) {
        let span = Duration::milliseconds((self.hours * 3_600_000.0) as i64);

        match (self.anchor, record_time) {
            (WindowAnchor::Record, Some(center)) => (
                center.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC),
                center.checked_add_signed(span).unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            _ => (now.checked_sub_signed(span).unwrap_or(DateTime::<Utc>::MIN_UTC), now),
        }
    }
}
