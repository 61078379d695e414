/// 数据结构定义
///
/// 表说明：
/// - activity_records: 截图分析后的活动记录（任务标签、分类、向量、OCR 文本、窗口信息）

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 活动记录
///
/// 由采集/分析流程写入后不再修改，分析组件只借用不复制修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub task_label: String,
    pub category: String,
    pub embedding: Option<Vec<f32>>, // 固定维度向量
    pub raw_text: Option<String>,    // OCR 文本
    pub window: Option<WindowData>,  // 已解码的窗口信息
}

impl ActivityRecord {
    /// 创建不带向量和文本的记录
    pub fn new(
        id: i64,
        timestamp: DateTime<Utc>,
        task_label: impl Into<String>,
        category: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            task_label: task_label.into(),
            category: category.into(),
            embedding: None,
            raw_text: None,
            window: None,
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn with_raw_text(mut self, text: impl Into<String>) -> Self {
        self.raw_text = Some(text.into());
        self
    }

    pub fn with_window(mut self, window: WindowData) -> Self {
        self.window = Some(window);
        self
    }
}

/// 窗口信息
///
/// 采集端可能写入 JSON 对象，也可能只写入窗口标题字符串，
/// 在读取边界解码一次，下游只使用解码后的形式
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WindowData {
    Structured {
        app_name: Option<String>,
        title: Option<String>,
        url: Option<String>,
    },
    PlainTitle { title: String },
}

/// 采集端写入的 JSON 窗口信息
#[derive(Debug, Deserialize)]
struct RawWindowJson {
    #[serde(alias = "app", alias = "application")]
    app_name: Option<String>,
    #[serde(alias = "window_title")]
    title: Option<String>,
    url: Option<String>,
}

impl WindowData {
    /// 解码原始窗口字段：JSON 对象 → Structured，其他 → PlainTitle
    pub fn decode(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if trimmed.starts_with('{') {
            if let Ok(parsed) = serde_json::from_str::<RawWindowJson>(trimmed) {
                return Some(Self::Structured {
                    app_name: parsed.app_name,
                    title: parsed.title,
                    url: parsed.url,
                });
            }
            log::debug!("Window data looks like JSON but failed to parse, keeping as title");
        }

        Some(Self::PlainTitle {
            title: trimmed.to_string(),
        })
    }

    /// 编码为存储格式
    pub fn encode(&self) -> String {
        match self {
            Self::Structured { app_name, title, url } => serde_json::json!({
                "app_name": app_name,
                "title": title,
                "url": url,
            })
            .to_string(),
            Self::PlainTitle { title } => title.clone(),
        }
    }

    /// 窗口标题
    pub fn title(&self) -> Option<&str> {
        match self {
            Self::Structured { title, .. } => title.as_deref(),
            Self::PlainTitle { title } => Some(title.as_str()),
        }
    }

    /// 应用名称
    pub fn app_name(&self) -> Option<&str> {
        match self {
            Self::Structured { app_name, .. } => app_name.as_deref(),
            Self::PlainTitle { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_window() {
        let raw = r#"{"app": "VSCode", "title": "main.rs - work-recall", "url": null}"#;
        let window = WindowData::decode(raw).unwrap();

        assert_eq!(window.app_name(), Some("VSCode"));
        assert_eq!(window.title(), Some("main.rs - work-recall"));
    }

    #[test]
    fn test_decode_plain_title() {
        let window = WindowData::decode("Inbox - Mail").unwrap();
        assert_eq!(
            window,
            WindowData::PlainTitle { title: "Inbox - Mail".to_string() }
        );
        assert!(window.app_name().is_none());
    }

    #[test]
    fn test_decode_broken_json_falls_back_to_title() {
        let window = WindowData::decode("{not json").unwrap();
        assert_eq!(window.title(), Some("{not json"));
    }

    #[test]
    fn test_decode_empty() {
        assert!(WindowData::decode("   ").is_none());
    }

    #[test]
    fn test_encode_decode_structured() {
        let window = WindowData::Structured {
            app_name: Some("Chrome".to_string()),
            title: Some("Docs".to_string()),
            url: Some("https://example.com".to_string()),
        };
        assert_eq!(WindowData::decode(&window.encode()), Some(window));
    }
}
