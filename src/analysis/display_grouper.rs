/// 展示分组器 - 将时间相近、分类相同、关键词重叠的记录合并为界面展示用的短分组
///
/// 记录按时间顺序逐条决定归属，决定后不再调整：
/// 只考虑锚点（首条记录）仍在时间窗口内的分组，优先加入最近打开的匹配分组

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use crate::db::schema::ActivityRecord;
use crate::settings::AnalysisConfig;

/// 关键词提取时忽略的常见词
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "from", "this", "that", "are", "was", "you", "your", "into", "of", "to",
    "in", "on", "at", "is", "it", "a", "an", "or", "by", "be", "as", "www", "http", "https", "com",
];

/// 标题中展示的关键词数量
const TITLE_KEYWORDS: usize = 3;

/// 展示分组
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayGroup {
    pub id: String,
    pub title: String,
    pub category: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub record_ids: Vec<i64>,
    pub keywords: Vec<String>,
}

/// 构建中的分组
#[derive(Debug)]
struct OpenGroup<'a> {
    anchor: &'a ActivityRecord,
    last_time: DateTime<Utc>,
    record_ids: Vec<i64>,
    keywords: BTreeSet<String>,
    keyword_hits: HashMap<String, usize>,
}

impl<'a> OpenGroup<'a> {
    fn new(record: &'a ActivityRecord, keywords: BTreeSet<String>) -> Self {
        let mut group = Self {
            anchor: record,
            last_time: record.timestamp,
            record_ids: Vec::new(),
            keywords: BTreeSet::new(),
            keyword_hits: HashMap::new(),
        };
        group.add(record, keywords);
        group
    }

    fn add(&mut self, record: &ActivityRecord, keywords: BTreeSet<String>) {
        self.last_time = record.timestamp;
        self.record_ids.push(record.id);
        for keyword in keywords {
            *self.keyword_hits.entry(keyword.clone()).or_insert(0) += 1;
            self.keywords.insert(keyword);
        }
    }

    fn accepts(&self, record: &ActivityRecord, keywords: &BTreeSet<String>, config: &AnalysisConfig) -> bool {
        let since_anchor = (record.timestamp - self.anchor.timestamp).num_seconds();
        let overlap = self.keywords.intersection(keywords).count();

        since_anchor <= config.display_window_seconds as i64
            && record.category == self.anchor.category
            && overlap >= config.min_keyword_overlap
    }

    /// 按出现次数降序、字典序升序排列的关键词
    fn ranked_keywords(&self) -> Vec<String> {
        let mut ranked: Vec<(&String, &usize)> = self.keyword_hits.iter().collect();
        ranked.sort_by(|(word_a, hits_a), (word_b, hits_b)| hits_b.cmp(hits_a).then_with(|| word_a.cmp(word_b)));
        ranked.into_iter().map(|(word, _)| word.clone()).collect()
    }

    fn finalize(self) -> DisplayGroup {
        let keywords = self.ranked_keywords();

        let title = if keywords.is_empty() {
            self.anchor.task_label.clone()
        } else {
            let top = keywords.iter().take(TITLE_KEYWORDS).cloned().collect::<Vec<_>>().join("、");
            format!("{} ({})", self.anchor.task_label, top)
        };

        DisplayGroup {
            id: format!("group-{}-{}", self.anchor.timestamp.format("%Y%m%d"), self.anchor.id),
            title,
            category: self.anchor.category.clone(),
            start: self.anchor.timestamp,
            end: self.last_time,
            record_ids: self.record_ids,
            keywords,
        }
    }
}

/// 展示分组器
#[derive(Debug, Clone)]
pub struct DisplayGrouper {
    config: AnalysisConfig,
}

impl DisplayGrouper {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    /// 将记录分组，结果按最早成员的时间排序
    pub fn group_records(&self, records: &[ActivityRecord]) -> Vec<DisplayGroup> {
        let mut ordered: Vec<&ActivityRecord> = records.iter().collect();
        ordered.sort_by_key(|record| (record.timestamp, record.id));

        let mut groups: Vec<OpenGroup> = Vec::new();

        for record in ordered {
            let keywords = extract_keywords(record);

            // 最近打开的匹配分组优先
            let target = groups
                .iter()
                .rposition(|group| group.accepts(record, &keywords, &self.config));

            match target {
                Some(index) => groups[index].add(record, keywords),
                None => groups.push(OpenGroup::new(record, keywords)),
            }
        }

        groups.into_iter().map(OpenGroup::finalize).collect()
    }
}

/// 从任务标签、OCR 文本和窗口标题中提取关键词
pub fn extract_keywords(record: &ActivityRecord) -> BTreeSet<String> {
    let mut keywords = tokenize(&record.task_label);
    if let Some(text) = &record.raw_text {
        keywords.extend(tokenize(text));
    }
    if let Some(title) = record.window.as_ref().and_then(|w| w.title()) {
        keywords.extend(tokenize(title));
    }
    keywords
}

/// 小写分词，去掉过短的词和常见词
fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}
