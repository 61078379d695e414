/// 活动分析模块
///
/// - session_reconstructor: 会话重建与置信度
/// - task_summary: 按任务汇总会话
/// - similarity: 余弦相似度、语义搜索、相似分组
/// - display_grouper: 界面展示用的短分组
/// - context_locator: 记录前后上下文
/// - cache: 显式传入的结果缓存
/// - window: 时间窗口
/// - analyzer: 组合以上组件的分析入口

pub mod analyzer;
pub mod cache;
pub mod context_locator;
pub mod display_grouper;
pub mod session_reconstructor;
pub mod similarity;
pub mod task_summary;
pub mod window;

pub use analyzer::{ActivityAnalyzer, DailyReport};
pub use cache::ResultCache;
pub use context_locator::{get_task_context, TaskContext};
pub use display_grouper::{DisplayGroup, DisplayGrouper};
pub use session_reconstructor::{ConfidenceLevel, Session, SessionReconstructor};
pub use similarity::{cosine_similarity, SearchResult, SimilarityEngine, SimilarityGroup};
pub use task_summary::{summarize_tasks, TaskSummary};
pub use window::{TimeWindow, WindowAnchor};
