/// 统一错误处理系统
///
/// 只有配置错误和调用参数错误会返回给调用方；
/// 数据稀疏造成的问题（缺少向量、零向量、维度不一致、乱序）在各组件内部降级处理并记录日志

use thiserror::Error;

/// 应用错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 调用参数校验错误（阈值、时间窗口、分组大小等）
    #[error("[ERR_VALIDATION_{0:03}] {1}")]
    Validation(u16, String),

    /// 配置文件相关错误
    #[error("[ERR_CONFIG_{0:03}] {1}")]
    Config(u16, String),

    /// 数据库相关错误
    #[error("[ERR_DATABASE_{0:03}] {1}")]
    Database(u16, String),

    /// IO 相关错误
    #[error("[ERR_IO_{0:03}] {1}")]
    IO(u16, String),

    /// 序列化/反序列化错误
    #[error("[ERR_SERDE_{0:03}] {1}")]
    Serde(u16, String),

    /// 未知错误
    #[error("[ERR_UNKNOWN] {0}")]
    Unknown(String),
}

impl AppError {
    /// 创建校验错误
    pub fn validation(code: u16, msg: impl Into<String>) -> Self {
        Self::Validation(code, msg.into())
    }

    /// 创建配置错误
    pub fn config(code: u16, msg: impl Into<String>) -> Self {
        Self::Config(code, msg.into())
    }

    /// 创建数据库错误
    pub fn database(code: u16, msg: impl Into<String>) -> Self {
        Self::Database(code, msg.into())
    }

    /// 创建 IO 错误
    pub fn io(code: u16, msg: impl Into<String>) -> Self {
        Self::IO(code, msg.into())
    }

    /// 创建序列化错误
    pub fn serde(code: u16, msg: impl Into<String>) -> Self {
        Self::Serde(code, msg.into())
    }

    /// 相似度阈值不在 [0, 1] 内
    pub fn invalid_threshold(value: f32) -> Self {
        Self::validation(1, format!("相似度阈值必须在 0-1 之间，当前值: {}", value))
    }

    /// 时间窗口必须为正数
    pub fn invalid_window(hours: f64) -> Self {
        Self::validation(2, format!("时间窗口必须大于 0 小时，当前值: {}", hours))
    }

    /// 最小分组大小必须至少为 1
    pub fn invalid_group_size(size: usize) -> Self {
        Self::validation(3, format!("最小分组大小必须大于 0，当前值: {}", size))
    }

    /// 结果数量上限必须至少为 1
    pub fn invalid_limit(limit: usize) -> Self {
        Self::validation(4, format!("结果数量上限必须大于 0，当前值: {}", limit))
    }

    /// 是否为参数校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(..))
    }
}

/// 从标准 IO 错误转换
impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::io(1, "文件或目录不存在"),
            std::io::ErrorKind::PermissionDenied => Self::io(3, "权限不足"),
            std::io::ErrorKind::AlreadyExists => Self::io(2, "文件或目录已存在"),
            _ => Self::io(999, format!("IO 错误: {}", err)),
        }
    }
}

/// 从 serde_json 错误转换
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::serde(1, format!("JSON 序列化错误: {}", err))
    }
}

/// 从 serde_yaml 错误转换
impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::config(1, format!("配置文件解析失败: {}", err))
    }
}

/// 从 anyhow 错误转换
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<rusqlite::Error>() {
            Ok(db_err) => db_err.into(),
            Err(err) => Self::Unknown(format!("{:#}", err)),
        }
    }
}

/// 从 rusqlite 错误转换
impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => {
                Self::database(1, format!("数据库错误: {}", msg))
            }
            rusqlite::Error::QueryReturnedNoRows => {
                Self::database(2, "查询未返回结果")
            }
            _ => Self::database(999, format!("数据库错误: {}", err)),
        }
    }
}

/// 应用 Result 类型别名
pub type AppResult<T> = Result<T, AppError>;
