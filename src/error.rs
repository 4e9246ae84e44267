//! 错误类型
//!
//! 分类与传播策略：
//! - `Validation` / `Constraint`：本地校验，发生在任何网络调用之前，不修改状态
//! - `Api`：远程调用失败（存在性轮询阶段的 404 会被重试）
//! - `Job`：远程声明的终态失败、初始化超时、推送通道故障
//! - 非致命降级（统计信息获取失败、切片加载失败）不是错误，见 [`crate::models::Notice`]

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 本地校验失败
    #[error("校验失败: {0}")]
    Validation(#[from] ValidationError),
    /// 选择约束冲突
    #[error("约束冲突: {0}")]
    Constraint(#[from] ConstraintViolation),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 任务错误
    #[error("任务错误: {0}")]
    Job(#[from] JobError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 文件读写错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 本地校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 未选择场景
    #[error("尚未加载场景，请先在波段页选择一个场景")]
    MissingScene,
    /// 场景前缀为空
    #[error("场景前缀不能为空")]
    EmptyScenePrefix,
    /// 表达式为空
    #[error("未提供波段运算公式")]
    BlankExpression,
    /// 不支持的色带
    #[error("不支持的色带: {name}")]
    UnknownColorMap { name: String },
    /// 不透明度超出范围
    #[error("不透明度 {value} 超出范围 [0, 1]")]
    OpacityOutOfRange { value: f64 },
    /// 图层不存在
    #[error("图层不存在: {id}")]
    LayerNotFound { id: String },
    /// 文件不存在于当前场景
    #[error("当前场景中没有文件: {id}")]
    FileNotFound { id: String },
    /// 没有可导出的可见图层
    #[error("没有可导出的活动图层")]
    NoActiveLayer,
    /// 没有可下载的任务
    #[error("没有找到可下载的任务ID")]
    NoActiveJob,
    /// 无法从结果图层解析任务ID
    #[error("无法从结果图层URL解析任务ID: {url}")]
    JobIdNotFound { url: String },
}

/// 选择约束冲突
#[derive(Debug, Error)]
pub enum ConstraintViolation {
    /// 影像波段数量超过上限
    #[error("最多只能同时选择 {max} 个影像波段")]
    BandLimitExceeded { max: usize },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// API 返回非成功状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, message={message:?}")]
    BadStatus {
        endpoint: String,
        status: u16,
        message: Option<String>,
    },
    /// 响应缺少必需字段
    #[error("API响应缺少字段 `{field}` ({endpoint})")]
    MissingField {
        endpoint: String,
        field: &'static str,
    },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 推送通道连接失败
    #[error("推送通道连接失败 ({url}): {source}")]
    ChannelConnectFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApiError {
    /// 是否为 404（存在性轮询时可重试）
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::BadStatus { status: 404, .. })
    }
}

/// 任务错误
#[derive(Debug, Error)]
pub enum JobError {
    /// 远程声明的失败状态
    #[error("{message}")]
    RemoteFailed { status: String, message: String },
    /// 任务初始化超时
    #[error("任务 {job_id} 初始化超时 (已尝试 {attempts} 次)")]
    InitializationTimeout { job_id: String, attempts: u32 },
    /// 推送通道报告错误
    #[error("推送通道错误: {message}")]
    ChannelError { message: String },
    /// 推送通道在任务结束前关闭
    #[error("推送通道在任务结束前意外关闭")]
    ChannelClosed,
    /// 可视化信息不完整
    #[error("任务已完成，但加载地图图层失败: 可视化信息缺少 `{field}`")]
    VisualizationIncomplete { field: &'static str },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取配置文件失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 参考范围格式错误
    #[error("无法解析范围 `{value}`，应为 minLon,minLat,maxLon,maxLat")]
    InvalidBBox { value: String },
}

// ========== 从常见错误类型转换 ==========

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        if let Some(status) = err.status() {
            return AppError::Api(ApiError::BadStatus {
                endpoint,
                status: status.as_u16(),
                message: None,
            });
        }
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for AppError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        AppError::Job(JobError::ChannelError {
            message: err.to_string(),
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        // TOML错误通常不包含路径信息
        AppError::Config(ConfigError::TomlParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建非成功状态码错误
    pub fn bad_status(endpoint: impl Into<String>, status: u16, message: Option<String>) -> Self {
        AppError::Api(ApiError::BadStatus {
            endpoint: endpoint.into(),
            status,
            message,
        })
    }

    /// 创建缺少字段错误
    pub fn missing_field(endpoint: impl Into<String>, field: &'static str) -> Self {
        AppError::Api(ApiError::MissingField {
            endpoint: endpoint.into(),
            field,
        })
    }


    /// 是否为 404 响应
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::Api(e) if e.is_not_found())
    }

    /// 是否为本地拒绝（校验失败或约束冲突）
    pub fn is_local_rejection(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Constraint(_))
    }

    /// 归一化为面向用户的单条消息
    ///
    /// 服务端返回了 `message` / `detail` 时优先使用服务端文本
    pub fn user_message(&self) -> String {
        match self {
            AppError::Api(ApiError::BadStatus {
                message: Some(msg), ..
            }) => msg.clone(),
            AppError::Validation(e) => e.to_string(),
            AppError::Constraint(e) => e.to_string(),
            AppError::Job(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
