use crate::error::{AppResult, ConfigError};
use serde::Deserialize;
use std::path::Path;

/// 程序配置文件
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 服务地址 ---
    /// 工作流 API 根地址（场景列表、任务提交、推送通道）
    pub workflow_api_base_url: String,
    /// TiTiler 切片服务根地址
    pub titiler_api_base_url: String,
    /// 切片路径模板（相对于 TiTiler 根地址）
    pub tile_path_template: String,
    /// 固定参考范围 minLon,minLat,maxLon,maxLat (WGS84)
    pub reference_bbox: String,
    /// 默认色带
    pub default_colormap: String,

    // --- 任务存在性轮询 ---
    pub existence_retries: u32,
    /// 首次等待（远程持久化延迟）
    pub existence_initial_delay_ms: u64,
    pub existence_retry_delay_ms: u64,

    // --- 选择与导出 ---
    /// 同时选择的影像波段上限
    pub max_image_bands: usize,
    pub export_width: u32,
    pub export_height: u32,
    /// 结果图层没有 rescale 时导出使用的默认值
    pub default_rescale: String,

    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 输出日志文件
    pub output_log_file: String,

    // --- 演示驱动 ---
    pub scene_prefix: Option<String>,
    pub band_names: Vec<String>,
    pub expression: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workflow_api_base_url:
                "http://api-lb-production-716552440.ap-south-1.elb.amazonaws.com".to_string(),
            titiler_api_base_url: "http://localhost:8000".to_string(),
            tile_path_template: "cog/tiles/{z}/{x}/{y}.png".to_string(),
            reference_bbox: "45,-15,120,55".to_string(),
            default_colormap: "viridis".to_string(),
            existence_retries: 10,
            existence_initial_delay_ms: 5000,
            existence_retry_delay_ms: 500,
            max_image_bands: 2,
            export_width: 1024,
            export_height: 1024,
            default_rescale: "0,100".to_string(),
            verbose_logging: false,
            output_log_file: "skystack.log".to_string(),
            scene_prefix: None,
            band_names: Vec::new(),
            expression: None,
        }
    }
}

impl Config {
    /// 加载配置：`SKYSTACK_CONFIG` 指向的 TOML 文件（可选），再叠加环境变量
    pub fn load() -> AppResult<Self> {
        let base = match std::env::var("SKYSTACK_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env_overrides())
    }

    /// 仅从环境变量加载（其余取默认值）
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件加载，缺失字段取默认值
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })?;
        Ok(config)
    }

    fn with_env_overrides(self) -> Self {
        let default = self;
        Self {
            workflow_api_base_url: env_string("WORKFLOW_API_BASE_URL").unwrap_or(default.workflow_api_base_url),
            titiler_api_base_url: env_string("TITILER_API_BASE_URL").unwrap_or(default.titiler_api_base_url),
            tile_path_template: env_string("TILE_PATH_TEMPLATE").unwrap_or(default.tile_path_template),
            reference_bbox: env_string("REFERENCE_BBOX").unwrap_or(default.reference_bbox),
            default_colormap: env_string("DEFAULT_COLORMAP").unwrap_or(default.default_colormap),
            existence_retries: env_parse("EXISTENCE_RETRIES").unwrap_or(default.existence_retries),
            existence_initial_delay_ms: env_parse("EXISTENCE_INITIAL_DELAY_MS").unwrap_or(default.existence_initial_delay_ms),
            existence_retry_delay_ms: env_parse("EXISTENCE_RETRY_DELAY_MS").unwrap_or(default.existence_retry_delay_ms),
            max_image_bands: env_parse("MAX_IMAGE_BANDS").unwrap_or(default.max_image_bands),
            export_width: env_parse("EXPORT_WIDTH").unwrap_or(default.export_width),
            export_height: env_parse("EXPORT_HEIGHT").unwrap_or(default.export_height),
            default_rescale: env_string("DEFAULT_RESCALE").unwrap_or(default.default_rescale),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
            output_log_file: env_string("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            scene_prefix: env_string("SCENE_PREFIX").or(default.scene_prefix),
            band_names: env_string("BAND_NAMES")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.band_names),
            expression: env_string("EXPRESSION").or(default.expression),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
