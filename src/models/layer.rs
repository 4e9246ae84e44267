use crate::models::bbox::Extent;
use serde::{Deserialize, Serialize};

/// 图层标识
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// 图层来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayerOrigin {
    RawBand,
    WorkflowResult,
}

/// 图层数据源描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LayerSource {
    /// 原始波段：对象键 + 预签名地址 + 切片模板
    RawBand {
        key: String,
        presigned_url: String,
        tile_url: String,
    },
    /// 工作流结果：任务返回的切片模板（已写入色带与 rescale）
    WorkflowResult {
        job_id: Option<String>,
        tile_url: String,
        rescale: Option<String>,
    },
}

impl LayerSource {
    pub fn tile_url(&self) -> &str {
        match self {
            LayerSource::RawBand { tile_url, .. } => tile_url,
            LayerSource::WorkflowResult { tile_url, .. } => tile_url,
        }
    }

    pub fn origin(&self) -> LayerOrigin {
        match self {
            LayerSource::RawBand { .. } => LayerOrigin::RawBand,
            LayerSource::WorkflowResult { .. } => LayerOrigin::WorkflowResult,
        }
    }
}

/// 非破坏性视觉调整参数
///
/// - `transparency`: 0..=100，100 为完全不透明
/// - `brightness` / `contrast` / `saturation` / `exposure`: -50..=50
/// - `hue`: -180..=180 度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterValues {
    pub transparency: f64,
    pub brightness: f64,
    pub contrast: f64,
    pub saturation: f64,
    pub exposure: f64,
    pub hue: f64,
}

impl Default for FilterValues {
    fn default() -> Self {
        Self {
            transparency: 100.0,
            brightness: 0.0,
            contrast: 0.0,
            saturation: 0.0,
            exposure: 0.0,
            hue: 0.0,
        }
    }
}

impl FilterValues {
    /// 将各项钳制到允许范围
    pub fn clamped(self) -> Self {
        Self {
            transparency: self.transparency.clamp(0.0, 100.0),
            brightness: self.brightness.clamp(-50.0, 50.0),
            contrast: self.contrast.clamp(-50.0, 50.0),
            saturation: self.saturation.clamp(-50.0, 50.0),
            exposure: self.exposure.clamp(-50.0, 50.0),
            hue: self.hue.clamp(-180.0, 180.0),
        }
    }
}

/// 渲染图层快照（纯数据，不持有任何绘制资源）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderLayer {
    pub id: LayerId,
    pub name: String,
    pub source: LayerSource,
    pub visible: bool,
    /// 0.0..=1.0
    pub opacity: f64,
    pub filter_values: FilterValues,
    /// 固定范围（EPSG:3857）
    pub extent: Option<Extent>,
}

impl RenderLayer {
    pub fn origin(&self) -> LayerOrigin {
        self.source.origin()
    }

    pub fn tile_url(&self) -> &str {
        self.source.tile_url()
    }
}
