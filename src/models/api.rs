//! 工作流 API 的请求与响应结构
//!
//! 响应字段一律为 Option：服务端字段缺失时由调用方决定是降级还是报错

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// `GET /s3/root`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SceneList {
    pub prefixes: Option<Vec<String>>,
}

/// `GET /s3/list?prefix=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryListing {
    pub contents: Option<DirectoryContents>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryContents {
    #[serde(default)]
    pub objects: Vec<RemoteObject>,
    #[serde(default)]
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteObject {
    pub key: String,
    #[serde(default)]
    pub size_bytes: u64,
}

/// `GET /s3/read?key=`，`data` 可能是字符串也可能是对象
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectContent {
    pub data: Option<JsonValue>,
}

/// `GET /s3/presign?key=`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresignedUrl {
    pub url: Option<String>,
}

/// `POST /workflows` 的响应
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobCreated {
    pub job_id: Option<String>,
}

/// 统计信息（只关心推荐的 rescale 区间）
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Statistics {
    pub recommended_rescale: Option<RescaleHint>,
}

/// `recommended_rescale` 既可能是 `"lo,hi"` 也可能是 `[lo, hi]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RescaleHint {
    Text(String),
    Range(Vec<f64>),
}

impl RescaleHint {
    /// 归一化为 `lo,hi`
    pub fn to_param(&self) -> Option<String> {
        match self {
            RescaleHint::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            RescaleHint::Text(_) => None,
            RescaleHint::Range(values) if values.len() == 2 => {
                Some(format!("{},{}", values[0], values[1]))
            }
            RescaleHint::Range(_) => None,
        }
    }
}

/// `GET /workflows/{id}/download`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadLink {
    pub download_url: Option<String>,
}

// ========== 请求体 ==========

/// `POST /workflows`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobRequest {
    pub workflow_id: String,
    pub dataset_id: String,
    pub tasks: Vec<TaskRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskRequest {
    pub task_id: String,
    pub operation: String,
    pub parameters: TaskParameters,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskParameters {
    pub formula: String,
}

impl JobRequest {
    /// 单任务的波段运算请求
    pub fn band_math(dataset_id: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            workflow_id: "ndvi_request_postman_test".to_string(),
            dataset_id: dataset_id.into(),
            tasks: vec![TaskRequest {
                task_id: "calculate_ndvi".to_string(),
                operation: "band_math".to_string(),
                parameters: TaskParameters {
                    formula: formula.into(),
                },
                dependencies: Vec::new(),
            }],
        }
    }
}

/// `POST /workflows/{id}/download/bbox`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BBoxExportRequest {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub colormap_name: String,
    pub rescale: String,
}
