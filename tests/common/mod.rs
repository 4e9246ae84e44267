//! 集成测试用的内存实现

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use skystack::clients::WorkflowApi;
use skystack::config::Config;
use skystack::error::{AppError, AppResult};
use skystack::infrastructure::{ChannelEvent, HeadlessSurface, PushConnector, PushSession, SessionFeed};
use skystack::models::api::{
    BBoxExportRequest, DirectoryContents, DirectoryListing, JobRequest, ObjectContent,
    RemoteObject, RescaleHint, SceneList, Statistics,
};
use skystack::models::{ProcessingProgress, StatusSnapshot, VisualizationInfo};

/// 存在性检查的脚本化响应
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResponse {
    Exists,
    NotFound,
    ServerError,
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub scene_prefixes: Option<Vec<String>>,
    /// 前缀 → (对象, 子目录)；不存在的前缀返回 500
    pub directories: HashMap<String, (Vec<String>, Vec<String>)>,
    /// 对象键 → 读取代理返回的 data；不存在时返回 404
    pub objects: HashMap<String, JsonValue>,
    pub presign_failures: HashSet<String>,
    pub create_job_error: Option<(u16, String)>,
    pub job_id: String,
    /// 为空时视为已存在
    pub check_responses: VecDeque<CheckResponse>,
    pub statistics: Option<Statistics>,
    pub download_url: Option<String>,
    pub export_bytes: Vec<u8>,
    /// 每次列目录前的等待
    pub list_delay: Option<Duration>,
    /// 列目录时记录该表面上的图层数
    pub watched_surface: Option<HeadlessSurface>,

    pub listed_prefixes: Vec<String>,
    pub submitted: Vec<JobRequest>,
    pub check_calls: usize,
    pub statistics_calls: usize,
    pub exports: Vec<(String, BBoxExportRequest)>,
    pub layers_seen_while_listing: Vec<usize>,
    pub check_times: Vec<tokio::time::Instant>,
}

#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state().job_id = "job-42".to_string();
        api.state().export_bytes = b"GTIFF".to_vec();
        api
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// 一个两层目录、带清单的场景
    pub fn with_scene(self, prefix: &str) -> Self {
        {
            let mut state = self.state();
            state.scene_prefixes = Some(vec![prefix.to_string()]);
            let bands = format!("{}bands/", prefix);
            state.directories.insert(
                prefix.to_string(),
                (
                    vec![format!("{}manifest.json", prefix), format!("{}notes.bin", prefix)],
                    vec![bands.clone()],
                ),
            );
            state.directories.insert(
                bands.clone(),
                (
                    vec![
                        format!("{}img_vis.tif", bands),
                        format!("{}img_nir.tif", bands),
                        format!("{}img_mir.tif", bands),
                        format!("{}latitude.tif", bands),
                    ],
                    Vec::new(),
                ),
            );
            state.objects.insert(
                format!("{}manifest.json", prefix),
                serde_json::json!({
                    "image_bands": ["img_vis.tif", "img_nir.tif", "img_mir.tif"],
                    "geolocation_data": ["latitude.tif"],
                    "auxiliary_data": ["notes.bin"],
                }),
            );
        }
        self
    }

    /// 三层目录：根下 `folders` 个子目录，每个子目录下再有 `folders` 个子目录，各含一个 GeoTIFF
    pub fn with_wide_tree(self, prefix: &str, folders: usize) -> Self {
        {
            let mut state = self.state();
            state.scene_prefixes = Some(vec![prefix.to_string()]);
            let children: Vec<String> = (0..folders).map(|i| format!("{}part{}/", prefix, i)).collect();
            state
                .directories
                .insert(prefix.to_string(), (Vec::new(), children.clone()));
            for child in children {
                let leaves: Vec<String> = (0..folders).map(|j| format!("{}tile{}/", child, j)).collect();
                state.directories.insert(child, (Vec::new(), leaves.clone()));
                for leaf in leaves {
                    let band = format!("{}img_vis.tif", leaf);
                    state.directories.insert(leaf, (vec![band], Vec::new()));
                }
            }
        }
        self
    }

    pub fn with_statistics(self, rescale: &str) -> Self {
        self.state().statistics = Some(Statistics {
            recommended_rescale: Some(RescaleHint::Text(rescale.to_string())),
        });
        self
    }

    pub fn script_checks(&self, responses: &[CheckResponse]) {
        self.state().check_responses = responses.iter().copied().collect();
    }
}

#[async_trait]
impl WorkflowApi for FakeApi {
    async fn list_scenes(&self) -> AppResult<SceneList> {
        Ok(SceneList {
            prefixes: self.state().scene_prefixes.clone(),
        })
    }

    async fn list_directory(&self, prefix: &str) -> AppResult<DirectoryListing> {
        let delay = {
            let mut state = self.state();
            state.listed_prefixes.push(prefix.to_string());
            if let Some(surface) = state.watched_surface.clone() {
                state.layers_seen_while_listing.push(surface.layer_count());
            }
            state.list_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let state = self.state();
        let (objects, folders) = state
            .directories
            .get(prefix)
            .cloned()
            .ok_or_else(|| AppError::bad_status("/s3/list", 500, Some("listing failed".into())))?;
        Ok(DirectoryListing {
            contents: Some(DirectoryContents {
                objects: objects
                    .into_iter()
                    .map(|key| RemoteObject { key, size_bytes: 1024 })
                    .collect(),
                folders,
            }),
        })
    }

    async fn read_object(&self, key: &str) -> AppResult<ObjectContent> {
        let data = self
            .state()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| AppError::bad_status("/s3/read", 404, None))?;
        Ok(ObjectContent { data: Some(data) })
    }

    async fn presign(&self, key: &str) -> AppResult<String> {
        if self.state().presign_failures.contains(key) {
            return Err(AppError::bad_status("/s3/presign", 403, Some("Access denied".into())));
        }
        Ok(format!("https://bucket.s3.amazonaws.com/{}?X-Amz-Signature=abc", key))
    }

    async fn create_job(&self, request: &JobRequest) -> AppResult<String> {
        let mut state = self.state();
        state.submitted.push(request.clone());
        if let Some((status, message)) = state.create_job_error.clone() {
            return Err(AppError::bad_status("/workflows", status, Some(message)));
        }
        Ok(state.job_id.clone())
    }

    async fn check_job(&self, job_id: &str) -> AppResult<()> {
        let mut state = self.state();
        state.check_calls += 1;
        state.check_times.push(tokio::time::Instant::now());
        let endpoint = format!("/workflows/{}", job_id);
        match state.check_responses.pop_front().unwrap_or(CheckResponse::Exists) {
            CheckResponse::Exists => Ok(()),
            CheckResponse::NotFound => Err(AppError::bad_status(endpoint, 404, None)),
            CheckResponse::ServerError => {
                Err(AppError::bad_status(endpoint, 500, Some("database unavailable".into())))
            }
        }
    }

    async fn fetch_statistics(&self, _statistics_url: &str) -> AppResult<Statistics> {
        let mut state = self.state();
        state.statistics_calls += 1;
        state
            .statistics
            .clone()
            .ok_or_else(|| AppError::bad_status("statistics", 500, None))
    }

    async fn download_url(&self, job_id: &str) -> AppResult<String> {
        self.state()
            .download_url
            .clone()
            .ok_or_else(|| AppError::missing_field(format!("/workflows/{}/download", job_id), "download_url"))
    }

    async fn export_bbox(&self, job_id: &str, request: &BBoxExportRequest) -> AppResult<Vec<u8>> {
        let mut state = self.state();
        state.exports.push((job_id.to_string(), request.clone()));
        Ok(state.export_bytes.clone())
    }
}

/// 脚本化的推送通道：连接时把事件一次性写入会话
#[derive(Default)]
pub struct FakeConnector {
    script: Mutex<Vec<ChannelEvent>>,
    /// 保留生产端，用于检查会话是否已关闭；未脚本化 Closed 时通道保持打开
    feeds: Mutex<Vec<SessionFeed>>,
    pub connects: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(events: Vec<ChannelEvent>) -> Self {
        Self {
            script: Mutex::new(events),
            ..Default::default()
        }
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }

    /// 第 `index` 个会话是否已被关闭
    pub fn session_closed(&self, index: usize) -> bool {
        self.feeds
            .lock()
            .unwrap()
            .get_mut(index)
            .map(|feed| feed.is_shutdown())
            .unwrap_or(false)
    }

    /// 每个已建立的会话是否都已被关闭
    pub fn all_sessions_closed(&self) -> bool {
        self.feeds
            .lock()
            .unwrap()
            .iter_mut()
            .all(|feed| feed.is_shutdown())
    }
}

#[async_trait]
impl PushConnector for FakeConnector {
    async fn connect(&self, job_id: &str) -> AppResult<PushSession> {
        self.connects.lock().unwrap().push(job_id.to_string());
        let (session, feed) = PushSession::pair(job_id);
        for event in self.script.lock().unwrap().drain(..) {
            feed.send(event);
        }
        self.feeds.lock().unwrap().push(feed);
        Ok(session)
    }
}

// ========== 事件构造 ==========

pub fn processing(processed: u64, total: u64) -> ChannelEvent {
    ChannelEvent::Status(StatusSnapshot {
        status: Some("PROCESSING".to_string()),
        human_status: Some(format!("Processing tiles {}/{}", processed, total)),
        processing_progress: Some(ProcessingProgress {
            processed_tiles: processed,
            total_tiles: total,
        }),
        visualization: None,
    })
}

pub fn status(status: &str, human: Option<&str>) -> ChannelEvent {
    ChannelEvent::Status(StatusSnapshot {
        status: Some(status.to_string()),
        human_status: human.map(str::to_string),
        ..Default::default()
    })
}

pub fn mosaic_created(job_id: &str) -> ChannelEvent {
    ChannelEvent::Status(StatusSnapshot {
        status: Some("MOSAIC_CREATED".to_string()),
        human_status: None,
        processing_progress: None,
        visualization: Some(VisualizationInfo {
            tiles_url: Some(format!(
                "http://api.test/viz/{}/tiles/{{z}}/{{x}}/{{y}}.png?colormap_name=gray",
                job_id
            )),
            statistics_url: Some(format!("http://api.test/viz/{}/statistics", job_id)),
        }),
    })
}

/// 不等待的测试配置
pub fn test_config() -> Config {
    Config {
        workflow_api_base_url: "http://api.test".to_string(),
        titiler_api_base_url: "http://titiler.test".to_string(),
        existence_initial_delay_ms: 0,
        existence_retry_delay_ms: 0,
        ..Config::default()
    }
}

pub fn shared(api: FakeApi) -> Arc<FakeApi> {
    Arc::new(api)
}
