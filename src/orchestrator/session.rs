//! 会话 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，持有一次用户会话的全部状态并把各能力串起来：
//!
//! 1. **应用初始化**：创建工作流客户端、推送连接器与绘制表面
//! 2. **场景**：列出、选择（重新选择会清空全部选择与图层）
//! 3. **波段**：选择即加载图层，加载失败回滚选择
//! 4. **任务**：提交公式并驱动到终态
//! 5. **导出**：整幅下载与框选范围导出
//!
//! ## 设计特点
//!
//! - **资源所有者**：唯一持有注册表（及其绘制表面）与任务编排器的模块
//! - **错误归一**：每个失败都转换为一条面向用户的提示，不会遗漏未观察的失败
//! - **向下委托**：不做具体业务判断

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use crate::clients::{WorkflowApi, WorkflowClient};
use crate::config::Config;
use crate::error::{AppError, AppResult, ValidationError};
use crate::infrastructure::{HeadlessSurface, PushConnector, RenderSurface, SurfaceHandle, WebSocketConnector};
use crate::models::{BBox, FileEntry, Job, LayerId, Notice, Scene};
use crate::orchestrator::job_orchestrator::JobOrchestrator;
use crate::services::band_selection::{translate_expression, BandSelectionManager, Selection};
use crate::services::export_service::{self, ExportArtifact};
use crate::services::layer_registry::LayerRegistry;
use crate::services::map_controller::MapInteractionController;
use crate::services::scene_catalog::SceneCatalog;
use crate::utils::logging::{init_log_file, log_scene_loaded, log_startup, print_job_summary, print_session_state};

/// 应用主结构
pub struct App {
    config: Config,
    api: Arc<dyn WorkflowApi>,
    catalog: SceneCatalog,
    selection: BandSelectionManager,
    registry: LayerRegistry,
    orchestrator: JobOrchestrator,
    map: MapInteractionController,
    scene: Option<Scene>,
    scene_prefixes: Vec<String>,
    notices: Vec<Notice>,
}

impl App {
    /// 用给定的协作者创建会话
    pub fn new(
        config: Config,
        api: Arc<dyn WorkflowApi>,
        connector: Arc<dyn PushConnector>,
        surface: Box<dyn RenderSurface>,
    ) -> AppResult<Self> {
        let registry = LayerRegistry::new(&config, surface)?;
        let orchestrator = JobOrchestrator::new(&config, api.clone(), connector);
        Ok(Self {
            catalog: SceneCatalog::new(api.clone()),
            selection: BandSelectionManager::new(config.max_image_bands),
            registry,
            orchestrator,
            map: MapInteractionController::new(),
            scene: None,
            scene_prefixes: Vec::new(),
            notices: Vec::new(),
            api,
            config,
        })
    }

    /// 初始化应用（真实服务 + 无界面绘制表面）
    pub async fn initialize(config: Config) -> Result<Self> {
        // 初始化日志文件
        init_log_file(&config.output_log_file)?;

        log_startup(&config);

        let api: Arc<dyn WorkflowApi> = Arc::new(WorkflowClient::new(&config));
        let connector: Arc<dyn PushConnector> = Arc::new(WebSocketConnector::new(&config));
        let app = Self::new(config, api, connector, Box::new(HeadlessSurface::new()))?;
        Ok(app)
    }

    // ========== 查询 ==========

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_prefixes(&self) -> &[String] {
        &self.scene_prefixes
    }

    pub fn selection(&self) -> &BandSelectionManager {
        &self.selection
    }

    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut LayerRegistry {
        &mut self.registry
    }

    pub fn map(&self) -> &MapInteractionController {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapInteractionController {
        &mut self.map
    }

    pub fn job(&self) -> &Job {
        self.orchestrator.job()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    // ========== 场景 ==========

    /// 刷新场景列表
    pub async fn refresh_scenes(&mut self) -> AppResult<&[String]> {
        let listing = self.catalog.list_scenes().await;
        let listing = self.report(listing)?;
        self.notices.extend(listing.notices);
        self.scene_prefixes = listing.prefixes;
        Ok(&self.scene_prefixes)
    }

    /// 选择场景：先清空旧场景的选择与图层，再加载新场景
    pub async fn select_scene(&mut self, prefix: &str) -> AppResult<&Scene> {
        if prefix.trim().is_empty() {
            return self.report(Err(ValidationError::EmptyScenePrefix.into()));
        }

        self.selection.clear();
        self.registry.clear();
        self.map.disable_bbox_capture();

        let load = self.catalog.select_scene(prefix).await;
        let load = self.report(load)?;

        log_scene_loaded(&load.scene.name, load.scene.files.len(), load.scene.manifest.is_some());
        self.notices.extend(load.notices);
        Ok(self.scene.insert(load.scene))
    }

    // ========== 波段 ==========

    /// 选中一个文件；影像 GeoTIFF 会加载为图层，加载失败时撤销选择
    pub async fn select_band(&mut self, file_id: &str) -> AppResult<Selection> {
        let file = self.find_file(file_id);
        let file = self.report(file)?;

        let selection = self.selection.try_select(&file).map_err(AppError::from);
        let selection = self.report(selection)?;
        if selection != Selection::NeedsLayer {
            return Ok(selection);
        }

        let added = self.registry.add_raw_band_layer(self.api.as_ref(), &file).await;
        match added {
            Ok(layer_id) => {
                self.selection.mark_loaded(&file.id);
                if let Some(extent) = self.registry.get(&layer_id).and_then(|l| l.extent) {
                    self.map.fit_extent(&extent);
                }
                Ok(selection)
            }
            Err(e) => {
                self.selection.rollback(&file.id);
                self.notices.push(Notice::error(format!(
                    "Failed to process {}. {}",
                    file.name,
                    e.user_message()
                )));
                Err(e)
            }
        }
    }

    /// 取消选择；影像波段的图层一并移除
    pub fn deselect_band(&mut self, file_id: &str) -> bool {
        let Some(band) = self.selection.deselect(file_id) else {
            return false;
        };
        if band.file.is_image_band() {
            self.remove_layer_for(band.file.key);
        }
        true
    }

    /// 移除波段：选择与图层都删除
    pub fn remove_band(&mut self, file_id: &str) {
        let key = self
            .selection
            .deselect(file_id)
            .map(|b| b.file.key)
            .unwrap_or_else(|| file_id.to_string());
        self.remove_layer_for(key);
    }

    /// 原始波段图层以对象键为ID
    fn remove_layer_for(&mut self, key: String) {
        let id = LayerId::new(key);
        if self.registry.get(&id).is_some() {
            let _ = self.registry.remove(&id);
        }
    }

    fn find_file(&self, file_id: &str) -> AppResult<FileEntry> {
        let scene = self.scene.as_ref().ok_or(ValidationError::MissingScene)?;
        scene.file(file_id).cloned().ok_or_else(|| {
            ValidationError::FileNotFound {
                id: file_id.to_string(),
            }
            .into()
        })
    }

    // ========== 任务 ==========

    /// 提交波段运算
    pub async fn submit_expression(&mut self, expression: &str) -> AppResult<()> {
        let result = self.orchestrator.submit(expression, self.scene.as_ref()).await;
        if let Err(e) = &result {
            if e.is_local_rejection() {
                self.notices.push(Notice::error(e.user_message()));
            }
        }
        self.notices.extend(self.orchestrator.take_notices());
        result
    }

    /// 驱动当前任务直到终态
    pub async fn run_job(&mut self) -> &Job {
        self.orchestrator.run_to_completion(&mut self.registry).await;
        self.notices.extend(self.orchestrator.take_notices());
        self.orchestrator.job()
    }

    // ========== 图层 ==========

    pub fn change_color_map(&mut self, name: &str) -> AppResult<usize> {
        let changed = self.registry.change_color_map(name);
        self.report(changed)
    }

    /// 绘制表面报告的切片加载失败
    pub fn handle_tile_error(&mut self, handle: SurfaceHandle, url: &str) {
        if let Some(notice) = self.registry.surface_tile_error(handle, url) {
            self.notices.push(notice);
        }
    }

    // ========== 导出 ==========

    /// 按范围导出当前可见图层
    pub async fn export_bbox(&mut self, bbox: &BBox) -> AppResult<ExportArtifact> {
        let artifact =
            export_service::export_bbox(self.api.as_ref(), &self.registry, bbox, &self.config).await;
        self.report(artifact)
    }

    /// 获取整幅镶嵌结果的下载地址
    pub async fn download_mosaic(&mut self) -> AppResult<String> {
        let url = match self.orchestrator.job_id() {
            Some(job_id) => export_service::mosaic_download_url(self.api.as_ref(), job_id).await,
            None => Err(ValidationError::NoActiveJob.into()),
        };
        self.report(url)
    }

    /// 失败时记录一条面向用户的提示
    fn report<T>(&mut self, result: AppResult<T>) -> AppResult<T> {
        if let Err(e) = &result {
            warn!("⚠️ {}", e);
            self.notices.push(Notice::error(e.user_message()));
        }
        result
    }

    // ========== 演示驱动 ==========

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        let prefixes = self.refresh_scenes().await?.to_vec();
        info!("📁 可用场景: {}", prefixes.join(", "));

        let Some(prefix) = self.config.scene_prefix.clone() else {
            warn!("⚠️ 未配置 SCENE_PREFIX，程序结束");
            print_session_state(self.registry.layers(), &self.notices, &self.config.output_log_file);
            return Ok(());
        };
        self.select_scene(&prefix).await?;

        for band_name in self.config.band_names.clone() {
            let file_id = self
                .scene
                .as_ref()
                .and_then(|s| s.files.iter().find(|f| f.name == band_name))
                .map(|f| f.id.clone());
            match file_id {
                Some(id) => {
                    if let Err(e) = self.select_band(&id).await {
                        warn!("⚠️ 选择波段 {} 失败: {}", band_name, e);
                    }
                }
                None => warn!("⚠️ 场景中没有波段: {}", band_name),
            }
        }

        if let Some(expression) = self.config.expression.clone() {
            let formula = {
                let bands = self.selection.loaded_image_bands();
                translate_expression(&expression, bands.first().copied(), bands.get(1).copied())
            };
            info!("🧮 公式: {} → {}", expression, formula);

            if self.submit_expression(&formula).await.is_ok() {
                let job = self.run_job().await;
                print_job_summary(job);
            } else {
                print_job_summary(self.orchestrator.job());
            }
        }

        print_session_state(self.registry.layers(), &self.notices, &self.config.output_log_file);
        Ok(())
    }
}
