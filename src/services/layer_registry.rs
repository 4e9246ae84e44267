//! 图层注册表 - 业务能力层
//!
//! 职责：
//! - 维护有序的渲染图层快照（原始波段 / 工作流结果）
//! - 保证任意时刻最多一个图层可见
//! - 管理不透明度、视觉调整与色带
//!
//! 注册表只保存纯数据；每次变更后交给 [`SurfaceAdapter`] 与绘制表面协调。
//! 各条流程（波段加载、任务完成、手动切换）交错修改注册表，因此每个变更点都从头重建"单一可见"约束。

use tracing::{debug, info, warn};

use crate::clients::WorkflowApi;
use crate::config::Config;
use crate::error::{AppResult, ValidationError};
use crate::infrastructure::{RenderSurface, SurfaceAdapter, SurfaceHandle};
use crate::models::{BBox, FileEntry, FilterValues, LayerId, LayerSource, Notice, RenderLayer};
use crate::services::render_pipeline::layer_opacity;
use crate::utils::geo::bbox_to_extent;
use crate::utils::tile_url::{raw_band_tile_url, set_query_param};

/// 支持的色带
pub static COLOR_MAPS: phf::Set<&'static str> = phf::phf_set! {
    "viridis", "inferno", "plasma", "magma", "hot", "cool", "rainbow", "jet",
};

pub fn is_valid_color_map(name: &str) -> bool {
    COLOR_MAPS.contains(name)
}

const RAW_BAND_OPACITY: f64 = 0.8;
const RESULT_OPACITY: f64 = 1.0;

pub struct LayerRegistry {
    layers: Vec<RenderLayer>,
    adapter: SurfaceAdapter,
    titiler_base_url: String,
    tile_path: String,
    reference_bbox: BBox,
    color_map: String,
}

impl LayerRegistry {
    pub fn new(config: &Config, surface: Box<dyn RenderSurface>) -> AppResult<Self> {
        let reference_bbox = BBox::parse(&config.reference_bbox)?;
        if !is_valid_color_map(&config.default_colormap) {
            return Err(ValidationError::UnknownColorMap {
                name: config.default_colormap.clone(),
            }
            .into());
        }
        Ok(Self {
            layers: Vec::new(),
            adapter: SurfaceAdapter::new(surface),
            titiler_base_url: config.titiler_api_base_url.clone(),
            tile_path: config.tile_path_template.clone(),
            reference_bbox,
            color_map: config.default_colormap.clone(),
        })
    }

    // ========== 查询 ==========

    pub fn layers(&self) -> &[RenderLayer] {
        &self.layers
    }

    pub fn get(&self, id: &LayerId) -> Option<&RenderLayer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn visible_count(&self) -> usize {
        self.layers.iter().filter(|l| l.visible).count()
    }

    /// 当前可见的图层
    pub fn active_layer(&self) -> Option<&RenderLayer> {
        self.layers.iter().find(|l| l.visible)
    }

    pub fn color_map(&self) -> &str {
        &self.color_map
    }

    pub fn reference_bbox(&self) -> &BBox {
        &self.reference_bbox
    }

    // ========== 新增 ==========

    /// 为原始波段创建图层
    ///
    /// 先获取预签名地址（失败时不修改任何状态），再隐藏其余图层并追加为唯一可见图层。
    /// 同一对象键的旧图层会被替换。
    pub async fn add_raw_band_layer(
        &mut self,
        api: &dyn WorkflowApi,
        band: &FileEntry,
    ) -> AppResult<LayerId> {
        let presigned_url = api.presign(&band.key).await?;
        let tile_url = raw_band_tile_url(
            &self.titiler_base_url,
            &self.tile_path,
            &presigned_url,
            &self.color_map,
            &self.reference_bbox,
        );

        let id = LayerId::new(band.key.clone());
        self.layers.retain(|l| l.id != id);
        self.hide_all();
        self.layers.push(RenderLayer {
            id: id.clone(),
            name: format!("{} (India Crop)", band.name),
            source: LayerSource::RawBand {
                key: band.key.clone(),
                presigned_url,
                tile_url,
            },
            visible: true,
            opacity: RAW_BAND_OPACITY,
            filter_values: FilterValues::default(),
            extent: Some(bbox_to_extent(&self.reference_bbox)),
        });
        self.sync();

        info!("🗺️ 已添加波段图层: {}", band.name);
        Ok(id)
    }

    /// 添加工作流结果图层（瓦片地址已写好色带与 rescale）
    pub fn add_workflow_result_layer(
        &mut self,
        job_id: Option<&str>,
        tile_url: String,
        rescale: Option<String>,
    ) -> LayerId {
        let id = self.next_result_id();
        self.hide_all();
        self.layers.push(RenderLayer {
            id: id.clone(),
            name: "Workflow Result".to_string(),
            source: LayerSource::WorkflowResult {
                job_id: job_id.map(str::to_string),
                tile_url,
                rescale,
            },
            visible: true,
            opacity: RESULT_OPACITY,
            filter_values: FilterValues::default(),
            extent: Some(bbox_to_extent(&self.reference_bbox)),
        });
        self.sync();

        info!("🗺️ 已添加结果图层: {}", id);
        id
    }

    // ========== 变更 ==========

    /// 切换可见性：先隐藏所有图层，再翻转目标图层
    ///
    /// 关闭唯一可见的图层后不会自动选择其他图层
    pub fn toggle_visibility(&mut self, id: &LayerId) -> AppResult<bool> {
        let index = self.index_of(id)?;
        let was_visible = self.layers[index].visible;
        self.hide_all();
        self.layers[index].visible = !was_visible;
        self.sync();
        Ok(!was_visible)
    }

    /// 设置不透明度，与可见性无关
    pub fn update_opacity(&mut self, id: &LayerId, value: f64) -> AppResult<()> {
        if !(0.0..=1.0).contains(&value) {
            return Err(ValidationError::OpacityOutOfRange { value }.into());
        }
        let index = self.index_of(id)?;
        self.layers[index].opacity = value;
        self.sync();
        Ok(())
    }

    /// 应用视觉调整：保存参数并按透明度设置不透明度
    pub fn apply_effect(&mut self, id: &LayerId, values: FilterValues) -> AppResult<()> {
        let index = self.index_of(id)?;
        let values = values.clamped();
        let layer = &mut self.layers[index];
        layer.filter_values = values;
        layer.opacity = layer_opacity(&values);
        debug!("图层 {} 应用调整: {:?}", id, values);
        self.sync();
        Ok(())
    }

    /// 移除图层，可能导致没有可见图层
    pub fn remove(&mut self, id: &LayerId) -> AppResult<RenderLayer> {
        let index = self.index_of(id)?;
        let removed = self.layers.remove(index);
        self.sync();
        info!("🗑️ 已移除图层: {}", removed.name);
        Ok(removed)
    }

    /// 移除全部图层（场景重置）
    pub fn clear(&mut self) {
        if !self.layers.is_empty() {
            info!("🧹 清空 {} 个图层", self.layers.len());
        }
        self.layers.clear();
        self.sync();
    }

    /// 切换色带：原位改写所有原始波段图层的 `colormap_name` 并刷新数据源
    ///
    /// 结果图层只在构建时写入色带，这里不改动
    pub fn change_color_map(&mut self, name: &str) -> AppResult<usize> {
        if !is_valid_color_map(name) {
            return Err(ValidationError::UnknownColorMap {
                name: name.to_string(),
            }
            .into());
        }
        self.color_map = name.to_string();

        let mut rewritten = 0;
        for layer in &mut self.layers {
            if let LayerSource::RawBand { tile_url, .. } = &mut layer.source {
                *tile_url = set_query_param(tile_url, "colormap_name", name);
                rewritten += 1;
            }
        }
        self.sync();

        info!("🎨 色带切换为 {}，已刷新 {} 个波段图层", name, rewritten);
        Ok(rewritten)
    }

    // ========== 切片错误 ==========

    /// 切片加载失败：图层保留，返回非致命提示
    pub fn tile_error(&self, id: &LayerId, url: &str) -> Option<Notice> {
        let layer = self.get(id)?;
        warn!("⚠️ 图层 {} 切片加载失败: {}", layer.name, url);
        Some(Notice::warning(format!(
            "图层 {} 的部分切片加载失败，显示可能不完整",
            layer.name
        )))
    }

    /// 绘制表面按句柄报告的切片错误
    pub fn surface_tile_error(&self, handle: SurfaceHandle, url: &str) -> Option<Notice> {
        let id = self.adapter.layer_for_handle(handle)?.clone();
        self.tile_error(&id, url)
    }

    // ========== 内部 ==========

    fn index_of(&self, id: &LayerId) -> AppResult<usize> {
        self.layers
            .iter()
            .position(|l| &l.id == id)
            .ok_or_else(|| {
                ValidationError::LayerNotFound {
                    id: id.to_string(),
                }
                .into()
            })
    }

    fn hide_all(&mut self) {
        for layer in &mut self.layers {
            layer.visible = false;
        }
    }

    /// 从头重建约束并与表面协调
    fn sync(&mut self) {
        let mut seen_visible = false;
        for layer in self.layers.iter_mut().rev() {
            if layer.visible {
                if seen_visible {
                    layer.visible = false;
                }
                seen_visible = true;
            }
        }
        self.adapter.reconcile(&self.layers);
    }

    fn next_result_id(&self) -> LayerId {
        let mut millis = chrono::Local::now().timestamp_millis();
        loop {
            let id = LayerId::new(format!("math-{}", millis));
            if self.get(&id).is_none() {
                return id;
            }
            millis += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::HeadlessSurface;

    fn registry() -> (LayerRegistry, HeadlessSurface) {
        let surface = HeadlessSurface::new();
        let registry = LayerRegistry::new(&Config::default(), Box::new(surface.clone())).unwrap();
        (registry, surface)
    }

    #[test]
    fn test_result_layer_hides_others() {
        let (mut registry, surface) = registry();
        let a = registry.add_workflow_result_layer(Some("j1"), "http://t/a".into(), None);
        let b = registry.add_workflow_result_layer(Some("j2"), "http://t/b".into(), None);

        assert_ne!(a, b);
        assert_eq!(registry.visible_count(), 1);
        assert_eq!(registry.active_layer().unwrap().id, b);
        assert_eq!(surface.visible_count(), 1);
    }

    #[test]
    fn test_toggle_sole_visible_layer_leaves_none() {
        let (mut registry, _) = registry();
        let a = registry.add_workflow_result_layer(None, "http://t/a".into(), None);

        assert!(!registry.toggle_visibility(&a).unwrap());
        assert_eq!(registry.visible_count(), 0);
        assert!(registry.active_layer().is_none());
    }

    #[test]
    fn test_opacity_range_is_enforced() {
        let (mut registry, _) = registry();
        let a = registry.add_workflow_result_layer(None, "http://t/a".into(), None);

        assert!(registry.update_opacity(&a, 0.0).is_ok());
        assert!(registry.update_opacity(&a, 1.0).is_ok());
        let err = registry.update_opacity(&a, 1.5).unwrap_err();
        assert!(err.is_local_rejection());
        assert_eq!(registry.get(&a).unwrap().opacity, 1.0);
    }

    #[test]
    fn test_apply_effect_sets_opacity_from_transparency() {
        let (mut registry, surface) = registry();
        let a = registry.add_workflow_result_layer(None, "http://t/a".into(), None);

        let values = FilterValues {
            transparency: 40.0,
            contrast: 10.0,
            ..Default::default()
        };
        registry.apply_effect(&a, values).unwrap();

        let layer = registry.get(&a).unwrap();
        assert_eq!(layer.opacity, 0.4);
        let (_, state) = surface.layers().into_iter().next().unwrap();
        assert_eq!(state.spec.opacity, 0.4);
        assert_eq!(state.redraws, 1);
    }

    #[test]
    fn test_unknown_color_map_is_rejected() {
        let (mut registry, _) = registry();
        assert!(registry.change_color_map("sepia").is_err());
        assert_eq!(registry.color_map(), "viridis");
    }

    #[test]
    fn test_tile_error_keeps_layer() {
        let (mut registry, _) = registry();
        let a = registry.add_workflow_result_layer(None, "http://t/a".into(), None);

        let notice = registry.tile_error(&a, "http://t/a/1/2/3.png").unwrap();
        assert!(notice.is_warning());
        assert_eq!(registry.len(), 1);
        assert!(registry.tile_error(&LayerId::from("missing"), "x").is_none());
    }
}
