//! 图层快照与绘制表面之间的协调器
//!
//! 图层注册表只维护纯数据快照；适配器是唯一持有 [`SurfaceHandle`] 的地方，
//! 每次变更后把快照与表面逐项比对，只下发有差异的操作。

use std::collections::HashMap;

use tracing::debug;

use crate::infrastructure::render_surface::{RenderSurface, SurfaceHandle, TileLayerSpec};
use crate::models::{LayerId, RenderLayer};

struct Mirrored {
    handle: SurfaceHandle,
    applied: RenderLayer,
}

pub struct SurfaceAdapter {
    surface: Box<dyn RenderSurface>,
    mirrored: HashMap<LayerId, Mirrored>,
}

impl SurfaceAdapter {
    pub fn new(surface: Box<dyn RenderSurface>) -> Self {
        Self {
            surface,
            mirrored: HashMap::new(),
        }
    }

    /// 使表面与快照一致
    pub fn reconcile(&mut self, layers: &[RenderLayer]) {
        let stale: Vec<LayerId> = self
            .mirrored
            .keys()
            .filter(|id| !layers.iter().any(|l| &l.id == *id))
            .cloned()
            .collect();
        for id in stale {
            if let Some(m) = self.mirrored.remove(&id) {
                debug!("表面移除图层 {}", id);
                self.surface.remove_layer(m.handle);
            }
        }

        for layer in layers {
            match self.mirrored.get_mut(&layer.id) {
                None => {
                    let handle = self.surface.add_tile_layer(&TileLayerSpec {
                        name: layer.name.clone(),
                        url: layer.tile_url().to_string(),
                        visible: layer.visible,
                        opacity: layer.opacity,
                        extent: layer.extent,
                    });
                    debug!("表面新增图层 {} -> {:?}", layer.id, handle);
                    self.mirrored.insert(
                        layer.id.clone(),
                        Mirrored {
                            handle,
                            applied: layer.clone(),
                        },
                    );
                }
                Some(m) => {
                    let handle = m.handle;
                    if m.applied.tile_url() != layer.tile_url() {
                        self.surface.set_source_url(handle, layer.tile_url());
                        self.surface.refresh_source(handle);
                    }
                    if m.applied.visible != layer.visible {
                        self.surface.set_visible(handle, layer.visible);
                    }
                    if m.applied.opacity != layer.opacity {
                        self.surface.set_opacity(handle, layer.opacity);
                    }
                    if m.applied.filter_values != layer.filter_values {
                        self.surface.request_redraw(handle);
                    }
                    m.applied = layer.clone();
                }
            }
        }
    }

    /// 表面报告的句柄对应的图层
    pub fn layer_for_handle(&self, handle: SurfaceHandle) -> Option<&LayerId> {
        self.mirrored
            .iter()
            .find(|(_, m)| m.handle == handle)
            .map(|(id, _)| id)
    }

    pub fn handle_of(&self, id: &LayerId) -> Option<SurfaceHandle> {
        self.mirrored.get(id).map(|m| m.handle)
    }

    pub fn mirrored_count(&self) -> usize {
        self.mirrored.len()
    }
}
