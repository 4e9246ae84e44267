//! 绘制表面 - 基础设施层
//!
//! 实际的地图渲染（切片图层、画布）由外部宿主提供。这里只定义两条接缝：
//! - [`RenderSurface`]：图层级的增删改
//! - [`DrawContext`]：单次绘制时的画布状态（滤镜与 save/restore）
//!
//! [`HeadlessSurface`] 与 [`RecordingContext`] 是无界面实现，供演示驱动与测试使用。

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::models::Extent;

/// 表面上的图层句柄，只有 `SurfaceAdapter` 持有
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceHandle(pub u64);

/// 创建切片图层所需的参数
#[derive(Debug, Clone, PartialEq)]
pub struct TileLayerSpec {
    pub name: String,
    pub url: String,
    pub visible: bool,
    pub opacity: f64,
    pub extent: Option<Extent>,
}

/// 图层级绘制表面
pub trait RenderSurface: Send {
    fn add_tile_layer(&mut self, spec: &TileLayerSpec) -> SurfaceHandle;
    fn remove_layer(&mut self, handle: SurfaceHandle);
    fn set_visible(&mut self, handle: SurfaceHandle, visible: bool);
    fn set_opacity(&mut self, handle: SurfaceHandle, opacity: f64);
    fn set_source_url(&mut self, handle: SurfaceHandle, url: &str);
    /// 重新拉取切片
    fn refresh_source(&mut self, handle: SurfaceHandle);
    /// 只重绘（滤镜变化）
    fn request_redraw(&mut self, handle: SurfaceHandle);
}

/// 单次绘制的画布状态
pub trait DrawContext {
    fn save(&mut self);
    fn set_filter(&mut self, filter: &str);
    fn restore(&mut self);
}

// ========== 无界面实现 ==========

/// 表面上一个图层的当前状态
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayer {
    pub spec: TileLayerSpec,
    pub refreshes: u32,
    pub redraws: u32,
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_handle: u64,
    layers: BTreeMap<SurfaceHandle, SurfaceLayer>,
    removed: Vec<SurfaceHandle>,
}

/// 内存中的绘制表面
///
/// 克隆共享同一份状态，便于在交给适配器之后继续检查
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    state: Arc<Mutex<HeadlessState>>,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut HeadlessState) -> R) -> R {
        let mut guard = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut guard)
    }

    fn with_layer(&self, handle: SurfaceHandle, f: impl FnOnce(&mut SurfaceLayer)) {
        self.with_state(|s| {
            if let Some(layer) = s.layers.get_mut(&handle) {
                f(layer);
            }
        });
    }

    pub fn layers(&self) -> Vec<(SurfaceHandle, SurfaceLayer)> {
        self.with_state(|s| s.layers.iter().map(|(h, l)| (*h, l.clone())).collect())
    }

    pub fn layer(&self, handle: SurfaceHandle) -> Option<SurfaceLayer> {
        self.with_state(|s| s.layers.get(&handle).cloned())
    }

    pub fn layer_count(&self) -> usize {
        self.with_state(|s| s.layers.len())
    }

    pub fn visible_count(&self) -> usize {
        self.with_state(|s| s.layers.values().filter(|l| l.spec.visible).count())
    }

    pub fn removed(&self) -> Vec<SurfaceHandle> {
        self.with_state(|s| s.removed.clone())
    }
}

impl RenderSurface for HeadlessSurface {
    fn add_tile_layer(&mut self, spec: &TileLayerSpec) -> SurfaceHandle {
        self.with_state(|s| {
            s.next_handle += 1;
            let handle = SurfaceHandle(s.next_handle);
            s.layers.insert(
                handle,
                SurfaceLayer {
                    spec: spec.clone(),
                    refreshes: 0,
                    redraws: 0,
                },
            );
            handle
        })
    }

    fn remove_layer(&mut self, handle: SurfaceHandle) {
        self.with_state(|s| {
            if s.layers.remove(&handle).is_some() {
                s.removed.push(handle);
            }
        });
    }

    fn set_visible(&mut self, handle: SurfaceHandle, visible: bool) {
        self.with_layer(handle, |l| l.spec.visible = visible);
    }

    fn set_opacity(&mut self, handle: SurfaceHandle, opacity: f64) {
        self.with_layer(handle, |l| l.spec.opacity = opacity);
    }

    fn set_source_url(&mut self, handle: SurfaceHandle, url: &str) {
        self.with_layer(handle, |l| l.spec.url = url.to_string());
    }

    fn refresh_source(&mut self, handle: SurfaceHandle) {
        self.with_layer(handle, |l| l.refreshes += 1);
    }

    fn request_redraw(&mut self, handle: SurfaceHandle) {
        self.with_layer(handle, |l| l.redraws += 1);
    }
}

/// 画布操作记录
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Save,
    Filter(String),
    Draw(String),
    Restore,
}

#[derive(Debug, Clone, PartialEq)]
struct CanvasState {
    filter: String,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            filter: "none".to_string(),
        }
    }
}

/// 记录所有画布操作的绘制上下文
#[derive(Debug, Default)]
pub struct RecordingContext {
    ops: Vec<DrawOp>,
    current: CanvasState,
    stack: Vec<CanvasState>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以当前状态绘制一次
    pub fn draw(&mut self, label: &str) {
        self.ops.push(DrawOp::Draw(label.to_string()));
    }

    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    pub fn current_filter(&self) -> &str {
        &self.current.filter
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

impl DrawContext for RecordingContext {
    fn save(&mut self) {
        self.ops.push(DrawOp::Save);
        self.stack.push(self.current.clone());
    }

    fn set_filter(&mut self, filter: &str) {
        self.ops.push(DrawOp::Filter(filter.to_string()));
        self.current.filter = filter.to_string();
    }

    fn restore(&mut self) {
        self.ops.push(DrawOp::Restore);
        if let Some(previous) = self.stack.pop() {
            self.current = previous;
        }
    }
}
