//! 地图交互 - 业务能力层
//!
//! - 视图：离散缩放（±1 级）、复位、适配范围，都以固定时长的动画描述返回
//! - 底图：固定目录中切换
//! - 范围框选：一次性捕获，结果通过 [`BBoxCapture`]（单值 future）恰好交付一次

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::models::{BBox, Extent};
use crate::utils::geo::{extent_to_bbox, mercator_to_lonlat, ORIGIN_SHIFT};

pub const DEFAULT_CENTER: (f64, f64) = (78.9629, 20.5937);
pub const DEFAULT_ZOOM: f64 = 4.0;
pub const MIN_ZOOM: f64 = 2.0;
pub const MAX_ZOOM: f64 = 18.0;
/// 适配图层范围时的最大缩放级别
pub const FIT_MAX_ZOOM: f64 = 8.0;

const ZOOM_DURATION: Duration = Duration::from_millis(250);
const RESET_DURATION: Duration = Duration::from_millis(500);
const FIT_DURATION: Duration = Duration::from_millis(1000);
const TILE_SIZE: f64 = 256.0;

/// 底图
#[derive(Debug)]
pub struct Basemap {
    pub name: &'static str,
    pub description: &'static str,
    pub url: &'static str,
}

/// 底图目录
pub static BASEMAPS: phf::Map<&'static str, Basemap> = phf::phf_map! {
    "osm" => Basemap {
        name: "Street Map",
        description: "OpenStreetMap",
        url: "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
    },
    "esriSatellite" => Basemap {
        name: "GSat",
        description: "Esri",
        url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
    },
    "esriStreets" => Basemap {
        name: "GStreets",
        description: "Esri",
        url: "https://server.arcgisonline.com/ArcGIS/rest/services/World_Street_Map/MapServer/tile/{z}/{y}/{x}",
    },
    "googleSatellite" => Basemap {
        name: "Satellite",
        description: "Google Satellite",
        url: "http://mt{0-3}.google.com/vt/lyrs=s&x={x}&y={y}&z={z}",
    },
    "googleHybrid" => Basemap {
        name: "Satellite with Labels",
        description: "Google Hybrid",
        url: "http://mt{0-3}.google.com/vt/lyrs=y&x={x}&y={y}&z={z}",
    },
    "googleStreets" => Basemap {
        name: "Street Map",
        description: "Google Streets",
        url: "http://mt{0-3}.google.com/vt/lyrs=m&x={x}&y={y}&z={z}",
    },
};

/// 视图状态（中心为经纬度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewState {
    pub center: (f64, f64),
    pub zoom: f64,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// 一次视图动画
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewAnimation {
    pub from: ViewState,
    pub to: ViewState,
    pub duration: Duration,
}

/// 框选状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Inactive,
    Drawing,
}

/// 框选结果，完成时得到 `Some(bbox)`，被取消时得到 `None`
pub struct BBoxCapture {
    rx: oneshot::Receiver<BBox>,
}

impl Future for BBoxCapture {
    type Output = Option<BBox>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|r| r.ok())
    }
}

pub struct MapInteractionController {
    view: ViewState,
    viewport: (f64, f64),
    basemap: &'static str,
    capture: Option<oneshot::Sender<BBox>>,
    draft: Option<Extent>,
}

impl Default for MapInteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl MapInteractionController {
    pub fn new() -> Self {
        Self {
            view: ViewState::default(),
            viewport: (1024.0, 768.0),
            basemap: "osm",
            capture: None,
            draft: None,
        }
    }

    pub fn view(&self) -> ViewState {
        self.view
    }

    // ========== 视图 ==========

    pub fn zoom_in(&mut self) -> ViewAnimation {
        let to = ViewState {
            zoom: clamp_zoom(self.view.zoom + 1.0),
            ..self.view
        };
        self.animate_to(to, ZOOM_DURATION)
    }

    pub fn zoom_out(&mut self) -> ViewAnimation {
        let to = ViewState {
            zoom: clamp_zoom(self.view.zoom - 1.0),
            ..self.view
        };
        self.animate_to(to, ZOOM_DURATION)
    }

    pub fn reset_view(&mut self) -> ViewAnimation {
        self.animate_to(ViewState::default(), RESET_DURATION)
    }

    /// 适配到 Web Mercator 范围，最大缩放到 [`FIT_MAX_ZOOM`]
    pub fn fit_extent(&mut self, extent: &Extent) -> ViewAnimation {
        let (cx, cy) = extent.center();
        let world = 2.0 * ORIGIN_SHIFT;
        let zoom_for = |pixels: f64, span: f64| {
            if span <= 0.0 {
                f64::INFINITY
            } else {
                (pixels * world / (TILE_SIZE * span)).log2()
            }
        };
        let zoom = zoom_for(self.viewport.0, extent.width())
            .min(zoom_for(self.viewport.1, extent.height()))
            .min(FIT_MAX_ZOOM);

        let to = ViewState {
            center: mercator_to_lonlat(cx, cy),
            zoom: clamp_zoom(zoom),
        };
        self.animate_to(to, FIT_DURATION)
    }

    fn animate_to(&mut self, to: ViewState, duration: Duration) -> ViewAnimation {
        let from = self.view;
        self.view = to;
        debug!("视图动画: zoom {} -> {} ({:?})", from.zoom, to.zoom, duration);
        ViewAnimation { from, to, duration }
    }

    // ========== 底图 ==========

    pub fn basemap(&self) -> &'static str {
        self.basemap
    }

    pub fn set_basemap(&mut self, key: &str) -> AppResult<&'static Basemap> {
        let (known_key, basemap) = BASEMAPS
            .get_entry(key)
            .ok_or_else(|| AppError::Other(format!("未知底图: {}", key)))?;
        self.basemap = *known_key;
        info!("🗺️ 切换底图: {} ({})", basemap.name, basemap.description);
        Ok(basemap)
    }

    // ========== 范围框选 ==========

    pub fn capture_state(&self) -> CaptureState {
        if self.capture.is_some() {
            CaptureState::Drawing
        } else {
            CaptureState::Inactive
        }
    }

    pub fn draft(&self) -> Option<&Extent> {
        self.draft.as_ref()
    }

    /// 开始框选：清除之前的几何，旧的未完成捕获以 `None` 结束
    pub fn enable_bbox_capture(&mut self) -> BBoxCapture {
        let (tx, rx) = oneshot::channel();
        self.draft = None;
        self.capture = Some(tx);
        debug!("开始框选");
        BBoxCapture { rx }
    }

    /// 拖动过程中更新草稿（工作投影 EPSG:3857 下的两个角点）
    pub fn update_draft(&mut self, corner_a: (f64, f64), corner_b: (f64, f64)) {
        if self.capture.is_none() {
            return;
        }
        self.draft = Some(Extent {
            min_x: corner_a.0.min(corner_b.0),
            min_y: corner_a.1.min(corner_b.1),
            max_x: corner_a.0.max(corner_b.0),
            max_y: corner_a.1.max(corner_b.1),
        });
    }

    /// 手势完成：转换为经纬度并交付，随后自动结束框选并丢弃草稿
    pub fn complete_gesture(&mut self) -> Option<BBox> {
        if self.capture.is_none() || self.draft.is_none() {
            return None;
        }
        let sender = self.capture.take()?;
        let extent = self.draft.take()?;
        let bbox = extent_to_bbox(&extent);
        info!("📐 框选完成: {}", bbox.to_param_string());
        let _ = sender.send(bbox);
        Some(bbox)
    }

    /// 强制结束框选并清除几何；未在框选时无任何效果
    pub fn disable_bbox_capture(&mut self) {
        if self.capture.take().is_some() {
            debug!("取消框选");
        }
        self.draft = None;
    }
}

fn clamp_zoom(zoom: f64) -> f64 {
    zoom.clamp(MIN_ZOOM, MAX_ZOOM)
}
