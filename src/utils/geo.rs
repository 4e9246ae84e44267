//! WGS84 (EPSG:4326) 与 Web Mercator (EPSG:3857) 之间的坐标换算

use std::f64::consts::PI;

use crate::models::{BBox, Extent};

/// Web Mercator 半周长（米）
pub const ORIGIN_SHIFT: f64 = 20037508.34;

pub fn lonlat_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * ORIGIN_SHIFT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    (x, y * ORIGIN_SHIFT / 180.0)
}

pub fn mercator_to_lonlat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / ORIGIN_SHIFT) * 180.0;
    let lat = (y / ORIGIN_SHIFT) * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

/// WGS84 范围 → Web Mercator 范围
pub fn bbox_to_extent(bbox: &BBox) -> Extent {
    let (min_x, min_y) = lonlat_to_mercator(bbox.min_lon, bbox.min_lat);
    let (max_x, max_y) = lonlat_to_mercator(bbox.max_lon, bbox.max_lat);
    Extent {
        min_x,
        min_y,
        max_x,
        max_y,
    }
}

/// Web Mercator 范围 → WGS84 范围（角点顺序不限）
pub fn extent_to_bbox(extent: &Extent) -> BBox {
    let (lon_a, lat_a) = mercator_to_lonlat(extent.min_x, extent.min_y);
    let (lon_b, lat_b) = mercator_to_lonlat(extent.max_x, extent.max_y);
    BBox::new(
        lon_a.min(lon_b),
        lat_a.min(lat_b),
        lon_a.max(lon_b),
        lat_a.max(lat_b),
    )
}
