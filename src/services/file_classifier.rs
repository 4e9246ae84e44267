//! 文件分类与元数据推导 - 业务能力层
//!
//! 纯函数：输入文件名与归一化清单，输出分类 / 元数据。不会失败，不做任何 IO。
//!
//! 判定顺序：
//! 1. 清单声明（根级分组 → `files` 嵌套分组）
//! 2. 有清单时，清单类文件本身归为 overview
//! 3. [`HEURISTICS`] 中按顺序的文件名规则
//! 4. 都不匹配时为 other

use crate::models::loaders::Manifest;
use crate::models::{FileCategory, FileMetadata};

/// 一条文件名规则（输入为小写文件名）
pub struct HeuristicRule {
    pub name: &'static str,
    pub matches: fn(&str) -> bool,
    pub category: FileCategory,
}

fn looks_like_raster(name: &str) -> bool {
    name.contains("img_") || name.contains("band") || name.ends_with(".tif") || name.ends_with(".tiff")
}

fn contains_any(name: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| name.contains(n))
}

/// 文件名规则，按顺序匹配，第一条命中即返回
pub const HEURISTICS: &[HeuristicRule] = &[
    HeuristicRule {
        name: "raster-geolocation",
        matches: |n| looks_like_raster(n) && contains_any(n, &["latitude", "longitude", "geo"]),
        category: FileCategory::Geolocation,
    },
    HeuristicRule {
        name: "raster-auxiliary",
        matches: |n| looks_like_raster(n) && contains_any(n, &["azimuth", "elevation", "aux"]),
        category: FileCategory::Auxiliary,
    },
    HeuristicRule {
        name: "raster-band",
        matches: looks_like_raster,
        category: FileCategory::ImageBands,
    },
    HeuristicRule {
        name: "geolocation",
        matches: |n| contains_any(n, &["latitude", "longitude", "geolocation"]),
        category: FileCategory::Geolocation,
    },
    HeuristicRule {
        name: "auxiliary",
        matches: |n| contains_any(n, &["azimuth", "elevation", ".aux"]),
        category: FileCategory::Auxiliary,
    },
    HeuristicRule {
        name: "overview",
        matches: |n| {
            n == "manifest"
                || contains_any(n, &["overview", "mtl"])
                || n.ends_with(".txt")
                || n.ends_with(".json")
        },
        category: FileCategory::Overview,
    },
];

/// 文件名关键字 → 默认描述，按顺序匹配
const FALLBACK_DESCRIPTIONS: [(&str, &str); 8] = [
    ("img_vis", "Visible Band"),
    ("img_mir", "Mid-Infrared"),
    ("img_tir1", "Thermal Infrared 1"),
    ("img_tir2", "Thermal Infrared 2"),
    ("img_nir", "Near-Infrared"),
    ("latitude", "Latitude"),
    ("longitude", "Longitude"),
    ("sun_azimuth", "Sun Azimuth Angle"),
];

/// 对单个文件分类
pub fn classify(file_name: &str, manifest: Option<&Manifest>) -> FileCategory {
    let name = file_name.to_lowercase();

    if let Some(manifest) = manifest {
        if let Some(category) = manifest.declared_category(file_name) {
            return category;
        }
        if name.contains("manifest") || name.contains("mtl") || name.ends_with(".txt") {
            return FileCategory::Overview;
        }
    }

    HEURISTICS
        .iter()
        .find(|rule| (rule.matches)(&name))
        .map(|rule| rule.category)
        .unwrap_or(FileCategory::Other)
}

/// 推导文件元数据
pub fn extract_metadata(file_name: &str, manifest: Option<&Manifest>) -> FileMetadata {
    let mut metadata = FileMetadata::default();

    if let Some(manifest) = manifest {
        if let Some(info) = manifest.file_info(file_name) {
            metadata.description = info.description.clone();
            metadata.band_number = info.band_number.clone();
            metadata.wavelength = info.wavelength.clone();
        }
        let scene = manifest.scene_fields();
        metadata.satellite = scene.satellite.clone();
        metadata.acquisition_date = scene.acquisition_date.clone();
        metadata.cloud_cover = scene.cloud_cover.clone();
    }

    if metadata.description.is_none() {
        let name = file_name.to_lowercase();
        metadata.description = FALLBACK_DESCRIPTIONS
            .iter()
            .find(|(needle, _)| name.contains(needle))
            .map(|(_, desc)| desc.to_string());
    }

    metadata
}
