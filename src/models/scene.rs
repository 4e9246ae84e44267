use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 文件分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Overview,
    Auxiliary,
    Geolocation,
    ImageBands,
    Other,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileCategory::Overview => "overview",
            FileCategory::Auxiliary => "auxiliary",
            FileCategory::Geolocation => "geolocation",
            FileCategory::ImageBands => "image_bands",
            FileCategory::Other => "other",
        }
    }
}

impl std::fmt::Display for FileCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 从清单或文件名推导出的文件元数据
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub description: Option<String>,
    pub band_number: Option<String>,
    pub wavelength: Option<String>,
    pub satellite: Option<String>,
    pub acquisition_date: Option<String>,
    pub cloud_cover: Option<String>,
}

/// 场景中的单个对象
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    /// 与远程对象键相同
    pub id: String,
    pub key: String,
    /// 显示名称（键的最后一段）
    pub name: String,
    pub size: u64,
    pub category: FileCategory,
    pub metadata: FileMetadata,
}

impl FileEntry {
    /// 是否为可直接加载为切片图层的 GeoTIFF
    pub fn is_tiff(&self) -> bool {
        let lower = self.name.to_lowercase();
        lower.ends_with(".tif") || lower.ends_with(".tiff")
    }

    /// 去掉扩展名的文件名
    pub fn stem(&self) -> &str {
        match self.name.rfind('.') {
            Some(pos) if pos > 0 => &self.name[..pos],
            _ => &self.name,
        }
    }

    pub fn is_image_band(&self) -> bool {
        self.category == FileCategory::ImageBands
    }
}

/// 当前会话的场景
///
/// 重新选择场景时整体替换
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub files: Vec<FileEntry>,
    /// 原始清单（不透明树），读取失败时为 None
    pub manifest: Option<JsonValue>,
    pub created_at: DateTime<Local>,
}

impl Scene {
    pub fn file(&self, id: &str) -> Option<&FileEntry> {
        self.files.iter().find(|f| f.id == id)
    }

    pub fn files_in(&self, category: FileCategory) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(move |f| f.category == category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> FileEntry {
        FileEntry {
            id: format!("scene/{}", name),
            key: format!("scene/{}", name),
            name: name.to_string(),
            size: 0,
            category: FileCategory::ImageBands,
            metadata: FileMetadata::default(),
        }
    }

    #[test]
    fn test_tiff_detection_is_case_insensitive() {
        assert!(entry("IMG_VIS.TIF").is_tiff());
        assert!(entry("img_nir.tiff").is_tiff());
        assert!(!entry("img_nir.h5").is_tiff());
    }

    #[test]
    fn test_stem_strips_last_extension() {
        assert_eq!(entry("img_vis.tif").stem(), "img_vis");
        assert_eq!(entry("archive.tar.gz").stem(), "archive.tar");
        assert_eq!(entry("README").stem(), "README");
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&FileCategory::ImageBands).unwrap();
        assert_eq!(json, "\"image_bands\"");
    }
}
