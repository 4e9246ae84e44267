//! 场景清单加载
//!
//! 清单可能是 JSON（对象或字符串）或 Landsat 风格的 `KEY = "VALUE"` 文本。
//! 无论原始形态如何，都先归一化为 [`Manifest`]，分类与元数据提取只读取这个中间表示。

use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Number, Value as JsonValue};

use crate::error::AppResult;
use crate::models::scene::FileCategory;

/// 清单文件名后缀（小写比较）
const MANIFEST_SUFFIXES: [&str; 3] = ["manifest.json", "metadata.json", "mtl.txt"];

/// 根级分组键
const ROOT_SECTIONS: [(&str, FileCategory); 4] = [
    ("image_bands", FileCategory::ImageBands),
    ("geolocation_data", FileCategory::Geolocation),
    ("auxiliary_data", FileCategory::Auxiliary),
    ("overview_metadata", FileCategory::Overview),
];

/// `files` 下的嵌套分组键
const NESTED_SECTIONS: [(&str, FileCategory); 4] = [
    ("image_bands", FileCategory::ImageBands),
    ("geolocation", FileCategory::Geolocation),
    ("auxiliary", FileCategory::Auxiliary),
    ("overview", FileCategory::Overview),
];

/// 判断对象键是否为清单文件
pub fn is_manifest_key(key: &str) -> bool {
    let lower = key.to_lowercase();
    MANIFEST_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// 解析读取代理返回的 `data` 字段
///
/// - 对象：原样使用
/// - 字符串：`.txt` 按 MTL 解析，其余按 JSON 解析
/// - 其他：视为没有清单
pub fn decode_manifest(key: &str, data: JsonValue) -> AppResult<Option<JsonValue>> {
    match data {
        JsonValue::Object(_) => Ok(Some(data)),
        JsonValue::String(text) => {
            if key.to_lowercase().ends_with(".txt") {
                Ok(Some(parse_mtl(&text)))
            } else {
                Ok(Some(serde_json::from_str(&text)?))
            }
        }
        _ => Ok(None),
    }
}

/// 解析 `KEY = VALUE` 文本
///
/// 去掉所有双引号；不含 `-` 的数值转为数字（日期等保持字符串）
pub fn parse_mtl(content: &str) -> JsonValue {
    let mut map = Map::new();
    let Ok(line_re) = Regex::new(r"^\s*(\w+)\s*=\s*(.+)$") else {
        return JsonValue::Object(map);
    };

    for line in content.lines() {
        if let Some(caps) = line_re.captures(line) {
            let key = caps[1].trim().to_string();
            let value = caps[2].trim().replace('"', "");
            map.insert(key, coerce_mtl_value(value));
        }
    }

    JsonValue::Object(map)
}

fn coerce_mtl_value(value: String) -> JsonValue {
    if value.is_empty() || value.contains('-') {
        return JsonValue::String(value);
    }
    if let Ok(n) = value.parse::<i64>() {
        return JsonValue::Number(n.into());
    }
    if let Some(n) = value.parse::<f64>().ok().and_then(Number::from_f64) {
        return JsonValue::Number(n);
    }
    JsonValue::String(value)
}

/// 清单中单个文件的描述信息
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManifestFileInfo {
    pub description: Option<String>,
    pub band_number: Option<String>,
    pub wavelength: Option<String>,
}

/// 场景级字段
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneFields {
    pub satellite: Option<String>,
    pub acquisition_date: Option<String>,
    pub cloud_cover: Option<String>,
}

/// 归一化后的清单
///
/// `declarations` 按检查顺序排列：先根级分组，再 `files` 嵌套分组；同一文件以第一条声明为准
#[derive(Debug, Clone, Default)]
pub struct Manifest {
    declarations: Vec<(FileCategory, String)>,
    files_info: HashMap<String, ManifestFileInfo>,
    mtl_bands: HashMap<String, ManifestFileInfo>,
    scene_fields: SceneFields,
}

impl Manifest {
    /// 从原始清单树构建
    pub fn from_value(raw: &JsonValue) -> Self {
        let mut manifest = Manifest::default();

        for (section, category) in ROOT_SECTIONS {
            manifest.collect_declarations(raw.get(section), category);
        }
        if let Some(files) = raw.get("files") {
            for (section, category) in NESTED_SECTIONS {
                manifest.collect_declarations(files.get(section), category);
            }
            manifest.collect_files_info(files);
        }
        manifest.collect_mtl_bands(raw);

        manifest.scene_fields = SceneFields {
            satellite: first_field(raw, &["SPACECRAFT_ID", "SATELLITE"]),
            acquisition_date: first_field(raw, &["DATE_ACQUIRED", "ACQUISITION_DATE"]),
            cloud_cover: first_field(raw, &["CLOUD_COVER"]),
        };

        manifest
    }

    /// 清单声明的分类（文件名不区分大小写）
    pub fn declared_category(&self, file_name: &str) -> Option<FileCategory> {
        let name = file_name.to_lowercase();
        self.declarations
            .iter()
            .find(|(_, declared)| *declared == name)
            .map(|(category, _)| *category)
    }

    /// 文件描述信息：MTL 约定优先于 `files` 分组
    pub fn file_info(&self, file_name: &str) -> Option<&ManifestFileInfo> {
        let name = file_name.to_lowercase();
        self.mtl_bands.get(&name).or_else(|| self.files_info.get(&name))
    }

    pub fn scene_fields(&self) -> &SceneFields {
        &self.scene_fields
    }

    pub fn declaration_count(&self) -> usize {
        self.declarations.len()
    }

    /// 分组可以是字符串数组，也可以是值为字符串或 `{file_name}` 的对象
    fn collect_declarations(&mut self, section: Option<&JsonValue>, category: FileCategory) {
        match section {
            Some(JsonValue::Array(items)) => {
                for item in items {
                    if let Some(name) = item.as_str() {
                        self.declarations.push((category, name.to_lowercase()));
                    }
                }
            }
            Some(JsonValue::Object(entries)) => {
                for item in entries.values() {
                    if let Some(name) = declared_name(item) {
                        self.declarations.push((category, name.to_lowercase()));
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_files_info(&mut self, files: &JsonValue) {
        let Some(groups) = files.as_object() else {
            return;
        };

        for group in groups.values() {
            match group {
                JsonValue::Object(entries) => {
                    for item in entries.values() {
                        let Some(name) = declared_name(item) else {
                            continue;
                        };
                        let info = ManifestFileInfo {
                            description: string_field(item, &["description"]),
                            band_number: string_field(item, &["band_number", "band"]),
                            wavelength: string_field(item, &["wavelength"]),
                        };
                        self.files_info.entry(name.to_lowercase()).or_insert(info);
                    }
                }
                JsonValue::Array(items) => {
                    for name in items.iter().filter_map(|i| i.as_str()) {
                        self.files_info
                            .entry(name.to_lowercase())
                            .or_insert_with(ManifestFileInfo::default);
                    }
                }
                _ => {}
            }
        }
    }

    /// `<BASE>_FILE_NAME = "x.TIF"` → `<BASE>_BAND_NUMBER` / `<BASE>_WAVELENGTH` / `<BASE>_DESCRIPTION`
    fn collect_mtl_bands(&mut self, raw: &JsonValue) {
        let Some(map) = raw.as_object() else {
            return;
        };

        for (key, value) in map {
            let (Some(base), Some(file_name)) = (key.strip_suffix("_FILE_NAME"), value.as_str())
            else {
                continue;
            };

            let band_number = first_field(raw, &[format!("{}_BAND_NUMBER", base).as_str()])
                .or_else(|| Some(base.replacen("BAND", "", 1)));
            let info = ManifestFileInfo {
                description: first_field(raw, &[format!("{}_DESCRIPTION", base).as_str()]),
                band_number,
                wavelength: first_field(raw, &[format!("{}_WAVELENGTH", base).as_str()]),
            };
            self.mtl_bands.entry(file_name.to_lowercase()).or_insert(info);
        }
    }
}

fn declared_name(item: &JsonValue) -> Option<&str> {
    match item {
        JsonValue::String(s) => Some(s),
        JsonValue::Object(obj) => obj.get("file_name").and_then(|v| v.as_str()),
        _ => None,
    }
}

fn first_field(raw: &JsonValue, keys: &[&str]) -> Option<String> {
    string_field(raw, keys)
}

/// 取第一个非空字段，数字与布尔值转为字符串
fn string_field(value: &JsonValue, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match value.get(*k) {
        Some(JsonValue::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        Some(JsonValue::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
