//! 波段选择 - 业务能力层
//!
//! 约束：任何时刻已选中的影像波段（`image_bands`）不超过上限。
//! 超限的选择被拒绝且不修改状态；加载失败的波段会被回滚。

use regex::{Captures, Regex};
use tracing::{debug, info, warn};

use crate::error::ConstraintViolation;
use crate::models::FileEntry;

/// 已选中的波段
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedBand {
    pub file: FileEntry,
    pub loading: bool,
    pub loaded: bool,
}

impl SelectedBand {
    pub fn id(&self) -> &str {
        &self.file.id
    }
}

/// 选择结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// 已选中，需要为其创建渲染图层
    NeedsLayer,
    /// 已选中，不创建图层（非影像波段或非 GeoTIFF）
    SelectedOnly,
    /// 之前已选中，无变化
    AlreadySelected,
}

#[derive(Debug, Clone)]
pub struct BandSelectionManager {
    max_image_bands: usize,
    selected: Vec<SelectedBand>,
}

impl BandSelectionManager {
    pub fn new(max_image_bands: usize) -> Self {
        Self {
            max_image_bands,
            selected: Vec::new(),
        }
    }

    /// 选中一个文件
    pub fn try_select(&mut self, file: &FileEntry) -> Result<Selection, ConstraintViolation> {
        if self.is_selected(&file.id) {
            return Ok(Selection::AlreadySelected);
        }

        if file.is_image_band() && self.image_band_count() >= self.max_image_bands {
            warn!(
                "⚠️ 拒绝选择 {}: 已达到 {} 个影像波段上限",
                file.name, self.max_image_bands
            );
            return Err(ConstraintViolation::BandLimitExceeded {
                max: self.max_image_bands,
            });
        }

        let needs_layer = file.is_image_band() && file.is_tiff();
        self.selected.push(SelectedBand {
            file: file.clone(),
            loading: needs_layer,
            loaded: false,
        });
        debug!("选中 {} ({})", file.name, file.category);

        Ok(if needs_layer {
            Selection::NeedsLayer
        } else {
            Selection::SelectedOnly
        })
    }

    /// 图层创建成功
    pub fn mark_loaded(&mut self, id: &str) {
        if let Some(band) = self.selected.iter_mut().find(|b| b.id() == id) {
            band.loading = false;
            band.loaded = true;
            info!("✓ 波段已加载: {}", band.file.name);
        }
    }

    /// 图层创建失败，撤销选择
    pub fn rollback(&mut self, id: &str) -> Option<SelectedBand> {
        let removed = self.take(id);
        if let Some(band) = &removed {
            warn!("⚠️ 波段加载失败，已撤销选择: {}", band.file.name);
        }
        removed
    }

    /// 取消选择
    pub fn deselect(&mut self, id: &str) -> Option<SelectedBand> {
        self.take(id)
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn selected(&self) -> &[SelectedBand] {
        &self.selected
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected.iter().any(|b| b.id() == id)
    }

    pub fn image_band_count(&self) -> usize {
        self.selected.iter().filter(|b| b.file.is_image_band()).count()
    }

    /// 已加载完成的影像波段（波段运算的输入）
    pub fn loaded_image_bands(&self) -> Vec<&FileEntry> {
        self.selected
            .iter()
            .filter(|b| b.loaded && b.file.is_image_band())
            .map(|b| &b.file)
            .collect()
    }

    fn take(&mut self, id: &str) -> Option<SelectedBand> {
        let pos = self.selected.iter().position(|b| b.id() == id)?;
        Some(self.selected.remove(pos))
    }
}

/// 将公式中的 `B1` / `B2` 替换为实际波段名（不含扩展名）
///
/// 单次扫描完成替换，已替换的波段名不会被再次匹配
pub fn translate_expression(expression: &str, b1: Option<&FileEntry>, b2: Option<&FileEntry>) -> String {
    let re = match Regex::new(r"\b(B1|B2)\b") {
        Ok(re) => re,
        Err(e) => {
            warn!("⚠️ 公式替换正则编译失败: {}", e);
            return expression.to_string();
        }
    };
    re.replace_all(expression, |caps: &Captures| {
        let band = if &caps[1] == "B1" { b1 } else { b2 };
        match band {
            Some(band) => band.stem().to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}
