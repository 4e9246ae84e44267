//! 导出 - 业务能力层
//!
//! - 整幅镶嵌结果下载链接
//! - 按框选范围导出当前活动图层（结果图层走工作流服务，原始波段走 TiTiler 裁剪）

use tracing::{debug, info};

use crate::clients::WorkflowApi;
use crate::config::Config;
use crate::error::{AppResult, ValidationError};
use crate::models::api::BBoxExportRequest;
use crate::models::{BBox, LayerSource};
use crate::services::layer_registry::LayerRegistry;
use crate::utils::tile_url::{crop_url, job_id_from_viz_url};

const EXPORT_FORMAT: &str = "geotiff";

/// 一次范围导出的结果
#[derive(Debug, Clone, PartialEq)]
pub enum ExportArtifact {
    /// 工作流服务返回的 GeoTIFF 字节流
    GeoTiff { file_name: String, bytes: Vec<u8> },
    /// 原始波段的 TiTiler 裁剪地址
    CropUrl(String),
}

/// 获取整幅镶嵌结果的下载地址
pub async fn mosaic_download_url(api: &dyn WorkflowApi, job_id: &str) -> AppResult<String> {
    info!("[任务 {}] 📥 获取下载链接...", job_id);
    let url = api.download_url(job_id).await?;
    debug!("[任务 {}] 下载链接: {}", job_id, url);
    Ok(url)
}

/// 按范围导出当前可见图层
///
/// # 参数
/// - `bbox`: 框选得到的经纬度范围
///
/// # 返回
/// 结果图层返回 GeoTIFF 字节，原始波段返回裁剪地址；没有可见图层时为校验错误
pub async fn export_bbox(
    api: &dyn WorkflowApi,
    registry: &LayerRegistry,
    bbox: &BBox,
    config: &Config,
) -> AppResult<ExportArtifact> {
    let layer = registry
        .active_layer()
        .ok_or(ValidationError::NoActiveLayer)?;

    match &layer.source {
        LayerSource::WorkflowResult {
            job_id,
            tile_url,
            rescale,
        } => {
            let job_id = match job_id {
                Some(id) => id.clone(),
                None => job_id_from_viz_url(tile_url).ok_or_else(|| {
                    ValidationError::JobIdNotFound {
                        url: tile_url.clone(),
                    }
                })?,
            };

            let request = BBoxExportRequest {
                min_lon: bbox.min_lon,
                min_lat: bbox.min_lat,
                max_lon: bbox.max_lon,
                max_lat: bbox.max_lat,
                format: EXPORT_FORMAT.to_string(),
                width: config.export_width,
                height: config.export_height,
                colormap_name: registry.color_map().to_string(),
                rescale: rescale
                    .clone()
                    .unwrap_or_else(|| config.default_rescale.clone()),
            };

            info!(
                "[任务 {}] 📤 导出范围 {} ({}x{})",
                job_id,
                bbox.to_param_string(),
                request.width,
                request.height
            );
            let bytes = api.export_bbox(&job_id, &request).await?;
            info!("[任务 {}] ✓ 导出完成，{} 字节", job_id, bytes.len());

            Ok(ExportArtifact::GeoTiff {
                file_name: format!("workflow_{}_bbox.tif", job_id),
                bytes,
            })
        }
        LayerSource::RawBand { presigned_url, .. } => {
            let url = crop_url(
                &config.titiler_api_base_url,
                presigned_url,
                &bbox.to_array(),
            );
            info!("📐 原始波段裁剪地址已生成: {}", layer.name);
            Ok(ExportArtifact::CropUrl(url))
        }
    }
}
