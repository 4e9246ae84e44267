//! 结果图层构建 - 流程层
//!
//! 镶嵌生成后：
//! 1. 尽力获取统计信息，得到推荐的 rescale（失败只降级为警告）
//! 2. 改写切片模板：写入当前色带，有 rescale 时写入 rescale
//! 3. 交给注册表添加结果图层（注册表负责隐藏其余图层）

use tracing::{debug, info, warn};

use crate::clients::WorkflowApi;
use crate::error::{AppResult, JobError};
use crate::models::{LayerId, Notice, VisualizationInfo};
use crate::services::layer_registry::LayerRegistry;
use crate::utils::tile_url::set_query_param;
use crate::workflow::job_ctx::JobCtx;

/// 构建完成的结果图层
#[derive(Debug, Clone, PartialEq)]
pub struct ResultLayer {
    pub layer_id: LayerId,
    pub tile_url: String,
    pub rescale: Option<String>,
    /// 非致命降级提示
    pub notices: Vec<Notice>,
}

/// 按可视化描述构建结果图层并加入注册表
pub async fn build_result_layer(
    api: &dyn WorkflowApi,
    registry: &mut LayerRegistry,
    viz: &VisualizationInfo,
    ctx: &JobCtx,
) -> AppResult<ResultLayer> {
    let tiles_url = viz
        .tiles_url
        .as_deref()
        .ok_or(JobError::VisualizationIncomplete { field: "tiles_url" })?;
    let statistics_url = viz
        .statistics_url
        .as_deref()
        .ok_or(JobError::VisualizationIncomplete {
            field: "statistics_url",
        })?;

    let mut notices = Vec::new();
    let rescale = match api.fetch_statistics(statistics_url).await {
        Ok(stats) => {
            let rescale = stats.recommended_rescale.and_then(|r| r.to_param());
            debug!("{} 推荐 rescale: {:?}", ctx, rescale);
            rescale
        }
        Err(e) => {
            warn!("{} ⚠️ 无法获取统计信息: {}", ctx, e);
            warn!("{} 结果图层将不带 rescale 参数加载，可能出现显示瑕疵", ctx);
            notices.push(Notice::warning(
                "无法获取结果统计信息，图层已按默认拉伸加载，显示可能不准确",
            ));
            None
        }
    };

    let tile_url = result_tile_url(tiles_url, registry.color_map(), rescale.as_deref());
    info!("{} 🗺️ 结果切片地址: {}", ctx, tile_url);

    let layer_id =
        registry.add_workflow_result_layer(Some(&ctx.job_id), tile_url.clone(), rescale.clone());

    Ok(ResultLayer {
        layer_id,
        tile_url,
        rescale,
        notices,
    })
}

/// 改写结果切片模板：色带原位替换或追加，rescale 可选
pub fn result_tile_url(template: &str, color_map: &str, rescale: Option<&str>) -> String {
    let with_colormap = set_query_param(template, "colormap_name", color_map);
    match rescale {
        Some(rescale) => set_query_param(&with_colormap, "rescale", rescale),
        None => with_colormap,
    }
}
