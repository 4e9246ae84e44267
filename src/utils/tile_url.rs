//! 切片 URL 构造与改写

use regex::{Captures, Regex};

use crate::models::BBox;

/// 设置查询参数：已存在时原位替换（保留其他参数与顺序），否则追加
pub fn set_query_param(url: &str, name: &str, value: &str) -> String {
    let pattern = format!(r"([?&]){}=[^&]*", regex::escape(name));
    if let Ok(re) = Regex::new(&pattern) {
        if re.is_match(url) {
            return re
                .replacen(url, 1, |caps: &Captures| {
                    format!("{}{}={}", &caps[1], name, value)
                })
                .into_owned();
        }
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", url, separator, name, value)
}

/// 原始波段切片模板
///
/// `{base}/{path}?url=<encoded>&colormap_name=<name>&bbox=<region>`
pub fn raw_band_tile_url(
    titiler_base: &str,
    tile_path: &str,
    presigned_url: &str,
    colormap: &str,
    bbox: &BBox,
) -> String {
    format!(
        "{}/{}?url={}&colormap_name={}&bbox={}",
        titiler_base.trim_end_matches('/'),
        tile_path.trim_start_matches('/'),
        urlencoding::encode(presigned_url),
        colormap,
        bbox.to_param_string()
    )
}

/// TiTiler 裁剪导出地址
pub fn crop_url(titiler_base: &str, source_url: &str, bbox: &[f64; 4]) -> String {
    let bbox_param = bbox
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!(
        "{}/cog/crop?url={}&bbox={}&format=GTiff",
        titiler_base.trim_end_matches('/'),
        urlencoding::encode(source_url),
        bbox_param
    )
}

/// 从结果图层 URL 的 `/viz/<job>/` 段解析任务ID
pub fn job_id_from_viz_url(url: &str) -> Option<String> {
    let re = Regex::new(r"/viz/([^/]+)/").ok()?;
    re.captures(url).map(|caps| caps[1].to_string())
}

/// 推送通道地址：`http` → `ws`，`https` → `wss`
pub fn push_channel_url(api_base: &str, job_id: &str) -> String {
    let base = api_base.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/ws/workflows/{}", ws_base, job_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_query_param_replaces_in_place() {
        let url = "http://t/cog/tiles/{z}/{x}/{y}.png?url=abc&colormap_name=viridis&bbox=1,2,3,4";
        assert_eq!(
            set_query_param(url, "colormap_name", "magma"),
            "http://t/cog/tiles/{z}/{x}/{y}.png?url=abc&colormap_name=magma&bbox=1,2,3,4"
        );
    }

    #[test]
    fn test_set_query_param_appends_when_missing() {
        assert_eq!(
            set_query_param("http://t/a.png", "colormap_name", "jet"),
            "http://t/a.png?colormap_name=jet"
        );
        assert_eq!(
            set_query_param("http://t/a.png?x=1", "rescale", "0,1"),
            "http://t/a.png?x=1&rescale=0,1"
        );
    }

    #[test]
    fn test_set_query_param_ignores_suffix_matches() {
        let url = "http://t/a.png?my_colormap_name=x";
        assert_eq!(
            set_query_param(url, "colormap_name", "hot"),
            "http://t/a.png?my_colormap_name=x&colormap_name=hot"
        );
    }

    #[test]
    fn test_raw_band_tile_url_encodes_source() {
        let bbox = BBox::parse("45,-15,120,55").unwrap();
        let url = raw_band_tile_url(
            "http://tiles/",
            "cog/tiles/{z}/{x}/{y}.png",
            "https://bucket/a.tif?X-Sig=1&b=2",
            "viridis",
            &bbox,
        );
        assert_eq!(
            url,
            "http://tiles/cog/tiles/{z}/{x}/{y}.png?url=https%3A%2F%2Fbucket%2Fa.tif%3FX-Sig%3D1%26b%3D2&colormap_name=viridis&bbox=45,-15,120,55"
        );
    }

    #[test]
    fn test_job_id_from_viz_url() {
        assert_eq!(
            job_id_from_viz_url("http://api/viz/job-42/tiles/{z}/{x}/{y}.png").as_deref(),
            Some("job-42")
        );
        assert_eq!(job_id_from_viz_url("http://api/tiles/{z}.png"), None);
    }

    #[test]
    fn test_push_channel_url_scheme() {
        assert_eq!(push_channel_url("https://api.example", "j1"), "wss://api.example/ws/workflows/j1");
        assert_eq!(push_channel_url("http://localhost:8000/", "j1"), "ws://localhost:8000/ws/workflows/j1");
    }
}
