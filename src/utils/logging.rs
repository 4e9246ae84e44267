//! 日志工具模块
//!
//! 提供日志初始化、格式化和输出的辅助函数

use anyhow::Result;
use std::fs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::models::{Job, Notice, NoticeLevel, RenderLayer};

/// 初始化 tracing 订阅者
///
/// `RUST_LOG` 优先；否则 `info`，开启 `verbose` 时为 `debug`
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// 初始化日志文件
///
/// # 参数
/// - `log_file_path`: 日志文件路径
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\n场景会话日志 - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 卫星场景波段运算");
    info!("🌐 工作流服务: {}", config.workflow_api_base_url);
    info!("🗺️ 切片服务: {}", config.titiler_api_base_url);
    info!("🎨 默认色带: {}", config.default_colormap);
    info!("{}", "=".repeat(60));
}

/// 记录场景加载信息
///
/// # 参数
/// - `scene_name`: 场景名称
/// - `file_count`: 文件总数
/// - `has_manifest`: 是否成功解析清单
pub fn log_scene_loaded(scene_name: &str, file_count: usize, has_manifest: bool) {
    info!("\n{}", "─".repeat(60));
    info!("📦 场景已加载: {}", scene_name);
    info!("📄 文件数量: {}", file_count);
    if has_manifest {
        info!("📋 已解析场景清单");
    } else {
        info!("💡 未找到清单，按文件名推断分类");
    }
    info!("{}", "─".repeat(60));
}

/// 打印任务最终状态
pub fn print_job_summary(job: &Job) {
    info!("\n{}", "=".repeat(60));
    info!("📊 任务结束统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("🆔 任务: {}", job.label());
    info!("📌 阶段: {:?}", job.phase);
    info!("📈 进度: {}%", job.progress);
    if let Some(message) = &job.message {
        info!("💬 消息: {}", truncate_text(message, 120));
    }
    info!("{}", "=".repeat(60));
}

/// 打印图层列表与提示
pub fn print_session_state(layers: &[RenderLayer], notices: &[Notice], log_file_path: &str) {
    info!("\n{}", "=".repeat(60));
    info!("🗂️ 当前图层 ({} 个)", layers.len());
    for layer in layers {
        info!(
            "  {} {} [{}] 不透明度={:.2}",
            if layer.visible { "👁️" } else { "  " },
            layer.name,
            layer.id,
            layer.opacity
        );
    }
    for notice in notices {
        match notice.level {
            NoticeLevel::Error => info!("❌ {}", notice.message),
            NoticeLevel::Warning => info!("⚠️ {}", notice.message),
            NoticeLevel::Info => info!("💡 {}", notice.message),
        }
    }
    info!("{}", "=".repeat(60));
    info!("\n日志已保存至: {}", log_file_path);
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
