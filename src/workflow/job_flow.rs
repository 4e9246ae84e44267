//! 任务状态解释 - 流程层
//!
//! 把推送通道的每条事件折叠进 [`Job`]，决定下一步做什么。
//! 这里不做任何 I/O：可视化构建与通道关闭由编排层根据返回的 [`FlowStep`] 执行。
//!
//! 进度规则：
//! - 处理中：`total > 0` 时 `progress = round(processed / total * 100)`
//! - 进入合并后进度固定为 100，之后的切片计数不再生效

use tracing::{debug, info, warn};

use crate::error::JobError;
use crate::infrastructure::ChannelEvent;
use crate::models::{Job, JobPhase, RemoteStatus, StatusSnapshot, VisualizationInfo};

pub const MERGING_MESSAGE: &str = "Merging tiles into final mosaic...";
pub const MOSAIC_CREATED_MESSAGE: &str = "Mosaic Created. Loading visualization...";

/// 处理一条事件后的下一步
#[derive(Debug, Clone, PartialEq)]
pub enum FlowStep {
    /// 继续等待下一条消息
    Continue,
    /// 镶嵌已生成，需要构建结果图层
    Visualize(VisualizationInfo),
    /// 任务失败（已写入 job），需要关闭通道
    Failed(String),
    /// 任务已结束，事件被忽略
    Ignored,
}

/// 将一条通道事件应用到任务上
pub fn apply_event(job: &mut Job, event: ChannelEvent) -> FlowStep {
    if job.is_terminal() {
        debug!("[任务 {}] 任务已结束，忽略事件: {:?}", job.label(), event);
        return FlowStep::Ignored;
    }

    match event {
        ChannelEvent::Status(snapshot) => apply_status(job, snapshot),
        ChannelEvent::MergeStarted => {
            enter_merging(job);
            record_progress(job);
            FlowStep::Continue
        }
        ChannelEvent::Error(message) => {
            let err = JobError::ChannelError { message };
            fail(job, err.to_string())
        }
        ChannelEvent::Closed => fail(job, JobError::ChannelClosed.to_string()),
    }
}

fn apply_status(job: &mut Job, snapshot: StatusSnapshot) -> FlowStep {
    let Some(status) = snapshot.remote_status() else {
        warn!("[任务 {}] 状态消息中没有 status 字段", job.label());
        record_progress(job);
        return FlowStep::Continue;
    };
    let human = snapshot
        .human_status
        .clone()
        .unwrap_or_else(|| status.as_str().to_string());

    let step = match &status {
        RemoteStatus::InProgress(_) => {
            if job.phase == JobPhase::Merging {
                debug!("[任务 {}] 合并中收到 {}，进度保持 100", job.label(), status.as_str());
            } else {
                job.phase = JobPhase::Processing;
                if let Some(percent) = snapshot.processing_progress.and_then(|p| p.percent()) {
                    job.progress = percent;
                }
                job.message = Some(human);
            }
            FlowStep::Continue
        }
        RemoteStatus::MergeStarted => {
            enter_merging(job);
            FlowStep::Continue
        }
        RemoteStatus::MosaicCreated => {
            job.progress = 100;
            job.message = Some(MOSAIC_CREATED_MESSAGE.to_string());
            job.visualization = snapshot.visualization.clone();
            info!("[任务 {}] 🧩 镶嵌已生成", job.label());
            FlowStep::Visualize(snapshot.visualization.unwrap_or_default())
        }
        RemoteStatus::Failed | RemoteStatus::MosaicIncomplete | RemoteStatus::MergeFailed => {
            let err = JobError::RemoteFailed {
                status: status.as_str().to_string(),
                message: human,
            };
            job.remote_status = Some(status.clone());
            record_progress(job);
            return fail(job, err.to_string());
        }
    };

    job.remote_status = Some(status);
    record_progress(job);
    step
}

fn enter_merging(job: &mut Job) {
    if job.phase != JobPhase::Merging {
        info!("[任务 {}] 🔗 开始合并切片", job.label());
    }
    job.phase = JobPhase::Merging;
    job.remote_status = Some(RemoteStatus::MergeStarted);
    job.progress = 100;
    job.message = Some(MERGING_MESSAGE.to_string());
}

fn record_progress(job: &mut Job) {
    job.progress_history.push(job.progress);
}

fn fail(job: &mut Job, message: String) -> FlowStep {
    warn!("[任务 {}] ❌ 任务失败: {}", job.label(), message);
    job.phase = JobPhase::Failed;
    job.message = Some(message.clone());
    FlowStep::Failed(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ProcessingProgress;

    fn running_job() -> Job {
        Job {
            id: Some("job-1".to_string()),
            phase: JobPhase::Subscribed,
            ..Default::default()
        }
    }

    fn status(status: &str, processed: u64, total: u64) -> ChannelEvent {
        ChannelEvent::Status(StatusSnapshot {
            status: Some(status.to_string()),
            human_status: None,
            processing_progress: Some(ProcessingProgress {
                processed_tiles: processed,
                total_tiles: total,
            }),
            visualization: None,
        })
    }

    #[test]
    fn test_progress_freezes_after_merge() {
        let mut job = running_job();
        apply_event(&mut job, status("PROCESSING", 50, 100));
        apply_event(&mut job, ChannelEvent::MergeStarted);
        apply_event(&mut job, status("PROCESSING", 10, 100));

        assert_eq!(job.phase, JobPhase::Merging);
        assert_eq!(job.progress_history, vec![50, 100, 100]);
        assert_eq!(job.message.as_deref(), Some(MERGING_MESSAGE));
    }

    #[test]
    fn test_zero_total_keeps_previous_progress() {
        let mut job = running_job();
        apply_event(&mut job, status("TILING", 30, 100));
        apply_event(&mut job, status("TILING", 0, 0));
        assert_eq!(job.progress, 30);
        assert_eq!(job.phase, JobPhase::Processing);
    }

    #[test]
    fn test_failure_status_surfaces_human_text() {
        let mut job = running_job();
        let step = apply_event(
            &mut job,
            ChannelEvent::Status(StatusSnapshot {
                status: Some("MOSAIC_INCOMPLETE".to_string()),
                human_status: Some("3 tiles missing".to_string()),
                ..Default::default()
            }),
        );

        assert_eq!(step, FlowStep::Failed("3 tiles missing".to_string()));
        assert_eq!(job.phase, JobPhase::Failed);
        assert_eq!(job.remote_status, Some(RemoteStatus::MosaicIncomplete));
        assert_eq!(apply_event(&mut job, ChannelEvent::Closed), FlowStep::Ignored);
    }

    #[test]
    fn test_failure_without_human_text_uses_status() {
        let mut job = running_job();
        let step = apply_event(&mut job, status("MERGE_FAILED", 0, 0));
        assert_eq!(step, FlowStep::Failed("MERGE_FAILED".to_string()));
    }

    #[test]
    fn test_mosaic_created_requests_visualization() {
        let mut job = running_job();
        let viz = VisualizationInfo {
            tiles_url: Some("http://api/viz/job-1/{z}/{x}/{y}.png".to_string()),
            statistics_url: Some("http://api/viz/job-1/statistics".to_string()),
        };
        let step = apply_event(
            &mut job,
            ChannelEvent::Status(StatusSnapshot {
                status: Some("MOSAIC_CREATED".to_string()),
                visualization: Some(viz.clone()),
                ..Default::default()
            }),
        );

        assert_eq!(step, FlowStep::Visualize(viz));
        assert_eq!(job.progress, 100);
        assert!(!job.is_terminal());
    }

    #[test]
    fn test_channel_error_and_close_fail_running_job() {
        let mut job = running_job();
        let step = apply_event(&mut job, ChannelEvent::Error("boom".to_string()));
        assert!(matches!(step, FlowStep::Failed(msg) if msg.contains("boom")));

        let mut job = running_job();
        assert!(matches!(
            apply_event(&mut job, ChannelEvent::Closed),
            FlowStep::Failed(_)
        ));
        assert_eq!(job.phase, JobPhase::Failed);
    }
}
