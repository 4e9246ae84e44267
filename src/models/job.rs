use crate::models::layer::LayerId;
use serde::{Deserialize, Serialize};

/// 本地任务阶段
///
/// `Idle → Submitting → AwaitingExistence → Subscribed → {Processing ⇄ Merging} → Complete | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobPhase {
    Idle,
    Submitting,
    AwaitingExistence,
    Subscribed,
    Processing,
    Merging,
    Complete,
    Failed,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobPhase::Complete | JobPhase::Failed)
    }
}

/// 远程服务上报的状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RemoteStatus {
    /// 其余所有状态均视为处理中
    InProgress(String),
    MergeStarted,
    MosaicCreated,
    Failed,
    MosaicIncomplete,
    MergeFailed,
}

impl RemoteStatus {
    pub fn parse(status: &str) -> Self {
        match status {
            "MERGE_STARTED" => RemoteStatus::MergeStarted,
            "MOSAIC_CREATED" => RemoteStatus::MosaicCreated,
            "FAILED" => RemoteStatus::Failed,
            "MOSAIC_INCOMPLETE" => RemoteStatus::MosaicIncomplete,
            "MERGE_FAILED" => RemoteStatus::MergeFailed,
            other => RemoteStatus::InProgress(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::InProgress(s) => s,
            RemoteStatus::MergeStarted => "MERGE_STARTED",
            RemoteStatus::MosaicCreated => "MOSAIC_CREATED",
            RemoteStatus::Failed => "FAILED",
            RemoteStatus::MosaicIncomplete => "MOSAIC_INCOMPLETE",
            RemoteStatus::MergeFailed => "MERGE_FAILED",
        }
    }
}

/// 切片处理进度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingProgress {
    #[serde(default)]
    pub processed_tiles: u64,
    #[serde(default)]
    pub total_tiles: u64,
}

impl ProcessingProgress {
    /// `round(processed / total * 100)`，total 为 0 时无法计算
    pub fn percent(&self) -> Option<u8> {
        if self.total_tiles == 0 {
            return None;
        }
        let ratio = self.processed_tiles as f64 / self.total_tiles as f64;
        Some((ratio * 100.0).round().clamp(0.0, 100.0) as u8)
    }
}

/// 任务完成后返回的可视化描述
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualizationInfo {
    pub tiles_url: Option<String>,
    pub statistics_url: Option<String>,
}

/// 推送通道中的状态快照
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub status: Option<String>,
    pub human_status: Option<String>,
    pub processing_progress: Option<ProcessingProgress>,
    pub visualization: Option<VisualizationInfo>,
}

impl StatusSnapshot {
    pub fn remote_status(&self) -> Option<RemoteStatus> {
        self.status.as_deref().map(RemoteStatus::parse)
    }
}

/// 编排器跟踪的唯一任务
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// 远程分配的任务ID（提交成功前为 None）
    pub id: Option<String>,
    pub phase: JobPhase,
    pub remote_status: Option<RemoteStatus>,
    /// 0..=100
    pub progress: u8,
    /// 每条状态消息处理后的进度
    pub progress_history: Vec<u8>,
    /// 最近一条面向用户的消息
    pub message: Option<String>,
    pub visualization: Option<VisualizationInfo>,
    pub result_layer: Option<LayerId>,
}

impl Default for Job {
    fn default() -> Self {
        Self {
            id: None,
            phase: JobPhase::Idle,
            remote_status: None,
            progress: 0,
            progress_history: Vec::new(),
            message: None,
            visualization: None,
            result_layer: None,
        }
    }
}

impl Job {
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn label(&self) -> &str {
        self.id.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_rounds_and_guards_zero_total() {
        let p = ProcessingProgress {
            processed_tiles: 1,
            total_tiles: 3,
        };
        assert_eq!(p.percent(), Some(33));

        let p = ProcessingProgress {
            processed_tiles: 5,
            total_tiles: 0,
        };
        assert_eq!(p.percent(), None);
    }

    #[test]
    fn test_unknown_status_is_in_progress() {
        assert_eq!(
            RemoteStatus::parse("TILING"),
            RemoteStatus::InProgress("TILING".to_string())
        );
        assert_eq!(RemoteStatus::parse("MERGE_FAILED"), RemoteStatus::MergeFailed);
        assert_eq!(RemoteStatus::parse("MERGE_STARTED").as_str(), "MERGE_STARTED");
    }
}
