//! 推送通道 - 基础设施层
//!
//! 持有任务状态的 WebSocket 连接，只暴露"下一条事件"的能力。
//! 连接由 [`PushSession`] 独占：`close()` 或 drop 都会通知读取任务关闭套接字。

use async_trait::async_trait;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ApiError, AppResult};
use crate::models::StatusSnapshot;
use crate::utils::tile_url::push_channel_url;

/// 通道事件
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// `initial_status` / `status_update`
    Status(StatusSnapshot),
    /// `merge_started`（不带状态快照的合并通知）
    MergeStarted,
    /// 通道级错误
    Error(String),
    /// 连接关闭
    Closed,
}

#[derive(Debug, Deserialize)]
struct RawChannelMessage {
    #[serde(rename = "type")]
    kind: Option<String>,
    data: Option<JsonValue>,
    message: Option<String>,
}

/// 解析一条通道消息
///
/// 未知类型与无法解析的消息返回 None（记录日志后忽略）
pub fn parse_channel_message(text: &str) -> Option<ChannelEvent> {
    let raw: RawChannelMessage = match serde_json::from_str(text) {
        Ok(raw) => raw,
        Err(e) => {
            error!("无法解析推送消息: {}", e);
            return None;
        }
    };

    match raw.kind.as_deref() {
        Some("initial_status") | Some("status_update") => {
            let snapshot = raw
                .data
                .and_then(|d| serde_json::from_value::<StatusSnapshot>(d).ok())
                .unwrap_or_default();
            Some(ChannelEvent::Status(snapshot))
        }
        Some("merge_started") => Some(ChannelEvent::MergeStarted),
        Some("error") => Some(ChannelEvent::Error(
            raw.message.unwrap_or_else(|| "未知错误".to_string()),
        )),
        other => {
            warn!("未知的推送消息类型: {:?}", other);
            None
        }
    }
}

/// 与单个任务绑定的推送会话
pub struct PushSession {
    job_id: String,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

/// 会话的生产端（由读取任务持有）
pub struct SessionFeed {
    pub events: mpsc::UnboundedSender<ChannelEvent>,
    pub shutdown: oneshot::Receiver<()>,
}

impl SessionFeed {
    pub fn send(&self, event: ChannelEvent) -> bool {
        self.events.send(event).is_ok()
    }

    /// 会话端是否已要求关闭（显式关闭或已被丢弃）
    pub fn is_shutdown(&mut self) -> bool {
        !matches!(
            self.shutdown.try_recv(),
            Err(oneshot::error::TryRecvError::Empty)
        )
    }
}

impl PushSession {
    /// 创建一对会话端与生产端
    pub fn pair(job_id: impl Into<String>) -> (PushSession, SessionFeed) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            PushSession {
                job_id: job_id.into(),
                events: event_rx,
                shutdown: Some(shutdown_tx),
            },
            SessionFeed {
                events: event_tx,
                shutdown: shutdown_rx,
            },
        )
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_open(&self) -> bool {
        self.shutdown.is_some()
    }

    /// 等待下一条事件；生产端结束或会话已关闭时返回 `Closed`
    pub async fn next_event(&mut self) -> ChannelEvent {
        if !self.is_open() {
            return ChannelEvent::Closed;
        }
        self.events.recv().await.unwrap_or(ChannelEvent::Closed)
    }

    /// 关闭会话（幂等）
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            debug!("[任务 {}] 关闭推送通道", self.job_id);
            let _ = shutdown.send(());
            self.events.close();
        }
    }
}

impl Drop for PushSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// 推送通道连接能力
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, job_id: &str) -> AppResult<PushSession>;
}

/// 基于 WebSocket 的连接器
pub struct WebSocketConnector {
    api_base_url: String,
}

impl WebSocketConnector {
    pub fn new(config: &Config) -> Self {
        Self {
            api_base_url: config.workflow_api_base_url.clone(),
        }
    }
}

#[async_trait]
impl PushConnector for WebSocketConnector {
    async fn connect(&self, job_id: &str) -> AppResult<PushSession> {
        let url = push_channel_url(&self.api_base_url, job_id);
        info!("[任务 {}] 🔌 连接推送通道: {}", job_id, url);

        let (mut ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ApiError::ChannelConnectFailed {
                url: url.clone(),
                source: Box::new(e),
            })?;

        let (session, feed) = PushSession::pair(job_id);
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            let SessionFeed {
                events,
                mut shutdown,
            } = feed;

            loop {
                tokio::select! {
                    _ = &mut shutdown => {
                        let _ = ws.close(None).await;
                        debug!("[任务 {}] 推送通道已关闭", job_id);
                        break;
                    }
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            debug!("[任务 {}] 收到推送: {}", job_id, text);
                            if let Some(event) = parse_channel_message(&text) {
                                if events.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("[任务 {}] 推送通道已断开", job_id);
                            let _ = events.send(ChannelEvent::Closed);
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("[任务 {}] ⚠️ 推送通道错误: {}", job_id, e);
                            let _ = events.send(ChannelEvent::Error(format!("推送通道连接失败: {}", e)));
                            break;
                        }
                    }
                }
            }
        });

        Ok(session)
    }
}
