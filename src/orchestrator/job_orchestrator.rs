//! 任务编排器 - 编排层
//!
//! ## 职责
//!
//! 驱动一个远程波段运算任务从提交到完成（或失败）的完整生命周期：
//!
//! 1. **提交**：本地校验（场景、公式）通过后才发起网络调用
//! 2. **存在性确认**：远程持久化有延迟，按固定预算轮询，404 重试，其他错误立即失败
//! 3. **订阅**：打开与任务绑定的推送通道，逐条解释状态消息
//! 4. **可视化**：镶嵌生成后构建结果图层
//!
//! ## 资源约束
//!
//! - 每个编排器只跟踪一个任务；新的提交总是先关闭旧通道
//! - 推送会话由编排器独占，任何退出路径（终态、新提交、`teardown`、drop）都会关闭它
//! - 订阅之后没有超时：停滞的任务会一直等待终态消息或通道错误

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::clients::WorkflowApi;
use crate::config::Config;
use crate::error::{AppError, AppResult, JobError, ValidationError};
use crate::infrastructure::{PushConnector, PushSession};
use crate::models::api::JobRequest;
use crate::models::{Job, JobPhase, Notice, Scene, VisualizationInfo};
use crate::services::layer_registry::LayerRegistry;
use crate::workflow::{apply_event, build_result_layer, FlowStep, JobCtx};

/// 存在性轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// 第一次检查前的等待
    pub initial_delay: Duration,
    /// 之后每次检查前的等待
    pub retry_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attempts: config.existence_retries,
            initial_delay: Duration::from_millis(config.existence_initial_delay_ms),
            retry_delay: Duration::from_millis(config.existence_retry_delay_ms),
        }
    }

    /// 第 `attempt` 次（从 0 开始）检查前的等待时间
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            self.initial_delay
        } else {
            self.retry_delay
        }
    }
}

pub struct JobOrchestrator {
    api: Arc<dyn WorkflowApi>,
    connector: Arc<dyn PushConnector>,
    retry: RetryPolicy,
    job: Job,
    ctx: Option<JobCtx>,
    session: Option<PushSession>,
    notices: Vec<Notice>,
}

impl JobOrchestrator {
    pub fn new(config: &Config, api: Arc<dyn WorkflowApi>, connector: Arc<dyn PushConnector>) -> Self {
        Self {
            api,
            connector,
            retry: RetryPolicy::from_config(config),
            job: Job::default(),
            ctx: None,
            session: None,
            notices: Vec::new(),
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    /// 最近一次提交得到的任务ID
    pub fn job_id(&self) -> Option<&str> {
        self.job.id.as_deref()
    }

    /// 推送通道是否打开
    pub fn is_subscribed(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_open())
    }

    /// 取走积累的提示
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// 提交一个波段运算任务
    ///
    /// # 参数
    /// - `expression`: 波段运算公式
    /// - `scene`: 当前场景（数据集ID取场景名）
    ///
    /// # 返回
    /// 通道打开后返回 `Ok`；本地校验失败时不修改任何状态，远程失败时任务进入 `Failed`
    pub async fn submit(&mut self, expression: &str, scene: Option<&Scene>) -> AppResult<()> {
        let scene = scene.ok_or(ValidationError::MissingScene)?;
        if expression.trim().is_empty() {
            return Err(ValidationError::BlankExpression.into());
        }

        self.teardown();
        self.ctx = None;
        self.job = Job {
            phase: JobPhase::Submitting,
            message: Some("Submitting job...".to_string()),
            ..Default::default()
        };

        info!("📤 提交波段运算: {} (场景 {})", expression, scene.name);
        let request = JobRequest::band_math(scene.name.clone(), expression);
        let job_id = match self.api.create_job(&request).await {
            Ok(id) => id,
            Err(e) => return Err(self.fail_with(e)),
        };

        let ctx = JobCtx::new(job_id.clone(), scene.name.clone(), expression.to_string());
        info!("{} ✓ 任务已提交，等待后端创建任务记录...", ctx);
        self.job.id = Some(job_id.clone());
        self.job.phase = JobPhase::AwaitingExistence;
        self.job.message = Some("Waiting for job to initialize...".to_string());
        self.ctx = Some(ctx);

        if let Err(e) = self.wait_for_existence(&job_id).await {
            return Err(self.fail_with(e));
        }

        self.job.message = Some("Connecting to real-time updates...".to_string());
        match self.connector.connect(&job_id).await {
            Ok(session) => {
                self.session = Some(session);
                self.job.phase = JobPhase::Subscribed;
                info!("[任务 {}] 🔌 已订阅推送通道", job_id);
                Ok(())
            }
            Err(e) => Err(self.fail_with(e)),
        }
    }

    /// 轮询任务是否已存在
    async fn wait_for_existence(&self, job_id: &str) -> AppResult<()> {
        for attempt in 0..self.retry.attempts {
            tokio::time::sleep(self.retry.delay_before(attempt)).await;
            debug!(
                "[任务 {}] 检查任务是否存在 ({}/{})",
                job_id,
                attempt + 1,
                self.retry.attempts
            );

            match self.api.check_job(job_id).await {
                Ok(()) => {
                    info!("[任务 {}] ✓ 任务已就绪", job_id);
                    return Ok(());
                }
                Err(e) if e.is_not_found() => {
                    debug!("[任务 {}] 任务尚未创建，稍后重试", job_id);
                }
                Err(e) => {
                    error!("[任务 {}] 检查任务状态出错: {}", job_id, e);
                    return Err(e);
                }
            }
        }

        warn!("[任务 {}] ⏱️ 等待任务创建超时", job_id);
        Err(JobError::InitializationTimeout {
            job_id: job_id.to_string(),
            attempts: self.retry.attempts,
        }
        .into())
    }

    /// 等待并处理下一条推送事件
    ///
    /// 没有打开的通道时返回 None；否则返回处理后的任务阶段
    pub async fn next_update(&mut self, registry: &mut LayerRegistry) -> Option<JobPhase> {
        let session = self.session.as_mut()?;
        let event = session.next_event().await;

        match apply_event(&mut self.job, event) {
            FlowStep::Continue | FlowStep::Ignored => {}
            FlowStep::Visualize(viz) => self.finish_with_visualization(registry, &viz).await,
            FlowStep::Failed(message) => {
                self.notices.push(Notice::error(message));
                self.teardown();
            }
        }

        Some(self.job.phase)
    }

    /// 持续处理事件直到任务进入终态或通道关闭
    pub async fn run_to_completion(&mut self, registry: &mut LayerRegistry) -> &Job {
        while let Some(phase) = self.next_update(registry).await {
            if phase.is_terminal() {
                break;
            }
        }
        &self.job
    }

    async fn finish_with_visualization(
        &mut self,
        registry: &mut LayerRegistry,
        viz: &VisualizationInfo,
    ) {
        self.teardown();

        let Some(ctx) = self.ctx.clone() else {
            self.fail_with(ValidationError::NoActiveJob.into());
            return;
        };

        match build_result_layer(self.api.as_ref(), registry, viz, &ctx).await {
            Ok(result) => {
                self.notices.extend(result.notices);
                self.job.result_layer = Some(result.layer_id);
                self.job.phase = JobPhase::Complete;
                info!("{} ✅ 任务完成，结果图层已加载", ctx);
            }
            Err(e) => {
                self.fail_with(e);
            }
        }
    }

    /// 记录失败：任务进入 `Failed`，关闭通道，保存面向用户的消息
    fn fail_with(&mut self, err: AppError) -> AppError {
        let message = err.user_message();
        error!("[任务 {}] ❌ {}", self.job.label(), message);
        self.job.phase = JobPhase::Failed;
        self.job.message = Some(message.clone());
        self.notices.push(Notice::error(message));
        self.teardown();
        err
    }

    /// 关闭推送通道（幂等）
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}

impl Drop for JobOrchestrator {
    fn drop(&mut self) {
        self.teardown();
    }
}
