//! # Skystack
//!
//! 卫星场景波段运算的客户端编排核心
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源，只暴露能力
//! - `PushSession` - 任务推送通道的唯一持有者，关闭或 drop 时断开连接
//! - `SurfaceAdapter` - 唯一持有绘制表面句柄，把图层快照协调到表面上
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"
//! - `SceneCatalog` - 场景列表、递归枚举、清单解析与文件分类
//! - `BandSelectionManager` - 影像波段数量上限与加载回滚
//! - `LayerRegistry` - 图层快照，任意时刻最多一个可见
//! - `render_pipeline` - 每次绘制的非破坏性滤镜
//! - `MapInteractionController` - 视图与一次性范围框选
//! - `export_service` - 下载与范围导出
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个任务"的状态解释与结果图层构建
//! - `JobCtx` - 上下文封装（job_id + dataset_id）
//! - `job_flow` - 纯函数状态机
//! - `visualization` - 统计信息 + 切片地址改写
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/job_orchestrator` - 提交、存在性轮询、订阅
//! - `orchestrator/session` - 会话状态与应用入口
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;

pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{WorkflowApi, WorkflowClient};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{HeadlessSurface, PushConnector, PushSession, RenderSurface};
pub use models::{BBox, FileEntry, Job, JobPhase, LayerId, Notice, RenderLayer, Scene};
pub use orchestrator::{App, JobOrchestrator};
pub use services::LayerRegistry;
pub use workflow::{FlowStep, JobCtx};
