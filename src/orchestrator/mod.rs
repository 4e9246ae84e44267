//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责生命周期与流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session` - 会话
//! - 管理应用生命周期（初始化、运行）
//! - 持有场景、波段选择、图层注册表、地图控制器
//! - 把所有失败归一为面向用户的提示
//!
//! ### `job_orchestrator` - 任务编排器
//! - 提交 → 存在性确认 → 订阅推送通道 → 解释状态 → 构建结果图层
//! - 独占推送会话，任何退出路径都会关闭它
//!
//! ## 层次关系
//!
//! ```text
//! session::App (一次用户会话)
//!     ↓
//! job_orchestrator (一个远程任务)
//!     ↓
//! workflow (状态解释 / 结果图层构建)
//!     ↓
//! services (能力层：scene_catalog / band_selection / layer_registry / ...)
//!     ↓
//! infrastructure (基础设施：PushSession / SurfaceAdapter)
//! ```

pub mod job_orchestrator;
pub mod session;

// 重新导出主要类型
pub use job_orchestrator::{JobOrchestrator, RetryPolicy};
pub use session::App;
