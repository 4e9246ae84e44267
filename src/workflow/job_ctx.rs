//! 任务上下文
//!
//! 封装"我正在跟踪哪个场景上的哪个任务"这一信息

use std::fmt::Display;

/// 任务上下文
#[derive(Debug, Clone)]
pub struct JobCtx {
    /// 远程分配的任务ID
    pub job_id: String,

    /// 提交时的数据集（场景）ID
    pub dataset_id: String,

    /// 提交的波段运算公式
    pub formula: String,
}

impl JobCtx {
    pub fn new(job_id: String, dataset_id: String, formula: String) -> Self {
        Self {
            job_id,
            dataset_id,
            formula,
        }
    }
}

impl Display for JobCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[任务 {} 场景 {}]", self.job_id, self.dataset_id)
    }
}
