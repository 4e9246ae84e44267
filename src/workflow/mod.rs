pub mod job_ctx;
pub mod job_flow;
pub mod visualization;

pub use job_ctx::JobCtx;
pub use job_flow::{apply_event, FlowStep};
pub use visualization::{build_result_layer, ResultLayer};
