//! 核心层：错误类型、步数预算、会话监管、任务调度

pub mod budget;
pub mod error;
pub mod session_supervisor;
pub mod task_scheduler;

pub use budget::StepBudget;
pub use error::{AgentError, StateError, ToolError};
pub use session_supervisor::SessionSupervisor;
pub use task_scheduler::TaskScheduler;
