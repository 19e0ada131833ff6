//! 控制层：主循环、委派、过程事件、运行时组装

pub mod builder;
pub mod delegator;
pub mod events;
pub mod loop_;

pub use builder::{Agent, AgentBuilder, MAIN_PROFILE};
pub use delegator::{Delegation, DelegationSettings, Delegator, SubAgentProfile};
pub use events::LoopEvent;
pub use loop_::{run_loop, Completion, LoopSession, RunOutcome};
