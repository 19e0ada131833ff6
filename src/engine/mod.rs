//! 推理引擎抽象：决定每一步调用哪些工具、何时结束
//!
//! 真实的模型客户端是外部协作者；本 crate 只定义输入/输出契约，并提供按脚本回放的实现。

pub mod scripted;
pub mod traits;

pub use scripted::ScriptedEngine;
pub use traits::{ReasoningEngine, StepDecision, StepRequest};
