//! 推理引擎契约
//!
//! 每一步输入当前状态视图（消息、任务列表、文件列表、可用工具），输出一批工具调用或结束信号。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::state::{Message, TodoItem};
use crate::tools::ToolCall;

/// 单步推理的输入
#[derive(Debug, Clone, Serialize)]
pub struct StepRequest {
    /// 当前运行的配置名（主循环为 "main"，委派时为子任务配置名）
    pub profile: String,
    pub instructions: String,
    /// 从 0 开始的步号
    pub step: usize,
    pub messages: Vec<Message>,
    pub todos: Vec<TodoItem>,
    /// 文件路径列表（只给路径，不给内容）
    pub files: Vec<String>,
    /// 本次运行可见的工具名
    pub tools: Vec<String>,
}

/// 单步推理的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepDecision {
    /// 调用一批工具（可并发执行）
    ToolCalls {
        #[serde(default)]
        thought: Option<String>,
        calls: Vec<ToolCall>,
    },
    /// 结束并给出最终回复
    Finish { message: String },
}

impl StepDecision {
    pub fn calls(calls: Vec<ToolCall>) -> Self {
        StepDecision::ToolCalls {
            thought: None,
            calls,
        }
    }

    pub fn finish(message: impl Into<String>) -> Self {
        StepDecision::Finish {
            message: message.into(),
        }
    }
}

/// 推理引擎 trait
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn step(&self, request: &StepRequest) -> Result<StepDecision, String>;
}
