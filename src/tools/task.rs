//! task 工具：把子任务委派给隔离的子循环
//!
//! 参数 { description, subagent_type }；子任务结束后提出的 Command 只含改动过的文件，
//! 其最终回复作为本次调用的结果文本，由 Router 写成唯一一条关联消息。
//! 调用被放弃时子循环随之取消，子任务中的工具调用一并中止，子状态直接丢弃。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::agent::Delegator;
use crate::core::ToolError;
use crate::tools::{parse_args, schema_of, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
struct TaskArgs {
    /// 交给子任务的完整任务描述（子任务看不到父级对话）
    description: String,
    /// 子任务配置名
    subagent_type: String,
}

/// task 工具
pub struct TaskTool {
    delegator: Arc<Delegator>,
    description: String,
}

impl TaskTool {
    pub fn new(delegator: Arc<Delegator>) -> Self {
        let mut description = String::from(
            "Launch an isolated sub-agent for a self-contained task. The sub-agent sees only the \
             description you give it and a copy of the current files; it returns one final report \
             and any files it wrote.\n\nAvailable sub-agents:",
        );
        for profile in delegator.profiles() {
            description.push_str(&format!("\n- {}: {}", profile.name, profile.description));
        }
        Self {
            delegator,
            description,
        }
    }
}

#[async_trait]
impl Tool for TaskTool {
    fn name(&self) -> &str {
        "task"
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<TaskArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args: TaskArgs = parse_args(args)?;
        // 本次调用被丢弃（超时或父批次中止）时取消子循环
        let child_token = ctx.cancel.child_token();
        let _cancel_on_drop = child_token.clone().drop_guard();
        let delegation = self
            .delegator
            .delegate(&args.description, &args.subagent_type, &ctx.state, child_token)
            .await?;
        Ok(ToolOutput::update(delegation.command(), delegation.final_message))
    }
}
