//! 任务列表工具：write_todos 整体替换，read_todos 只读渲染
//!
//! 不支持逐项修改：调用方每次都必须给出完整的目标列表。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::state::view::render_todos;
use crate::state::{Command, TodoItem};
use crate::tools::{parse_args, schema_of, Tool, ToolContext, ToolOutput};

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteTodosArgs {
    /// 完整的任务列表，替换当前列表
    todos: Vec<TodoItem>,
}

/// write_todos：替换整个任务列表
pub struct WriteTodosTool;

#[async_trait]
impl Tool for WriteTodosTool {
    fn name(&self) -> &str {
        "write_todos"
    }

    fn description(&self) -> &str {
        r#"Replace the whole todo list. Always send the complete desired list.
Status must be one of: pending, in_progress, completed.
Example: {"todos": [{"content": "Research topic", "status": "in_progress"}]}"#
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WriteTodosArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args: WriteTodosArgs = parse_args(args)?;
        let summary = format!(
            "Updated todo list ({} items):\n{}",
            args.todos.len(),
            render_todos(&args.todos)
        );
        Ok(ToolOutput::update(Command::new().with_todos(args.todos), summary))
    }
}

/// read_todos：渲染当前任务列表，不修改状态
pub struct ReadTodosTool;

#[async_trait]
impl Tool for ReadTodosTool {
    fn name(&self) -> &str {
        "read_todos"
    }

    fn description(&self) -> &str {
        "Show the current todo list with each item's status."
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        Ok(ToolOutput::value(render_todos(&ctx.state.todos())))
    }
}
