//! 工具调用与调用结果
//!
//! 推理引擎每步给出一批 ToolCall；Router 为每个 call id 恰好返回一个 ToolResult。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ToolError;

/// 单次工具调用：{id, name, arguments}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    /// 关联 id，批次内唯一；脚本中可省略，由引擎补全
    #[serde(default)]
    pub id: String,
    /// 工具名，如 write_file、read_todos、task
    pub name: String,
    /// 工具参数，依工具不同而不同
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// 结果负载：成功文本或失败原因
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    Ok(String),
    Error(ToolError),
}

/// 单个调用的结果，按 call_id 关联
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub name: String,
    pub payload: ToolPayload,
}

impl ToolResult {
    pub fn ok(call_id: impl Into<String>, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            payload: ToolPayload::Ok(text.into()),
        }
    }

    pub fn error(call_id: impl Into<String>, name: impl Into<String>, err: ToolError) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            payload: ToolPayload::Error(err),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.payload, ToolPayload::Ok(_))
    }

    pub fn error_kind(&self) -> Option<&'static str> {
        match &self.payload {
            ToolPayload::Ok(_) => None,
            ToolPayload::Error(e) => Some(e.kind()),
        }
    }

    /// 写入对话历史的文本
    pub fn render(&self) -> String {
        match &self.payload {
            ToolPayload::Ok(text) => text.clone(),
            ToolPayload::Error(e) => format!("Error: {}", e),
        }
    }
}
