//! 工具调用 JSON Schema 生成（schemars）
//!
//! 供推理引擎的提示或外部校验使用：一批调用是 ToolCall 数组。

use schemars::schema_for;

use crate::tools::ToolCall;

/// 返回一批工具调用（ToolCall 数组）的 JSON Schema 字符串
pub fn tool_call_schema_json() -> String {
    let schema = schema_for!(Vec<ToolCall>);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}
