//! 控制循环过程事件：用于流式展示步数、工具调用、结果、冲突与委派

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 步数更新（当前第几步）
    StepUpdate {
        profile: String,
        step: usize,
        max_steps: usize,
    },
    /// 推理引擎给出的思考内容
    ThinkingContent { profile: String, text: String },
    ToolCall {
        call_id: String,
        tool: String,
        args: serde_json::Value,
    },
    /// 工具返回（预览，避免过长）
    ToolResult {
        call_id: String,
        tool: String,
        ok: bool,
        preview: String,
    },
    /// 同批次不可交换更新
    Hazard { field: String, calls: Vec<String> },
    DelegationStarted { profile: String, description: String },
    DelegationFinished {
        profile: String,
        steps: usize,
        files_merged: usize,
        completed: bool,
    },
    /// 超出并发预算，委派被拒绝
    DelegationRefused { profile: String, reason: String },
    /// 步数预算耗尽，循环以当前状态结束
    BudgetExhausted { profile: String, steps: usize },
    Finished { profile: String, message: String },
    Error { text: String },
}
