//! 错误类型
//!
//! - ToolError：单次工具调用/委派的失败，只作为该 call id 的结果返回，不会中止整个批次
//! - StateError：Command 校验失败（未注册字段、非法字段值）
//! - AgentError：控制循环本身的失败（推理引擎错误、取消、配置）

use thiserror::Error;

/// 单次工具调用的失败；总是被 Router 转成结果负载
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// 参数格式错误、状态枚举值非法等
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// 委派并发上限或步数上限
    #[error("Budget exceeded: {0}")]
    BudgetExceeded(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Cancelled")]
    Cancelled,
}

impl ToolError {
    /// 错误类别名，用于审计日志与结果渲染
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(_) | ToolError::UnknownTool(_) => "validation",
            ToolError::NotFound(_) => "not_found",
            ToolError::BudgetExceeded(_) => "budget_exceeded",
            ToolError::Timeout(_) => "timeout",
            ToolError::Execution(_) => "execution",
            ToolError::Cancelled => "cancelled",
        }
    }
}

/// Command 校验失败
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("Unregistered state field: {0}")]
    UnregisteredField(String),

    #[error("Invalid value for field '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<StateError> for ToolError {
    fn from(e: StateError) -> Self {
        ToolError::Validation(e.to_string())
    }
}

/// 控制循环（主循环或委派子循环）的失败
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Reasoning engine error: {0}")]
    Engine(String),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Cancelled")]
    Cancelled,
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_error_kinds() {
        assert_eq!(ToolError::Validation("x".into()).kind(), "validation");
        assert_eq!(ToolError::UnknownTool("x".into()).kind(), "validation");
        assert_eq!(ToolError::BudgetExceeded("x".into()).kind(), "budget_exceeded");
        assert_eq!(ToolError::Cancelled.kind(), "cancelled");
    }

    #[test]
    fn test_state_error_becomes_validation() {
        let err: ToolError = StateError::UnregisteredField("notes".into()).into();
        assert!(matches!(err, ToolError::Validation(msg) if msg.contains("notes")));
    }

    #[test]
    fn test_config_error_maps_to_agent_error() {
        let err: AgentError = config::ConfigError::NotFound("run.max_steps".into()).into();
        assert!(matches!(err, AgentError::Config(msg) if msg.contains("run.max_steps")));
    }
}
