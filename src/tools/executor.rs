//! 工具执行器
//!
//! 持有 ToolRegistry 与单次调用超时（可按工具覆盖，如 task 需要更长时间），execute 在超时内调用工具，并响应取消；
//! 每次调用输出结构化审计日志（JSON）。

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::ToolError;
use crate::tools::{Tool, ToolContext, ToolOutput, ToolRegistry};

/// 工具执行器：对每次调用施加超时，未知工具与超时统一转为 ToolError
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
    overrides: HashMap<String, Duration>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
            overrides: HashMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 为单个工具设置超时
    pub fn with_tool_timeout(mut self, tool_name: impl Into<String>, timeout: Duration) -> Self {
        self.overrides.insert(tool_name.into(), timeout);
        self
    }

    fn timeout_for(&self, tool_name: &str) -> Duration {
        self.overrides.get(tool_name).copied().unwrap_or(self.timeout)
    }

    /// 执行指定工具；输出 JSON 审计日志
    pub async fn execute(
        &self,
        tool_name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| ToolError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = tokio::select! {
            r = timeout(self.timeout_for(tool_name), tool.execute(args, ctx)) => match r {
                Ok(inner) => inner,
                Err(_) => Err(ToolError::Timeout(tool_name.to_string())),
            },
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled),
        };

        let outcome = match &result {
            Ok(ToolOutput::Value(_)) => "ok",
            Ok(ToolOutput::ProposedUpdate { .. }) => "update",
            Err(e) => e.kind(),
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "call_id": ctx.call_id,
            "ok": result.is_ok(),
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": args_preview,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        result
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokio_util::sync::CancellationToken;

    use crate::state::AgentState;

    struct Sleepy;

    #[async_trait]
    impl Tool for Sleepy {
        fn name(&self) -> &str {
            "sleepy"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ToolOutput::value("woke"))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext::new("c1", Arc::new(AgentState::new()), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let executor = ToolExecutor::new(ToolRegistry::new(), 1);
        let err = executor.execute("nope", Value::Null, &ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("nope".into()));
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 1).with_timeout(Duration::from_millis(20));
        let err = executor.execute("sleepy", Value::Null, &ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("sleepy".into()));
    }

    #[tokio::test]
    async fn test_per_tool_timeout_override() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 30)
            .with_tool_timeout("sleepy", Duration::from_millis(20));
        let err = executor.execute("sleepy", Value::Null, &ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("sleepy".into()));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let mut registry = ToolRegistry::new();
        registry.register(Sleepy);
        let executor = ToolExecutor::new(registry, 30);
        let ctx = ctx();
        ctx.cancel.cancel();
        let err = executor.execute("sleepy", Value::Null, &ctx).await.unwrap_err();
        assert_eq!(err, ToolError::Cancelled);
    }

    #[test]
    fn test_args_preview_truncates() {
        let long = serde_json::json!({"text": "x".repeat(500)});
        assert!(args_preview(&long).ends_with("..."));
    }
}
