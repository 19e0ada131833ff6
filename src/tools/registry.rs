//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），由 ToolRegistry 按名注册与查找；
//! 子任务配置通过 filtered 过滤出可见子集，而不是运行时内省。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::ToolError;
use crate::state::{AgentState, Command};

/// 工具执行结果：普通值，或提议的状态更新（附一段简短摘要作为结果文本）
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Value(String),
    ProposedUpdate { command: Command, summary: String },
}

impl ToolOutput {
    pub fn value(text: impl Into<String>) -> Self {
        ToolOutput::Value(text.into())
    }

    pub fn update(command: Command, summary: impl Into<String>) -> Self {
        ToolOutput::ProposedUpdate {
            command,
            summary: summary.into(),
        }
    }
}

/// 单次调用的执行上下文：调用 id、批次开始时的状态快照、取消令牌
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub call_id: String,
    pub state: Arc<AgentState>,
    pub cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(call_id: impl Into<String>, state: Arc<AgentState>, cancel: CancellationToken) -> Self {
        Self {
            call_id: call_id.into(),
            state,
            cancel,
        }
    }
}

/// 工具 trait：名称、描述（供推理引擎理解）、参数 schema、异步执行（args 为 JSON）
#[async_trait]
pub trait Tool: Send + Sync {
    /// 工具名称（ToolCall 中的 name 字段）
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认表示无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

/// 将 JSON 参数解析为类型化结构；失败即 ValidationError
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    let args = if args.is_null() {
        Value::Object(Default::default())
    } else {
        args
    };
    serde_json::from_value(args).map_err(|e| ToolError::Validation(format!("invalid arguments: {e}")))
}

/// 由参数结构体生成 JSON Schema
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| serde_json::json!({"type": "object"}))
}

/// 工具注册表：按名称存储 Arc<dyn Tool>
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::warn!(tool = %name, "tool re-registered, previous handler replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// 只保留 allowed 中列出的工具；allowed 为空时保留全部
    pub fn filtered(&self, allowed: &[String]) -> ToolRegistry {
        if allowed.is_empty() {
            return self.clone();
        }
        let tools = self
            .tools
            .iter()
            .filter(|(name, _)| allowed.iter().any(|a| a == *name))
            .map(|(name, tool)| (name.clone(), Arc::clone(tool)))
            .collect();
        ToolRegistry { tools }
    }

    /// 工具名（排序，保证提示与日志稳定）
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// 返回 (name, description) 列表
    pub fn tool_descriptions(&self) -> Vec<(String, String)> {
        self.tool_names()
            .into_iter()
            .filter_map(|name| {
                let desc = self.tools.get(&name)?.description().to_string();
                Some((name, desc))
            })
            .collect()
    }

    /// 动态生成工具 schema JSON（与实际注册的工具一致）
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tool_names()
            .iter()
            .filter_map(|name| self.tools.get(name).map(|tool| (name, tool)))
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::value(self.0))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Named("read_file"));
        r.register(Named("write_file"));
        r.register(Named("task"));
        r
    }

    #[test]
    fn test_filtered_subset() {
        let r = registry();
        let sub = r.filtered(&["read_file".to_string(), "missing".to_string()]);
        assert_eq!(sub.tool_names(), vec!["read_file".to_string()]);
        assert_eq!(r.filtered(&[]).len(), 3);
    }

    #[test]
    fn test_schema_json_lists_all_tools() {
        let json: Vec<Value> = serde_json::from_str(&registry().to_schema_json()).unwrap();
        assert_eq!(json.len(), 3);
        assert_eq!(json[0]["name"], "read_file");
        let descriptions = registry().tool_descriptions();
        assert_eq!(descriptions[2], ("write_file".to_string(), "test tool".to_string()));
    }

    #[test]
    fn test_parse_args_maps_to_validation() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Args {
            path: String,
        }
        let err = parse_args::<Args>(serde_json::json!({"path": 3})).err().unwrap();
        assert!(matches!(err, ToolError::Validation(_)));
    }
}
