//! Agent 构建器：统一组装状态合并规则、工具集、委派器与控制循环
//!
//! 基础工具（ls / read_file / write_file / edit_file / write_todos / read_todos）同时供主循环与子任务使用；
//! 只有主循环额外拥有 task 工具，且仅在配置了子任务时注册。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::agent::{run_loop, Delegator, LoopEvent, LoopSession, RunOutcome, SubAgentProfile};
use crate::config::AppConfig;
use crate::core::{AgentError, SessionSupervisor, StepBudget, TaskScheduler};
use crate::engine::ReasoningEngine;
use crate::state::{Command, Message, ReducerRegistry, StateStore};
use crate::tools::{
    EditFileTool, LsTool, ReadFileTool, ReadTodosTool, TaskTool, Tool, ToolExecutor, ToolRegistry,
    ToolRouter, WriteFileTool, WriteTodosTool,
};

/// 主循环的配置名
pub const MAIN_PROFILE: &str = "main";

/// Agent 构建器
pub struct AgentBuilder {
    engine: Arc<dyn ReasoningEngine>,
    config: AppConfig,
    reducers: ReducerRegistry,
    extra_tools: Vec<Arc<dyn Tool>>,
    profiles: Vec<SubAgentProfile>,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl AgentBuilder {
    /// 子任务配置默认取自 config.subagents
    pub fn new(engine: Arc<dyn ReasoningEngine>, config: AppConfig) -> Self {
        let profiles = config.subagents.clone();
        Self {
            engine,
            config,
            reducers: ReducerRegistry::with_defaults(),
            extra_tools: Vec::new(),
            profiles,
            event_tx: None,
        }
    }

    /// 替换字段合并规则（例如注册额外字段）
    pub fn with_reducers(mut self, reducers: ReducerRegistry) -> Self {
        self.reducers = reducers;
        self
    }

    /// 追加一个基础工具（主循环与子任务都可见）
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.extra_tools.push(Arc::new(tool));
        self
    }

    pub fn with_profile(mut self, profile: SubAgentProfile) -> Self {
        self.profiles.retain(|p| p.name != profile.name);
        self.profiles.push(profile);
        self
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 构建基础工具注册表（不含 task）
    pub fn build_base_tools(&self) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(LsTool);
        tools.register(ReadFileTool::new(self.config.tools.read_default_limit));
        tools.register(WriteFileTool);
        tools.register(EditFileTool);
        tools.register(WriteTodosTool);
        tools.register(ReadTodosTool);
        for tool in &self.extra_tools {
            tools.register_arc(Arc::clone(tool));
        }
        tools
    }

    pub fn build(self) -> Agent {
        let base = self.build_base_tools();
        let reducers = Arc::new(self.reducers);
        let scheduler = Arc::new(TaskScheduler::new(
            self.config.tools.max_concurrent,
            self.config.delegation.max_concurrent,
        ));

        let mut tools = base.clone();
        if !self.profiles.is_empty() {
            let mut delegator = Delegator::new(
                Arc::clone(&self.engine),
                base,
                Arc::clone(&reducers),
                Arc::clone(&scheduler),
                self.config.delegation_settings(),
            );
            for profile in self.profiles {
                delegator.register_profile(profile);
            }
            if let Some(tx) = &self.event_tx {
                delegator = delegator.with_event_tx(tx.clone());
            }
            tools.register(TaskTool::new(Arc::new(delegator)));
        }

        Agent {
            engine: self.engine,
            reducers,
            tools,
            scheduler,
            config: self.config,
            supervisor: SessionSupervisor::new(),
            event_tx: self.event_tx,
        }
    }
}

/// 组装完成的 Agent：每次 run 使用全新的状态存储
pub struct Agent {
    engine: Arc<dyn ReasoningEngine>,
    reducers: Arc<ReducerRegistry>,
    tools: ToolRegistry,
    scheduler: Arc<TaskScheduler>,
    config: AppConfig,
    supervisor: SessionSupervisor,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl Agent {
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.tool_names()
    }

    /// 取消令牌：取消后所有进行中与之后的运行都以 Cancelled 结束
    pub fn cancel_token(&self) -> CancellationToken {
        self.supervisor.cancel_token()
    }

    pub fn cancel(&self) {
        self.supervisor.cancel();
    }

    /// 以一条用户消息开始一次运行
    pub async fn run(&self, input: &str) -> Result<RunOutcome, AgentError> {
        self.run_with_seed(Command::new().with_messages(vec![Message::user(input)]))
            .await
    }

    /// 以任意初始 Command 开始一次运行（例如预置文件）
    pub async fn run_with_seed(&self, seed: Command) -> Result<RunOutcome, AgentError> {
        let run_id = uuid::Uuid::new_v4();
        let store = Arc::new(StateStore::seeded(Arc::clone(&self.reducers), seed)?);
        let executor = ToolExecutor::new(self.tools.clone(), self.config.tools.tool_timeout_secs)
            .with_tool_timeout(
                "task",
                Duration::from_secs(self.config.delegation.timeout_secs),
            );
        let mut router = ToolRouter::new(
            executor,
            store,
            Arc::clone(&self.scheduler),
            self.supervisor.child_token(),
        );
        if let Some(tx) = &self.event_tx {
            router = router.with_event_tx(tx.clone());
        }

        let mut session = LoopSession::new(self.engine.as_ref(), &router, MAIN_PROFILE)
            .with_instructions(&self.config.run.instructions);
        if let Some(tx) = &self.event_tx {
            session = session.with_event_tx(tx);
        }
        let mut budget = StepBudget::new(self.config.run.max_steps);

        let span = tracing::info_span!("run", %run_id);
        run_loop(&session, &mut budget).instrument(span).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::agent::Completion;
    use crate::engine::{ScriptedEngine, StepDecision};
    use crate::state::Role;
    use crate::tools::ToolCall;

    fn agent(engine: ScriptedEngine, config: AppConfig) -> (Agent, Arc<ScriptedEngine>) {
        let engine = Arc::new(engine);
        let agent = AgentBuilder::new(engine.clone(), config).build();
        (agent, engine)
    }

    #[test]
    fn test_task_tool_only_with_profiles() {
        let (plain, _) = agent(ScriptedEngine::new(), AppConfig::default());
        assert!(!plain.tool_names().contains(&"task".to_string()));
        assert_eq!(plain.tool_names().len(), 6);

        let delegating = AgentBuilder::new(Arc::new(ScriptedEngine::new()), AppConfig::default())
            .with_profile(SubAgentProfile::new("researcher", "reads"))
            .build();
        assert!(delegating.tool_names().contains(&"task".to_string()));
    }

    #[tokio::test]
    async fn test_run_until_finish() {
        let engine = ScriptedEngine::new().script(
            MAIN_PROFILE,
            vec![
                StepDecision::calls(vec![ToolCall::new(
                    "c1",
                    "write_file",
                    json!({"file_path": "x.txt", "content": "hello"}),
                )]),
                StepDecision::finish("done"),
            ],
        );
        let (agent, engine) = agent(engine, AppConfig::default());

        let outcome = agent.run("write x").await.unwrap();
        assert_eq!(outcome.completion, Completion::Finished);
        assert_eq!(outcome.final_message, "done");
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.state.files().get("x.txt").map(String::as_str), Some("hello"));

        let roles: Vec<Role> = outcome.state.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Tool, Role::Assistant]);

        let requests = engine.requests();
        assert_eq!(requests[1].files, vec!["x.txt".to_string()]);
        assert_eq!(requests[0].profile, MAIN_PROFILE);
    }

    #[tokio::test]
    async fn test_budget_exhaustion_is_not_an_error() {
        let read = || StepDecision::calls(vec![ToolCall::new("", "read_todos", json!({}))]);
        let engine = ScriptedEngine::new().script(MAIN_PROFILE, vec![read(), read(), read()]);
        let mut config = AppConfig::default();
        config.run.max_steps = 2;
        let (agent, engine) = agent(engine, config);

        let outcome = agent.run("loop").await.unwrap();
        assert_eq!(outcome.completion, Completion::BudgetExhausted);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.final_message, "No todos.");
        assert_eq!(engine.remaining(MAIN_PROFILE), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let engine = ScriptedEngine::new().script(MAIN_PROFILE, vec![StepDecision::finish("x")]);
        let (agent, engine) = agent(engine, AppConfig::default());
        agent.cancel();

        let err = agent.run("hi").await.unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert!(engine.requests().is_empty());
    }

    #[tokio::test]
    async fn test_engine_error_propagates() {
        let (agent, _) = agent(ScriptedEngine::new(), AppConfig::default());
        let err = agent.run("hi").await.unwrap_err();
        match err {
            AgentError::Engine(msg) => assert!(msg.contains("exhausted")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_seeded_run_sees_files() {
        let engine = ScriptedEngine::new().script(
            MAIN_PROFILE,
            vec![
                StepDecision::calls(vec![ToolCall::new(
                    "r1",
                    "read_file",
                    json!({"file_path": "notes.md"}),
                )]),
                StepDecision::finish("read it"),
            ],
        );
        let (agent, _) = agent(engine, AppConfig::default());
        let seed = Command::new()
            .with_messages(vec![Message::user("summarize")])
            .with_files([("notes.md".to_string(), "a\nb\n".to_string())].into_iter().collect());

        let outcome = agent.run_with_seed(seed).await.unwrap();
        let tool_msg = outcome
            .state
            .messages()
            .into_iter()
            .find(|m| m.role == Role::Tool)
            .unwrap();
        assert_eq!(tool_msg.call_id.as_deref(), Some("r1"));
        assert_eq!(tool_msg.content, "a\nb\n");
    }
}
