//! 子任务委派
//!
//! 为子任务创建隔离的聚合状态：消息只由任务描述构成，文件表是父状态在派生时刻的快照副本；
//! 用子任务配置过滤出的工具集驱动同一个控制循环，直到结束或步数预算耗尽；
//! 结束后只把子任务改动过的文件（以及由 Router 写入的一条结果消息）作为一个 Command 合并回父状态。
//! 子任务的任务列表与完整消息历史永远不会回传；被取消或失败的委派直接丢弃，不做部分合并。

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::agent::{run_loop, Completion, LoopEvent, LoopSession};
use crate::core::{AgentError, StepBudget, TaskScheduler, ToolError};
use crate::engine::ReasoningEngine;
use crate::state::view::changed_files;
use crate::state::{AgentState, Command, FileTable, Message, ReducerRegistry, StateStore};
use crate::tools::{ToolExecutor, ToolRegistry, ToolRouter};

/// 子任务配置：名称、说明（供父级推理引擎选择）、指令、可用工具子集（为空表示全部基础工具）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubAgentProfile {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub tools: Vec<String>,
}

impl SubAgentProfile {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_tools(mut self, tools: Vec<String>) -> Self {
        self.tools = tools;
        self
    }
}

/// 子循环参数
#[derive(Debug, Clone)]
pub struct DelegationSettings {
    pub max_steps: usize,
    pub tool_timeout_secs: u64,
    pub max_concurrent_tools: usize,
}

impl Default for DelegationSettings {
    fn default() -> Self {
        Self {
            max_steps: 12,
            tool_timeout_secs: 300,
            max_concurrent_tools: 8,
        }
    }
}

/// 一次完成的委派：待合并回父状态的内容
#[derive(Debug, Clone)]
pub struct Delegation {
    pub profile: String,
    /// 合成的结果消息内容（子任务的最终回复）
    pub final_message: String,
    /// 子任务新增或修改的文件
    pub files: FileTable,
    pub steps: usize,
    pub completion: Completion,
}

impl Delegation {
    /// 合并回父状态的 Command：只含 files 字段
    pub fn command(&self) -> Command {
        Command::new().with_files(self.files.clone())
    }
}

/// 委派器
pub struct Delegator {
    engine: Arc<dyn ReasoningEngine>,
    /// 子任务可见的基础工具（不含 task，子任务不能再委派）
    tools: ToolRegistry,
    reducers: Arc<ReducerRegistry>,
    profiles: HashMap<String, SubAgentProfile>,
    scheduler: Arc<TaskScheduler>,
    settings: DelegationSettings,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl Delegator {
    pub fn new(
        engine: Arc<dyn ReasoningEngine>,
        tools: ToolRegistry,
        reducers: Arc<ReducerRegistry>,
        scheduler: Arc<TaskScheduler>,
        settings: DelegationSettings,
    ) -> Self {
        Self {
            engine,
            tools,
            reducers,
            profiles: HashMap::new(),
            scheduler,
            settings,
            event_tx: None,
        }
    }

    pub fn with_profile(mut self, profile: SubAgentProfile) -> Self {
        self.register_profile(profile);
        self
    }

    pub fn register_profile(&mut self, profile: SubAgentProfile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// 配置列表（按名称排序）
    pub fn profiles(&self) -> Vec<&SubAgentProfile> {
        let mut profiles: Vec<&SubAgentProfile> = self.profiles.values().collect();
        profiles.sort_by(|a, b| a.name.cmp(&b.name));
        profiles
    }

    fn send_event(&self, ev: LoopEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 执行一次委派。超出并发预算立即拒绝；取消或子循环失败时丢弃子状态。
    pub async fn delegate(
        &self,
        description: &str,
        profile_name: &str,
        parent: &AgentState,
        cancel_token: CancellationToken,
    ) -> Result<Delegation, ToolError> {
        if description.trim().is_empty() {
            return Err(ToolError::Validation("task description is empty".to_string()));
        }
        let profile = self.profiles.get(profile_name).ok_or_else(|| {
            let known: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
            ToolError::Validation(format!(
                "unknown sub-agent profile '{}'; available: {:?}",
                profile_name, known
            ))
        })?;
        if self.settings.max_steps == 0 {
            return Err(ToolError::BudgetExceeded("delegation step budget is zero".to_string()));
        }
        let Some(_permit) = self.scheduler.try_acquire_delegation() else {
            let reason = format!(
                "at most {} concurrent delegations allowed",
                self.scheduler.max_delegations()
            );
            tracing::warn!(profile = %profile.name, %reason, "delegation refused");
            self.send_event(LoopEvent::DelegationRefused {
                profile: profile.name.clone(),
                reason: reason.clone(),
            });
            return Err(ToolError::BudgetExceeded(reason));
        };

        let seed = parent.files();
        let store = Arc::new(StateStore::seeded(
            Arc::clone(&self.reducers),
            Command::new()
                .with_messages(vec![Message::user(description)])
                .with_files(seed.clone()),
        )?);

        let visible = self.tools.filtered(&profile.tools);
        let mut router = ToolRouter::new(
            ToolExecutor::new(visible, self.settings.tool_timeout_secs),
            store,
            Arc::new(TaskScheduler::new(self.settings.max_concurrent_tools, 0)),
            cancel_token,
        );
        if let Some(tx) = &self.event_tx {
            router = router.with_event_tx(tx.clone());
        }

        tracing::info!(profile = %profile.name, "delegation started");
        self.send_event(LoopEvent::DelegationStarted {
            profile: profile.name.clone(),
            description: description.to_string(),
        });

        let mut session = LoopSession::new(self.engine.as_ref(), &router, &profile.name)
            .with_instructions(&profile.instructions);
        if let Some(tx) = &self.event_tx {
            session = session.with_event_tx(tx);
        }
        let mut budget = StepBudget::new(self.settings.max_steps);
        let outcome = match run_loop(&session, &mut budget).await {
            Ok(outcome) => outcome,
            Err(AgentError::Cancelled) => {
                tracing::info!(profile = %profile.name, "delegation cancelled, child state discarded");
                return Err(ToolError::Cancelled);
            }
            Err(e) => {
                tracing::warn!(profile = %profile.name, error = %e, "delegation failed, child state discarded");
                return Err(ToolError::Execution(format!(
                    "sub-task '{}' failed: {}",
                    profile.name, e
                )));
            }
        };

        let files = changed_files(&seed, &outcome.state.files());
        tracing::info!(
            profile = %profile.name,
            steps = outcome.steps,
            files = files.len(),
            completed = outcome.completion == Completion::Finished,
            "delegation finished"
        );
        self.send_event(LoopEvent::DelegationFinished {
            profile: profile.name.clone(),
            steps: outcome.steps,
            files_merged: files.len(),
            completed: outcome.completion == Completion::Finished,
        });

        Ok(Delegation {
            profile: profile.name.clone(),
            final_message: outcome.final_message,
            files,
            steps: outcome.steps,
            completion: outcome.completion,
        })
    }
}
