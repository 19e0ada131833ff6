//! 控制主循环
//!
//! 推理一步 -> Router 并发执行该批工具调用并合并结果 -> 下一步；
//! 推理引擎给出 Finish 时结束，步数预算耗尽时以当前状态结束（不是错误），取消时返回 Cancelled。
//! 主循环与委派子循环共用这一实现。

use tokio::sync::mpsc;

use crate::agent::LoopEvent;
use crate::core::{AgentError, StepBudget};
use crate::engine::{ReasoningEngine, StepDecision, StepRequest};
use crate::state::{AgentState, Command, Message, Role, StateStore, MESSAGES};
use crate::tools::{ConcurrencyHazard, ToolRouter};

/// 思考内容展示最大字符数
const THINKING_PREVIEW_CHARS: usize = 800;

/// 循环如何结束
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// 推理引擎给出了最终回复
    Finished,
    /// 步数预算耗尽，强制结束
    BudgetExhausted,
}

/// 一次运行的结果
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub final_message: String,
    pub completion: Completion,
    pub steps: usize,
    pub state: AgentState,
    /// 整个运行中观察到的同批次冲突
    pub hazards: Vec<ConcurrencyHazard>,
}

/// 一次运行的配置
pub struct LoopSession<'a> {
    pub engine: &'a dyn ReasoningEngine,
    pub router: &'a ToolRouter,
    /// 配置名（"main" 或子任务配置名）
    pub profile: &'a str,
    pub instructions: &'a str,
    pub event_tx: Option<&'a mpsc::UnboundedSender<LoopEvent>>,
}

impl<'a> LoopSession<'a> {
    pub fn new(engine: &'a dyn ReasoningEngine, router: &'a ToolRouter, profile: &'a str) -> Self {
        Self {
            engine,
            router,
            profile,
            instructions: "",
            event_tx: None,
        }
    }

    pub fn with_instructions(mut self, instructions: &'a str) -> Self {
        self.instructions = instructions;
        self
    }

    pub fn with_event_tx(mut self, tx: &'a mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, ev: LoopEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }
}

/// 运行控制循环直到结束、预算耗尽或取消
pub async fn run_loop(
    session: &LoopSession<'_>,
    budget: &mut StepBudget,
) -> Result<RunOutcome, AgentError> {
    let router = session.router;
    let store = router.store();
    let cancel_token = router.cancel_token().clone();
    let tools = router.tool_names();
    let mut hazards = Vec::new();

    loop {
        if cancel_token.is_cancelled() {
            session.send_event(LoopEvent::Error {
                text: "Cancelled".to_string(),
            });
            return Err(AgentError::Cancelled);
        }

        let state = store.snapshot().await;
        if !budget.try_consume() {
            tracing::info!(profile = session.profile, steps = budget.used(), "step budget exhausted");
            session.send_event(LoopEvent::BudgetExhausted {
                profile: session.profile.to_string(),
                steps: budget.used(),
            });
            return Ok(RunOutcome {
                final_message: last_output(&state).unwrap_or_else(|| {
                    format!("Stopped after {} steps without a final answer.", budget.used())
                }),
                completion: Completion::BudgetExhausted,
                steps: budget.used(),
                state,
                hazards,
            });
        }

        let step = budget.used() - 1;
        session.send_event(LoopEvent::StepUpdate {
            profile: session.profile.to_string(),
            step,
            max_steps: budget.limit(),
        });

        let request = StepRequest {
            profile: session.profile.to_string(),
            instructions: session.instructions.to_string(),
            step,
            messages: state.messages(),
            todos: state.todos(),
            files: state.files().into_keys().collect(),
            tools: tools.clone(),
        };
        let decision = tokio::select! {
            d = session.engine.step(&request) => d.map_err(AgentError::Engine)?,
            _ = cancel_token.cancelled() => return Err(AgentError::Cancelled),
        };

        match decision {
            StepDecision::Finish { message } => {
                let state = record(store, Message::assistant(message.clone())).await?;
                tracing::info!(profile = session.profile, steps = budget.used(), "run finished");
                session.send_event(LoopEvent::Finished {
                    profile: session.profile.to_string(),
                    message: message.clone(),
                });
                return Ok(RunOutcome {
                    final_message: message,
                    completion: Completion::Finished,
                    steps: budget.used(),
                    state,
                    hazards,
                });
            }
            StepDecision::ToolCalls { thought, calls } => {
                if let Some(thought) = thought.filter(|t| !t.trim().is_empty()) {
                    session.send_event(LoopEvent::ThinkingContent {
                        profile: session.profile.to_string(),
                        text: thought.chars().take(THINKING_PREVIEW_CHARS).collect(),
                    });
                    record(store, Message::assistant(thought)).await?;
                }
                if calls.is_empty() {
                    tracing::debug!(profile = session.profile, step, "empty tool batch");
                    continue;
                }
                tracing::debug!(profile = session.profile, step, calls = calls.len(), "dispatching batch");
                let outcome = router.dispatch(calls).await;
                hazards.extend(outcome.hazards);
            }
        }
    }
}

/// 追加一条消息；未注册 messages 字段时只返回当前状态
async fn record(store: &StateStore, message: Message) -> Result<AgentState, AgentError> {
    if !store.registry().is_registered(MESSAGES) {
        return Ok(store.snapshot().await);
    }
    Ok(store
        .apply(Command::new().with_messages(vec![message]))
        .await?)
}

/// 最近一条 assistant 或 tool 消息，用作预算耗尽时的结果
fn last_output(state: &AgentState) -> Option<String> {
    state
        .messages()
        .into_iter()
        .rev()
        .find(|m| matches!(m.role, Role::Assistant | Role::Tool))
        .map(|m| m.content)
}
