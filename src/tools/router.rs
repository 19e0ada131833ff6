//! 工具调用路由
//!
//! 一批调用并发执行（每个调用一个 tokio 任务），按 call id 返回恰好一一对应的结果；
//! 工具提出的 Command 与该调用的结果消息一起经 StateStore 原子应用。
//! 单个调用失败（参数错误、超时、panic）只影响自身的结果，不会中止兄弟调用，也不会留下半更新。
//! dispatch 被丢弃时（例如所在的委派超时）尚未完成的调用任务会被一并中止。

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::agent::LoopEvent;
use crate::core::{TaskScheduler, ToolError};
use crate::state::{AgentState, Command, Message, ReducerRegistry, StateStore, MESSAGES};
use crate::tools::{ToolCall, ToolContext, ToolExecutor, ToolOutput, ToolResult};

/// Observation 预览最大字符数
const RESULT_PREVIEW_CHARS: usize = 200;

/// 同一批次内对同一字段的不可交换更新：最终取值取决于应用顺序，属于未定义的后写者胜。
/// calls 按批次顺序列出，不代表应用顺序
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConcurrencyHazard {
    pub field: String,
    pub calls: [String; 2],
}

/// 一个批次的执行结果
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// 与输入批次同序，每个 call id 恰好一个
    pub results: Vec<ToolResult>,
    /// 所有 Command 应用之后的状态
    pub state: AgentState,
    pub hazards: Vec<ConcurrencyHazard>,
}

struct CallRecord {
    result: ToolResult,
    applied: Option<Command>,
}

/// 工具路由：执行器 + 状态存储 + 并发池
pub struct ToolRouter {
    executor: Arc<ToolExecutor>,
    store: Arc<StateStore>,
    scheduler: Arc<TaskScheduler>,
    cancel_token: CancellationToken,
    event_tx: Option<mpsc::UnboundedSender<LoopEvent>>,
}

impl ToolRouter {
    pub fn new(
        executor: ToolExecutor,
        store: Arc<StateStore>,
        scheduler: Arc<TaskScheduler>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            executor: Arc::new(executor),
            store,
            scheduler,
            cancel_token,
            event_tx: None,
        }
    }

    pub fn with_event_tx(mut self, tx: mpsc::UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    fn send_event(&self, ev: LoopEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(ev);
        }
    }

    /// 执行一批调用，返回按 call id 对应的结果与合并后的状态
    pub async fn dispatch(&self, calls: Vec<ToolCall>) -> BatchOutcome {
        // 同批次的调用都只看到批次开始时的状态
        let snapshot = Arc::new(self.store.snapshot().await);
        let mut seen = HashSet::new();
        let mut meta = Vec::with_capacity(calls.len());
        let mut handles = Vec::with_capacity(calls.len());

        for (position, call) in calls.into_iter().enumerate() {
            let duplicate = (!seen.insert(call.id.clone())).then_some(position);
            meta.push((call.id.clone(), call.name.clone()));
            self.send_event(LoopEvent::ToolCall {
                call_id: call.id.clone(),
                tool: call.name.clone(),
                args: call.arguments.clone(),
            });
            let ctx = ToolContext::new(call.id.clone(), Arc::clone(&snapshot), self.cancel_token.clone());
            handles.push(AbortOnDropHandle::new(tokio::spawn(run_call(
                Arc::clone(&self.executor),
                Arc::clone(&self.store),
                Arc::clone(&self.scheduler),
                call,
                ctx,
                duplicate,
            ))));
        }

        let mut results = Vec::with_capacity(handles.len());
        let mut applied = Vec::new();
        for ((call_id, name), joined) in meta.into_iter().zip(join_all(handles).await) {
            let record = match joined {
                Ok(record) => record,
                Err(e) => {
                    tracing::error!(call_id = %call_id, tool = %name, error = %e, "tool task aborted");
                    record_failure(
                        &self.store,
                        call_id.clone(),
                        name.clone(),
                        ToolError::Execution(format!("tool task aborted: {e}")),
                    )
                    .await
                }
            };
            self.send_event(LoopEvent::ToolResult {
                call_id: record.result.call_id.clone(),
                tool: record.result.name.clone(),
                ok: record.result.is_ok(),
                preview: preview(&record.result.render()),
            });
            if let Some(command) = record.applied {
                applied.push((record.result.call_id.clone(), command));
            }
            results.push(record.result);
        }

        let hazards = detect_hazards(self.store.registry(), &applied);
        for hazard in &hazards {
            tracing::warn!(
                field = %hazard.field,
                calls = ?hazard.calls,
                "non-commutative updates in one batch; final value depends on apply order"
            );
            self.send_event(LoopEvent::Hazard {
                field: hazard.field.clone(),
                calls: hazard.calls.to_vec(),
            });
        }

        BatchOutcome {
            results,
            state: self.store.snapshot().await,
            hazards,
        }
    }
}

async fn run_call(
    executor: Arc<ToolExecutor>,
    store: Arc<StateStore>,
    scheduler: Arc<TaskScheduler>,
    call: ToolCall,
    ctx: ToolContext,
    duplicate: Option<usize>,
) -> CallRecord {
    let ToolCall { id, name, arguments } = call;
    if let Some(position) = duplicate {
        // 位置写进结果文本，同 id 的两条消息仍可区分
        let err = ToolError::Validation(format!(
            "duplicate call id '{id}' at batch position {position}; this call was not executed"
        ));
        return record_failure(&store, id, name, err).await;
    }

    let _permit = scheduler.acquire_tool().await;
    match executor.execute(&name, arguments, &ctx).await {
        Ok(ToolOutput::Value(text)) => {
            let message = result_message(store.registry(), Command::new(), &id, &text);
            if let Err(e) = store.apply(message).await {
                tracing::warn!(call_id = %id, error = %e, "failed to record tool result message");
            }
            CallRecord {
                result: ToolResult::ok(id, name, text),
                applied: None,
            }
        }
        Ok(ToolOutput::ProposedUpdate { command, summary }) => {
            if let Err(e) = store.registry().validate(&command) {
                tracing::warn!(call_id = %id, tool = %name, error = %e, "proposed update rejected");
                return record_failure(&store, id, name, e.into()).await;
            }
            let combined = result_message(store.registry(), command.clone(), &id, &summary);
            match store.apply(combined).await {
                Ok(_) => CallRecord {
                    result: ToolResult::ok(id, name, summary),
                    applied: Some(command),
                },
                Err(e) => record_failure(&store, id, name, e.into()).await,
            }
        }
        Err(e) => record_failure(&store, id, name, e).await,
    }
}

/// 失败调用只写入一条错误结果消息，不应用任何来自该调用的更新
async fn record_failure(store: &StateStore, call_id: String, name: String, err: ToolError) -> CallRecord {
    let result = ToolResult::error(call_id, name, err);
    let message = result_message(store.registry(), Command::new(), &result.call_id, &result.render());
    if let Err(e) = store.apply(message).await {
        tracing::warn!(call_id = %result.call_id, error = %e, "failed to record tool error message");
    }
    CallRecord {
        result,
        applied: None,
    }
}

/// 在 Command 之后追加与 call id 关联的结果消息（注册表没有 messages 字段时不追加）
fn result_message(registry: &ReducerRegistry, command: Command, call_id: &str, text: &str) -> Command {
    if registry.is_registered(MESSAGES) {
        command.append_messages(vec![Message::tool(call_id, text)])
    } else {
        command
    }
}

fn detect_hazards(registry: &ReducerRegistry, applied: &[(String, Command)]) -> Vec<ConcurrencyHazard> {
    let mut hazards = Vec::new();
    for (i, (a_call, first)) in applied.iter().enumerate() {
        for (b_call, second) in &applied[i + 1..] {
            for (field, a) in first.iter() {
                if let Some(b) = second.get(field) {
                    if registry.conflicts(field, a, b) {
                        hazards.push(ConcurrencyHazard {
                            field: field.to_string(),
                            calls: [a_call.clone(), b_call.clone()],
                        });
                    }
                }
            }
        }
    }
    hazards
}

fn preview(text: &str) -> String {
    if text.chars().count() > RESULT_PREVIEW_CHARS {
        format!("{}...", text.chars().take(RESULT_PREVIEW_CHARS).collect::<String>())
    } else {
        text.to_string()
    }
}
