//! 状态存储：持有当前聚合状态，唯一的修改入口 apply(command)
//!
//! apply 在内部锁下串行执行：先对 Command 中所有字段完成校验与合并，全部成功后才提交，
//! 因此 N 个并发提交的 Command 的净效果等于某个全序下逐个合并的结果，且不会出现半更新。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::core::StateError;
use crate::state::{AgentState, Command, ReducerRegistry};

/// 将 Command 合并到给定状态之上，返回新状态；任一字段失败则整体失败
pub fn fold(
    registry: &ReducerRegistry,
    state: &AgentState,
    command: &Command,
) -> Result<AgentState, StateError> {
    registry.validate(command)?;
    let mut next = state.clone();
    for (field, value) in command.iter() {
        let merged = registry.merge(field, state.get(field), Some(value))?;
        next.set(field, merged);
    }
    Ok(next)
}

/// 单写者状态存储
pub struct StateStore {
    registry: Arc<ReducerRegistry>,
    state: Mutex<AgentState>,
    /// 已成功应用的 Command 数
    applied: AtomicU64,
}

impl StateStore {
    pub fn new(registry: Arc<ReducerRegistry>) -> Self {
        Self {
            registry,
            state: Mutex::new(AgentState::new()),
            applied: AtomicU64::new(0),
        }
    }

    /// 以初始 Command 构造（主循环的用户输入、委派时的受限快照）
    pub fn seeded(registry: Arc<ReducerRegistry>, initial: Command) -> Result<Self, StateError> {
        let state = fold(&registry, &AgentState::new(), &initial)?;
        Ok(Self {
            registry,
            state: Mutex::new(state),
            applied: AtomicU64::new(u64::from(!initial.is_empty())),
        })
    }

    pub fn registry(&self) -> &Arc<ReducerRegistry> {
        &self.registry
    }

    /// 原子地应用 Command，返回应用后的状态
    pub async fn apply(&self, command: Command) -> Result<AgentState, StateError> {
        let mut guard = self.state.lock().await;
        let next = fold(&self.registry, &guard, &command)?;
        *guard = next.clone();
        let seq = self.applied.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            seq,
            fields = ?command.fields().collect::<Vec<_>>(),
            "state command applied"
        );
        Ok(next)
    }

    /// 当前状态的独立副本（快照，不随后续 apply 变化）
    pub async fn snapshot(&self) -> AgentState {
        self.state.lock().await.clone()
    }

    pub fn applied_count(&self) -> u64 {
        self.applied.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{FileTable, Message, TodoItem, TodoStatus, TODOS};
    use serde_json::json;

    fn store() -> Arc<StateStore> {
        Arc::new(StateStore::new(Arc::new(ReducerRegistry::with_defaults())))
    }

    fn file(path: &str, content: &str) -> FileTable {
        let mut table = FileTable::new();
        table.insert(path.to_string(), content.to_string());
        table
    }

    #[tokio::test]
    async fn test_todo_overwrite_last_applied_wins() {
        let store = store();
        let lists = vec![
            vec![TodoItem::new("A", TodoStatus::Pending)],
            vec![
                TodoItem::new("A", TodoStatus::Completed),
                TodoItem::new("B", TodoStatus::InProgress),
            ],
            vec![TodoItem::new("C", TodoStatus::Pending)],
        ];
        for list in &lists {
            store.apply(Command::new().with_todos(list.clone())).await.unwrap();
        }
        assert_eq!(store.snapshot().await.todos(), lists[2]);
    }

    #[tokio::test]
    async fn test_invalid_command_leaves_state_unchanged() {
        let store = store();
        store
            .apply(Command::new().with_files(file("a.txt", "1")))
            .await
            .unwrap();
        let before = store.snapshot().await;
        let bad = Command::new()
            .with_files(file("b.txt", "2"))
            .with_field(TODOS, json!([{"content": "A", "status": "blocked"}]));
        assert!(store.apply(bad).await.is_err());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn test_disjoint_file_commands_commute() {
        let a = Command::new().with_files(file("a.txt", "A"));
        let b = Command::new().with_files(file("b.txt", "B"));

        let first = store();
        first.apply(a.clone()).await.unwrap();
        first.apply(b.clone()).await.unwrap();

        let second = store();
        second.apply(b).await.unwrap();
        second.apply(a).await.unwrap();

        assert_eq!(first.snapshot().await.files(), second.snapshot().await.files());
    }

    #[tokio::test]
    async fn test_concurrent_applies_are_serialized() {
        let store = store();
        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .apply(
                        Command::new()
                            .with_messages(vec![Message::user(format!("m{i}"))])
                            .with_files(file(&format!("f{i}"), "x")),
                    )
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let state = store.snapshot().await;
        assert_eq!(state.messages().len(), 32);
        assert_eq!(state.files().len(), 32);
        assert_eq!(store.applied_count(), 32);
    }

    #[test]
    fn test_seeded_counts_only_non_empty_seed() {
        let registry = Arc::new(ReducerRegistry::with_defaults());
        let empty = StateStore::seeded(Arc::clone(&registry), Command::new()).unwrap();
        assert_eq!(empty.applied_count(), 0);
        let seeded = StateStore::seeded(
            registry,
            Command::new().with_messages(vec![Message::user("hi")]),
        )
        .unwrap();
        assert_eq!(seeded.applied_count(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_is_detached() {
        let store = store();
        store
            .apply(Command::new().with_files(file("x.txt", "hello")))
            .await
            .unwrap();
        let snap = store.snapshot().await;
        store
            .apply(Command::new().with_files(file("x.txt", "changed")))
            .await
            .unwrap();
        assert_eq!(snap.files()["x.txt"], "hello");
    }
}
