//! Command：工具提出的、按字段划分的部分状态更新
//!
//! 由 StateStore 原子地应用；字段值为 JSON，合法性由 ReducerRegistry 校验。

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::state::{FileTable, Message, TodoItem, FILES, MESSAGES, TODOS};

/// 部分更新：字段名 -> 新值
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Command {
    updates: BTreeMap<String, Value>,
}

impl Command {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置任意字段（扩展字段或原始 JSON）；同名字段会被覆盖
    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.updates.insert(field.into(), value);
        self
    }

    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        self.with_field(MESSAGES, to_value(&messages))
    }

    pub fn with_todos(self, todos: Vec<TodoItem>) -> Self {
        self.with_field(TODOS, to_value(&todos))
    }

    pub fn with_files(self, files: FileTable) -> Self {
        self.with_field(FILES, to_value(&files))
    }

    /// 在已有的 messages 更新之后追加消息（而不是覆盖）
    pub fn append_messages(mut self, messages: Vec<Message>) -> Self {
        let mut merged: Vec<Message> = self
            .updates
            .remove(MESSAGES)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();
        merged.extend(messages);
        self.with_messages(merged)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.updates.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.updates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.updates.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

// Null 会在校验阶段被拒绝
fn to_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
