//! 聚合状态：messages / todos / files 三个字段及扩展字段
//!
//! 状态以「字段名 -> JSON 值」保存，每个字段必须在 ReducerRegistry 中注册合并策略；
//! messages()/todos()/files() 提供类型化读取。

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state::Message;

pub const MESSAGES: &str = "messages";
pub const TODOS: &str = "todos";
pub const FILES: &str = "files";

/// 文件表：路径 -> 完整文本；BTreeMap 保证列举顺序稳定
pub type FileTable = BTreeMap<String, String>;

/// 任务项状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TodoStatus {
    Pending,
    InProgress,
    Completed,
}

impl TodoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::Pending => "pending",
            TodoStatus::InProgress => "in_progress",
            TodoStatus::Completed => "completed",
        }
    }
}

/// 任务列表中的一项；整个列表只能整体替换
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TodoItem {
    pub content: String,
    pub status: TodoStatus,
}

impl TodoItem {
    pub fn new(content: impl Into<String>, status: TodoStatus) -> Self {
        Self {
            content: content.into(),
            status,
        }
    }
}

/// 聚合状态。只能通过 StateStore::apply 修改
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AgentState {
    fields: BTreeMap<String, Value>,
}

impl AgentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// 设置或移除字段（合并结果为 None 时移除）
    pub(crate) fn set(&mut self, field: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.fields.insert(field.to_string(), v);
            }
            None => {
                self.fields.remove(field);
            }
        }
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.typed(MESSAGES).unwrap_or_default()
    }

    pub fn todos(&self) -> Vec<TodoItem> {
        self.typed(TODOS).unwrap_or_default()
    }

    pub fn files(&self) -> FileTable {
        self.typed(FILES).unwrap_or_default()
    }

    /// 按类型读取任意字段；字段缺失或类型不符时返回 None
    pub fn typed<T: serde::de::DeserializeOwned>(&self, field: &str) -> Option<T> {
        self.fields
            .get(field)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
