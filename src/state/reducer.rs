//! 字段合并策略注册表
//!
//! 每个状态字段对应一个 Reducer：merge(old, new) 纯函数、全函数（缺失视为恒等）。
//! 默认注册：messages 追加、todos 整体替换、files 按键浅合并。
//! 新字段通过 register 扩展，StateStore 与 Router 不感知具体字段。

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::StateError;
use crate::state::{Command, FileTable, Message, TodoItem, FILES, MESSAGES, TODOS};

/// 单字段合并策略
pub trait Reducer: Send + Sync {
    /// 校验新值是否可被该字段接受
    fn validate(&self, value: &Value) -> Result<(), String>;

    /// 合并旧值与新值；两侧都缺失时返回 None
    fn merge(&self, old: Option<&Value>, new: Option<&Value>) -> Option<Value>;

    /// 同一批次内两个更新是否不可交换（应用顺序会影响结果）
    fn conflicts(&self, _a: &Value, _b: &Value) -> bool {
        false
    }
}

/// 基于类型化函数的 Reducer：JSON 先反序列化为 T，再调用 merge_fn
pub struct TypedReducer<T> {
    merge_fn: fn(Option<T>, Option<T>) -> Option<T>,
    conflict_fn: fn(&T, &T) -> bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedReducer<T> {
    pub fn new(merge_fn: fn(Option<T>, Option<T>) -> Option<T>) -> Self {
        Self {
            merge_fn,
            conflict_fn: |_, _| false,
            _marker: PhantomData,
        }
    }

    pub fn with_conflicts(mut self, conflict_fn: fn(&T, &T) -> bool) -> Self {
        self.conflict_fn = conflict_fn;
        self
    }
}

impl<T: Serialize + DeserializeOwned> TypedReducer<T> {
    fn decode(value: Option<&Value>) -> Option<T> {
        value.and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl<T: Serialize + DeserializeOwned> Reducer for TypedReducer<T> {
    fn validate(&self, value: &Value) -> Result<(), String> {
        serde_json::from_value::<T>(value.clone())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn merge(&self, old: Option<&Value>, new: Option<&Value>) -> Option<Value> {
        let merged = (self.merge_fn)(Self::decode(old), Self::decode(new))?;
        serde_json::to_value(merged).ok()
    }

    fn conflicts(&self, a: &Value, b: &Value) -> bool {
        match (Self::decode(Some(a)), Self::decode(Some(b))) {
            (Some(a), Some(b)) => (self.conflict_fn)(&a, &b),
            _ => false,
        }
    }
}

/// messages：按 old 在前、new 在后拼接
pub fn concat_messages(old: Option<Vec<Message>>, new: Option<Vec<Message>>) -> Option<Vec<Message>> {
    match (old, new) {
        (None, None) => None,
        (Some(old), None) => Some(old),
        (None, Some(new)) => Some(new),
        (Some(mut old), Some(new)) => {
            old.extend(new);
            Some(old)
        }
    }
}

/// 整体替换：new 存在即取 new，否则保留 old
pub fn replace<T>(old: Option<T>, new: Option<T>) -> Option<T> {
    new.or(old)
}

/// files：按键浅合并，同键时 new 覆盖 old，只在一侧出现的键保留
pub fn merge_file_tables(old: Option<FileTable>, new: Option<FileTable>) -> Option<FileTable> {
    match (old, new) {
        (None, None) => None,
        (old, new) => {
            let mut merged = old.unwrap_or_default();
            merged.extend(new.unwrap_or_default());
            Some(merged)
        }
    }
}

/// 两次文件写入在相同键上写入了不同内容时不可交换
fn file_tables_overlap(a: &FileTable, b: &FileTable) -> bool {
    a.iter()
        .any(|(key, content)| b.get(key).is_some_and(|other| other != content))
}

/// 字段 -> Reducer 注册表
#[derive(Clone)]
pub struct ReducerRegistry {
    reducers: HashMap<String, Arc<dyn Reducer>>,
}

impl Default for ReducerRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ReducerRegistry {
    /// 空注册表（不含任何字段）
    pub fn empty() -> Self {
        Self {
            reducers: HashMap::new(),
        }
    }

    /// 注册 messages / todos / files 三个默认字段
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(MESSAGES, TypedReducer::<Vec<Message>>::new(concat_messages));
        registry.register(
            TODOS,
            TypedReducer::<Vec<TodoItem>>::new(replace).with_conflicts(|_, _| true),
        );
        registry.register(
            FILES,
            TypedReducer::<FileTable>::new(merge_file_tables).with_conflicts(file_tables_overlap),
        );
        registry
    }

    /// 注册（或替换）一个字段的合并策略
    pub fn register(&mut self, field: impl Into<String>, reducer: impl Reducer + 'static) {
        self.reducers.insert(field.into(), Arc::new(reducer));
    }

    pub fn is_registered(&self, field: &str) -> bool {
        self.reducers.contains_key(field)
    }

    pub fn fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self.reducers.keys().cloned().collect();
        names.sort();
        names
    }

    fn reducer(&self, field: &str) -> Result<&Arc<dyn Reducer>, StateError> {
        self.reducers
            .get(field)
            .ok_or_else(|| StateError::UnregisteredField(field.to_string()))
    }

    /// 校验 Command：所有字段已注册且取值合法
    pub fn validate(&self, command: &Command) -> Result<(), StateError> {
        for (field, value) in command.iter() {
            self.reducer(field)?
                .validate(value)
                .map_err(|reason| StateError::InvalidValue {
                    field: field.to_string(),
                    reason,
                })?;
        }
        Ok(())
    }

    pub fn merge(
        &self,
        field: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<Option<Value>, StateError> {
        Ok(self.reducer(field)?.merge(old, new))
    }

    /// 未注册字段不会出现在已应用的 Command 中，视为不冲突
    pub fn conflicts(&self, field: &str, a: &Value, b: &Value) -> bool {
        self.reducers
            .get(field)
            .is_some_and(|r| r.conflicts(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TodoStatus;
    use serde_json::json;

    fn files(pairs: &[(&str, &str)]) -> FileTable {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_concat_preserves_order() {
        let merged = concat_messages(
            Some(vec![Message::user("1"), Message::assistant("2")]),
            Some(vec![Message::tool("c", "3")]),
        )
        .unwrap();
        let contents: Vec<&str> = merged.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
        assert!(concat_messages(None, None).is_none());
    }

    #[test]
    fn test_replace_takes_new_or_keeps_old() {
        assert_eq!(replace(Some(1), Some(2)), Some(2));
        assert_eq!(replace(Some(1), None), Some(1));
        assert_eq!(replace::<i32>(None, None), None);
    }

    #[test]
    fn test_file_merge_new_wins_and_keeps_one_sided_keys() {
        let merged = merge_file_tables(
            Some(files(&[("a", "old"), ("b", "keep")])),
            Some(files(&[("a", "new"), ("c", "added")])),
        )
        .unwrap();
        assert_eq!(merged, files(&[("a", "new"), ("b", "keep"), ("c", "added")]));
        assert_eq!(merge_file_tables(None, Some(files(&[("a", "1")]))).unwrap().len(), 1);
        assert_eq!(merge_file_tables(Some(files(&[("a", "1")])), None).unwrap().len(), 1);
    }

    #[test]
    fn test_file_merge_disjoint_keys_commute() {
        let a = files(&[("a.txt", "A")]);
        let b = files(&[("b.txt", "B")]);
        let ab = merge_file_tables(merge_file_tables(None, Some(a.clone())), Some(b.clone()));
        let ba = merge_file_tables(merge_file_tables(None, Some(b)), Some(a));
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_validate_rejects_unregistered_field() {
        let registry = ReducerRegistry::with_defaults();
        let cmd = Command::new().with_field("notes", json!("x"));
        assert_eq!(
            registry.validate(&cmd),
            Err(StateError::UnregisteredField("notes".into()))
        );
    }

    #[test]
    fn test_validate_rejects_bad_status() {
        let registry = ReducerRegistry::with_defaults();
        let cmd = Command::new().with_field(TODOS, json!([{"content": "A", "status": "done"}]));
        assert!(matches!(
            registry.validate(&cmd),
            Err(StateError::InvalidValue { field, .. }) if field == TODOS
        ));
        let ok = Command::new().with_todos(vec![TodoItem::new("A", TodoStatus::Pending)]);
        assert!(registry.validate(&ok).is_ok());
    }

    #[test]
    fn test_conflict_detection() {
        let registry = ReducerRegistry::with_defaults();
        let todos = json!([{"content": "A", "status": "pending"}]);
        assert!(registry.conflicts(TODOS, &todos, &todos));
        assert!(!registry.conflicts(FILES, &json!({"a": "1"}), &json!({"b": "2"})));
        assert!(registry.conflicts(FILES, &json!({"a": "1"}), &json!({"a": "2"})));
        assert!(!registry.conflicts(MESSAGES, &json!([]), &json!([])));
    }

    #[test]
    fn test_custom_field_registration() {
        let mut registry = ReducerRegistry::with_defaults();
        registry.register(
            "counter",
            TypedReducer::<u64>::new(|old, new| match (old, new) {
                (None, None) => None,
                (a, b) => Some(a.unwrap_or(0) + b.unwrap_or(0)),
            }),
        );
        let merged = registry
            .merge("counter", Some(&json!(2)), Some(&json!(3)))
            .unwrap();
        assert_eq!(merged, Some(json!(5)));
        assert!(registry.validate(&Command::new().with_field("counter", json!("x"))).is_err());
    }
}
