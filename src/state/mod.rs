//! 状态层：聚合状态、Command、字段合并策略、单写者存储、只读投影

pub mod command;
pub mod message;
pub mod reducer;
pub mod store;
pub mod types;
pub mod view;

pub use command::Command;
pub use message::{Message, Role};
pub use reducer::{Reducer, ReducerRegistry, TypedReducer};
pub use store::StateStore;
pub use types::{AgentState, FileTable, TodoItem, TodoStatus, FILES, MESSAGES, TODOS};
pub use view::FilePage;
