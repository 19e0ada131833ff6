//! 工具层：Tool trait 与注册表、执行器、批次路由、内置工具（任务列表、文件表、委派）

pub mod call;
pub mod executor;
pub mod files;
pub mod registry;
pub mod router;
pub mod schema;
pub mod task;
pub mod todos;

pub use call::{ToolCall, ToolPayload, ToolResult};
pub use executor::ToolExecutor;
pub use files::{EditFileTool, LsTool, ReadFileTool, WriteFileTool, DEFAULT_READ_LIMIT};
pub use registry::{parse_args, schema_of, Tool, ToolContext, ToolOutput, ToolRegistry};
pub use router::{BatchOutcome, ConcurrencyHazard, ToolRouter};
pub use schema::tool_call_schema_json;
pub use task::TaskTool;
pub use todos::{ReadTodosTool, WriteTodosTool};
