//! Hive - 智能体状态协调与子任务委派核心
//!
//! 模块划分：
//! - **agent**: 控制主循环、子任务委派、过程事件、运行时组装
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型、步数预算、并发池、会话取消
//! - **engine**: 推理引擎抽象与脚本回放实现
//! - **observability**: 日志初始化
//! - **state**: 聚合状态、字段合并规则、状态存储、分页与投影
//! - **tools**: 工具注册、执行器、并发调用路由与内置工具

pub mod agent;
pub mod config;
pub mod core;
pub mod engine;
pub mod observability;
pub mod state;
pub mod tools;

pub use agent::{Agent, AgentBuilder};
pub use state::{AgentState, Command, StateStore};
