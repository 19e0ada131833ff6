//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再叠加显式路径，最后用环境变量 `HIVE__*` 覆盖
//! （双下划线表示嵌套，如 `HIVE__RUN__MAX_STEPS=40`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::agent::{DelegationSettings, SubAgentProfile};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub run: RunSection,
    pub tools: ToolsSection,
    pub delegation: DelegationSection,
    /// [[subagents]]：可委派的子任务配置
    pub subagents: Vec<SubAgentProfile>,
}

/// [run] 段：主循环
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunSection {
    /// 主循环步数预算
    pub max_steps: usize,
    /// 主配置的指令
    pub instructions: String,
}

impl Default for RunSection {
    fn default() -> Self {
        Self {
            max_steps: 20,
            instructions: String::new(),
        }
    }
}

/// [tools] 段：单次调用超时、批内并发上限、read_file 默认行数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    pub tool_timeout_secs: u64,
    pub max_concurrent: usize,
    pub read_default_limit: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            max_concurrent: 8,
            read_default_limit: crate::tools::DEFAULT_READ_LIMIT,
        }
    }
}

/// [delegation] 段：同时进行的委派数、子循环步数预算、整个委派的超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DelegationSection {
    pub max_concurrent: usize,
    pub max_steps: usize,
    pub timeout_secs: u64,
}

impl Default for DelegationSection {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            max_steps: 12,
            timeout_secs: 600,
        }
    }
}

impl AppConfig {
    /// 子循环参数：步数来自 [delegation]，工具超时与并发沿用 [tools]
    pub fn delegation_settings(&self) -> DelegationSettings {
        DelegationSettings {
            max_steps: self.delegation.max_steps,
            tool_timeout_secs: self.tools.tool_timeout_secs,
            max_concurrent_tools: self.tools.max_concurrent,
        }
    }
}

/// 从 config 目录加载配置，环境变量 HIVE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 HIVE__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{}.toml", name)).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("HIVE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
