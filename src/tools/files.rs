//! 文件表工具：ls / read_file / write_file / edit_file
//!
//! 文件保存在聚合状态的 files 字段中（路径 -> 全文），不涉及磁盘。
//! 读取是对批次快照的纯投影；写入与编辑都以 Command 形式提出，按键 upsert，后应用者胜。

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ToolError;
use crate::state::view::{list_files, read_page};
use crate::state::{Command, FileTable};
use crate::tools::{parse_args, schema_of, Tool, ToolContext, ToolOutput};

/// read_file 默认单次读取行数
pub const DEFAULT_READ_LIMIT: usize = 2000;

fn single_file(path: &str, content: String) -> FileTable {
    let mut files = FileTable::new();
    files.insert(path.to_string(), content);
    files
}

fn require_path(path: &str) -> Result<(), ToolError> {
    if path.trim().is_empty() {
        return Err(ToolError::Validation("file_path must not be empty".to_string()));
    }
    Ok(())
}

/// ls：列出所有文件路径（排序）
pub struct LsTool;

#[async_trait]
impl Tool for LsTool {
    fn name(&self) -> &str {
        "ls"
    }

    fn description(&self) -> &str {
        "List all file paths in the shared file table."
    }

    async fn execute(&self, _args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let paths = list_files(&ctx.state.files());
        if paths.is_empty() {
            return Ok(ToolOutput::value("No files."));
        }
        Ok(ToolOutput::value(paths.join("\n")))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ReadFileArgs {
    file_path: String,
    /// 起始行（从 0 开始）
    #[serde(default)]
    offset: usize,
    /// 最多读取的行数
    limit: Option<usize>,
}

/// read_file：按 (offset, limit) 行分页读取
pub struct ReadFileTool {
    default_limit: usize,
}

impl ReadFileTool {
    pub fn new(default_limit: usize) -> Self {
        Self {
            default_limit: default_limit.max(1),
        }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new(DEFAULT_READ_LIMIT)
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        r#"Read a file from the shared file table, paginated by lines.

Args:
- file_path: path key
- offset: first line to read, 0-based (default 0)
- limit: maximum number of lines (default 2000)

An offset past the end returns an explicit [end of file] marker."#
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<ReadFileArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args: ReadFileArgs = parse_args(args)?;
        require_path(&args.file_path)?;
        let limit = args.limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Err(ToolError::Validation("limit must be at least 1".to_string()));
        }
        let page = read_page(&ctx.state.files(), &args.file_path, args.offset, Some(limit));
        Ok(ToolOutput::value(page.render(&args.file_path)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct WriteFileArgs {
    file_path: String,
    /// 文件完整内容
    content: String,
}

/// write_file：按路径 upsert 全文
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        r#"Create or overwrite a file in the shared file table.
Example: {"file_path": "notes.md", "content": "..."}"#
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<WriteFileArgs>()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args: WriteFileArgs = parse_args(args)?;
        require_path(&args.file_path)?;
        let summary = format!("Updated file {}", args.file_path);
        let files = single_file(&args.file_path, args.content);
        Ok(ToolOutput::update(Command::new().with_files(files), summary))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct EditFileArgs {
    file_path: String,
    old_string: String,
    new_string: String,
    /// 替换所有出现（默认只允许唯一出现）
    #[serde(default)]
    replace_all: bool,
}

/// edit_file：在批次快照的基础上做字符串替换
pub struct EditFileTool;

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        r#"Replace text in an existing file. old_string must occur exactly once unless replace_all is true.
Example: {"file_path": "notes.md", "old_string": "draft", "new_string": "final"}"#
    }

    fn parameters_schema(&self) -> Value {
        schema_of::<EditFileArgs>()
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
        let args: EditFileArgs = parse_args(args)?;
        require_path(&args.file_path)?;
        if args.old_string.is_empty() {
            return Err(ToolError::Validation("old_string must not be empty".to_string()));
        }
        let files = ctx.state.files();
        let content = files
            .get(&args.file_path)
            .ok_or_else(|| ToolError::NotFound(format!("file '{}'", args.file_path)))?;

        let occurrences = content.matches(args.old_string.as_str()).count();
        if occurrences == 0 {
            return Err(ToolError::Validation(format!(
                "old_string not found in '{}'",
                args.file_path
            )));
        }
        if occurrences > 1 && !args.replace_all {
            return Err(ToolError::Validation(format!(
                "old_string appears {} times in '{}'; set replace_all or add context",
                occurrences, args.file_path
            )));
        }
        let edited = if args.replace_all {
            content.replace(&args.old_string, &args.new_string)
        } else {
            content.replacen(&args.old_string, &args.new_string, 1)
        };
        let summary = format!(
            "Edited file {} ({} replacement{})",
            args.file_path,
            occurrences,
            if occurrences == 1 { "" } else { "s" }
        );
        Ok(ToolOutput::update(
            Command::new().with_files(single_file(&args.file_path, edited)),
            summary,
        ))
    }
}
