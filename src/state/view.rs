//! 只读投影：文件分页读取、文件列举、任务列表渲染、文件表差异
//!
//! 全部是纯函数，不修改状态。

use crate::state::{FileTable, TodoItem};

/// 按行分页读取的结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilePage {
    /// 行 [start, end) 的原始文本（保留行尾换行符，拼接各页可还原全文）
    Content {
        text: String,
        start: usize,
        end: usize,
        total: usize,
    },
    /// offset 超出内容长度：显式空结果，不是错误
    EndOfFile { offset: usize, total: usize },
    /// 文件不存在
    Missing,
}

impl FilePage {
    pub fn is_end(&self) -> bool {
        matches!(self, FilePage::EndOfFile { .. })
    }

    /// 渲染为工具结果文本：内容原样返回，其余情况返回显式标记
    pub fn render(&self, path: &str) -> String {
        match self {
            FilePage::Content { text, .. } => text.clone(),
            FilePage::EndOfFile { offset, total } => format!(
                "[end of file] '{}' has {} lines; offset {} is beyond the end",
                path, total, offset
            ),
            FilePage::Missing => format!("[not found] file '{}' does not exist", path),
        }
    }
}

/// 从 offset（0 起）开始最多读取 limit 行；limit 为 None 时读到末尾。
/// 空文件在 offset 0 处返回空内容，之后的 offset 返回 EndOfFile。
pub fn read_page(files: &FileTable, path: &str, offset: usize, limit: Option<usize>) -> FilePage {
    let Some(content) = files.get(path) else {
        return FilePage::Missing;
    };
    let lines: Vec<&str> = content.split_inclusive('\n').collect();
    let total = lines.len();
    if offset > 0 && offset >= total {
        return FilePage::EndOfFile { offset, total };
    }
    let start = offset.min(total);
    let end = limit
        .map(|l| start.saturating_add(l).min(total))
        .unwrap_or(total);
    FilePage::Content {
        text: lines[start..end].concat(),
        start,
        end,
        total,
    }
}

/// 文件路径列表（按键排序，稳定）
pub fn list_files(files: &FileTable) -> Vec<String> {
    files.keys().cloned().collect()
}

/// 渲染任务列表（保持列表原有顺序）
pub fn render_todos(todos: &[TodoItem]) -> String {
    if todos.is_empty() {
        return "No todos.".to_string();
    }
    todos
        .iter()
        .enumerate()
        .map(|(i, t)| format!("{}. [{}] {}", i + 1, t.status.as_str(), t.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// current 相对 seed 新增或修改过的文件
pub fn changed_files(seed: &FileTable, current: &FileTable) -> FileTable {
    current
        .iter()
        .filter(|(path, content)| seed.get(*path) != Some(*content))
        .map(|(path, content)| (path.clone(), content.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TodoStatus;

    fn table(path: &str, content: &str) -> FileTable {
        let mut t = FileTable::new();
        t.insert(path.into(), content.into());
        t
    }

    #[test]
    fn test_full_read_round_trip() {
        for content in ["hello", "a\nb\nc", "a\nb\n", "", "\n\n", "trailing\r\nwindows\r\n"] {
            let files = table("f", content);
            match read_page(&files, "f", 0, None) {
                FilePage::Content { text, .. } => assert_eq!(text, content),
                other => panic!("unexpected page {other:?}"),
            }
        }
    }

    #[test]
    fn test_pagination_reconstructs_exactly_once() {
        let content = "l1\nl2\nl3\nl4\nl5\nl6\nl7";
        let files = table("f", content);
        for limit in 1..=8 {
            let mut rebuilt = String::new();
            let mut offset = 0;
            loop {
                match read_page(&files, "f", offset, Some(limit)) {
                    FilePage::Content { text, end, .. } => {
                        rebuilt.push_str(&text);
                        offset = end;
                    }
                    FilePage::EndOfFile { .. } => break,
                    FilePage::Missing => panic!("file vanished"),
                }
            }
            assert_eq!(rebuilt, content, "limit {limit}");
        }
    }

    #[test]
    fn test_offset_beyond_end_is_explicit_empty() {
        let files = table("f", "a\nb");
        let page = read_page(&files, "f", 5, Some(10));
        assert_eq!(page, FilePage::EndOfFile { offset: 5, total: 2 });
        assert!(page.is_end());
        assert!(page.render("f").contains("[end of file]"));
    }

    #[test]
    fn test_missing_file() {
        let page = read_page(&FileTable::new(), "nope", 0, None);
        assert_eq!(page, FilePage::Missing);
        assert!(page.render("nope").contains("[not found]"));
    }

    #[test]
    fn test_limit_bounds_lines() {
        let files = table("f", "1\n2\n3\n4\n");
        match read_page(&files, "f", 1, Some(2)) {
            FilePage::Content { text, start, end, total } => {
                assert_eq!(text, "2\n3\n");
                assert_eq!((start, end, total), (1, 3, 4));
            }
            other => panic!("unexpected page {other:?}"),
        }
    }

    #[test]
    fn test_render_todos_stable_order() {
        let todos = vec![
            TodoItem::new("write outline", TodoStatus::Completed),
            TodoItem::new("build", TodoStatus::InProgress),
            TodoItem::new("ship", TodoStatus::Pending),
        ];
        assert_eq!(
            render_todos(&todos),
            "1. [completed] write outline\n2. [in_progress] build\n3. [pending] ship"
        );
        assert_eq!(render_todos(&[]), "No todos.");
    }

    #[test]
    fn test_changed_files_only_reports_writes() {
        let mut seed = table("x.txt", "hello");
        seed.insert("keep.txt".into(), "same".into());
        let mut current = seed.clone();
        current.insert("x.txt".into(), "hello world".into());
        current.insert("new.txt".into(), "n".into());
        let delta = changed_files(&seed, &current);
        assert_eq!(delta.len(), 2);
        assert_eq!(delta["x.txt"], "hello world");
        assert!(!delta.contains_key("keep.txt"));
    }
}
