//! 任务调度：工具并发池与委派并发预算
//!
//! 工具执行使用 Semaphore 排队限流；委派使用 try_acquire，超出预算立即拒绝，不会静默排队。

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// 任务调度器
#[derive(Debug)]
pub struct TaskScheduler {
    /// 单批次内同时执行的工具数
    tool_semaphore: Arc<Semaphore>,
    /// 全局同时运行的委派数
    delegation_semaphore: Arc<Semaphore>,
    max_delegations: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent_tools: usize, max_concurrent_delegations: usize) -> Self {
        Self {
            tool_semaphore: Arc::new(Semaphore::new(max_concurrent_tools.max(1))),
            delegation_semaphore: Arc::new(Semaphore::new(max_concurrent_delegations)),
            max_delegations: max_concurrent_delegations,
        }
    }

    /// 获取工具执行许可（等待）；信号量已关闭时返回 None
    pub async fn acquire_tool(&self) -> Option<OwnedSemaphorePermit> {
        self.tool_semaphore.clone().acquire_owned().await.ok()
    }

    /// 获取委派许可（不等待）；预算已满时返回 None
    pub fn try_acquire_delegation(&self) -> Option<OwnedSemaphorePermit> {
        self.delegation_semaphore.clone().try_acquire_owned().ok()
    }

    pub fn max_delegations(&self) -> usize {
        self.max_delegations
    }

    pub fn available_delegations(&self) -> usize {
        self.delegation_semaphore.available_permits()
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(8, 3)
    }
}
