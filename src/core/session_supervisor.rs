//! 会话监管：运行生命周期与取消
//!
//! 持有根 CancellationToken；委派使用子 token，父级取消时子循环随之终止，其状态被丢弃。

use tokio_util::sync::CancellationToken;

/// 运行级生命周期管理
#[derive(Debug, Default)]
pub struct SessionSupervisor {
    cancel_token: CancellationToken,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel_token.clone()
    }

    /// 触发取消（如 Ctrl+C）
    pub fn cancel(&self) {
        tracing::info!("run cancelled");
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// 子 token（用于单个委派）
    pub fn child_token(&self) -> CancellationToken {
        self.cancel_token.child_token()
    }
}
