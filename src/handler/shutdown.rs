use tokio_util::sync::CancellationToken;

/// Process-wide stop signal. Unlike a bare `Notify`, a shutdown requested
/// before anyone waits is still observed.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.token.is_cancelled()
    }

    pub async fn wait_for_shutdown(&self) {
        self.token.cancelled().await;
    }

    /// Token cancelled together with this signal, for per-task cancellation.
    pub fn child_token(&self) -> CancellationToken {
        self.token.child_token()
    }
}
