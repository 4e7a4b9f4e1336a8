use tokio_util::sync::CancellationToken;

/// Cooperative cancellation for one session.
///
/// Clones share the same signal. Cancelling is idempotent.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the session to stop. Later calls are no-ops.
    pub fn cancel(&self) {
        if self.token.is_cancelled() {
            return;
        }
        tracing::debug!("stream session cancel requested");
        self.token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`Self::cancel`] has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The underlying token, as handed to the transport.
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl From<CancellationToken> for CancelHandle {
    fn from(token: CancellationToken) -> Self {
        Self { token }
    }
}
