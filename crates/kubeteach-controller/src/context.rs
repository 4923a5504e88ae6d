//! Cancellation and deadline signal handed to every reconcile pass.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::reconcile::ReconcileError;

/// Per-invocation context: a cancellation token plus an optional deadline.
///
/// Every store call made by the reconciler goes through [`ReconcileContext::guard`],
/// so a cancelled or expired pass stops at the next await point and leaves
/// no further writes behind.
#[derive(Debug, Clone, Default)]
pub struct ReconcileContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl ReconcileContext {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    /// Context that is cancelled with `cancel` and expires after `timeout`.
    pub fn with_timeout(cancel: CancellationToken, timeout: Option<Duration>) -> Self {
        Self::new(cancel, timeout.map(|t| Instant::now() + t))
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails fast when the context is already done.
    pub fn check(&self) -> Result<(), ReconcileError> {
        if self.cancel.is_cancelled() {
            return Err(ReconcileError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ReconcileError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` unless the context is cancelled or its deadline passes first.
    pub async fn guard<F, T, E>(&self, fut: F) -> Result<T, ReconcileError>
    where
        F: Future<Output = Result<T, E>>,
        ReconcileError: From<E>,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ReconcileError::Cancelled),
            _ = deadline => Err(ReconcileError::DeadlineExceeded),
            res = fut => res.map_err(ReconcileError::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubeteach_storage::StorageError;

    #[tokio::test]
    async fn test_guard_passes_result_through() {
        let ctx = ReconcileContext::default();
        let ok: Result<u32, ReconcileError> = ctx.guard(async { Ok::<_, StorageError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err = ctx
            .guard(async { Err::<u32, _>(StorageError::connection_error("boom")) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Storage(_)));
    }

    #[tokio::test]
    async fn test_guard_observes_cancellation() {
        let token = CancellationToken::new();
        let ctx = ReconcileContext::new(token.clone(), None);
        token.cancel();

        let err = ctx
            .guard(async { Ok::<u32, StorageError>(1) })
            .await
            .unwrap_err();
        assert!(matches!(err, ReconcileError::Cancelled));
    }

    #[tokio::test]
    async fn test_guard_observes_deadline() {
        let ctx = ReconcileContext::with_timeout(
            CancellationToken::new(),
            Some(Duration::from_millis(50)),
        );
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<u32, StorageError>(1)
        };
        let err = ctx.guard(slow).await.unwrap_err();
        assert!(matches!(err, ReconcileError::DeadlineExceeded));
    }
}
