//! Per-call cancellation signal.

use crate::CancelReason;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Cancellation signal for a single call: an explicit token plus an optional
/// deadline, whichever fires first.
///
/// Clones share the same token, so cancelling one cancels all of them.
///
/// # Examples
///
/// ```no_run
/// use stream_dispatch::{CallContext, Client};
/// use std::time::Duration;
///
/// # async fn example(client: Client) -> Result<(), stream_dispatch::Error> {
/// let ctx = CallContext::with_timeout(Duration::from_secs(5));
///
/// let canceller = ctx.clone();
/// tokio::spawn(async move {
///     // e.g. the user closed the screen
///     canceller.cancel();
/// });
///
/// match client.get::<serde_json::Value>(&ctx, "app", &[] as &[&str]).await {
///     Err(e) if e.is_cancelled() => println!("gave up: {e}"),
///     other => println!("{:?}", other.map(|r| r.data)),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl CallContext {
    /// A context that only ends when [`CallContext::cancel`] is called.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new().deadline(Instant::now() + timeout)
    }

    /// Wraps an existing token, e.g. one shared with other tasks.
    pub fn from_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Sets the deadline. An earlier existing deadline is kept.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    /// A context cancelled together with this one that can also be
    /// cancelled on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn deadline_at(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the context has ended, or `None` if it is still live.
    pub fn reason(&self) -> Option<CancelReason> {
        if self.token.is_cancelled() {
            return Some(CancelReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(CancelReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Resolves once the context ends.
    pub async fn done(&self) -> CancelReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.token.cancelled() => CancelReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => CancelReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                CancelReason::Cancelled
            }
        }
    }

    /// Runs `fut` unless the context ends first; the future is dropped on
    /// cancellation.
    pub(crate) async fn run<F: Future>(&self, fut: F) -> Result<F::Output, CancelReason> {
        tokio::select! {
            biased;
            reason = self.done() => Err(reason),
            output = fut => Ok(output),
        }
    }
}
