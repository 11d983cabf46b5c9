//! Cancellable request execution.
//!
//! The connection is opened eagerly, the caller's work runs on its own
//! task, and the connection is disconnected on every way out: success,
//! failure, an explicit cancel, or the caller dropping the future.

use crate::base::neterror::NetError;
use crate::transport::{Connection, TransportSelector};
use http::Method;
use std::future::Future;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;

/// Disconnects on drop.
struct DisconnectGuard(Connection);

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        self.0.disconnect();
    }
}

/// Stops the work task if the caller goes away.
struct AbortOnDrop {
    token: CancellationToken,
    handle: AbortHandle,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// Runs work against fresh connections from a selector.
#[derive(Clone)]
pub struct RequestRunner {
    selector: Arc<TransportSelector>,
}

impl std::fmt::Debug for RequestRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestRunner")
            .field("selector", &self.selector)
            .finish()
    }
}

impl RequestRunner {
    pub fn new(selector: Arc<TransportSelector>) -> Self {
        Self { selector }
    }

    pub fn selector(&self) -> &Arc<TransportSelector> {
        &self.selector
    }

    /// Open a connection to `url` now and run `work` on it.
    ///
    /// Dropping the returned future cancels `work` and disconnects.
    pub fn run_cancellable<T, F, Fut>(
        &self,
        url: &str,
        method: Method,
        work: F,
    ) -> impl Future<Output = Result<T, NetError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NetError>> + Send + 'static,
    {
        self.run_cancellable_with(url, method, CancellationToken::new(), work)
    }

    /// Like [`run_cancellable`](Self::run_cancellable), also stopping when
    /// `cancel` fires.
    pub fn run_cancellable_with<T, F, Fut>(
        &self,
        url: &str,
        method: Method,
        cancel: CancellationToken,
        work: F,
    ) -> impl Future<Output = Result<T, NetError>> + Send + 'static
    where
        T: Send + 'static,
        F: FnOnce(Connection) -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, NetError>> + Send + 'static,
    {
        let opened = self.selector.open(url, method);
        async move { run_on_connection(opened?, cancel, work).await }
    }
}

/// Run `work` on `connection` in its own task, disconnecting on every exit.
///
/// A result `work` already produced is never replaced by `Cancelled`, and a
/// panic in `work` resumes on the caller.
pub async fn run_on_connection<T, F, Fut>(
    connection: Connection,
    cancel: CancellationToken,
    work: F,
) -> Result<T, NetError>
where
    T: Send + 'static,
    F: FnOnce(Connection) -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, NetError>> + Send + 'static,
{
    let _disconnect = DisconnectGuard(connection.clone());

    let child = cancel.child_token();
    let task_token = child.clone();
    let task_conn = connection.clone();
    let mut handle = tokio::spawn(async move {
        let _disconnect = DisconnectGuard(task_conn.clone());
        tokio::select! {
            biased;
            r = work(task_conn) => r,
            _ = task_token.cancelled() => Err(NetError::Cancelled),
        }
    });
    let _abort = AbortOnDrop {
        token: child.clone(),
        handle: handle.abort_handle(),
    };

    let joined = tokio::select! {
        biased;
        joined = &mut handle => joined,
        _ = cancel.cancelled() => {
            tracing::debug!(id = connection.id(), url = %connection.url(), "request cancelled");
            child.cancel();
            connection.disconnect();
            return match handle.await {
                Ok(Ok(value)) => Ok(value),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                _ => Err(NetError::Cancelled),
            };
        }
    };

    match joined {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(NetError::Cancelled),
    }
}
