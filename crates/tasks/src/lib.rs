#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Task management for the mempool tracker.
//!
//! The dispatcher and the reconciler are the only components in the core that ever block: on
//! transport reads, on RPC calls, and on the inter-batch sleep during backfill. This crate gives
//! both of them a [`TaskExecutor`] to spawn their background loops on, and a [`Shutdown`] future
//! they can race against so a shutdown signal interrupts them at a well-defined point rather than
//! killing the process mid-mutation.

use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    runtime::Handle,
    sync::watch,
    task::JoinHandle,
};
use tracing::error;

/// Spawns futures onto a tokio runtime, tracking critical tasks so a panic in one of them is
/// logged loudly rather than silently dropped.
#[derive(Debug, Clone)]
pub struct TaskExecutor {
    handle: Handle,
    shutdown: Shutdown,
}

impl TaskExecutor {
    /// Creates a new executor bound to the current tokio runtime, returning the executor together
    /// with the [`ShutdownSignal`] used to trigger [`Shutdown`].
    pub fn new() -> (Self, ShutdownSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { handle: Handle::current(), shutdown: Shutdown(rx) }, ShutdownSignal(tx))
    }

    /// Returns a future that resolves once shutdown has been signaled.
    pub fn on_shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Spawns a future on the executor's runtime.
    pub fn spawn<F>(&self, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(fut)
    }

    /// Spawns a future that the process cannot silently lose: if it panics, the panic is logged
    /// with `name` attached rather than swallowed by an unawaited `JoinHandle`.
    pub fn spawn_critical<F>(&self, name: &'static str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handle.spawn(async move {
            if let Err(err) = tokio::spawn(fut).await {
                error!(target: "mempool::tasks", task = name, %err, "critical task panicked");
            }
        })
    }
}

/// The handle used to trigger a [`Shutdown`].
#[derive(Debug, Clone)]
pub struct ShutdownSignal(watch::Sender<bool>);

impl ShutdownSignal {
    /// Signals shutdown to every [`Shutdown`] future cloned from the executor that issued this
    /// signal.
    pub fn shutdown(&self) {
        let _ = self.0.send(true);
    }
}

/// A cheaply cloneable future that resolves once shutdown has been signaled.
///
/// Long-running loops race this against their next unit of work (a transport read, an RPC call,
/// the inter-batch sleep) so they can stop between units of work instead of mid-mutation.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Future for Shutdown {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if *self.0.borrow() {
            return Poll::Ready(());
        }
        let changed = self.0.changed();
        tokio::pin!(changed);
        match changed.poll(cx) {
            Poll::Ready(_) if *self.0.borrow() => Poll::Ready(()),
            _ => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shutdown_resolves_after_signal() {
        let (executor, signal) = TaskExecutor::new();
        let on_shutdown = executor.on_shutdown();
        signal.shutdown();
        on_shutdown.await;
    }

    #[tokio::test]
    async fn shutdown_pending_before_signal() {
        let (executor, _signal) = TaskExecutor::new();
        let on_shutdown = executor.on_shutdown();
        tokio::select! {
            _ = on_shutdown => panic!("shutdown resolved without a signal"),
            _ = tokio::time::sleep(std::time::Duration::from_millis(20)) => {}
        }
    }
}
