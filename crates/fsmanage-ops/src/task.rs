//! Handles to work spawned on the runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::{JoinError, JoinHandle};

type Recover<T> = Box<dyn FnOnce(JoinError) -> T + Send>;

/// A spawned asynchronous result.
///
/// Awaiting the task yields its value. If the spawned work panics or is
/// aborted, the value is produced by the recovery function given at spawn
/// time, so awaiting never panics.
pub struct Task<T> {
    handle: JoinHandle<T>,
    recover: Option<Recover<T>>,
}

impl<T: Send + 'static> Task<T> {
    /// Spawn `future` onto the current runtime.
    pub fn spawn<F, R>(future: F, recover: R) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        R: FnOnce(JoinError) -> T + Send + 'static,
    {
        Self {
            handle: tokio::spawn(future),
            recover: Some(Box::new(recover)),
        }
    }

    /// Request cancellation of the spawned work.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Check if the spawned work has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Task<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        match Pin::new(&mut this.handle).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            Poll::Ready(Err(err)) => match this.recover.take() {
                Some(recover) => Poll::Ready(recover(err)),
                None => Poll::Pending,
            },
        }
    }
}

impl<T> fmt::Debug for Task<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_yields_value() {
        let task = Task::spawn(async { 41 + 1 }, |_| 0);
        assert_eq!(task.await, 42);
    }

    #[tokio::test]
    async fn test_panicking_task_recovers() {
        let task: Task<Result<u8, String>> = Task::spawn(
            async {
                let bytes: Vec<u8> = Vec::new();
                Ok(bytes[1])
            },
            |err| Err(format!("join failed: panic={}", err.is_panic())),
        );
        assert_eq!(task.await, Err("join failed: panic=true".to_string()));
    }
}
