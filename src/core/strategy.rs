//! # Execution strategies shared by the invocation chain and the event bus.
//!
//! Both strategies run the **same** future (the sequential fold over callbacks or
//! listeners) on tokio; they differ only in who drives it:
//!
//! ```text
//! Blocking:     run_phase() ──► tokio block_on(fold) before returning ──► Completion::Ready
//! NonBlocking:  run_phase() ──► Completion::Pending(fold) ──► caller .await
//! ```
//!
//! ## Driving a blocking run
//! | caller's context                | how the fold is driven                                  |
//! |---------------------------------|---------------------------------------------------------|
//! | multi-thread runtime            | `block_in_place` + `Handle::block_on` on that runtime   |
//! | current-thread runtime          | private current-thread runtime on a scoped helper thread |
//! | no runtime                      | private current-thread runtime on the caller's thread   |
//!
//! Callbacks can therefore use tokio timers and I/O under either strategy.
//!
//! ## Rules
//! - Callbacks never run in parallel: the fold awaits each one before starting the next.
//! - A suspended callback yields the scheduler but keeps program order.
//! - The strategy is chosen once per deployment ([`Config::strategy`](crate::Config::strategy)).
//! - On a current-thread runtime `Blocking` parks the only worker until the fold
//!   finishes. Callbacks must not wait on tasks spawned on that outer runtime.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};

use crate::error::{panic_message, ExecutorError};

/// How chain and bus work is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionStrategy {
    /// Drive to completion on tokio before returning.
    Blocking,
    /// Return a future; callbacks may suspend without blocking the thread.
    #[default]
    NonBlocking,
}

impl ExecutionStrategy {
    /// Runs `fut` under this strategy.
    ///
    /// A blocking run that cannot find or start a runtime yields
    /// `Err(ExecutorError.into())` without polling `fut`.
    pub fn execute<'a, T, E>(
        self,
        fut: BoxFuture<'a, Result<T, E>>,
    ) -> Completion<'a, Result<T, E>>
    where
        T: Send + 'a,
        E: From<ExecutorError> + Send + 'a,
    {
        match self {
            ExecutionStrategy::Blocking => Completion::ready(drive(fut)),
            ExecutionStrategy::NonBlocking => Completion::pending(fut),
        }
    }

    #[inline]
    pub fn is_blocking(&self) -> bool {
        matches!(self, ExecutionStrategy::Blocking)
    }

    /// Returns a short stable label (snake_case) for logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ExecutionStrategy::Blocking => "blocking",
            ExecutionStrategy::NonBlocking => "non_blocking",
        }
    }
}

/// Drives `fut` to completion on tokio from synchronous code.
fn drive<'a, T, E>(fut: BoxFuture<'a, Result<T, E>>) -> Result<T, E>
where
    T: Send + 'a,
    E: From<ExecutorError> + Send + 'a,
{
    block_on(fut).unwrap_or_else(|e| Err(e.into()))
}

fn block_on<T: Send>(fut: BoxFuture<'_, T>) -> Result<T, ExecutorError> {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(|| private_runtime().map(|rt| rt.block_on(fut)))
                .join()
                .map_err(|p| ExecutorError(format!("blocking helper panicked: {}", panic_message(&*p))))?
        }),
        Err(_) => Ok(private_runtime()?.block_on(fut)),
    }
}

fn private_runtime() -> Result<tokio::runtime::Runtime, ExecutorError> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExecutorError(format!("failed to start runtime: {e}")))
}

/// Result of a chain run or publish under some [`ExecutionStrategy`].
///
/// Either already finished (blocking strategy, disabled bus, skipped phase) or a
/// pending future. It can always be `.await`ed; [`Completion::wait`] drives a
/// pending one to completion from synchronous code.
///
/// ```
/// use hookvisor::{Completion, ExecutorError};
///
/// let done: Completion<'_, Result<u8, ExecutorError>> = Completion::ready(Ok(7));
/// assert!(done.is_ready());
/// assert_eq!(done.wait(), Ok(7));
/// ```
#[must_use = "a pending completion does nothing unless awaited or waited"]
pub struct Completion<'a, T> {
    state: State<'a, T>,
}

enum State<'a, T> {
    Ready(T),
    Pending(BoxFuture<'a, T>),
    Done,
}

impl<'a, T> Completion<'a, T> {
    pub fn ready(value: T) -> Self {
        Self {
            state: State::Ready(value),
        }
    }

    pub fn pending(fut: BoxFuture<'a, T>) -> Self {
        Self {
            state: State::Pending(fut),
        }
    }

    /// True when no further work is needed to obtain the value.
    pub fn is_ready(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }
}

impl<'a, T, E> Completion<'a, Result<T, E>>
where
    T: Send + 'a,
    E: From<ExecutorError> + Send + 'a,
{
    /// Returns the value, driving a pending future the way
    /// [`ExecutionStrategy::Blocking`] does.
    pub fn wait(self) -> Result<T, E> {
        match self.state {
            State::Ready(v) => v,
            State::Pending(fut) => drive(fut),
            State::Done => Err(ExecutorError("completion already consumed".into()).into()),
        }
    }
}

// The value is only ever moved out, never pinned.
impl<T> Unpin for Completion<'_, T> {}

impl<T> Future for Completion<'_, T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        match std::mem::replace(&mut this.state, State::Done) {
            State::Ready(v) => Poll::Ready(v),
            State::Pending(mut fut) => match fut.as_mut().poll(cx) {
                Poll::Ready(v) => Poll::Ready(v),
                Poll::Pending => {
                    this.state = State::Pending(fut);
                    Poll::Pending
                }
            },
            State::Done => panic!("Completion polled after completion"),
        }
    }
}

impl<T> fmt::Debug for Completion<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Ready(_) => "ready",
            State::Pending(_) => "pending",
            State::Done => "done",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    type Out = Result<u32, ExecutorError>;

    fn slept(ms: u64, value: u32) -> BoxFuture<'static, Out> {
        async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(value)
        }
        .boxed()
    }

    #[test]
    fn test_blocking_runs_before_returning() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let done = ExecutionStrategy::Blocking.execute(
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Out::Ok(5)
            }
            .boxed(),
        );
        assert!(done.is_ready());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(done.wait(), Ok(5));
    }

    #[test]
    fn test_non_blocking_is_lazy() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let pending = ExecutionStrategy::NonBlocking.execute(
            async move {
                h.fetch_add(1, Ordering::SeqCst);
                Out::Ok(5)
            }
            .boxed(),
        );
        assert!(!pending.is_ready());
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(pending.wait(), Ok(5));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_both_completions_can_be_awaited() {
        let a = ExecutionStrategy::Blocking
            .execute(async { Out::Ok(1) }.boxed())
            .await;
        let b = ExecutionStrategy::NonBlocking
            .execute(async { Out::Ok(2) }.boxed())
            .await;
        assert_eq!(a.unwrap() + b.unwrap(), 3);
    }

    #[test]
    fn test_blocking_drives_tokio_timer_without_runtime() {
        let done = ExecutionStrategy::Blocking.execute(slept(1, 9));
        assert!(done.is_ready());
        assert_eq!(done.wait(), Ok(9));
    }

    #[test]
    fn test_wait_drives_pending_tokio_timer() {
        let pending = ExecutionStrategy::NonBlocking.execute(slept(1, 4));
        assert!(!pending.is_ready());
        assert_eq!(pending.wait(), Ok(4));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_inside_multi_thread_runtime() {
        let done = ExecutionStrategy::Blocking.execute(slept(1, 3));
        assert!(done.is_ready());
        assert_eq!(done.await, Ok(3));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_blocking_inside_current_thread_runtime() {
        let done = ExecutionStrategy::Blocking.execute(slept(1, 2));
        assert!(done.is_ready());
        assert_eq!(done.await, Ok(2));
    }

    #[tokio::test]
    async fn test_wait_after_poll_reports_consumed() {
        let mut done = ExecutionStrategy::NonBlocking.execute(async { Out::Ok(1) }.boxed());
        assert_eq!((&mut done).await, Ok(1));
        assert!(matches!(done.wait(), Err(ExecutorError(_))));
    }

    #[test]
    fn test_default_is_non_blocking() {
        assert_eq!(ExecutionStrategy::default(), ExecutionStrategy::NonBlocking);
        assert!(!ExecutionStrategy::default().is_blocking());
    }
}
