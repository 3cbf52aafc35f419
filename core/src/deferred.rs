//! Write-once, single-consumer results
//!
//! A `Deferred` is the reading half and a `Resolver` the writing half. The
//! result can be consumed exactly once: by blocking (`wait`), by polling
//! (`try_take`), by `.await`, or by a completion callback (`on_complete`).
//! Dropping a `Resolver` without resolving fails the `Deferred` with
//! `Abandon::abandoned()`, so every `Deferred` eventually settles.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Error types able to describe a resolver that went away
pub trait Abandon {
    fn abandoned() -> Self;
}

type Callback<T, E> = Box<dyn FnOnce(Result<T, E>) + Send>;

enum State<T, E> {
    Pending {
        waker: Option<Waker>,
        callback: Option<Callback<T, E>>,
    },
    Ready(Result<T, E>),
    /// Consumed, or handed to a callback
    Taken,
}

struct Shared<T, E> {
    state: Mutex<State<T, E>>,
    ready: Condvar,
}

impl<T, E> Shared<T, E> {
    fn new(state: State<T, E>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            ready: Condvar::new(),
        })
    }

    fn settle(&self, result: Result<T, E>) {
        let mut state = self.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Pending {
                callback: Some(callback),
                ..
            } => {
                drop(state);
                callback(result);
            }
            State::Pending {
                waker,
                callback: None,
            } => {
                *state = State::Ready(result);
                drop(state);
                self.ready.notify_all();
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            // Already settled: one resolution only
            settled => *state = settled,
        }
    }
}

/// Reading half of a deferred result
pub struct Deferred<T, E> {
    shared: Arc<Shared<T, E>>,
}

/// Writing half of a deferred result
pub struct Resolver<T, E: Abandon> {
    shared: Option<Arc<Shared<T, E>>>,
}

/// A pending deferred and the resolver that settles it
pub fn pending<T, E: Abandon>() -> (Resolver<T, E>, Deferred<T, E>) {
    let shared = Shared::new(State::Pending {
        waker: None,
        callback: None,
    });
    (
        Resolver {
            shared: Some(shared.clone()),
        },
        Deferred { shared },
    )
}

impl<T, E: Abandon> Resolver<T, E> {
    pub fn resolve(mut self, result: Result<T, E>) {
        if let Some(shared) = self.shared.take() {
            shared.settle(result);
        }
    }

    pub fn complete(self, value: T) {
        self.resolve(Ok(value));
    }

    pub fn fail(self, error: E) {
        self.resolve(Err(error));
    }
}

impl<T, E: Abandon> Drop for Resolver<T, E> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            shared.settle(Err(E::abandoned()));
        }
    }
}

impl<T, E> Deferred<T, E> {
    pub fn completed(value: T) -> Self {
        Self {
            shared: Shared::new(State::Ready(Ok(value))),
        }
    }

    pub fn failed(error: E) -> Self {
        Self {
            shared: Shared::new(State::Ready(Err(error))),
        }
    }

    /// Settled, whether or not the result was consumed
    pub fn is_done(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending { .. })
    }

    /// Take the result if it is already available
    pub fn try_take(&self) -> Option<Result<T, E>> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => Some(result),
            other => {
                *state = other;
                None
            }
        }
    }

    /// Run `callback` with the result once it is available
    ///
    /// Runs on the calling thread when the result is already there, otherwise
    /// on the thread that resolves.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<T, E>) + Send + 'static,
    {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => {
                drop(state);
                callback(result);
            }
            State::Pending { waker, .. } => {
                *state = State::Pending {
                    waker,
                    callback: Some(Box::new(callback)),
                };
            }
            State::Taken => {}
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Send + 'static,
    E: Abandon + Send + 'static,
{
    /// Block the current thread until the result is available
    pub fn wait(self) -> Result<T, E> {
        let mut state = self.shared.state.lock();
        loop {
            match std::mem::replace(&mut *state, State::Taken) {
                State::Ready(result) => return result,
                State::Taken => return Err(E::abandoned()),
                pending => {
                    *state = pending;
                    self.shared.ready.wait(&mut state);
                }
            }
        }
    }

    /// Block for at most `timeout`; `None` if still pending
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T, E>> {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.state.lock();
        loop {
            match std::mem::replace(&mut *state, State::Taken) {
                State::Ready(result) => return Some(result),
                State::Taken => return Some(Err(E::abandoned())),
                pending => {
                    *state = pending;
                    if self.shared.ready.wait_until(&mut state, deadline).timed_out() {
                        return None;
                    }
                }
            }
        }
    }

    pub fn map<U, F>(self, f: F) -> Deferred<U, E>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (resolver, deferred) = pending();
        self.on_complete(move |result| resolver.resolve(result.map(f)));
        deferred
    }

    pub fn map_err<E2, F>(self, f: F) -> Deferred<T, E2>
    where
        E2: Abandon + Send + 'static,
        F: FnOnce(E) -> E2 + Send + 'static,
    {
        let (resolver, deferred) = pending();
        self.on_complete(move |result| resolver.resolve(result.map_err(f)));
        deferred
    }

    /// Drive `future` on a tokio runtime and settle with its output
    pub fn spawn_on<F>(handle: &tokio::runtime::Handle, future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
    {
        let (resolver, deferred) = pending();
        handle.spawn(async move {
            resolver.resolve(future.await);
        });
        deferred
    }
}

impl<T, E: Abandon> Future for Deferred<T, E> {
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => Poll::Ready(result),
            State::Taken => Poll::Ready(Err(E::abandoned())),
            State::Pending { callback, .. } => {
                *state = State::Pending {
                    waker: Some(cx.waker().clone()),
                    callback,
                };
                Poll::Pending
            }
        }
    }
}

impl<T, E> std::fmt::Debug for Deferred<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match *self.shared.state.lock() {
            State::Pending { .. } => "pending",
            State::Ready(Ok(_)) => "completed",
            State::Ready(Err(_)) => "failed",
            State::Taken => "taken",
        };
        write!(f, "Deferred({})", state)
    }
}

#[cfg(test)]
mod tests;
