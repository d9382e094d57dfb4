use std::{
    collections::BTreeSet,
    future::Future,
    ops::{Deref, DerefMut},
    sync::{Mutex, PoisonError},
};

use tokio::sync::{MutexGuard, watch};

/// FIFO gate around a value: callers get exclusive access strictly in the order
/// they called [`GuessSerializer::acquire`], regardless of how their futures are polled.
#[derive(Debug)]
pub struct GuessSerializer<T> {
    turns: TurnQueue,
    value: tokio::sync::Mutex<T>,
}

impl<T> GuessSerializer<T> {
    /// Wrap a value.
    pub fn new(value: T) -> Self {
        Self {
            turns: TurnQueue::new(),
            value: tokio::sync::Mutex::new(value),
        }
    }

    /// Reserve a place in line now and wait for it.
    ///
    /// The place is taken synchronously, before the returned future is first polled.
    /// Dropping the future or the guard hands the turn to the next caller.
    pub fn acquire(&self) -> impl Future<Output = SerialGuard<'_, T>> + '_ {
        let turn = self.turns.take();
        async move {
            turn.wait().await;
            let value = self.value.lock().await;
            SerialGuard { value, _turn: turn }
        }
    }
}

/// Exclusive access to the serialised value; releases the turn on drop.
pub struct SerialGuard<'a, T> {
    value: MutexGuard<'a, T>,
    _turn: Turn<'a>,
}

impl<T> Deref for SerialGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> DerefMut for SerialGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

#[derive(Debug, Default)]
struct TurnState {
    next: u64,
    serving: u64,
    abandoned: BTreeSet<u64>,
}

#[derive(Debug)]
struct TurnQueue {
    state: Mutex<TurnState>,
    serving: watch::Sender<u64>,
}

impl TurnQueue {
    fn new() -> Self {
        let (serving, _) = watch::channel(0);
        Self {
            state: Mutex::new(TurnState::default()),
            serving,
        }
    }

    fn take(&self) -> Turn<'_> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let number = state.next;
        state.next += 1;
        Turn {
            queue: self,
            number,
        }
    }

    fn finish(&self, number: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.serving == number {
            state.serving += 1;
            loop {
                let serving = state.serving;
                if !state.abandoned.remove(&serving) {
                    break;
                }
                state.serving += 1;
            }
            self.serving.send_replace(state.serving);
        } else if number > state.serving {
            state.abandoned.insert(number);
        }
    }
}

struct Turn<'a> {
    queue: &'a TurnQueue,
    number: u64,
}

impl Turn<'_> {
    async fn wait(&self) {
        let mut serving = self.queue.serving.subscribe();
        // The sender lives as long as the queue, so this cannot fail while we borrow it.
        let _ = serving.wait_for(|current| *current == self.number).await;
    }
}

impl Drop for Turn<'_> {
    fn drop(&mut self) {
        self.queue.finish(self.number);
    }
}
