use std::collections::VecDeque;
use std::sync::Arc;

use ok_domain::{Error, Result};
use parking_lot::Mutex;
use tokio::sync::oneshot;

struct State {
    available: u32,
    waiters: VecDeque<oneshot::Sender<bool>>,
}

/// FIFO-fair counting semaphore. Unlike `tokio::sync::Semaphore`, `drain`
/// hands every waiter a typed rejection instead of merely closing the gate,
/// which the kernel's `kill_all` needs in order to tell an aborted waiter
/// apart from one that simply never got scheduled.
pub struct Semaphore {
    max: u32,
    state: Mutex<State>,
}

impl Semaphore {
    pub fn new(max: u32) -> Arc<Self> {
        Arc::new(Self { max, state: Mutex::new(State { available: max, waiters: VecDeque::new() }) })
    }

    pub fn available(&self) -> u32 {
        self.state.lock().available
    }

    pub async fn acquire(self: &Arc<Self>) -> Result<PermitGuard> {
        let rx = {
            let mut state = self.state.lock();
            if state.available > 0 {
                state.available -= 1;
                None
            } else {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                Some(rx)
            }
        };

        match rx {
            None => Ok(PermitGuard { sem: self.clone() }),
            Some(rx) => match rx.await {
                Ok(true) => Ok(PermitGuard { sem: self.clone() }),
                Ok(false) => Err(Error::Other("semaphore drained".to_string())),
                Err(_) => Err(Error::Other("semaphore closed".to_string())),
            },
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        match state.waiters.pop_front() {
            Some(tx) => {
                drop(state);
                let _ = tx.send(true);
            }
            None => state.available += 1,
        }
    }

    /// Rejects every current waiter and resets available permits to `max`.
    pub fn drain(&self) {
        let mut state = self.state.lock();
        for tx in state.waiters.drain(..) {
            let _ = tx.send(false);
        }
        state.available = self.max;
    }
}

pub struct PermitGuard {
    sem: Arc<Semaphore>,
}

impl Drop for PermitGuard {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn available_reflects_outstanding_permits() {
        let sem = Semaphore::new(2);
        assert_eq!(sem.available(), 2);
        let p1 = sem.acquire().await.unwrap();
        assert_eq!(sem.available(), 1);
        let p2 = sem.acquire().await.unwrap();
        assert_eq!(sem.available(), 0);
        drop(p1);
        assert_eq!(sem.available(), 1);
        drop(p2);
        assert_eq!(sem.available(), 2);
    }

    #[tokio::test]
    async fn waiters_are_granted_in_fifo_order() {
        let sem = Semaphore::new(1);
        let first = sem.acquire().await.unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let sem2 = sem.clone();
        let order2 = order.clone();
        let t1 = tokio::spawn(async move {
            let _p = sem2.acquire().await.unwrap();
            order2.lock().push(1);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let sem3 = sem.clone();
        let order3 = order.clone();
        let t2 = tokio::spawn(async move {
            let _p = sem3.acquire().await.unwrap();
            order3.lock().push(2);
        });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        drop(first);
        t1.await.unwrap();
        t2.await.unwrap();

        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn drain_rejects_all_waiters_and_resets_available() {
        let sem = Semaphore::new(1);
        let _held = sem.acquire().await.unwrap();

        let sem2 = sem.clone();
        let waiter = tokio::spawn(async move { sem2.acquire().await });

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        sem.drain();

        let result = waiter.await.unwrap();
        assert!(result.is_err());
        assert_eq!(sem.available(), 1);
    }
}
