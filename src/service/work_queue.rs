use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::Notify;

/// Per key exponential delay: `base * 2^failures`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub base: Duration,
    pub max: Duration,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(5),
            max: Duration::from_secs(60),
        }
    }
}

impl ExponentialBackoff {
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
        self.base.checked_mul(factor)
            .map(|delay| delay.min(self.max))
            .unwrap_or(self.max)
    }
}

struct QueueState<K> {
    queue: VecDeque<K>,
    dirty: HashSet<K>,
    processing: HashSet<K>,
    failures: HashMap<K, u32>,
    shutting_down: bool,
}

impl<K> Default for QueueState<K> {
    fn default() -> Self {
        Self {
            queue: VecDeque::new(),
            dirty: HashSet::new(),
            processing: HashSet::new(),
            failures: HashMap::new(),
            shutting_down: false,
        }
    }
}

/// Work queue coalescing keys that are pending or in flight.
///
/// A key handed out by [`RateLimitedQueue::get`] is not handed out again until
/// [`RateLimitedQueue::done`] is called for it; adds received meanwhile are replayed at that point.
pub struct RateLimitedQueue<K> {
    state: Arc<Mutex<QueueState<K>>>,
    notify: Arc<Notify>,
    backoff: ExponentialBackoff,
}

impl<K> Clone for RateLimitedQueue<K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            notify: self.notify.clone(),
            backoff: self.backoff.clone(),
        }
    }
}

impl<K> RateLimitedQueue<K>
    where K: Clone + Eq + Hash + Send + 'static,
{
    pub fn new(backoff: ExponentialBackoff) -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            backoff,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<K>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add(&self, key: K) {
        let mut state = self.lock();
        if state.shutting_down || state.dirty.contains(&key) {
            return;
        }
        state.dirty.insert(key.clone());
        if state.processing.contains(&key) {
            return;
        }
        state.queue.push_back(key);
        drop(state);
        self.notify.notify_one();
    }

    pub fn add_after(&self, key: K, delay: Duration) {
        if delay.is_zero() {
            self.add(key);
            return;
        }
        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.add(key);
        });
    }

    /// Re-enqueues the key after its current backoff delay and bumps its failure count.
    pub fn add_rate_limited(&self, key: K) {
        let delay = {
            let mut state = self.lock();
            let failures = state.failures.entry(key.clone()).or_insert(0);
            let delay = self.backoff.delay(*failures);
            *failures = failures.saturating_add(1);
            delay
        };
        self.add_after(key, delay);
    }

    /// Resets the failure count of the key.
    pub fn forget(&self, key: &K) {
        self.lock().failures.remove(key);
    }

    pub fn num_requeues(&self, key: &K) -> u32 {
        self.lock().failures.get(key).copied().unwrap_or_default()
    }

    /// Waits for the next key, `None` once the queue is shut down and drained.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            {
                let mut state = self.lock();
                if let Some(key) = state.queue.pop_front() {
                    state.dirty.remove(&key);
                    state.processing.insert(key.clone());
                    if !state.queue.is_empty() {
                        self.notify.notify_one();
                    }
                    return Some(key);
                }
                if state.shutting_down {
                    return None;
                }
            }
            notified.await;
        }
    }

    pub fn done(&self, key: &K) {
        let mut state = self.lock();
        state.processing.remove(key);
        if state.dirty.contains(key) {
            state.queue.push_back(key.clone());
            drop(state);
            self.notify.notify_one();
        }
    }

    pub fn shutdown(&self) {
        self.lock().shutting_down = true;
        self.notify.notify_waiters();
    }

    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> RateLimitedQueue<String> {
        RateLimitedQueue::new(ExponentialBackoff::default())
    }

    #[test]
    fn test_backoff_growth() {
        let backoff = ExponentialBackoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(5));
        assert_eq!(backoff.delay(1), Duration::from_millis(10));
        assert_eq!(backoff.delay(4), Duration::from_millis(80));
        assert_eq!(backoff.delay(20), Duration::from_secs(60));
        assert_eq!(backoff.delay(64), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_pending_duplicates_coalesce() {
        let queue = queue();
        queue.add(String::from("a"));
        queue.add(String::from("a"));
        queue.add(String::from("b"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get().await.as_deref(), Some("a"));
        assert_eq!(queue.get().await.as_deref(), Some("b"));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_in_flight_key_is_replayed_after_done() {
        let queue = queue();
        queue.add(String::from("a"));
        let key = queue.get().await.unwrap();

        queue.add(String::from("a"));
        assert!(queue.is_empty(), "key in flight must not be handed out twice");

        queue.done(&key);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get().await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_rate_limited_requeue_and_forget() {
        let queue = queue();
        queue.add_rate_limited(String::from("a"));
        queue.add_rate_limited(String::from("a"));
        assert_eq!(queue.num_requeues(&String::from("a")), 2);

        let key = tokio::time::timeout(Duration::from_secs(1), queue.get()).await
            .expect("rate limited key never came back");
        assert_eq!(key.as_deref(), Some("a"));

        queue.forget(&String::from("a"));
        assert_eq!(queue.num_requeues(&String::from("a")), 0);
    }

    #[tokio::test]
    async fn test_shutdown_releases_waiting_workers() {
        let queue = queue();
        let worker = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.get().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        queue.shutdown();
        queue.add(String::from("late"));

        let out = tokio::time::timeout(Duration::from_secs(1), worker).await
            .expect("worker still waiting")
            .unwrap();
        assert!(out.is_none());
    }
}
