//! Per-id serialization of remote writes.
//!
//! A write takes a [`Ticket`] when it is *called*. The ticket holds the
//! completion signal of the previous write for the same id, so remote calls
//! for one id run, and resolve, strictly in call order. Different ids never
//! wait on each other.

use std::collections::HashMap;

use tokio::sync::oneshot;

#[derive(Default)]
pub(crate) struct OpQueue {
    /// Completion signal of the most recently queued write, per id.
    tails: HashMap<String, (u64, oneshot::Receiver<()>)>,
    next_seq: u64,
}

pub(crate) struct Ticket {
    pub(crate) key: String,
    pub(crate) seq: u64,
    previous: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

impl OpQueue {
    pub(crate) fn enqueue(&mut self, key: &str) -> Ticket {
        self.next_seq += 1;
        let seq = self.next_seq;
        let (done, tail) = oneshot::channel();
        let previous = self
            .tails
            .insert(key.to_string(), (seq, tail))
            .map(|(_, rx)| rx);
        Ticket {
            key: key.to_string(),
            seq,
            previous,
            done: Some(done),
        }
    }

    /// Forget the tail for `ticket.key` if `ticket` is still the newest write.
    pub(crate) fn release(&mut self, ticket: &Ticket) {
        if self
            .tails
            .get(&ticket.key)
            .is_some_and(|(seq, _)| *seq == ticket.seq)
        {
            self.tails.remove(&ticket.key);
        }
    }

    #[cfg(test)]
    pub(crate) fn is_idle(&self, key: &str) -> bool {
        !self.tails.contains_key(key)
    }

    pub(crate) fn clear(&mut self) {
        self.tails.clear();
    }
}

impl Ticket {
    /// Resolve once every earlier write for the same id has finished.
    pub(crate) async fn ready(&mut self) {
        if let Some(previous) = self.previous.take() {
            // A dropped sender means the earlier write finished or was abandoned.
            let _ = previous.await;
        }
    }

    /// Let the next write for this id proceed.
    pub(crate) fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_runs_in_call_order() {
        let mut queue = OpQueue::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut first = queue.enqueue("hiv-1");
        let mut second = queue.enqueue("hiv-1");

        let slow = {
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                first.ready().await;
                tokio::time::sleep(Duration::from_millis(30)).await;
                order.lock().unwrap().push(1);
                first.finish();
            })
        };
        let fast = {
            let order = Arc::clone(&order);
            tokio::spawn(async move {
                second.ready().await;
                order.lock().unwrap().push(2);
            })
        };

        fast.await.unwrap();
        slow.await.unwrap();
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn different_keys_do_not_wait() {
        let mut queue = OpQueue::default();
        let _held = queue.enqueue("hiv-1");
        let mut other = queue.enqueue("hiv-2");
        tokio::time::timeout(Duration::from_millis(50), other.ready())
            .await
            .expect("unrelated key should not block");
    }

    #[test]
    fn release_only_clears_newest_tail() {
        let mut queue = OpQueue::default();
        let first = queue.enqueue("hiv-1");
        let second = queue.enqueue("hiv-1");

        queue.release(&first);
        assert!(!queue.is_idle("hiv-1"));
        queue.release(&second);
        assert!(queue.is_idle("hiv-1"));
    }
}
