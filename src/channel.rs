// ABOUTME: Bounded blocking channels backing the chan/send/recv builtins

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use crate::value::Value;

/// A fixed-capacity FIFO shared between OS threads. `send` blocks while the
/// buffer is full, `recv` while it is empty; both take an optional timeout
/// (the language-level builtins wait forever).
pub struct Channel {
    inner: Mutex<VecDeque<Value>>,
    cap: usize,
    not_full: Condvar,
    not_empty: Condvar,
}

impl Channel {
    pub fn new(cap: usize) -> Self {
        Channel {
            inner: Mutex::new(VecDeque::with_capacity(cap)),
            cap,
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        }
    }

    /// Returns false only when the timeout elapsed before space opened up.
    pub fn send(&self, v: Value, timeout: Option<Duration>) -> bool {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        while buf.len() == self.cap {
            match timeout {
                None => {
                    buf = self.not_full.wait(buf).unwrap_or_else(PoisonError::into_inner);
                }
                Some(dur) => {
                    let (guard, res) = self
                        .not_full
                        .wait_timeout(buf, dur)
                        .unwrap_or_else(PoisonError::into_inner);
                    buf = guard;
                    if res.timed_out() && buf.len() == self.cap {
                        return false;
                    }
                }
            }
        }
        buf.push_back(v);
        self.not_empty.notify_one();
        true
    }

    /// Returns `None` only when the timeout elapsed with nothing buffered.
    pub fn recv(&self, timeout: Option<Duration>) -> Option<Value> {
        let mut buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        while buf.is_empty() {
            match timeout {
                None => {
                    buf = self.not_empty.wait(buf).unwrap_or_else(PoisonError::into_inner);
                }
                Some(dur) => {
                    let (guard, res) = self
                        .not_empty
                        .wait_timeout(buf, dur)
                        .unwrap_or_else(PoisonError::into_inner);
                    buf = guard;
                    if res.timed_out() && buf.is_empty() {
                        return None;
                    }
                }
            }
        }
        let v = buf.pop_front();
        self.not_full.notify_one();
        v
    }

    /// Copy of the values currently in flight, for the collector's root
    /// scan.
    pub fn snapshot(&self) -> Vec<Value> {
        let buf = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        buf.iter().copied().collect()
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Channel(cap {})", self.cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_send_recv_fifo_single_thread() {
        let ch = Channel::new(4);
        for i in 0..4 {
            assert!(ch.send(Value::Int(i), None));
        }
        for i in 0..4 {
            assert_eq!(ch.recv(None), Some(Value::Int(i)));
        }
    }

    #[test]
    fn test_fifo_across_threads() {
        let ch = Arc::new(Channel::new(2));
        let producer = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || {
                for i in 0..100 {
                    ch.send(Value::Int(i), None);
                }
            })
        };
        let received: Vec<_> = (0..100).map(|_| ch.recv(None)).collect();
        producer.join().expect("producer");
        let expected: Vec<_> = (0..100).map(|i| Some(Value::Int(i))).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_send_blocks_until_recv_makes_room() {
        let ch = Arc::new(Channel::new(1));
        assert!(ch.send(Value::Int(1), None));
        let sender = {
            let ch = Arc::clone(&ch);
            thread::spawn(move || ch.send(Value::Int(2), None))
        };
        // Unblock the sender by draining one slot.
        assert_eq!(ch.recv(None), Some(Value::Int(1)));
        assert!(sender.join().expect("sender"));
        assert_eq!(ch.recv(None), Some(Value::Int(2)));
    }

    #[test]
    fn test_recv_timeout_on_empty() {
        let ch = Channel::new(1);
        assert_eq!(ch.recv(Some(Duration::from_millis(10))), None);
    }

    #[test]
    fn test_send_timeout_on_full() {
        let ch = Channel::new(1);
        assert!(ch.send(Value::Int(1), None));
        assert!(!ch.send(Value::Int(2), Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_snapshot_reports_buffered_values() {
        let ch = Channel::new(4);
        ch.send(Value::Int(7), None);
        ch.send(Value::Bool(true), None);
        assert_eq!(ch.snapshot(), vec![Value::Int(7), Value::Bool(true)]);
    }
}
