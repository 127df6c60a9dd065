//! Per-connection outbound mailbox ordered by scheduled send time
//!
//! Replies are not sent in the order they were queued but in the order their
//! send time comes up. Once the first byte of a message has been written that
//! message stays current until it is fully flushed, so a reply never gets
//! interleaved with another one on the wire.

use log::debug;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::io::{self, ErrorKind, Write};
use std::time::{Duration, Instant};

/// Result of one non-blocking write attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flush {
    /// The current message was written out completely.
    Complete,
    /// Some or none of the current message went out; retry when writable.
    Partial,
}

/// Tie break between messages due at the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    /// Goes ahead of every normal message with the same send time.
    Urgent,
    Normal,
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Scheduled {
    at: Instant,
    priority: Priority,
    sequence: u64,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct DelayedQueue {
    pending: BinaryHeap<Reverse<Scheduled>>,
    current: Option<Vec<u8>>,
    cursor: usize,
    next_sequence: u64,
}

impl DelayedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules `payload` to become sendable at `now + delay`.
    pub fn push(&mut self, payload: impl Into<Vec<u8>>, delay: Duration, now: Instant) {
        self.push_with(payload, delay, Priority::Normal, now);
    }

    /// Like [`DelayedQueue::push`], ordering ties at the same send time by
    /// `priority` first and by insertion order second.
    pub fn push_with(
        &mut self,
        payload: impl Into<Vec<u8>>,
        delay: Duration,
        priority: Priority,
        now: Instant,
    ) {
        let scheduled = Scheduled {
            at: now + delay,
            priority,
            sequence: self.next_sequence,
            payload: payload.into(),
        };
        self.next_sequence += 1;
        self.pending.push(Reverse(scheduled));
    }

    /// Nothing queued and nothing half sent.
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    /// A message is partially written and waits for the socket.
    pub fn in_flight(&self) -> bool {
        self.current.is_some()
    }

    /// Whether the front message may be written at `now`.
    pub fn ready(&self, now: Instant) -> bool {
        self.current.is_some() || self.next_ready_time().is_some_and(|at| at <= now)
    }

    /// Send time of the earliest message not yet started.
    pub fn next_ready_time(&self) -> Option<Instant> {
        self.pending.peek().map(|Reverse(scheduled)| scheduled.at)
    }

    /// Performs a single write of the front message.
    ///
    /// `WouldBlock` and `Interrupted` count as a partial flush. Callers are
    /// expected to check [`DelayedQueue::ready`] first; with nothing ready this is
    /// a no-op reporting `Partial`.
    pub fn send<W: Write>(&mut self, writer: &mut W, now: Instant) -> io::Result<Flush> {
        if self.current.is_none() {
            if !self.ready(now) {
                return Ok(Flush::Partial);
            }
            if let Some(Reverse(scheduled)) = self.pending.pop() {
                self.current = Some(scheduled.payload);
                self.cursor = 0;
            }
        }

        let Some(message) = self.current.as_ref() else {
            return Ok(Flush::Partial);
        };

        match writer.write(&message[self.cursor..]) {
            Ok(0) => Err(io::Error::new(
                ErrorKind::WriteZero,
                "peer stopped accepting data",
            )),
            Ok(written) => {
                self.cursor += written;
                if self.cursor == message.len() {
                    debug!("Flushed {} byte message", message.len());
                    self.current = None;
                    self.cursor = 0;
                    Ok(Flush::Complete)
                } else {
                    Ok(Flush::Partial)
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::Interrupted => {
                Ok(Flush::Partial)
            }
            Err(e) => Err(e),
        }
    }

    /// Empties the queue, returning the unsent rest of the current message
    /// followed by every pending message in send-time order.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        let mut remaining = match self.current.take() {
            Some(message) => message[self.cursor..].to_vec(),
            None => Vec::new(),
        };
        self.cursor = 0;
        while let Some(Reverse(scheduled)) = self.pending.pop() {
            remaining.extend_from_slice(&scheduled.payload);
        }
        remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer accepting a fixed number of bytes per call, then blocking.
    struct Trickle {
        written: Vec<u8>,
        budgets: Vec<usize>,
    }

    impl Trickle {
        fn new(budgets: &[usize]) -> Self {
            Self {
                written: Vec::new(),
                budgets: budgets.iter().rev().copied().collect(),
            }
        }
    }

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            match self.budgets.pop() {
                Some(0) | None => Err(ErrorKind::WouldBlock.into()),
                Some(budget) => {
                    let n = budget.min(buf.len());
                    self.written.extend_from_slice(&buf[..n]);
                    Ok(n)
                }
            }
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn test_empty_queue() {
        let queue = DelayedQueue::new();
        let now = Instant::now();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert!(!queue.ready(now));
        assert_eq!(queue.next_ready_time(), None);
    }

    #[test]
    fn test_delayed_message_becomes_ready() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 0\r\n", secs(2), now);

        assert!(!queue.is_empty());
        assert!(!queue.ready(now));
        assert!(!queue.ready(now + Duration::from_millis(1999)));
        assert!(queue.ready(now + secs(2)));
        assert_eq!(queue.next_ready_time(), Some(now + secs(2)));
    }

    #[test]
    fn test_priority_by_send_time() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("late\r\n", secs(3), now);
        queue.push("soon\r\n", secs(1), now);
        queue.push("now\r\n", Duration::ZERO, now);

        let mut out = Trickle::new(&[100, 100, 100]);
        let later = now + secs(5);
        for _ in 0..3 {
            assert_eq!(queue.send(&mut out, later).unwrap(), Flush::Complete);
        }
        assert_eq!(out.written, b"now\r\nsoon\r\nlate\r\n");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_ready_message_overtakes_earlier_delayed_one() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 1\r\n", secs(3), now);
        queue.push("PENALTY 0 1\r\n", Duration::ZERO, now);

        assert!(queue.ready(now));
        let mut out = Trickle::new(&[100]);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        assert_eq!(out.written, b"PENALTY 0 1\r\n");
        assert!(!queue.ready(now));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_urgent_message_wins_ties() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 1 0\r\n", Duration::ZERO, now);
        queue.push_with("PENALTY 1 2\r\n", Duration::ZERO, Priority::Urgent, now);
        queue.push("BAD_PUT 9 9\r\n", Duration::ZERO, now);

        let mut out = Trickle::new(&[100, 100, 100]);
        for _ in 0..3 {
            assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        }
        assert_eq!(out.written, b"PENALTY 1 2\r\nSTATE 1 0\r\nBAD_PUT 9 9\r\n");
    }

    #[test]
    fn test_urgent_message_does_not_overtake_earlier_send_time() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 1\r\n", Duration::ZERO, now);
        queue.push_with("PENALTY 0 1\r\n", Duration::from_millis(5), Priority::Urgent, now);

        let mut out = Trickle::new(&[100, 100]);
        let later = now + Duration::from_secs(1);
        queue.send(&mut out, later).unwrap();
        queue.send(&mut out, later).unwrap();
        assert_eq!(out.written, b"STATE 1\r\nPENALTY 0 1\r\n");
    }

    #[test]
    fn test_partial_writes_resume_without_duplication() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("COEFF 1 2 3\r\n", Duration::ZERO, now);
        queue.push("STATE 0\r\n", Duration::ZERO, now);

        let mut out = Trickle::new(&[4, 0, 3, 100, 100]);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);
        assert!(queue.in_flight());
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        assert!(!queue.in_flight());
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        assert_eq!(out.written, b"COEFF 1 2 3\r\nSTATE 0\r\n");
    }

    #[test]
    fn test_in_flight_message_keeps_priority() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 1 2\r\n", Duration::ZERO, now);

        let mut out = Trickle::new(&[3, 100, 100]);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);

        queue.push("PENALTY 0 1\r\n", Duration::ZERO, now);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Complete);
        assert_eq!(out.written, b"STATE 1 2\r\nPENALTY 0 1\r\n");
    }

    #[test]
    fn test_send_with_nothing_ready_is_noop() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("BAD_PUT 9 9\r\n", secs(1), now);

        let mut out = Trickle::new(&[100]);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);
        assert!(out.written.is_empty());
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_write_error_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(ErrorKind::BrokenPipe.into())
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 0\r\n", Duration::ZERO, now);
        let err = queue.send(&mut Broken, now).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_take_remaining() {
        let now = Instant::now();
        let mut queue = DelayedQueue::new();
        queue.push("STATE 5\r\n", secs(4), now);
        queue.push("COEFF 1\r\n", Duration::ZERO, now);

        let mut out = Trickle::new(&[2]);
        assert_eq!(queue.send(&mut out, now).unwrap(), Flush::Partial);

        assert_eq!(queue.take_remaining(), b"EFF 1\r\nSTATE 5\r\n");
        assert!(queue.is_empty());
    }
}
