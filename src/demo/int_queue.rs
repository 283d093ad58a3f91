//! # Interrupt Queue Test
//!
//! Both stress timer ISRs push `(channel, sequence)` into one lock-free
//! queue; a foreground activity drains it. Each channel's sequence advances
//! only when its item was actually enqueued, so the consumer must see every
//! channel's items in order with no gaps. Anything else means an ISR ran on a
//! corrupted context or the queue lost an item.
//!
//! ```text
//!   TIM2 ISR ──┐
//!              ├──► Q32<(ChannelId, u32)> ──► QueueConsumer ──► received[ch]
//!   TIM3 ISR ──┘                                     │
//!                                                    └──► error latch
//! ```

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use heapless::mpmc::Q32;
use log::error;

use crate::config::INT_QUEUE_BATCH;
use crate::executive::Activity;
use crate::probe::LivenessProbe;
use crate::stress::ChannelId;
use crate::tick::Ticks;

/// Status tag reported when the queue test fails.
pub const TAG: &str = "Error: IntQueue";

/// State shared between the producing ISRs and the consumer.
pub struct IntQueue {
    queue: Q32<(ChannelId, u32)>,
    /// Next sequence number per channel. Written only by that channel's ISR.
    next_seq: [AtomicU32; 2],
    /// Items consumed per channel. Written only by the consumer.
    received: [AtomicU32; 2],
    failed: AtomicBool,
}

impl IntQueue {
    pub const fn new() -> Self {
        Self {
            queue: Q32::new(),
            next_seq: [AtomicU32::new(0), AtomicU32::new(0)],
            received: [AtomicU32::new(0), AtomicU32::new(0)],
            failed: AtomicBool::new(false),
        }
    }

    /// ISR side: enqueue the channel's next item.
    ///
    /// Returns `true` when the consumer should be given the CPU: after every
    /// `INT_QUEUE_BATCH` items, and whenever the queue is full.
    pub fn produce(&self, channel: ChannelId) -> bool {
        let slot = &self.next_seq[channel.index()];
        let seq = slot.load(Ordering::Relaxed);
        match self.queue.enqueue((channel, seq)) {
            Ok(()) => {
                let next = seq.wrapping_add(1);
                slot.store(next, Ordering::Relaxed);
                next % INT_QUEUE_BATCH == 0
            }
            Err(_) => true,
        }
    }

    pub fn received(&self, channel: ChannelId) -> u32 {
        self.received[channel.index()].load(Ordering::Relaxed)
    }

    pub fn has_failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

impl Default for IntQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue shared with the timer vectors.
pub static INT_QUEUE: IntQueue = IntQueue::new();

/// Handler bound to the first stress channel.
pub fn first_timer_handler() -> bool {
    INT_QUEUE.produce(ChannelId::First)
}

/// Handler bound to the second stress channel.
pub fn second_timer_handler() -> bool {
    INT_QUEUE.produce(ChannelId::Second)
}

/// Foreground side: drains the queue and checks sequence contiguity.
pub struct QueueConsumer<'a> {
    queue: &'a IntQueue,
    expected: [u32; 2],
}

impl<'a> QueueConsumer<'a> {
    pub const fn new(queue: &'a IntQueue) -> Self {
        Self { queue, expected: [0, 0] }
    }

    /// Dequeue everything currently queued. Returns the number of items.
    pub fn drain(&mut self) -> u32 {
        let mut drained = 0;
        while let Some((channel, seq)) = self.queue.queue.dequeue() {
            let i = channel.index();
            // Only the first error is logged; the latch keeps the rest
            if seq != self.expected[i] && !self.queue.failed.swap(true, Ordering::Relaxed) {
                error!(
                    "int queue: {:?} expected seq {} got {}",
                    channel, self.expected[i], seq
                );
            }
            self.expected[i] = seq.wrapping_add(1);
            self.queue.received[i].fetch_add(1, Ordering::Relaxed);
            drained += 1;
        }
        drained
    }
}

impl Activity for QueueConsumer<'_> {
    fn name(&self) -> &'static str {
        "IntQ"
    }

    fn run(&mut self, now: Ticks) -> Ticks {
        self.drain();
        now.wrapping_add(1)
    }
}

/// Liveness probe for the queue test.
///
/// Fails once an ordering error has been seen, or when either channel
/// delivered nothing since the previous check.
pub struct IntQueueProbe<'a> {
    queue: &'a IntQueue,
    last_received: [u32; 2],
}

impl<'a> IntQueueProbe<'a> {
    pub const fn new(queue: &'a IntQueue) -> Self {
        Self { queue, last_received: [0, 0] }
    }
}

impl LivenessProbe for IntQueueProbe<'_> {
    fn tag(&self) -> &'static str {
        TAG
    }

    fn still_running(&mut self, _period: Ticks) -> bool {
        let mut ok = !self.queue.has_failed();

        for channel in ChannelId::ALL {
            let i = channel.index();
            let received = self.queue.received(channel);
            if received == self.last_received[i] {
                ok = false;
            }
            self.last_received[i] = received;
        }

        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Push and drain `items` per channel, interleaved.
    fn pump(queue: &IntQueue, consumer: &mut QueueConsumer<'_>, items: u32) {
        for _ in 0..items {
            queue.produce(ChannelId::First);
            queue.produce(ChannelId::Second);
            consumer.drain();
        }
    }

    #[test]
    fn test_yield_requested_every_batch() {
        let queue = IntQueue::new();
        let yields: Vec<bool> = (0..16).map(|_| queue.produce(ChannelId::First)).collect();
        let expected: Vec<bool> = (1..=16).map(|n| n % INT_QUEUE_BATCH == 0).collect();
        assert_eq!(yields, expected);
    }

    #[test]
    fn test_in_order_items_pass() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        pump(&queue, &mut consumer, 100);
        assert!(!queue.has_failed());
        assert_eq!(queue.received(ChannelId::First), 100);
        assert_eq!(queue.received(ChannelId::Second), 100);
    }

    #[test]
    fn test_gap_is_latched() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        queue.produce(ChannelId::First);
        queue.queue.enqueue((ChannelId::First, 5)).unwrap();
        consumer.drain();
        assert!(queue.has_failed());

        // Stays failed even once the stream is clean again
        pump(&queue, &mut consumer, 4);
        assert!(queue.has_failed());
    }

    #[test]
    fn test_full_queue_does_not_skip_sequence() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        let mut accepted = 0;
        loop {
            // A rejected item asks for a yield and leaves the sequence alone
            let yielded = queue.produce(ChannelId::Second);
            if queue.next_seq[1].load(Ordering::Relaxed) == accepted {
                assert!(yielded);
                break;
            }
            accepted += 1;
        }
        assert!(accepted > 0);
        assert_eq!(consumer.drain(), accepted);

        queue.produce(ChannelId::Second);
        consumer.drain();
        assert!(!queue.has_failed());
        assert_eq!(queue.received(ChannelId::Second), accepted + 1);
    }

    #[test]
    fn test_liveness_needs_progress_on_both_channels() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        let mut probe = IntQueueProbe::new(&queue);

        pump(&queue, &mut consumer, 3);
        assert!(probe.still_running(3000));

        // Any progress at all is enough, however short the real interval
        pump(&queue, &mut consumer, 1);
        assert!(probe.still_running(3000));

        // Only the first channel moved
        queue.produce(ChannelId::First);
        consumer.drain();
        assert!(!probe.still_running(3000));

        // Nothing moved
        assert!(!probe.still_running(3000));
    }

    #[test]
    fn test_liveness_fails_on_ordering_error() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        let mut probe = IntQueueProbe::new(&queue);
        queue.failed.store(true, Ordering::Relaxed);
        pump(&queue, &mut consumer, 5);
        assert!(!probe.still_running(3000));
        assert_eq!(probe.tag(), TAG);
    }

    #[test]
    fn test_consumer_polls_every_tick() {
        let queue = IntQueue::new();
        let mut consumer = QueueConsumer::new(&queue);
        assert_eq!(consumer.run(41), 42);
    }
}
