/*!
 * Transmit Queues
 * Per-queue FIFOs the shaper pulls from; storage is owned by the caller
 */

mod layout;

pub use layout::{QueueLayout, TcRange};

use crate::packet::Packet;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Child queue operations the shaper relies on
///
/// The shaper only decides *when* to pull; ordering inside a queue is the
/// implementation's business.
pub trait TxQueue: Send + Sync {
    /// Offer a packet; hands it back when refused
    fn enqueue(&self, packet: Packet) -> Result<(), Packet>;

    /// Head packet without removing it
    fn peek(&self) -> Option<Packet>;

    /// Remove and return the head packet
    fn dequeue(&self) -> Option<Packet>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every queued packet
    fn reset(&self);
}

/// Bounded FIFO behind a mutex
#[derive(Debug)]
pub struct FifoQueue {
    packets: Mutex<VecDeque<Packet>>,
    limit: usize,
}

impl FifoQueue {
    pub fn new(limit: usize) -> Self {
        Self {
            packets: Mutex::new(VecDeque::new()),
            limit,
        }
    }
}

impl TxQueue for FifoQueue {
    fn enqueue(&self, packet: Packet) -> Result<(), Packet> {
        let mut packets = self.packets.lock();
        if packets.len() >= self.limit {
            return Err(packet);
        }
        packets.push_back(packet);
        Ok(())
    }

    fn peek(&self) -> Option<Packet> {
        self.packets.lock().front().cloned()
    }

    fn dequeue(&self) -> Option<Packet> {
        self.packets.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.packets.lock().len()
    }

    fn reset(&self) {
        self.packets.lock().clear();
    }
}
