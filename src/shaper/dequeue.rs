/*!
 * Dequeue Selector
 * Picks the next packet honoring the current gate mask, close times and budgets
 */

use super::{budget, CurrentEntry, Shaper};
use crate::core::limits::{ALL_GATES_OPEN, TC_MAX_QUEUE};
use crate::core::time::add_ns;
use crate::device::DeviceProfile;
use crate::packet::Packet;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Queue selection order, fixed when the shaper is built
///
/// # Performance
/// - Packed C layout for a cheap match on every dequeue
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DequeuePolicy {
    /// Highest open class first, round robin over the class's queues
    TcPriority,
    /// Round robin over every queue, skipping packets of closed classes
    TxqPriority,
}

impl DequeuePolicy {
    /// Choose from the device profile
    ///
    /// Devices whose queue-priority handling ignores classes get the flat
    /// order, since class ranges cannot be trusted to mean priority there.
    pub fn for_device(device: &DeviceProfile) -> Self {
        if device.broken_mqprio {
            Self::TxqPriority
        } else {
            Self::TcPriority
        }
    }

    /// Parse from string representation
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "tc_priority" | "tc" => Ok(Self::TcPriority),
            "txq_priority" | "txq" | "flat" => Ok(Self::TxqPriority),
            _ => Err(format!(
                "Invalid dequeue policy '{}'. Valid: tc_priority, txq_priority",
                s
            )),
        }
    }

    #[inline(always)]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TcPriority => "tc_priority",
            Self::TxqPriority => "txq_priority",
        }
    }
}

impl Serialize for DequeuePolicy {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DequeuePolicy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Round robin positions
#[derive(Debug, Default)]
pub(crate) struct TxqCursors {
    per_tc: [usize; TC_MAX_QUEUE],
    flat: usize,
}

impl Shaper {
    /// Pull the next transmittable packet, if any
    ///
    /// Before the schedule starts every gate counts as open. A packet is
    /// only released when, sent now, it finishes before its class's gate
    /// closes and fits the class's remaining budget; txtime-assist packets
    /// skip both checks since their departure time was fixed at enqueue.
    ///
    /// # Performance
    /// Hot path - serialized by the cursor lock, lock-free schedule read
    pub fn dequeue(&self) -> Option<Packet> {
        let mut cursors = self.cursors.lock();
        let state = self.state.load();
        let current = state.current.as_ref();

        let gate_mask = current
            .map(|c| c.entry().gate_mask())
            .unwrap_or(ALL_GATES_OPEN);
        if gate_mask == 0 {
            return None;
        }

        let assist = self.is_txtime_assist();
        match self.policy {
            DequeuePolicy::TcPriority => self.dequeue_tc_priority(&mut cursors, current, gate_mask, assist),
            DequeuePolicy::TxqPriority => self.dequeue_txq_priority(&mut cursors, current, gate_mask, assist),
        }
    }

    fn dequeue_tc_priority(
        &self,
        cursors: &mut TxqCursors,
        current: Option<&CurrentEntry>,
        gate_mask: u32,
        assist: bool,
    ) -> Option<Packet> {
        for tc in (0..self.layout.num_tc()).rev() {
            if gate_mask & (1u32 << tc) == 0 {
                continue;
            }
            let range = self.layout.range(tc);
            if !range.contains(cursors.per_tc[tc]) {
                cursors.per_tc[tc] = range.offset;
            }
            let first = cursors.per_tc[tc];

            loop {
                let txq = cursors.per_tc[tc];
                let packet = self.dequeue_from_txq(txq, current, gate_mask, assist);

                let next = if txq + 1 >= range.end() { range.offset } else { txq + 1 };
                cursors.per_tc[tc] = next;

                if packet.is_some() {
                    return packet;
                }
                if next == first {
                    break;
                }
            }
        }
        None
    }

    fn dequeue_txq_priority(
        &self,
        cursors: &mut TxqCursors,
        current: Option<&CurrentEntry>,
        gate_mask: u32,
        assist: bool,
    ) -> Option<Packet> {
        let num_txq = self.queues.len();
        for step in 0..num_txq {
            let txq = (cursors.flat + step) % num_txq;
            if let Some(packet) = self.dequeue_from_txq(txq, current, gate_mask, assist) {
                cursors.flat = (txq + 1) % num_txq;
                return Some(packet);
            }
        }
        None
    }

    fn dequeue_from_txq(
        &self,
        txq: usize,
        current: Option<&CurrentEntry>,
        gate_mask: u32,
        assist: bool,
    ) -> Option<Packet> {
        let queue = self.queues.get(txq)?;
        let head = queue.peek()?;
        let tc = self.layout.tc_for_priority(head.priority);
        if gate_mask & (1u32 << tc) == 0 {
            return None;
        }

        let len = head.len();
        if let Some(entry) = current.filter(|_| !assist).map(|c| c.entry()) {
            let guard = add_ns(self.now(), self.rate.length_to_duration(len));
            if !entry.allows_tx(guard, tc) {
                return None;
            }
            // the head stays queued unless its class can pay for it
            if !budget::consume(entry, tc, len, gate_mask, self.layout.num_tc()) {
                return None;
            }
        }

        let packet = queue.dequeue()?;
        self.stats.record_dequeue(len);
        Some(packet)
    }
}
