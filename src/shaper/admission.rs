/*!
 * Admission
 * Enqueue-time checks: queue lookup, frame limits, launch-time validation
 * and txtime stamping
 */

use super::locator::is_valid_interval;
use super::Shaper;
use crate::core::errors::DropReason;
use crate::core::time::Nanos;
use crate::packet::Packet;
use crate::queue::TxQueue;
use serde::Serialize;
use tracing::debug;

/// Result of offering a packet to the shaper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EnqueueOutcome {
    Accepted,
    /// Oversized packet split up; at least one segment was queued
    Segmented { accepted: usize, dropped: usize },
    Dropped { reason: DropReason },
}

impl EnqueueOutcome {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        !matches!(self, EnqueueOutcome::Dropped { .. })
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            EnqueueOutcome::Dropped { reason } => Some(*reason),
            _ => None,
        }
    }
}

impl Shaper {
    /// Offer a packet for transmission
    ///
    /// Packets larger than their class's frame limit are segmented when they
    /// carry segmentation info and dropped otherwise. A packet with a launch
    /// time must fall inside an open interval; in txtime-assist mode other
    /// packets get a departure time stamped or are dropped when none exists.
    ///
    /// # Performance
    /// Hot path - one schedule snapshot load plus, when pacing, one bounded
    /// entry walk per packet
    pub fn enqueue(&self, packet: Packet) -> EnqueueOutcome {
        let Some(queue) = self.queues.get(packet.queue_mapping) else {
            return self.refuse(&packet, DropReason::NoQueue);
        };
        let tc = self.layout.tc_for_priority(packet.priority);

        if self.exceeds_max_frame(&packet, tc) {
            if packet.is_gso() {
                return self.enqueue_segmented(packet, tc, queue.as_ref());
            }
            return self.refuse(&packet, DropReason::Oversized);
        }

        match self.enqueue_one(packet, tc, queue.as_ref()) {
            Ok(()) => EnqueueOutcome::Accepted,
            Err(reason) => EnqueueOutcome::Dropped { reason },
        }
    }

    fn enqueue_segmented(&self, packet: Packet, tc: usize, queue: &dyn TxQueue) -> EnqueueOutcome {
        let segments = match packet.segment() {
            Some(segments) if !segments.is_empty() => segments,
            _ => return self.refuse(&packet, DropReason::SegmentationFailed),
        };
        self.stats.record_segmented();

        let mut accepted = 0;
        let mut dropped = 0;
        let mut last_reason = DropReason::SegmentationFailed;
        for segment in segments {
            let result = if self.exceeds_max_frame(&segment, tc) {
                self.stats.record_drop(DropReason::Oversized);
                Err(DropReason::Oversized)
            } else {
                self.enqueue_one(segment, tc, queue)
            };
            match result {
                Ok(()) => accepted += 1,
                Err(reason) => {
                    dropped += 1;
                    last_reason = reason;
                }
            }
        }

        debug!(id = packet.id, accepted, dropped, "packet segmented");
        if accepted == 0 {
            return EnqueueOutcome::Dropped {
                reason: last_reason,
            };
        }
        EnqueueOutcome::Segmented { accepted, dropped }
    }

    fn enqueue_one(&self, mut packet: Packet, tc: usize, queue: &dyn TxQueue) -> Result<(), DropReason> {
        if let Some(launch_time) = packet.launch_time {
            if !self.launch_time_valid(&packet, launch_time, tc) {
                self.refuse(&packet, DropReason::InvalidLaunchTime);
                return Err(DropReason::InvalidLaunchTime);
            }
        } else if self.is_txtime_assist() {
            match self.packet_txtime(&packet, tc) {
                Some(txtime) => packet.txtime = Some(txtime),
                None => {
                    self.refuse(&packet, DropReason::NoInterval);
                    return Err(DropReason::NoInterval);
                }
            }
        }

        let len = packet.len();
        if let Err(packet) = queue.enqueue(packet) {
            self.refuse(&packet, DropReason::QueueFull);
            return Err(DropReason::QueueFull);
        }
        self.stats.record_enqueue(len);
        Ok(())
    }

    /// Launch time check against the schedule governing that time
    fn launch_time_valid(&self, packet: &Packet, launch_time: Nanos, tc: usize) -> bool {
        let state = self.state.load();
        let admin = state.admin.as_deref();
        let sched = match (state.oper.as_deref(), admin) {
            (_, Some(admin)) if launch_time >= admin.base_time() => admin,
            (Some(oper), _) => oper,
            (None, _) => return false,
        };
        let transmit_time = self.rate.length_to_duration(packet.len());
        is_valid_interval(sched, admin, launch_time, tc, transmit_time)
    }

    #[inline]
    fn exceeds_max_frame(&self, packet: &Packet, tc: usize) -> bool {
        let state = self.state.load();
        match state.oper.as_ref() {
            Some(oper) => packet.len() > oper.max_frm_len(tc) as usize,
            None => false,
        }
    }

    fn refuse(&self, packet: &Packet, reason: DropReason) -> EnqueueOutcome {
        self.stats.record_drop(reason);
        debug!(
            id = packet.id,
            len = packet.len(),
            priority = packet.priority,
            reason = reason.as_str(),
            "packet dropped"
        );
        EnqueueOutcome::Dropped { reason }
    }
}
