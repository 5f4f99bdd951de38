/*!
 * Packet
 * Unit of work handed to the shaper by its producers
 */

use crate::core::time::Nanos;
use bytes::{BufMut, Bytes, BytesMut};
use std::sync::atomic::{AtomicU64, Ordering};

static PACKET_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generic segmentation parameters for an oversized packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GsoInfo {
    /// Bytes of headers replicated at the front of every segment
    pub header_len: usize,
    /// Payload bytes carried by each segment after the headers
    pub segment_size: usize,
}

/// Frame travelling through the shaper
///
/// `priority` is mapped to a traffic class through the queue layout;
/// `queue_mapping` picks the transmit queue. `launch_time` is a departure
/// time chosen by the sender (strictly validated); `txtime` is stamped by
/// txtime-assist pacing.
#[derive(Debug, Clone)]
pub struct Packet {
    pub id: u64,
    pub priority: u32,
    pub queue_mapping: usize,
    payload: Bytes,
    pub launch_time: Option<Nanos>,
    pub txtime: Option<Nanos>,
    /// Departure time requested by the sending transport (monotonic clock)
    pub sender_tstamp: Option<Nanos>,
    /// Offset of the network header inside the payload
    pub network_offset: Option<usize>,
    pub gso: Option<GsoInfo>,
}

impl Packet {
    pub fn new(priority: u32, payload: impl Into<Bytes>) -> Packet {
        Packet {
            id: PACKET_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            priority,
            queue_mapping: 0,
            payload: payload.into(),
            launch_time: None,
            txtime: None,
            sender_tstamp: None,
            network_offset: None,
            gso: None,
        }
    }

    /// Zero-filled packet of `len` bytes
    pub fn with_len(priority: u32, len: usize) -> Packet {
        Packet::new(priority, vec![0u8; len])
    }

    pub fn on_queue(mut self, queue: usize) -> Self {
        self.queue_mapping = queue;
        self
    }

    pub fn with_launch_time(mut self, time: Nanos) -> Self {
        self.launch_time = Some(time);
        self
    }

    pub fn with_sender_tstamp(mut self, time: Nanos) -> Self {
        self.sender_tstamp = Some(time);
        self
    }

    pub fn with_network_offset(mut self, offset: usize) -> Self {
        self.network_offset = Some(offset);
        self
    }

    pub fn with_gso(mut self, header_len: usize, segment_size: usize) -> Self {
        self.gso = Some(GsoInfo {
            header_len,
            segment_size,
        });
        self
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn is_gso(&self) -> bool {
        self.gso.is_some()
    }

    /// Split into segments carrying the replicated headers
    ///
    /// Returns `None` when the packet is not segmentable or the parameters
    /// cannot produce a segment.
    pub fn segment(&self) -> Option<Vec<Packet>> {
        let gso = self.gso?;
        if gso.segment_size == 0 || gso.header_len >= self.payload.len() {
            return None;
        }

        let header = self.payload.slice(..gso.header_len);
        let body = self.payload.slice(gso.header_len..);
        let segments = body
            .chunks(gso.segment_size)
            .map(|chunk| {
                let mut buf = BytesMut::with_capacity(header.len() + chunk.len());
                buf.put_slice(&header);
                buf.put_slice(chunk);
                Packet {
                    id: PACKET_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
                    payload: buf.freeze(),
                    gso: None,
                    ..self.clone()
                }
            })
            .collect();
        Some(segments)
    }
}
