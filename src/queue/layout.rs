/*!
 * Queue Layout
 * Priority -> traffic class -> transmit queue mapping
 */

use crate::core::errors::ConfigError;
use crate::core::limits::{TC_BITMASK, TC_MAX_QUEUE};
use serde::{Deserialize, Serialize};

/// Contiguous range of transmit queues serving one traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcRange {
    pub offset: usize,
    pub count: usize,
}

impl TcRange {
    #[inline]
    pub fn end(&self) -> usize {
        self.offset + self.count
    }

    #[inline]
    pub fn contains(&self, txq: usize) -> bool {
        txq >= self.offset && txq < self.end()
    }
}

/// Mapping from packet priorities to classes and from classes to queues
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLayout {
    pub num_txq: usize,
    pub tc_to_txq: Vec<TcRange>,
    pub prio_tc_map: [u8; TC_BITMASK + 1],
}

impl QueueLayout {
    /// One transmit queue per class; priority `p` maps to class `min(p, num_tc - 1)`
    pub fn one_queue_per_class(num_tc: usize) -> Self {
        let num_tc = num_tc.clamp(1, TC_MAX_QUEUE);
        let mut prio_tc_map = [0u8; TC_BITMASK + 1];
        for (prio, tc) in prio_tc_map.iter_mut().enumerate() {
            *tc = prio.min(num_tc - 1) as u8;
        }
        Self {
            num_txq: num_tc,
            tc_to_txq: (0..num_tc).map(|tc| TcRange { offset: tc, count: 1 }).collect(),
            prio_tc_map,
        }
    }

    #[inline(always)]
    pub fn num_tc(&self) -> usize {
        self.tc_to_txq.len()
    }

    /// Traffic class for a packet priority
    ///
    /// # Performance
    /// Hot path - called on every enqueue and dequeue
    #[inline(always)]
    pub fn tc_for_priority(&self, priority: u32) -> usize {
        self.prio_tc_map[(priority as usize) & TC_BITMASK] as usize
    }

    #[inline]
    pub fn range(&self, tc: usize) -> TcRange {
        self.tc_to_txq[tc]
    }

    /// Check ranges and priority map
    ///
    /// Overlapping queue ranges are tolerated only in txtime-assist mode.
    pub fn validate(&self, allow_overlap: bool) -> Result<(), ConfigError> {
        let num_tc = self.num_tc();
        if num_tc == 0 || num_tc > TC_MAX_QUEUE {
            return Err(ConfigError::InvalidLayout(format!(
                "number of traffic classes {} must be between 1 and {}",
                num_tc, TC_MAX_QUEUE
            )));
        }
        if num_tc > self.num_txq {
            return Err(ConfigError::InvalidLayout(
                "Number of traffic classes is greater than number of queues".into(),
            ));
        }

        for (tc, range) in self.tc_to_txq.iter().enumerate() {
            if range.count == 0 || range.end() > self.num_txq {
                return Err(ConfigError::InvalidLayout(format!(
                    "class {} queue range {}..{} is outside 0..{}",
                    tc,
                    range.offset,
                    range.end(),
                    self.num_txq
                )));
            }
            if allow_overlap {
                continue;
            }
            for (other_tc, other) in self.tc_to_txq.iter().enumerate().skip(tc + 1) {
                if range.offset < other.end() && other.offset < range.end() {
                    return Err(ConfigError::InvalidLayout(format!(
                        "queue ranges of classes {} and {} overlap",
                        tc, other_tc
                    )));
                }
            }
        }

        if let Some(prio) = self
            .prio_tc_map
            .iter()
            .position(|&tc| tc as usize >= num_tc)
        {
            return Err(ConfigError::InvalidLayout(format!(
                "priority {} maps to class {} but only {} classes exist",
                prio, self.prio_tc_map[prio], num_tc
            )));
        }

        Ok(())
    }
}

impl Default for QueueLayout {
    fn default() -> Self {
        Self::one_queue_per_class(TC_MAX_QUEUE / 2)
    }
}
