/*!
 * Device Profile
 * Static facts about the egress device, read once at construction
 */

use crate::core::limits::{DEFAULT_MAX_MTU, DEFAULT_MTU, ETH_HLEN};
use serde::{Deserialize, Serialize};

/// Egress device capabilities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub mtu: u32,
    pub max_mtu: u32,
    pub hard_header_len: u32,
    /// Per-frame L1 overhead from a size table, when one is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_overhead: Option<u32>,
    /// Device's queue-priority handling ignores traffic classes
    #[serde(default)]
    pub broken_mqprio: bool,
}

impl DeviceProfile {
    pub fn with_frame_overhead(mut self, overhead: u32) -> Self {
        self.frame_overhead = Some(overhead);
        self
    }

    pub fn with_broken_mqprio(mut self, broken: bool) -> Self {
        self.broken_mqprio = broken;
        self
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            mtu: DEFAULT_MTU,
            max_mtu: DEFAULT_MAX_MTU,
            hard_header_len: ETH_HLEN,
            frame_overhead: None,
            broken_mqprio: false,
        }
    }
}
