/*!
 * State Dump
 * Serializable snapshot of the shaper for observability
 */

use super::{DequeuePolicy, Shaper};
use crate::core::clock::ClockDomain;
use crate::core::time::Nanos;
use crate::monitoring::ShaperStats;
use crate::queue::QueueLayout;
use crate::schedule::{GateListSnapshot, ShaperMode};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ShaperDump {
    pub mode: Option<ShaperMode>,
    pub clock: Option<ClockDomain>,
    pub picos_per_byte: i64,
    pub txtime_delay: u32,
    pub policy: DequeuePolicy,
    pub layout: QueueLayout,
    pub current_entry: Option<u32>,
    pub next_expiry: Option<Nanos>,
    pub oper: Option<GateListSnapshot>,
    pub admin: Option<GateListSnapshot>,
    pub backlog: usize,
    pub stats: ShaperStats,
}

impl ShaperDump {
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

impl Shaper {
    pub fn dump_state(&self) -> ShaperDump {
        let state = self.state.load();
        let settings = self.settings.read().clone();
        ShaperDump {
            mode: settings.flags.map(|flags| flags.mode()),
            clock: self.clock.domain(),
            picos_per_byte: self.rate.picos_per_byte(),
            txtime_delay: settings.txtime_delay,
            policy: self.policy,
            layout: self.layout.clone(),
            current_entry: state.current.as_ref().map(|c| c.entry().index()),
            next_expiry: self.next_expiry(),
            oper: state.oper.as_ref().map(|s| s.snapshot()),
            admin: state.admin.as_ref().map(|s| s.snapshot()),
            backlog: self.backlog(),
            stats: self.stats.snapshot(),
        }
    }
}
