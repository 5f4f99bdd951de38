/*!
 * Txtime Pacing
 * Predicts each packet's departure time against the gate schedule
 */

use super::locator::{find_entry_to_transmit, LocateMode};
use super::{EngineState, Shaper};
use crate::core::limits::MAX_PACING_ITERATIONS;
use crate::core::time::{add_ns, Nanos};
use crate::packet::Packet;
use crate::schedule::ScheduleGateList;
use std::sync::Arc;
use tracing::{debug, info};

const IPV6_HEADER_LEN: usize = 40;
const IPPROTO_TCP: u8 = 6;
const IPPROTO_IPV6: u8 = 41;

/// Sender timestamp of a TCP segment, in the monotonic domain
///
/// Recognizes TCP over IPv4, IPv6, and IPv6 tunnelled in IPv4, which yield
/// `None` when not carrying TCP. Other IP versions keep the timestamp. A
/// packet too short to parse yields `None`.
pub(crate) fn tcp_sender_tstamp(packet: &Packet) -> Option<Nanos> {
    let tstamp = packet.sender_tstamp?;
    let offset = packet.network_offset?;
    let data = packet.payload();

    let header = header_at(data, offset)?;
    let is_tcp = match header[0] >> 4 {
        4 => {
            let ihl = (header[0] & 0x0f) as usize * 4;
            match header[9] {
                IPPROTO_TCP => true,
                IPPROTO_IPV6 => offset
                    .checked_add(ihl)
                    .and_then(|inner| header_at(data, inner))
                    .map(|v6| v6[6] == IPPROTO_TCP)
                    .unwrap_or(false),
                _ => false,
            }
        }
        6 => header[6] == IPPROTO_TCP,
        _ => true,
    };
    is_tcp.then_some(tstamp)
}

fn header_at(data: &[u8], offset: usize) -> Option<&[u8]> {
    data.get(offset..offset.checked_add(IPV6_HEADER_LEN)?)
}

impl Shaper {
    /// Departure time for `packet` on class `tc`, `None` if it can never go
    ///
    /// Starts from now plus the configured delay (or the TCP sender
    /// timestamp, if later) and walks forward until a whole transmission
    /// fits inside one open interval, moving to the admin schedule when
    /// the candidate time passes its base time. Each accepted packet moves
    /// its entry's pacing cursor past itself.
    pub(crate) fn packet_txtime(&self, packet: &Packet, tc: usize) -> Option<Nanos> {
        let _pacing = self.pacing_lock.lock();

        let now = self.now();
        let delay = self.settings.read().txtime_delay;
        let mut minimum_time = add_ns(now, delay as i64);
        if let Some(tstamp) = tcp_sender_tstamp(packet) {
            minimum_time = minimum_time.max(self.clock.mono_to_domain(tstamp));
        }

        let state = self.state.load();
        let mut admin = state.admin.clone();
        let mut sched = state.oper.clone();
        if let Some(incoming) = admin.clone() {
            if minimum_time > incoming.base_time() {
                self.promote_admin(&incoming);
                sched = Some(incoming);
                admin = None;
            }
        }

        // Until the schedule starts every gate is open
        let Some(mut sched) = sched else {
            return Some(minimum_time);
        };
        if minimum_time < sched.base_time() {
            return Some(minimum_time);
        }

        let transmit_time = self.rate.length_to_duration(packet.len());

        for _ in 0..MAX_PACING_ITERATIONS {
            let found = find_entry_to_transmit(
                &sched,
                admin.as_deref(),
                minimum_time,
                tc,
                transmit_time,
                LocateMode::Pace,
            )?;

            let txtime = found.entry.next_txtime().max(minimum_time).max(found.start);

            if let Some(next) = admin.as_ref() {
                if !Arc::ptr_eq(next, &sched) && txtime > next.base_time() {
                    sched = next.clone();
                    continue;
                }
            }

            let transmit_end = add_ns(txtime, transmit_time);
            minimum_time = transmit_end;

            if transmit_end > found.end {
                found.entry.set_next_txtime(add_ns(found.start, sched.cycle_time()));
                continue;
            }

            found.entry.set_next_txtime(transmit_end);
            return Some(txtime);
        }

        debug!(tc = tc, len = packet.len(), "pacing gave up after bounded search");
        None
    }

    /// Make a staged schedule operational from the enqueue path
    fn promote_admin(&self, incoming: &Arc<ScheduleGateList>) {
        let _guard = self.current_entry_lock.lock();
        let state = self.state.load();
        let still_staged = state
            .admin
            .as_ref()
            .map(|admin| Arc::ptr_eq(admin, incoming))
            .unwrap_or(false);
        if !still_staged {
            return;
        }
        self.state.publish(EngineState {
            oper: Some(incoming.clone()),
            admin: None,
            current: None,
        });
        self.stats.record_swap();
        info!(base_time = incoming.base_time(), "admin schedule takes over");
    }
}
