/*!
 * Advance Engine
 * Timer-driven walk through the operational schedule and schedule swaps
 */

use super::{budget, CurrentEntry, EngineState, Shaper};
use crate::core::time::{add_ns, Nanos, KTIME_MAX};
use crate::schedule::ScheduleGateList;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, trace};

/// Absolute deadline of the next advance, `KTIME_MAX` when idle
///
/// The deadline is only written under the shaper's `current_entry_lock`.
/// Whoever runs the timer waits on [`AdvanceTimer::rearmed`] to learn about
/// deadlines set from outside the firing path.
#[derive(Debug)]
pub(crate) struct AdvanceTimer {
    expires: AtomicI64,
    rearmed: Notify,
}

impl AdvanceTimer {
    pub(crate) fn new() -> Self {
        Self {
            expires: AtomicI64::new(KTIME_MAX),
            rearmed: Notify::new(),
        }
    }

    #[inline]
    pub(crate) fn expires(&self) -> Nanos {
        self.expires.load(Ordering::Acquire)
    }

    /// Program the deadline from the firing path itself
    pub(crate) fn set(&self, expires: Nanos) {
        self.expires.store(expires, Ordering::Release);
    }

    /// Program the deadline and wake the timer runner
    pub(crate) fn arm(&self, expires: Nanos) {
        self.set(expires);
        self.rearmed.notify_one();
    }

    pub(crate) fn cancel(&self) {
        self.arm(KTIME_MAX);
    }

    /// Arm for a newly installed schedule
    ///
    /// A schedule starting before the pending deadline pulls the timer
    /// forward so the swap happens on time.
    pub(crate) fn start_sched(&self, start: Nanos) {
        self.arm(start.min(self.expires()));
    }

    pub(crate) fn rearmed(&self) -> &Notify {
        &self.rearmed
    }
}

/// The current entry is the last one of its cycle
pub(crate) fn should_restart_cycle(oper: &Arc<ScheduleGateList>, current: &CurrentEntry) -> bool {
    !Arc::ptr_eq(&current.sched, oper)
        || oper.is_last(current.pos)
        || current.entry().end_time() == oper.cycle_end_time()
}

/// The admin schedule must take over at or before `end_time`
///
/// Either its base time falls inside the interval ending at `end_time`, or
/// within the operational schedule's cycle time extension past it.
pub(crate) fn should_change_schedules(
    admin: Option<&ScheduleGateList>,
    oper: &ScheduleGateList,
    end_time: Nanos,
) -> bool {
    let Some(admin) = admin else {
        return false;
    };
    let next_base_time = admin.base_time();
    if next_base_time <= end_time {
        return true;
    }
    next_base_time <= add_ns(end_time, oper.cycle_time_extension())
}

impl Shaper {
    /// Advance to the next entry; returns the next deadline
    ///
    /// Bootstraps the admin schedule when nothing is operational, walks to
    /// the next entry (restarting the cycle when due), arms its close times,
    /// swaps in the admin schedule when its base time is reached, resets
    /// budgets at the current rate and republishes the engine state.
    pub(crate) fn on_timer_fire(&self) -> Nanos {
        let guard = self.current_entry_lock.lock();
        let state = self.state.load();
        let mut oper = state.oper.clone();
        let mut admin = state.admin.clone();

        if oper.is_none() {
            oper = admin.take();
            if oper.is_some() {
                self.stats.record_swap();
                info!("first schedule became operational");
            }
        }
        let Some(mut oper) = oper else {
            self.timer.set(KTIME_MAX);
            return KTIME_MAX;
        };

        let resume = state
            .current
            .as_ref()
            .filter(|current| current.entry().end_time() != oper.base_time());

        let (next, end_time) = match resume {
            None => {
                let next = CurrentEntry {
                    sched: oper.clone(),
                    pos: 0,
                };
                let end_time = next.entry().end_time();
                (next, end_time)
            }
            Some(current) => {
                let entry = current.entry();
                let pos = if should_restart_cycle(&oper, current) {
                    oper.set_cycle_end_time(add_ns(oper.cycle_end_time(), oper.cycle_time()));
                    0
                } else {
                    current.pos + 1
                };
                let next = CurrentEntry {
                    sched: oper.clone(),
                    pos,
                };
                let next_entry = next.entry();

                let mut end_time = add_ns(entry.end_time(), next_entry.interval() as i64)
                    .min(oper.cycle_end_time());
                next_entry.arm_close_times(entry.end_time(), oper.cycle_time(), oper.num_tc());

                if should_change_schedules(admin.as_deref(), &oper, end_time) {
                    if let Some(incoming) = admin.take() {
                        end_time = incoming.base_time();
                        oper = incoming;
                        self.stats.record_swap();
                        info!(base_time = end_time, "admin schedule takes over");
                    }
                }

                next_entry.set_end_time(end_time);
                budget::set_budgets(&oper, next_entry, &self.rate);
                (next, end_time)
            }
        };

        trace!(
            entry = next.entry().index(),
            gate_mask = next.entry().gate_mask(),
            end_time = end_time,
            "advanced"
        );

        self.state.publish(EngineState {
            oper: Some(oper),
            admin,
            current: Some(next),
        });
        self.timer.set(end_time);
        self.stats.record_advance();
        drop(guard);

        self.tx_ready.notify_one();
        end_time
    }

    /// Run every firing whose deadline has passed, up to `limit`
    ///
    /// The actor calls this on each wakeup; simulations driving a
    /// [`ManualClock`](crate::core::clock::ManualClock) can call it directly.
    pub fn fire_due(&self, limit: usize) -> usize {
        let mut fired = 0;
        while fired < limit {
            let expires = self.timer.expires();
            if expires == KTIME_MAX || self.now() < expires {
                break;
            }
            self.on_timer_fire();
            fired += 1;
        }
        fired
    }

    pub(crate) fn timer(&self) -> &AdvanceTimer {
        &self.timer
    }
}
