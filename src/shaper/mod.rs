/*!
 * Time-Aware Shaper
 * Gate-scheduled transmit selection over a set of per-class queues
 *
 * The engine keeps at most two schedules (operational and admin) plus a
 * pointer to the current entry, published together as one RCU snapshot.
 * Only the advance path and configuration changes write that snapshot, and
 * both do so under `current_entry_lock`; enqueue and dequeue read it
 * lock-free. A replaced schedule stays alive while any reader still holds a
 * snapshot that references it.
 */

mod admission;
mod advance;
pub mod budget;
mod dequeue;
mod dump;
pub mod locator;
mod pacing;
pub mod rate;
mod task;

pub use admission::EnqueueOutcome;
pub use dequeue::DequeuePolicy;
pub use dump::ShaperDump;
pub use locator::{find_entry_to_transmit, interval_end_time, is_valid_interval, LocateMode, Located};
pub use rate::LinkRate;
pub use task::{ShaperCommand, ShaperTask};

use crate::core::clock::{Clock, ClockAdapter, ClockDomain, SystemClock};
use crate::core::errors::{ConfigError, ShaperError};
use crate::core::limits::{DEFAULT_QUEUE_LIMIT, TC_MAX_QUEUE};
use crate::core::rcu::RcuCell;
use crate::core::time::{Nanos, KTIME_MAX};
use crate::device::DeviceProfile;
use crate::monitoring::{span_install, AtomicShaperStats};
use crate::packet::Packet;
use crate::queue::{FifoQueue, QueueLayout, TxQueue};
use crate::schedule::{ScheduleEntry, ScheduleGateList, ShaperConfig, ShaperFlags, ShaperMode};
use advance::AdvanceTimer;
use dequeue::TxqCursors;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};

/// The entry the advance engine last made current
///
/// Holds its own reference to the owning schedule, which may already have
/// been replaced as operational.
#[derive(Debug, Clone)]
pub(crate) struct CurrentEntry {
    pub(crate) sched: Arc<ScheduleGateList>,
    pub(crate) pos: usize,
}

impl CurrentEntry {
    #[inline(always)]
    pub(crate) fn entry(&self) -> &ScheduleEntry {
        self.sched.entry(self.pos)
    }
}

/// Schedule pointers published as one unit
#[derive(Debug, Clone, Default)]
pub(crate) struct EngineState {
    pub(crate) oper: Option<Arc<ScheduleGateList>>,
    pub(crate) admin: Option<Arc<ScheduleGateList>>,
    pub(crate) current: Option<CurrentEntry>,
}

/// Settings fixed by the first accepted configuration
#[derive(Debug, Clone)]
pub(crate) struct ShaperSettings {
    pub(crate) flags: Option<ShaperFlags>,
    pub(crate) txtime_delay: u32,
    pub(crate) max_sdu: [u32; TC_MAX_QUEUE],
}

impl Default for ShaperSettings {
    fn default() -> Self {
        Self {
            flags: None,
            txtime_delay: 0,
            max_sdu: [0; TC_MAX_QUEUE],
        }
    }
}

/// Time-aware shaper over a fixed set of transmit queues
pub struct Shaper {
    clock: ClockAdapter,
    rate: LinkRate,
    layout: QueueLayout,
    device: DeviceProfile,
    policy: DequeuePolicy,
    queues: Vec<Box<dyn TxQueue>>,
    state: RcuCell<EngineState>,
    current_entry_lock: Mutex<()>,
    settings: RwLock<ShaperSettings>,
    timer: AdvanceTimer,
    tx_ready: Notify,
    cursors: Mutex<TxqCursors>,
    pacing_lock: Mutex<()>,
    stats: AtomicShaperStats,
}

impl Shaper {
    pub fn builder() -> ShaperBuilder {
        ShaperBuilder::new()
    }

    /// Install a schedule
    ///
    /// All validation happens before any state changes. With no schedule
    /// running the new one becomes operational at its start time; otherwise
    /// it is staged as admin (replacing any staged one) and takes over at
    /// its base time.
    pub fn change(&self, config: ShaperConfig) -> Result<(), ConfigError> {
        let mut settings = self.settings.write();

        config.flags.validate()?;
        if let Some(old) = settings.flags {
            if old != config.flags {
                return Err(ConfigError::FlagsChanged);
            }
        }
        if config.flags.mode() == ShaperMode::FullOffload {
            return Err(ConfigError::OffloadUnsupported);
        }
        self.layout.validate(config.flags.txtime_assist)?;

        let domain = match (self.clock.domain(), config.clock) {
            (Some(from), Some(to)) if from != to => {
                return Err(ConfigError::ClockChanged { from, to });
            }
            (_, Some(domain)) | (Some(domain), None) => domain,
            (None, None) => return Err(ConfigError::MissingClock),
        };
        if config.txtime_delay.is_some() && !config.flags.txtime_assist {
            return Err(ConfigError::TxtimeDelayWithoutAssist);
        }

        let new_admin = Arc::new(ScheduleGateList::parse(&config, self.layout.num_tc(), &self.rate)?);
        let max_sdu = config.max_sdu_table();
        new_admin.update_max_sdu(&max_sdu, &self.rate, &self.device);

        let now = self.clock.now_in(domain);
        let start = new_admin.start_time(now);

        let _span = span_install(config.flags.mode_str(), new_admin.len()).entered();

        settings.flags = Some(config.flags);
        settings.max_sdu = max_sdu;
        if let Some(delay) = config.txtime_delay {
            settings.txtime_delay = delay;
        }
        self.clock.set_domain(domain);

        let _guard = self.current_entry_lock.lock();
        let state = self.state.load();

        if config.flags.txtime_assist {
            new_admin.setup_txtime(start);
            let next = match state.oper {
                None => EngineState {
                    oper: Some(new_admin),
                    admin: None,
                    current: None,
                },
                Some(ref oper) => EngineState {
                    oper: Some(oper.clone()),
                    admin: Some(new_admin),
                    current: None,
                },
            };
            self.state.publish(next);
        } else {
            new_admin.setup_first_end_time(start, &self.rate);
            self.timer.start_sched(start);
            let current = if state.oper.is_some() {
                state.current.clone()
            } else {
                None
            };
            self.state.publish(EngineState {
                oper: state.oper.clone(),
                admin: Some(new_admin),
                current,
            });
        }

        info!(
            mode = config.flags.mode_str(),
            start = start,
            now = now,
            staged = state.oper.is_some(),
            "schedule installed"
        );
        Ok(())
    }

    /// Per-queue peek is not offered; the shaper owns top-level selection
    pub fn peek(&self) -> Result<Option<Packet>, ShaperError> {
        Err(ShaperError::Unsupported("peek".into()))
    }

    /// Apply a new link speed in Mbit/s
    ///
    /// Frame limits are recomputed right away; budgets pick the new rate up
    /// the next time an entry becomes current.
    pub fn set_link_speed(&self, speed_mbps: Option<u32>) -> u32 {
        let applied = self.rate.set_speed(speed_mbps);
        let max_sdu = self.settings.read().max_sdu;
        let state = self.state.load();
        for sched in state.oper.iter().chain(state.admin.iter()) {
            sched.update_max_sdu(&max_sdu, &self.rate, &self.device);
        }
        info!(speed_mbps = applied, "link speed changed");
        applied
    }

    /// Stop the advance timer and flush every queue
    pub fn reset(&self) {
        {
            let _guard = self.current_entry_lock.lock();
            self.timer.cancel();
        }
        for queue in &self.queues {
            queue.reset();
        }
        self.stats.clear_backlog();
        info!("shaper reset");
    }

    /// Signalled whenever the current entry changes
    pub fn tx_ready(&self) -> &Notify {
        &self.tx_ready
    }

    /// Current time in the configured clock domain
    #[inline]
    pub fn now(&self) -> Nanos {
        self.clock.now()
    }

    /// Next advance deadline, `None` when the timer is idle
    pub fn next_expiry(&self) -> Option<Nanos> {
        match self.timer.expires() {
            KTIME_MAX => None,
            expires => Some(expires),
        }
    }

    pub fn mode(&self) -> Option<ShaperMode> {
        self.settings.read().flags.map(|flags| flags.mode())
    }

    pub fn clock_domain(&self) -> Option<ClockDomain> {
        self.clock.domain()
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    pub fn rate(&self) -> &LinkRate {
        &self.rate
    }

    pub fn policy(&self) -> DequeuePolicy {
        self.policy
    }

    pub fn stats(&self) -> &AtomicShaperStats {
        &self.stats
    }

    /// Total packets waiting across all queues
    pub fn backlog(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Index of the current entry, if the schedule has started
    pub fn current_entry_index(&self) -> Option<u32> {
        self.state.load().current.as_ref().map(|c| c.entry().index())
    }

    #[inline]
    pub(crate) fn is_txtime_assist(&self) -> bool {
        self.settings
            .read()
            .flags
            .map(|flags| flags.txtime_assist)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Shaper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shaper")
            .field("clock", &self.clock)
            .field("policy", &self.policy)
            .field("num_txq", &self.queues.len())
            .field("picos_per_byte", &self.rate.picos_per_byte())
            .finish()
    }
}

impl Drop for Shaper {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

/// Builder for [`Shaper`]
pub struct ShaperBuilder {
    clock: Option<Arc<dyn Clock>>,
    layout: QueueLayout,
    device: DeviceProfile,
    link_speed: Option<u32>,
    queue_limit: usize,
    queues: Option<Vec<Box<dyn TxQueue>>>,
}

impl ShaperBuilder {
    pub fn new() -> Self {
        Self {
            clock: None,
            layout: QueueLayout::default(),
            device: DeviceProfile::default(),
            link_speed: None,
            queue_limit: DEFAULT_QUEUE_LIMIT,
            queues: None,
        }
    }

    /// Time source (defaults to the system clock)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_layout(mut self, layout: QueueLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_device(mut self, device: DeviceProfile) -> Self {
        self.device = device;
        self
    }

    /// Initial link speed in Mbit/s; unknown speeds fall back to 10 Mbit/s
    pub fn with_link_speed(mut self, speed_mbps: u32) -> Self {
        self.link_speed = Some(speed_mbps);
        self
    }

    /// Packet limit for the built-in FIFOs
    pub fn with_queue_limit(mut self, limit: usize) -> Self {
        self.queue_limit = limit;
        self
    }

    /// Caller-provided queues, one per transmit queue of the layout
    pub fn with_queues(mut self, queues: Vec<Box<dyn TxQueue>>) -> Self {
        self.queues = Some(queues);
        self
    }

    pub fn build(self) -> Result<Shaper, ConfigError> {
        self.layout.validate(true)?;

        let queues = match self.queues {
            Some(queues) if queues.len() != self.layout.num_txq => {
                return Err(ConfigError::InvalidLayout(format!(
                    "{} queues given for {} transmit queues",
                    queues.len(),
                    self.layout.num_txq
                )));
            }
            Some(queues) => queues,
            None => (0..self.layout.num_txq)
                .map(|_| Box::new(FifoQueue::new(self.queue_limit)) as Box<dyn TxQueue>)
                .collect(),
        };

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let policy = DequeuePolicy::for_device(&self.device);
        if policy == DequeuePolicy::TxqPriority {
            warn!("device ignores traffic classes, falling back to flat queue selection");
        }

        info!(
            num_tc = self.layout.num_tc(),
            num_txq = self.layout.num_txq,
            policy = policy.as_str(),
            "shaper created"
        );

        Ok(Shaper {
            clock: ClockAdapter::new(clock),
            rate: LinkRate::new(self.link_speed),
            layout: self.layout,
            device: self.device,
            policy,
            queues,
            state: RcuCell::default(),
            current_entry_lock: Mutex::new(()),
            settings: RwLock::new(ShaperSettings::default()),
            timer: AdvanceTimer::new(),
            tx_ready: Notify::new(),
            cursors: Mutex::new(TxqCursors::default()),
            pacing_lock: Mutex::new(()),
            stats: AtomicShaperStats::new(),
        })
    }
}

impl Default for ShaperBuilder {
    fn default() -> Self {
        Self::new()
    }
}
