//! IEEE 802.15.4 CSMA-CA channel access.
//!
//! [`CsmaCa`] decides when the MAC may transmit. It is driven entirely from
//! the outside: [`CsmaCa::start`] begins an attempt, [`CsmaCa::fire`] delivers
//! expired timers and [`CsmaCa::plme_cca_confirm`] delivers CCA results. Each
//! attempt ends with exactly one [`Verdict`], handed to
//! [`MacLayer::on_verdict`].

pub mod backoff;
pub mod config;
pub mod driver;
pub mod timer;
pub mod transaction;
pub mod user_configurable_constants;

#[cfg(test)]
mod tests;

pub use config::{CsmaConfig, CsmaMode};
pub use timer::{Scheduler, Timer, TimerKind};
pub use transaction::TransactionCost;

use rand_core::RngCore;

use crate::mac::constants::CONTENTION_WINDOW;
use crate::mac::superframe::{time_left_in_cap, time_to_next_boundary};
use crate::mac::{MacLayer, SuperframeDirection};
use crate::phy::{CcaStatus, PhyLayer, SymbolRate};
use crate::time::Duration;
use crate::Error;

use timer::PendingTimers;

/// Outcome of a channel access attempt.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The channel is clear, transmit now.
    ChannelIdle,
    /// The channel stayed busy for more than `macMaxCSMABackoffs` backoffs.
    ChannelAccessFailure,
    /// The CAP ended first. Start again once the next CAP begins.
    Deferred,
}

impl core::fmt::Display for Verdict {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Verdict::ChannelIdle => write!(f, "channel idle"),
            Verdict::ChannelAccessFailure => write!(f, "channel access failure"),
            Verdict::Deferred => write!(f, "deferred"),
        }
    }
}

/// The collaborators an operation needs.
pub struct Context<'a, M, P, S> {
    pub mac: &'a mut M,
    pub phy: &'a mut P,
    pub scheduler: &'a mut S,
}

impl<'a, M, P, S> Context<'a, M, P, S>
where
    M: MacLayer,
    P: PhyLayer,
    S: Scheduler,
{
    pub fn new(mac: &'a mut M, phy: &'a mut P, scheduler: &'a mut S) -> Self {
        Self {
            mac,
            phy,
            scheduler,
        }
    }
}

/// Progress of the current (or last) attempt.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunState {
    /// BE
    backoff_exponent: u8,
    /// NB
    backoffs: u8,
    /// CW, only used in slotted mode
    contention_window: u8,
    random_backoff_periods_left: u32,
    direction: SuperframeDirection,
}

/// Permission to deliver the verdict of one attempt. Consumed on delivery.
#[derive(Debug)]
struct VerdictSlot(());

impl VerdictSlot {
    fn deliver<M: MacLayer>(self, mac: &mut M, verdict: Verdict) {
        mac.on_verdict(verdict);
    }
}

/// CSMA-CA engine of a single MAC.
pub struct CsmaCa<Rng> {
    config: CsmaConfig,
    rng: Rng,
    state: RunState,
    timers: PendingTimers,
    cca_outstanding: bool,
    /// Backoff periods left over by a CAP-end deferral, resumed by the next
    /// attempt.
    carried_periods: u32,
    verdict: Option<VerdictSlot>,
}

impl<Rng: RngCore> CsmaCa<Rng> {
    pub fn new(config: CsmaConfig, rng: Rng) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            state: RunState {
                backoff_exponent: config.min_be,
                backoffs: 0,
                contention_window: CONTENTION_WINDOW,
                random_backoff_periods_left: 0,
                direction: SuperframeDirection::Outgoing,
            },
            config,
            rng,
            timers: PendingTimers::default(),
            cca_outstanding: false,
            carried_periods: 0,
            verdict: None,
        })
    }

    pub fn config(&self) -> &CsmaConfig {
        &self.config
    }

    /// Replace the policy. Refused while an attempt is in progress.
    pub fn set_config(&mut self, config: CsmaConfig) -> Result<(), Error> {
        if self.is_running() {
            return Err(Error::ProcedureActive);
        }
        config.validate()?;
        self.config = config;
        self.carried_periods = 0;
        Ok(())
    }

    pub fn set_mode(&mut self, mode: CsmaMode) -> Result<(), Error> {
        self.set_config(CsmaConfig {
            mode,
            ..self.config
        })
    }

    /// BE of the current or last attempt.
    pub fn backoff_exponent(&self) -> u8 {
        self.state.backoff_exponent
    }

    /// NB of the current or last attempt.
    pub fn backoffs(&self) -> u8 {
        self.state.backoffs
    }

    /// CW of the current or last attempt, zero in unslotted mode.
    pub fn contention_window(&self) -> u8 {
        self.state.contention_window
    }

    pub fn random_backoff_periods_left(&self) -> u32 {
        self.state.random_backoff_periods_left
    }

    /// Whether an attempt awaits its verdict.
    pub fn is_running(&self) -> bool {
        self.verdict.is_some()
    }

    pub fn is_cca_outstanding(&self) -> bool {
        self.cca_outstanding
    }

    /// Begin a fresh channel access attempt for the frame the MAC has queued.
    ///
    /// An attempt that is still running is abandoned without a verdict.
    pub fn start<M, P, S>(&mut self, ctx: &mut Context<'_, M, P, S>) -> Result<(), Error>
    where
        M: MacLayer,
        P: PhyLayer,
        S: Scheduler,
    {
        let rate = SymbolRate::new(ctx.phy.symbol_rate())?;

        if self.is_running() {
            warn!("CSMA-CA restarted before the previous attempt finished");
        }
        let carried_periods = self.carried_periods;
        self.cancel();

        let direction =
            SuperframeDirection::for_destination(ctx.mac.pending_frame().destination_is_coordinator);
        let slotted = self.config.is_slotted();

        self.state = RunState {
            backoff_exponent: self.config.initial_backoff_exponent(),
            backoffs: 0,
            contention_window: if slotted { CONTENTION_WINDOW } else { 0 },
            random_backoff_periods_left: if slotted { carried_periods } else { 0 },
            direction,
        };
        self.verdict = Some(VerdictSlot(()));

        if slotted {
            let superframe = ctx.mac.superframe(direction);
            let boundary = time_to_next_boundary(
                ctx.scheduler.now(),
                &superframe,
                self.config.unit_backoff_period,
                rate,
            );
            debug!(
                "Slotted CSMA-CA started, next backoff boundary in {} us",
                boundary.as_us()
            );
            self.schedule(ctx.scheduler, TimerKind::BackoffStart, boundary);
        } else {
            debug!("Unslotted CSMA-CA started");
            self.schedule(ctx.scheduler, TimerKind::BackoffStart, Duration::ZERO);
        }

        Ok(())
    }

    /// Abandon the current attempt. Pending timers and an outstanding CCA are
    /// ignored when they come back, and no verdict is delivered.
    pub fn cancel(&mut self) {
        self.timers.disarm_all();
        self.cca_outstanding = false;
        self.carried_periods = 0;
        self.verdict = None;
    }

    /// Run the action behind an expired `timer`. Timers of cancelled or
    /// finished attempts are ignored.
    pub fn fire<M, P, S>(&mut self, timer: Timer, ctx: &mut Context<'_, M, P, S>) -> Result<(), Error>
    where
        M: MacLayer,
        P: PhyLayer,
        S: Scheduler,
    {
        if !self.timers.take(timer) {
            trace!("Ignoring stale {:?} timer", timer.kind());
            return Ok(());
        }

        match timer.kind() {
            TimerKind::BackoffStart => self.random_backoff_delay(ctx),
            TimerKind::CanProceed => self.can_proceed(ctx),
            TimerKind::CcaRequest => {
                self.request_cca(ctx.phy);
                Ok(())
            }
            TimerKind::CapEnd => {
                debug!("CAP ended, deferring to the next superframe");
                self.conclude(Verdict::Deferred, ctx.mac);
                Ok(())
            }
        }
    }

    /// Result of the CCA requested through [`PhyLayer::request_cca`].
    pub fn plme_cca_confirm<M, P, S>(&mut self, status: CcaStatus, ctx: &mut Context<'_, M, P, S>)
    where
        M: MacLayer,
        P: PhyLayer,
        S: Scheduler,
    {
        if !self.cca_outstanding {
            trace!("Ignoring CCA confirm without a pending request");
            return;
        }
        self.cca_outstanding = false;

        let slotted = self.config.is_slotted();

        if status.is_idle() {
            if slotted {
                self.state.contention_window = self.state.contention_window.saturating_sub(1);
                if self.state.contention_window > 0 {
                    trace!("Channel idle, CW = {}", self.state.contention_window);
                    self.schedule(ctx.scheduler, TimerKind::CcaRequest, Duration::ZERO);
                    return;
                }
            }
            debug!("Channel idle after {} backoffs", self.state.backoffs);
            self.conclude(Verdict::ChannelIdle, ctx.mac);
            return;
        }

        if slotted {
            self.state.contention_window = CONTENTION_WINDOW;
        }
        self.state.backoff_exponent = (self.state.backoff_exponent + 1).min(self.config.max_be);
        self.state.backoffs += 1;

        if self.state.backoffs > self.config.max_backoffs {
            debug!("Channel access failure after {} backoffs", self.state.backoffs);
            self.conclude(Verdict::ChannelAccessFailure, ctx.mac);
        } else {
            debug!(
                "Channel busy, backing off again (NB = {}, BE = {})",
                self.state.backoffs, self.state.backoff_exponent
            );
            self.schedule(ctx.scheduler, TimerKind::BackoffStart, Duration::ZERO);
        }
    }

    fn random_backoff_delay<M, P, S>(&mut self, ctx: &mut Context<'_, M, P, S>) -> Result<(), Error>
    where
        M: MacLayer,
        P: PhyLayer,
        S: Scheduler,
    {
        let rate = SymbolRate::new(ctx.phy.symbol_rate())?;
        let slotted = self.config.is_slotted();

        // A slotted backoff cut short by the end of the CAP resumes where it
        // stopped.
        if self.state.random_backoff_periods_left == 0 || !slotted {
            self.state.random_backoff_periods_left = self.draw_backoff(ctx.mac);
        }

        let periods = self.state.random_backoff_periods_left;
        let unit = self.config.unit_backoff_period;
        let backoff = rate.symbols_to_duration(periods as u64 * unit as u64);

        if !slotted {
            debug!(
                "Requesting CCA after a backoff of {} periods ({} us)",
                periods,
                backoff.as_us()
            );
            self.schedule(ctx.scheduler, TimerKind::CcaRequest, backoff);
            return Ok(());
        }

        let superframe = ctx.mac.superframe(self.state.direction);
        let time_left = time_left_in_cap(ctx.scheduler.now(), &superframe, rate);

        if backoff > time_left {
            let used = rate.duration_to_symbols(time_left) / unit as u64;
            self.state.random_backoff_periods_left = periods.saturating_sub(used as u32);
            debug!(
                "Backoff of {} periods does not fit the CAP, {} periods carried over",
                periods, self.state.random_backoff_periods_left
            );
            self.schedule(ctx.scheduler, TimerKind::CapEnd, time_left);
        } else {
            trace!("Proceeding after a backoff of {} periods", periods);
            self.schedule(ctx.scheduler, TimerKind::CanProceed, backoff);
        }

        Ok(())
    }

    fn can_proceed<M, P, S>(&mut self, ctx: &mut Context<'_, M, P, S>) -> Result<(), Error>
    where
        M: MacLayer,
        P: PhyLayer,
        S: Scheduler,
    {
        let rate = SymbolRate::new(ctx.phy.symbol_rate())?;
        let superframe = ctx.mac.superframe(self.state.direction);
        let time_left = time_left_in_cap(ctx.scheduler.now(), &superframe, rate);

        self.state.random_backoff_periods_left = 0;

        let cost = TransactionCost::estimate(
            self.state.contention_window,
            &ctx.mac.pending_frame(),
            ctx.mac.ack_wait_duration(),
            ctx.phy.turnaround_time(),
        );
        let symbols = cost.total();
        ctx.mac.on_transaction_cost(symbols);

        if rate.symbols_to_duration(symbols as u64) > time_left {
            debug!(
                "Transaction of {} symbols does not fit the {} us left in the CAP",
                symbols,
                time_left.as_us()
            );
            self.schedule(ctx.scheduler, TimerKind::CapEnd, time_left);
        } else {
            self.schedule(ctx.scheduler, TimerKind::CcaRequest, Duration::ZERO);
        }

        Ok(())
    }

    fn request_cca<P: PhyLayer>(&mut self, phy: &mut P) {
        trace!("Requesting CCA");
        self.cca_outstanding = true;
        phy.request_cca();
    }

    fn draw_backoff<M: MacLayer>(&mut self, mac: &mut M) -> u32 {
        let be = self.state.backoff_exponent;
        match mac.suggest_backoff(be, self.state.backoffs) {
            Some(periods) => periods.min(backoff::max_backoff_periods(be)),
            None => backoff::draw(&mut self.rng, be),
        }
    }

    fn schedule<S: Scheduler>(&mut self, scheduler: &mut S, kind: TimerKind, delay: Duration) {
        let timer = self.timers.arm(kind);
        scheduler.schedule(delay.clamp_non_negative(), timer);
    }

    fn conclude<M: MacLayer>(&mut self, verdict: Verdict, mac: &mut M) {
        let Some(slot) = self.verdict.take() else {
            return;
        };

        self.timers.disarm_all();
        self.cca_outstanding = false;
        self.carried_periods = match verdict {
            Verdict::Deferred => self.state.random_backoff_periods_left,
            _ => 0,
        };

        info!("CSMA-CA verdict: {}", verdict);
        slot.deliver(mac, verdict);
    }
}
