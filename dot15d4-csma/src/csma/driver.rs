//! Running a channel access attempt as a future.
//!
//! [`access_channel`] owns the timers of one attempt and sleeps on an
//! [`embedded_hal_async::delay::DelayNs`] between them, so a radio driver only
//! has to provide an async CCA.

use embedded_hal_async::delay::DelayNs;
use heapless::Vec;
use rand_core::RngCore;

use super::{Context, CsmaCa, Scheduler, Timer, Verdict};
use crate::mac::{MacLayer, PendingFrame, Superframe, SuperframeDirection};
use crate::phy::{CcaStatus, PhyLayer, TURNAROUND_TIME};
use crate::time::{Duration, Instant};
use crate::Error;

/// A radio able to perform a clear channel assessment.
pub trait CcaRadio {
    fn symbol_rate(&self) -> u32;

    fn turnaround_time(&self) -> u32 {
        TURNAROUND_TIME
    }

    async fn clear_channel_assessment(&mut self) -> CcaStatus;
}

pub trait Clock {
    fn now(&self) -> Instant;
}

/// Timers of the running attempt, at most one per kind plus stale ones.
struct Agenda {
    now: Instant,
    seq: u32,
    timers: Vec<(Instant, u32, Timer), 8>,
}

impl Agenda {
    fn new(now: Instant) -> Self {
        Self {
            now,
            seq: 0,
            timers: Vec::new(),
        }
    }

    /// Remove the earliest timer, ties broken by scheduling order.
    fn pop_next(&mut self) -> Option<(Instant, Timer)> {
        let index = self
            .timers
            .iter()
            .enumerate()
            .min_by_key(|(_, (due, seq, _))| (*due, *seq))
            .map(|(index, _)| index)?;
        let (due, _, timer) = self.timers.swap_remove(index);
        Some((due, timer))
    }
}

impl Scheduler for Agenda {
    fn now(&self) -> Instant {
        self.now
    }

    fn schedule(&mut self, delay: Duration, timer: Timer) {
        let entry = (self.now + delay, self.seq, timer);
        self.seq = self.seq.wrapping_add(1);
        if self.timers.push(entry).is_err() {
            error!("Too many pending CSMA-CA timers, dropping {:?}", timer.kind());
        }
    }
}

/// Radio parameters seen by the engine. CCA requests are only noted here and
/// carried out by the driver loop.
struct RadioFacts {
    symbol_rate: u32,
    turnaround_time: u32,
    cca_requested: bool,
}

impl PhyLayer for RadioFacts {
    fn symbol_rate(&self) -> u32 {
        self.symbol_rate
    }

    fn turnaround_time(&self) -> u32 {
        self.turnaround_time
    }

    fn request_cca(&mut self) {
        self.cca_requested = true;
    }
}

/// Forwards to the MAC and keeps a copy of the verdict.
struct VerdictCapture<'m, M> {
    mac: &'m mut M,
    verdict: Option<Verdict>,
}

impl<M: MacLayer> MacLayer for VerdictCapture<'_, M> {
    fn pending_frame(&self) -> PendingFrame {
        self.mac.pending_frame()
    }

    fn superframe(&self, direction: SuperframeDirection) -> Superframe {
        self.mac.superframe(direction)
    }

    fn ack_wait_duration(&self) -> u32 {
        self.mac.ack_wait_duration()
    }

    fn on_verdict(&mut self, verdict: Verdict) {
        self.verdict = Some(verdict);
        self.mac.on_verdict(verdict);
    }

    fn on_transaction_cost(&mut self, symbols: u32) {
        self.mac.on_transaction_cost(symbols);
    }

    fn suggest_backoff(&mut self, backoff_exponent: u8, backoffs: u8) -> Option<u32> {
        self.mac.suggest_backoff(backoff_exponent, backoffs)
    }
}

/// Run one channel access attempt to its verdict.
///
/// The verdict is also delivered to `mac`. If the future is dropped before
/// it completes, call [`CsmaCa::cancel`] before the next attempt.
pub async fn access_channel<Rng, M, R, D, C>(
    engine: &mut CsmaCa<Rng>,
    mac: &mut M,
    radio: &mut R,
    delay: &mut D,
    clock: &C,
) -> Result<Verdict, Error>
where
    Rng: RngCore,
    M: MacLayer,
    R: CcaRadio,
    D: DelayNs,
    C: Clock,
{
    let mut agenda = Agenda::new(clock.now());
    let mut phy = RadioFacts {
        symbol_rate: radio.symbol_rate(),
        turnaround_time: radio.turnaround_time(),
        cca_requested: false,
    };
    let mut mac = VerdictCapture { mac, verdict: None };

    engine.start(&mut Context::new(&mut mac, &mut phy, &mut agenda))?;

    loop {
        if let Some(verdict) = mac.verdict.take() {
            return Ok(verdict);
        }

        if core::mem::take(&mut phy.cca_requested) {
            let status = radio.clear_channel_assessment().await;
            trace!("CCA result: {:?}", status);
            agenda.now = clock.now();
            engine.plme_cca_confirm(status, &mut Context::new(&mut mac, &mut phy, &mut agenda));
            continue;
        }

        let Some((due, timer)) = agenda.pop_next() else {
            error!("CSMA-CA has nothing left to wait for");
            engine.cancel();
            return Err(Error::Stalled);
        };

        let wait = (due - clock.now()).clamp_non_negative();
        if !wait.is_zero() {
            delay.delay_us(wait.as_us().min(u32::MAX as i64) as u32).await;
        }

        // The radio may have been retuned while sleeping
        agenda.now = clock.now();
        phy.symbol_rate = radio.symbol_rate();
        phy.turnaround_time = radio.turnaround_time();
        if let Err(err) = engine.fire(timer, &mut Context::new(&mut mac, &mut phy, &mut agenda)) {
            error!("CSMA-CA attempt aborted: {:?}", err);
            engine.cancel();
            return Err(err);
        }
    }
}
