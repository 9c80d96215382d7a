//! Deterministic discrete-event harness around [`CsmaCa`].
//!
//! Time only advances when the next scheduled event is taken from the queue,
//! so runs are reproducible for a given random source and channel model.

use std::collections::VecDeque;
use std::vec::Vec;

use heapless::binary_heap::{BinaryHeap, Min};
use rand_core::RngCore;

use crate::csma::{Context, CsmaCa, CsmaMode, Scheduler, Timer, Verdict};
use crate::mac::{ack_wait_duration, MacLayer, PendingFrame, Superframe, SuperframeDirection};
use crate::phy::{CcaStatus, PhyLayer, PhyOption, SymbolRate, CCA_TIME};
use crate::time::{Duration, Instant};
use crate::Error;

const QUEUE_CAPACITY: usize = 32;

/// What the simulated PHY reports for each CCA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelModel {
    Idle,
    Busy,
    /// One status per CCA, idle once exhausted.
    Scripted(VecDeque<CcaStatus>),
    /// Busy until the given instant, idle afterwards.
    BusyUntil(Instant),
}

impl ChannelModel {
    /// Parse a script of `i` (idle) and `b` (busy) characters.
    pub fn from_pattern(pattern: &str) -> Result<Self, char> {
        pattern
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match c.to_ascii_lowercase() {
                'i' => Ok(CcaStatus::Idle),
                'b' => Ok(CcaStatus::Busy),
                _ => Err(c),
            })
            .collect::<Result<VecDeque<_>, _>>()
            .map(ChannelModel::Scripted)
    }

    pub fn assess(&mut self, now: Instant) -> CcaStatus {
        match self {
            ChannelModel::Idle => CcaStatus::Idle,
            ChannelModel::Busy => CcaStatus::Busy,
            ChannelModel::Scripted(script) => script.pop_front().unwrap_or(CcaStatus::Idle),
            ChannelModel::BusyUntil(until) if now < *until => CcaStatus::Busy,
            ChannelModel::BusyUntil(_) => CcaStatus::Idle,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceKind {
    Started {
        mode: CsmaMode,
    },
    CcaRequested {
        backoff_exponent: u8,
        backoffs: u8,
        contention_window: u8,
    },
    CcaResult(CcaStatus),
    TransactionCost(u32),
    Verdict(Verdict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceEvent {
    pub at: Instant,
    pub kind: TraceKind,
}

/// A MAC that records everything the engine tells it.
#[derive(Debug, Clone)]
pub struct SimMac {
    pub frame: PendingFrame,
    pub outgoing: Superframe,
    pub incoming: Superframe,
    pub ack_wait: u32,
    /// Returned from [`MacLayer::suggest_backoff`] when set.
    pub backoff_advice: Option<u32>,
    pub verdicts: Vec<Verdict>,
    pub costs: Vec<u32>,
    now: Instant,
    trace: Vec<TraceEvent>,
}

impl SimMac {
    pub fn new(phy: PhyOption, frame: PendingFrame) -> Self {
        let superframe = Superframe::new(Instant::ZERO, 0, 15);
        Self {
            frame,
            outgoing: superframe,
            incoming: superframe,
            ack_wait: ack_wait_duration(phy),
            backoff_advice: None,
            verdicts: Vec::new(),
            costs: Vec::new(),
            now: Instant::ZERO,
            trace: Vec::new(),
        }
    }

    /// Use `superframe` for both directions.
    pub fn with_superframe(mut self, superframe: Superframe) -> Self {
        self.outgoing = superframe;
        self.incoming = superframe;
        self
    }

    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    fn record(&mut self, kind: TraceKind) {
        self.trace.push(TraceEvent { at: self.now, kind });
    }
}

impl MacLayer for SimMac {
    fn pending_frame(&self) -> PendingFrame {
        self.frame
    }

    fn superframe(&self, direction: SuperframeDirection) -> Superframe {
        match direction {
            SuperframeDirection::Incoming => self.incoming,
            SuperframeDirection::Outgoing => self.outgoing,
        }
    }

    fn ack_wait_duration(&self) -> u32 {
        self.ack_wait
    }

    fn on_verdict(&mut self, verdict: Verdict) {
        self.verdicts.push(verdict);
        self.record(TraceKind::Verdict(verdict));
    }

    fn on_transaction_cost(&mut self, symbols: u32) {
        self.costs.push(symbols);
        self.record(TraceKind::TransactionCost(symbols));
    }

    fn suggest_backoff(&mut self, _backoff_exponent: u8, _backoffs: u8) -> Option<u32> {
        self.backoff_advice
    }
}

/// A PHY answering CCA requests from a [`ChannelModel`] after `CCA_TIME`
/// symbols.
#[derive(Debug, Clone)]
pub struct SimPhy {
    pub symbol_rate: u32,
    pub channel: ChannelModel,
    pub cca_requests: u32,
    requested: bool,
}

impl SimPhy {
    pub fn new(option: PhyOption, channel: ChannelModel) -> Self {
        Self {
            symbol_rate: option.symbol_rate(),
            channel,
            cca_requests: 0,
            requested: false,
        }
    }
}

impl PhyLayer for SimPhy {
    fn symbol_rate(&self) -> u32 {
        self.symbol_rate
    }

    fn request_cca(&mut self) {
        self.requested = true;
    }
}

#[derive(Debug, Clone, Copy)]
enum SimEvent {
    Timer(Timer),
    CcaDone,
}

#[derive(Debug)]
struct Scheduled {
    due: Instant,
    seq: u64,
    event: SimEvent,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        (self.due, self.seq) == (other.due, other.seq)
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

/// Event queue ordered by due time, then by insertion.
#[derive(Debug)]
pub struct SimScheduler {
    now: Instant,
    seq: u64,
    queue: BinaryHeap<Scheduled, Min, QUEUE_CAPACITY>,
}

impl SimScheduler {
    fn new() -> Self {
        Self {
            now: Instant::ZERO,
            seq: 0,
            queue: BinaryHeap::new(),
        }
    }

    fn push(&mut self, due: Instant, event: SimEvent) {
        let scheduled = Scheduled {
            due,
            seq: self.seq,
            event,
        };
        self.seq += 1;
        if self.queue.push(scheduled).is_err() {
            error!("Simulation queue full, dropping event");
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl Scheduler for SimScheduler {
    fn now(&self) -> Instant {
        self.now
    }

    fn schedule(&mut self, delay: Duration, timer: Timer) {
        self.push(self.now + delay, SimEvent::Timer(timer));
    }
}

pub struct Simulation<Rng> {
    pub engine: CsmaCa<Rng>,
    pub mac: SimMac,
    pub phy: SimPhy,
    scheduler: SimScheduler,
}

impl<Rng: RngCore> Simulation<Rng> {
    pub fn new(engine: CsmaCa<Rng>, mac: SimMac, phy: SimPhy) -> Self {
        Self {
            engine,
            mac,
            phy,
            scheduler: SimScheduler::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.scheduler.now
    }

    /// Move the clock forward to `instant`. Earlier instants are ignored.
    pub fn advance_to(&mut self, instant: Instant) {
        self.scheduler.now = self.scheduler.now.max(instant);
        self.mac.now = self.scheduler.now;
    }

    pub fn trace(&self) -> &[TraceEvent] {
        self.mac.trace()
    }

    pub fn scheduler(&self) -> &SimScheduler {
        &self.scheduler
    }

    pub fn start(&mut self) -> Result<(), Error> {
        self.mac.now = self.scheduler.now;
        self.mac.record(TraceKind::Started {
            mode: self.engine.config().mode,
        });
        self.engine.start(&mut Context::new(
            &mut self.mac,
            &mut self.phy,
            &mut self.scheduler,
        ))?;
        self.forward_cca_request()
    }

    pub fn cancel(&mut self) {
        self.engine.cancel();
    }

    /// Process the next event. Returns `false` once the queue is empty.
    pub fn step(&mut self) -> Result<bool, Error> {
        let Some(next) = self.scheduler.queue.pop() else {
            return Ok(false);
        };
        self.advance_to(next.due);

        let mut ctx = Context::new(&mut self.mac, &mut self.phy, &mut self.scheduler);
        match next.event {
            SimEvent::Timer(timer) => self.engine.fire(timer, &mut ctx)?,
            SimEvent::CcaDone => {
                let status = ctx.phy.channel.assess(ctx.scheduler.now);
                ctx.mac.record(TraceKind::CcaResult(status));
                self.engine.plme_cca_confirm(status, &mut ctx);
            }
        }

        self.forward_cca_request()?;
        Ok(true)
    }

    /// Step until the MAC receives a verdict or nothing is left to do.
    pub fn run_until_verdict(&mut self) -> Result<Option<Verdict>, Error> {
        let seen = self.mac.verdicts.len();
        while self.mac.verdicts.len() == seen {
            if !self.step()? {
                return Ok(None);
            }
        }
        Ok(self.mac.verdicts.last().copied())
    }

    /// Step until the queue is empty.
    pub fn run_to_completion(&mut self) -> Result<(), Error> {
        while self.step()? {}
        Ok(())
    }

    fn forward_cca_request(&mut self) -> Result<(), Error> {
        if !core::mem::take(&mut self.phy.requested) {
            return Ok(());
        }

        let rate = SymbolRate::new(self.phy.symbol_rate)?;
        self.phy.cca_requests += 1;
        self.mac.record(TraceKind::CcaRequested {
            backoff_exponent: self.engine.backoff_exponent(),
            backoffs: self.engine.backoffs(),
            contention_window: self.engine.contention_window(),
        });
        let done = self.scheduler.now + rate.symbols_to_duration(CCA_TIME as u64);
        self.scheduler.push(done, SimEvent::CcaDone);
        Ok(())
    }
}
