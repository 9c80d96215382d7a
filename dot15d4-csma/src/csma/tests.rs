use std::vec::Vec;

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::*;
use crate::mac::{PendingFrame, Superframe};
use crate::phy::PhyOption;
use crate::sim::{ChannelModel, SimMac, SimPhy, Simulation, TraceEvent, TraceKind};
use crate::time::{Duration, Instant};

const PHY: PhyOption = PhyOption::Oqpsk2450;

/// Always draws the same value.
struct FixedRng(u32);

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        self.0
    }

    fn next_u64(&mut self) -> u64 {
        self.0 as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A 20 octet MPDU with an acknowledgment: 162 symbols of transaction in
/// slotted mode.
fn frame() -> PendingFrame {
    PendingFrame::for_mpdu(PHY, 20, true, false)
}

fn simulation<Rng: RngCore>(
    config: CsmaConfig,
    rng: Rng,
    channel: ChannelModel,
    superframe: Superframe,
) -> Simulation<Rng> {
    init_logger();
    Simulation::new(
        CsmaCa::new(config, rng).unwrap(),
        SimMac::new(PHY, frame()).with_superframe(superframe),
        SimPhy::new(PHY, channel),
    )
}

fn unslotted<Rng: RngCore>(rng: Rng, channel: ChannelModel) -> Simulation<Rng> {
    simulation(
        CsmaConfig::default(),
        rng,
        channel,
        Superframe::new(Instant::ZERO, 0, 15),
    )
}

fn cca_requests(trace: &[TraceEvent]) -> Vec<(Instant, u8, u8, u8)> {
    trace
        .iter()
        .filter_map(|event| match event.kind {
            TraceKind::CcaRequested {
                backoff_exponent,
                backoffs,
                contention_window,
            } => Some((event.at, backoff_exponent, backoffs, contention_window)),
            _ => None,
        })
        .collect()
}

#[test]
fn unslotted_idle_channel() {
    let mut sim = unslotted(StdRng::seed_from_u64(1), ChannelModel::Idle);
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));
    sim.run_to_completion().unwrap();

    assert_eq!(sim.mac.verdicts, [Verdict::ChannelIdle]);
    assert_eq!(sim.engine.backoffs(), 0);
    assert_eq!(sim.phy.cca_requests, 1);
    assert!(sim.mac.costs.is_empty());
    assert!(!sim.engine.is_running());
}

#[test]
fn unslotted_busy_channel() {
    let mut sim = unslotted(StdRng::seed_from_u64(2), ChannelModel::Busy);
    sim.start().unwrap();

    assert_eq!(
        sim.run_until_verdict().unwrap(),
        Some(Verdict::ChannelAccessFailure)
    );
    sim.run_to_completion().unwrap();

    assert_eq!(sim.mac.verdicts, [Verdict::ChannelAccessFailure]);
    assert_eq!(sim.phy.cca_requests, 5);
    assert_eq!(sim.engine.backoffs(), 5);

    let requests = cca_requests(sim.trace());
    let backoffs: Vec<u8> = requests.iter().map(|r| r.2).collect();
    assert_eq!(backoffs, [0, 1, 2, 3, 4]);
    let exponents: Vec<u8> = requests.iter().map(|r| r.1).collect();
    assert_eq!(exponents, [3, 4, 5, 5, 5]);
}

#[test]
fn busy_rounds_never_exceed_max_backoff_exponent() {
    let config = CsmaConfig {
        min_be: 0,
        max_be: 3,
        max_backoffs: 5,
        ..CsmaConfig::default()
    };
    let mut sim = simulation(
        config,
        StdRng::seed_from_u64(3),
        ChannelModel::Busy,
        Superframe::new(Instant::ZERO, 0, 15),
    );
    sim.start().unwrap();
    sim.run_to_completion().unwrap();

    let exponents: Vec<u8> = cca_requests(sim.trace()).iter().map(|r| r.1).collect();
    assert_eq!(exponents, [0, 1, 2, 3, 3, 3]);
    assert_eq!(sim.engine.backoff_exponent(), 3);
    assert_eq!(sim.mac.verdicts, [Verdict::ChannelAccessFailure]);
}

#[test]
fn zero_backoffs_fail_on_first_busy() {
    let config = CsmaConfig {
        max_backoffs: 0,
        ..CsmaConfig::default()
    };
    let mut sim = simulation(
        config,
        FixedRng(0),
        ChannelModel::from_pattern("b").unwrap(),
        Superframe::new(Instant::ZERO, 0, 15),
    );
    sim.start().unwrap();

    assert_eq!(
        sim.run_until_verdict().unwrap(),
        Some(Verdict::ChannelAccessFailure)
    );
    assert_eq!(sim.phy.cca_requests, 1);
}

#[test]
fn trx_off_counts_as_busy() {
    let mut sim = unslotted(
        FixedRng(0),
        ChannelModel::Scripted([CcaStatus::TrxOff].into_iter().collect()),
    );
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));
    assert_eq!(sim.phy.cca_requests, 2);
    assert_eq!(sim.engine.backoffs(), 1);
}

#[test]
fn zero_draw_requests_cca_immediately() {
    let config = CsmaConfig {
        min_be: 3,
        max_be: 5,
        max_backoffs: 4,
        unit_backoff_period: 20,
        battery_life_extension: false,
        mode: CsmaMode::Unslotted,
    };
    let mut sim = simulation(
        config,
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 0, 15),
    );
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    assert_eq!(cca_requests(sim.trace())[0].0, Instant::ZERO);
}

#[test]
fn unslotted_backoff_delay() {
    // 5 periods of 20 symbols at 16 us per symbol
    let mut sim = unslotted(FixedRng(5), ChannelModel::Idle);
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    assert_eq!(cca_requests(sim.trace())[0].0, Instant::from_us(1600));
    assert_eq!(sim.now(), Instant::from_us(1600 + 128));
}

#[test]
fn slotted_idle_channel_needs_two_ccas() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));

    let requests = cca_requests(sim.trace());
    let windows: Vec<u8> = requests.iter().map(|r| r.3).collect();
    assert_eq!(windows, [2, 1]);
    assert_eq!(sim.phy.cca_requests, 2);
    assert_eq!(sim.engine.contention_window(), 0);
    assert_eq!(sim.mac.costs, [162]);
    // Starting on a boundary waits for the next one.
    assert_eq!(requests[0].0, Instant::from_us(320));
}

#[test]
fn slotted_busy_second_cca_restarts_backoff() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::from_pattern("ib").unwrap(),
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));

    let requests = cca_requests(sim.trace());
    let windows: Vec<u8> = requests.iter().map(|r| r.3).collect();
    assert_eq!(windows, [2, 1, 2, 1]);
    assert_eq!(sim.engine.backoffs(), 1);
    assert_eq!(sim.engine.backoff_exponent(), 4);
    assert_eq!(sim.mac.costs.len(), 2);
}

#[test]
fn slotted_backoff_longer_than_cap_is_deferred() {
    // SO 1 with a single CAP slot: the CAP ends after 120 symbols (1920 us).
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(7),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 1, 0),
    );
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));
    assert_eq!(sim.now(), Instant::from_us(1920));
    // 7 periods drawn at 320 us, 5 of them fit before the CAP ends.
    assert_eq!(sim.engine.random_backoff_periods_left(), 2);
    assert_eq!(sim.phy.cca_requests, 0);
    assert!(sim.mac.costs.is_empty());

    sim.run_to_completion().unwrap();
    assert_eq!(sim.mac.verdicts, [Verdict::Deferred]);
}

#[test]
fn deferred_backoff_resumes_in_next_cap() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(7),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 1, 0),
    );
    sim.start().unwrap();
    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));

    let beacon = Instant::from_us(30_720);
    sim.mac.outgoing = Superframe::new(beacon, 1, 15);
    sim.advance_to(beacon);
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));
    // Boundary after the beacon, then the 2 remaining periods.
    let requests = cca_requests(sim.trace());
    assert_eq!(requests[0].0, beacon + Duration::from_us(320 + 640));
}

#[test]
fn cancel_forgets_deferred_backoff() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(7),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 1, 0),
    );
    sim.start().unwrap();
    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));
    sim.cancel();

    let beacon = Instant::from_us(30_720);
    sim.mac.outgoing = Superframe::new(beacon, 1, 15);
    sim.advance_to(beacon);
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    // A fresh draw of 7 periods.
    let requests = cca_requests(sim.trace());
    assert_eq!(requests[0].0, beacon + Duration::from_us(320 + 7 * 320));
}

#[test]
fn transaction_longer_than_cap_is_deferred() {
    // SO 0 with a single CAP slot: 60 symbols, 40 of them after the first
    // boundary, far less than the 162 the transaction needs.
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 0, 0),
    );
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));
    assert_eq!(sim.now(), Instant::from_us(960));
    assert_eq!(sim.mac.costs, [162]);
    assert_eq!(sim.phy.cca_requests, 0);
    assert_eq!(sim.engine.random_backoff_periods_left(), 0);
}

#[test]
fn start_after_cap_end_defers_immediately() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(1),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 0, 0),
    );
    sim.advance_to(Instant::from_us(2_000));
    sim.start().unwrap();

    // Waits for the boundary at 140 symbols before finding the CAP over.
    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));
    assert_eq!(sim.now(), Instant::from_us(2_240));
    assert_eq!(sim.engine.random_backoff_periods_left(), 1);
}

#[test]
fn frames_to_the_coordinator_follow_the_incoming_superframe() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.mac.frame = PendingFrame::for_mpdu(PHY, 20, true, true);
    sim.mac.incoming = Superframe::new(Instant::from_us(100), 3, 15);
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    assert_eq!(cca_requests(sim.trace())[0].0, Instant::from_us(100));
}

#[test]
fn cap_of_the_incoming_superframe_bounds_frames_to_the_coordinator() {
    // Roomy outgoing CAP, single-slot incoming CAP: only the incoming one
    // is too short for the 162 symbol transaction.
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.mac.frame = PendingFrame::for_mpdu(PHY, 20, true, true);
    sim.mac.incoming = Superframe::new(Instant::ZERO, 0, 0);
    sim.start().unwrap();

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::Deferred));
    assert_eq!(sim.now(), Instant::from_us(960));
    assert_eq!(sim.mac.costs, [162]);
    assert_eq!(sim.phy.cca_requests, 0);
}

#[test]
fn direction_is_fixed_when_the_attempt_starts() {
    let mut sim = simulation(
        CsmaConfig::slotted(),
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.mac.incoming = Superframe::new(Instant::ZERO, 0, 0);
    sim.start().unwrap();

    // Retargeting the frame mid-attempt does not move it to the short
    // incoming CAP.
    sim.mac.frame.destination_is_coordinator = true;

    assert_eq!(sim.run_until_verdict().unwrap(), Some(Verdict::ChannelIdle));
    assert_eq!(sim.phy.cca_requests, 2);
    assert_eq!(cca_requests(sim.trace())[0].0, Instant::from_us(320));
}

#[test]
fn battery_life_extension_caps_initial_exponent() {
    let config = CsmaConfig {
        battery_life_extension: true,
        ..CsmaConfig::slotted()
    };
    let mut sim = simulation(
        config,
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();
    assert_eq!(cca_requests(sim.trace())[0].1, 2);

    // Unslotted mode ignores the flag.
    let config = CsmaConfig {
        battery_life_extension: true,
        ..CsmaConfig::default()
    };
    let mut sim = simulation(
        config,
        FixedRng(0),
        ChannelModel::Idle,
        Superframe::new(Instant::ZERO, 3, 15),
    );
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();
    assert_eq!(cca_requests(sim.trace())[0].1, 3);
}

#[test]
fn cancel_suppresses_outstanding_cca() {
    let mut sim = unslotted(FixedRng(0), ChannelModel::Idle);
    sim.start().unwrap();
    while sim.phy.cca_requests == 0 {
        assert!(sim.step().unwrap());
    }
    assert!(sim.engine.is_cca_outstanding());

    sim.cancel();
    assert!(!sim.engine.is_cca_outstanding());
    assert!(!sim.engine.is_running());

    sim.run_to_completion().unwrap();
    assert!(sim.mac.verdicts.is_empty());
}

#[test]
fn cancel_before_backoff_expires() {
    let mut sim = unslotted(FixedRng(3), ChannelModel::Idle);
    sim.start().unwrap();
    sim.step().unwrap();
    sim.cancel();

    sim.run_to_completion().unwrap();
    assert!(sim.mac.verdicts.is_empty());
    assert_eq!(sim.phy.cca_requests, 0);
}

#[test]
fn restart_ignores_timers_of_previous_attempt() {
    let mut sim = unslotted(FixedRng(2), ChannelModel::Idle);
    sim.start().unwrap();
    sim.step().unwrap();
    assert_eq!(sim.scheduler().pending(), 1);

    // The first attempt's CCA request timer is still queued.
    sim.start().unwrap();
    sim.run_to_completion().unwrap();

    assert_eq!(sim.mac.verdicts, [Verdict::ChannelIdle]);
    assert_eq!(sim.phy.cca_requests, 1);
}

#[test]
fn suggested_backoff_is_clamped() {
    let mut sim = unslotted(FixedRng(0), ChannelModel::Idle);
    sim.mac.backoff_advice = Some(1_000);
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    // 2^3 - 1 periods at most
    assert_eq!(cca_requests(sim.trace())[0].0, Instant::from_us(7 * 320));
}

#[test]
fn suggested_backoff_replaces_draw() {
    let mut sim = unslotted(FixedRng(7), ChannelModel::Idle);
    sim.mac.backoff_advice = Some(1);
    sim.start().unwrap();
    sim.run_until_verdict().unwrap();

    assert_eq!(cca_requests(sim.trace())[0].0, Instant::from_us(320));
}

#[test]
fn zero_symbol_rate_is_an_error() {
    let mut sim = unslotted(FixedRng(0), ChannelModel::Idle);
    sim.phy.symbol_rate = 0;

    assert_eq!(sim.start(), Err(Error::ZeroSymbolRate));
    assert!(!sim.engine.is_running());
    sim.run_to_completion().unwrap();
    assert!(sim.mac.verdicts.is_empty());
}

#[test]
fn config_is_locked_while_running() {
    let mut sim = unslotted(FixedRng(0), ChannelModel::Idle);
    sim.start().unwrap();

    assert_eq!(
        sim.engine.set_mode(CsmaMode::Slotted),
        Err(Error::ProcedureActive)
    );

    sim.run_until_verdict().unwrap();
    assert_eq!(sim.engine.set_mode(CsmaMode::Slotted), Ok(()));
    assert!(sim.engine.config().is_slotted());
}

#[test]
fn invalid_config_is_rejected() {
    let config = CsmaConfig {
        min_be: 6,
        max_be: 5,
        ..CsmaConfig::default()
    };
    assert_eq!(
        CsmaCa::new(config, FixedRng(0)).err(),
        Some(Error::BackoffExponentOrder { min: 6, max: 5 })
    );
}

#[test]
fn random_draws_stay_in_range() {
    let mut sim = unslotted(StdRng::seed_from_u64(0xcafe), ChannelModel::Idle);
    for _ in 0..200 {
        let started = sim.now();
        sim.start().unwrap();
        sim.run_until_verdict().unwrap();

        let requested = cca_requests(sim.trace()).last().unwrap().0;
        let periods = (requested - started).as_us() / 320;
        assert!((0..=7).contains(&periods));
        assert_eq!((requested - started).as_us() % 320, 0);
    }
    assert_eq!(sim.mac.verdicts.len(), 200);
}
