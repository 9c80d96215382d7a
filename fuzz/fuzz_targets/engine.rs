#![no_main]

use arbitrary::Arbitrary;
use dot15d4_csma::csma::{CsmaCa, CsmaConfig, CsmaMode, Verdict};
use dot15d4_csma::mac::{PendingFrame, Superframe};
use dot15d4_csma::phy::{CcaStatus, PhyOption};
use dot15d4_csma::sim::{ChannelModel, SimMac, SimPhy, Simulation, TraceKind};
use dot15d4_csma::time::Instant;

use libfuzzer_sys::{fuzz_target, Corpus};

const MAX_STEPS: usize = 10_000;

#[derive(Debug, Arbitrary)]
struct Input {
    min_be: u8,
    max_be: u8,
    max_backoffs: u8,
    battery_life_extension: bool,
    slotted: bool,
    frame: PendingFrame,
    superframe_order: u8,
    final_cap_slot: u8,
    start_us: u16,
    ccas: Vec<CcaStatus>,
    draws: Vec<u32>,
    cancel_after: Option<u8>,
}

/// Replays the fuzzer's draws, then zeros.
struct Draws(Vec<u32>, usize);

impl rand_core::RngCore for Draws {
    fn next_u32(&mut self) -> u32 {
        let value = self.0.get(self.1).copied().unwrap_or(0);
        self.1 += 1;
        value
    }

    fn next_u64(&mut self) -> u64 {
        self.next_u32() as u64
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        rand_core::impls::fill_bytes_via_next(self, dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

fuzz_target!(|input: Input| -> Corpus {
    let config = CsmaConfig {
        min_be: input.min_be,
        max_be: input.max_be,
        max_backoffs: input.max_backoffs,
        battery_life_extension: input.battery_life_extension,
        mode: if input.slotted {
            CsmaMode::Slotted
        } else {
            CsmaMode::Unslotted
        },
        ..CsmaConfig::default()
    };
    let Ok(engine) = CsmaCa::new(config, Draws(input.draws, 0)) else {
        return Corpus::Reject;
    };

    let phy = PhyOption::Oqpsk2450;
    let superframe = Superframe::new(Instant::ZERO, input.superframe_order, input.final_cap_slot);
    let mac = SimMac::new(phy, input.frame).with_superframe(superframe);
    let channel = ChannelModel::Scripted(input.ccas.into_iter().collect());
    let mut sim = Simulation::new(engine, mac, SimPhy::new(phy, channel));
    sim.advance_to(Instant::from_us(input.start_us as i64));

    sim.start().unwrap();
    let mut cancelled = false;
    for step in 0..MAX_STEPS {
        if step < 256 && input.cancel_after == Some(step as u8) && sim.engine.is_running() {
            sim.cancel();
            cancelled = true;
        }
        if !sim.step().unwrap() {
            break;
        }
    }

    for event in sim.trace() {
        if let TraceKind::CcaRequested {
            backoff_exponent,
            backoffs,
            contention_window,
        } = event.kind
        {
            assert!(backoff_exponent <= config.max_be);
            assert!(backoffs <= config.max_backoffs);
            if config.is_slotted() {
                assert!(contention_window == 1 || contention_window == 2);
            } else {
                assert_eq!(contention_window, 0);
            }
        }
    }

    assert!(sim.mac.verdicts.len() <= 1);
    if cancelled {
        assert!(sim.mac.verdicts.is_empty());
    } else {
        assert_eq!(sim.mac.verdicts.len(), 1);
    }
    match sim.mac.verdicts.first() {
        Some(Verdict::ChannelAccessFailure) => {
            assert_eq!(sim.engine.backoffs(), config.max_backoffs + 1)
        }
        Some(Verdict::ChannelIdle) => assert_eq!(sim.engine.contention_window(), 0),
        Some(Verdict::Deferred) => assert!(config.is_slotted()),
        None => {}
    }
    assert!(!sim.engine.is_running());

    Corpus::Keep
});
