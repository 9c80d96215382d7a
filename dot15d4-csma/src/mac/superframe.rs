//! Superframe timing: backoff-period boundaries and the end of the
//! contention access period (CAP).

use super::constants::*;
use crate::phy::SymbolRate;
use crate::time::{Duration, Instant};

/// Which superframe a transmission has to fit in.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuperframeDirection {
    /// The superframe announced by our coordinator's beacons. Used for frames
    /// sent to the coordinator.
    Incoming,
    /// The superframe started by our own beacons.
    Outgoing,
}

impl SuperframeDirection {
    pub fn for_destination(destination_is_coordinator: bool) -> Self {
        if destination_is_coordinator {
            Self::Incoming
        } else {
            Self::Outgoing
        }
    }
}

/// Timing of one superframe.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Superframe {
    /// Start of the superframe: the last transmitted beacon for the outgoing
    /// superframe, the last received beacon for the incoming one.
    pub beacon_time: Instant,
    /// Superframe order (SO), `0..=14`.
    pub superframe_order: u8,
    /// Index of the last slot of the CAP, `0..=15`.
    pub final_cap_slot: u8,
}

impl Superframe {
    pub fn new(beacon_time: Instant, superframe_order: u8, final_cap_slot: u8) -> Self {
        Self {
            beacon_time,
            superframe_order: superframe_order.min(MAX_SUPERFRAME_ORDER),
            final_cap_slot: final_cap_slot.min(NUM_SUPERFRAME_SLOTS as u8 - 1),
        }
    }

    /// Active superframe duration in symbols.
    pub fn superframe_duration(&self) -> u32 {
        BASE_SUPERFRAME_DURATION << self.superframe_order.min(MAX_SUPERFRAME_ORDER)
    }

    /// Duration of one superframe slot in symbols.
    pub fn slot_duration(&self) -> u32 {
        self.superframe_duration() / NUM_SUPERFRAME_SLOTS
    }

    /// Length of the CAP, beacon included, in symbols.
    pub fn cap_duration(&self) -> u32 {
        self.slot_duration() * (self.final_cap_slot as u32 + 1)
    }

    pub fn cap_end(&self, rate: SymbolRate) -> Instant {
        self.beacon_time + rate.symbols_to_duration(self.cap_duration() as u64)
    }

    /// The same superframe one superframe duration later, assuming the
    /// beacon interval equals the superframe duration.
    pub fn next(&self, rate: SymbolRate) -> Self {
        Self {
            beacon_time: self.beacon_time
                + rate.symbols_to_duration(self.superframe_duration() as u64),
            ..*self
        }
    }
}

/// Time from `now` until the next backoff period boundary, measured from the
/// start of `superframe`.
///
/// A device sitting exactly on a boundary waits for the following one.
pub fn time_to_next_boundary(
    now: Instant,
    superframe: &Superframe,
    unit_backoff_period: u32,
    rate: SymbolRate,
) -> Duration {
    let elapsed = now - superframe.beacon_time;
    if elapsed.is_negative() {
        // The superframe has not started yet; its start is a boundary.
        return superframe.beacon_time - now;
    }

    let unit = unit_backoff_period.max(1) as u64;
    let elapsed_symbols = rate.duration_to_symbols(elapsed);
    let boundary = (elapsed_symbols / unit + 1) * unit;

    rate.symbols_to_duration(boundary) - elapsed
}

/// Time from `now` until the end of the CAP of `superframe`, never negative.
pub fn time_left_in_cap(now: Instant, superframe: &Superframe, rate: SymbolRate) -> Duration {
    (superframe.cap_end(rate) - now).clamp_non_negative()
}
