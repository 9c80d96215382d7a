//! PHY facts the channel-access procedure depends on.

pub mod constants;

pub use constants::*;

use crate::time::Duration;
use crate::Error;

/// Result of a clear channel assessment.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CcaStatus {
    Idle,
    Busy,
    /// The transceiver was off; treated as a busy channel.
    TrxOff,
}

impl CcaStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, CcaStatus::Idle)
    }
}

/// The PHYs whose timing can be expressed in whole symbols per octet.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhyOption {
    /// 868 MHz BPSK, 20 kb/s
    Bpsk868,
    /// 915 MHz BPSK, 40 kb/s
    Bpsk915,
    /// 868 MHz O-QPSK, 100 kb/s
    Oqpsk868,
    /// 915 MHz O-QPSK, 250 kb/s
    Oqpsk915,
    /// 2.45 GHz O-QPSK, 250 kb/s
    #[default]
    Oqpsk2450,
}

impl PhyOption {
    /// Symbols per second.
    pub const fn symbol_rate(&self) -> u32 {
        match self {
            PhyOption::Bpsk868 => 20_000,
            PhyOption::Bpsk915 => 40_000,
            PhyOption::Oqpsk868 => 25_000,
            PhyOption::Oqpsk915 => 62_500,
            PhyOption::Oqpsk2450 => SYMBOL_RATE_2450,
        }
    }

    pub const fn symbols_per_octet(&self) -> u32 {
        match self {
            PhyOption::Bpsk868 | PhyOption::Bpsk915 => 8,
            PhyOption::Oqpsk868 | PhyOption::Oqpsk915 | PhyOption::Oqpsk2450 => 2,
        }
    }

    /// Duration of the synchronization header (preamble + SFD) in symbols.
    #[doc(alias = "phySHRDuration")]
    pub const fn shr_duration(&self) -> u32 {
        // 4 octets of preamble and a single SFD octet for all of these PHYs
        5 * self.symbols_per_octet()
    }

    /// Duration of the single-octet PHY header in symbols.
    pub const fn phr_duration(&self) -> u32 {
        self.symbols_per_octet()
    }
}

/// Channel symbol rate, converting between symbol counts and time.
///
/// Symbol periods that are not a whole number of microseconds are rounded
/// up when converting symbols to time, so the resulting duration always
/// holds the requested symbols. For rates up to 1 MHz converting back with
/// [`duration_to_symbols`](Self::duration_to_symbols) yields the same count.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolRate(u32);

impl SymbolRate {
    /// A PHY reporting zero symbols per second cannot be used for timing.
    pub fn new(symbols_per_second: u32) -> Result<Self, Error> {
        if symbols_per_second == 0 {
            return Err(Error::ZeroSymbolRate);
        }
        Ok(Self(symbols_per_second))
    }

    pub const fn symbols_per_second(&self) -> u32 {
        self.0
    }

    /// Time taken by `symbols`, rounded up to the next microsecond.
    pub const fn symbols_to_duration(&self, symbols: u64) -> Duration {
        let rate = self.0 as i128;
        Duration::from_us(((symbols as i128 * 1_000_000 + rate - 1) / rate) as i64)
    }

    /// Whole symbols in `duration`, truncated. Negative durations hold no
    /// symbols.
    pub const fn duration_to_symbols(&self, duration: Duration) -> u64 {
        if duration.is_negative() {
            return 0;
        }
        (duration.as_us() as i128 * self.0 as i128 / 1_000_000) as u64
    }
}

impl TryFrom<u32> for SymbolRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PhyOption> for SymbolRate {
    fn from(option: PhyOption) -> Self {
        Self(option.symbol_rate())
    }
}

/// Boundary of the physical layer as seen by the channel-access procedure.
pub trait PhyLayer {
    /// Symbols per second of the current channel.
    fn symbol_rate(&self) -> u32;

    /// RX-to-TX turnaround time in symbols.
    fn turnaround_time(&self) -> u32 {
        TURNAROUND_TIME
    }

    /// Start a clear channel assessment. The result is delivered later
    /// through [`CsmaCa::plme_cca_confirm`](crate::csma::CsmaCa::plme_cca_confirm).
    fn request_cca(&mut self);
}
