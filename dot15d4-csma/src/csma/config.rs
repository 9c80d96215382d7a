use super::user_configurable_constants::*;
use crate::mac::constants::{MAX_BE_LIMIT, MAX_CSMA_BACKOFFS_LIMIT, MIN_MAX_BE};
use crate::Error;

/// CSMA-CA variant.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CsmaMode {
    /// Nonbeacon-enabled PAN: CCA as soon as the backoff expires.
    #[default]
    Unslotted,
    /// Beacon-enabled PAN: backoffs aligned to the superframe and bounded by
    /// the CAP.
    Slotted,
}

impl core::fmt::Display for CsmaMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            CsmaMode::Unslotted => write!(f, "unslotted"),
            CsmaMode::Slotted => write!(f, "slotted"),
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CsmaConfig {
    /// macMinBE
    pub min_be: u8,
    /// macMaxBE
    pub max_be: u8,
    /// macMaxCSMABackoffs
    pub max_backoffs: u8,
    /// Length of one backoff period in symbols
    pub unit_backoff_period: u32,
    /// macBattLifeExt, caps the initial BE at 2 in slotted mode
    pub battery_life_extension: bool,
    pub mode: CsmaMode,
}

impl Default for CsmaConfig {
    fn default() -> Self {
        Self {
            min_be: MAC_MIN_BE,
            max_be: MAC_MAX_BE,
            max_backoffs: MAC_MAX_CSMA_BACKOFFS,
            unit_backoff_period: UNIT_BACKOFF_PERIOD,
            battery_life_extension: MAC_BATT_LIFE_EXT,
            mode: CsmaMode::Unslotted,
        }
    }
}

impl CsmaConfig {
    pub fn slotted() -> Self {
        Self {
            mode: CsmaMode::Slotted,
            ..Default::default()
        }
    }

    pub fn is_slotted(&self) -> bool {
        self.mode == CsmaMode::Slotted
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(MIN_MAX_BE..=MAX_BE_LIMIT).contains(&self.max_be) {
            return Err(Error::MaxBackoffExponentOutOfRange(self.max_be));
        }
        if self.min_be > self.max_be {
            return Err(Error::BackoffExponentOrder {
                min: self.min_be,
                max: self.max_be,
            });
        }
        if self.max_backoffs > MAX_CSMA_BACKOFFS_LIMIT {
            return Err(Error::MaxBackoffsOutOfRange(self.max_backoffs));
        }
        if self.unit_backoff_period == 0 {
            return Err(Error::ZeroUnitBackoffPeriod);
        }
        Ok(())
    }

    /// BE at the start of an attempt.
    pub fn initial_backoff_exponent(&self) -> u8 {
        if self.is_slotted() && self.battery_life_extension {
            self.min_be.min(2)
        } else {
            self.min_be
        }
    }
}
