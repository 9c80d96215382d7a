use super::constants::*;
use crate::phy::{PhyOption, TURNAROUND_TIME};

/// Facts about the frame the MAC wants to send, as needed to estimate the
/// cost of a transaction.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "fuzz", derive(arbitrary::Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingFrame {
    /// Length of the whole PPDU in symbols.
    pub symbols: u32,
    pub ack_required: bool,
    /// Interframe spacing required after this frame, in symbols.
    pub ifs_symbols: u32,
    pub destination_is_coordinator: bool,
}

impl PendingFrame {
    /// Describe an MPDU of `octets` octets sent over `phy`.
    pub fn for_mpdu(
        phy: PhyOption,
        octets: u32,
        ack_required: bool,
        destination_is_coordinator: bool,
    ) -> Self {
        Self {
            symbols: ppdu_symbols(phy, octets),
            ack_required,
            ifs_symbols: ifs_symbols(octets),
            destination_is_coordinator,
        }
    }
}

/// PPDU length in symbols: SHR, PHR and the MPDU itself. Saturates at
/// `u32::MAX` for octet counts no PHY can carry.
pub fn ppdu_symbols(phy: PhyOption, mpdu_octets: u32) -> u32 {
    mpdu_octets
        .saturating_mul(phy.symbols_per_octet())
        .saturating_add(phy.shr_duration())
        .saturating_add(phy.phr_duration())
}

/// SIFS for short frames, LIFS otherwise.
pub fn ifs_symbols(mpdu_octets: u32) -> u32 {
    if mpdu_octets <= MAX_SIFS_FRAME_SIZE {
        MIN_SIFS_PERIOD
    } else {
        MIN_LIFS_PERIOD
    }
}

/// Symbols to wait for an acknowledgment after transmitting a frame.
#[doc(alias = "macAckWaitDuration")]
pub fn ack_wait_duration(phy: PhyOption) -> u32 {
    // An imm-ACK carries 6 octets after the SHR
    UNIT_BACKOFF_PERIOD
        .saturating_add(TURNAROUND_TIME)
        .saturating_add(phy.shr_duration())
        .saturating_add(phy.symbols_per_octet().saturating_mul(6))
}
