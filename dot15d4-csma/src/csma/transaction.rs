//! Cost of the rest of a slotted CSMA-CA transaction.

use crate::mac::PendingFrame;
use crate::phy::CCA_TIME;

/// Symbols needed after the backoff: the remaining CCAs, the frame, the
/// acknowledgment (or the two turnarounds when no acknowledgment is
/// requested) and the interframe spacing.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionCost {
    pub cca: u32,
    pub frame: u32,
    pub reply: u32,
    pub ifs: u32,
}

impl TransactionCost {
    pub fn estimate(
        contention_window: u8,
        frame: &PendingFrame,
        ack_wait_duration: u32,
        turnaround_time: u32,
    ) -> Self {
        Self {
            cca: CCA_TIME * contention_window as u32,
            frame: frame.symbols,
            reply: if frame.ack_required {
                ack_wait_duration
            } else {
                2 * turnaround_time
            },
            ifs: frame.ifs_symbols,
        }
    }

    pub fn total(&self) -> u32 {
        self.cca
            .saturating_add(self.frame)
            .saturating_add(self.reply)
            .saturating_add(self.ifs)
    }
}
