//! The MAC sublayer as seen from the channel-access procedure.

pub mod constants;
pub mod pending;
pub mod superframe;

pub use pending::{ack_wait_duration, ifs_symbols, ppdu_symbols, PendingFrame};
pub use superframe::{Superframe, SuperframeDirection};

use crate::csma::Verdict;

/// Boundary of the owning MAC layer.
///
/// The MAC supplies facts about the queued frame and the superframe timing,
/// and receives the outcome of each channel access attempt.
pub trait MacLayer {
    /// The frame currently queued for transmission.
    fn pending_frame(&self) -> PendingFrame;

    /// Timing of the requested superframe. Only consulted in slotted mode.
    fn superframe(&self, direction: SuperframeDirection) -> Superframe;

    /// Symbols to wait for an acknowledgment.
    fn ack_wait_duration(&self) -> u32;

    /// Called exactly once per attempt with its outcome.
    fn on_verdict(&mut self, verdict: Verdict);

    /// Estimated symbols needed to complete the transaction, reported before
    /// each CAP feasibility decision in slotted mode.
    fn on_transaction_cost(&mut self, _symbols: u32) {}

    /// Override the random backoff draw with a period count of the MAC's
    /// choosing. Returned values are clamped to `[0, 2^BE - 1]`.
    fn suggest_backoff(&mut self, _backoff_exponent: u8, _backoffs: u8) -> Option<u32> {
        None
    }
}
