/// Configuration and policy violations.
///
/// Channel-access outcomes are not errors; they are reported through
/// [`Verdict`](crate::csma::Verdict).
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The PHY reported a symbol rate of zero.
    ZeroSymbolRate,
    /// `macMaxBE` must lie in `3..=8`.
    MaxBackoffExponentOutOfRange(u8),
    /// `macMinBE` exceeds `macMaxBE`.
    BackoffExponentOrder { min: u8, max: u8 },
    /// `macMaxCSMABackoffs` must lie in `0..=5`.
    MaxBackoffsOutOfRange(u8),
    /// `aUnitBackoffPeriod` of zero symbols.
    ZeroUnitBackoffPeriod,
    /// The configuration cannot change while an attempt is in progress.
    ProcedureActive,
    /// The attempt stopped without reaching a verdict.
    Stalled,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::ZeroSymbolRate => write!(f, "symbol rate must be non-zero"),
            Error::MaxBackoffExponentOutOfRange(max) => {
                write!(f, "maximum backoff exponent {max} outside 3..=8")
            }
            Error::BackoffExponentOrder { min, max } => write!(
                f,
                "minimum backoff exponent {min} exceeds maximum backoff exponent {max}"
            ),
            Error::MaxBackoffsOutOfRange(max) => {
                write!(f, "maximum number of backoffs {max} outside 0..=5")
            }
            Error::ZeroUnitBackoffPeriod => write!(f, "unit backoff period must be non-zero"),
            Error::ProcedureActive => {
                write!(f, "configuration cannot change during a channel access attempt")
            }
            Error::Stalled => write!(f, "channel access attempt stopped without a verdict"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
