//! MAC sublayer constants, section 8.4.2, Table 8-93, and the attribute
//! ranges of Table 8-94 that bound the CSMA-CA policy.

/// The number of symbols forming a superframe slot when the superframe order is
/// equal to zero, as described in 6.2.1.
#[doc(alias = "aBaseSlotDuration")]
pub const BASE_SLOT_DURATION: u32 = 60;
/// The number of slots contained in any superframe.
#[doc(alias = "aNumSuperframeSlots")]
pub const NUM_SUPERFRAME_SLOTS: u32 = 16;
/// The number of symbols forming a superframe when the superframe order is
/// equal to zero.
#[doc(alias = "aBaseSuperframeDuration")]
pub const BASE_SUPERFRAME_DURATION: u32 = BASE_SLOT_DURATION * NUM_SUPERFRAME_SLOTS;
/// The number of symbols forming the basic time period used by the CSMA-CA
/// algorithm.
#[doc(alias = "aUnitBackoffPeriod")]
pub const UNIT_BACKOFF_PERIOD: u32 = 20;
/// The maximum size of an MPDU, in octets, that can be followed by a SIFS
/// period.
#[doc(alias = "aMaxSIFSFrameSize")]
pub const MAX_SIFS_FRAME_SIZE: u32 = 18;
/// Short interframe spacing in symbols.
#[doc(alias = "macSIFSPeriod")]
pub const MIN_SIFS_PERIOD: u32 = 12;
/// Long interframe spacing in symbols.
#[doc(alias = "macLIFSPeriod")]
pub const MIN_LIFS_PERIOD: u32 = 40;
/// Highest superframe order that still describes an active superframe.
pub const MAX_SUPERFRAME_ORDER: u8 = 14;
/// Upper bound of `macMaxBE`.
pub const MAX_BE_LIMIT: u8 = 8;
/// Lower bound of `macMaxBE`.
pub const MIN_MAX_BE: u8 = 3;
/// Upper bound of `macMaxCSMABackoffs`.
pub const MAX_CSMA_BACKOFFS_LIMIT: u8 = 5;
/// Consecutive idle CCAs required before transmitting in a beacon-enabled
/// PAN.
pub const CONTENTION_WINDOW: u8 = 2;
