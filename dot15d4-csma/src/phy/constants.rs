// Constants from section 11.3, Table 11-1, PHY constants

/// The maximum PSDU size (in octets) the PHY shall be able to receive.
#[doc(alias = "aMaxPHYPacketSize")]
pub const MAX_PHY_PACKET_SIZE: u32 = 127;
/// RX-to-TX or TX-to-RX turnaround time (in symbol periods), as defined in
/// 10.2.2 and 10.2.3.
#[doc(alias = "aTurnaroundTime")]
pub const TURNAROUND_TIME: u32 = 12;
/// The time required to perform CCA detection in symbol periods.
#[doc(alias = "aCcaTime")]
pub const CCA_TIME: u32 = 8;

/// The symbol rate of the 2.45 GHz O-QPSK PHY (symbols/s)
pub const SYMBOL_RATE_2450: u32 = 62_500;
