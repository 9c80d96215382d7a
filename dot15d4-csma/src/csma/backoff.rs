use rand_core::RngCore;

/// Largest backoff period count for a backoff exponent: `2^BE - 1`.
pub fn max_backoff_periods(backoff_exponent: u8) -> u32 {
    (1u32 << backoff_exponent.min(31)) - 1
}

/// Draw a backoff period count uniformly from `[0, 2^BE - 1]`.
pub fn draw<Rng: RngCore>(rng: &mut Rng, backoff_exponent: u8) -> u32 {
    // random(2^BE - 1) in the standard includes its bound, hence the + 1
    let bound = max_backoff_periods(backoff_exponent) as u64 + 1;
    (rng.next_u32() as u64 % bound) as u32
}
