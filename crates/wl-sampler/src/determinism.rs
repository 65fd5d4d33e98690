use wl_core::derive_substream_seed;

/// Derives the deterministic seed for the move proposal at a sampling step.
///
/// Seeds are pure functions of the monotonic step counter, so a resumed run
/// continues the same substreams as an uninterrupted one.
pub fn move_seed(master_seed: u64, step: u64) -> u64 {
    derive_substream_seed(master_seed, step)
}

/// Derives the deterministic seed for the acceptance draw at a sampling step.
pub fn acceptance_seed(master_seed: u64, step: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0xACC3_97AC_C397_ACC3, step)
}

/// Derives the deterministic seed for a bootstrap move attempt.
pub fn bootstrap_seed(master_seed: u64, attempt: u64) -> u64 {
    derive_substream_seed(master_seed ^ 0xB007_B007_B007_B007, attempt)
}
