#[cfg(test)]
mod test_builder;

/// Fixed seed for deterministic test builds.
pub const TEST_SEED: u64 = 128;
