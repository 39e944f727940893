//! Join code allocation shared by every storage backend.

use rand::{Rng, rng};

/// Smallest four digit join code.
pub const DEFAULT_CODE_MIN: u16 = 1000;
/// Largest four digit join code.
pub const DEFAULT_CODE_MAX: u16 = 9999;
/// Sampling attempts before giving up on finding a free code.
pub const DEFAULT_CODE_ATTEMPTS: u32 = 64;

/// Bounded integer range join codes are sampled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomCodeSpace {
    min: u16,
    max: u16,
    max_attempts: u32,
}

impl RoomCodeSpace {
    /// Build a code space; the bounds are swapped when given in reverse order
    /// and at least one attempt is always made.
    pub fn new(min: u16, max: u16, max_attempts: u32) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        Self {
            min,
            max,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw a uniformly distributed candidate code.
    pub fn sample(&self) -> u16 {
        rng().random_range(self.min..=self.max)
    }

    /// Number of sampling attempts allowed per room creation.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Number of distinct codes in the range.
    pub fn capacity(&self) -> usize {
        usize::from(self.max - self.min) + 1
    }

    /// Whether `code` lies inside the range.
    pub fn contains(&self, code: u16) -> bool {
        (self.min..=self.max).contains(&code)
    }
}

impl Default for RoomCodeSpace {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_MIN, DEFAULT_CODE_MAX, DEFAULT_CODE_ATTEMPTS)
    }
}
