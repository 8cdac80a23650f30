//! Tuning parameters for the 1-D reduction template.
//!
//! Parameters are supplied by the caller (or the environment), never derived
//! from the input.

use bon::bon;
use snafu::ensure;

use crate::{InvalidConfigSnafu, Result};

/// Vector width V, group size G and group count K.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TuningParams {
    /// Elements loaded per memory transaction in the partial scan.
    pub vector_width: usize,
    /// Threads per group. Must be a power of two.
    pub group_size: usize,
    /// Groups launched by the partial kernel.
    pub group_count: usize,
}

impl Default for TuningParams {
    fn default() -> Self {
        Self { vector_width: 1, group_size: 256, group_count: 64 }
    }
}

#[bon]
impl TuningParams {
    /// Create tuning parameters with builder pattern.
    #[builder]
    pub fn builder(
        #[builder(default = 1)] vector_width: usize,
        #[builder(default = 256)] group_size: usize,
        #[builder(default = 64)] group_count: usize,
    ) -> Self {
        Self { vector_width, group_size, group_count }
    }

    /// Create parameters from environment variables.
    ///
    /// # Environment Variables
    ///
    /// * `REDUCTOR_VWIDTH` - Vector width (default: 1)
    /// * `REDUCTOR_GROUP_SIZE` - Threads per group (default: 256)
    /// * `REDUCTOR_GROUPS` - Partial-kernel group count (default: 64)
    pub fn from_env() -> Self {
        let vector_width = std::env::var("REDUCTOR_VWIDTH").ok().and_then(|s| s.parse().ok()).unwrap_or(1);
        let group_size = std::env::var("REDUCTOR_GROUP_SIZE").ok().and_then(|s| s.parse().ok()).unwrap_or(256);
        let group_count = std::env::var("REDUCTOR_GROUPS").ok().and_then(|s| s.parse().ok()).unwrap_or(64);

        Self { vector_width, group_size, group_count }
    }

    /// Reject parameters the tree reducer or scan loop cannot honour.
    ///
    /// A group size that is not a power of two makes the halving sequence skip
    /// slots, silently dropping partial results.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.group_size.is_power_of_two(),
            InvalidConfigSnafu { reason: format!("group size {} is not a power of two", self.group_size) }
        );
        ensure!(self.group_count > 0, InvalidConfigSnafu { reason: "group count must be positive" });
        ensure!(self.vector_width > 0, InvalidConfigSnafu { reason: "vector width must be positive" });
        Ok(())
    }

    /// Threads launched by the partial kernel (G * K).
    pub fn partial_threads(&self) -> usize {
        self.group_size * self.group_count
    }

    /// Largest extent the generated scan loops can walk.
    ///
    /// Loop counters are `unsigned int` and step by `G * K`; the last step of
    /// a thread lands at most `G * K - 1` past the final element and must
    /// still fit in 32 bits, or the counter wraps below `N` and the loop never
    /// terminates.
    pub fn max_extent(&self) -> usize {
        (u32::MAX as usize).saturating_sub(self.partial_threads().saturating_sub(1))
    }
}
