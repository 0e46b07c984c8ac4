use crate::SpiNand;

/// Bounds for one busy poll: at most `max_attempts` further status reads after
/// the first, with `interval_us` between them.
///
/// Worst case latency is `max_attempts * interval_us` plus bus time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval_us: u32,
}

impl PollConfig {
    pub const fn new(max_attempts: u32, interval_us: u32) -> Self {
        PollConfig {
            max_attempts,
            interval_us,
        }
    }

    /// Enough attempts to wait out `max_time_us`, with one spare.
    pub const fn covering(max_time_us: u32, interval_us: u32) -> Self {
        let interval_us = if interval_us == 0 { 1 } else { interval_us };
        PollConfig {
            max_attempts: max_time_us.div_ceil(interval_us) + 1,
            interval_us,
        }
    }

    /// Upper bound on the time spent sleeping in one poll
    pub const fn worst_case_us(&self) -> u64 {
        self.max_attempts as u64 * self.interval_us as u64
    }
}

/// Runtime timing of a [crate::SpiNandDevice].
///
/// [Config::for_device] derives every poll from the device's maximum operation
/// times. Override fields to trade latency against bus traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// Wait after power on and after every reset command
    pub power_on_reset_us: u32,
    pub reset: PollConfig,
    /// Page read, array to cache register
    pub read: PollConfig,
    pub program: PollConfig,
    pub erase: PollConfig,
}

impl Config {
    const READ_POLL_US: u32 = 10;
    const PROGRAM_POLL_US: u32 = 50;
    const ERASE_POLL_US: u32 = 500;

    pub fn for_device<D: SpiNand<N>, const N: usize>() -> Self {
        Config {
            power_on_reset_us: D::POWER_ON_RESET_US,
            reset: PollConfig::covering(D::RESET_TIME_MAX_US, Self::READ_POLL_US),
            read: PollConfig::covering(D::READ_TIME_MAX_US, Self::READ_POLL_US),
            program: PollConfig::covering(D::PROGRAM_TIME_MAX_US, Self::PROGRAM_POLL_US),
            erase: PollConfig::covering(D::ERASE_TIME_MAX_US, Self::ERASE_POLL_US),
        }
    }
}
