//! Feature registers reachable through the get/set features commands.

/// Feature register addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Register {
    /// Block protection bits
    BlockLock = 0xA0,
    /// Configuration, including ECC enable
    Config = 0xB0,
    /// Status. Read only, WEL is changed with the write enable/disable commands
    Status = 0xC0,
    /// Die select on stacked devices
    DieSelect = 0xD0,
}

impl Register {
    pub fn address(self) -> u8 {
        self as u8
    }
}

/// Block lock register bits
pub mod block_lock {
    /// Block register write disable
    pub const BRWD: u8 = 1 << 7;
    /// Block protect bits BP3..BP0
    pub const BP: u8 = 0b0111_1000;
    /// Top/bottom protect select
    pub const TB: u8 = 1 << 2;
    /// WP#/HOLD# disable
    pub const WP_D: u8 = 1 << 1;
}

/// Configuration register bits
pub mod config {
    /// CFG2, CFG1 and CFG0 mode select
    pub const CFG: u8 = (1 << 7) | (1 << 6) | (1 << 1);
    /// Lock tight enable
    pub const LOT_EN: u8 = 1 << 5;
    /// Internal ECC enable
    pub const ECC_EN: u8 = 1 << 4;
}

/// Die select register bits
pub mod die_select {
    pub const DS0: u8 = 1 << 6;
}

/// Possible ECC status values after performing a read operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ECCStatus {
    /// No errors detected or corrected
    Ok,
    /// 1 to 3 errors detected and corrected
    Corrected,
    /// 4 or more errors detected and corrected, close to the correction limit.
    /// The block should be refreshed.
    Failing,
    /// Errors detected but not corrected
    Failed,
}

/// Snapshot of the status register.
///
/// Only meaningful for the read it came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Status(u8);

impl Status {
    /// Operation in progress
    pub const OIP: u8 = 1 << 0;
    /// Write enable latch
    pub const WEL: u8 = 1 << 1;
    /// Erase fail
    pub const E_FAIL: u8 = 1 << 2;
    /// Program fail
    pub const P_FAIL: u8 = 1 << 3;
    /// ECC status bits
    pub const ECC: u8 = 0b0111_0000;
    /// Cache read busy
    pub const CRBSY: u8 = 1 << 7;

    pub fn from_bits(bits: u8) -> Self {
        Status(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_busy(&self) -> bool {
        self.0 & Self::OIP != 0
    }

    pub fn write_enabled(&self) -> bool {
        self.0 & Self::WEL != 0
    }

    pub fn erase_failed(&self) -> bool {
        self.0 & Self::E_FAIL != 0
    }

    pub fn program_failed(&self) -> bool {
        self.0 & Self::P_FAIL != 0
    }

    pub fn cache_read_busy(&self) -> bool {
        self.0 & Self::CRBSY != 0
    }

    /// Decode the ECC bits of the last page read.
    /// Reserved encodings are reported as [ECCStatus::Failed].
    pub fn ecc(&self) -> ECCStatus {
        match (self.0 & Self::ECC) >> 4 {
            0b000 => ECCStatus::Ok,
            0b001 => ECCStatus::Corrected,
            0b011 | 0b101 => ECCStatus::Failing,
            _ => ECCStatus::Failed,
        }
    }
}

impl From<u8> for Status {
    fn from(bits: u8) -> Self {
        Status(bits)
    }
}
