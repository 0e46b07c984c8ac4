#![no_std]
#[cfg(test)]
extern crate std;

// Must be first to share macros across crate
pub(crate) mod fmt;

pub mod cmd_blocking;
mod config;
mod device;
pub mod error;
#[cfg(test)]
mod mock;
pub mod register;

pub use config::{Config, PollConfig};
pub use device::SpiNandDevice;
pub use register::{ECCStatus, Register, Status};

/// Core trait that a NAND flash device must implement.
///
/// Enables use of the [crate::cmd_blocking::SpiNandBlocking] trait.
///
/// `N` is the size of the data area of a page. At minimum requires the
/// [SpiNand::PAGES_PER_BLOCK], [SpiNand::BLOCK_COUNT] and [SpiNand::SPARE_SIZE]
/// constants to define the size and layout of the device, the expected identity,
/// and the maximum operation times used to bound busy polling.
///
/// Default command implementations in [crate::cmd_blocking::SpiNandBlocking]
/// can be overriden by changing the COMMAND constants.
pub trait SpiNand<const N: usize> {
    // Device layout
    /// The size of the data area of a page in bytes
    const PAGE_SIZE: u32 = N as u32;
    /// The size of the spare area following the data area of each page
    const SPARE_SIZE: u32;
    /// Data plus spare area, the size of the device cache register
    const FULL_PAGE_SIZE: u32 = Self::PAGE_SIZE + Self::SPARE_SIZE;
    /// The number of pages in a block
    const PAGES_PER_BLOCK: u32;
    /// The number of blocks in the device
    const BLOCK_COUNT: u32;
    /// Number of planes blocks are interleaved across.
    /// For more than one plane the plane select bit is sent above the column address.
    const PLANES: u32 = 1;
    /// The size of the data area of a block in bytes
    const BLOCK_SIZE: u32 = Self::PAGE_SIZE * Self::PAGES_PER_BLOCK;
    /// The total data capacity of the device in bytes
    const CAPACITY: u32 = Self::PAGE_SIZE * Self::PAGES_PER_BLOCK * Self::BLOCK_COUNT;
    /// Minimum number of bytes the storage peripheral can read
    const READ_SIZE: u32 = 1;

    // Identity
    /// JEDEC manufacturer ID returned by the read ID command
    const JEDEC_MANUFACTURER_ID: u8;
    /// Device ID returned by the read ID command
    const JEDEC_DEVICE_ID: u8;

    // Timing, in microseconds
    /// Time to wait after power on or reset before the device accepts commands
    const POWER_ON_RESET_US: u32;
    /// Maximum time for a reset to complete
    const RESET_TIME_MAX_US: u32;
    /// Maximum time to transfer a page from the array to the cache register
    const READ_TIME_MAX_US: u32;
    /// Maximum time to program the cache register into a page
    const PROGRAM_TIME_MAX_US: u32;
    /// Maximum time to erase a block
    const ERASE_TIME_MAX_US: u32;

    // Commands
    /// The command to reset the flash device
    const RESET_COMMAND: u8 = 0xFF;
    /// The command to read the manufacturer and device ID
    const JEDEC_COMMAND: u8 = 0x9F;
    /// Command to read a feature register
    const GET_FEATURES_COMMAND: u8 = 0x0F;
    /// Command to write a feature register
    const SET_FEATURES_COMMAND: u8 = 0x1F;
    /// Command to read a page into the device cache register
    const PAGE_READ_COMMAND: u8 = 0x13;
    /// Command to read bytes from the device cache register
    const PAGE_READ_BUFFER_COMMAND: u8 = 0x03;
    /// Enable writing to the flash device, including erasing
    const WRITE_ENABLE_COMMAND: u8 = 0x06;
    /// Disable writing to the flash device
    const WRITE_DISABLE_COMMAND: u8 = 0x04;
    /// Command to erase a block of flash memory
    const BLOCK_ERASE_COMMAND: u8 = 0xD8;
    /// Command to write bytes to the device cache register, resetting current values (0xFF)
    const PROGRAM_LOAD_COMMAND: u8 = 0x02;
    /// Command to program the device cache register to a page
    const PROGRAM_EXECUTE_COMMAND: u8 = 0x10;
}

/// Manufacturer and device ID of a flash device, as returned by the read ID command.
/// See https://www.jedec.org/standards-documents/docs/jep-106ab for a list of JEDEC IDs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JedecID {
    manufacturer: u8,
    device: u8,
}

impl JedecID {
    pub fn new(manufacturer: u8, device: u8) -> Self {
        JedecID {
            manufacturer,
            device,
        }
    }

    pub fn manufacturer(&self) -> u8 {
        self.manufacturer
    }

    pub fn device(&self) -> u8 {
        self.device
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for JedecID {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "JedecID(manufacturer: {:02X}, device: {:02X})",
            self.manufacturer,
            self.device
        );
    }
}
