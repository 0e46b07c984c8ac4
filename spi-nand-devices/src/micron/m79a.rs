use spi_nand::SpiNand;

/// Concrete type that describes the M79A series of Micron SPI NAND flash devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MT29F<const B: u32, const ID: u8>();

/// Specific flash device with block count and device ID
pub type MT29F2G01ABAGD = MT29F<2048, 0x24>;

impl<const B: u32, const ID: u8> MT29F<B, ID> {
    /// Creates a new instance of the MT29F flash device.
    pub fn new() -> Self {
        Self()
    }
}

impl<const B: u32, const ID: u8> Default for MT29F<B, ID> {
    fn default() -> Self {
        Self::new()
    }
}

// 2048 + 128 byte pages, blocks interleaved across two planes
impl<const B: u32, const ID: u8> SpiNand<2048> for MT29F<B, ID> {
    const SPARE_SIZE: u32 = 128;
    const PAGES_PER_BLOCK: u32 = 64;
    const BLOCK_COUNT: u32 = B;
    const PLANES: u32 = 2;
    const JEDEC_MANUFACTURER_ID: u8 = 0x2C;
    const JEDEC_DEVICE_ID: u8 = ID;
    const POWER_ON_RESET_US: u32 = 1250;
    const RESET_TIME_MAX_US: u32 = 500;
    const READ_TIME_MAX_US: u32 = 115;
    const PROGRAM_TIME_MAX_US: u32 = 600;
    const ERASE_TIME_MAX_US: u32 = 10_000;
}

// Implement blocking trait
mod blocking {
    use super::MT29F;
    use embedded_hal::spi::SpiDevice;
    use spi_nand::cmd_blocking::SpiNandBlocking;

    impl<SPI: SpiDevice, const B: u32, const ID: u8> SpiNandBlocking<SPI, 2048> for MT29F<B, ID> {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_nand::{BlockIndex, ByteAddress, PhysicalAddress};
    use spi_nand::Config;
    use test_log::test;

    type Chip = MT29F2G01ABAGD;

    #[test]
    fn geometry() {
        assert_eq!(Chip::FULL_PAGE_SIZE, 2176);
        assert_eq!(Chip::BLOCK_SIZE, 128 * 1024);
        assert_eq!(Chip::CAPACITY, 256 * 1024 * 1024);
    }

    #[test]
    fn timing() {
        let config = Config::for_device::<Chip, 2048>();
        assert_eq!(config.power_on_reset_us, 1250);
        assert!(config.read.worst_case_us() >= Chip::READ_TIME_MAX_US as u64);
        assert!(config.program.worst_case_us() >= Chip::PROGRAM_TIME_MAX_US as u64);
        assert!(config.erase.worst_case_us() >= Chip::ERASE_TIME_MAX_US as u64);
    }

    #[test]
    fn odd_blocks_on_second_plane() {
        let address = |offset| {
            PhysicalAddress::from_byte_address(
                ByteAddress::new(offset),
                Chip::PAGE_SIZE,
                Chip::PAGES_PER_BLOCK,
                Chip::PLANES,
            )
        };
        let even = address(2 * Chip::BLOCK_SIZE + 10);
        assert_eq!(even.block(), BlockIndex::new(2));
        assert_eq!(even.wire_column().as_u16(), 10);
        let odd = address(3 * Chip::BLOCK_SIZE + 10);
        assert_eq!(odd.plane(), 1);
        assert_eq!(odd.wire_column().as_u16(), 0x1000 | 10);
    }
}
