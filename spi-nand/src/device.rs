use core::fmt::Debug;

use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use embedded_nand::{
    check_erase, check_read, check_write, AddressConversions, BlockIndex, ByteAddress, ErrorType,
    NandFlash, PhysicalAddress,
};

use crate::{
    cmd_blocking::SpiNandBlocking, error::SpiFlashError, Config, JedecID, PollConfig, Register,
    SpiNand, Status,
};

/// Concrete type that implements all the flash device features.
///
/// Owns the SPI device, a delay provider for busy polling and the description
/// of the flash device. All commands go through the [SpiNandBlocking] trait
/// implemented by D, which can be configured by the [crate::SpiNand] constants
/// or by overriding its default functions.
///
/// [SpiNandDevice] implements the [embedded_nand::NandFlash] trait, a linear view
/// of the data area which a flash translation layer (FTL) / bad block management
/// (BBM) / wear levelling algorithm or file system can use.
///
/// Operations take `&mut self`, so only one can be in flight on a device at a time.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiNandDevice<SPI, DLY, D, const N: usize> {
    pub spi: SPI,
    pub delay: DLY,
    pub device: D,
    pub config: Config,
}

// Manually implement Debug to avoid bounds on SPI and DLY
impl<SPI, DLY, D, const N: usize> Debug for SpiNandDevice<SPI, DLY, D, N>
where
    D: Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpiNandDevice")
            .field("device", &self.device)
            .field("config", &self.config)
            .finish()
    }
}

impl<SPI, DLY, D: SpiNand<N>, const N: usize> SpiNandDevice<SPI, DLY, D, N> {
    /// Create a new [SpiNandDevice] with timing derived from the device's
    /// maximum operation times.
    pub fn new(spi: SPI, delay: DLY, device: D) -> Self {
        Self::with_config(spi, delay, device, Config::for_device::<D, N>())
    }

    pub fn with_config(spi: SPI, delay: DLY, device: D, config: Config) -> Self {
        SpiNandDevice {
            spi,
            delay,
            device,
            config,
        }
    }

    /// Give back the SPI device and delay provider
    pub fn release(self) -> (SPI, DLY) {
        (self.spi, self.delay)
    }
}

impl<SPI: SpiDevice, DLY: DelayNs, D: SpiNandBlocking<SPI, N>, const N: usize>
    SpiNandDevice<SPI, DLY, D, N>
{
    /// Map a logical data address to block, page, plane and column.
    ///
    /// Spare areas are not addressable this way.
    pub fn to_physical(&self, address: u32) -> Result<PhysicalAddress, SpiFlashError<SPI::Error>> {
        if address >= D::CAPACITY {
            debug!("Address {} beyond capacity {}", address, D::CAPACITY);
            return Err(SpiFlashError::AddressOutOfRange);
        }
        Ok(PhysicalAddress::from_byte_address(
            ByteAddress::new(address),
            D::PAGE_SIZE,
            D::PAGES_PER_BLOCK,
            D::PLANES,
        ))
    }

    /// Wait for power on, reset the device and check its ID
    pub fn init(&mut self) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        let id = self
            .device
            .init(&mut self.spi, &mut self.delay, &self.config)?;
        info!(
            "Found NAND flash {:02X} {:02X}",
            id.manufacturer(),
            id.device()
        );
        Ok(id)
    }

    /// Reset the device and wait until it is ready
    pub fn reset(&mut self) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device
            .reset(&mut self.spi, &mut self.delay, &self.config)
    }

    /// Read the manufacturer and device ID
    pub fn read_id(&mut self) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        self.device.read_id_cmd(&mut self.spi)
    }

    /// Read the ID and check it matches the device
    pub fn verify_id(&mut self) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        let id = self.read_id()?;
        self.device.verify_id(id)
    }

    pub fn get_feature(&mut self, register: Register) -> Result<u8, SpiFlashError<SPI::Error>> {
        self.device.get_feature_cmd(&mut self.spi, register)
    }

    /// Write a feature register. [Register::Status] is read only.
    pub fn set_feature(
        &mut self,
        register: Register,
        value: u8,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device.set_feature_cmd(&mut self.spi, register, value)
    }

    pub fn read_status(&mut self) -> Result<Status, SpiFlashError<SPI::Error>> {
        self.device.read_status(&mut self.spi)
    }

    pub fn check_busy(&mut self) -> Result<bool, SpiFlashError<SPI::Error>> {
        self.device.is_busy(&mut self.spi)
    }

    pub fn wait_until_ready(&mut self, poll: PollConfig) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device
            .wait_until_ready(&mut self.spi, &mut self.delay, poll)
    }

    /// Read `buf.len()` bytes from the page of `address`, starting at its column.
    /// May run on into the spare area, up to the end of the page.
    pub fn page_read(
        &mut self,
        address: &PhysicalAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let poll = self.config.read;
        self.device
            .page_read(&mut self.spi, &mut self.delay, poll, address, buf)
    }

    /// Program `data` into the page of `address`, starting at its column.
    /// The block must be erased first.
    pub fn page_program(
        &mut self,
        address: &PhysicalAddress,
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let poll = self.config.program;
        self.device
            .page_program(&mut self.spi, &mut self.delay, poll, address, data)
    }

    /// Erase the block containing `address`
    pub fn block_erase(
        &mut self,
        address: &PhysicalAddress,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let poll = self.config.erase;
        self.device
            .erase_block(&mut self.spi, &mut self.delay, poll, address.block())
    }

    pub fn spare_read(
        &mut self,
        address: &PhysicalAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let poll = self.config.read;
        self.device
            .spare_read(&mut self.spi, &mut self.delay, poll, address, buf)
    }

    pub fn spare_program(
        &mut self,
        address: &PhysicalAddress,
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let poll = self.config.program;
        self.device
            .spare_program(&mut self.spi, &mut self.delay, poll, address, data)
    }

    /// Unlock every block for program and erase
    pub fn disable_block_protection(&mut self) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device.disable_block_protection(&mut self.spi)
    }

    pub fn set_ecc_enabled(&mut self, enabled: bool) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device.set_ecc_enabled(&mut self.spi, enabled)
    }

    pub fn select_die(&mut self, die: u8) -> Result<(), SpiFlashError<SPI::Error>> {
        self.device.select_die(&mut self.spi, die)
    }
}

impl<SPI: SpiDevice, DLY, D, const N: usize> ErrorType for SpiNandDevice<SPI, DLY, D, N> {
    type Error = SpiFlashError<SPI::Error>;
}

impl<SPI: SpiDevice, DLY: DelayNs, D: SpiNandBlocking<SPI, N>, const N: usize> NandFlash
    for SpiNandDevice<SPI, DLY, D, N>
{
    const READ_SIZE: usize = D::READ_SIZE as usize;
    const PAGE_SIZE: usize = D::PAGE_SIZE as usize;
    const BLOCK_COUNT: usize = D::BLOCK_COUNT as usize;
    const ERASE_SIZE: usize = D::BLOCK_SIZE as usize;
    const PAGES_PER_BLOCK: usize = D::PAGES_PER_BLOCK as usize;
    const WRITE_SIZE: usize = 1;

    fn read(&mut self, mut offset: u32, mut bytes: &mut [u8]) -> Result<(), Self::Error> {
        trace!("Reading {} bytes from offset {}", bytes.len(), offset);
        check_read(self, offset, bytes.len())?;

        // One page read per page touched, the first may start mid page
        while !bytes.is_empty() {
            let address = self.to_physical(offset)?;
            let remaining = D::PAGE_SIZE as usize - address.column().as_u16() as usize;
            let len = bytes.len().min(remaining);
            let (chunk, rest) = core::mem::take(&mut bytes).split_at_mut(len);
            self.page_read(&address, chunk)?;
            bytes = rest;
            offset += len as u32;
        }
        Ok(())
    }

    fn capacity(&self) -> u32 {
        D::CAPACITY
    }

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        trace!("Erasing from {} to {}", from, to);
        check_erase(self, from, to)?;

        let start_block = Self::raw_byte_to_block_index(from);
        let end_block = Self::raw_byte_to_block_index(to);
        for block in start_block.as_u16()..end_block.as_u16() {
            self.erase_block(BlockIndex::new(block))?;
        }
        Ok(())
    }

    fn erase_block(&mut self, block: BlockIndex) -> Result<(), Self::Error> {
        trace!("Erasing block {}", block.as_u16());
        if block.as_u16() as u32 >= D::BLOCK_COUNT {
            return Err(SpiFlashError::OutOfBounds);
        }
        let poll = self.config.erase;
        self.device
            .erase_block(&mut self.spi, &mut self.delay, poll, block)
    }

    fn write(&mut self, mut offset: u32, mut bytes: &[u8]) -> Result<(), Self::Error> {
        trace!("Writing {} bytes to offset {}", bytes.len(), offset);
        check_write(self, offset, bytes.len())?;

        while !bytes.is_empty() {
            let address = self.to_physical(offset)?;
            let remaining = D::PAGE_SIZE as usize - address.column().as_u16() as usize;
            let (chunk, rest) = bytes.split_at(bytes.len().min(remaining));
            self.page_program(&address, chunk)?;
            bytes = rest;
            offset += chunk.len() as u32;
        }
        Ok(())
    }
}
