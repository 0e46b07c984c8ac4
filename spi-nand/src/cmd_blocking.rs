use embedded_hal::{delay::DelayNs, spi::SpiDevice};
use embedded_nand::{BlockIndex, ColumnAddress, NandFlashError, PageIndex, PhysicalAddress};
use utils::{spi_write, spi_write_read, spi_write_then_data};

use crate::{
    error::SpiFlashError,
    register::{block_lock, config, die_select},
    Config, JedecID, PollConfig, Register, SpiNand, Status,
};

/// Blocking SPI NAND flash trait.
/// Contains the low level, single SPI transaction commands and the compound
/// operations built from them: bounded busy polling, write enable bracketing,
/// page read, page program and block erase with fail bit checks.
///
/// Every command is one [SpiDevice] transaction, so chip select is asserted
/// and released by the SPI implementation around each of them. The device keeps
/// its cache register between transactions.
///
/// The default implementations follow the common SPI NAND command set.
/// Look to make changes to the [SpiNand] trait first to change the default behavior.
/// If this isn't possible, override the default function(s).
pub trait SpiNandBlocking<SPI: SpiDevice, const N: usize>: SpiNand<N> {
    // ============= Commands =============

    /// Issue a reset command to the flash device
    fn reset_cmd(&self, spi: &mut SPI) -> Result<(), SpiFlashError<SPI::Error>> {
        trace!("Reset");
        spi_write(spi, &[Self::RESET_COMMAND])
    }

    /// Read the manufacturer and device ID. Sent with one dummy byte.
    fn read_id_cmd(&self, spi: &mut SPI) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        let mut buf = [0; 2];
        spi_write_read(spi, &[Self::JEDEC_COMMAND, 0], &mut buf)?;
        trace!("Read ID {:02X} {:02X}", buf[0], buf[1]);
        Ok(JedecID::new(buf[0], buf[1]))
    }

    /// Read a feature register
    fn get_feature_cmd(
        &self,
        spi: &mut SPI,
        register: Register,
    ) -> Result<u8, SpiFlashError<SPI::Error>> {
        let mut buf = [0];
        spi_write_read(
            spi,
            &[Self::GET_FEATURES_COMMAND, register.address()],
            &mut buf,
        )?;
        Ok(buf[0])
    }

    /// Write a feature register.
    ///
    /// The status register is read only and is rejected without touching the bus.
    fn set_feature_cmd(
        &self,
        spi: &mut SPI,
        register: Register,
        value: u8,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if register == Register::Status {
            return Err(SpiFlashError::RegAddressInvalid);
        }
        trace!("Set feature {:02X} = {:02X}", register.address(), value);
        spi_write(spi, &[Self::SET_FEATURES_COMMAND, register.address(), value])
    }

    /// Load a page from the array into the device cache register
    fn page_read_cmd(
        &self,
        spi: &mut SPI,
        address: PageIndex,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let [a2, a1, a0] = address.to_row_bytes();
        spi_write(spi, &[Self::PAGE_READ_COMMAND, a2, a1, a0])
    }

    /// Read bytes from the device cache register starting from column address.
    /// Sent with one dummy byte after the address.
    fn page_read_buffer_cmd(
        &self,
        spi: &mut SPI,
        ca: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let [c1, c0] = ca.to_bytes();
        spi_write_read(spi, &[Self::PAGE_READ_BUFFER_COMMAND, c1, c0, 0], buf)
    }

    /// Enable writing to the flash device
    fn write_enable_cmd(&self, spi: &mut SPI) -> Result<(), SpiFlashError<SPI::Error>> {
        spi_write(spi, &[Self::WRITE_ENABLE_COMMAND])
    }

    /// Disable writing to the flash device
    fn write_disable_cmd(&self, spi: &mut SPI) -> Result<(), SpiFlashError<SPI::Error>> {
        spi_write(spi, &[Self::WRITE_DISABLE_COMMAND])
    }

    /// Erase a block of flash memory. The page bits of the row address are zero.
    fn erase_block_cmd(
        &self,
        spi: &mut SPI,
        block_address: BlockIndex,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let [a2, a1, a0] =
            PageIndex::from_block_address(block_address, Self::PAGES_PER_BLOCK).to_row_bytes();
        spi_write(spi, &[Self::BLOCK_ERASE_COMMAND, a2, a1, a0])
    }

    /// Write bytes to the device cache register.
    /// Command and data go out under a single chip select.
    ///
    /// This will reset the cache register to 0xFF
    ///
    /// Use [SpiNandBlocking::write_enable_cmd] to enable writing before this command
    ///
    /// Use [SpiNandBlocking::program_execute_cmd] to write the cache register to a page
    fn program_load_cmd(
        &self,
        spi: &mut SPI,
        ca: ColumnAddress,
        buf: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let [c1, c0] = ca.to_bytes();
        spi_write_then_data(spi, &[Self::PROGRAM_LOAD_COMMAND, c1, c0], buf)
    }

    /// Write the device cache register to a page
    ///
    /// Use [SpiNandBlocking::wait_until_ready] to wait for the write to complete
    ///
    /// Check [Status::program_failed] to see if the write failed
    fn program_execute_cmd(
        &self,
        spi: &mut SPI,
        address: PageIndex,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let [a2, a1, a0] = address.to_row_bytes();
        spi_write(spi, &[Self::PROGRAM_EXECUTE_COMMAND, a2, a1, a0])
    }

    // ============= Status functions ============
    /// Read the status register
    fn read_status(&self, spi: &mut SPI) -> Result<Status, SpiFlashError<SPI::Error>> {
        Ok(Status::from_bits(
            self.get_feature_cmd(spi, Register::Status)?,
        ))
    }

    /// Check if the operation in progress flag is set
    fn is_busy(&self, spi: &mut SPI) -> Result<bool, SpiFlashError<SPI::Error>> {
        Ok(self.read_status(spi)?.is_busy())
    }

    /// Poll the status register until the device is ready.
    ///
    /// Reads the status once and returns straight away if the device is idle.
    /// Otherwise sleeps `poll.interval_us` and reads again, at most
    /// `poll.max_attempts` times, before giving up with [SpiFlashError::Busy].
    fn wait_until_ready<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let mut status = self.read_status(spi)?;
        let mut attempts = 0;
        while status.is_busy() {
            if attempts == poll.max_attempts {
                debug!("Still busy after {} polls", attempts);
                return Err(SpiFlashError::Busy);
            }
            delay.delay_us(poll.interval_us);
            status = self.read_status(spi)?;
            attempts += 1;
        }
        trace!("Ready after {} polls", attempts);
        Ok(())
    }

    /// Run `f` with the write enable latch set.
    ///
    /// Write disable is always sent afterwards, including when write enable or
    /// `f` failed. The first error wins.
    fn with_write_enabled<R>(
        &self,
        spi: &mut SPI,
        f: impl FnOnce(&mut SPI) -> Result<R, SpiFlashError<SPI::Error>>,
    ) -> Result<R, SpiFlashError<SPI::Error>> {
        let result = match self.write_enable_cmd(spi) {
            Ok(()) => f(spi),
            Err(e) => Err(e),
        };
        let disabled = self.write_disable_cmd(spi);
        let value = result?;
        disabled?;
        Ok(value)
    }

    // ============= Register functions ============
    /// Clear the block protect and top/bottom bits, unlocking the whole array
    fn disable_block_protection(&self, spi: &mut SPI) -> Result<(), SpiFlashError<SPI::Error>> {
        let reg = self.get_feature_cmd(spi, Register::BlockLock)?;
        self.set_feature_cmd(
            spi,
            Register::BlockLock,
            reg & !(block_lock::BP | block_lock::TB),
        )
    }

    /// Turn the internal ECC engine on or off
    fn set_ecc_enabled(
        &self,
        spi: &mut SPI,
        enabled: bool,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let reg = self.get_feature_cmd(spi, Register::Config)?;
        let reg = if enabled {
            reg | config::ECC_EN
        } else {
            reg & !config::ECC_EN
        };
        self.set_feature_cmd(spi, Register::Config, reg)
    }

    /// Select the active die on stacked devices
    fn select_die(&self, spi: &mut SPI, die: u8) -> Result<(), SpiFlashError<SPI::Error>> {
        let reg = self.get_feature_cmd(spi, Register::DieSelect)?;
        let reg = if die & 1 == 1 {
            reg | die_select::DS0
        } else {
            reg & !die_select::DS0
        };
        self.set_feature_cmd(spi, Register::DieSelect, reg)
    }

    // ============= Device functions =============
    /// Reset the device and wait for it to become ready.
    ///
    /// A failed reset command is [SpiFlashError::ResetFailed], a device that
    /// stays busy is [SpiFlashError::Busy].
    fn reset<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        config: &Config,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        let sent = self.reset_cmd(spi);
        delay.delay_us(config.power_on_reset_us);
        if let Err(e) = sent {
            debug!("Reset command failed: {:?}", e.kind());
            return Err(SpiFlashError::ResetFailed);
        }
        self.wait_until_ready(spi, delay, config.reset)
    }

    /// Check an ID against the expected manufacturer and device ID
    fn verify_id(&self, id: JedecID) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        if id.manufacturer() != Self::JEDEC_MANUFACTURER_ID || id.device() != Self::JEDEC_DEVICE_ID
        {
            warn!(
                "Expected ID {:02X} {:02X}, read {:02X} {:02X}",
                Self::JEDEC_MANUFACTURER_ID,
                Self::JEDEC_DEVICE_ID,
                id.manufacturer(),
                id.device()
            );
            return Err(SpiFlashError::WrongId(id));
        }
        Ok(id)
    }

    /// Bring up a freshly powered device: wait for power on, reset, check the ID.
    ///
    /// Any failure to reset, including failing to read the ID afterwards,
    /// is [SpiFlashError::ResetFailed].
    fn init<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        config: &Config,
    ) -> Result<JedecID, SpiFlashError<SPI::Error>> {
        delay.delay_us(config.power_on_reset_us);
        if let Err(e) = self.reset(spi, delay, config) {
            warn!("Reset during init failed: {:?}", e.kind());
            return Err(SpiFlashError::ResetFailed);
        }
        let id = self.read_id_cmd(spi).map_err(|e| {
            warn!("Read ID during init failed: {:?}", e.kind());
            SpiFlashError::<SPI::Error>::ResetFailed
        })?;
        self.verify_id(id)
    }

    // ============= RWE functions =============
    /// Read `buf.len()` bytes of a page, starting at the column of `address`
    fn page_read<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        self.read_page_column(spi, delay, poll, address, address.column(), buf)
    }

    /// Read the spare area of the page of `address`
    fn spare_read<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if buf.len() > Self::SPARE_SIZE as usize {
            return Err(SpiFlashError::ReadFailed);
        }
        let column = ColumnAddress::new(Self::PAGE_SIZE as u16);
        self.read_page_column(spi, delay, poll, address, column, buf)
    }

    /// Load the page of `address` into the cache register, wait for it, then
    /// read `buf.len()` bytes from `column`.
    ///
    /// Requests running past the end of the cache register fail before any
    /// command is sent. Every failure is [SpiFlashError::ReadFailed].
    fn read_page_column<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        column: ColumnAddress,
        buf: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if buf.len() > Self::FULL_PAGE_SIZE as usize
            || column.as_u16() as usize + buf.len() > Self::FULL_PAGE_SIZE as usize
        {
            debug!(
                "Read of {} bytes at column {} exceeds page",
                buf.len(),
                column.as_u16()
            );
            return Err(SpiFlashError::ReadFailed);
        }
        trace!(
            "Read {} bytes from row {} column {}",
            buf.len(),
            address.row_address().as_u32(),
            column.as_u16()
        );
        let read_failed = |e: SpiFlashError<SPI::Error>| -> SpiFlashError<SPI::Error> {
            debug!("Page read failed: {:?}", e.kind());
            SpiFlashError::ReadFailed
        };
        self.page_read_cmd(spi, address.row_address())
            .map_err(read_failed)?;
        self.wait_until_ready(spi, delay, poll)
            .map_err(read_failed)?;
        self.page_read_buffer_cmd(spi, address.wire_column_at(column), buf)
            .map_err(read_failed)
    }

    /// Program `data` into the page of `address`, starting at its column.
    /// The data must end within the data area, the spare area is only reached
    /// through [SpiNandBlocking::spare_program].
    ///
    /// Must erase the block first
    fn page_program<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if data.len() > Self::PAGE_SIZE as usize
            || address.column().as_u16() as usize + data.len() > Self::PAGE_SIZE as usize
        {
            debug!(
                "Program of {} bytes at column {} exceeds page data area",
                data.len(),
                address.column().as_u16()
            );
            return Err(SpiFlashError::ProgramFailed);
        }
        self.program_page_column(spi, delay, poll, address, address.column(), data)
    }

    /// Program the spare area of the page of `address`
    fn spare_program<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if data.len() > Self::SPARE_SIZE as usize {
            return Err(SpiFlashError::ProgramFailed);
        }
        let column = ColumnAddress::new(Self::PAGE_SIZE as u16);
        self.program_page_column(spi, delay, poll, address, column, data)
    }

    /// Write enable, program load, program execute, wait, write disable,
    /// then check the program fail bit.
    ///
    /// Bus failures are [SpiFlashError::ProgramFailed], a device that stays busy
    /// is [SpiFlashError::Busy].
    fn program_page_column<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        address: &PhysicalAddress,
        column: ColumnAddress,
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        if column.as_u16() as usize + data.len() > Self::FULL_PAGE_SIZE as usize {
            debug!(
                "Program of {} bytes at column {} exceeds page",
                data.len(),
                column.as_u16()
            );
            return Err(SpiFlashError::ProgramFailed);
        }
        trace!(
            "Program {} bytes to row {} column {}",
            data.len(),
            address.row_address().as_u32(),
            column.as_u16()
        );
        self.with_write_enabled(spi, |spi| {
            self.program_load_cmd(spi, address.wire_column_at(column), data)?;
            self.program_execute_cmd(spi, address.row_address())?;
            self.wait_until_ready(spi, delay, poll)
        })
        .map_err(|e| match e {
            SpiFlashError::Busy => SpiFlashError::<SPI::Error>::Busy,
            e => {
                debug!("Program failed: {:?}", e.kind());
                SpiFlashError::ProgramFailed
            }
        })?;

        let status = self
            .read_status(spi)
            .map_err(|_| SpiFlashError::<SPI::Error>::ProgramFailed)?;
        if status.program_failed() {
            warn!("Program fail bit set for row {}", address.row_address().as_u32());
            return Err(SpiFlashError::ProgramFailed);
        }
        Ok(())
    }

    /// Erase a block.
    ///
    /// Write enable, block erase, wait, write disable, then check the erase fail bit.
    /// Bus failures are [SpiFlashError::EraseFailed], a device that stays busy
    /// is [SpiFlashError::Busy].
    fn erase_block<DLY: DelayNs>(
        &self,
        spi: &mut SPI,
        delay: &mut DLY,
        poll: PollConfig,
        block_address: BlockIndex,
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        trace!("Erase block {}", block_address.as_u16());
        self.with_write_enabled(spi, |spi| {
            self.erase_block_cmd(spi, block_address)?;
            self.wait_until_ready(spi, delay, poll)
        })
        .map_err(|e| match e {
            SpiFlashError::Busy => SpiFlashError::<SPI::Error>::Busy,
            e => {
                debug!("Erase failed: {:?}", e.kind());
                SpiFlashError::EraseFailed
            }
        })?;

        let status = self
            .read_status(spi)
            .map_err(|_| SpiFlashError::<SPI::Error>::EraseFailed)?;
        if status.erase_failed() {
            warn!("Erase fail bit set for block {}", block_address.as_u16());
            return Err(SpiFlashError::EraseFailed);
        }
        Ok(())
    }
}

pub mod utils {
    use embedded_hal::spi::{Operation, SpiDevice};

    use super::SpiFlashError;

    /// Wrapper around [SpiDevice::write] that maps errors
    pub fn spi_write<SPI: SpiDevice>(
        spi: &mut SPI,
        buf: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        spi.write(buf).map_err(SpiFlashError::SPI)
    }

    /// Write `write` then read into `read`, both under one chip select
    pub fn spi_write_read<SPI: SpiDevice>(
        spi: &mut SPI,
        write: &[u8],
        read: &mut [u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        spi.transaction(&mut [Operation::Write(write), Operation::Read(read)])
            .map_err(SpiFlashError::SPI)
    }

    /// Write a command followed by a data payload under one chip select
    pub fn spi_write_then_data<SPI: SpiDevice>(
        spi: &mut SPI,
        command: &[u8],
        data: &[u8],
    ) -> Result<(), SpiFlashError<SPI::Error>> {
        spi.transaction(&mut [Operation::Write(command), Operation::Write(data)])
            .map_err(SpiFlashError::SPI)
    }
}
