//! Simulated SPI NAND chip for unit tests.
//!
//! Decodes the command set at the transaction level, keeps pages in memory and
//! records every transaction so tests can check the wire sequence.
use std::{collections::HashMap, vec, vec::Vec};

use embedded_hal::{
    delay::DelayNs,
    spi::{self, ErrorKind, ErrorType, Operation, SpiDevice},
};

use crate::{cmd_blocking::SpiNandBlocking, register::Status, SpiNand};

/// 2 Gbit, two plane part with 2048 + 128 byte pages
#[derive(Debug, Clone, Copy, Default)]
pub struct TestChip;

impl SpiNand<2048> for TestChip {
    const SPARE_SIZE: u32 = 128;
    const PAGES_PER_BLOCK: u32 = 64;
    const BLOCK_COUNT: u32 = 2048;
    const PLANES: u32 = 2;
    const JEDEC_MANUFACTURER_ID: u8 = 0x2C;
    const JEDEC_DEVICE_ID: u8 = 0x24;
    const POWER_ON_RESET_US: u32 = 1250;
    const RESET_TIME_MAX_US: u32 = 500;
    const READ_TIME_MAX_US: u32 = 115;
    const PROGRAM_TIME_MAX_US: u32 = 600;
    const ERASE_TIME_MAX_US: u32 = 10_000;
}

impl<SPI: SpiDevice> SpiNandBlocking<SPI, 2048> for TestChip {}

const FULL_PAGE: usize = 2048 + 128;
const PAGES_PER_BLOCK: u32 = 64;
const COLUMN_MASK: u16 = 0x0FFF;

#[derive(Debug)]
pub struct MockError;

impl spi::Error for MockError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

#[derive(Debug)]
pub struct MockNand {
    /// Command bytes of every transaction, including failed ones
    pub transactions: Vec<Vec<u8>>,
    /// Data phase of every program load
    pub payloads: Vec<Vec<u8>>,
    /// Index of a transaction to fail
    pub fail_at: Option<usize>,
    /// Busy status reads after each page read, program execute or erase
    pub busy_polls: u32,
    pub busy_remaining: u32,
    pub always_busy: bool,
    pub program_fail: bool,
    pub erase_fail: bool,
    pub id: [u8; 2],
    pub block_lock: u8,
    pub config: u8,
    pub die_select: u8,
    pub status_reads: usize,
    wel: bool,
    p_fail: bool,
    e_fail: bool,
    pages: HashMap<u32, Vec<u8>>,
    cache: Vec<u8>,
}

impl MockNand {
    pub fn new() -> Self {
        MockNand {
            transactions: Vec::new(),
            payloads: Vec::new(),
            fail_at: None,
            busy_polls: 0,
            busy_remaining: 0,
            always_busy: false,
            program_fail: false,
            erase_fail: false,
            id: [0x2C, 0x24],
            block_lock: 0b0111_1000,
            config: 0b0001_0000,
            die_select: 0,
            status_reads: 0,
            wel: false,
            p_fail: false,
            e_fail: false,
            pages: HashMap::new(),
            cache: vec![0xFF; FULL_PAGE],
        }
    }

    /// Contents of a page, data and spare. Unwritten pages are erased.
    pub fn page(&self, row: u32) -> Vec<u8> {
        self.pages
            .get(&row)
            .cloned()
            .unwrap_or_else(|| vec![0xFF; FULL_PAGE])
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.transactions.iter().map(|t| t[0]).collect()
    }

    pub fn count(&self, opcode: u8) -> usize {
        self.transactions.iter().filter(|t| t[0] == opcode).count()
    }

    fn status(&mut self) -> u8 {
        self.status_reads += 1;
        let mut bits = 0;
        if self.always_busy {
            bits |= Status::OIP;
        } else if self.busy_remaining > 0 {
            self.busy_remaining -= 1;
            bits |= Status::OIP;
        }
        if self.wel {
            bits |= Status::WEL;
        }
        if self.p_fail {
            bits |= Status::P_FAIL;
        }
        if self.e_fail {
            bits |= Status::E_FAIL;
        }
        bits
    }

    fn register(&mut self, address: u8) -> u8 {
        match address {
            0xA0 => self.block_lock,
            0xB0 => self.config,
            0xC0 => self.status(),
            0xD0 => self.die_select,
            _ => 0,
        }
    }

    fn set_register(&mut self, address: u8, value: u8) {
        match address {
            0xA0 => self.block_lock = value,
            0xB0 => self.config = value,
            0xD0 => self.die_select = value,
            _ => {}
        }
    }

    fn execute(&mut self, cmd: &[u8], data: &[u8], read: &mut [u8]) {
        let row = || u32::from_be_bytes([0, cmd[1], cmd[2], cmd[3]]);
        let column = || (u16::from_be_bytes([cmd[1], cmd[2]]) & COLUMN_MASK) as usize;
        match cmd[0] {
            0xFF => {
                self.wel = false;
                self.cache.fill(0xFF);
            }
            0x9F => {
                for (byte, id) in read.iter_mut().zip(self.id) {
                    *byte = id;
                }
            }
            0x0F => {
                let value = self.register(cmd[1]);
                if let Some(byte) = read.first_mut() {
                    *byte = value;
                }
            }
            0x1F => self.set_register(cmd[1], cmd[2]),
            0x13 => {
                self.cache = self.page(row());
                self.busy_remaining = self.busy_polls;
            }
            0x03 => {
                let start = column();
                for (i, byte) in read.iter_mut().enumerate() {
                    *byte = self.cache.get(start + i).copied().unwrap_or(0xFF);
                }
            }
            0x06 => self.wel = true,
            0x04 => self.wel = false,
            0x02 => {
                let start = column();
                self.cache.fill(0xFF);
                self.cache[start..start + data.len()].copy_from_slice(data);
                self.payloads.push(data.to_vec());
            }
            0x10 => {
                let row = row();
                self.p_fail = self.program_fail || !self.wel;
                if !self.p_fail {
                    let mut page = self.page(row);
                    for (byte, cached) in page.iter_mut().zip(&self.cache) {
                        *byte &= cached;
                    }
                    self.pages.insert(row, page);
                }
                self.busy_remaining = self.busy_polls;
            }
            0xD8 => {
                let first = row();
                self.e_fail = self.erase_fail || !self.wel;
                if !self.e_fail {
                    self.pages
                        .retain(|row, _| *row < first || *row >= first + PAGES_PER_BLOCK);
                }
                self.busy_remaining = self.busy_polls;
            }
            _ => {}
        }
    }
}

impl ErrorType for MockNand {
    type Error = MockError;
}

impl SpiDevice for MockNand {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let (first, rest) = operations.split_first_mut().ok_or(MockError)?;
        let cmd = match first {
            Operation::Write(cmd) => cmd.to_vec(),
            _ => return Err(MockError),
        };
        let index = self.transactions.len();
        self.transactions.push(cmd.clone());
        if self.fail_at == Some(index) {
            return Err(MockError);
        }

        let mut data = Vec::new();
        let mut read: &mut [u8] = &mut [];
        for op in rest.iter_mut() {
            match op {
                Operation::Write(bytes) => data.extend_from_slice(bytes),
                Operation::Read(buf) => read = &mut **buf,
                _ => return Err(MockError),
            }
        }
        self.execute(&cmd, &data, read);
        Ok(())
    }
}

/// Records requested delays instead of sleeping
#[derive(Debug, Default)]
pub struct MockDelay {
    pub us: Vec<u32>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.us.push(ns / 1000);
    }

    fn delay_us(&mut self, us: u32) {
        self.us.push(us);
    }
}
