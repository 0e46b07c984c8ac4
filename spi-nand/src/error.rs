use core::fmt::Debug;
use embedded_nand::{NandFlashError, NandFlashErrorKind};

use crate::JedecID;

/// Error type for the SPI NAND flash driver.
///
/// It is generic over the SPI error type (SE), which allows for different SPI implementations.
/// This is the [`embedded_hal::spi::SpiDevice`] error type.
#[derive(Debug, thiserror::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SpiFlashError<SE> {
    /// Error from the SPI peripheral, passed through unchanged
    #[error("SpiDevice error: {0:?}")]
    SPI(SE),
    /// Reset command could not be sent, or the device never became ready after it
    #[error("Reset failed")]
    ResetFailed,
    /// Device answered with an unexpected manufacturer or device ID
    #[error("Unexpected device ID {0:?}")]
    WrongId(JedecID),
    /// Device still reported an operation in progress after the allowed number of polls
    #[error("Device busy")]
    Busy,
    /// Page read failed.
    /// Request larger than the page, bus failure or the device never finished loading the page.
    #[error("Read failed")]
    ReadFailed,
    /// Program failed.
    /// Request larger than the page, bus failure, or the device set the program fail bit
    /// (write disabled, block protected or block failed).
    #[error("Program failed")]
    ProgramFailed,
    /// Block Erase failed.
    /// Bus failure, or the device set the erase fail bit
    /// (block protected, write disabled or block failed).
    #[error("Erase failed")]
    EraseFailed,
    /// Attempted to write a read only feature register
    #[error("Register is read only")]
    RegAddressInvalid,
    /// Logical address beyond the capacity of the device
    #[error("Address out of range")]
    AddressOutOfRange,
    /// Requested bytes out of bounds
    #[error("Requested bytes out of bounds")]
    OutOfBounds,
    /// Requested bytes not aligned
    #[error("Requested bytes not aligned")]
    NotAligned,
    /// Other error
    #[error("Other error. Should not happen")]
    Other,
}

// Convert from SPI error to more generic NandFlashError
impl<SE: Debug> NandFlashError for SpiFlashError<SE> {
    fn kind(&self) -> NandFlashErrorKind {
        match self {
            SpiFlashError::NotAligned => NandFlashErrorKind::NotAligned,
            SpiFlashError::OutOfBounds | SpiFlashError::AddressOutOfRange => {
                NandFlashErrorKind::OutOfBounds
            }
            SpiFlashError::EraseFailed
            | SpiFlashError::ProgramFailed
            | SpiFlashError::ReadFailed => NandFlashErrorKind::BlockFail(None),
            SpiFlashError::Busy => NandFlashErrorKind::Busy,
            SpiFlashError::SPI(_)
            | SpiFlashError::ResetFailed
            | SpiFlashError::WrongId(_)
            | SpiFlashError::RegAddressInvalid
            | SpiFlashError::Other => NandFlashErrorKind::Other,
        }
    }
}

// Lets the bounds / alignment check helpers convert with `?`
impl<SE> From<NandFlashErrorKind> for SpiFlashError<SE> {
    fn from(kind: NandFlashErrorKind) -> Self {
        match kind {
            NandFlashErrorKind::NotAligned => SpiFlashError::NotAligned,
            NandFlashErrorKind::OutOfBounds => SpiFlashError::OutOfBounds,
            _ => SpiFlashError::Other,
        }
    }
}
