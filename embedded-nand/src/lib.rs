#![no_std]
#[cfg(test)]
extern crate std;

// Must be first to share macros across crate
mod fmt;

mod address;
pub use address::{
    AddressConversions, BlockIndex, ByteAddress, ColumnAddress, PageIndex, PhysicalAddress,
};

pub trait NandFlashError {
    /// Convert a specific NAND flash error into a generic error kind
    fn kind(&self) -> NandFlashErrorKind;
}

/// A trait that NandFlash implementations can use to share an error type.
pub trait ErrorType {
    /// Errors returned by this NAND flash.
    type Error: NandFlashError;
}

/// NAND flash error kinds.
///
/// NAND flash implementations must map their error to those generic error kinds through the
/// [`NandFlashError`] trait.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum NandFlashErrorKind {
    /// The arguments are not properly aligned.
    NotAligned,

    /// The arguments are out of bounds.
    OutOfBounds,

    /// Block has failed during erase, program or read.
    /// Contains byte address of failed block, or [None] if specific block unknown
    BlockFail(Option<u32>),

    /// The device did not finish an operation in the allowed time.
    Busy,

    /// Error specific to the implementation.
    Other,
}

/// Linear view of the data area of a NAND flash device.
///
/// Offsets are logical byte addresses. Spare areas are not part of this view.
pub trait NandFlash: ErrorType {
    /// The minumum number of bytes the storage peripheral can read
    const READ_SIZE: usize;

    /// Size of the data area of a page in bytes
    const PAGE_SIZE: usize;

    /// Number of pages in a block
    const PAGES_PER_BLOCK: usize;

    /// Number of blocks
    const BLOCK_COUNT: usize;

    /// The minumum number of bytes the storage peripheral can erase (block size)
    const ERASE_SIZE: usize;

    /// The minumum number of bytes the storage peripheral can write
    const WRITE_SIZE: usize;

    /// Read a slice of data from the storage peripheral, starting the read
    /// operation at the given address offset, and reading `bytes.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not aligned or out of bounds. The implementation
    /// can use the [`check_read`] helper function.
    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error>;

    /// The capacity of the peripheral in bytes.
    fn capacity(&self) -> u32;

    /// Erase the given storage range, clearing all data within `[from..to]`.
    /// The given range will contain all 1s afterwards.
    ///
    /// If power is lost during erase, contents of the page are undefined.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not aligned or out of bounds (the case where `to >
    /// from` is considered out of bounds). The implementation can use the [`check_erase`]
    /// helper function.
    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error>;

    /// Erase a block by block index.
    fn erase_block(&mut self, block: BlockIndex) -> Result<(), Self::Error>;

    /// If power is lost during write, the contents of the written words are undefined,
    /// but the rest of the page is guaranteed to be unchanged.
    /// It is not allowed to write to the same word twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments are not aligned or out of bounds. The implementation
    /// can use the [`check_write`] helper function.
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Return whether a read operation is within bounds.
pub fn check_read<T: NandFlash>(
    flash: &T,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    check_slice(flash, T::READ_SIZE, offset, length)
}

/// Return whether an erase operation is aligned and within bounds.
pub fn check_erase<T: NandFlash>(flash: &T, from: u32, to: u32) -> Result<(), NandFlashErrorKind> {
    if from > to || to > flash.capacity() {
        debug!("Erase {}..{} out of bounds", from, to);
        return Err(NandFlashErrorKind::OutOfBounds);
    }
    if from % T::ERASE_SIZE as u32 != 0 || to % T::ERASE_SIZE as u32 != 0 {
        debug!("Erase {}..{} not block aligned", from, to);
        return Err(NandFlashErrorKind::NotAligned);
    }
    Ok(())
}

/// Return whether a write operation is aligned and within bounds.
pub fn check_write<T: NandFlash>(
    flash: &T,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    check_slice(flash, T::WRITE_SIZE, offset, length)
}

pub fn check_slice<T: NandFlash>(
    flash: &T,
    align: usize,
    offset: u32,
    length: usize,
) -> Result<(), NandFlashErrorKind> {
    if length as u64 > flash.capacity() as u64 || offset > (flash.capacity() - (length as u32)) {
        debug!("{} bytes at {} out of bounds", length, offset);
        return Err(NandFlashErrorKind::OutOfBounds);
    }
    if offset % align as u32 != 0 || length % align != 0 {
        debug!("{} bytes at {} not aligned to {}", length, offset, align);
        return Err(NandFlashErrorKind::NotAligned);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct Geometry;

    #[derive(Debug)]
    struct NoError;

    impl NandFlashError for NoError {
        fn kind(&self) -> NandFlashErrorKind {
            NandFlashErrorKind::Other
        }
    }

    impl ErrorType for Geometry {
        type Error = NoError;
    }

    impl NandFlash for Geometry {
        const READ_SIZE: usize = 1;
        const PAGE_SIZE: usize = 2048;
        const PAGES_PER_BLOCK: usize = 64;
        const BLOCK_COUNT: usize = 4;
        const ERASE_SIZE: usize = 2048 * 64;
        const WRITE_SIZE: usize = 1;

        fn read(&mut self, _offset: u32, _bytes: &mut [u8]) -> Result<(), Self::Error> {
            Ok(())
        }
        fn capacity(&self) -> u32 {
            (Self::ERASE_SIZE * Self::BLOCK_COUNT) as u32
        }
        fn erase(&mut self, _from: u32, _to: u32) -> Result<(), Self::Error> {
            Ok(())
        }
        fn erase_block(&mut self, _block: BlockIndex) -> Result<(), Self::Error> {
            Ok(())
        }
        fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn slice_bounds() {
        let flash = Geometry;
        let cap = flash.capacity();
        assert_eq!(check_read(&flash, 0, cap as usize), Ok(()));
        assert_eq!(check_read(&flash, cap - 1, 1), Ok(()));
        assert_eq!(
            check_read(&flash, cap, 1),
            Err(NandFlashErrorKind::OutOfBounds)
        );
        assert_eq!(
            check_write(&flash, 0, cap as usize + 1),
            Err(NandFlashErrorKind::OutOfBounds)
        );
    }

    #[test]
    fn erase_alignment() {
        let flash = Geometry;
        let block = Geometry::ERASE_SIZE as u32;
        assert_eq!(check_erase(&flash, block, 3 * block), Ok(()));
        assert_eq!(
            check_erase(&flash, 1, block),
            Err(NandFlashErrorKind::NotAligned)
        );
        assert_eq!(
            check_erase(&flash, 2 * block, block),
            Err(NandFlashErrorKind::OutOfBounds)
        );
        assert_eq!(
            check_erase(&flash, 0, 5 * block),
            Err(NandFlashErrorKind::OutOfBounds)
        );
    }

    #[test]
    fn conversions_follow_geometry() {
        let ba = ByteAddress::new(Geometry::ERASE_SIZE as u32 + 2048 + 7);
        assert_eq!(Geometry::byte_to_page_index(ba), PageIndex::new(65));
        assert_eq!(Geometry::byte_to_column_address(ba), ColumnAddress::new(7));
        assert!(!Geometry::is_page_aligned(ba));
        assert!(Geometry::is_block_aligned(Geometry::block_to_byte_address(
            BlockIndex::new(2)
        )));
        assert_eq!(
            Geometry::block_to_page_index(BlockIndex::new(2)),
            PageIndex::new(128)
        );
        assert_eq!(
            Geometry::raw_byte_to_block_index(3 * Geometry::ERASE_SIZE as u32 - 1),
            BlockIndex::new(2)
        );
    }
}
