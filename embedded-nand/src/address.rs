use crate::NandFlash;
use core::fmt::Display;

/// Index of a page in the flash device.
///
/// Also the row address sent on the wire for row addressed commands
/// (page read, program execute, block erase): `block << page_bits | page`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageIndex(pub(crate) u32);

impl PageIndex {
    pub fn new(index: u32) -> Self {
        PageIndex(index)
    }
    pub fn as_u32(&self) -> u32 {
        self.0
    }
    /// The 24 bit row address, MSB first
    pub fn to_row_bytes(&self) -> [u8; 3] {
        [(self.0 >> 16) as u8, (self.0 >> 8) as u8, self.0 as u8]
    }

    /// Convert from a [BlockIndex]
    pub fn from_block_address(ba: BlockIndex, pages_per_block: u32) -> Self {
        PageIndex(ba.0 as u32 * pages_per_block)
    }
}

impl From<PageIndex> for u32 {
    fn from(pa: PageIndex) -> Self {
        pa.as_u32()
    }
}

impl Display for PageIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Index of a block in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockIndex(pub(crate) u16);

impl BlockIndex {
    pub fn new(index: u16) -> Self {
        BlockIndex(index)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Plane the block lives in, for devices interleaving blocks across `planes` planes.
    /// `planes` must be a power of two.
    pub fn plane(&self, planes: u32) -> u8 {
        (self.0 as u32 & (planes - 1)) as u8
    }

    pub fn as_page_index(&self, pages_per_block: u32) -> PageIndex {
        PageIndex((self.0 as u32) * pages_per_block)
    }

    pub fn as_byte_address(&self, block_size: u32) -> ByteAddress {
        ByteAddress((self.0 as u32) * block_size)
    }

    pub fn from_raw_byte_offset(offset: u32, block_size: u32) -> Self {
        BlockIndex((offset / block_size) as u16)
    }
}

impl From<BlockIndex> for u16 {
    fn from(bi: BlockIndex) -> Self {
        bi.as_u16()
    }
}

impl Display for BlockIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Logical address of a byte in the data area of the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ByteAddress(pub(crate) u32);

impl ByteAddress {
    pub fn new(address: u32) -> Self {
        ByteAddress(address)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    pub fn as_page_index(&self, page_size: u32) -> PageIndex {
        PageIndex(self.0 / page_size)
    }

    pub fn as_column_address(&self, page_size: u32) -> ColumnAddress {
        ColumnAddress((self.0 % page_size) as u16)
    }
}

impl From<ByteAddress> for u32 {
    fn from(ba: ByteAddress) -> Self {
        ba.as_u32()
    }
}

impl Display for ByteAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Address of a byte within a page in the flash device
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColumnAddress(pub(crate) u16);

impl ColumnAddress {
    pub fn new(address: u16) -> Self {
        ColumnAddress(address)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// The 16 bit column address, MSB first
    pub fn to_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl Display for ColumnAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.0.fmt(f)
    }
}

/// Physical location of a logical byte address.
///
/// Built only by [PhysicalAddress::from_byte_address], so the row and column
/// addresses always agree with the block, page and plane they were derived from.
/// Geometry values must be powers of two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PhysicalAddress {
    block: BlockIndex,
    page: u8,
    plane: u8,
    row: PageIndex,
    column: ColumnAddress,
    plane_shift: Option<u8>,
}

impl PhysicalAddress {
    /// Split a logical address into block, page and column with shifts and masks.
    ///
    /// `page_size` is the data area of a page. For `planes > 1` the plane number
    /// is the low bits of the block and is carried on the wire directly above the
    /// column bits.
    ///
    /// No range check is done: addresses past the end of the device give blocks
    /// past the block count. `SpiNandDevice::to_physical` in `spi-nand` is the
    /// checked entry point.
    pub fn from_byte_address(
        ba: ByteAddress,
        page_size: u32,
        pages_per_block: u32,
        planes: u32,
    ) -> Self {
        debug_assert!(page_size.is_power_of_two());
        debug_assert!(pages_per_block.is_power_of_two());
        debug_assert!(planes.is_power_of_two());

        let column_bits = page_size.trailing_zeros();
        let page_bits = pages_per_block.trailing_zeros();

        let block = (ba.0 >> (column_bits + page_bits)) as u16;
        let page = (ba.0 >> column_bits) & (pages_per_block - 1);
        let column = ba.0 & (page_size - 1);
        let block = BlockIndex(block);
        let row = ((block.0 as u32) << page_bits) | page;

        PhysicalAddress {
            block,
            page: page as u8,
            plane: block.plane(planes),
            row: PageIndex(row),
            column: ColumnAddress(column as u16),
            plane_shift: (planes > 1).then_some((column_bits + 1) as u8),
        }
    }

    pub fn block(&self) -> BlockIndex {
        self.block
    }

    /// Page within the block
    pub fn page(&self) -> u8 {
        self.page
    }

    pub fn plane(&self) -> u8 {
        self.plane
    }

    /// Row address for page read, program execute and block erase
    pub fn row_address(&self) -> PageIndex {
        self.row
    }

    /// Byte offset within the page data area
    pub fn column(&self) -> ColumnAddress {
        self.column
    }

    /// Column address as sent for program load and read from cache.
    /// Includes the plane select bit on multi plane devices.
    pub fn wire_column(&self) -> ColumnAddress {
        self.wire_column_at(self.column)
    }

    /// Same page and plane, different column. Used to reach the spare area.
    pub fn wire_column_at(&self, column: ColumnAddress) -> ColumnAddress {
        match self.plane_shift {
            Some(shift) => ColumnAddress(column.0 | ((self.plane as u16) << shift)),
            None => column,
        }
    }
}

/// Trait for converting between page and block indices and byte and column addresses
pub trait AddressConversions {
    fn block_to_page_index(block: BlockIndex) -> PageIndex;
    fn block_to_byte_address(block: BlockIndex) -> ByteAddress;
    fn byte_to_page_index(byte: ByteAddress) -> PageIndex;
    fn byte_to_column_address(byte: ByteAddress) -> ColumnAddress;
    fn raw_byte_to_block_index(offset: u32) -> BlockIndex;
    fn is_block_aligned(byte: ByteAddress) -> bool;
    fn is_page_aligned(byte: ByteAddress) -> bool;
}

impl<T: NandFlash> AddressConversions for T {
    fn block_to_page_index(block: BlockIndex) -> PageIndex {
        block.as_page_index(Self::PAGES_PER_BLOCK as u32)
    }
    fn block_to_byte_address(block: BlockIndex) -> ByteAddress {
        block.as_byte_address(Self::ERASE_SIZE as u32)
    }
    fn byte_to_page_index(byte: ByteAddress) -> PageIndex {
        byte.as_page_index(Self::PAGE_SIZE as u32)
    }
    fn byte_to_column_address(byte: ByteAddress) -> ColumnAddress {
        byte.as_column_address(Self::PAGE_SIZE as u32)
    }
    fn raw_byte_to_block_index(offset: u32) -> BlockIndex {
        BlockIndex::from_raw_byte_offset(offset, Self::ERASE_SIZE as u32)
    }
    fn is_block_aligned(byte: ByteAddress) -> bool {
        byte.0 % Self::ERASE_SIZE as u32 == 0
    }
    fn is_page_aligned(byte: ByteAddress) -> bool {
        byte.0 % Self::PAGE_SIZE as u32 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    const PAGE_SIZE: u32 = 2048;
    const PAGES_PER_BLOCK: u32 = 64;
    const BLOCK_COUNT: u32 = 2048;
    const CAPACITY: u32 = PAGE_SIZE * PAGES_PER_BLOCK * BLOCK_COUNT;

    fn translate(addr: u32) -> PhysicalAddress {
        PhysicalAddress::from_byte_address(ByteAddress::new(addr), PAGE_SIZE, PAGES_PER_BLOCK, 2)
    }

    #[test]
    fn first_page_of_second_block() {
        let pa = translate(0x0002_0000);
        assert_eq!(pa.block(), BlockIndex::new(1));
        assert_eq!(pa.plane(), 1);
        assert_eq!(pa.page(), 0);
        assert_eq!(pa.row_address(), PageIndex::new(64));
        assert_eq!(pa.column(), ColumnAddress::new(0));
        // plane select sits above the 12 column bits
        assert_eq!(pa.wire_column(), ColumnAddress::new(0x1000));
    }

    #[test]
    fn page_boundary() {
        let last = translate(PAGE_SIZE - 1);
        assert_eq!(last.block().as_u16(), 0);
        assert_eq!(last.page(), 0);
        assert_eq!(last.column().as_u16(), 2047);
        assert_eq!(last.wire_column().as_u16(), 2047);

        let next = translate(PAGE_SIZE);
        assert_eq!(next.block().as_u16(), 0);
        assert_eq!(next.page(), 1);
        assert_eq!(next.column().as_u16(), 0);
        assert_eq!(next.row_address().as_u32(), 1);
    }

    #[test]
    fn translation_stays_in_geometry() {
        // Walk the whole device with a stride that hits every block and varies page/column
        let mut addr = 0u32;
        while addr < CAPACITY {
            let pa = translate(addr);
            assert!((pa.block().as_u16() as u32) < BLOCK_COUNT);
            assert!((pa.page() as u32) < PAGES_PER_BLOCK);
            assert!(pa.plane() <= 1);
            assert_eq!(pa.plane() as u16, pa.block().as_u16() & 1);
            assert_eq!(
                pa.row_address().as_u32(),
                pa.block().as_u16() as u32 * PAGES_PER_BLOCK + pa.page() as u32
            );
            assert_eq!(pa.column().as_u16() as u32, addr % PAGE_SIZE);
            addr += 0x1_0801;
        }
        let top = translate(CAPACITY - 1);
        assert_eq!(top.block().as_u16() as u32, BLOCK_COUNT - 1);
        assert_eq!(top.page() as u32, PAGES_PER_BLOCK - 1);
    }

    #[test]
    fn single_plane_column_is_plain_offset() {
        let pa = PhysicalAddress::from_byte_address(
            ByteAddress::new(0x0002_0010),
            PAGE_SIZE,
            PAGES_PER_BLOCK,
            1,
        );
        assert_eq!(pa.plane(), 0);
        assert_eq!(pa.wire_column().as_u16(), 0x10);
    }

    #[test]
    fn block_plane_interleave() {
        assert_eq!(BlockIndex::new(6).plane(2), 0);
        assert_eq!(BlockIndex::new(7).plane(2), 1);
        assert_eq!(BlockIndex::new(7).plane(1), 0);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic]
    fn zero_planes_is_rejected() {
        PhysicalAddress::from_byte_address(ByteAddress::new(0), PAGE_SIZE, PAGES_PER_BLOCK, 0);
    }

    #[test]
    fn row_bytes_are_msb_first() {
        assert_eq!(PageIndex::new(0x01_02_03).to_row_bytes(), [0x01, 0x02, 0x03]);
        assert_eq!(ColumnAddress::new(0x1ABC).to_bytes(), [0x1A, 0xBC]);
    }

    #[test]
    fn spare_column_keeps_plane() {
        let pa = translate(0x0002_0000 + 5 * PAGE_SIZE);
        assert_eq!(
            pa.wire_column_at(ColumnAddress::new(PAGE_SIZE as u16)).as_u16(),
            0x1000 | 0x0800
        );
    }
}
