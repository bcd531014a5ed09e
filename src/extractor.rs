//! Bounds-checked, relocation-aware reads from a raw section.

use std::collections::HashMap;
use std::io;

use crate::endianity::Endianity;
use crate::{Error, Format, Result};

/// Relocations that apply to an accelerator section, keyed by the byte offset
/// of the storage unit they patch.
///
/// The map is built up front by the object-file loader and is immutable while
/// a table is in use. A relocated read substitutes the stored value for the
/// raw section bytes.
#[derive(Debug, Default, Clone)]
pub struct RelocationMap {
    map: HashMap<u32, u64>,
}

impl RelocationMap {
    /// Construct a new, empty map.
    pub fn new() -> RelocationMap {
        RelocationMap::default()
    }

    /// Record the resolved value for the storage unit at `offset`.
    pub fn insert(&mut self, offset: u32, value: u64) {
        self.map.insert(offset, value);
    }

    /// Get the resolved value for the storage unit at `offset`, if any.
    #[inline]
    pub fn get(&self, offset: u32) -> Option<u64> {
        self.map.get(&offset).copied()
    }

    /// Return true if no relocations are recorded.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// A view over the raw bytes of a section that provides bounds-checked reads
/// of the primitives the accelerator table formats are built from.
///
/// Unlike a draining reader, a `DataExtractor` is immutable: every read takes
/// a `&mut u32` cursor, advances it past the bytes consumed, and leaves it
/// untouched when the read fails.
#[derive(Debug, Clone, Copy)]
pub struct DataExtractor<'input, Endian>
where
    Endian: Endianity,
{
    data: &'input [u8],
    relocations: Option<&'input RelocationMap>,
    endian: Endian,
}

impl<'input, Endian> DataExtractor<'input, Endian>
where
    Endian: Endianity,
{
    /// Construct a new `DataExtractor` over `data` with no relocations.
    pub fn new(data: &'input [u8], endian: Endian) -> DataExtractor<'input, Endian> {
        DataExtractor {
            data,
            relocations: None,
            endian,
        }
    }

    /// Construct a new `DataExtractor` over `data`, consulting `relocations`
    /// for relocated reads.
    pub fn with_relocations(
        data: &'input [u8],
        relocations: &'input RelocationMap,
        endian: Endian,
    ) -> DataExtractor<'input, Endian> {
        DataExtractor {
            data,
            relocations: Some(relocations),
            endian,
        }
    }

    /// Return the length of the underlying section in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Return true if the underlying section is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Return true if `offset` points at a byte of the section.
    #[inline]
    pub fn is_valid_offset(&self, offset: u32) -> bool {
        (offset as usize) < self.data.len()
    }

    /// Return true if the `size` bytes starting at `offset` all lie within
    /// the section.
    #[inline]
    pub fn is_valid_range(&self, offset: u32, size: u32) -> bool {
        u64::from(offset) + u64::from(size) <= self.data.len() as u64
    }

    fn read_slice_raw(&self, offset: &mut u32, len: u32) -> Result<&'input [u8]> {
        if !self.is_valid_range(*offset, len) {
            return Err(Error::UnexpectedEof);
        }
        let start = *offset as usize;
        *offset += len;
        Ok(&self.data[start..start + len as usize])
    }

    /// Read `len` bytes starting at `offset`, advancing it.
    pub fn read_slice(&self, offset: &mut u32, len: u32) -> Result<&'input [u8]> {
        self.read_slice_raw(offset, len)
    }

    /// Read a u8, advancing `offset`.
    pub fn read_u8(&self, offset: &mut u32) -> Result<u8> {
        let slice = self.read_slice_raw(offset, 1)?;
        Ok(slice[0])
    }

    /// Read a u16, advancing `offset`.
    pub fn read_u16(&self, offset: &mut u32) -> Result<u16> {
        let slice = self.read_slice_raw(offset, 2)?;
        Ok(self.endian.read_u16(slice))
    }

    /// Read a u32, advancing `offset`.
    pub fn read_u32(&self, offset: &mut u32) -> Result<u32> {
        let slice = self.read_slice_raw(offset, 4)?;
        Ok(self.endian.read_u32(slice))
    }

    /// Read a u64, advancing `offset`.
    pub fn read_u64(&self, offset: &mut u32) -> Result<u64> {
        let slice = self.read_slice_raw(offset, 8)?;
        Ok(self.endian.read_u64(slice))
    }

    /// Read an address-sized integer, and return it as a `u64`.
    pub fn read_address(&self, offset: &mut u32, address_size: u8) -> Result<u64> {
        match address_size {
            1 => self.read_u8(offset).map(u64::from),
            2 => self.read_u16(offset).map(u64::from),
            4 => self.read_u32(offset).map(u64::from),
            8 => self.read_u64(offset),
            otherwise => Err(Error::UnsupportedAddressSize(otherwise)),
        }
    }

    /// Read a word-sized integer according to the DWARF format, and return it
    /// as a `u64`.
    pub fn read_word(&self, offset: &mut u32, format: Format) -> Result<u64> {
        self.read_address(offset, format.word_size())
    }

    /// Read an unsigned LEB128 encoded integer, advancing `offset`.
    pub fn read_uleb128(&self, offset: &mut u32) -> Result<u64> {
        let mut rest = self
            .data
            .get(*offset as usize..)
            .ok_or(Error::UnexpectedEof)?;
        let available = rest.len();
        match leb128::read::unsigned(&mut rest) {
            Ok(val) => {
                *offset += (available - rest.len()) as u32;
                Ok(val)
            }
            Err(leb128::read::Error::IoError(ref e))
                if e.kind() == io::ErrorKind::UnexpectedEof =>
            {
                Err(Error::UnexpectedEof)
            }
            Err(_) => Err(Error::BadUnsignedLeb128),
        }
    }

    /// Read a signed LEB128 encoded integer, advancing `offset`.
    pub fn read_sleb128(&self, offset: &mut u32) -> Result<i64> {
        let mut rest = self
            .data
            .get(*offset as usize..)
            .ok_or(Error::UnexpectedEof)?;
        let available = rest.len();
        match leb128::read::signed(&mut rest) {
            Ok(val) => {
                *offset += (available - rest.len()) as u32;
                Ok(val)
            }
            Err(leb128::read::Error::IoError(ref e))
                if e.kind() == io::ErrorKind::UnexpectedEof =>
            {
                Err(Error::UnexpectedEof)
            }
            Err(_) => Err(Error::BadSignedLeb128),
        }
    }

    /// Read a u32 that may be patched by a relocation.
    ///
    /// If a relocation is recorded at the pre-read cursor position, its value
    /// is substituted for the section bytes; the cursor advances either way.
    pub fn read_relocated_u32(&self, offset: &mut u32) -> Result<u32> {
        let position = *offset;
        let value = self.read_u32(offset)?;
        match self.relocations.and_then(|map| map.get(position)) {
            Some(relocated) => Ok(relocated as u32),
            None => Ok(value),
        }
    }

    /// Read a null-terminated slice starting at `offset`, and return it
    /// (excluding the null). `offset` is advanced past the null.
    pub fn read_cstr(&self, offset: &mut u32) -> Result<&'input [u8]> {
        let start = *offset as usize;
        let rest = self.data.get(start..).ok_or(Error::UnexpectedEof)?;
        match rest.iter().position(|&byte| byte == 0) {
            Some(null) => {
                *offset = (start + null + 1) as u32;
                Ok(&rest[..null])
            }
            None => Err(Error::UnexpectedEof),
        }
    }
}
