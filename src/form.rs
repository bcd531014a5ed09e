//! Decoding of DWARF form-encoded values from accelerator-table payloads.

use std::fmt;

use crate::constants;
use crate::constants::DwForm;
use crate::extractor::DataExtractor;
use crate::endianity::Endianity;
use crate::{DebugStrOffset, DebugTypeSignature, Encoding, Error, Result};

/// The classes that the value of a form belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormClass {
    /// A machine address.
    Address,
    /// An arbitrary block of bytes.
    Block,
    /// An unsigned or signed constant.
    Constant,
    /// A DWARF expression.
    Exprloc,
    /// A boolean flag.
    Flag,
    /// A reference to another debugging information entry.
    Reference,
    /// An offset into another section.
    SectionOffset,
    /// A string, either inline or as an offset into a string section.
    String,
    /// A type unit signature.
    TypeSignature,
    /// A form this library does not know about.
    Unknown,
}

impl FormClass {
    /// Return the class that `form`'s values belong to.
    pub fn of(form: DwForm) -> FormClass {
        match form {
            constants::DW_FORM_addr => FormClass::Address,

            constants::DW_FORM_block
            | constants::DW_FORM_block1
            | constants::DW_FORM_block2
            | constants::DW_FORM_block4 => FormClass::Block,

            constants::DW_FORM_data1
            | constants::DW_FORM_data2
            | constants::DW_FORM_data4
            | constants::DW_FORM_data8
            | constants::DW_FORM_sdata
            | constants::DW_FORM_udata => FormClass::Constant,

            constants::DW_FORM_exprloc => FormClass::Exprloc,

            constants::DW_FORM_flag | constants::DW_FORM_flag_present => FormClass::Flag,

            constants::DW_FORM_ref1
            | constants::DW_FORM_ref2
            | constants::DW_FORM_ref4
            | constants::DW_FORM_ref8
            | constants::DW_FORM_ref_udata
            | constants::DW_FORM_ref_addr => FormClass::Reference,

            constants::DW_FORM_sec_offset => FormClass::SectionOffset,

            constants::DW_FORM_string | constants::DW_FORM_strp => FormClass::String,

            constants::DW_FORM_ref_sig8 => FormClass::TypeSignature,

            _ => FormClass::Unknown,
        }
    }
}

/// A single value decoded from a form-encoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormValue<'input> {
    /// A machine address.
    Addr(u64),

    /// A block of bytes; also used for `DW_FORM_exprloc`, whose payload this
    /// library does not interpret.
    Block(&'input [u8]),

    /// A one byte constant.
    Data1(u8),

    /// A two byte constant.
    Data2(u16),

    /// A four byte constant.
    Data4(u32),

    /// An eight byte constant.
    Data8(u64),

    /// A signed constant.
    Sdata(i64),

    /// An unsigned constant.
    Udata(u64),

    /// A boolean flag.
    Flag(bool),

    /// An offset into another section.
    SecOffset(u64),

    /// A null-terminated string stored inline.
    String(&'input [u8]),

    /// An offset into the string section.
    DebugStrRef(DebugStrOffset),

    /// A reference to a DIE within the referencing unit.
    UnitRef(u64),

    /// A reference to a DIE in another unit, as a section offset.
    DebugInfoRef(u64),

    /// A reference to a type unit, by signature.
    TypeSignature(DebugTypeSignature),
}

impl<'input> FormValue<'input> {
    /// Decode one `form`-encoded value from `section` at `offset`, advancing
    /// `offset` past the bytes consumed.
    pub fn parse<Endian>(
        section: DataExtractor<'input, Endian>,
        offset: &mut u32,
        form: DwForm,
        encoding: Encoding,
    ) -> Result<FormValue<'input>>
    where
        Endian: Endianity,
    {
        let mut form = form;
        if form == constants::DW_FORM_indirect {
            form = DwForm(section.read_uleb128(offset)?);
            if form == constants::DW_FORM_indirect {
                return Err(Error::UnknownForm(form));
            }
        }

        match form {
            constants::DW_FORM_addr => {
                let addr = section.read_address(offset, encoding.address_size)?;
                Ok(FormValue::Addr(addr))
            }
            constants::DW_FORM_block1 => {
                let len = section.read_u8(offset)?;
                let block = section.read_slice(offset, u32::from(len))?;
                Ok(FormValue::Block(block))
            }
            constants::DW_FORM_block2 => {
                let len = section.read_u16(offset)?;
                let block = section.read_slice(offset, u32::from(len))?;
                Ok(FormValue::Block(block))
            }
            constants::DW_FORM_block4 => {
                let len = section.read_u32(offset)?;
                let block = section.read_slice(offset, len)?;
                Ok(FormValue::Block(block))
            }
            constants::DW_FORM_block | constants::DW_FORM_exprloc => {
                let len = section.read_uleb128(offset)?;
                if len > u64::from(u32::MAX) {
                    return Err(Error::UnexpectedEof);
                }
                let block = section.read_slice(offset, len as u32)?;
                Ok(FormValue::Block(block))
            }
            constants::DW_FORM_data1 => section.read_u8(offset).map(FormValue::Data1),
            constants::DW_FORM_data2 => section.read_u16(offset).map(FormValue::Data2),
            constants::DW_FORM_data4 => section.read_u32(offset).map(FormValue::Data4),
            constants::DW_FORM_data8 => section.read_u64(offset).map(FormValue::Data8),
            constants::DW_FORM_sdata => section.read_sleb128(offset).map(FormValue::Sdata),
            constants::DW_FORM_udata => section.read_uleb128(offset).map(FormValue::Udata),
            constants::DW_FORM_flag => {
                let flag = section.read_u8(offset)?;
                Ok(FormValue::Flag(flag != 0))
            }
            constants::DW_FORM_flag_present => Ok(FormValue::Flag(true)),
            constants::DW_FORM_sec_offset => {
                let sec_offset = section.read_word(offset, encoding.format)?;
                Ok(FormValue::SecOffset(sec_offset))
            }
            constants::DW_FORM_string => section.read_cstr(offset).map(FormValue::String),
            constants::DW_FORM_strp => {
                let str_offset = section.read_word(offset, encoding.format)?;
                Ok(FormValue::DebugStrRef(DebugStrOffset(str_offset)))
            }
            constants::DW_FORM_ref1 => {
                let reference = section.read_u8(offset)?;
                Ok(FormValue::UnitRef(u64::from(reference)))
            }
            constants::DW_FORM_ref2 => {
                let reference = section.read_u16(offset)?;
                Ok(FormValue::UnitRef(u64::from(reference)))
            }
            constants::DW_FORM_ref4 => {
                let reference = section.read_u32(offset)?;
                Ok(FormValue::UnitRef(u64::from(reference)))
            }
            constants::DW_FORM_ref8 => section.read_u64(offset).map(FormValue::UnitRef),
            constants::DW_FORM_ref_udata => section.read_uleb128(offset).map(FormValue::UnitRef),
            constants::DW_FORM_ref_addr => {
                let reference = section.read_word(offset, encoding.format)?;
                Ok(FormValue::DebugInfoRef(reference))
            }
            constants::DW_FORM_ref_sig8 => {
                let signature = section.read_u64(offset)?;
                Ok(FormValue::TypeSignature(DebugTypeSignature(signature)))
            }
            otherwise => Err(Error::UnknownForm(otherwise)),
        }
    }

    /// Project the value to an unsigned constant.
    ///
    /// Returns `None` for values outside the constant class and for
    /// `DW_FORM_sdata` values, whose sign is significant.
    pub fn as_unsigned_constant(&self) -> Option<u64> {
        match *self {
            FormValue::Data1(value) => Some(u64::from(value)),
            FormValue::Data2(value) => Some(u64::from(value)),
            FormValue::Data4(value) => Some(u64::from(value)),
            FormValue::Data8(value) | FormValue::Udata(value) => Some(value),
            _ => None,
        }
    }

    /// Project the value to a signed constant.
    pub fn as_signed_constant(&self) -> Option<i64> {
        match *self {
            FormValue::Sdata(value) => Some(value),
            FormValue::Data1(value) => Some(i64::from(value)),
            FormValue::Data2(value) => Some(i64::from(value)),
            FormValue::Data4(value) => Some(i64::from(value)),
            FormValue::Data8(value) | FormValue::Udata(value) => {
                if value <= i64::MAX as u64 {
                    Some(value as i64)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    /// Project the value to a boolean flag.
    pub fn as_flag(&self) -> Option<bool> {
        match *self {
            FormValue::Flag(value) => Some(value),
            _ => None,
        }
    }

    /// Project the value to an offset into the string section.
    pub fn as_string_offset(&self) -> Option<DebugStrOffset> {
        match *self {
            FormValue::DebugStrRef(offset) => Some(offset),
            _ => None,
        }
    }
}

impl<'input> fmt::Display for FormValue<'input> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            FormValue::Addr(value) => write!(f, "0x{:016x}", value),
            FormValue::Block(block) => {
                for (i, byte) in block.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            FormValue::Data1(value) => write!(f, "0x{:02x}", value),
            FormValue::Data2(value) => write!(f, "0x{:04x}", value),
            FormValue::Data4(value) => write!(f, "0x{:08x}", value),
            FormValue::Data8(value) => write!(f, "0x{:016x}", value),
            FormValue::Sdata(value) => write!(f, "{}", value),
            FormValue::Udata(value) => write!(f, "{}", value),
            FormValue::Flag(value) => write!(f, "{}", value),
            FormValue::SecOffset(value) => write!(f, "0x{:08x}", value),
            FormValue::String(value) => write!(f, "\"{}\"", String::from_utf8_lossy(value)),
            FormValue::DebugStrRef(DebugStrOffset(value)) => write!(f, "0x{:08x}", value),
            FormValue::UnitRef(value) => write!(f, "0x{:08x}", value),
            FormValue::DebugInfoRef(value) => write!(f, "0x{:08x}", value),
            FormValue::TypeSignature(DebugTypeSignature(value)) => write!(f, "0x{:016x}", value),
        }
    }
}
