//! A parser for DWARF debug-info accelerator tables.
//!
//! Two on-disk formats coexist in the wild and both are supported here: the
//! legacy Apple accelerator table found in the `.apple_names`, `.apple_types`,
//! `.apple_namespaces` and `.apple_objc` sections, and the standardised
//! DWARF v5 `.debug_names` section. The library parses either section,
//! validates its internal consistency, answers name lookups against the Apple
//! format's hash table, and produces a structured dump of either format.
//!
//! It is the caller's responsibility to read the accelerator section, its
//! relocations, and the accompanying string section out of an object file.
//! The parsed tables borrow those buffers; they store only offsets and small
//! descriptors, and decode per-entry payloads lazily.
//!
//! ```rust,no_run
//! # fn example() -> Result<(), dwarf_accel::Error> {
//! # let (apple_names, debug_str): (&[u8], &[u8]) = (&[], &[]);
//! use dwarf_accel::{AppleAcceleratorTable, LittleEndian, RelocationMap};
//!
//! let relocations = RelocationMap::new();
//! let table = AppleAcceleratorTable::parse(apple_names, &relocations, debug_str, LittleEndian)?;
//! for entry in table.equal_range(b"main") {
//!     println!("DIE at {:?}", entry.die_offset());
//! }
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]

use std::error;
use std::fmt;
use std::result;

mod constants;
pub use crate::constants::*;

mod common;
pub use crate::common::{DebugStrOffset, DebugTypeSignature, Encoding, Format};

mod endianity;
pub use crate::endianity::{BigEndian, Endianity, LittleEndian, NativeEndian, RunTimeEndian};

mod extractor;
pub use crate::extractor::{DataExtractor, RelocationMap};

mod form;
pub use crate::form::{FormClass, FormValue};

mod dump;
pub use crate::dump::{DictScope, IndentPrinter, ListScope, ScopedPrinter};

mod apple;
pub use crate::apple::{djb_hash, AppleAcceleratorTable, AppleEntry, AppleEntryIter, AppleHeader};

mod names;
pub use crate::names::{
    AttributeEncoding, DebugNames, EntryIter, IndexEntry, NameAbbreviation, NameIndex,
    NameIndexHeader, NameTableEntry,
};

#[cfg(test)]
mod test_util;

/// An error that occurred when parsing an accelerator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Hit the end of the section before a read was expected to end.
    UnexpectedEof,
    /// An error parsing an unsigned LEB128 value.
    BadUnsignedLeb128,
    /// An error parsing a signed LEB128 value.
    BadSignedLeb128,
    /// Found an unknown `DW_FORM_*` code.
    UnknownForm(constants::DwForm),
    /// The specified address size is not supported.
    UnsupportedAddressSize(u8),
    /// The section is too small to hold a table header.
    HeaderTruncated,
    /// The section is too small to hold the bucket, hash and offset arrays
    /// its header promises.
    BucketsTruncated,
    /// The section is too small to hold the header's augmentation string.
    AugmentationTruncated,
    /// The section is too small to hold the abbreviation table its header
    /// promises.
    AbbreviationsTruncated,
    /// An abbreviation table ran into the entry pool without a terminator.
    AbbreviationTableUnterminated,
    /// Found an abbreviation code that has already been used.
    DuplicateAbbreviationCode(u32),
    /// An entry list ran past the end of the section without a terminator.
    EntryListUnterminated,
    /// An entry references an abbreviation code that was never declared.
    InvalidAbbreviationCode(u32),
    /// An entry's attribute values could not be decoded under their declared
    /// forms.
    InvalidAttributeValues,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> result::Result<(), fmt::Error> {
        match *self {
            Error::UnexpectedEof => write!(f, "unexpected end of input"),
            Error::BadUnsignedLeb128 => write!(f, "unsigned LEB128 overflow"),
            Error::BadSignedLeb128 => write!(f, "signed LEB128 overflow"),
            Error::UnknownForm(form) => write!(f, "unknown attribute form: 0x{:x}", form.0),
            Error::UnsupportedAddressSize(size) => {
                write!(f, "unsupported address size: {}", size)
            }
            Error::HeaderTruncated => write!(f, "Section too small: cannot read header."),
            Error::BucketsTruncated => {
                write!(f, "Section too small: cannot read buckets and hashes.")
            }
            Error::AugmentationTruncated => {
                write!(f, "Section too small: cannot read header augmentation.")
            }
            Error::AbbreviationsTruncated => {
                write!(f, "Section too small: cannot read abbreviations.")
            }
            Error::AbbreviationTableUnterminated => {
                write!(f, "Incorrectly terminated abbreviation table.")
            }
            Error::DuplicateAbbreviationCode(_) => write!(f, "Duplicate abbreviation code."),
            Error::EntryListUnterminated => write!(f, "Incorrectly terminated entry list"),
            Error::InvalidAbbreviationCode(_) => write!(f, "Invalid abbreviation"),
            Error::InvalidAttributeValues => {
                write!(f, "Error extracting index attribute values")
            }
        }
    }
}

impl error::Error for Error {}

/// The result of a parse.
pub type Result<T> = result::Result<T, Error>;
