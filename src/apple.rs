//! The Apple accelerator table format.
//!
//! This is the hash-based name lookup table emitted by Apple toolchains into
//! the `.apple_names`, `.apple_types`, `.apple_namespaces` and `.apple_objc`
//! sections. All four sections share one layout: a fixed header, an atom
//! descriptor that plays the role of an abbreviation for every hash-match
//! payload, parallel bucket/hash/offset arrays, and name chains of
//! form-encoded payloads.

use std::fmt::Write;

use crate::constants;
use crate::constants::{DwAtom, DwForm, DwTag};
use crate::dump::{DictScope, ListScope, ScopedPrinter};
use crate::endianity::Endianity;
use crate::extractor::{DataExtractor, RelocationMap};
use crate::form::{FormClass, FormValue};
use crate::{Encoding, Error, Format, Result};

/// Compute the DJB hash of `bytes`, the hash function used by the Apple
/// accelerator tables.
pub fn djb_hash(bytes: &[u8]) -> u32 {
    let mut hash = 5381u32;
    for &byte in bytes {
        hash = hash.wrapping_mul(33).wrapping_add(u32::from(byte));
    }
    hash
}

/// The value stored in a bucket whose hash chain is empty.
const EMPTY_BUCKET: u32 = !0;

/// The fixed-size header at the start of an Apple accelerator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppleHeader {
    /// The magic number (`'HASH'` for well-formed producers).
    pub magic: u32,
    /// The format version.
    pub version: u16,
    /// The hash function identifier; only DJB is defined.
    pub hash_function: u16,
    /// The number of buckets.
    pub bucket_count: u32,
    /// The number of hashes (and of offsets).
    pub hash_count: u32,
    /// The length in bytes of the header data that follows the fixed header.
    pub header_data_length: u32,
}

/// A parsed Apple accelerator table.
///
/// The table borrows the accelerator section, its relocations, and the string
/// section from the caller; it stores offsets and the atom descriptor, and
/// decodes hash-match payloads lazily during lookup and dumping.
#[derive(Debug, Clone)]
pub struct AppleAcceleratorTable<'input, Endian>
where
    Endian: Endianity,
{
    section: DataExtractor<'input, Endian>,
    string_section: DataExtractor<'input, Endian>,
    header: AppleHeader,
    die_offset_base: u32,
    atoms: Vec<(DwAtom, DwForm)>,
    buckets_base: u32,
    hashes_base: u32,
    offsets_base: u32,
}

impl<'input, Endian> AppleAcceleratorTable<'input, Endian>
where
    Endian: Endianity,
{
    /// The size of the fixed header in bytes.
    pub const HEADER_SIZE: u32 = 20;

    /// Parse an Apple accelerator table from the raw bytes of one of the
    /// `.apple_*` sections.
    ///
    /// `relocations` are the relocations that apply to the accelerator
    /// section; `string_section` is the string table (usually `.debug_str`)
    /// that the table's name offsets point into.
    pub fn parse(
        section: &'input [u8],
        relocations: &'input RelocationMap,
        string_section: &'input [u8],
        endian: Endian,
    ) -> Result<AppleAcceleratorTable<'input, Endian>> {
        let section = DataExtractor::with_relocations(section, relocations, endian);
        let string_section = DataExtractor::new(string_section, endian);

        if !section.is_valid_range(0, Self::HEADER_SIZE) {
            return Err(Error::HeaderTruncated);
        }

        let mut offset = 0;
        let header = AppleHeader {
            magic: section.read_u32(&mut offset)?,
            version: section.read_u16(&mut offset)?,
            hash_function: section.read_u16(&mut offset)?,
            bucket_count: section.read_u32(&mut offset)?,
            hash_count: section.read_u32(&mut offset)?,
            header_data_length: section.read_u32(&mut offset)?,
        };

        // The whole index must be present: header, header data, buckets, and
        // the parallel hash and offset arrays. The `- 1` turns the size into
        // the largest offset the index touches, so that an empty table whose
        // arrays end exactly at the section end is accepted.
        let index_end = u64::from(Self::HEADER_SIZE)
            + u64::from(header.header_data_length)
            + u64::from(header.bucket_count) * 4
            + u64::from(header.hash_count) * 8;
        if index_end - 1 >= section.len() as u64 {
            return Err(Error::BucketsTruncated);
        }

        let die_offset_base = section.read_u32(&mut offset)?;
        let num_atoms = section.read_u32(&mut offset)?;
        let mut atoms = Vec::new();
        for _ in 0..num_atoms {
            let atom = DwAtom(section.read_u16(&mut offset)?);
            let form = DwForm(u64::from(section.read_u16(&mut offset)?));
            atoms.push((atom, form));
        }

        let buckets_base = Self::HEADER_SIZE + header.header_data_length;
        let hashes_base = buckets_base + header.bucket_count * 4;
        let offsets_base = hashes_base + header.hash_count * 4;

        Ok(AppleAcceleratorTable {
            section,
            string_section,
            header,
            die_offset_base,
            atoms,
            buckets_base,
            hashes_base,
            offsets_base,
        })
    }

    /// Return the table header.
    pub fn header(&self) -> &AppleHeader {
        &self.header
    }

    /// Return the number of buckets.
    pub fn bucket_count(&self) -> u32 {
        self.header.bucket_count
    }

    /// Return the number of hashes.
    pub fn hash_count(&self) -> u32 {
        self.header.hash_count
    }

    /// Return the length in bytes of the header data.
    pub fn header_data_length(&self) -> u32 {
        self.header.header_data_length
    }

    /// Return the base offset that DIE offsets in this table are relative to.
    pub fn die_offset_base(&self) -> u32 {
        self.die_offset_base
    }

    /// Return the atom descriptor: the `(atom, form)` pairs that every
    /// hash-match payload is encoded with.
    pub fn atoms(&self) -> &[(DwAtom, DwForm)] {
        &self.atoms
    }

    fn encoding(&self) -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version: self.header.version,
            address_size: 0,
        }
    }

    /// Check that the atoms this table carries can be decoded.
    ///
    /// Returns false if any atom describing a DIE offset, DIE tag, or type
    /// flags uses a form outside the constant and flag classes, or uses
    /// `DW_FORM_sdata`.
    pub fn validate_forms(&self) -> bool {
        for &(atom, form) in &self.atoms {
            match atom {
                constants::DW_ATOM_die_offset
                | constants::DW_ATOM_die_tag
                | constants::DW_ATOM_type_flags => {
                    let class = FormClass::of(form);
                    if (class != FormClass::Constant && class != FormClass::Flag)
                        || form == constants::DW_FORM_sdata
                    {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }

    /// Decode one hash-match payload at `offset`, advancing it, and return
    /// the DIE offset and DIE tag it carries.
    ///
    /// Atoms other than `DW_ATOM_die_offset` and `DW_ATOM_die_tag` are
    /// decoded and discarded. Missing atoms leave the defaults
    /// (`DW_INVALID_OFFSET`, `DW_TAG_null`) in place.
    pub fn read_atoms(&self, offset: &mut u32) -> Result<(u32, DwTag)> {
        let mut die_offset = constants::DW_INVALID_OFFSET;
        let mut die_tag = constants::DW_TAG_null;
        let encoding = self.encoding();

        for &(atom, form) in &self.atoms {
            let value = FormValue::parse(self.section, offset, form, encoding)?;
            match atom {
                constants::DW_ATOM_die_offset => {
                    if let Some(value) = value.as_unsigned_constant() {
                        die_offset = value as u32;
                    }
                }
                constants::DW_ATOM_die_tag => {
                    if let Some(value) = value.as_unsigned_constant() {
                        die_tag = DwTag(value);
                    }
                }
                _ => {}
            }
        }
        Ok((die_offset, die_tag))
    }

    /// Look up `key` and return an iterator over the payloads recorded for
    /// it. The iterator is empty when the table does not contain `key`.
    pub fn equal_range(&self, key: &[u8]) -> AppleEntryIter<'_, 'input, Endian> {
        match self.lookup(key) {
            Ok(Some(iter)) => iter,
            _ => AppleEntryIter::empty(self),
        }
    }

    fn lookup(&self, key: &[u8]) -> Result<Option<AppleEntryIter<'_, 'input, Endian>>> {
        if self.header.bucket_count == 0 {
            return Ok(None);
        }

        let hash = djb_hash(key);
        let bucket = hash % self.header.bucket_count;

        let mut bucket_offset = self.buckets_base + bucket * 4;
        let index = self.section.read_u32(&mut bucket_offset)?;
        if index == EMPTY_BUCKET {
            return Ok(None);
        }

        // Entries that share a bucket occupy a contiguous run of the hash
        // array, so the walk stops at the first hash from another bucket.
        for hash_idx in index..self.header.hash_count {
            let mut hash_offset = self.hashes_base + hash_idx * 4;
            let stored_hash = self.section.read_u32(&mut hash_offset)?;
            if stored_hash % self.header.bucket_count != bucket {
                break;
            }

            let mut offsets_offset = self.offsets_base + hash_idx * 4;
            let mut data_offset = self.section.read_u32(&mut offsets_offset)?;
            let string_offset = self.section.read_relocated_u32(&mut data_offset)?;
            if string_offset == 0 {
                break;
            }

            let mut name_offset = string_offset;
            let name = self.string_section.read_cstr(&mut name_offset)?;
            if name == key {
                return Ok(Some(AppleEntryIter::new(self, data_offset)));
            }
        }
        Ok(None)
    }

    /// Dump the entire table through `w`.
    pub fn dump<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        {
            let mut scope = DictScope::new(&mut *w, "Header");
            scope.print_hex("Magic", u64::from(self.header.magic));
            scope.print_hex("Version", u64::from(self.header.version));
            scope.print_hex("Hash function", u64::from(self.header.hash_function));
            scope.print_number("Bucket count", u64::from(self.header.bucket_count));
            scope.print_number("Hashes count", u64::from(self.header.hash_count));
            scope.print_number("HeaderData length", u64::from(self.header.header_data_length));
        }

        w.print_number("DIE offset base", u64::from(self.die_offset_base));
        w.print_number("Number of atoms", self.atoms.len() as u64);
        {
            let mut scope = ListScope::new(&mut *w, "Atoms");
            for (i, &(atom, form)) in self.atoms.iter().enumerate() {
                let mut atom_scope = DictScope::new(&mut *scope, &format!("Atom {}", i));
                let _ = writeln!(atom_scope.start_line(), "Type: {}", atom);
                let _ = writeln!(atom_scope.start_line(), "Form: {}", form);
            }
        }

        for bucket in 0..self.header.bucket_count {
            let mut bucket_offset = self.buckets_base + bucket * 4;
            let index = match self.section.read_u32(&mut bucket_offset) {
                Ok(index) => index,
                Err(_) => break,
            };

            let mut scope = ListScope::new(&mut *w, &format!("Bucket {}", bucket));
            if index == EMPTY_BUCKET {
                let _ = writeln!(scope.start_line(), "EMPTY");
                continue;
            }

            for hash_idx in index..self.header.hash_count {
                let mut hash_offset = self.hashes_base + hash_idx * 4;
                let hash = match self.section.read_u32(&mut hash_offset) {
                    Ok(hash) => hash,
                    Err(_) => break,
                };
                if hash % self.header.bucket_count != bucket {
                    break;
                }

                let mut offsets_offset = self.offsets_base + hash_idx * 4;
                let mut data_offset = match self.section.read_u32(&mut offsets_offset) {
                    Ok(offset) => offset,
                    Err(_) => break,
                };

                let mut hash_scope = ListScope::new(&mut *scope, &format!("Hash 0x{:x}", hash));
                if !self.section.is_valid_offset(data_offset) {
                    let _ = writeln!(hash_scope.start_line(), "Invalid section offset");
                    continue;
                }
                while self.dump_name(&mut *hash_scope, &mut data_offset) {}
            }
        }
    }

    // Returns true if more name chain entries may follow, false at the
    // chain's zero terminator or on a malformed chain.
    fn dump_name<P: ScopedPrinter + ?Sized>(&self, w: &mut P, data_offset: &mut u32) -> bool {
        let name_offset = *data_offset;
        if !self.section.is_valid_range(*data_offset, 4) {
            let _ = writeln!(w.start_line(), "Incorrectly terminated list.");
            return false;
        }

        let string_offset = match self.section.read_relocated_u32(data_offset) {
            Ok(offset) => offset,
            Err(_) => return false,
        };
        if string_offset == 0 {
            // End of the chain.
            return false;
        }

        let mut scope = DictScope::new(&mut *w, &format!("Name@0x{:x}", name_offset));
        let mut name_cursor = string_offset;
        match self.string_section.read_cstr(&mut name_cursor) {
            Ok(name) => {
                let _ = writeln!(
                    scope.start_line(),
                    "String: 0x{:08x} \"{}\"",
                    string_offset,
                    String::from_utf8_lossy(name)
                );
            }
            Err(_) => {
                let _ = writeln!(scope.start_line(), "String: 0x{:08x}", string_offset);
            }
        }

        let num_data = match self.section.read_u32(data_offset) {
            Ok(num_data) => num_data,
            Err(_) => return false,
        };
        let encoding = self.encoding();
        for data in 0..num_data {
            let mut data_scope = ListScope::new(&mut *scope, &format!("Data {}", data));
            for (i, &(_, form)) in self.atoms.iter().enumerate() {
                match FormValue::parse(self.section, data_offset, form, encoding) {
                    Ok(value) => {
                        let _ = writeln!(data_scope.start_line(), "Atom[{}]: {}", i, value);
                    }
                    Err(_) => {
                        let _ = writeln!(
                            data_scope.start_line(),
                            "Atom[{}]: Error extracting the value",
                            i
                        );
                    }
                }
            }
        }
        true
    }
}

/// An entry yielded for one hash match: the payload's form values, paired
/// with the atom types that describe them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleEntry<'input> {
    values: Vec<(DwAtom, FormValue<'input>)>,
}

impl<'input> AppleEntry<'input> {
    /// Return the decoded atom values, in the atom descriptor's order.
    pub fn values(&self) -> &[(DwAtom, FormValue<'input>)] {
        &self.values
    }

    /// Return the value of the first atom with type `atom`, if present.
    pub fn value_for(&self, atom: DwAtom) -> Option<&FormValue<'input>> {
        self.values
            .iter()
            .find(|&&(ty, _)| ty == atom)
            .map(|(_, value)| value)
    }

    /// Return the DIE offset this entry points at, if it carries one.
    pub fn die_offset(&self) -> Option<u32> {
        self.value_for(constants::DW_ATOM_die_offset)
            .and_then(FormValue::as_unsigned_constant)
            .map(|offset| offset as u32)
    }

    /// Return the tag of the DIE this entry points at, if it carries one.
    pub fn die_tag(&self) -> Option<DwTag> {
        self.value_for(constants::DW_ATOM_die_tag)
            .and_then(FormValue::as_unsigned_constant)
            .map(DwTag)
    }
}

/// An iterator over the payloads recorded for one name.
///
/// Returned by [`AppleAcceleratorTable::equal_range`]. A malformed payload
/// exhausts the iterator instead of yielding an error.
#[derive(Debug, Clone)]
pub struct AppleEntryIter<'table, 'input, Endian>
where
    Endian: Endianity,
{
    table: &'table AppleAcceleratorTable<'input, Endian>,
    data_offset: u32,
    num_data: u32,
    data: u32,
}

impl<'table, 'input, Endian> AppleEntryIter<'table, 'input, Endian>
where
    Endian: Endianity,
{
    fn empty(table: &'table AppleAcceleratorTable<'input, Endian>) -> Self {
        AppleEntryIter {
            table,
            data_offset: 0,
            num_data: 0,
            data: 0,
        }
    }

    fn new(table: &'table AppleAcceleratorTable<'input, Endian>, data_offset: u32) -> Self {
        let mut data_offset = data_offset;
        let num_data = match table.section.read_u32(&mut data_offset) {
            Ok(num_data) => num_data,
            Err(_) => 0,
        };
        AppleEntryIter {
            table,
            data_offset,
            num_data,
            data: 0,
        }
    }
}

impl<'table, 'input, Endian> Iterator for AppleEntryIter<'table, 'input, Endian>
where
    Endian: Endianity,
{
    type Item = AppleEntry<'input>;

    fn next(&mut self) -> Option<AppleEntry<'input>> {
        if self.data >= self.num_data {
            return None;
        }

        let encoding = self.table.encoding();
        let mut values = Vec::with_capacity(self.table.atoms.len());
        for &(atom, form) in &self.table.atoms {
            match FormValue::parse(self.table.section, &mut self.data_offset, form, encoding) {
                Ok(value) => values.push((atom, value)),
                Err(_) => {
                    self.num_data = 0;
                    return None;
                }
            }
        }
        self.data += 1;
        Some(AppleEntry { values })
    }
}
