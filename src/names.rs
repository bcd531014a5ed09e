//! The DWARF v5 `.debug_names` section.
//!
//! A `.debug_names` section is a chain of name index units. Each unit carries
//! its own header, compile/type-unit offset arrays, an optional hash table,
//! a name table, an abbreviation table, and an entry pool. The abbreviation
//! table makes the entry pool self-describing: every pool entry starts with an
//! abbreviation code whose declaration lists the `(index, form)` attribute
//! pairs that follow.

use std::convert::TryFrom;
use std::fmt::Write;

use indexmap::map::Entry as MapEntry;
use indexmap::IndexMap;

use crate::constants::{DwForm, DwIdx, DwTag};
use crate::dump::{DictScope, ListScope, ScopedPrinter};
use crate::endianity::Endianity;
use crate::extractor::{DataExtractor, RelocationMap};
use crate::form::FormValue;
use crate::{Encoding, Error, Format, Result};

/// The header of one name index unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameIndexHeader<'input> {
    unit_length: u32,
    version: u16,
    padding: u16,
    comp_unit_count: u32,
    local_type_unit_count: u32,
    foreign_type_unit_count: u32,
    bucket_count: u32,
    name_count: u32,
    abbrev_table_size: u32,
    augmentation_string_size: u32,
    augmentation_string: &'input [u8],
}

impl<'input> NameIndexHeader<'input> {
    /// The size of the fixed part of the header in bytes.
    const SIZE: u32 = 36;

    /// Return the unit length: the number of bytes in the unit after the
    /// length field itself.
    pub fn unit_length(&self) -> u32 {
        self.unit_length
    }

    /// Return the version of the name index format.
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Return the header's padding field.
    pub fn padding(&self) -> u16 {
        self.padding
    }

    /// Return the number of compile units in the CU offset array.
    pub fn comp_unit_count(&self) -> u32 {
        self.comp_unit_count
    }

    /// Return the number of local type units in the local TU offset array.
    pub fn local_type_unit_count(&self) -> u32 {
        self.local_type_unit_count
    }

    /// Return the number of foreign type units in the foreign TU signature
    /// array.
    pub fn foreign_type_unit_count(&self) -> u32 {
        self.foreign_type_unit_count
    }

    /// Return the number of buckets in the hash table; zero means the unit
    /// has no hash table at all.
    pub fn bucket_count(&self) -> u32 {
        self.bucket_count
    }

    /// Return the number of names in the name table.
    pub fn name_count(&self) -> u32 {
        self.name_count
    }

    /// Return the size of the abbreviation table in bytes.
    pub fn abbrev_table_size(&self) -> u32 {
        self.abbrev_table_size
    }

    /// Return the size of the augmentation string in bytes.
    pub fn augmentation_string_size(&self) -> u32 {
        self.augmentation_string_size
    }

    /// Return the augmentation string.
    pub fn augmentation_string(&self) -> &'input [u8] {
        self.augmentation_string
    }
}

/// One `(index, form)` attribute declaration within an abbreviation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeEncoding {
    /// What the attribute's value denotes.
    pub index: DwIdx,
    /// How the attribute's value is encoded.
    pub form: DwForm,
}

/// An abbreviation declaration from a name index unit's abbreviation table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameAbbreviation {
    code: u32,
    tag: DwTag,
    attributes: Vec<AttributeEncoding>,
}

impl NameAbbreviation {
    /// Return the abbreviation's code.
    pub fn code(&self) -> u32 {
        self.code
    }

    /// Return the tag of the DIEs this abbreviation describes.
    pub fn tag(&self) -> DwTag {
        self.tag
    }

    /// Return the attribute declarations, in entry-pool order.
    pub fn attributes(&self) -> &[AttributeEncoding] {
        &self.attributes
    }

    /// Dump the abbreviation through `w`.
    pub fn dump<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        let mut scope = DictScope::new(&mut *w, &format!("Abbreviation 0x{:x}", self.code));
        let _ = writeln!(scope.start_line(), "Tag: {}", self.tag);
        for attr in &self.attributes {
            let _ = writeln!(scope.start_line(), "{}: {}", attr.index, attr.form);
        }
    }
}

/// One entry decoded from a unit's entry pool.
///
/// The abbreviation is borrowed from the owning [`NameIndex`]; the values are
/// decoded afresh for every entry, with the *i*-th value encoded under the
/// *i*-th attribute declaration's form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry<'index, 'input> {
    abbrev: &'index NameAbbreviation,
    values: Vec<FormValue<'input>>,
}

impl<'index, 'input> IndexEntry<'index, 'input> {
    /// Return the abbreviation this entry was decoded with.
    pub fn abbreviation(&self) -> &'index NameAbbreviation {
        self.abbrev
    }

    /// Return the tag of the DIE this entry describes.
    pub fn tag(&self) -> DwTag {
        self.abbrev.tag
    }

    /// Return the decoded attribute values, in declaration order.
    pub fn values(&self) -> &[FormValue<'input>] {
        &self.values
    }

    /// Return the value of the first attribute with the given index code.
    pub fn value_for(&self, index: DwIdx) -> Option<&FormValue<'input>> {
        self.abbrev
            .attributes
            .iter()
            .zip(&self.values)
            .find(|(attr, _)| attr.index == index)
            .map(|(_, value)| value)
    }

    /// Dump the entry's fields through `w`.
    pub fn dump<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        w.print_hex("Abbrev", u64::from(self.abbrev.code));
        let _ = writeln!(w.start_line(), "Tag: {}", self.abbrev.tag);
        for (attr, value) in self.abbrev.attributes.iter().zip(&self.values) {
            let _ = writeln!(w.start_line(), "{}: {}", attr.index, value);
        }
    }
}

/// One row of a unit's name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameTableEntry {
    /// The offset of the name's string in the string section.
    pub string_offset: u32,
    /// The absolute offset of the name's first entry in the accelerator
    /// section (rebased from the on-disk entry-pool-relative form).
    pub entry_offset: u32,
}

/// A single name index unit from a `.debug_names` section.
#[derive(Debug, Clone)]
pub struct NameIndex<'input, Endian>
where
    Endian: Endianity,
{
    section: DataExtractor<'input, Endian>,
    string_section: DataExtractor<'input, Endian>,
    base: u32,
    header: NameIndexHeader<'input>,
    cus_base: u32,
    buckets_base: u32,
    hashes_base: u32,
    string_offsets_base: u32,
    entry_offsets_base: u32,
    entries_base: u32,
    abbrevs: IndexMap<u32, NameAbbreviation>,
}

impl<'input, Endian> NameIndex<'input, Endian>
where
    Endian: Endianity,
{
    /// Parse the name index unit rooted at `base` within the accelerator
    /// section.
    pub fn parse(
        section: DataExtractor<'input, Endian>,
        string_section: DataExtractor<'input, Endian>,
        base: u32,
    ) -> Result<NameIndex<'input, Endian>> {
        if !section.is_valid_range(base, NameIndexHeader::SIZE) {
            return Err(Error::HeaderTruncated);
        }

        let mut offset = base;
        let unit_length = section.read_u32(&mut offset)?;
        let version = section.read_u16(&mut offset)?;
        let padding = section.read_u16(&mut offset)?;
        let comp_unit_count = section.read_u32(&mut offset)?;
        let local_type_unit_count = section.read_u32(&mut offset)?;
        let foreign_type_unit_count = section.read_u32(&mut offset)?;
        let bucket_count = section.read_u32(&mut offset)?;
        let name_count = section.read_u32(&mut offset)?;
        let abbrev_table_size = section.read_u32(&mut offset)?;
        let augmentation_string_size = section.read_u32(&mut offset)?;

        if !section.is_valid_range(offset, augmentation_string_size) {
            return Err(Error::AugmentationTruncated);
        }
        let augmentation_string = section.read_slice(&mut offset, augmentation_string_size)?;

        let header = NameIndexHeader {
            unit_length,
            version,
            padding,
            comp_unit_count,
            local_type_unit_count,
            foreign_type_unit_count,
            bucket_count,
            name_count,
            abbrev_table_size,
            augmentation_string_size,
            augmentation_string,
        };

        // Pad out to a four-byte boundary, then lay out the region bases.
        // The arithmetic is done in u64 so hostile counts turn into a
        // truncation error rather than wrapping.
        let mut cursor = (u64::from(offset) + 3) & !3;
        let cus_base = cursor;
        cursor += u64::from(comp_unit_count) * 4;
        cursor += u64::from(local_type_unit_count) * 4;
        cursor += u64::from(foreign_type_unit_count) * 8;
        let buckets_base = cursor;
        cursor += u64::from(bucket_count) * 4;
        let hashes_base = cursor;
        if bucket_count > 0 {
            cursor += u64::from(name_count) * 4;
        }
        let string_offsets_base = cursor;
        cursor += u64::from(name_count) * 4;
        let entry_offsets_base = cursor;
        cursor += u64::from(name_count) * 4;

        if cursor + u64::from(abbrev_table_size) > section.len() as u64 {
            return Err(Error::AbbreviationsTruncated);
        }
        let entries_base = (cursor + u64::from(abbrev_table_size)) as u32;

        let mut abbrevs = IndexMap::new();
        let mut abbrev_offset = cursor as u32;
        while let Some(abbrev) = Self::parse_abbrev(section, &mut abbrev_offset, entries_base)? {
            match abbrevs.entry(abbrev.code) {
                MapEntry::Occupied(_) => {
                    return Err(Error::DuplicateAbbreviationCode(abbrev.code));
                }
                MapEntry::Vacant(entry) => {
                    entry.insert(abbrev);
                }
            }
        }

        Ok(NameIndex {
            section,
            string_section,
            base,
            header,
            cus_base: cus_base as u32,
            buckets_base: buckets_base as u32,
            hashes_base: hashes_base as u32,
            string_offsets_base: string_offsets_base as u32,
            entry_offsets_base: entry_offsets_base as u32,
            entries_base,
            abbrevs,
        })
    }

    // Parse one abbreviation declaration; `None` is the table's terminator.
    // No read may step past `entries_base`, where the entry pool begins.
    fn parse_abbrev(
        section: DataExtractor<'input, Endian>,
        offset: &mut u32,
        entries_base: u32,
    ) -> Result<Option<NameAbbreviation>> {
        if *offset >= entries_base {
            return Err(Error::AbbreviationTableUnterminated);
        }
        let code = section.read_uleb128(offset)? as u32;
        if code == 0 {
            return Ok(None);
        }
        let tag = DwTag(section.read_uleb128(offset)?);

        let mut attributes = Vec::new();
        loop {
            if *offset >= entries_base {
                return Err(Error::AbbreviationTableUnterminated);
            }
            let index = DwIdx(section.read_uleb128(offset)?);
            let form = DwForm(section.read_uleb128(offset)?);
            if index.0 == 0 && form.0 == 0 {
                break;
            }
            attributes.push(AttributeEncoding { index, form });
        }
        Ok(Some(NameAbbreviation {
            code,
            tag,
            attributes,
        }))
    }

    /// Return the unit's header.
    pub fn header(&self) -> &NameIndexHeader<'input> {
        &self.header
    }

    /// Return the offset of this unit within the accelerator section.
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Return the offset at which the next unit would start.
    pub fn next_unit_offset(&self) -> u64 {
        u64::from(self.base) + 4 + u64::from(self.header.unit_length)
    }

    /// Return the absolute offset of the unit's entry pool.
    pub fn entries_base(&self) -> u32 {
        self.entries_base
    }

    /// Return the abbreviation with the given code, if declared.
    pub fn abbreviation(&self, code: u32) -> Option<&NameAbbreviation> {
        self.abbrevs.get(&code)
    }

    /// Iterate the unit's abbreviations in declaration order.
    pub fn abbreviations(&self) -> impl Iterator<Item = &NameAbbreviation> {
        self.abbrevs.values()
    }

    fn encoding(&self) -> Encoding {
        Encoding {
            format: Format::Dwarf32,
            version: self.header.version,
            address_size: 0,
        }
    }

    /// Read the offset of compile unit `cu` (0-based) from the CU offset
    /// array. The read is relocated.
    pub fn cu_offset(&self, cu: u32) -> Result<u32> {
        debug_assert!(cu < self.header.comp_unit_count);
        let mut offset = self.cus_base + 4 * cu;
        self.section.read_relocated_u32(&mut offset)
    }

    /// Read the offset of local type unit `tu` (0-based) from the local TU
    /// offset array. The read is relocated.
    pub fn local_tu_offset(&self, tu: u32) -> Result<u32> {
        debug_assert!(tu < self.header.local_type_unit_count);
        let mut offset = self.cus_base + 4 * self.header.comp_unit_count + 4 * tu;
        self.section.read_relocated_u32(&mut offset)
    }

    /// Read the signature of foreign type unit `tu` (0-based) from the
    /// foreign TU signature array.
    pub fn foreign_tu_signature(&self, tu: u32) -> Result<u64> {
        debug_assert!(tu < self.header.foreign_type_unit_count);
        let mut offset = self.cus_base
            + 4 * (self.header.comp_unit_count + self.header.local_type_unit_count)
            + 8 * tu;
        self.section.read_u64(&mut offset)
    }

    /// Read row `index` (1-based) of the name table.
    ///
    /// The string offset is relocated; the entry offset is rebased from its
    /// on-disk entry-pool-relative form to an absolute section offset.
    pub fn name_table_entry(&self, index: u32) -> Result<NameTableEntry> {
        debug_assert!(index > 0 && index <= self.header.name_count);
        let mut string_offset_offset = self.string_offsets_base + 4 * (index - 1);
        let mut entry_offset_offset = self.entry_offsets_base + 4 * (index - 1);

        let string_offset = self.section.read_relocated_u32(&mut string_offset_offset)?;
        let entry_offset = self.section.read_u32(&mut entry_offset_offset)?;
        Ok(NameTableEntry {
            string_offset,
            entry_offset: entry_offset.wrapping_add(self.entries_base),
        })
    }

    /// Read bucket `bucket` (0-based): the 1-based index of the first name in
    /// the bucket's chain, or zero for an empty bucket.
    pub fn bucket_array_entry(&self, bucket: u32) -> Result<u32> {
        debug_assert!(bucket < self.header.bucket_count);
        let mut offset = self.buckets_base + 4 * bucket;
        self.section.read_u32(&mut offset)
    }

    /// Read the hash of name `index` (1-based) from the hash array.
    pub fn hash_array_entry(&self, index: u32) -> Result<u32> {
        debug_assert!(index > 0 && index <= self.header.name_count);
        let mut offset = self.hashes_base + 4 * (index - 1);
        self.section.read_u32(&mut offset)
    }

    /// Decode the entry at `offset` within the entry pool, advancing
    /// `offset` past it.
    ///
    /// Returns `Ok(None)` at the zero abbreviation code that terminates an
    /// entry list.
    pub fn entry(&self, offset: &mut u32) -> Result<Option<IndexEntry<'_, 'input>>> {
        if !self.section.is_valid_offset(*offset) {
            return Err(Error::EntryListUnterminated);
        }
        let code = self.section.read_uleb128(offset)? as u32;
        if code == 0 {
            return Ok(None);
        }
        let abbrev = self
            .abbrevs
            .get(&code)
            .ok_or(Error::InvalidAbbreviationCode(code))?;

        let encoding = self.encoding();
        let mut values = Vec::with_capacity(abbrev.attributes.len());
        for attr in &abbrev.attributes {
            let value = FormValue::parse(self.section, offset, attr.form, encoding)
                .map_err(|_| Error::InvalidAttributeValues)?;
            values.push(value);
        }
        Ok(Some(IndexEntry { abbrev, values }))
    }

    /// Iterate the entry list that starts at `offset` within the entry pool.
    pub fn entries(&self, offset: u32) -> EntryIter<'_, 'input, Endian> {
        EntryIter {
            index: self,
            offset,
            done: false,
        }
    }

    /// Dump the entire unit through `w`.
    pub fn dump<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        let mut scope = DictScope::new(&mut *w, &format!("Name Index @ 0x{:x}", self.base));
        self.dump_header(&mut *scope);
        self.dump_cus(&mut *scope);
        self.dump_local_tus(&mut *scope);
        self.dump_foreign_tus(&mut *scope);
        {
            let mut abbrev_scope = ListScope::new(&mut *scope, "Abbreviations");
            for abbrev in self.abbrevs.values() {
                abbrev.dump(&mut *abbrev_scope);
            }
        }

        if self.header.bucket_count > 0 {
            for bucket in 0..self.header.bucket_count {
                self.dump_bucket(&mut *scope, bucket);
            }
            return;
        }

        let _ = writeln!(scope.start_line(), "Hash table not present");
        for index in 1..=self.header.name_count {
            self.dump_name(&mut *scope, index, None);
        }
    }

    fn dump_header<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        let mut scope = DictScope::new(&mut *w, "Header");
        scope.print_hex("Length", u64::from(self.header.unit_length));
        scope.print_number("Version", u64::from(self.header.version));
        scope.print_hex("Padding", u64::from(self.header.padding));
        scope.print_number("CU count", u64::from(self.header.comp_unit_count));
        scope.print_number("Local TU count", u64::from(self.header.local_type_unit_count));
        scope.print_number(
            "Foreign TU count",
            u64::from(self.header.foreign_type_unit_count),
        );
        scope.print_number("Bucket count", u64::from(self.header.bucket_count));
        scope.print_number("Name count", u64::from(self.header.name_count));
        scope.print_hex(
            "Abbreviations table size",
            u64::from(self.header.abbrev_table_size),
        );
        let _ = writeln!(
            scope.start_line(),
            "Augmentation: '{}'",
            String::from_utf8_lossy(self.header.augmentation_string)
        );
    }

    fn dump_cus<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        let mut scope = ListScope::new(&mut *w, "Compilation Unit offsets");
        for cu in 0..self.header.comp_unit_count {
            match self.cu_offset(cu) {
                Ok(offset) => {
                    let _ = writeln!(scope.start_line(), "CU[{}]: 0x{:08x}", cu, offset);
                }
                Err(error) => {
                    let _ = writeln!(scope.start_line(), "CU[{}]: {}", cu, error);
                }
            }
        }
    }

    fn dump_local_tus<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        if self.header.local_type_unit_count == 0 {
            return;
        }
        let mut scope = ListScope::new(&mut *w, "Local Type Unit offsets");
        for tu in 0..self.header.local_type_unit_count {
            match self.local_tu_offset(tu) {
                Ok(offset) => {
                    let _ = writeln!(scope.start_line(), "LocalTU[{}]: 0x{:08x}", tu, offset);
                }
                Err(error) => {
                    let _ = writeln!(scope.start_line(), "LocalTU[{}]: {}", tu, error);
                }
            }
        }
    }

    fn dump_foreign_tus<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        if self.header.foreign_type_unit_count == 0 {
            return;
        }
        let mut scope = ListScope::new(&mut *w, "Foreign Type Unit signatures");
        for tu in 0..self.header.foreign_type_unit_count {
            match self.foreign_tu_signature(tu) {
                Ok(signature) => {
                    let _ = writeln!(scope.start_line(), "ForeignTU[{}]: 0x{:016x}", tu, signature);
                }
                Err(error) => {
                    let _ = writeln!(scope.start_line(), "ForeignTU[{}]: {}", tu, error);
                }
            }
        }
    }

    fn dump_bucket<P: ScopedPrinter + ?Sized>(&self, w: &mut P, bucket: u32) {
        let mut scope = ListScope::new(&mut *w, &format!("Bucket {}", bucket));
        let index = match self.bucket_array_entry(bucket) {
            Ok(index) => index,
            Err(error) => {
                let _ = writeln!(scope.start_line(), "{}", error);
                return;
            }
        };
        if index == 0 {
            let _ = writeln!(scope.start_line(), "EMPTY");
            return;
        }
        if index > self.header.name_count {
            let _ = writeln!(scope.start_line(), "Name index is invalid");
            return;
        }

        for index in index..=self.header.name_count {
            let hash = match self.hash_array_entry(index) {
                Ok(hash) => hash,
                Err(error) => {
                    let _ = writeln!(scope.start_line(), "{}", error);
                    return;
                }
            };
            if hash % self.header.bucket_count != bucket {
                break;
            }
            self.dump_name(&mut *scope, index, Some(hash));
        }
    }

    fn dump_name<P: ScopedPrinter + ?Sized>(&self, w: &mut P, index: u32, hash: Option<u32>) {
        let mut scope = DictScope::new(&mut *w, &format!("Name {}", index));
        if let Some(hash) = hash {
            scope.print_hex("Hash", u64::from(hash));
        }

        let name_table_entry = match self.name_table_entry(index) {
            Ok(entry) => entry,
            Err(error) => {
                let _ = writeln!(scope.start_line(), "{}", error);
                return;
            }
        };

        let mut string_cursor = name_table_entry.string_offset;
        match self.string_section.read_cstr(&mut string_cursor) {
            Ok(name) => {
                let _ = writeln!(
                    scope.start_line(),
                    "String: 0x{:08x} \"{}\"",
                    name_table_entry.string_offset,
                    String::from_utf8_lossy(name)
                );
            }
            Err(_) => {
                let _ = writeln!(
                    scope.start_line(),
                    "String: 0x{:08x}",
                    name_table_entry.string_offset
                );
            }
        }

        let mut offset = name_table_entry.entry_offset;
        while self.dump_entry(&mut *scope, &mut offset) {}
    }

    // Returns true if more entries may follow. A parse error is printed
    // through the sink and stops this entry list only; the remaining lists
    // still dump.
    fn dump_entry<P: ScopedPrinter + ?Sized>(&self, w: &mut P, offset: &mut u32) -> bool {
        let entry_id = *offset;
        match self.entry(offset) {
            Ok(Some(entry)) => {
                let mut scope = DictScope::new(&mut *w, &format!("Entry @ 0x{:x}", entry_id));
                entry.dump(&mut *scope);
                true
            }
            Ok(None) => false,
            Err(error) => {
                let _ = writeln!(w.start_line(), "{}", error);
                false
            }
        }
    }
}

/// An iterator over one name's entry list in the entry pool.
///
/// Returned by [`NameIndex::entries`]. Iteration ends at the list's zero
/// terminator; a malformed entry yields its error and then ends iteration.
#[derive(Debug, Clone)]
pub struct EntryIter<'index, 'input, Endian>
where
    Endian: Endianity,
{
    index: &'index NameIndex<'input, Endian>,
    offset: u32,
    done: bool,
}

impl<'index, 'input, Endian> EntryIter<'index, 'input, Endian>
where
    Endian: Endianity,
{
    /// Advance the iterator and return the next entry.
    ///
    /// Returns `Ok(None)` when the entry list is exhausted.
    pub fn next(&mut self) -> Result<Option<IndexEntry<'index, 'input>>> {
        if self.done {
            return Ok(None);
        }
        match self.index.entry(&mut self.offset) {
            Ok(Some(entry)) => Ok(Some(entry)),
            Ok(None) => {
                self.done = true;
                Ok(None)
            }
            Err(error) => {
                self.done = true;
                Err(error)
            }
        }
    }
}

#[cfg(feature = "fallible-iterator")]
impl<'index, 'input, Endian> fallible_iterator::FallibleIterator
    for EntryIter<'index, 'input, Endian>
where
    Endian: Endianity,
{
    type Item = IndexEntry<'index, 'input>;
    type Error = Error;

    fn next(&mut self) -> Result<Option<IndexEntry<'index, 'input>>> {
        EntryIter::next(self)
    }
}

/// The `DebugNames` struct represents the name index information found in
/// the `.debug_names` section.
#[derive(Debug, Clone)]
pub struct DebugNames<'input, Endian>
where
    Endian: Endianity,
{
    indices: Vec<NameIndex<'input, Endian>>,
}

impl<'input, Endian> DebugNames<'input, Endian>
where
    Endian: Endianity,
{
    /// Parse every name index unit in the raw bytes of a `.debug_names`
    /// section.
    ///
    /// `relocations` are the relocations that apply to the section;
    /// `string_section` is the string table (usually `.debug_str`) that the
    /// units' name offsets point into. Parsing stops at the first malformed
    /// unit.
    pub fn parse(
        section: &'input [u8],
        relocations: &'input RelocationMap,
        string_section: &'input [u8],
        endian: Endian,
    ) -> Result<DebugNames<'input, Endian>> {
        let section = DataExtractor::with_relocations(section, relocations, endian);
        let string_section = DataExtractor::new(string_section, endian);

        let mut indices = Vec::new();
        let mut offset = 0u32;
        while section.is_valid_offset(offset) {
            let index = NameIndex::parse(section, string_section, offset)?;
            let next = index.next_unit_offset();
            indices.push(index);
            offset = match u32::try_from(next) {
                Ok(next) => next,
                Err(_) => break,
            };
        }
        Ok(DebugNames { indices })
    }

    /// Return the parsed name index units.
    pub fn name_indices(&self) -> &[NameIndex<'input, Endian>] {
        &self.indices
    }

    /// Iterate over the parsed name index units.
    pub fn iter(&self) -> std::slice::Iter<'_, NameIndex<'input, Endian>> {
        self.indices.iter()
    }

    /// Dump every name index unit through `w`.
    pub fn dump<P: ScopedPrinter + ?Sized>(&self, w: &mut P) {
        for index in &self.indices {
            index.dump(w);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apple::djb_hash;
    use crate::constants;
    use crate::dump::IndentPrinter;
    use crate::endianity::LittleEndian;
    use crate::test_util::AccelSectionMethods;
    use test_assembler::{Endian, Section};

    // A string section with "foo" at offset 5, "bar" at 9, and "baz" at 13.
    const STRINGS: &[u8] = b"\0\0\0\0\0foo\0bar\0baz\0";

    fn empty_relocations() -> RelocationMap {
        RelocationMap::new()
    }

    fn unit_header(
        unit_length: u32,
        cu_count: u32,
        bucket_count: u32,
        name_count: u32,
        abbrev_table_size: u32,
    ) -> Section {
        Section::with_endian(Endian::Little)
            .L32(unit_length)
            .L16(5)
            .L16(0)
            .L32(cu_count)
            .L32(0)
            .L32(0)
            .L32(bucket_count)
            .L32(name_count)
            .L32(abbrev_table_size)
            .L32(0)
    }

    // One unit, one CU, two buckets, two names ("bar" is name 1 in bucket 0,
    // "foo" is name 2 in bucket 1), one abbreviation.
    //
    // Layout: header(36) + CU(4) + buckets(8) + hashes(8) + string
    // offsets(8) + entry offsets(8) + abbrev table(7) puts the entry pool at
    // offset 79.
    fn two_name_unit() -> Vec<u8> {
        unit_header(87, 1, 2, 2, 7)
            .L32(0x1000)
            // Buckets: 1-based name indices.
            .L32(1)
            .L32(2)
            // Hashes.
            .L32(djb_hash(b"bar"))
            .L32(djb_hash(b"foo"))
            // String offsets.
            .L32(9)
            .L32(5)
            // Entry offsets, relative to the entry pool.
            .L32(0)
            .L32(6)
            // Abbreviation table: code 1, DW_TAG_subprogram,
            // DW_IDX_die_offset/DW_FORM_data4.
            .uleb(1)
            .uleb(0x2e)
            .uleb(3)
            .uleb(6)
            .uleb(0)
            .uleb(0)
            .uleb(0)
            // Entry pool.
            .uleb(1)
            .L32(0x64)
            .uleb(0)
            .uleb(1)
            .L32(0xc8)
            .uleb(0)
            .get_contents()
            .unwrap()
    }

    #[test]
    fn test_parse_two_name_unit() {
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        assert_eq!(debug_names.name_indices().len(), 1);

        let index = &debug_names.name_indices()[0];
        let header = index.header();
        assert_eq!(header.unit_length(), 87);
        assert_eq!(header.version(), 5);
        assert_eq!(header.comp_unit_count(), 1);
        assert_eq!(header.bucket_count(), 2);
        assert_eq!(header.name_count(), 2);
        assert_eq!(header.abbrev_table_size(), 7);
        assert_eq!(header.augmentation_string(), b"");
        assert_eq!(index.base(), 0);
        assert_eq!(index.entries_base(), 79);
        assert_eq!(index.cu_offset(0), Ok(0x1000));

        let abbrevs: Vec<_> = index.abbreviations().collect();
        assert_eq!(abbrevs.len(), 1);
        assert_eq!(abbrevs[0].code(), 1);
        assert_eq!(abbrevs[0].tag(), constants::DW_TAG_subprogram);
        assert_eq!(
            abbrevs[0].attributes(),
            &[AttributeEncoding {
                index: constants::DW_IDX_die_offset,
                form: constants::DW_FORM_data4,
            }]
        );
        assert_eq!(index.abbreviation(1), Some(abbrevs[0]));
        assert_eq!(index.abbreviation(2), None);
    }

    #[test]
    fn test_name_table_and_hash_access() {
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let index = &debug_names.name_indices()[0];

        let first = index.name_table_entry(1).unwrap();
        assert_eq!(first.string_offset, 9);
        assert_eq!(first.entry_offset, 79);
        let second = index.name_table_entry(2).unwrap();
        assert_eq!(second.string_offset, 5);
        assert_eq!(second.entry_offset, 85);

        // Every rebased entry offset lies within the entry pool.
        for name in 1..=index.header().name_count() {
            let entry_offset = index.name_table_entry(name).unwrap().entry_offset;
            assert!(entry_offset >= index.entries_base());
            assert!((entry_offset as usize) < buf.len());
        }

        assert_eq!(index.bucket_array_entry(0), Ok(1));
        assert_eq!(index.bucket_array_entry(1), Ok(2));
        assert_eq!(index.hash_array_entry(1), Ok(djb_hash(b"bar")));
        assert_eq!(index.hash_array_entry(2), Ok(djb_hash(b"foo")));
    }

    #[test]
    fn test_entry_decoding() {
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let index = &debug_names.name_indices()[0];

        let mut offset = index.name_table_entry(1).unwrap().entry_offset;
        let entry = index.entry(&mut offset).unwrap().unwrap();
        assert_eq!(entry.tag(), constants::DW_TAG_subprogram);
        assert_eq!(entry.abbreviation().code(), 1);
        assert_eq!(entry.values(), &[crate::FormValue::Data4(0x64)]);
        assert_eq!(
            entry.value_for(constants::DW_IDX_die_offset),
            Some(&crate::FormValue::Data4(0x64))
        );
        assert_eq!(entry.value_for(constants::DW_IDX_parent), None);
        // The next read hits the list terminator.
        assert_eq!(index.entry(&mut offset), Ok(None));

        let mut iter = index.entries(index.name_table_entry(2).unwrap().entry_offset);
        let entry = iter.next().unwrap().unwrap();
        assert_eq!(entry.values(), &[crate::FormValue::Data4(0xc8)]);
        assert_eq!(iter.next(), Ok(None));
        assert_eq!(iter.next(), Ok(None));
    }

    #[test]
    fn test_entry_invalid_abbreviation() {
        let mut buf = two_name_unit();
        // Corrupt the first pool entry's abbreviation code.
        buf[79] = 2;
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let index = &debug_names.name_indices()[0];

        let mut offset = 79;
        match index.entry(&mut offset) {
            Err(Error::InvalidAbbreviationCode(2)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let index = &debug_names.name_indices()[0];

        let mut offset = buf.len() as u32;
        match index.entry(&mut offset) {
            Err(Error::EntryListUnterminated) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_relocated_cu_offset() {
        let buf = two_name_unit();
        let mut relocations = RelocationMap::new();
        // The CU offset array starts right after the 36 byte header.
        relocations.insert(36, 0x2000);
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        assert_eq!(debug_names.name_indices()[0].cu_offset(0), Ok(0x2000));
    }

    #[test]
    fn test_header_too_small() {
        let buf = [0u8; 20];
        let relocations = empty_relocations();
        match DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian) {
            Err(Error::HeaderTruncated) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_augmentation_too_small() {
        // The header promises an 8 byte augmentation string but only 4 bytes
        // remain.
        let buf = Section::with_endian(Endian::Little)
            .L32(40)
            .L16(5)
            .L16(0)
            .L32(0)
            .L32(0)
            .L32(0)
            .L32(0)
            .L32(0)
            .L32(1)
            .L32(8)
            .L32(0xdead)
            .get_contents()
            .unwrap();
        let relocations = empty_relocations();
        match DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian) {
            Err(Error::AugmentationTruncated) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_abbreviations_too_small() {
        // The promised abbreviation table extends past the section end.
        let buf = unit_header(33, 0, 0, 0, 64).get_contents().unwrap();
        let relocations = empty_relocations();
        match DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian) {
            Err(Error::AbbreviationsTruncated) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_duplicate_abbreviation_code() {
        // Two abbreviations with code 1.
        let buf = unit_header(45, 0, 0, 0, 13)
            .uleb(1)
            .uleb(0x2e)
            .uleb(3)
            .uleb(6)
            .uleb(0)
            .uleb(0)
            .uleb(1)
            .uleb(0x24)
            .uleb(3)
            .uleb(6)
            .uleb(0)
            .uleb(0)
            .uleb(0)
            .get_contents()
            .unwrap();
        let relocations = empty_relocations();
        match DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian) {
            Err(Error::DuplicateAbbreviationCode(1)) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    #[test]
    fn test_unterminated_abbreviation_table() {
        // The abbreviation table region is too small to hold its terminator,
        // so parsing runs into the entry pool boundary.
        let buf = unit_header(39, 0, 0, 0, 3)
            .uleb(1)
            .uleb(0x2e)
            .uleb(3)
            .uleb(6)
            .uleb(0)
            .uleb(0)
            .uleb(0)
            .get_contents()
            .unwrap();
        let relocations = empty_relocations();
        match DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian) {
            Err(Error::AbbreviationTableUnterminated) => {}
            otherwise => panic!("Unexpected result: {:?}", otherwise),
        }
    }

    // A minimal unit: no CUs, no names, an abbreviation table holding only
    // its terminator. 37 bytes long.
    fn minimal_unit() -> Section {
        unit_header(33, 0, 0, 0, 1).uleb(0)
    }

    #[test]
    fn test_chained_units() {
        let first = minimal_unit().get_contents().unwrap();
        let mut buf = first.clone();
        buf.extend_from_slice(&minimal_unit().get_contents().unwrap());

        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let bases: Vec<_> = debug_names.iter().map(NameIndex::base).collect();
        assert_eq!(bases, [0, first.len() as u32]);
    }

    #[test]
    fn test_local_and_foreign_tu_offsets() {
        // One CU, two local TUs, two foreign TUs, no names.
        let mut buf = unit_header(61, 1, 0, 0, 1).get_contents().unwrap();
        // Patch the local/foreign TU counts, which unit_header leaves zero.
        buf[12..16].copy_from_slice(&2u32.to_le_bytes());
        buf[16..20].copy_from_slice(&2u32.to_le_bytes());
        let buf = Section::with_endian(Endian::Little)
            .append_bytes(&buf)
            .L32(0x10)
            .L32(0x20)
            .L32(0x30)
            .L64(0xaaaa)
            .L64(0xbbbb)
            .uleb(0)
            .get_contents()
            .unwrap();

        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();
        let index = &debug_names.name_indices()[0];

        assert_eq!(index.cu_offset(0), Ok(0x10));
        assert_eq!(index.local_tu_offset(0), Ok(0x20));
        assert_eq!(index.local_tu_offset(1), Ok(0x30));
        assert_eq!(index.foreign_tu_signature(0), Ok(0xaaaa));
        assert_eq!(index.foreign_tu_signature(1), Ok(0xbbbb));
    }

    #[test]
    fn test_dump_bucketised() {
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();

        let mut printer = IndentPrinter::new(String::new());
        debug_names.dump(&mut printer);
        let out = printer.into_inner();

        assert!(out.contains("Name Index @ 0x0 {\n"));
        assert!(out.contains("Length: 0x57\n"));
        assert!(out.contains("Augmentation: ''\n"));
        assert!(out.contains("CU[0]: 0x00001000\n"));
        assert!(out.contains("Abbreviation 0x1 {\n"));
        assert!(out.contains("Tag: DW_TAG_subprogram\n"));
        assert!(out.contains("DW_IDX_die_offset: DW_FORM_data4\n"));
        assert!(out.contains("Bucket 0 [\n"));
        assert!(out.contains("Bucket 1 [\n"));
        assert!(out.contains("String: 0x00000009 \"bar\"\n"));
        assert!(out.contains("String: 0x00000005 \"foo\"\n"));
        assert!(out.contains("Entry @ 0x4f {\n"));
        assert!(out.contains("Abbrev: 0x1\n"));
        assert!(out.contains("DW_IDX_die_offset: 0x00000064\n"));
        assert!(out.contains("DW_IDX_die_offset: 0x000000c8\n"));
        assert!(!out.contains("Local Type Unit offsets"));
        assert!(!out.contains("Foreign Type Unit signatures"));
    }

    #[test]
    fn test_dump_without_hash_table() {
        // Three names, no buckets; the names dump in table order.
        //
        // Layout: header(36) + CU(4) + string offsets(12) + entry
        // offsets(12) + abbrev table(7) puts the entry pool at offset 71.
        let buf = unit_header(85, 1, 0, 3, 7)
            .L32(0x1000)
            .L32(5)
            .L32(9)
            .L32(13)
            .L32(0)
            .L32(6)
            .L32(12)
            .uleb(1)
            .uleb(0x2e)
            .uleb(3)
            .uleb(6)
            .uleb(0)
            .uleb(0)
            .uleb(0)
            .uleb(1)
            .L32(0x10)
            .uleb(0)
            .uleb(1)
            .L32(0x20)
            .uleb(0)
            .uleb(1)
            .L32(0x30)
            .uleb(0)
            .get_contents()
            .unwrap();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();

        let mut printer = IndentPrinter::new(String::new());
        debug_names.dump(&mut printer);
        let out = printer.into_inner();

        assert!(out.contains("Hash table not present\n"));
        assert!(!out.contains("Bucket 0 ["));
        let foo = out.find("String: 0x00000005 \"foo\"").unwrap();
        let bar = out.find("String: 0x00000009 \"bar\"").unwrap();
        let baz = out.find("String: 0x0000000d \"baz\"").unwrap();
        assert!(foo < bar && bar < baz);
    }

    #[test]
    fn test_dump_entry_error_stops_one_list_only() {
        let mut buf = two_name_unit();
        // Corrupt name 1's pool entry with an undeclared abbreviation code;
        // name 2's list must still dump.
        buf[79] = 2;
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();

        let mut printer = IndentPrinter::new(String::new());
        debug_names.dump(&mut printer);
        let out = printer.into_inner();

        assert!(out.contains("Invalid abbreviation\n"));
        assert!(out.contains("DW_IDX_die_offset: 0x000000c8\n"));
    }

    #[test]
    fn test_dump_invalid_bucket_index() {
        let mut buf = two_name_unit();
        // Bucket 0 claims its chain starts at name 3, past the name count.
        buf[40..44].copy_from_slice(&3u32.to_le_bytes());
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();

        let mut printer = IndentPrinter::new(String::new());
        debug_names.dump(&mut printer);
        assert!(printer.into_inner().contains("Name index is invalid\n"));
    }

    #[test]
    fn test_bucket_chain_stops_at_next_bucket() {
        // Bucket 0's chain is the single name whose hash is even; walking it
        // must not continue into name 2, whose hash belongs to bucket 1.
        let buf = two_name_unit();
        let relocations = empty_relocations();
        let debug_names =
            DebugNames::parse(&buf, &relocations, STRINGS, LittleEndian).unwrap();

        let mut printer = IndentPrinter::new(String::new());
        debug_names.dump(&mut printer);
        let out = printer.into_inner();

        let bucket0 = out.find("Bucket 0 [").unwrap();
        let bucket1 = out.find("Bucket 1 [").unwrap();
        let bar = out.find("String: 0x00000009 \"bar\"").unwrap();
        let foo = out.find("String: 0x00000005 \"foo\"").unwrap();
        assert!(bucket0 < bar && bar < bucket1);
        assert!(bucket1 < foo);
    }
}
