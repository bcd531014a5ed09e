//! End-to-end tests: build accelerator sections byte by byte, then drive
//! them through parsing, lookup, and dumping.

use dwarf_accel::{
    djb_hash, AppleAcceleratorTable, DebugNames, IndentPrinter, LittleEndian, RelocationMap,
};

// A string section with "foo" at offset 5 and "bar" at offset 9.
const STRINGS: &[u8] = b"\0\0\0\0\0foo\0bar\0";

fn apple_names_section() -> Vec<u8> {
    let mut buf = Vec::new();
    // Header: magic 'HASH'
    buf.extend_from_slice(&0x4841_5348u32.to_le_bytes());
    // Version
    buf.extend_from_slice(&1u16.to_le_bytes());
    // Hash function: DJB
    buf.extend_from_slice(&0u16.to_le_bytes());
    // Bucket count
    buf.extend_from_slice(&1u32.to_le_bytes());
    // Hash count
    buf.extend_from_slice(&1u32.to_le_bytes());
    // Header data length: die_offset_base + num_atoms + one atom pair
    buf.extend_from_slice(&12u32.to_le_bytes());
    // DIE offset base
    buf.extend_from_slice(&0u32.to_le_bytes());
    // Number of atoms
    buf.extend_from_slice(&1u32.to_le_bytes());
    // Atom: DW_ATOM_die_offset, DW_FORM_data4
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&6u16.to_le_bytes());
    // Buckets: the single bucket's chain starts at hash index 0.
    buf.extend_from_slice(&0u32.to_le_bytes());
    // Hashes
    buf.extend_from_slice(&djb_hash(b"foo").to_le_bytes());
    // Offsets: the name chain lives at offset 44.
    buf.extend_from_slice(&44u32.to_le_bytes());
    // Name chain: string offset, payload count, two payloads, terminator.
    buf.extend_from_slice(&5u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&0x10u32.to_le_bytes());
    buf.extend_from_slice(&0x20u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf
}

#[test]
fn apple_lookup_and_dump() {
    let section = apple_names_section();
    let relocations = RelocationMap::new();
    let table =
        AppleAcceleratorTable::parse(&section, &relocations, STRINGS, LittleEndian).unwrap();

    assert!(table.validate_forms());

    let offsets: Vec<_> = table
        .equal_range(b"foo")
        .map(|entry| entry.die_offset().unwrap())
        .collect();
    assert_eq!(offsets, [0x10, 0x20]);
    assert_eq!(table.equal_range(b"bar").count(), 0);
    assert_eq!(table.equal_range(b"").count(), 0);

    let mut printer = IndentPrinter::new(String::new());
    table.dump(&mut printer);
    let expect = "\
Header {
  Magic: 0x48415348
  Version: 0x1
  Hash function: 0x0
  Bucket count: 1
  Hashes count: 1
  HeaderData length: 12
}
DIE offset base: 0
Number of atoms: 1
Atoms [
  Atom 0 {
    Type: DW_ATOM_die_offset
    Form: DW_FORM_data4
  }
]
Bucket 0 [
  Hash 0xb887389 [
    Name@0x2c {
      String: 0x00000005 \"foo\"
      Data 0 [
        Atom[0]: 0x00000010
      ]
      Data 1 [
        Atom[0]: 0x00000020
      ]
    }
  ]
]
";
    assert_eq!(printer.into_inner(), expect);
}

#[test]
fn apple_truncation_never_panics() {
    let section = apple_names_section();
    let relocations = RelocationMap::new();
    for len in 0..section.len() {
        // Every truncation must surface as an error or a short (but sane)
        // parse, never a panic.
        let _ = AppleAcceleratorTable::parse(&section[..len], &relocations, STRINGS, LittleEndian);
    }
}

fn debug_names_section() -> Vec<u8> {
    let mut buf = Vec::new();
    // Unit length: everything after this field.
    buf.extend_from_slice(&87u32.to_le_bytes());
    // Version, padding
    buf.extend_from_slice(&5u16.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes());
    // CU count, local TU count, foreign TU count
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    // Bucket count, name count
    buf.extend_from_slice(&2u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    // Abbreviation table size, augmentation string size
    buf.extend_from_slice(&7u32.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());
    // CU offsets
    buf.extend_from_slice(&0x1000u32.to_le_bytes());
    // Buckets: 1-based name indices, "bar" then "foo".
    buf.extend_from_slice(&1u32.to_le_bytes());
    buf.extend_from_slice(&2u32.to_le_bytes());
    // Hashes
    buf.extend_from_slice(&djb_hash(b"bar").to_le_bytes());
    buf.extend_from_slice(&djb_hash(b"foo").to_le_bytes());
    // String offsets: garbage on disk, patched by relocations below.
    buf.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    buf.extend_from_slice(&0xffff_ffffu32.to_le_bytes());
    // Entry offsets, relative to the entry pool.
    buf.extend_from_slice(&0u32.to_le_bytes());
    buf.extend_from_slice(&6u32.to_le_bytes());
    // Abbreviation table: code 1, DW_TAG_subprogram,
    // DW_IDX_die_offset/DW_FORM_data4, attribute sentinel, table sentinel.
    buf.extend_from_slice(&[0x01, 0x2e, 0x03, 0x06, 0x00, 0x00, 0x00]);
    // Entry pool: one entry and a terminator per name.
    buf.push(0x01);
    buf.extend_from_slice(&0x64u32.to_le_bytes());
    buf.push(0x00);
    buf.push(0x01);
    buf.extend_from_slice(&0xc8u32.to_le_bytes());
    buf.push(0x00);
    buf
}

#[test]
fn debug_names_lookup_and_dump() {
    let section = debug_names_section();
    // The string offset array at offset 56 is relocated.
    let mut relocations = RelocationMap::new();
    relocations.insert(56, 9);
    relocations.insert(60, 5);

    let debug_names = DebugNames::parse(&section, &relocations, STRINGS, LittleEndian).unwrap();
    assert_eq!(debug_names.name_indices().len(), 1);
    let index = &debug_names.name_indices()[0];

    // The name table resolves through the relocations.
    let first = index.name_table_entry(1).unwrap();
    assert_eq!(first.string_offset, 9);
    let second = index.name_table_entry(2).unwrap();
    assert_eq!(second.string_offset, 5);

    // Walk name 2's entry list.
    let mut entries = index.entries(second.entry_offset);
    let entry = entries.next().unwrap().unwrap();
    assert_eq!(entry.abbreviation().code(), 1);
    assert_eq!(entries.next(), Ok(None));

    let mut printer = IndentPrinter::new(String::new());
    debug_names.dump(&mut printer);
    let expect = "\
Name Index @ 0x0 {
  Header {
    Length: 0x57
    Version: 5
    Padding: 0x0
    CU count: 1
    Local TU count: 0
    Foreign TU count: 0
    Bucket count: 2
    Name count: 2
    Abbreviations table size: 0x7
    Augmentation: ''
  }
  Compilation Unit offsets [
    CU[0]: 0x00001000
  ]
  Abbreviations [
    Abbreviation 0x1 {
      Tag: DW_TAG_subprogram
      DW_IDX_die_offset: DW_FORM_data4
    }
  ]
  Bucket 0 [
    Name 1 {
      Hash: 0xb8860ba
      String: 0x00000009 \"bar\"
      Entry @ 0x4f {
        Abbrev: 0x1
        Tag: DW_TAG_subprogram
        DW_IDX_die_offset: 0x00000064
      }
    }
  ]
  Bucket 1 [
    Name 2 {
      Hash: 0xb887389
      String: 0x00000005 \"foo\"
      Entry @ 0x55 {
        Abbrev: 0x1
        Tag: DW_TAG_subprogram
        DW_IDX_die_offset: 0x000000c8
      }
    }
  ]
}
";
    assert_eq!(printer.into_inner(), expect);
}

#[test]
fn debug_names_truncation_never_panics() {
    let section = debug_names_section();
    let relocations = RelocationMap::new();
    for len in 0..section.len() {
        let result = DebugNames::parse(&section[..len], &relocations, STRINGS, LittleEndian);
        if len == 0 {
            // An empty section holds zero units.
            assert!(result.unwrap().name_indices().is_empty());
        } else if len < 79 {
            // Cuts before the end of the abbreviation table fail in one of
            // the header or table region checks.
            assert!(result.is_err());
        } else {
            // Cuts inside the lazily-decoded entry pool still parse.
            let _ = result;
        }
    }
}
