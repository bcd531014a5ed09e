/// Whether the format of a name index is 32- or 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// 64-bit DWARF
    Dwarf64,
    /// 32-bit DWARF
    Dwarf32,
}

impl Format {
    /// Return the natural word size for the format.
    #[inline]
    pub fn word_size(self) -> u8 {
        match self {
            Format::Dwarf32 => 4,
            Format::Dwarf64 => 8,
        }
    }
}

/// Encoding parameters that are used for a table.
///
/// This is a copy of the relevant header fields that is threaded into every
/// form-value extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Encoding {
    /// Whether the table is 32- or 64-bit.
    pub format: Format,

    /// The version of the table.
    pub version: u16,

    /// The size of an address, in bytes.
    ///
    /// Accelerator tables encode no addresses, so this is zero for them.
    pub address_size: u8,
}

/// An offset into the string section that accompanies an accelerator table
/// (for example `.debug_str`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugStrOffset<T = u64>(pub T);

/// A type signature as used in the `.debug_types` section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebugTypeSignature(pub u64);
