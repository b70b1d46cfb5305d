//! SPIR-V Module Buffer
//!
//! A module is a flat sequence of 32-bit words: a fixed five word header followed by
//! instructions. The remapper mutates this buffer in place.
//!
//! # Header Layout
//! | Word | Content |
//! |------|---------|
//! | 0 | Magic number `0x07230203` |
//! | 1 | Version |
//! | 2 | Generator magic |
//! | 3 | Id bound |
//! | 4 | Schema (must be 0) |
//!
//! # Instruction Layout
//! The first word of every instruction packs the word count in its high 16 bits and the
//! opcode in its low 16 bits.

use crate::remapper::error::{RemapError, Result};

/// SPIR-V magic number in native word order.
pub const MAGIC_NUMBER: u32 = 0x0723_0203;

/// Number of header words preceding the first instruction.
pub const HEADER_WORDS: usize = 5;

const BOUND_WORD: usize = 3;
const SCHEMA_WORD: usize = 4;

/// Opcode stored in an instruction's first word.
#[inline]
pub fn opcode_of(word: u32) -> u16 {
    (word & 0xFFFF) as u16
}

/// Word count stored in an instruction's first word.
#[inline]
pub fn word_count_of(word: u32) -> usize {
    (word >> 16) as usize
}

/// Pack a word count and opcode into an instruction's first word.
#[inline]
pub fn instruction_word(word_count: usize, opcode: u16) -> u32 {
    ((word_count as u32) << 16) | u32::from(opcode)
}

/// Mutable SPIR-V word buffer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Module {
    words: Vec<u32>,
    /// The bytes this module was read from were in the opposite byte order.
    swapped: bool,
}

impl Module {
    /// Wrap a word buffer. The header is not validated here.
    pub fn new(words: Vec<u32>) -> Self {
        Self {
            words,
            swapped: false,
        }
    }

    /// Read a module from raw bytes in either byte order.
    ///
    /// # Algorithm
    /// Words are read little-endian. If the first word then equals the byte-swapped magic
    /// number, the file was written big-endian and every word is swapped. The detected
    /// order is remembered so [`Module::to_bytes`] writes the module back the same way.
    ///
    /// # Errors
    /// Returns [`RemapError::UnalignedBytes`] if the length is not a multiple of 4.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % 4 != 0 {
            return Err(RemapError::UnalignedBytes { len: bytes.len() });
        }

        let mut words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        let swapped: bool = words.first() == Some(&MAGIC_NUMBER.swap_bytes());
        if swapped {
            log::debug!("module is big-endian, swapping {} words", words.len());
            for word in words.iter_mut() {
                *word = word.swap_bytes();
            }
        }

        Ok(Self { words, swapped })
    }

    /// Serialize the module in the byte order it was read in.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(self.words.len() * 4);
        for &word in &self.words {
            let word: u32 = if self.swapped { word.swap_bytes() } else { word };
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    #[inline]
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    #[inline]
    pub(crate) fn words_mut(&mut self) -> &mut Vec<u32> {
        &mut self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Word at `position`, or 0 past the end.
    #[inline]
    pub fn word(&self, position: usize) -> u32 {
        self.words.get(position).copied().unwrap_or(0)
    }

    /// Opcode of the instruction starting at `position`.
    #[inline]
    pub fn opcode_at(&self, position: usize) -> u16 {
        opcode_of(self.word(position))
    }

    /// Word count of the instruction starting at `position`.
    #[inline]
    pub fn word_count_at(&self, position: usize) -> usize {
        word_count_of(self.word(position))
    }

    pub fn magic(&self) -> u32 {
        self.word(0)
    }

    pub fn version(&self) -> u32 {
        self.word(1)
    }

    pub fn generator(&self) -> u32 {
        self.word(2)
    }

    /// Id bound from the header (one past the largest valid id).
    pub fn bound(&self) -> u32 {
        self.word(BOUND_WORD)
    }

    pub fn set_bound(&mut self, bound: u32) {
        if let Some(word) = self.words.get_mut(BOUND_WORD) {
            *word = bound;
        }
    }

    pub fn schema(&self) -> u32 {
        self.word(SCHEMA_WORD)
    }

    /// Check the fixed header: minimum length, magic number and schema.
    pub fn validate_header(&self) -> Result<()> {
        if self.words.len() < HEADER_WORDS {
            return Err(RemapError::TooShort {
                words: self.words.len(),
                required: HEADER_WORDS,
            });
        }
        if self.magic() != MAGIC_NUMBER {
            return Err(RemapError::BadMagic { found: self.magic() });
        }
        if self.schema() != 0 {
            return Err(RemapError::BadSchema { found: self.schema() });
        }
        Ok(())
    }
}

/// Decode a nul-terminated literal string packed little-endian into words.
///
/// Decoding stops at the first nul byte or at the end of `words`; invalid UTF-8 is
/// replaced rather than rejected.
pub fn literal_string(words: &[u32]) -> String {
    let mut bytes: Vec<u8> = Vec::with_capacity(16);
    'words: for &word in words {
        for byte in word.to_le_bytes() {
            if byte == 0 {
                break 'words;
            }
            bytes.push(byte);
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Number of words a literal string occupies, including the word holding its terminator.
pub fn literal_string_words(words: &[u32]) -> usize {
    words
        .iter()
        .position(|word| word.to_le_bytes().contains(&0))
        .map_or(words.len(), |index| index + 1)
}

/// Pack a string into nul-terminated little-endian words.
pub fn encode_string(text: &str) -> Vec<u32> {
    let mut bytes: Vec<u8> = text.as_bytes().to_vec();
    bytes.push(0);
    while bytes.len() % 4 != 0 {
        bytes.push(0);
    }
    bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_round_trip_lengths() {
        // "main" needs a second word for its terminator
        let words = encode_string("main");
        assert_eq!(words.len(), 2);
        assert_eq!(literal_string_words(&words), 2);
        assert_eq!(literal_string(&words), "main");

        let words = encode_string("abc");
        assert_eq!(words.len(), 1);
        assert_eq!(literal_string(&words), "abc");
    }

    #[test]
    fn test_big_endian_bytes_are_detected() {
        let words = [MAGIC_NUMBER, 0x0001_0000, 0, 7, 0];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_be_bytes()).collect();

        let module = Module::from_bytes(&bytes).unwrap();
        assert_eq!(module.magic(), MAGIC_NUMBER);
        assert_eq!(module.bound(), 7);
        assert_eq!(module.to_bytes(), bytes);
    }

    #[test]
    fn test_unaligned_bytes_rejected() {
        assert_eq!(
            Module::from_bytes(&[1, 2, 3]),
            Err(RemapError::UnalignedBytes { len: 3 })
        );
    }

    #[test]
    fn test_header_validation() {
        assert!(matches!(
            Module::new(vec![MAGIC_NUMBER, 0, 0]).validate_header(),
            Err(RemapError::TooShort { words: 3, .. })
        ));
        assert!(matches!(
            Module::new(vec![0xDEAD_BEEF, 0, 0, 1, 0]).validate_header(),
            Err(RemapError::BadMagic { found: 0xDEAD_BEEF })
        ));
        assert!(matches!(
            Module::new(vec![MAGIC_NUMBER, 0, 0, 1, 3]).validate_header(),
            Err(RemapError::BadSchema { found: 3 })
        ));
        assert!(Module::new(vec![MAGIC_NUMBER, 0, 0, 1, 0]).validate_header().is_ok());
    }
}
