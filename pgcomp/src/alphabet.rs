use std::fmt::{Debug, Formatter};

use crate::reads::{ReadsSetError, ReadsSetResult};

/// Largest alphabet a reads set may use.
pub const MAX_ALPHABET_SIZE: usize = 8;

const NO_RANK: u8 = u8::MAX;

/// Alphabet and shape of a reads set.
///
/// Symbols receive ranks in first-seen order; the ranks never change for the
/// lifetime of the set. Up to four symbols are packed using 2 bits per symbol,
/// up to eight using 3 bits.
#[derive(Clone, Eq, PartialEq)]
pub struct ReadsSetProperties {
    symbols: Vec<u8>,
    ranks: [u8; 256],
    read_count: usize,
    read_length: usize,
}

impl ReadsSetProperties {
    pub(crate) fn empty() -> Self {
        Self {
            symbols: Vec::new(),
            ranks: [NO_RANK; 256],
            read_count: 0,
            read_length: 0,
        }
    }

    /// Creates the properties for a fixed, caller-provided alphabet.
    pub fn with_alphabet(symbols: &[u8]) -> ReadsSetResult<Self> {
        if symbols.is_empty() {
            return Err(ReadsSetError::EmptyAlphabet);
        }

        let mut props = Self::empty();
        for &symbol in symbols {
            if props.rank(symbol).is_some() {
                return Err(ReadsSetError::DuplicateSymbol(symbol));
            }
            props.observe(symbol)?;
        }

        Ok(props)
    }

    /// Returns the rank of `symbol`, registering it if it was not seen yet.
    pub(crate) fn observe(&mut self, symbol: u8) -> ReadsSetResult<u8> {
        let rank = self.ranks[symbol as usize];
        if rank != NO_RANK {
            return Ok(rank);
        }

        if self.symbols.len() == MAX_ALPHABET_SIZE {
            return Err(ReadsSetError::AlphabetTooLarge(self.symbols.len() + 1));
        }

        let rank = self.symbols.len() as u8;
        self.symbols.push(symbol);
        self.ranks[symbol as usize] = rank;
        Ok(rank)
    }

    pub(crate) fn set_shape(&mut self, read_count: usize, read_length: usize) {
        self.read_count = read_count;
        self.read_length = read_length;
    }

    #[inline]
    #[must_use]
    pub fn rank(&self, symbol: u8) -> Option<u8> {
        match self.ranks[symbol as usize] {
            NO_RANK => None,
            rank => Some(rank),
        }
    }

    #[inline]
    #[must_use]
    pub fn symbol(&self, rank: u8) -> u8 {
        self.symbols[rank as usize]
    }

    #[must_use]
    pub fn symbols(&self) -> &[u8] {
        &self.symbols
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Symbol used to pad the tail of a pseudogenome.
    #[must_use]
    pub fn guard_symbol(&self) -> Option<u8> {
        self.symbols.last().copied()
    }

    #[inline]
    #[must_use]
    pub fn bits_per_symbol(&self) -> u32 {
        if self.symbols.len() <= 4 {
            2
        } else {
            3
        }
    }

    #[inline]
    #[must_use]
    pub fn symbols_per_word(&self) -> usize {
        (u64::BITS / self.bits_per_symbol()) as usize
    }

    #[must_use]
    pub fn read_count(&self) -> usize {
        self.read_count
    }

    #[must_use]
    pub fn read_length(&self) -> usize {
        self.read_length
    }
}

impl Debug for ReadsSetProperties {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadsSetProperties")
            .field("symbols", &String::from_utf8_lossy(&self.symbols))
            .field("read_count", &self.read_count)
            .field("read_length", &self.read_length)
            .finish()
    }
}
