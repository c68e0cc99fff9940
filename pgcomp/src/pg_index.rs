use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

/// Integer type used for pseudogenome positions and offsets.
pub trait PgIndex:
    Copy + Debug + Display + Default + Ord + Hash + Send + Sync + 'static
{
    /// Number of bits used when serialized.
    const BITS: u32;

    fn from_usize(value: usize) -> Option<Self>;

    fn to_usize(self) -> usize;

    fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()>;

    fn read_le<R: Read>(reader: &mut R) -> std::io::Result<Self>;
}

macro_rules! impl_pg_index {
    ($ty:ty, $write:ident, $read:ident) => {
        impl PgIndex for $ty {
            const BITS: u32 = <$ty>::BITS;

            #[inline]
            fn from_usize(value: usize) -> Option<Self> {
                <$ty>::try_from(value).ok()
            }

            #[inline]
            fn to_usize(self) -> usize {
                self as usize
            }

            fn write_le<W: Write>(self, writer: &mut W) -> std::io::Result<()> {
                writer.$write::<LittleEndian>(self)
            }

            fn read_le<R: Read>(reader: &mut R) -> std::io::Result<Self> {
                reader.$read::<LittleEndian>()
            }
        }
    };
}

impl_pg_index!(u32, write_u32, read_u32);
impl_pg_index!(u64, write_u64, read_u64);

/// Width of the integers describing a pseudogenome.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PgWidth {
    /// 32-bit positions.
    Standard,
    /// 64-bit positions.
    Max,
}

impl PgWidth {
    /// Picks the narrowest width able to address a pseudogenome of `length`
    /// symbols (guard padding included).
    #[must_use]
    pub fn for_length(length: usize) -> Self {
        if u32::from_usize(length).is_some() {
            PgWidth::Standard
        } else {
            PgWidth::Max
        }
    }

    #[must_use]
    pub fn bits(&self) -> u32 {
        match self {
            PgWidth::Standard => u32::BITS,
            PgWidth::Max => u64::BITS,
        }
    }
}
