//! The fixed set of scalar types a PLY property can have.

use std::{
    fmt,
    str::FromStr,
};

use byteorder::{ByteOrder, NativeEndian};
use num_traits::NumCast;

use crate::Error;


/// A primitive PLY type. There are 8 in total: 2 floating point types, 3
/// signed and 3 unsigned integers.
///
/// The "no type" case (e.g. the list length type of a scalar property) is
/// represented as `Option<ScalarType>::None` throughout this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Float32,
    Float64,
}

impl ScalarType {
    /// All scalar types, in the order they are listed in the PLY docs.
    pub const ALL: [ScalarType; 8] = [
        ScalarType::Int8,
        ScalarType::Uint8,
        ScalarType::Int16,
        ScalarType::Uint16,
        ScalarType::Int32,
        ScalarType::Uint32,
        ScalarType::Float32,
        ScalarType::Float64,
    ];

    /// Returns the number of bytes this type occupies.
    pub fn width(&self) -> usize {
        match self {
            ScalarType::Int8 | ScalarType::Uint8 => 1,
            ScalarType::Int16 | ScalarType::Uint16 => 2,
            ScalarType::Int32 | ScalarType::Uint32 | ScalarType::Float32 => 4,
            ScalarType::Float64 => 8,
        }
    }

    /// Returns the type name used in the header (e.g. `short` for `Int16`).
    pub fn ply_type_name(&self) -> &'static str {
        match self {
            ScalarType::Int8 => "char",
            ScalarType::Uint8 => "uchar",
            ScalarType::Int16 => "short",
            ScalarType::Uint16 => "ushort",
            ScalarType::Int32 => "int",
            ScalarType::Uint32 => "uint",
            ScalarType::Float32 => "float",
            ScalarType::Float64 => "double",
        }
    }

    /// Returns `true` if and only if the type is either `float` or `double`.
    pub fn is_floating_point(&self) -> bool {
        *self == ScalarType::Float32 || *self == ScalarType::Float64
    }

    /// Returns `true` for all signed and unsigned integer types.
    pub fn is_integer(&self) -> bool {
        !self.is_floating_point()
    }

    /// Returns `true` if and only if the type is one of `uchar`, `ushort` or
    /// `uint`.
    pub fn is_unsigned_integer(&self) -> bool {
        match self {
            ScalarType::Uint8 | ScalarType::Uint16 | ScalarType::Uint32 => true,
            _ => false,
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.ply_type_name())
    }
}

impl FromStr for ScalarType {
    type Err = Error;

    /// Parses the classic PLY names (`uchar`, `float`, ...) as well as the
    /// sized aliases (`uint8`, `float32`, ...) many writers emit.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "char" | "int8" => Ok(ScalarType::Int8),
            "uchar" | "uint8" => Ok(ScalarType::Uint8),
            "short" | "int16" => Ok(ScalarType::Int16),
            "ushort" | "uint16" => Ok(ScalarType::Uint16),
            "int" | "int32" => Ok(ScalarType::Int32),
            "uint" | "uint32" => Ok(ScalarType::Uint32),
            "float" | "float32" => Ok(ScalarType::Float32),
            "double" | "float64" => Ok(ScalarType::Float64),
            other => Err(Error::UnknownTypeToken(other.to_string())),
        }
    }
}


mod internal {
    pub trait DoNotImplement {}
}

/// Abstracts over the Rust types that correspond to a [`ScalarType`].
///
/// This trait is implemented for exactly the eight primitive types `i8`,
/// `u8`, `i16`, `u16`, `i32`, `u32`, `f32` and `f64`, which is a closed set.
/// That's why it has a crate-private supertrait: you can't implement it for
/// your own types.
pub trait PlyScalar:
    Copy + fmt::Display + FromStr + NumCast + internal::DoNotImplement
{
    /// The PLY type of `Self`.
    const TY: ScalarType;

    /// Reads a value from the start of `buf` in the byte order `B`. Panics if
    /// `buf` is shorter than `Self::TY.width()`.
    fn read<B: ByteOrder>(buf: &[u8]) -> Self;

    /// Writes `self` to the start of `buf` in the byte order `B`. Panics if
    /// `buf` is shorter than `Self::TY.width()`.
    fn write<B: ByteOrder>(self, buf: &mut [u8]);

    /// Appends `self` in native endianness to `out`.
    fn extend_native(self, out: &mut Vec<u8>) {
        let start = out.len();
        out.resize(start + Self::TY.width(), 0);
        self.write::<NativeEndian>(&mut out[start..]);
    }
}

macro_rules! impl_ply_scalar {
    (byte $ty:ident, $variant:ident) => {
        impl internal::DoNotImplement for $ty {}
        impl PlyScalar for $ty {
            const TY: ScalarType = ScalarType::$variant;

            fn read<B: ByteOrder>(buf: &[u8]) -> Self {
                buf[0] as $ty
            }
            fn write<B: ByteOrder>(self, buf: &mut [u8]) {
                buf[0] = self as u8;
            }
        }
    };
    ($ty:ident, $variant:ident, $read:ident, $write:ident) => {
        impl internal::DoNotImplement for $ty {}
        impl PlyScalar for $ty {
            const TY: ScalarType = ScalarType::$variant;

            fn read<B: ByteOrder>(buf: &[u8]) -> Self {
                B::$read(buf)
            }
            fn write<B: ByteOrder>(self, buf: &mut [u8]) {
                B::$write(buf, self)
            }
        }
    };
}

impl_ply_scalar!(byte i8, Int8);
impl_ply_scalar!(byte u8, Uint8);
impl_ply_scalar!(i16, Int16, read_i16, write_i16);
impl_ply_scalar!(u16, Uint16, read_u16, write_u16);
impl_ply_scalar!(i32, Int32, read_i32, write_i32);
impl_ply_scalar!(u32, Uint32, read_u32, write_u32);
impl_ply_scalar!(f32, Float32, read_f32, write_f32);
impl_ply_scalar!(f64, Float64, read_f64, write_f64);
