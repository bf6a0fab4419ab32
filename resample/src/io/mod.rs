//! Binary channel used to (de)serialize the aggregation states
//!
//! [`WriteBuffer`] is an ordered byte sink and [`ReadBuffer`] is the matching byte
//! source. The layout is fixed: integers and floats are little-endian, lengths and
//! counters are encoded as var-uint (LEB128, 7 bits per byte). The protocol version
//! is not stored in the buffer, it travels alongside as `Option<usize>` and every
//! aggregation function decides how to use it

use snafu::{ResultExt, Snafu, ensure};

/// Maximum number of bytes a var-uint encoded `u64` occupies
pub const VAR_UINT_MAX_LEN: usize = 10;

#[allow(missing_docs)]
#[derive(Debug, Snafu)]
pub enum IoError {
    #[snafu(display(
        "Unexpected end of the buffer: expect `{expected}` bytes, only `{remaining}` bytes remain"
    ))]
    UnexpectedEof { expected: usize, remaining: usize },
    #[snafu(display("Var-uint is longer than `{VAR_UINT_MAX_LEN}` bytes"))]
    VarUintTooLong,
    #[snafu(display("Var-uint does not fit into `u64`, the last byte is `{byte:#04x}`"))]
    VarUintOverflow { byte: u8 },
    #[snafu(display("Invalid boolean byte `{value}`, expect `0` or `1`"))]
    InvalidBool { value: u8 },
    #[snafu(display("Deserialized string is not valid utf-8"))]
    InvalidUtf8 { source: std::string::FromUtf8Error },
    #[snafu(display("Length `{len}` does not fit into the memory of this platform"))]
    LengthOverflow { len: u64 },
}

type Result<T> = std::result::Result<T, IoError>;

/// Growable byte sink
#[derive(Debug, Default, Clone)]
pub struct WriteBuffer {
    buf: Vec<u8>,
}

impl WriteBuffer {
    /// Create a new empty [`WriteBuffer`]
    #[inline]
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Create a new empty [`WriteBuffer`] with given capacity
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Consume the buffer, return the written bytes
    #[inline]
    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Number of bytes written so far
    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Write raw bytes
    #[inline]
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a boolean as a single byte
    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    /// Write `u64` in the var-uint format
    pub fn write_var_uint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.push((value as u8) | 0x80);
            value >>= 7;
        }
        self.buf.push(value as u8);
    }

    /// Write the string as var-uint length followed by its utf-8 bytes
    #[inline]
    pub fn write_string(&mut self, value: &str) {
        self.write_var_uint(value.len() as u64);
        self.write_bytes(value.as_bytes());
    }
}

/// Cursor over the bytes written by the [`WriteBuffer`]
#[derive(Debug, Clone)]
pub struct ReadBuffer<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ReadBuffer<'a> {
    /// Create a new [`ReadBuffer`] that reads from the start of the data
    #[inline]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Number of bytes that have not been read
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns true if all of the bytes have been read
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Read `len` raw bytes
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        ensure!(
            len <= self.remaining(),
            UnexpectedEofSnafu {
                expected: len,
                remaining: self.remaining()
            }
        );
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    #[inline]
    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.read_bytes(N)?);
        Ok(array)
    }

    /// Read a boolean written by [`WriteBuffer::write_bool`]
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            value => InvalidBoolSnafu { value }.fail(),
        }
    }

    /// Read a var-uint encoded `u64`
    pub fn read_var_uint(&mut self) -> Result<u64> {
        let mut value = 0_u64;
        for index in 0..VAR_UINT_MAX_LEN {
            let byte = self.read_u8()?;
            if index == VAR_UINT_MAX_LEN - 1 && byte & 0x80 == 0 {
                // Only the highest bit of `u64` is left for the last byte
                ensure!(byte <= 1, VarUintOverflowSnafu { byte });
            }
            value |= ((byte & 0x7F) as u64) << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        VarUintTooLongSnafu.fail()
    }

    /// Read a string written by [`WriteBuffer::write_string`]
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_var_uint()?;
        let len = usize::try_from(len)
            .ok()
            .ok_or(IoError::LengthOverflow { len })?;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).context(InvalidUtf8Snafu)
    }
}

macro_rules! impl_fixed_width_io {
    ($($ty:ident),+) => {
        paste::paste! {
            impl WriteBuffer {
                $(
                    #[doc = concat!("Write `", stringify!($ty), "` in little-endian")]
                    #[inline]
                    pub fn [<write_ $ty>](&mut self, value: $ty) {
                        self.buf.extend_from_slice(&value.to_le_bytes());
                    }
                )+
            }

            impl ReadBuffer<'_> {
                $(
                    #[doc = concat!("Read little-endian `", stringify!($ty), "`")]
                    #[inline]
                    pub fn [<read_ $ty>](&mut self) -> Result<$ty> {
                        self.read_array::<{ std::mem::size_of::<$ty>() }>()
                            .map($ty::from_le_bytes)
                    }
                )+
            }
        }
    };
}

impl_fixed_width_io!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

/// Values that know how to write themselves into the [`WriteBuffer`] and read
/// themselves back from the [`ReadBuffer`]
pub trait BinarySerde: Sized {
    /// Write self into the buffer
    fn write_binary(&self, buf: &mut WriteBuffer);

    /// Read a value written by [`BinarySerde::write_binary`]
    fn read_binary(buf: &mut ReadBuffer<'_>) -> Result<Self>;
}

macro_rules! impl_binary_serde_for_fixed_width {
    ($($ty:ident),+) => {
        paste::paste! {
            $(
                impl BinarySerde for $ty {
                    #[inline]
                    fn write_binary(&self, buf: &mut WriteBuffer) {
                        buf.[<write_ $ty>](*self)
                    }

                    #[inline]
                    fn read_binary(buf: &mut ReadBuffer<'_>) -> Result<Self> {
                        buf.[<read_ $ty>]()
                    }
                }
            )+
        }
    };
}

impl_binary_serde_for_fixed_width!(i64, u64, f64);

impl BinarySerde for bool {
    #[inline]
    fn write_binary(&self, buf: &mut WriteBuffer) {
        buf.write_bool(*self)
    }

    #[inline]
    fn read_binary(buf: &mut ReadBuffer<'_>) -> Result<Self> {
        buf.read_bool()
    }
}

impl BinarySerde for String {
    #[inline]
    fn write_binary(&self, buf: &mut WriteBuffer) {
        buf.write_string(self)
    }

    #[inline]
    fn read_binary(buf: &mut ReadBuffer<'_>) -> Result<Self> {
        buf.read_string()
    }
}

/// `Option` is written as a boolean flag followed by the value if it exists
impl<T: BinarySerde> BinarySerde for Option<T> {
    fn write_binary(&self, buf: &mut WriteBuffer) {
        match self {
            Some(value) => {
                buf.write_bool(true);
                value.write_binary(buf);
            }
            None => buf.write_bool(false),
        }
    }

    fn read_binary(buf: &mut ReadBuffer<'_>) -> Result<Self> {
        if buf.read_bool()? {
            T::read_binary(buf).map(Some)
        } else {
            Ok(None)
        }
    }
}
