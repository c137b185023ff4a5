use crate::decode::{
    MajorType, ARG_1BYTE, ARG_2BYTES, ARG_4BYTES, ARG_8BYTES, ARG_INDEFINITE, BREAK, MAJOR_OFFSET,
};
use crate::Error;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;

/// A write cursor over a caller-provided buffer.
///
/// Every formatter returns the number of bytes written, or `EndOfInput`
/// once the buffer is exhausted. The running [`Encoder::encoded_len`] keeps
/// accumulating either way, so a pass over a zero-capacity encoder sizes
/// the buffer for a second pass.
#[derive(Debug)]
pub struct Encoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
    len: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Encoder { buf, pos: 0, len: 0 }
    }

    /// Total length of the stream formatted so far, counting writes that
    /// did not fit.
    pub fn encoded_len(&self) -> usize {
        self.len
    }

    /// The bytes written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    fn fits(&mut self, n: usize) -> Result<(), Error> {
        self.len += n;
        if self.buf.len() - self.pos >= n {
            Ok(())
        } else {
            Err(Error::EndOfInput)
        }
    }

    fn put_single(&mut self, byte: u8) -> Result<usize, Error> {
        self.fits(1)?;
        self.buf[self.pos] = byte;
        self.pos += 1;
        Ok(1)
    }

    /// Minimal-width header: inline argument below 24, else the shortest of
    /// the 1/2/4/8-byte big-endian forms.
    fn fmt_arg(&mut self, major: MajorType, val: u64) -> Result<usize, Error> {
        let major = (major as u8) << MAJOR_OFFSET;
        if val < 24 {
            return self.put_single(major | val as u8);
        }
        let (minor, width) = if val <= u8::MAX as u64 {
            (ARG_1BYTE, 1)
        } else if val <= u16::MAX as u64 {
            (ARG_2BYTES, 2)
        } else if val <= u32::MAX as u64 {
            (ARG_4BYTES, 4)
        } else {
            (ARG_8BYTES, 8)
        };
        self.fits(1 + width)?;
        self.buf[self.pos] = major | minor;
        self.buf[self.pos + 1..self.pos + 1 + width].copy_from_slice(&val.to_be_bytes()[8 - width..]);
        self.pos += 1 + width;
        Ok(1 + width)
    }

    pub fn fmt_uint(&mut self, val: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Unsigned, val)
    }

    pub fn fmt_int(&mut self, val: i64) -> Result<usize, Error> {
        if val < 0 {
            self.fmt_arg(MajorType::Negative, (-1 - val) as u64)
        } else {
            self.fmt_arg(MajorType::Unsigned, val as u64)
        }
    }

    pub fn fmt_tag(&mut self, tag: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Tag, tag)
    }

    /// Byte string header; the payload follows via [`Encoder::put_raw`].
    pub fn fmt_bstr(&mut self, len: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Bytes, len)
    }

    /// Text string header; the payload follows via [`Encoder::put_raw`].
    pub fn fmt_tstr(&mut self, len: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Text, len)
    }

    pub fn put_raw(&mut self, data: &[u8]) -> Result<usize, Error> {
        self.fits(data.len())?;
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
        Ok(data.len())
    }

    pub fn put_bstr(&mut self, data: &[u8]) -> Result<usize, Error> {
        let hdr = self.fmt_bstr(data.len() as u64);
        let payload = self.put_raw(data);
        Ok(hdr? + payload?)
    }

    pub fn put_tstr(&mut self, text: &str) -> Result<usize, Error> {
        let hdr = self.fmt_tstr(text.len() as u64);
        let payload = self.put_raw(text.as_bytes());
        Ok(hdr? + payload?)
    }

    pub fn fmt_array(&mut self, items: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Array, items)
    }

    pub fn fmt_map(&mut self, pairs: u64) -> Result<usize, Error> {
        self.fmt_arg(MajorType::Map, pairs)
    }

    pub fn fmt_array_indefinite(&mut self) -> Result<usize, Error> {
        self.put_single((MajorType::Array as u8) << MAJOR_OFFSET | ARG_INDEFINITE)
    }

    pub fn fmt_map_indefinite(&mut self) -> Result<usize, Error> {
        self.put_single((MajorType::Map as u8) << MAJOR_OFFSET | ARG_INDEFINITE)
    }

    /// The break byte terminating an indefinite-length container.
    pub fn fmt_end_indefinite(&mut self) -> Result<usize, Error> {
        self.put_single(BREAK)
    }

    pub fn fmt_bool(&mut self, val: bool) -> Result<usize, Error> {
        let simple = if val { SIMPLE_TRUE } else { SIMPLE_FALSE };
        self.put_single((MajorType::Float as u8) << MAJOR_OFFSET | simple)
    }

    pub fn fmt_null(&mut self) -> Result<usize, Error> {
        self.put_single((MajorType::Float as u8) << MAJOR_OFFSET | SIMPLE_NULL)
    }

    pub fn fmt_undefined(&mut self) -> Result<usize, Error> {
        self.put_single((MajorType::Float as u8) << MAJOR_OFFSET | SIMPLE_UNDEFINED)
    }

    /// Numeric simple value; the reserved range 24..31 is rejected.
    pub fn fmt_simple(&mut self, val: u8) -> Result<usize, Error> {
        match val {
            0..=23 => self.put_single((MajorType::Float as u8) << MAJOR_OFFSET | val),
            24..=31 => Err(Error::InvalidType),
            _ => {
                self.fits(2)?;
                self.buf[self.pos] = (MajorType::Float as u8) << MAJOR_OFFSET | ARG_1BYTE;
                self.buf[self.pos + 1] = val;
                self.pos += 2;
                Ok(2)
            }
        }
    }

    pub fn fmt_float(&mut self, val: f32) -> Result<usize, Error> {
        self.fits(5)?;
        self.buf[self.pos] = (MajorType::Float as u8) << MAJOR_OFFSET | ARG_4BYTES;
        self.buf[self.pos + 1..self.pos + 5].copy_from_slice(&val.to_be_bytes());
        self.pos += 5;
        Ok(5)
    }

    pub fn fmt_double(&mut self, val: f64) -> Result<usize, Error> {
        if let Some(single) = lossless_float_coerce::<f32>(val) {
            return self.fmt_float(single);
        }
        self.fits(9)?;
        self.buf[self.pos] = (MajorType::Float as u8) << MAJOR_OFFSET | ARG_8BYTES;
        self.buf[self.pos + 1..self.pos + 9].copy_from_slice(&val.to_be_bytes());
        self.pos += 9;
        Ok(9)
    }

    /// Tag 4 wrapping `[exponent, mantissa]`.
    pub fn fmt_decimal_fraction(&mut self, exponent: i32, mantissa: i32) -> Result<usize, Error> {
        let a = self.fmt_tag(4);
        let b = self.fmt_array(2);
        let c = self.fmt_int(exponent as i64);
        let d = self.fmt_int(mantissa as i64);
        Ok(a? + b? + c? + d?)
    }
}

fn lossless_float_coerce<T>(value: f64) -> Option<T>
where
    T: num_traits::FromPrimitive + Into<f64> + Copy,
{
    match <T as num_traits::FromPrimitive>::from_f64(value) {
        Some(f) if <T as Into<f64>>::into(f) == value => Some(f),
        _ => None,
    }
}
