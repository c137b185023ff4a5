use crate::{Error, RECURSION_MAX};
use half::f16;

pub(crate) const MAJOR_OFFSET: u32 = 5;
pub(crate) const ARG_MASK: u8 = 0x1F;
pub(crate) const ARG_1BYTE: u8 = 24;
pub(crate) const ARG_2BYTES: u8 = 25;
pub(crate) const ARG_4BYTES: u8 = 26;
pub(crate) const ARG_8BYTES: u8 = 27;
pub(crate) const ARG_INDEFINITE: u8 = 31;
pub(crate) const BREAK: u8 = 0xFF;

const SIMPLE_FALSE: u8 = 20;
const SIMPLE_TRUE: u8 = 21;
const SIMPLE_NULL: u8 = 22;
const SIMPLE_UNDEFINED: u8 = 23;
const SIMPLE_RESERVED_MIN: u8 = 32;

const TAG_DECIMAL_FRACTION: u64 = 4;

pub(crate) const FLAG_CONTAINER: u8 = 0x01;
pub(crate) const FLAG_INDEFINITE: u8 = 0x02;
pub(crate) const FLAG_PACKED: u8 = 0x04;
#[cfg(feature = "packed")]
pub(crate) const FLAG_SHARED: u8 = 0x08;
pub(crate) const FLAG_MAP: u8 = 0x10;

/// The 3-bit classifier in the top bits of every initial byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorType {
    Unsigned = 0,
    Negative = 1,
    Bytes = 2,
    Text = 3,
    Array = 4,
    Map = 5,
    Tag = 6,
    Float = 7,
}

impl MajorType {
    pub(crate) fn of(initial: u8) -> Self {
        match initial >> MAJOR_OFFSET {
            0 => Self::Unsigned,
            1 => Self::Negative,
            2 => Self::Bytes,
            3 => Self::Text,
            4 => Self::Array,
            5 => Self::Map,
            6 => Self::Tag,
            _ => Self::Float,
        }
    }
}

/// A read cursor over a CBOR-encoded byte slice.
///
/// A cursor denotes either the top level of an encoded stream or, when
/// derived with [`Decoder::enter_array`] / [`Decoder::enter_map`], a
/// position inside a container. Typed readers return the value together
/// with the number of bytes the item occupies on the wire.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    pub(crate) data: &'a [u8],
    pub(crate) pos: usize,
    pub(crate) end: usize,
    pub(crate) remaining: u64,
    pub(crate) flags: u8,
    #[cfg(feature = "packed")]
    pub(crate) tables: crate::packed::TableStack<'a>,
}

/// Resolve a packed form at the cursor, perform the read on the resolved
/// position and advance past the reference itself. Expands to nothing when
/// packed support is compiled out.
#[cfg(feature = "packed")]
macro_rules! follow_packed {
    ($self:ident . $read:ident ( $($arg:expr),* )) => {
        if let Some(mut inner) = $self.follow_shared(RECURSION_MAX)? {
            let r = inner.$read($($arg),*)?;
            $self.skip()?;
            return Ok(r);
        }
    };
}

#[cfg(not(feature = "packed"))]
macro_rules! follow_packed {
    ($($t:tt)*) => {};
}

impl<'a> Decoder<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Decoder {
            data,
            pos: 0,
            end: data.len(),
            remaining: 0,
            flags: 0,
            #[cfg(feature = "packed")]
            tables: crate::packed::TableStack::empty(),
        }
    }

    /// Offset of the read position within the underlying slice.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn in_container(&self) -> bool {
        self.flags & FLAG_CONTAINER != 0
    }

    pub fn is_indefinite(&self) -> bool {
        self.flags & FLAG_INDEFINITE != 0
    }

    /// Items (for arrays) or pairs (for maps) left to consume in a
    /// definite-length container. `None` at top level and inside
    /// indefinite-length containers.
    pub fn items_remaining(&self) -> Option<u64> {
        if self.flags & FLAG_CONTAINER == 0 || self.flags & FLAG_INDEFINITE != 0 {
            None
        } else if self.flags & FLAG_MAP != 0 {
            Some(self.remaining / 2)
        } else {
            Some(self.remaining)
        }
    }

    /// True once every item of the cursor's scope has been consumed. For an
    /// indefinite-length container this inspects, but does not consume, the
    /// break byte; the matching [`Decoder::leave_container`] consumes it.
    pub fn at_end(&self) -> bool {
        if self.flags & FLAG_CONTAINER != 0 {
            if self.flags & FLAG_INDEFINITE != 0 {
                self.pos >= self.end || self.data[self.pos] == BREAK
            } else {
                self.remaining == 0 || self.pos >= self.end
            }
        } else {
            self.pos >= self.end
        }
    }

    fn check_readable(&self) -> Result<(), Error> {
        if self.at_end() {
            Err(Error::EndOfInput)
        } else {
            Ok(())
        }
    }

    pub(crate) fn major_raw(&self) -> Result<MajorType, Error> {
        if self.pos >= self.end {
            return Err(Error::EndOfInput);
        }
        Ok(MajorType::of(self.data[self.pos]))
    }

    /// Major type of the current item. With packed support enabled this is
    /// the type of the referenced item, not of the reference.
    pub fn get_type(&self) -> Result<MajorType, Error> {
        #[cfg(feature = "packed")]
        if let Some(inner) = self.follow_shared(RECURSION_MAX)? {
            return inner.get_type();
        }
        self.check_readable()?;
        self.major_raw()
    }

    /// A copy of this cursor at `pos`, stripped of container state.
    pub(crate) fn detached(&self, pos: usize) -> Decoder<'a> {
        let mut d = self.clone();
        d.pos = pos;
        d.remaining = 0;
        d.flags = self.flags & FLAG_PACKED;
        d
    }

    fn advance(&mut self, n: usize) {
        self.pos += n;
        if self.flags & FLAG_CONTAINER != 0 && self.flags & FLAG_INDEFINITE == 0 {
            self.remaining -= 1;
        }
    }

    /// Decode the argument of the item at the cursor without consuming it.
    /// `max_minor` caps the argument width; the indefinite marker and the
    /// reserved values 28..30 are not acceptable arguments here.
    pub(crate) fn decode_arg(&self, expect: MajorType, max_minor: u8) -> Result<(u64, usize), Error> {
        if self.pos >= self.end {
            return Err(Error::EndOfInput);
        }
        let initial = self.data[self.pos];
        if initial >> MAJOR_OFFSET != expect as u8 {
            return Err(Error::InvalidType);
        }
        match initial & ARG_MASK {
            minor @ 0..=23 => Ok((minor as u64, 1)),
            minor @ 24..=27 => {
                if minor > max_minor {
                    return Err(Error::Overflow);
                }
                let width = 1usize << (minor - ARG_1BYTE);
                let payload = self.pos + 1;
                if payload + width > self.end {
                    return Err(Error::EndOfInput);
                }
                let mut raw = [0u8; 8];
                raw[8 - width..].copy_from_slice(&self.data[payload..payload + width]);
                Ok((u64::from_be_bytes(raw), 1 + width))
            }
            _ => Err(Error::InvalidType),
        }
    }

    fn get_unsigned(&mut self, max_minor: u8) -> Result<(u64, usize), Error> {
        self.check_readable()?;
        let (v, n) = self.decode_arg(MajorType::Unsigned, max_minor)?;
        self.advance(n);
        Ok((v, n))
    }

    fn get_signed(&mut self, max_minor: u8, positive_max: u64, negative_max: u64) -> Result<(i64, usize), Error> {
        self.check_readable()?;
        match self.major_raw()? {
            MajorType::Unsigned => {
                let (v, n) = self.decode_arg(MajorType::Unsigned, max_minor)?;
                if v > positive_max {
                    return Err(Error::Overflow);
                }
                self.advance(n);
                Ok((v as i64, n))
            }
            MajorType::Negative => {
                let (v, n) = self.decode_arg(MajorType::Negative, max_minor)?;
                if v > negative_max {
                    return Err(Error::Overflow);
                }
                self.advance(n);
                Ok((-1 - (v as i64), n))
            }
            _ => Err(Error::InvalidType),
        }
    }

    pub fn get_u8(&mut self) -> Result<(u8, usize), Error> {
        follow_packed!(self.get_u8());
        let (v, n) = self.get_unsigned(ARG_1BYTE)?;
        Ok((v as u8, n))
    }

    pub fn get_u16(&mut self) -> Result<(u16, usize), Error> {
        follow_packed!(self.get_u16());
        let (v, n) = self.get_unsigned(ARG_2BYTES)?;
        Ok((v as u16, n))
    }

    pub fn get_u32(&mut self) -> Result<(u32, usize), Error> {
        follow_packed!(self.get_u32());
        let (v, n) = self.get_unsigned(ARG_4BYTES)?;
        Ok((v as u32, n))
    }

    pub fn get_u64(&mut self) -> Result<(u64, usize), Error> {
        follow_packed!(self.get_u64());
        self.get_unsigned(ARG_8BYTES)
    }

    pub fn get_i8(&mut self) -> Result<(i8, usize), Error> {
        follow_packed!(self.get_i8());
        let (v, n) = self.get_signed(ARG_1BYTE, i8::MAX as u64, i8::MAX as u64 - 1)?;
        Ok((v as i8, n))
    }

    pub fn get_i16(&mut self) -> Result<(i16, usize), Error> {
        follow_packed!(self.get_i16());
        let (v, n) = self.get_signed(ARG_2BYTES, i16::MAX as u64, i16::MAX as u64 - 1)?;
        Ok((v as i16, n))
    }

    pub fn get_i32(&mut self) -> Result<(i32, usize), Error> {
        follow_packed!(self.get_i32());
        let (v, n) = self.get_signed(ARG_4BYTES, i32::MAX as u64, i32::MAX as u64 - 1)?;
        Ok((v as i32, n))
    }

    pub fn get_i64(&mut self) -> Result<(i64, usize), Error> {
        follow_packed!(self.get_i64());
        self.get_signed(ARG_8BYTES, i64::MAX as u64, i64::MAX as u64)
    }

    fn get_str(&mut self, expect: MajorType) -> Result<(&'a [u8], usize), Error> {
        self.check_readable()?;
        let (len, hdr) = self.decode_arg(expect, ARG_8BYTES)?;
        let len = usize::try_from(len).map_err(|_| Error::Overflow)?;
        let start = self.pos + hdr;
        let end = start.checked_add(len).ok_or(Error::EndOfInput)?;
        if end > self.end {
            return Err(Error::EndOfInput);
        }
        self.advance(hdr + len);
        Ok((&self.data[start..end], hdr + len))
    }

    /// Definite-length byte string, zero-copy.
    pub fn get_bstr(&mut self) -> Result<(&'a [u8], usize), Error> {
        follow_packed!(self.get_bstr());
        self.get_str(MajorType::Bytes)
    }

    /// Definite-length text string, zero-copy. The bytes are not validated
    /// as UTF-8.
    pub fn get_tstr(&mut self) -> Result<(&'a [u8], usize), Error> {
        follow_packed!(self.get_tstr());
        self.get_str(MajorType::Text)
    }

    /// Read a tag number, leaving the cursor on the tagged item.
    ///
    /// The tagged item still counts as the container step; `remaining` is
    /// decremented by the read that consumes it, not here. When the tag is
    /// reached through a shared-item reference the cursor is committed to
    /// the resolved position, since the item cannot be left half-read;
    /// callers that need to continue the referencing stream keep a clone
    /// and [`Decoder::skip`] it.
    pub fn get_tag(&mut self) -> Result<(u32, usize), Error> {
        #[cfg(feature = "packed")]
        if let Some(mut inner) = self.follow_shared(RECURSION_MAX)? {
            let r = inner.get_tag()?;
            *self = inner;
            return Ok(r);
        }
        self.check_readable()?;
        let (tag, n) = self.decode_arg(MajorType::Tag, ARG_4BYTES)?;
        self.pos += n;
        Ok((tag as u32, n))
    }

    pub fn get_bool(&mut self) -> Result<(bool, usize), Error> {
        follow_packed!(self.get_bool());
        self.check_readable()?;
        match self.data[self.pos] {
            b if b == (7 << MAJOR_OFFSET) | SIMPLE_FALSE => {
                self.advance(1);
                Ok((false, 1))
            }
            b if b == (7 << MAJOR_OFFSET) | SIMPLE_TRUE => {
                self.advance(1);
                Ok((true, 1))
            }
            _ => Err(Error::InvalidType),
        }
    }

    pub fn get_null(&mut self) -> Result<usize, Error> {
        follow_packed!(self.get_null());
        self.get_single_simple(SIMPLE_NULL)
    }

    pub fn get_undefined(&mut self) -> Result<usize, Error> {
        follow_packed!(self.get_undefined());
        self.get_single_simple(SIMPLE_UNDEFINED)
    }

    fn get_single_simple(&mut self, simple: u8) -> Result<usize, Error> {
        self.check_readable()?;
        if self.data[self.pos] != (7 << MAJOR_OFFSET) | simple {
            return Err(Error::InvalidType);
        }
        self.advance(1);
        Ok(1)
    }

    /// Numeric simple value. The reserved range 24..31 is rejected.
    pub fn get_simple(&mut self) -> Result<(u8, usize), Error> {
        follow_packed!(self.get_simple());
        self.check_readable()?;
        let initial = self.data[self.pos];
        if initial >> MAJOR_OFFSET != MajorType::Float as u8 {
            return Err(Error::InvalidType);
        }
        match initial & ARG_MASK {
            v @ 0..=23 => {
                self.advance(1);
                Ok((v, 1))
            }
            ARG_1BYTE => {
                if self.pos + 2 > self.end {
                    return Err(Error::EndOfInput);
                }
                let v = self.data[self.pos + 1];
                if v < SIMPLE_RESERVED_MIN {
                    return Err(Error::InvalidType);
                }
                self.advance(2);
                Ok((v, 2))
            }
            _ => Err(Error::InvalidType),
        }
    }

    fn float_payload<const N: usize>(&self) -> Result<[u8; N], Error> {
        let start = self.pos + 1;
        if start + N > self.end {
            return Err(Error::EndOfInput);
        }
        Ok(self.data[start..start + N].try_into().unwrap())
    }

    /// Single-precision float; halves are widened on read.
    pub fn get_float(&mut self) -> Result<(f32, usize), Error> {
        follow_packed!(self.get_float());
        self.check_readable()?;
        let initial = self.data[self.pos];
        if initial >> MAJOR_OFFSET != MajorType::Float as u8 {
            return Err(Error::InvalidType);
        }
        match initial & ARG_MASK {
            ARG_2BYTES => {
                let v = f16::from_be_bytes(self.float_payload::<2>()?);
                self.advance(3);
                Ok((v.into(), 3))
            }
            ARG_4BYTES => {
                let v = f32::from_be_bytes(self.float_payload::<4>()?);
                self.advance(5);
                Ok((v, 5))
            }
            _ => Err(Error::InvalidType),
        }
    }

    /// Double-precision float; halves and singles are widened on read.
    pub fn get_double(&mut self) -> Result<(f64, usize), Error> {
        follow_packed!(self.get_double());
        self.check_readable()?;
        let initial = self.data[self.pos];
        if initial >> MAJOR_OFFSET != MajorType::Float as u8 {
            return Err(Error::InvalidType);
        }
        match initial & ARG_MASK {
            ARG_2BYTES => {
                let v = f16::from_be_bytes(self.float_payload::<2>()?);
                self.advance(3);
                Ok((v.into(), 3))
            }
            ARG_4BYTES => {
                let v = f32::from_be_bytes(self.float_payload::<4>()?);
                self.advance(5);
                Ok((v.into(), 5))
            }
            ARG_8BYTES => {
                let v = f64::from_be_bytes(self.float_payload::<8>()?);
                self.advance(9);
                Ok((v, 9))
            }
            _ => Err(Error::InvalidType),
        }
    }

    /// Tag 4 wrapping `[exponent, mantissa]`, both signed 32-bit.
    pub fn get_decimal_fraction(&mut self) -> Result<((i32, i32), usize), Error> {
        follow_packed!(self.get_decimal_fraction());
        self.check_readable()?;
        let mut probe = self.clone();
        let (tag, hdr) = probe.decode_arg(MajorType::Tag, ARG_4BYTES)?;
        if tag != TAG_DECIMAL_FRACTION {
            return Err(Error::InvalidType);
        }
        probe.pos += hdr;
        let mut items = probe.enter_array()?;
        let (e, _) = items.get_i32()?;
        let (m, _) = items.get_i32()?;
        if !items.at_end() {
            return Err(Error::InvalidType);
        }
        probe.leave_container(&items)?;
        let consumed = probe.pos - self.pos;
        *self = probe;
        Ok(((e, m), consumed))
    }

    pub fn enter_array(&self) -> Result<Decoder<'a>, Error> {
        self.enter_container(MajorType::Array)
    }

    pub fn enter_map(&self) -> Result<Decoder<'a>, Error> {
        self.enter_container(MajorType::Map)
    }

    fn enter_container(&self, expect: MajorType) -> Result<Decoder<'a>, Error> {
        #[cfg(feature = "packed")]
        if let Some(inner) = self.follow_shared(RECURSION_MAX)? {
            let mut child = inner.enter_container_raw(expect)?;
            child.flags |= FLAG_SHARED;
            return Ok(child);
        }
        self.enter_container_raw(expect)
    }

    pub(crate) fn enter_container_raw(&self, expect: MajorType) -> Result<Decoder<'a>, Error> {
        self.check_readable()?;
        let initial = self.data[self.pos];
        if initial >> MAJOR_OFFSET != expect as u8 {
            return Err(Error::InvalidType);
        }
        let mut child = self.clone();
        child.flags = (self.flags & FLAG_PACKED) | FLAG_CONTAINER;
        if expect == MajorType::Map {
            child.flags |= FLAG_MAP;
        }
        child.remaining = 0;
        if initial & ARG_MASK == ARG_INDEFINITE {
            child.flags |= FLAG_INDEFINITE;
            child.pos = self.pos + 1;
        } else {
            let (count, hdr) = self.decode_arg(expect, ARG_4BYTES)?;
            child.remaining = if expect == MajorType::Map {
                count.checked_mul(2).ok_or(Error::Overflow)?
            } else {
                count
            };
            child.pos = self.pos + hdr;
        }
        Ok(child)
    }

    /// Step over a fully consumed container, advancing this cursor past it.
    ///
    /// The child must be at its end. A container reached through a
    /// shared-item reference does not occupy bytes in this cursor's stream;
    /// leaving it advances past the reference instead.
    pub fn leave_container(&mut self, child: &Decoder<'a>) -> Result<(), Error> {
        if child.flags & FLAG_CONTAINER == 0 {
            return Err(Error::InvalidType);
        }
        #[cfg(feature = "packed")]
        if child.flags & FLAG_SHARED != 0 {
            if !child.at_end() {
                return Err(Error::InvalidType);
            }
            self.skip()?;
            return Ok(());
        }
        let mut next = child.pos;
        if child.flags & FLAG_INDEFINITE != 0 {
            if next >= child.end {
                return Err(Error::EndOfInput);
            }
            if child.data[next] != BREAK {
                return Err(Error::InvalidType);
            }
            next += 1;
        } else if child.remaining != 0 {
            // a truncated container cannot reach its declared count
            return Err(if child.pos >= child.end {
                Error::EndOfInput
            } else {
                Error::InvalidType
            });
        }
        if next <= self.pos || next > self.end {
            return Err(Error::InvalidType);
        }
        self.pos = next;
        if self.flags & FLAG_CONTAINER != 0 && self.flags & FLAG_INDEFINITE == 0 {
            self.remaining -= 1;
        }
        Ok(())
    }

    /// Consume exactly one item, recursing into containers and tag chains
    /// up to [`RECURSION_MAX`]. Shared-item references are skipped as the
    /// plain items they are on the wire; nothing is resolved.
    pub fn skip(&mut self) -> Result<usize, Error> {
        self.skip_limited(RECURSION_MAX)
    }

    pub(crate) fn skip_limited(&mut self, limit: u8) -> Result<usize, Error> {
        if limit == 0 {
            return Err(Error::Recursion);
        }
        self.check_readable()?;
        let start = self.pos;
        let initial = self.data[self.pos];
        match MajorType::of(initial) {
            t @ (MajorType::Unsigned | MajorType::Negative | MajorType::Float) => {
                let (_, n) = self.decode_arg(t, ARG_8BYTES)?;
                self.advance(n);
            }
            t @ (MajorType::Bytes | MajorType::Text) => {
                if initial & ARG_MASK == ARG_INDEFINITE {
                    self.skip_chunks(t)?;
                } else {
                    self.get_str(t)?;
                }
            }
            t @ (MajorType::Array | MajorType::Map) => {
                let mut child = self.enter_container_raw(t)?;
                while !child.at_end() {
                    child.skip_limited(limit - 1)?;
                }
                self.leave_container(&child)?;
            }
            MajorType::Tag => {
                let (_, n) = self.decode_arg(MajorType::Tag, ARG_8BYTES)?;
                self.pos += n;
                self.skip_limited(limit - 1)?;
            }
        }
        Ok(self.pos - start)
    }

    /// Indefinite-length string: definite chunks of the outer major type up
    /// to a break byte. Skipped as a single item, never reassembled.
    fn skip_chunks(&mut self, expect: MajorType) -> Result<(), Error> {
        let start = self.pos;
        let mut pos = self.pos + 1;
        loop {
            if pos >= self.end {
                return Err(Error::EndOfInput);
            }
            let initial = self.data[pos];
            if initial == BREAK {
                pos += 1;
                break;
            }
            if initial >> MAJOR_OFFSET != expect as u8 || initial & ARG_MASK == ARG_INDEFINITE {
                return Err(Error::InvalidType);
            }
            let chunk = self.detached(pos);
            let (len, hdr) = chunk.decode_arg(expect, ARG_8BYTES)?;
            let len = usize::try_from(len).map_err(|_| Error::Overflow)?;
            let next = pos
                .checked_add(hdr)
                .and_then(|p| p.checked_add(len))
                .ok_or(Error::EndOfInput)?;
            if next > self.end {
                return Err(Error::EndOfInput);
            }
            pos = next;
        }
        self.advance(pos - start);
        Ok(())
    }

    /// Linear search over the rest of a map for a text key. On success the
    /// cursor is left on the corresponding value; on `NotFound` it is left
    /// at the end of the map. Non-text keys are stepped over, not matched.
    pub fn map_lookup(&mut self, key: &str) -> Result<(), Error> {
        while !self.at_end() {
            match self.get_tstr() {
                Ok((k, _)) => {
                    if k == key.as_bytes() {
                        return Ok(());
                    }
                }
                Err(Error::InvalidType) => {
                    self.skip()?;
                }
                Err(e) => return Err(e),
            }
            self.skip()?;
        }
        Err(Error::NotFound)
    }
}
