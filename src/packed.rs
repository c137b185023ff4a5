//! Packed-CBOR unpacking: shared-item references (simple values 0..15 and
//! tag 6) and table definitions (tag 113), per the packed-CBOR draft.
//!
//! The engine runs at the head of every typed reader and container-enter on
//! a cursor with packed support enabled. It rewrites such a cursor into a
//! temporary one positioned on the reconstructed item, which may live in a
//! previously installed shared-item table. Reference chains and table
//! definitions unpack recursively under the same depth bound as `skip`;
//! cycles exhaust the bound and fail with `Recursion`.

use crate::decode::{Decoder, MajorType, ARG_8BYTES, ARG_MASK, FLAG_PACKED};
use crate::{Error, PACKED_TABLES_MAX, RECURSION_MAX};

const TAG_SHARED_REF: u64 = 6;
const TAG_PACKED_TABLE: u64 = 113;

/// Highest simple value that encodes a shared-item reference.
const SIMPLE_REF_MAX: u8 = 15;

/// The active shared-item tables of a cursor, innermost last. Each entry is
/// the byte range of one CBOR array whose elements are addressable by index.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TableStack<'a> {
    entries: [&'a [u8]; PACKED_TABLES_MAX],
    len: usize,
}

impl<'a> TableStack<'a> {
    pub(crate) const fn empty() -> Self {
        TableStack {
            entries: [&[]; PACKED_TABLES_MAX],
            len: 0,
        }
    }

    fn push(&mut self, table: &'a [u8]) -> Result<(), Error> {
        if self.len == PACKED_TABLES_MAX {
            return Err(Error::PackedMemory);
        }
        self.entries[self.len] = table;
        self.len += 1;
        Ok(())
    }

    /// The stack as seen from inside table `idx`: tables installed by inner
    /// scopes are no longer in scope when reading from an outer table.
    fn scoped_to(&self, idx: usize) -> Self {
        let mut s = *self;
        s.len = idx + 1;
        s
    }
}

impl<'a> Decoder<'a> {
    /// Decoder with packed-CBOR support enabled and no initial table.
    pub fn new_packed(data: &'a [u8]) -> Self {
        let mut d = Decoder::new(data);
        d.flags |= FLAG_PACKED;
        d
    }

    /// Decoder with packed-CBOR support and an externally supplied table:
    /// one CBOR array in its own byte region. An empty region installs
    /// nothing; anything other than a single well-formed array fails with
    /// `PackedFormat`.
    pub fn with_shared_table(data: &'a [u8], table: &'a [u8]) -> Result<Self, Error> {
        let mut d = Decoder::new_packed(data);
        if !table.is_empty() {
            let mut probe = Decoder::new(table);
            if probe.major_raw().map_err(|_| Error::PackedFormat)? != MajorType::Array {
                return Err(Error::PackedFormat);
            }
            probe.skip().map_err(|_| Error::PackedFormat)?;
            if probe.pos != table.len() {
                return Err(Error::PackedFormat);
            }
            d.tables.push(table)?;
        }
        Ok(d)
    }

    /// Resolve whatever packed form stands at the cursor.
    ///
    /// Returns `None` when packed support is disabled or the current item is
    /// not a packed form; otherwise a temporary cursor positioned on the
    /// reconstructed item, with the table scope that position implies.
    pub(crate) fn follow_shared(&self, mut limit: u8) -> Result<Option<Decoder<'a>>, Error> {
        if self.flags & FLAG_PACKED == 0 {
            return Ok(None);
        }
        let mut cur: Option<Decoder<'a>> = None;
        loop {
            let here = cur.as_ref().unwrap_or(self);
            if here.at_end() {
                return Ok(cur);
            }
            let initial = here.data[here.pos];
            let next = match MajorType::of(initial) {
                MajorType::Float if initial & ARG_MASK <= SIMPLE_REF_MAX => {
                    if limit == 0 {
                        return Err(Error::Recursion);
                    }
                    limit -= 1;
                    here.resolve_reference((initial & ARG_MASK) as u64)?
                }
                MajorType::Tag => {
                    let (tag, hdr) = here.decode_arg(MajorType::Tag, ARG_8BYTES)?;
                    match tag {
                        TAG_SHARED_REF => {
                            if limit == 0 {
                                return Err(Error::Recursion);
                            }
                            limit -= 1;
                            match here.reference_index(here.pos + hdr, limit)? {
                                Some(idx) => here.resolve_reference(idx)?,
                                // Tag 6 around non-integer content is the
                                // standard CBOR tag, not a reference.
                                None => return Ok(cur),
                            }
                        }
                        TAG_PACKED_TABLE => {
                            if limit == 0 {
                                return Err(Error::Recursion);
                            }
                            limit -= 1;
                            here.consume_table_definition(hdr, limit)?
                        }
                        _ => return Ok(cur),
                    }
                }
                _ => return Ok(cur),
            };
            cur = Some(next);
        }
    }

    /// Index encoded by the content of a tag-6 reference, or `None` when the
    /// content is not an integer. The content may itself be packed.
    fn reference_index(&self, content_pos: usize, limit: u8) -> Result<Option<u64>, Error> {
        let content = self.detached(content_pos);
        let content = match content.follow_shared(limit)? {
            Some(resolved) => resolved,
            None => content,
        };
        match content.major_raw()? {
            MajorType::Unsigned => {
                let (n, _) = content.decode_arg(MajorType::Unsigned, ARG_8BYTES)?;
                n.checked_mul(2)
                    .and_then(|i| i.checked_add(16))
                    .ok_or(Error::PackedUndefinedReference)
                    .map(Some)
            }
            MajorType::Negative => {
                let (u, _) = content.decode_arg(MajorType::Negative, ARG_8BYTES)?;
                u.checked_mul(2)
                    .and_then(|i| i.checked_add(17))
                    .ok_or(Error::PackedUndefinedReference)
                    .map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Walk the active tables from the innermost outward until one contains
    /// the index, stepping over shared items to reach it. Indefinite-length
    /// tables advertise no size; theirs is discovered by iteration.
    fn resolve_reference(&self, mut idx: u64) -> Result<Decoder<'a>, Error> {
        for t in (0..self.tables.len).rev() {
            let table = self.tables.entries[t];
            let mut outer = Decoder::new(table);
            outer.flags |= FLAG_PACKED;
            outer.tables = self.tables.scoped_to(t);
            let mut items = outer.enter_container_raw(MajorType::Array)?;
            while !items.at_end() {
                if idx == 0 {
                    return Ok(items.detached(items.pos));
                }
                items.skip_limited(RECURSION_MAX)?;
                idx -= 1;
            }
        }
        Err(Error::PackedUndefinedReference)
    }

    /// Consume `113([table, rump])` at the cursor: install the table and
    /// resolve to the rump, whose end caps the returned cursor. The
    /// two-element array may itself sit behind a reference.
    fn consume_table_definition(&self, hdr: usize, limit: u8) -> Result<Decoder<'a>, Error> {
        let content = self.detached(self.pos + hdr);
        let target = match content.follow_shared(limit)? {
            Some(resolved) => resolved,
            None => content,
        };
        let mut items = target.enter_container_raw(MajorType::Array).map_err(|e| {
            if e == Error::InvalidType {
                Error::PackedFormat
            } else {
                e
            }
        })?;
        if items.at_end() {
            return Err(Error::PackedFormat);
        }
        // The table element may itself sit behind a reference.
        let elem = items.detached(items.pos);
        let elem = match elem.follow_shared(limit)? {
            Some(resolved) => resolved,
            None => elem,
        };
        if elem.major_raw()? != MajorType::Array {
            return Err(Error::PackedFormat);
        }
        let table_start = elem.pos;
        let mut past_table = elem.clone();
        past_table.skip_limited(RECURSION_MAX)?;
        let table = &elem.data[table_start..past_table.pos];
        items.skip_limited(RECURSION_MAX)?;
        if items.at_end() {
            return Err(Error::PackedFormat);
        }
        let rump_start = items.pos;
        let mut past_rump = items.clone();
        past_rump.skip_limited(RECURSION_MAX)?;
        if !past_rump.at_end() {
            return Err(Error::PackedFormat);
        }
        let mut tables = target.tables;
        tables.push(table)?;
        let mut rump = target.detached(rump_start);
        rump.end = past_rump.pos;
        rump.tables = tables;
        Ok(rump)
    }
}
