//! Argument decomposition for inbound wire records.
//!
//! Helper to decompose a slice of bytes received off the bus into the
//! typed fields of a record, one field at a time, left to right.

use zerocopy::FromBytes;
use zerocopy::Immutable;
use zerocopy::KnownLayout;
use zerocopy::error::ConvertError;

/// An iterator that fetches typed fields from the front of a byte slice.
pub(crate) struct ArgumentIterator<'a> {
    data: &'a [u8],
}

impl<'a> ArgumentIterator<'a> {
    /// Creates a new argument iterator over the given bytes.
    pub(crate) fn new(data: &'a [u8]) -> ArgumentIterator<'a> {
        ArgumentIterator { data }
    }

    /// Returns the number of bytes not yet consumed.
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    /// Fetches a slice of all remaining bytes.
    pub(crate) fn fetch_all(&mut self) -> &'a [u8] {
        let bytes = self.data;
        self.data = &[];
        bytes
    }

    /// Fetches a typed field. Returns `None` if there's not enough data left.
    pub(crate) fn fetch<T: FromBytes + KnownLayout + Immutable>(&mut self) -> Option<&'a T> {
        match zerocopy::Ref::<_, T>::from_prefix(self.data) {
            Err(ConvertError::Alignment(_)) => {
                // Our wire structs are all single-byte-aligned (repr(C, packed))
                // so this can only happen if a programmer error introduces a
                // field with real alignment requirements.
                panic!("wire field unaligned");
            }
            Err(ConvertError::Size(_)) => None,
            Err(ConvertError::Validity(infallible)) => match infallible {},
            Ok((x, rest)) => {
                self.data = rest;
                Some(zerocopy::Ref::<&[u8], T>::into_ref(x))
            }
        }
    }

    /// Fetches a NUL-terminated byte string. Returns `None` if there's not
    /// enough data left or no terminator is present within bounds.
    pub(crate) fn fetch_str(&mut self) -> Option<&'a [u8]> {
        let len = memchr::memchr(0, self.data)?;
        let (out, rest) = self.data.split_at(len);
        self.data = &rest[1..];
        Some(out)
    }
}
