//! Wire records for the parameter subsystem.
//!
//! Unlike the file-client channel, parameter messages carry no explicit
//! operation tag; the reference protocol dispatches purely on message
//! length (`SPEC_FULL.md` §4.5 / spec.md §4.5). The decoder below
//! reproduces that dispatch exactly, as one tagged match at the boundary.

use smallvec::SmallVec;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::RecordError;
use super::argument::ArgumentIterator;

pub(crate) type RecordBuf = SmallVec<[u8; 32]>;

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RequestDescriptorWire {
    index: u8,
    directory: u8,
}

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct RequestValueWire {
    index: u8,
    directory: u8,
    pad: u8,
}

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct StoreValueWire {
    value: i32,
    directory: u8,
    index: u8,
}

#[repr(C, packed)]
#[derive(FromBytes, IntoBytes, KnownLayout, Immutable)]
struct DescriptorHeaderWire {
    value: i32,
    min: i32,
    max: i32,
    step: i32,
    decimal: u8,
    directory: u8,
    index: u8,
    param_type: u8,
}

/// Size, in bytes, of the fixed portion of a descriptor reply (before the
/// `name\0formatting\0` literals tail). Computed via `size_of`, not a
/// hardcoded literal, so layout drift cannot silently desync decode.
pub(crate) const DESCRIPTOR_HEADER_SIZE: usize = size_of::<DescriptorHeaderWire>();
const STORE_VALUE_SIZE: usize = size_of::<StoreValueWire>();

/// A decoded inbound parameter message, tagged by the dispatch-by-length
/// rule and matched exhaustively downstream.
#[derive(Debug)]
pub(crate) enum ParamInbound<'a> {
    /// 2 bytes: a remote peer asking this node to describe one entry.
    DescriptorRequest { index: u8, directory: u8 },
    /// 3 bytes: a remote peer asking this node for one entry's value.
    ValueRequest { index: u8, directory: u8 },
    /// `sizeof(StoreValue)` bytes: a remote peer writing one entry's value.
    ValueStore { value: i32, directory: u8, index: u8 },
    /// `sizeof(StoreValue) + 1` bytes: a reply to our own value request.
    ValueReply { value: i32, directory: u8, index: u8 },
    /// `> sizeof(DescriptorHeader)` bytes: a reply to our own descriptor request.
    DescriptorReply {
        value: i32,
        min: i32,
        max: i32,
        step: i32,
        decimal: u8,
        directory: u8,
        index: u8,
        param_type: u8,
        /// `name\0formatting\0`, not yet split.
        literals: &'a [u8],
    },
}

/// Decodes one inbound parameter message by its length alone.
pub(crate) fn decode_param_inbound(data: &[u8]) -> Result<ParamInbound<'_>, RecordError> {
    match data.len() {
        2 => {
            let mut it = ArgumentIterator::new(data);
            let hdr: &RequestDescriptorWire = it.fetch().expect("length checked above");
            Ok(ParamInbound::DescriptorRequest {
                index: hdr.index,
                directory: hdr.directory,
            })
        }
        3 => {
            let mut it = ArgumentIterator::new(data);
            let hdr: &RequestValueWire = it.fetch().expect("length checked above");
            Ok(ParamInbound::ValueRequest {
                index: hdr.index,
                directory: hdr.directory,
            })
        }
        n if n == STORE_VALUE_SIZE => {
            let mut it = ArgumentIterator::new(data);
            let hdr: &StoreValueWire = it.fetch().expect("length checked above");
            Ok(ParamInbound::ValueStore {
                value: hdr.value,
                directory: hdr.directory,
                index: hdr.index,
            })
        }
        n if n == STORE_VALUE_SIZE + 1 => {
            let mut it = ArgumentIterator::new(data);
            let hdr: &StoreValueWire = it.fetch().expect("length checked above");
            Ok(ParamInbound::ValueReply {
                value: hdr.value,
                directory: hdr.directory,
                index: hdr.index,
            })
        }
        n if n > DESCRIPTOR_HEADER_SIZE => {
            let mut it = ArgumentIterator::new(data);
            let hdr: &DescriptorHeaderWire = it.fetch().expect("length checked above");
            let value = hdr.value;
            let min = hdr.min;
            let max = hdr.max;
            let step = hdr.step;
            let decimal = hdr.decimal;
            let directory = hdr.directory;
            let index = hdr.index;
            let param_type = hdr.param_type;
            let literals = it.fetch_all();
            Ok(ParamInbound::DescriptorReply {
                value,
                min,
                max,
                step,
                decimal,
                directory,
                index,
                param_type,
                literals,
            })
        }
        _ => Err(RecordError::LengthMismatch),
    }
}

/// Splits a descriptor reply's `name\0formatting\0` tail. Returns `None` if
/// either string is missing its terminator within bounds.
pub(crate) fn split_literals(literals: &[u8]) -> Option<(&[u8], &[u8])> {
    let mut it = ArgumentIterator::new(literals);
    let name = it.fetch_str()?;
    let fmt = it.fetch_str()?;
    Some((name, fmt))
}

pub(crate) fn encode_descriptor_request(index: u8, directory: u8) -> RecordBuf {
    let mut buf = RecordBuf::new();
    buf.extend_from_slice(RequestDescriptorWire { index, directory }.as_bytes());
    buf
}

pub(crate) fn encode_value_request(index: u8, directory: u8) -> RecordBuf {
    let mut buf = RecordBuf::new();
    buf.extend_from_slice(
        RequestValueWire {
            index,
            directory,
            pad: 0,
        }
        .as_bytes(),
    );
    buf
}

pub(crate) fn encode_value_store(value: i32, directory: u8, index: u8) -> RecordBuf {
    let mut buf = RecordBuf::new();
    buf.extend_from_slice(
        StoreValueWire {
            value,
            directory,
            index,
        }
        .as_bytes(),
    );
    buf
}

pub(crate) fn encode_value_reply(value: i32, directory: u8, index: u8) -> RecordBuf {
    let mut buf = RecordBuf::new();
    buf.extend_from_slice(
        StoreValueWire {
            value,
            directory,
            index,
        }
        .as_bytes(),
    );
    buf.push(0);
    buf
}

/// With `static-buffers`, mirrors the reference implementation's fixed
/// `static_buffer[sizeof(header) + 128]` scratch region: literals that
/// would not fit a 128-byte tail are truncated rather than growing the
/// record without bound (formatting is dropped first, then the name).
#[cfg(feature = "static-buffers")]
const STATIC_LITERALS_CAP: usize = 128;

#[cfg(feature = "static-buffers")]
fn clamp_literals<'a>(name: &'a [u8], formatting: &'a [u8]) -> (&'a [u8], &'a [u8]) {
    let mut namelength = name.len();
    let mut formatlength = formatting.len();
    if namelength + formatlength + 2 > STATIC_LITERALS_CAP {
        formatlength = 0;
        if namelength + 2 > STATIC_LITERALS_CAP {
            namelength = STATIC_LITERALS_CAP - 2;
        }
    }
    (&name[..namelength], &formatting[..formatlength])
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn encode_descriptor_reply(
    value: i32,
    min: i32,
    max: i32,
    step: i32,
    decimal: u8,
    directory: u8,
    index: u8,
    param_type: u8,
    name: &[u8],
    formatting: &[u8],
) -> RecordBuf {
    #[cfg(feature = "static-buffers")]
    let (name, formatting) = clamp_literals(name, formatting);
    let mut buf = RecordBuf::new();
    buf.extend_from_slice(
        DescriptorHeaderWire {
            value,
            min,
            max,
            step,
            decimal,
            directory,
            index,
            param_type,
        }
        .as_bytes(),
    );
    buf.extend_from_slice(name);
    buf.push(0);
    buf.extend_from_slice(formatting);
    buf.push(0);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_descriptor_request() {
        match decode_param_inbound(&[3, 1]).unwrap() {
            ParamInbound::DescriptorRequest { index, directory } => {
                assert_eq!(index, 3);
                assert_eq!(directory, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn descriptor_reply_round_trips_literals() {
        let buf = encode_descriptor_reply(100, 0, 1000, 1, 0, 1, 3, 0b0010, b"Speed", b"rpm");
        match decode_param_inbound(&buf).unwrap() {
            ParamInbound::DescriptorReply {
                value,
                directory,
                index,
                literals,
                ..
            } => {
                assert_eq!(value, 100);
                assert_eq!(directory, 1);
                assert_eq!(index, 3);
                let (name, fmt) = split_literals(literals).unwrap();
                assert_eq!(name, b"Speed");
                assert_eq!(fmt, b"rpm");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn value_store_and_value_reply_differ_by_one_trailing_byte() {
        let store = encode_value_store(7, 1, 3);
        let reply = encode_value_reply(7, 1, 3);
        assert_eq!(reply.len(), store.len() + 1);
        assert!(matches!(
            decode_param_inbound(&store).unwrap(),
            ParamInbound::ValueStore { .. }
        ));
        assert!(matches!(
            decode_param_inbound(&reply).unwrap(),
            ParamInbound::ValueReply { .. }
        ));
    }

    #[test]
    fn rejects_unrecognized_length() {
        assert_eq!(
            decode_param_inbound(&[0u8; 1]).unwrap_err(),
            RecordError::LengthMismatch
        );
    }

    #[cfg(feature = "static-buffers")]
    #[test]
    fn oversized_literals_are_truncated_not_grown() {
        let long_name = vec![b'n'; 200];
        let buf = encode_descriptor_reply(0, 0, 0, 0, 0, 0, 0, 0, &long_name, b"rpm");
        match decode_param_inbound(&buf).unwrap() {
            ParamInbound::DescriptorReply { literals, .. } => {
                let (name, fmt) = split_literals(literals).unwrap();
                assert_eq!(name.len(), STATIC_LITERALS_CAP - 2);
                assert!(fmt.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
