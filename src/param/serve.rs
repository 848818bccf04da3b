//! Parameter Serving (`SPEC_FULL.md` §4.5 / spec.md's `proceed_param`):
//! responds to inbound descriptor requests, value-only requests, and
//! value-store messages targeting directories owned by this node.

use crate::wire::param_ops::{RecordBuf, encode_descriptor_reply, encode_value_reply};

use super::model::{ParamType, ParameterAddress, ParameterDirectory};

/// Owns the directories this node serves, indexed by directory id.
#[derive(Debug, Default)]
pub struct ParamServer {
    directories: Vec<ParameterDirectory>,
}

/// `SPEC_FULL.md` §6 `ParamInfo_Size`: aggregate stats over everything a
/// `ParamServer` serves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamInfoSize {
    /// Total number of served descriptor entries, across all directories.
    pub size: usize,
    /// Number of entries that are actual parameters (directory markers
    /// excluded).
    pub parameters: usize,
    /// Number of parameters that can be written (not `dir`/`func`/`readonly`).
    pub parameters_writable: usize,
    /// Total bytes of name + formatting text across all entries.
    pub textsize: usize,
}

impl ParamServer {
    pub fn new() -> Self {
        ParamServer::default()
    }

    /// Registers a directory, returning the id it was assigned.
    pub fn register_directory(&mut self, dir: ParameterDirectory) -> u8 {
        let id = self.directories.len() as u8;
        self.directories.push(dir);
        id
    }

    pub fn directory(&self, id: u8) -> Option<&ParameterDirectory> {
        self.directories.get(id as usize)
    }

    /// Computes `ParamInfo_Size` over everything this server serves.
    pub fn info_size(&self) -> ParamInfoSize {
        let mut info = ParamInfoSize::default();
        for dir in &self.directories {
            for entry in &dir.entries {
                info.size += 1;
                let is_dir = entry.param_type.contains(ParamType::DIR);
                if !is_dir {
                    info.parameters += 1;
                    let writable = !entry
                        .param_type
                        .intersects(ParamType::FUNC | ParamType::READONLY);
                    if writable {
                        info.parameters_writable += 1;
                    }
                }
                info.textsize += entry.name.as_deref().map_or(0, str::len);
                info.textsize += entry.formatting.as_deref().map_or(0, str::len);
            }
        }
        info
    }

    fn entry(&self, directory: u8, index: u8) -> Option<&ParameterAddress> {
        self.directories
            .get(directory as usize)?
            .entries
            .get(index as usize)
    }

    /// Builds the descriptor reply for `(directory, index)`, or the
    /// `param_invalid` sentinel descriptor if it doesn't exist.
    pub(crate) fn handle_descriptor_request(&self, directory: u8, index: u8) -> RecordBuf {
        match self.entry(directory, index) {
            Some(addr) => {
                let max = if addr.param_type.contains(ParamType::DIR) {
                    self.directories
                        .get(directory as usize)
                        .map(|d| d.entries.len() as i32)
                        .unwrap_or(addr.max)
                } else {
                    addr.max
                };
                let name: std::borrow::Cow<'_, str> = if addr.param_type.contains(ParamType::DIR) {
                    std::borrow::Cow::Borrowed(
                        self.directories[directory as usize].display_name(),
                    )
                } else {
                    std::borrow::Cow::Borrowed(addr.name.as_deref().unwrap_or(""))
                };
                let formatting = addr.formatting.as_deref().unwrap_or("");
                encode_descriptor_reply(
                    addr.get_value(),
                    addr.min,
                    max,
                    addr.step,
                    addr.decimal,
                    directory,
                    index,
                    addr.param_type.to_wire_byte(),
                    name.as_bytes(),
                    formatting.as_bytes(),
                )
            }
            None => encode_descriptor_reply(
                0,
                0,
                0,
                0,
                0,
                directory,
                index,
                (ParamType::DIR | ParamType::READONLY).to_wire_byte(),
                b"",
                b"",
            ),
        }
    }

    /// Builds a value-only reply, or `None` if the entry is a `dir`/`func`
    /// (rejected regardless of its readonly flag) or doesn't exist.
    pub(crate) fn handle_value_request(&self, directory: u8, index: u8) -> Option<RecordBuf> {
        let addr = self.entry(directory, index)?;
        if addr.param_type.intersects(ParamType::DIR | ParamType::FUNC) {
            return None;
        }
        Some(encode_value_reply(addr.get_value(), directory, index))
    }

    /// Commits an inbound value write, silently ignoring unknown or
    /// out-of-range/read-only targets (the wire protocol has no reply for
    /// a rejected write).
    pub(crate) fn handle_value_store(&self, directory: u8, index: u8, value: i32) {
        if let Some(addr) = self.entry(directory, index) {
            let _ = addr.set_value(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::model::{TypedAccessor, ValueType};
    use crate::wire::param_ops::{ParamInbound, decode_param_inbound, split_literals};

    fn leaked_i32() -> TypedAccessor {
        TypedAccessor::from_static_i32(Box::leak(Box::new(0)), ValueType::I32)
    }

    #[test]
    fn describes_a_value_entry() {
        let mut server = ParamServer::new();
        let mut dir = ParameterDirectory::new();
        dir.entries.push(ParameterAddress::new(
            leaked_i32(),
            0,
            0,
            0,
            0,
            0,
            ValueType::I32,
            ParamType::DIR,
            Some("Motor".into()),
            None,
        ));
        dir.entries.push(ParameterAddress::new(
            leaked_i32(),
            0,
            10_000,
            1,
            0,
            0,
            ValueType::I32,
            ParamType::VALUE,
            Some("Speed".into()),
            Some("rpm".into()),
        ));
        let id = server.register_directory(dir);

        let buf = server.handle_descriptor_request(id, 1);
        match decode_param_inbound(&buf).unwrap() {
            ParamInbound::DescriptorReply {
                directory,
                index,
                literals,
                ..
            } => {
                assert_eq!(directory, id);
                assert_eq!(index, 1);
                let (name, fmt) = split_literals(literals).unwrap();
                assert_eq!(name, b"Speed");
                assert_eq!(fmt, b"rpm");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn describing_out_of_bounds_index_returns_invalid_sentinel() {
        let server = ParamServer::new();
        let buf = server.handle_descriptor_request(9, 9);
        match decode_param_inbound(&buf).unwrap() {
            ParamInbound::DescriptorReply {
                value,
                directory,
                index,
                ..
            } => {
                assert_eq!(value, 0);
                assert_eq!(directory, 9);
                assert_eq!(index, 9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn value_request_rejects_directory_entries() {
        let mut server = ParamServer::new();
        let mut dir = ParameterDirectory::new();
        dir.entries.push(ParameterAddress::new(
            leaked_i32(),
            0,
            0,
            0,
            0,
            0,
            ValueType::I32,
            ParamType::DIR,
            Some("Motor".into()),
            None,
        ));
        let id = server.register_directory(dir);
        assert!(server.handle_value_request(id, 0).is_none());
    }
}
