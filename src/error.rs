//! Error taxonomies shared by the file client and the parameter engine.

use std::{error, fmt};

/// Result code returned by every file-client operation.
///
/// This is the exhaustive taxonomy the wire protocol and the local
/// bookkeeping can produce; it deliberately mirrors both filesystem-style
/// failures (reported by a remote file server inside an `Ack`/`Data` frame)
/// and transport-level failures (produced locally by this engine).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    num_enum::TryFromPrimitive,
    num_enum::IntoPrimitive,
)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
#[repr(u16)]
pub enum FileResult {
    /// The operation completed.
    Ok = 0,
    /// Generic low-level disk error reported by the server.
    DiskErr = 1,
    /// No such file.
    NoFile = 2,
    /// No such path/directory.
    NoPath = 3,
    /// The supplied name is not valid.
    InvalidName = 4,
    /// Access denied.
    Denied = 5,
    /// The file already exists.
    Exist = 6,
    /// The file handle/object is not valid.
    InvalidObject = 7,
    /// The medium is write protected.
    WriteProtected = 8,
    /// Invalid logical drive.
    InvalidDrive = 9,
    /// The volume has not been mounted.
    NotEnabled = 10,
    /// No valid filesystem.
    NoFilesystem = 11,
    /// Operation timed out at the filesystem layer.
    Timeout = 12,
    /// The file is locked.
    Locked = 13,
    /// Not enough memory to allocate working storage.
    MemoryFull = 14,
    /// Too many open files.
    TooManyOpenFiles = 15,
    /// An invalid parameter was given to the call.
    InvalidParameter = 16,
    /// The transport's send queue is momentarily full; the caller may retry later.
    NetworkBusy = 17,
    /// A transport-level error other than a full queue or exhausted allocator.
    NetworkError = 18,
    /// No reply arrived after the configured number of attempts.
    NetworkTimeout = 19,
    /// The local slot has no file bound to it.
    FileNotOpened = 20,
    /// The addressed local node does not exist, or its server is unreachable.
    NodeOffline = 21,
}

impl FileResult {
    /// Maps a wire-carried error code (as seen in an `Ack`/`Data` frame) to
    /// a `FileResult`, falling back to `NetworkError` for anything this
    /// engine doesn't recognize rather than panicking on untrusted input.
    pub(crate) fn from_wire(code: u16) -> FileResult {
        FileResult::try_from(code).unwrap_or(FileResult::NetworkError)
    }
}

impl fmt::Display for FileResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FileResult::Ok => "ok",
            FileResult::DiskErr => "disk error",
            FileResult::NoFile => "no such file",
            FileResult::NoPath => "no such path",
            FileResult::InvalidName => "invalid name",
            FileResult::Denied => "access denied",
            FileResult::Exist => "file exists",
            FileResult::InvalidObject => "invalid file object",
            FileResult::WriteProtected => "write protected",
            FileResult::InvalidDrive => "invalid drive",
            FileResult::NotEnabled => "volume not enabled",
            FileResult::NoFilesystem => "no filesystem",
            FileResult::Timeout => "filesystem timeout",
            FileResult::Locked => "file locked",
            FileResult::MemoryFull => "out of memory",
            FileResult::TooManyOpenFiles => "too many open files",
            FileResult::InvalidParameter => "invalid parameter",
            FileResult::NetworkBusy => "network busy",
            FileResult::NetworkError => "network error",
            FileResult::NetworkTimeout => "network timeout",
            FileResult::FileNotOpened => "file not opened",
            FileResult::NodeOffline => "node offline",
        };
        f.write_str(msg)
    }
}

impl error::Error for FileResult {}

/// Result of handing a record to the transport for sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serializable", derive(serde::Serialize, serde::Deserialize))]
pub enum SendResult {
    /// The record was handed to the transport.
    Ok,
    /// The transport's outbound queue is full.
    BufferFull,
    /// The transport could not allocate a buffer for the record.
    MallocFail,
    /// Any other transport failure.
    NetworkError,
}

impl fmt::Display for SendResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            SendResult::Ok => "ok",
            SendResult::BufferFull => "buffer full",
            SendResult::MallocFail => "allocation failed",
            SendResult::NetworkError => "network error",
        };
        f.write_str(msg)
    }
}

impl error::Error for SendResult {}

impl SendResult {
    /// Maps a send failure onto the [`FileResult`] family, per the
    /// propagation policy: send failures map immediately, with no retry.
    pub(crate) fn into_file_result(self) -> FileResult {
        match self {
            SendResult::Ok => FileResult::Ok,
            SendResult::BufferFull => FileResult::NetworkBusy,
            SendResult::MallocFail => FileResult::MemoryFull,
            SendResult::NetworkError => FileResult::NetworkError,
        }
    }
}
