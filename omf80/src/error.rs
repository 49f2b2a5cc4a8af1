//! Error type shared by the codec, the linker, and the image builder.

use crate::parser::ParserError;
use bstr::BString;

/// Errors produced while decoding object files, linking modules, or building
/// flat images.
///
/// All operations fail fast: the first error aborts the operation and no
/// partial result is returned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// A record frame failed its checksum, was truncated, or carried an
    /// impossible length prefix.
    CorruptFrame,
    /// A record type outside the supported set was encountered.
    UnknownRecordType(u8),
    /// A length-prefixed string ran past the end of its record payload.
    BadString,
    /// A library dictionary group was missing its terminator, or named a
    /// module index the library does not contain.
    BadLibraryDictionary,
    /// The record stream does not have the required shape. The message names
    /// the violation.
    BadInput(&'static str),
    /// A symbol was referenced but no linked module declares it public.
    UnresolvedExternal(BString),
    /// A segment id outside the fixed OMF-80 table was used where content is
    /// placed or patched.
    UnknownSegment(u8),
    /// More than one module in a linked set is marked as the main module.
    DuplicateMain,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CorruptFrame => f.write_str("corrupt record frame"),
            Error::UnknownRecordType(code) => {
                write!(f, "record type not supported: 0x{code:02x}")
            }
            Error::BadString => f.write_str("string runs past the end of its record"),
            Error::BadLibraryDictionary => f.write_str("malformed library dictionary"),
            Error::BadInput(msg) => write!(f, "bad input: {msg}"),
            Error::UnresolvedExternal(name) => write!(f, "unresolved external {name}"),
            Error::UnknownSegment(seg_id) => write!(f, "unknown segment: {seg_id}"),
            Error::DuplicateMain => f.write_str("more than one main module in the linked set"),
        }
    }
}

impl From<ParserError> for Error {
    fn from(_: ParserError) -> Self {
        Error::CorruptFrame
    }
}
