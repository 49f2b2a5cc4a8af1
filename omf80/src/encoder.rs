//! Support for encoding record payloads into output buffers.
#![allow(missing_docs)]

use bstr::BStr;
use zerocopy::{Immutable, IntoBytes};

/// A simple type which helps encode OMF-80 record payloads into a buffer.
pub struct Encoder<'a> {
    pub buf: &'a mut Vec<u8>,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn u8(&mut self, x: u8) {
        self.buf.push(x);
    }

    pub fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    pub fn u16(&mut self, x: u16) {
        self.bytes(&x.to_le_bytes());
    }

    pub fn t<T: IntoBytes + Immutable>(&mut self, x: &T) {
        self.buf.extend_from_slice(x.as_bytes());
    }

    /// Writes a length-prefixed string. OMF-80 strings are at most 255 bytes.
    pub fn str8(&mut self, s: &BStr) {
        debug_assert!(s.len() <= 255);
        self.buf.push(s.len() as u8);
        self.buf.extend_from_slice(s);
    }
}
