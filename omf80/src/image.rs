//! The image builder: places a module at absolute origins and flattens it
//! into a loadable byte image.

use crate::error::Error;
use crate::module::{patch16, ContentDef, Module, CODE_SEGMENT, DATA_SEGMENT, STACK_SEGMENT};

/// Fixes up a module's code for absolute placement.
///
/// The data segment is placed directly after the code and stack:
/// `data_start = code_start + code_length + stack_size`. Every internal
/// patch site in a CODE content definition is incremented by the origin of
/// its target segment. Content offsets stay segment-relative; only the
/// patched words change.
pub fn adjust(module: &mut Module, code_start: u16, stack_size: u16) -> Result<(), Error> {
    let code_length = module
        .segments
        .get(&CODE_SEGMENT)
        .map_or(0, |seg| seg.length);
    let data_start = code_start.wrapping_add(code_length).wrapping_add(stack_size);
    module.segments.entry(STACK_SEGMENT).or_default().length = stack_size;

    for cdef in &mut module.content_definitions {
        if cdef.seg_id != CODE_SEGMENT {
            continue;
        }
        let ContentDef {
            offset,
            data,
            internal,
            ..
        } = cdef;
        for (&(target, _width), sites) in internal.iter() {
            let origin = match target {
                CODE_SEGMENT => code_start,
                DATA_SEGMENT | STACK_SEGMENT => data_start,
                other => return Err(Error::UnknownSegment(other)),
            };
            for &site in sites {
                patch16(data, *offset, site, origin)?;
            }
        }
    }
    Ok(())
}

/// Flattens a module into a loadable image.
///
/// CODE and DATA content definitions are splatted into their own buffers at
/// their segment-relative offsets; the blobs may be sparse and out of order,
/// and gaps are zero-filled. The image is the code buffer alone if there is
/// no data, otherwise code, a zeroed stack, and data in that order.
pub fn build_image(module: &Module) -> Vec<u8> {
    let mut code = Vec::new();
    let mut data = Vec::new();
    for cdef in &module.content_definitions {
        match cdef.seg_id {
            CODE_SEGMENT => splat(&mut code, cdef.offset as usize, &cdef.data),
            DATA_SEGMENT => splat(&mut data, cdef.offset as usize, &cdef.data),
            _ => {}
        }
    }

    if data.is_empty() {
        return code;
    }
    let stack_len = module
        .segments
        .get(&STACK_SEGMENT)
        .map_or(0, |seg| seg.length) as usize;
    let mut image = code;
    image.resize(image.len() + stack_len, 0);
    image.extend_from_slice(&data);
    image
}

fn splat(buf: &mut Vec<u8>, offset: usize, bytes: &[u8]) {
    let end = offset + bytes.len();
    if buf.len() < end {
        buf.resize(end, 0);
    }
    buf[offset..end].copy_from_slice(bytes);
}
