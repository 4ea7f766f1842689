//! # Program Loader
//!
//! Parses the binary program format into a backing store.
//!
//! ## Format
//!
//! A little-endian stream: a 12-byte header of three `i32` values
//! (`size`, `initial_pc`, `load_offset`) followed by `size` bytes of
//! instructions and data. The entry point is `initial_pc - load_offset`,
//! measured from the first body byte.
//!
//! The loader appends one `END` byte after the body and zero-pads the
//! result to whole pages. Virtual address 0 is the first body byte.

use crate::isa::END_OPCODE;
use kernel_api::LoadError;

/// Header length in bytes
pub const HEADER_LEN: usize = 12;

/// A parsed program, ready to attach to a PCB
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramImage {
    /// Body size as declared by the header
    pub size: usize,
    /// Entry point as a virtual address
    pub entry: u32,
    /// Body, implicit `END`, zero padding
    pub backing_store: Vec<u8>,
}

impl ProgramImage {
    /// Pages the backing store spans
    pub fn pages(&self, page_size: usize) -> usize {
        self.backing_store.len() / page_size
    }
}

/// Pages needed for a body of `size` bytes plus the implicit `END`
pub fn pages_needed(size: usize, page_size: usize) -> usize {
    (size + 1).div_ceil(page_size)
}

fn header_field(bytes: &[u8], index: usize) -> i32 {
    let start = index * 4;
    let mut field = [0u8; 4];
    field.copy_from_slice(&bytes[start..start + 4]);
    i32::from_le_bytes(field)
}

/// Parses `bytes` into an image padded to `page_size`
///
/// Bytes beyond the declared size are ignored.
pub fn parse(bytes: &[u8], page_size: usize, max_bytes: usize) -> Result<ProgramImage, LoadError> {
    if bytes.len() < HEADER_LEN {
        return Err(LoadError::TooShort { len: bytes.len() });
    }
    let declared = header_field(bytes, 0);
    let initial_pc = header_field(bytes, 1);
    let load_offset = header_field(bytes, 2);

    let size = usize::try_from(declared).map_err(|_| LoadError::NegativeSize(declared))?;
    if size > max_bytes {
        return Err(LoadError::Oversized {
            size,
            max: max_bytes,
        });
    }
    let body = &bytes[HEADER_LEN..];
    if body.len() < size {
        return Err(LoadError::Truncated {
            declared: size,
            actual: body.len(),
        });
    }

    let entry = initial_pc as i64 - load_offset as i64;
    if entry < 0 || entry > size as i64 {
        return Err(LoadError::InvalidEntryPoint {
            initial_pc,
            load_offset,
            size,
        });
    }

    let mut backing_store = Vec::with_capacity(pages_needed(size, page_size) * page_size);
    backing_store.extend_from_slice(&body[..size]);
    backing_store.push(END_OPCODE);
    backing_store.resize(pages_needed(size, page_size) * page_size, 0);

    Ok(ProgramImage {
        size,
        entry: entry as u32,
        backing_store,
    })
}

/// Builds the 12-byte header
pub fn encode_header(size: i32, initial_pc: i32, load_offset: i32) -> [u8; HEADER_LEN] {
    let mut header = [0u8; HEADER_LEN];
    header[0..4].copy_from_slice(&size.to_le_bytes());
    header[4..8].copy_from_slice(&initial_pc.to_le_bytes());
    header[8..12].copy_from_slice(&load_offset.to_le_bytes());
    header
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(size: i32, initial_pc: i32, load_offset: i32, body: &[u8]) -> Vec<u8> {
        let mut bytes = encode_header(size, initial_pc, load_offset).to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[test]
    fn test_forty_byte_program_needs_three_pages() {
        let image = parse(&program(40, 0, 0, &[7u8; 40]), 16, 1024).unwrap();
        assert_eq!(pages_needed(40, 16), 3);
        assert_eq!(image.pages(16), 3);
        assert_eq!(image.backing_store.len(), 48);
        assert_eq!(image.backing_store[40], END_OPCODE);
        assert!(image.backing_store[41..].iter().all(|byte| *byte == 0));
    }

    #[test]
    fn test_end_byte_can_spill_into_new_page() {
        assert_eq!(pages_needed(16, 16), 2);
        assert_eq!(pages_needed(15, 16), 1);
        assert_eq!(pages_needed(0, 16), 1);
    }

    #[test]
    fn test_entry_point_from_header() {
        let image = parse(&program(12, 106, 100, &[0u8; 12]), 16, 1024).unwrap();
        assert_eq!(image.entry, 6);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(parse(&[1, 2, 3], 16, 64), Err(LoadError::TooShort { len: 3 }));
        assert_eq!(
            parse(&program(-1, 0, 0, &[]), 16, 64),
            Err(LoadError::NegativeSize(-1))
        );
        assert_eq!(
            parse(&program(100, 0, 0, &[0; 100]), 16, 64),
            Err(LoadError::Oversized { size: 100, max: 64 })
        );
        assert_eq!(
            parse(&program(10, 0, 0, &[0; 4]), 16, 64),
            Err(LoadError::Truncated {
                declared: 10,
                actual: 4
            })
        );
        assert!(matches!(
            parse(&program(4, 0, 8, &[0; 4]), 16, 64),
            Err(LoadError::InvalidEntryPoint { .. })
        ));
        assert!(matches!(
            parse(&program(4, 9, 0, &[0; 4]), 16, 64),
            Err(LoadError::InvalidEntryPoint { .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let image = parse(&program(2, 0, 0, &[22, 1, 9, 9, 9]), 4, 64).unwrap();
        assert_eq!(image.backing_store, vec![22, 1, END_OPCODE, 0]);
    }
}
