//! Loading program images into memory
//!
//! An image is a flat sequence of little-endian 16-bit words, loaded from
//! address 0 onward. There is no header.

use std::io::Read;

use camino::Utf8Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::constants::{Word, MEMORY_SIZE};
use crate::runtime::Memory;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("program has {words} words, memory only has 32768 cells")]
    ProgramTooLarge { words: usize },

    #[error("could not read program: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode raw image bytes into words.
///
/// A trailing odd byte becomes the low byte of a last word.
#[must_use]
pub fn words(bytes: &[u8]) -> Vec<Word> {
    bytes
        .chunks(2)
        .map(|chunk| match *chunk {
            [lo, hi] => Word::from_le_bytes([lo, hi]),
            [lo] => Word::from(lo),
            _ => 0,
        })
        .collect()
}

/// Bytes read from an image at most: one word more than memory can hold,
/// enough to tell that it does not fit
const IMAGE_LIMIT: u64 = (MEMORY_SIZE as u64 + 1) * 2;

/// Read a whole image and place it in a fresh memory
///
/// # Errors
///
/// Fails if the source cannot be read or if the image does not fit in memory.
#[tracing::instrument(skip(reader))]
pub fn load<R: Read>(reader: R) -> Result<Memory, LoadError> {
    let mut bytes = Vec::new();
    reader.take(IMAGE_LIMIT).read_to_end(&mut bytes)?;

    let words = words(&bytes);
    debug!(words = words.len(), "Decoded program image");

    Memory::from_words(&words).map_err(|_| LoadError::ProgramTooLarge { words: words.len() })
}

/// Load an image from a file
///
/// # Errors
///
/// See [`load`].
pub fn load_file(path: &Utf8Path) -> Result<Memory, LoadError> {
    info!(%path, "Loading program");
    let file = std::fs::File::open(path)?;
    load(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn little_endian_test() {
        let memory = load(&[0x13, 0x00, 0x41, 0x00, 0x00, 0x80, 0xff, 0xff][..]).unwrap();
        assert_eq!(memory.slice(0, 5).unwrap(), &[19, 65, 32768, 65535, 0]);
    }

    #[test]
    fn odd_length_test() {
        assert_eq!(words(&[0x01, 0x02, 0x03]), vec![0x0201, 0x03]);
        assert!(words(&[]).is_empty());
    }

    #[test]
    fn full_memory_test() {
        let bytes = vec![0x15; MEMORY_SIZE * 2];
        let memory = load(bytes.as_slice()).unwrap();
        assert_eq!(memory.get(0x7FFF), Ok(0x1515));
    }

    #[test]
    fn too_large_test() {
        let bytes = vec![0; MEMORY_SIZE * 2 + 1];
        assert!(matches!(
            load(bytes.as_slice()),
            Err(LoadError::ProgramTooLarge { words }) if words == MEMORY_SIZE + 1
        ));
    }

    #[test]
    fn endless_source_test() {
        assert!(matches!(
            load(io::repeat(0x15)),
            Err(LoadError::ProgramTooLarge { words }) if words == MEMORY_SIZE + 1
        ));
    }

    #[test]
    fn missing_file_test() {
        assert!(matches!(
            load_file(Utf8Path::new("/nonexistent/challenge.bin")),
            Err(LoadError::Io(_))
        ));
    }
}
