//! Loading of LC-3 object images.
//!
//! An image is a sequence of big endian `u16` words. The first word is the `.ORIG` address the
//! remaining words are copied to.
use crate::errors::LoadProgramError;
use crate::hardware::memory::Memory;
use log::{debug, warn};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Where an image was placed in memory.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    pub origin: u16,
    /// Words actually copied, less than the image holds if it reaches past `0xFFFF`.
    pub word_count: usize,
}

/// Splits raw image bytes into the origin and the program words, converted to host order.
///
/// A trailing odd byte is ignored.
///
/// # Errors
/// - image shorter than the `.ORIG` header
pub fn words_from_image_bytes(bytes: &[u8]) -> Result<(u16, Vec<u16>), LoadProgramError> {
    let mut words = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    let origin = words
        .next()
        .ok_or(LoadProgramError::ProgramMissingOrigHeader)?;
    let program: Vec<u16> = words.collect();
    if bytes.len() % 2 != 0 {
        warn!("Ignoring trailing odd byte of program image");
    }
    Ok((origin, program))
}

/// Copies an image given as raw bytes into `memory`.
///
/// # Errors
/// - image shorter than the `.ORIG` header
pub fn load_image_bytes(memory: &mut Memory, bytes: &[u8]) -> Result<LoadedImage, LoadProgramError> {
    let (origin, program) = words_from_image_bytes(bytes)?;
    let word_count = memory.load_words(origin, &program);
    if word_count < program.len() {
        warn!(
            "Program image truncated at end of memory, {} of {} words loaded",
            word_count,
            program.len()
        );
    }
    debug!("Loaded {word_count} words at {origin:#06X}");
    Ok(LoadedImage { origin, word_count })
}

/// Reads an image from `reader` until its end and copies it into `memory`.
///
/// # Errors
/// - reading fails, `name` is used to report which image
/// - image shorter than the `.ORIG` header
pub fn load_image_reader(
    memory: &mut Memory,
    mut reader: impl Read,
    name: &Path,
) -> Result<LoadedImage, LoadProgramError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| not_readable(name, &e))?;
    load_image_bytes(memory, &bytes)
}

/// Reads the image file at `path` and copies it into `memory`.
///
/// # Errors
/// - file cannot be opened or read
/// - image shorter than the `.ORIG` header
pub fn load_image_file(
    memory: &mut Memory,
    path: impl AsRef<Path>,
) -> Result<LoadedImage, LoadProgramError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| not_readable(path, &e))?;
    debug!("Loading program image {}", path.display());
    load_image_reader(memory, file, path)
}

fn not_readable(path: &Path, error: &std::io::Error) -> LoadProgramError {
    LoadProgramError::ProgramNotReadable {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::test_helpers::{create_memory, image_bytes};
    use googletest::prelude::*;
    use std::io;

    #[gtest]
    fn test_load_round_trip() -> googletest::Result<()> {
        let program = [0x5020u16, 0xF025, 0x1234, 0xABCD];
        let mut memory = create_memory(&[]);
        let loaded = load_image_bytes(&mut memory, &image_bytes(0x3000, &program))?;
        expect_that!(loaded.origin, eq(0x3000));
        expect_that!(loaded.word_count, eq(4));
        for (offset, word) in (0u16..).zip(program) {
            expect_that!(memory[0x3000 + offset], eq(word));
        }
        Ok(())
    }

    #[gtest]
    fn test_load_big_endian() -> googletest::Result<()> {
        let mut memory = create_memory(&[]);
        let loaded = load_image_bytes(&mut memory, &[0x40, 0x00, 0x12, 0x34, 0xFF])?;
        expect_that!(loaded.origin, eq(0x4000));
        expect_that!(loaded.word_count, eq(1));
        expect_that!(memory[0x4000], eq(0x1234));
        expect_that!(memory[0x4001], eq(0));
        Ok(())
    }

    #[gtest]
    fn test_load_header_only() -> googletest::Result<()> {
        let mut memory = create_memory(&[]);
        let loaded = load_image_bytes(&mut memory, &[0x30, 0x00])?;
        expect_that!(loaded.word_count, eq(0));
        Ok(())
    }

    #[gtest]
    fn test_load_missing_header() {
        let mut memory = create_memory(&[]);
        expect_that!(
            load_image_bytes(&mut memory, &[0x30]).unwrap_err().to_string(),
            eq("Program is missing valid .ORIG header")
        );
        assert!(matches!(
            load_image_bytes(&mut memory, &[]),
            Err(LoadProgramError::ProgramMissingOrigHeader)
        ));
    }

    #[gtest]
    fn test_load_truncates_at_end_of_memory() -> googletest::Result<()> {
        let mut memory = create_memory(&[]);
        let loaded = load_image_bytes(&mut memory, &image_bytes(0xFFFE, &[1, 2, 3]))?;
        expect_that!(loaded.word_count, eq(2));
        expect_that!(memory[0xFFFE], eq(1));
        expect_that!(memory[0xFFFF], eq(2));
        expect_that!(memory[0x0000], eq(0));
        Ok(())
    }

    #[gtest]
    fn test_later_image_overwrites() -> googletest::Result<()> {
        let mut memory = create_memory(&[]);
        load_image_bytes(&mut memory, &image_bytes(0x3000, &[1, 2, 3]))?;
        load_image_bytes(&mut memory, &image_bytes(0x3001, &[9]))?;
        expect_that!(memory[0x3000], eq(1));
        expect_that!(memory[0x3001], eq(9));
        expect_that!(memory[0x3002], eq(3));
        Ok(())
    }

    #[gtest]
    fn test_load_missing_file() {
        let mut memory = create_memory(&[]);
        let res = load_image_file(&mut memory, "does/not/exist.obj");
        let Err(LoadProgramError::ProgramNotReadable { path, .. }) = res else {
            panic!("loading a missing file should fail");
        };
        expect_that!(path.to_string_lossy().into_owned(), eq("does/not/exist.obj"));
    }

    struct BrokenReader;
    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::other("disk on fire"))
        }
    }

    #[gtest]
    fn test_load_read_error() {
        let mut memory = create_memory(&[]);
        let res = load_image_reader(&mut memory, BrokenReader, Path::new("broken.obj"));
        let Err(e) = res else {
            panic!("read error should fail loading");
        };
        expect_that!(
            e.to_string(),
            eq("Failed to load program image \"broken.obj\": disk on fire")
        );
    }
}
