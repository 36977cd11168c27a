use crate::emulator::Emulator;
use crate::hardware::keyboard::ScriptedInputProvider;
use crate::hardware::memory::{Memory, PROGRAM_SECTION_START};
use std::cell::RefCell;
use std::io;
use std::io::Write;
use std::rc::Rc;

pub struct StringWriter {
    vec: Vec<u8>,
}
impl Write for StringWriter {
    fn write(&mut self, data: &[u8]) -> Result<usize, io::Error> {
        self.vec.write(data)
    }
    fn flush(&mut self) -> Result<(), io::Error> {
        Ok(())
    }
}
impl StringWriter {
    pub fn new() -> Self {
        let vec = Vec::<u8>::with_capacity(120);
        Self { vec }
    }
    pub fn get_string(&self) -> String {
        String::from_utf8(self.vec.clone()).unwrap()
    }
}

/// Writer failing on every call.
pub struct FailingWriter;
impl Write for FailingWriter {
    fn write(&mut self, _data: &[u8]) -> Result<usize, io::Error> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }
    fn flush(&mut self) -> Result<(), io::Error> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }
}

/// Object image bytes as produced by an assembler for `program` at `origin`.
pub fn image_bytes(origin: u16, program: &[u16]) -> Vec<u8> {
    std::iter::once(origin)
        .chain(program.iter().copied())
        .flat_map(u16::to_be_bytes)
        .collect()
}

/// Memory without keyboard input, `data` placed at the program section start.
pub fn create_memory(data: &[u16]) -> Memory {
    let mut mem = Memory::new(Rc::new(RefCell::new(ScriptedInputProvider::new(b""))));
    mem.load_words(PROGRAM_SECTION_START, data);
    mem
}

/// Emulator with `program` loaded at `0x3000` and `stdin_data` as keyboard input.
pub fn emulator_with_program(program: &[u16], stdin_data: &[u8]) -> Emulator {
    let mut emu = Emulator::with_keyboard(ScriptedInputProvider::new(stdin_data));
    emu.load_image_bytes(&image_bytes(PROGRAM_SECTION_START, program))
        .expect("Error loading program");
    emu
}
