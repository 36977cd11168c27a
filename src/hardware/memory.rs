use crate::hardware::keyboard::KeyboardInputProvider;
use log::warn;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::ops::{Index, IndexMut};
use std::rc::Rc;

pub const PROGRAM_SECTION_START: u16 = 0x3000;
/// Number of addressable words, every `u16` is a valid address.
pub const MEMORY_SIZE: usize = 1 << 16;

/// Memory regions mapped to IO functionality.
#[repr(u16)]
#[derive(enumn::N, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryMappedIOLocations {
    /// Keyboard Status Register
    Kbsr = 0xFE00,
    /// Keyboard Data Register
    Kbdr = 0xFE02,
}

/// The complete LC-3 address space of 65,536 words.
///
/// Plain indexing gives side-effect free access, [`Memory::read`] models the devices
/// behind memory mapped registers.
pub struct Memory {
    /// Index equals memory address
    data: Box<[u16]>,
    keyboard: Rc<RefCell<dyn KeyboardInputProvider>>,
}

impl Debug for Memory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let used = self.data.iter().filter(|w| **w != 0).count();
        write!(
            f,
            "Memory {{ non-zero words: {used}, KBSR: {:#06X}, KBDR: {:#06X} }}",
            self[MemoryMappedIOLocations::Kbsr as u16],
            self[MemoryMappedIOLocations::Kbdr as u16]
        )
    }
}
impl Index<u16> for Memory {
    type Output = u16;
    fn index(&self, index: u16) -> &Self::Output {
        &self.data[usize::from(index)]
    }
}
impl IndexMut<u16> for Memory {
    fn index_mut(&mut self, index: u16) -> &mut Self::Output {
        &mut self.data[usize::from(index)]
    }
}
impl Memory {
    const KEYBOARD_STATUS_REGISTER_SET: u16 = 1 << 15;
    const KEYBOARD_STATUS_REGISTER_UNSET: u16 = 0;

    #[must_use]
    pub fn new(keyboard: Rc<RefCell<dyn KeyboardInputProvider>>) -> Self {
        Self {
            data: vec![0x0u16; MEMORY_SIZE].into_boxed_slice(),
            keyboard,
        }
    }
    /// Reads the word at `address`.
    ///
    /// Reading the keyboard status register polls the keyboard without blocking first:
    /// with pending input KBSR is set to `0x8000` and KBDR receives the input byte,
    /// otherwise KBSR is cleared and KBDR keeps its value.
    pub fn read(&mut self, address: u16) -> u16 {
        if MemoryMappedIOLocations::n(address) == Some(MemoryMappedIOLocations::Kbsr) {
            self.refresh_keyboard_registers();
        }
        self[address]
    }
    pub fn write(&mut self, address: u16, value: u16) {
        self[address] = value;
    }
    fn refresh_keyboard_registers(&mut self) {
        let polled = self.keyboard.borrow_mut().poll_input();
        let pending = polled.unwrap_or_else(|e| {
            warn!("Polling keyboard failed, treating as no input: {e}");
            None
        });
        match pending {
            Some(b) => {
                self[MemoryMappedIOLocations::Kbsr as u16] = Self::KEYBOARD_STATUS_REGISTER_SET;
                self[MemoryMappedIOLocations::Kbdr as u16] = u16::from(b);
            }
            None => {
                self[MemoryMappedIOLocations::Kbsr as u16] = Self::KEYBOARD_STATUS_REGISTER_UNSET;
            }
        }
    }
    /// Copies `data` to consecutive addresses starting at `origin`, truncating what
    /// does not fit below the end of the address space.
    ///
    /// Returns the number of words copied.
    pub fn load_words(&mut self, origin: u16, data: &[u16]) -> usize {
        let start = usize::from(origin);
        let count = data.len().min(MEMORY_SIZE - start);
        self.data[start..start + count].copy_from_slice(&data[..count]);
        count
    }
}
