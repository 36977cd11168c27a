//! Machine state of the LC-3: memory, registers and the keyboard behind the memory mapped
//! registers.
pub mod keyboard;
pub mod memory;
pub mod registers;
