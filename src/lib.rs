//! # LC-3 Virtual Machine.
//!
//! `lc3-vm` executes LC-3 object images instruction by instruction.
//! Usage starts with loading one or more images via `emulator::Emulator::load_image_file`
//! followed by `emulator::Emulator::execute`.
//!
//!  # Example
//! ```
//! use lc3_vm::emulator::{Emulator, RunState};
//! use lc3_vm::hardware::keyboard::ScriptedInputProvider;
//!
//! // .ORIG x3000, LEA R0 to the string, PUTS, HALT, "HI"
//! let image: [u8; 14] = [
//!     0x30, 0x00, 0xE0, 0x02, 0xF0, 0x22, 0xF0, 0x25, 0x00, 0x48, 0x00, 0x49, 0x00, 0x00,
//! ];
//! let mut emu = Emulator::with_keyboard(ScriptedInputProvider::new(b""));
//! emu.load_image_bytes(&image).unwrap();
//! let mut out = Vec::new();
//! emu.execute_with_stdout(&mut out).unwrap();
//! assert!(out.starts_with(b"HI"));
//! assert_eq!(emu.run_state(), RunState::Stopped);
//! ```
//! # Errors
//! - Program image cannot be read or is missing its .ORIG header
//! - Undefined opcode, interrupt by CTRL-C or failing console I/O during execution

pub mod emulator;
pub mod errors;
pub mod hardware;
pub(crate) mod numbers;
pub mod terminal;
