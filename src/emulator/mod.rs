//! The fetch, decode and execute cycle of the LC-3.
mod instruction;
mod loader;
mod opcodes;
#[cfg(test)]
mod test_helpers;
mod trap_routines;

pub use instruction::{Instruction, Opcode};
pub use loader::LoadedImage;
pub use trap_routines::{HALT_MESSAGE, IN_PROMPT, TrapVector};

use crate::errors::{ExecutionError, LoadProgramError};
use crate::hardware::keyboard::{InterruptFlag, KeyboardInputProvider, TerminalInputProvider};
use crate::hardware::memory::Memory;
use crate::hardware::registers::Registers;
use log::{debug, trace, warn};
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::io;
use std::io::Write;
use std::ops::ControlFlow;
use std::path::Path;
use std::rc::Rc;

/// Whether the fetch loop continues. Once stopped an emulator never runs again.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RunState {
    Running,
    Stopped,
}

/// Switches for behavior the LC-3 leaves open. The defaults are permissive.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct EmulatorOptions {
    /// Abort with [`ExecutionError::UndefinedOpcode`] on opcode `0b1101` instead of ignoring it.
    pub abort_on_reserved_opcode: bool,
    /// Abort with [`ExecutionError::UnknownTrapVector`] instead of ignoring the trap.
    pub abort_on_unknown_trap: bool,
}
impl EmulatorOptions {
    /// Both reserved opcode and unknown trap vectors abort execution.
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            abort_on_reserved_opcode: true,
            abort_on_unknown_trap: true,
        }
    }
}

/// The public facing emulator used to run LC-3 programs.
pub struct Emulator {
    registers: Registers,
    memory: Memory,
    keyboard: Rc<RefCell<dyn KeyboardInputProvider>>,
    run_state: RunState,
    options: EmulatorOptions,
    executed_instructions: u64,
}
impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}
impl Debug for Emulator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Emulator")
            .field("registers", &self.registers)
            .field("memory", &self.memory)
            .field("run_state", &self.run_state)
            .field("options", &self.options)
            .field("executed_instructions", &self.executed_instructions)
            .finish_non_exhaustive()
    }
}
impl Emulator {
    /// Instructions executed between two checks for CTRL-C in programs not reading the keyboard.
    const INTERRUPT_CHECK_INTERVAL: u64 = 1 << 12;

    /// Emulator reading keyboard input from the terminal, only CTRL-C sets its interrupt flag.
    #[must_use]
    pub fn new() -> Self {
        Self::with_keyboard(TerminalInputProvider::new(InterruptFlag::default()))
    }
    /// Emulator reading keyboard input from `keyboard`, all registers and memory zeroed
    /// and the PC at `0x3000`.
    #[must_use]
    pub fn with_keyboard(keyboard: impl KeyboardInputProvider + 'static) -> Self {
        let keyboard: Rc<RefCell<dyn KeyboardInputProvider>> = Rc::new(RefCell::new(keyboard));
        Self {
            registers: Registers::new(),
            memory: Memory::new(Rc::clone(&keyboard)),
            keyboard,
            run_state: RunState::Running,
            options: EmulatorOptions::default(),
            executed_instructions: 0,
        }
    }
    #[must_use]
    pub fn with_options(mut self, options: EmulatorOptions) -> Self {
        self.options = options;
        self
    }

    /// Loads an object image file. Images loaded later overwrite overlapping parts of
    /// earlier ones.
    ///
    /// # Errors
    /// See [`LoadProgramError`]
    pub fn load_image_file(
        &mut self,
        path: impl AsRef<Path>,
    ) -> Result<LoadedImage, LoadProgramError> {
        loader::load_image_file(&mut self.memory, path)
    }
    /// Loads an object image given as bytes, see [`Emulator::load_image_file`].
    ///
    /// # Errors
    /// See [`LoadProgramError`]
    pub fn load_image_bytes(&mut self, bytes: &[u8]) -> Result<LoadedImage, LoadProgramError> {
        loader::load_image_bytes(&mut self.memory, bytes)
    }

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.registers
    }
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }
    #[must_use]
    pub const fn run_state(&self) -> RunState {
        self.run_state
    }

    /// Runs until HALT, an error or an interrupt, writing program output to stdout.
    ///
    /// # Errors
    /// See [`ExecutionError`]
    pub fn execute(&mut self) -> Result<(), ExecutionError> {
        self.execute_with_stdout(&mut io::stdout())
    }
    /// Runs until HALT, an error or an interrupt, writing program output to `stdout`.
    ///
    /// # Errors
    /// See [`ExecutionError`]
    pub fn execute_with_stdout(&mut self, stdout: &mut impl Write) -> Result<(), ExecutionError> {
        loop {
            if let ControlFlow::Break(res) = self.step(stdout) {
                return res;
            }
        }
    }
    /// Fetches, decodes and executes a single instruction.
    ///
    /// `Break(Ok(()))` after HALT or when already stopped, `Break(Err(_))` when execution aborts.
    /// On abort the PC already points behind the failing instruction.
    pub fn step(&mut self, stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
        if self.run_state == RunState::Stopped {
            return ControlFlow::Break(Ok(()));
        }
        let address = self.registers.pc().as_binary();
        let instruction = Instruction::from(self.memory.read(address));
        self.registers.increment_pc();
        trace!("{address:#06X}: {instruction:?}");

        let mut res = self.dispatch(instruction, address, stdout);
        self.executed_instructions += 1;
        if res.is_continue() && self.check_interrupted() {
            res = ControlFlow::Break(Err(ExecutionError::Interrupted));
        }
        if let ControlFlow::Break(outcome) = &res {
            self.run_state = RunState::Stopped;
            match outcome {
                Ok(()) => debug!(
                    "Program halted at {address:#06X} after {} instructions",
                    self.executed_instructions
                ),
                Err(e) => debug!("Execution stopped at {address:#06X}: {e}"),
            }
        }
        res
    }

    fn check_interrupted(&self) -> bool {
        let mut keyboard = self.keyboard.borrow_mut();
        if self.executed_instructions.is_multiple_of(Self::INTERRUPT_CHECK_INTERVAL)
            && let Err(e) = keyboard.refresh()
        {
            warn!("Polling keyboard failed: {e}");
        }
        keyboard.is_interrupted()
    }

    fn dispatch(
        &mut self,
        i: Instruction,
        address: u16,
        stdout: &mut impl Write,
    ) -> ControlFlow<Result<(), ExecutionError>> {
        let undefined = || {
            ControlFlow::Break(Err(ExecutionError::UndefinedOpcode {
                opcode: i.op_code(),
                address,
            }))
        };
        let Some(opcode) = i.opcode() else {
            return undefined();
        };
        let r = &mut self.registers;
        let mem = &mut self.memory;
        match opcode {
            Opcode::Add => opcodes::add(i, r),
            Opcode::And => opcodes::and(i, r),
            Opcode::Not => opcodes::not(i, r),
            Opcode::Br => opcodes::br(i, r),
            Opcode::Jmp => opcodes::jmp_or_ret(i, r),
            Opcode::Jsr => opcodes::jsr(i, r),
            Opcode::Ld => opcodes::ld(i, r, mem),
            Opcode::Ldi => opcodes::ldi(i, r, mem),
            Opcode::Ldr => opcodes::ldr(i, r, mem),
            Opcode::Lea => opcodes::lea(i, r),
            Opcode::St => opcodes::st(i, r, mem),
            Opcode::Sti => opcodes::sti(i, r, mem),
            Opcode::Str => opcodes::str(i, r, mem),
            Opcode::Trap => return self.trap(i, address, stdout),
            Opcode::Rti => {}
            Opcode::Reserved => {
                if self.options.abort_on_reserved_opcode {
                    return undefined();
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn trap(
        &mut self,
        i: Instruction,
        address: u16,
        stdout: &mut impl Write,
    ) -> ControlFlow<Result<(), ExecutionError>> {
        let vector = i.trap_vector();
        match TrapVector::n(vector) {
            Some(trap_vector) => {
                let mut keyboard = self.keyboard.borrow_mut();
                trap_routines::dispatch(
                    trap_vector,
                    &mut self.registers,
                    &self.memory,
                    &mut *keyboard,
                    stdout,
                )
            }
            None if self.options.abort_on_unknown_trap => {
                ControlFlow::Break(Err(ExecutionError::UnknownTrapVector { vector, address }))
            }
            None => {
                warn!("Ignoring unknown trap vector {vector:#04X} at {address:#06X}");
                ControlFlow::Continue(())
            }
        }
    }
}
