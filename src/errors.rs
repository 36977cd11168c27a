//! Errors reported while loading program images and while executing them.
use std::error::Error;
use std::path::PathBuf;

/// Loading a program image failed, nothing has been executed yet.
#[derive(Debug, displaydoc::Display, Clone, PartialEq, Eq)]
pub enum LoadProgramError {
    /// Failed to load program image {path:?}: {message}
    ProgramNotReadable { path: PathBuf, message: String },
    /// Program is missing valid .ORIG header
    ProgramMissingOrigHeader,
}
impl Error for LoadProgramError {}

/// Execution of a loaded program was aborted.
#[derive(Debug, displaydoc::Display, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Undefined opcode {opcode:#06b} in instruction at {address:#06X}, execution aborted
    UndefinedOpcode { opcode: u8, address: u16 },
    /// Unknown trap vector {vector:#04X} in instruction at {address:#06X}, execution aborted
    UnknownTrapVector { vector: u8, address: u16 },
    /// Execution interrupted by user
    Interrupted,
    /// Error during reading Stdin or writing program output to Stdout: {0}
    IOInputOutputError(String),
}
impl Error for ExecutionError {}
