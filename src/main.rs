use clap::Parser;
use clap::error::ErrorKind;
use lc3_vm::emulator::{Emulator, EmulatorOptions};
use lc3_vm::errors::ExecutionError;
use lc3_vm::hardware::keyboard::{InterruptFlag, PipedInputProvider, TerminalInputProvider};
use lc3_vm::terminal::{self, RawLock, RawModeWriter};
use log::{info, warn};
use signal_hook::consts::SIGINT;
use std::ffi::OsString;
use std::io;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

/// Exit status of a run, negative values for every kind of failure.
#[repr(i32)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ExitStatus {
    Completed = 0,
    UsageError = -1,
    LoadFailure = -2,
    UndefinedOpcode = -3,
    Interrupted = -4,
    ConsoleFailure = -5,
}

impl From<&ExecutionError> for ExitStatus {
    fn from(e: &ExecutionError) -> Self {
        match e {
            ExecutionError::UndefinedOpcode { .. } | ExecutionError::UnknownTrapVector { .. } => {
                Self::UndefinedOpcode
            }
            ExecutionError::Interrupted => Self::Interrupted,
            ExecutionError::IOInputOutputError(_) => Self::ConsoleFailure,
        }
    }
}

/// LC-3 virtual machine
#[derive(Parser, Debug)]
#[command(version)]
struct Args {
    /// Object images to load in the given order, later ones overwrite earlier ones
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,

    /// Abort on the reserved opcode and on unknown trap vectors instead of ignoring them
    #[arg(long)]
    strict: bool,
}

fn main() {
    env_logger::init();
    let status = run();
    info!("Exiting with {status:?}");
    process::exit(status as i32);
}

/// Parses the command line, `Err` holds the status to exit with right away.
fn parse_args<I, T>(args: I) -> Result<Args, ExitStatus>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Args::try_parse_from(args).map_err(|e| {
        let _ = e.print();
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitStatus::Completed,
            _ => ExitStatus::UsageError,
        }
    })
}

/// SIGINT only sets `interrupt`, execution then stops with [`ExecutionError::Interrupted`]
/// and the terminal is restored on the way out.
fn install_interrupt_handler(interrupt: &InterruptFlag) {
    if let Err(e) = signal_hook::flag::register(SIGINT, Arc::clone(interrupt)) {
        warn!("Could not install SIGINT handler: {e}");
    }
}

/// Newlines need a carriage return only when raw mode is active and output reaches the terminal.
const fn needs_raw_output(raw_mode_enabled: bool, stdout_is_terminal: bool) -> bool {
    raw_mode_enabled && stdout_is_terminal
}

fn run() -> ExitStatus {
    let args = match parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(status) => return status,
    };
    let options = if args.strict {
        EmulatorOptions::strict()
    } else {
        EmulatorOptions::default()
    };
    let interrupt = InterruptFlag::default();
    install_interrupt_handler(&interrupt);
    let interactive = io::stdin().is_terminal();
    let emu = if interactive {
        Emulator::with_keyboard(TerminalInputProvider::new(Arc::clone(&interrupt)))
    } else {
        Emulator::with_keyboard(PipedInputProvider::spawn(io::stdin(), Arc::clone(&interrupt)))
    };
    let mut emu = emu.with_options(options);
    for image in &args.images {
        if let Err(e) = emu.load_image_file(image) {
            eprintln!("{e}");
            return ExitStatus::LoadFailure;
        }
    }

    let res = {
        // restored when dropped, before the process exits
        let lock = interactive.then(terminal::set_terminal_raw);
        let raw_mode_enabled = lock.as_ref().is_some_and(RawLock::is_enabled);
        if needs_raw_output(raw_mode_enabled, io::stdout().is_terminal()) {
            emu.execute_with_stdout(&mut RawModeWriter::new(io::stdout()))
        } else {
            emu.execute_with_stdout(&mut io::stdout())
        }
    };
    match res {
        Ok(()) => ExitStatus::Completed,
        Err(e) => {
            eprintln!("{e}");
            ExitStatus::from(&e)
        }
    }
}
