use crate::errors::ExecutionError;
use crate::hardware::keyboard::KeyboardInputProvider;
use crate::hardware::memory::{MEMORY_SIZE, Memory};
use crate::hardware::registers::{Registers, from_binary};
use std::io;
use std::io::Write;
use std::ops::ControlFlow;

/// Prompt written by the IN trap before reading.
pub const IN_PROMPT: &str = "Enter a character: ";
/// Message written by the HALT trap.
pub const HALT_MESSAGE: &str = "\nProgram halted\n";

/// Operating system services reachable via `TRAP`, selected by bits `[7:0]`.
#[repr(u8)]
#[derive(enumn::N, Debug, Copy, Clone, PartialEq, Eq)]
pub enum TrapVector {
    GetC = 0x20,
    Out = 0x21,
    PutS = 0x22,
    In = 0x23,
    PutSp = 0x24,
    Halt = 0x25,
}

/// Runs the service routine for `vector`.
///
/// Condition flags are not changed by any routine, even those writing R0.
pub fn dispatch(
    vector: TrapVector,
    regs: &mut Registers,
    mem: &Memory,
    keyboard: &mut dyn KeyboardInputProvider,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    match vector {
        TrapVector::GetC => get_c(regs, keyboard),
        TrapVector::Out => out(regs, stdout),
        TrapVector::PutS => put_s(regs, mem, stdout),
        TrapVector::In => in_trap(regs, keyboard, stdout),
        TrapVector::PutSp => put_sp(regs, mem, stdout),
        TrapVector::Halt => halt(stdout),
    }
}

fn read_character_from_console(
    regs: &mut Registers,
    keyboard: &mut dyn KeyboardInputProvider,
) -> ControlFlow<Result<(), ExecutionError>, u8> {
    match keyboard.read_input() {
        Ok(b) => {
            regs.set(0, from_binary(u16::from(b)));
            ControlFlow::Continue(b)
        }
        Err(e) if e.kind() == io::ErrorKind::Interrupted || keyboard.is_interrupted() => {
            ControlFlow::Break(Err(ExecutionError::Interrupted))
        }
        Err(e) => wrap_io_error_in_cf(&e),
    }
}

/// GETC: Read a single character from the keyboard. The character is not echoed onto the console.
///
/// Its ASCII code is copied into R0. The high eight bits of R0 are cleared.
pub fn get_c(
    regs: &mut Registers,
    keyboard: &mut dyn KeyboardInputProvider,
) -> ControlFlow<Result<(), ExecutionError>> {
    read_character_from_console(regs, keyboard)?;
    ControlFlow::Continue(())
}

/// IN: Print a prompt on the screen and read a single character echoed back from the keyboard.
///
/// Otherwise, like 0x20 GETC.
pub fn in_trap(
    regs: &mut Registers,
    keyboard: &mut dyn KeyboardInputProvider,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    write_out(IN_PROMPT.as_bytes(), stdout)?;
    let b = read_character_from_console(regs, keyboard)?;
    write_out(&[b], stdout)
}

/// OUT: Write a character in R0[7:0] to the console display.
pub fn out(regs: &Registers, stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    let [low, _high] = regs.get(0).as_binary().to_le_bytes();
    write_out(&[low], stdout)
}

fn put_one_char_per_u16(input: u16, append_to: &mut Vec<u8>) {
    let [low, _high] = input.to_le_bytes();
    append_to.push(low);
}

fn put_two_chars_per_u16(input: u16, append_to: &mut Vec<u8>) {
    let [low, high] = input.to_le_bytes();
    append_to.push(low);
    if high != 0 {
        append_to.push(high);
    }
}

/// Collects characters from the address in R0 up to the next zero word, reading memory
/// without device side effects. Stops after one pass over the whole address space.
fn put(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
    handle_char: fn(u16, &mut Vec<u8>),
) -> ControlFlow<Result<(), ExecutionError>> {
    let mut address = regs.get(0).as_binary();
    let mut s = Vec::with_capacity(120);
    for _ in 0..MEMORY_SIZE {
        let word = mem[address];
        if word == 0 {
            break;
        }
        handle_char(word, &mut s);
        address = address.wrapping_add(1);
    }
    write_out(&s, stdout)
}

/// PUTS: print null-delimited char* from register 0's address
pub fn put_s(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    put(regs, mem, stdout, put_one_char_per_u16)
}

/// PUTSP: Packed version of PUTS
///
/// The ASCII code contained in bits [7:0] of a memory location is written to the console first.
/// The second character of the last memory location can be 0x00.
/// Writing terminates with a 0x000 char.
pub fn put_sp(
    regs: &Registers,
    mem: &Memory,
    stdout: &mut impl Write,
) -> ControlFlow<Result<(), ExecutionError>> {
    put(regs, mem, stdout, put_two_chars_per_u16)
}

/// HALT: End program and stdout a message
pub fn halt(stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    write_out(HALT_MESSAGE.as_bytes(), stdout)?;
    ControlFlow::Break(Ok(()))
}

fn write_out(data: &[u8], stdout: &mut impl Write) -> ControlFlow<Result<(), ExecutionError>> {
    match stdout.write_all(data).and_then(|()| stdout.flush()) {
        Ok(()) => ControlFlow::Continue(()),
        Err(e) => wrap_io_error_in_cf(&e),
    }
}

fn wrap_io_error_in_cf<T>(error: &io::Error) -> ControlFlow<Result<(), ExecutionError>, T> {
    ControlFlow::Break(Err(ExecutionError::IOInputOutputError(error.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emulator::test_helpers::{FailingWriter, StringWriter, create_memory};
    use crate::hardware::keyboard::ScriptedInputProvider;
    use crate::hardware::registers::ConditionFlag;
    use googletest::prelude::*;

    #[gtest]
    pub fn test_get_c() {
        let mut keyboard = ScriptedInputProvider::new(b"a");
        let mut regs = Registers::new();
        regs.set(0, from_binary(0xFFFF));
        let res = get_c(&mut regs, &mut keyboard);
        assert!(res.is_continue());
        expect_that!(regs.get(0), eq(from_binary(u16::from(b'a'))));
        expect_that!(regs.get_conditional_register(), eq(ConditionFlag::Zero));
    }
    #[gtest]
    pub fn test_get_c_read_error() {
        let mut keyboard = ScriptedInputProvider::new(b"");
        let mut regs = Registers::new();
        let res = get_c(&mut regs, &mut keyboard);
        let Some(Err(execution_error)) = res.break_value() else {
            panic!("GETC without input should fail");
        };
        assert_that!(
            execution_error.to_string(),
            eq("Error during reading Stdin or writing program output to Stdout: no more keyboard input")
        );
    }
    #[gtest]
    pub fn test_get_c_interrupted() {
        let mut keyboard = ScriptedInputProvider::new(b"\x03");
        let mut regs = Registers::new();
        let res = get_c(&mut regs, &mut keyboard);
        assert!(res.break_value() == Some(Err(ExecutionError::Interrupted)));
    }
    #[gtest]
    pub fn test_put_s() {
        let data = [0x0048u16, 0x0049, 0x0000, 0x0041];
        let mem = create_memory(&data);
        let mut regs = Registers::new();
        regs.set(0, from_binary(0x3000));
        let mut writer = StringWriter::new();
        let res = put_s(&regs, &mem, &mut writer);
        assert!(res.is_continue());
        assert_that!(writer.get_string(), eq("HI"));
    }
    #[gtest]
    pub fn test_put_sp() {
        let data = [
            0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0x6548u16, 0x6c6c, 0x206f, 0x6f57, 0x6c72,
            0x2164, 0x0000,
        ];
        let mem = create_memory(&data);
        let mut regs = Registers::new();
        regs.set(0, from_binary(0x3005));
        let mut writer = StringWriter::new();
        let res = put_sp(&regs, &mem, &mut writer);
        assert!(res.is_continue());
        assert_that!(writer.get_string(), eq("Hello World!"));
    }
    #[gtest]
    pub fn test_put_sp_odd_length() {
        let mem = create_memory(&[0x6948u16, 0x0021, 0x0000]);
        let mut regs = Registers::new();
        regs.set(0, from_binary(0x3000));
        let mut writer = StringWriter::new();
        let res = put_sp(&regs, &mem, &mut writer);
        assert!(res.is_continue());
        assert_that!(writer.get_string(), eq("Hi!"));
    }
    #[gtest]
    pub fn test_in() {
        let mut keyboard = ScriptedInputProvider::new(b"abc");
        let mut regs = Registers::new();
        let mut writer = StringWriter::new();
        let res = in_trap(&mut regs, &mut keyboard, &mut writer);
        assert!(res.is_continue());
        assert_that!(writer.get_string(), eq("Enter a character: a"));
        expect_that!(regs.get(0), eq(from_binary(u16::from(b'a'))));
    }
    #[gtest]
    pub fn test_out() {
        let mut regs = Registers::new();
        regs.set(0, from_binary(0xFF00 | u16::from(b'k')));
        let mut writer = StringWriter::new();
        let res = out(&regs, &mut writer);
        assert!(res.is_continue());
        assert_that!(writer.get_string(), eq("k"));
    }
    #[gtest]
    pub fn test_out_write_error() {
        let mut regs = Registers::new();
        regs.set(0, from_binary(u16::from(b'k')));
        let res = out(&regs, &mut FailingWriter);
        assert!(matches!(
            res,
            ControlFlow::Break(Err(ExecutionError::IOInputOutputError(_)))
        ));
    }
    #[gtest]
    pub fn test_halt() {
        let mut writer = StringWriter::new();
        let res = halt(&mut writer);
        assert!(res == ControlFlow::Break(Ok(())));
        assert_that!(writer.get_string(), eq(HALT_MESSAGE));
    }
    #[gtest]
    pub fn test_dispatch_by_vector() {
        expect_that!(TrapVector::n(0x22), some(eq(TrapVector::PutS)));
        expect_that!(TrapVector::n(0x26), none());
        let mem = create_memory(&[]);
        let mut regs = Registers::new();
        let mut keyboard = ScriptedInputProvider::new(b"z");
        let mut writer = StringWriter::new();
        let res = dispatch(TrapVector::GetC, &mut regs, &mem, &mut keyboard, &mut writer);
        assert!(res.is_continue());
        expect_that!(regs.get(0), eq(from_binary(u16::from(b'z'))));
        expect_that!(writer.get_string(), eq(""));
    }
}
