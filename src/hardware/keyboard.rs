use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, poll, read};
use log::debug;
use std::collections::VecDeque;
use std::io;
use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError, SyncSender, sync_channel};
use std::thread;
use std::time::Duration;

/// Set once execution should stop, shared with signal handlers.
pub type InterruptFlag = Arc<AtomicBool>;

/// How long blocking reads wait before looking at the interrupt flag again.
const INTERRUPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Providing Keyboard Input independent of an implementation.
pub trait KeyboardInputProvider {
    /// Returns and consumes a pending input byte if there is one, does not block.
    ///
    /// # Errors
    /// - polling the underlying input device failed
    fn poll_input(&mut self) -> io::Result<Option<u8>>;
    /// Waits for the next input byte.
    ///
    /// # Errors
    /// - reading the underlying input device failed
    /// - [`io::ErrorKind::Interrupted`] if CTRL-C was pressed while waiting
    /// - [`io::ErrorKind::UnexpectedEof`] if the input is exhausted
    fn read_input(&mut self) -> io::Result<u8>;
    /// True if CTRL-C was triggered
    fn is_interrupted(&self) -> bool;
    /// Collects input that arrived in the meantime without blocking, so that CTRL-C is noticed
    /// while the running program does not read the keyboard.
    ///
    /// # Errors
    /// - polling the underlying input device failed
    fn refresh(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Keyboard input from the terminal, expected to be in raw mode.
///
/// CTRL-C does not raise a signal in raw mode, it sets the interrupt flag instead.
#[derive(Debug, Default)]
pub struct TerminalInputProvider {
    pending: VecDeque<u8>,
    interrupt: InterruptFlag,
}
impl TerminalInputProvider {
    #[must_use]
    pub const fn new(interrupt: InterruptFlag) -> Self {
        Self {
            pending: VecDeque::new(),
            interrupt,
        }
    }
    /// Maps a key press to the byte an LC-3 program expects, `None` for everything else.
    fn key_to_byte(&mut self, event: &KeyEvent) -> Option<u8> {
        if event.kind == KeyEventKind::Release {
            return None;
        }
        match event.code {
            KeyCode::Char('c') if event.modifiers.contains(KeyModifiers::CONTROL) => {
                self.interrupt.store(true, Ordering::Relaxed);
                None
            }
            KeyCode::Char(c) if c.is_ascii() => u8::try_from(c).ok(),
            KeyCode::Enter => Some(b'\n'),
            KeyCode::Tab => Some(b'\t'),
            KeyCode::Backspace => Some(0x08),
            KeyCode::Esc => Some(0x1B),
            _ => None,
        }
    }
    fn event_to_byte(&mut self, event: &Event) -> Option<u8> {
        match event {
            Event::Key(key_event) => self.key_to_byte(key_event),
            _ => None,
        }
    }
}
impl KeyboardInputProvider for TerminalInputProvider {
    fn poll_input(&mut self) -> io::Result<Option<u8>> {
        self.refresh()?;
        Ok(self.pending.pop_front())
    }
    fn read_input(&mut self) -> io::Result<u8> {
        if let Some(b) = self.pending.pop_front() {
            return Ok(b);
        }
        loop {
            if self.is_interrupted() {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            if !poll(INTERRUPT_POLL_INTERVAL)? {
                continue;
            }
            let event = read()?;
            if let Some(b) = self.event_to_byte(&event) {
                return Ok(b);
            }
        }
    }
    fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }
    fn refresh(&mut self) -> io::Result<()> {
        while poll(Duration::from_secs(0))? {
            let event = read()?;
            if let Some(b) = self.event_to_byte(&event) {
                self.pending.push_back(b);
            }
        }
        Ok(())
    }
}

/// Keyboard input from a non-interactive stream such as a pipe or a file.
///
/// A reader thread forwards the stream byte by byte, so the program starts running before the
/// stream ends and only a few bytes are buffered ahead. Every byte value is passed on as input,
/// interrupts only come from the shared flag.
#[derive(Debug)]
pub struct PipedInputProvider {
    input: Receiver<u8>,
    interrupt: InterruptFlag,
}
impl PipedInputProvider {
    const BUFFERED_BYTES: usize = 16;

    /// Starts the reader thread for `reader`. The thread ends with the stream or when the
    /// provider is dropped and the next byte arrives.
    #[must_use]
    pub fn spawn(reader: impl Read + Send + 'static, interrupt: InterruptFlag) -> Self {
        let (sender, input) = sync_channel(Self::BUFFERED_BYTES);
        thread::spawn(move || forward_bytes(reader, &sender));
        Self::from_receiver(input, interrupt)
    }
    /// Input bytes arriving on `input`, the end of input is signalled by dropping the sender.
    #[must_use]
    pub const fn from_receiver(input: Receiver<u8>, interrupt: InterruptFlag) -> Self {
        Self { input, interrupt }
    }
}
fn forward_bytes(reader: impl Read, sender: &SyncSender<u8>) {
    for b in reader.bytes() {
        match b {
            Ok(b) => {
                if sender.send(b).is_err() {
                    return;
                }
            }
            Err(e) => {
                debug!("Reading piped input stopped: {e}");
                return;
            }
        }
    }
}
impl KeyboardInputProvider for PipedInputProvider {
    fn poll_input(&mut self) -> io::Result<Option<u8>> {
        // a hung up sender only means no more input
        Ok(self.input.try_recv().ok())
    }
    fn read_input(&mut self) -> io::Result<u8> {
        loop {
            if self.is_interrupted() {
                return Err(io::Error::from(io::ErrorKind::Interrupted));
            }
            match self.input.recv_timeout(INTERRUPT_POLL_INTERVAL) {
                Ok(b) => return Ok(b),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "no more keyboard input",
                    ));
                }
            }
        }
    }
    fn is_interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }
}

/// Keyboard input from a fixed sequence of bytes, e.g. for tests.
///
/// Byte `0x03` (CTRL-C) is treated as interrupt, like on the terminal.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInputProvider {
    pending: VecDeque<u8>,
    is_interrupted: bool,
}
impl ScriptedInputProvider {
    const CTRL_C: u8 = 0x03;

    #[must_use]
    pub fn new(input: &[u8]) -> Self {
        Self {
            pending: input.iter().copied().collect(),
            is_interrupted: false,
        }
    }
    fn next_byte(&mut self) -> Option<u8> {
        if self.is_interrupted {
            return None;
        }
        let b = self.pending.pop_front()?;
        if b == Self::CTRL_C {
            self.is_interrupted = true;
            return None;
        }
        Some(b)
    }
}
impl KeyboardInputProvider for ScriptedInputProvider {
    fn poll_input(&mut self) -> io::Result<Option<u8>> {
        Ok(self.next_byte())
    }
    fn read_input(&mut self) -> io::Result<u8> {
        self.next_byte().ok_or_else(|| {
            if self.is_interrupted {
                io::Error::from(io::ErrorKind::Interrupted)
            } else {
                io::Error::new(io::ErrorKind::UnexpectedEof, "no more keyboard input")
            }
        })
    }
    fn is_interrupted(&self) -> bool {
        self.is_interrupted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use googletest::prelude::*;

    #[gtest]
    fn test_scripted_input() -> googletest::Result<()> {
        let mut sut = ScriptedInputProvider::new(b"ab");
        expect_that!(sut.poll_input()?, some(eq(b'a')));
        expect_that!(sut.read_input()?, eq(b'b'));
        expect_that!(sut.poll_input()?, none());
        let err = sut.read_input().unwrap_err();
        expect_that!(err.kind(), eq(io::ErrorKind::UnexpectedEof));
        expect_that!(sut.is_interrupted(), eq(false));
        Ok(())
    }

    #[gtest]
    fn test_scripted_input_ctrl_c() {
        let mut sut = ScriptedInputProvider::new(b"x\x03y");
        expect_that!(sut.read_input().ok(), some(eq(b'x')));
        let err = sut.read_input().unwrap_err();
        expect_that!(err.kind(), eq(io::ErrorKind::Interrupted));
        expect_that!(sut.is_interrupted(), eq(true));
        expect_that!(sut.poll_input().ok().flatten(), none());
    }

    #[gtest]
    fn test_piped_input_passes_every_byte() -> googletest::Result<()> {
        let mut sut = PipedInputProvider::spawn(&b"a\x03b"[..], InterruptFlag::default());
        expect_that!(sut.read_input()?, eq(b'a'));
        expect_that!(sut.read_input()?, eq(0x03));
        expect_that!(sut.read_input()?, eq(b'b'));
        let err = sut.read_input().unwrap_err();
        expect_that!(err.kind(), eq(io::ErrorKind::UnexpectedEof));
        expect_that!(sut.poll_input()?, none());
        expect_that!(sut.is_interrupted(), eq(false));
        Ok(())
    }

    #[gtest]
    fn test_piped_input_poll_does_not_wait_for_end_of_stream() -> googletest::Result<()> {
        let (sender, receiver) = sync_channel(4);
        let mut sut = PipedInputProvider::from_receiver(receiver, InterruptFlag::default());
        expect_that!(sut.poll_input()?, none());
        sender.send(b'x')?;
        expect_that!(sut.poll_input()?, some(eq(b'x')));
        sender.send(b'y')?;
        expect_that!(sut.read_input()?, eq(b'y'));
        Ok(())
    }

    #[gtest]
    fn test_piped_input_blocking_read_stops_on_interrupt() {
        let (_sender, receiver) = sync_channel(4);
        let interrupt = InterruptFlag::default();
        let mut sut = PipedInputProvider::from_receiver(receiver, Arc::clone(&interrupt));
        let setter = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            interrupt.store(true, Ordering::Relaxed);
        });
        let err = sut.read_input().unwrap_err();
        expect_that!(err.kind(), eq(io::ErrorKind::Interrupted));
        expect_that!(sut.is_interrupted(), eq(true));
        setter.join().unwrap();
    }

    #[gtest]
    fn test_terminal_key_mapping() {
        let interrupt = InterruptFlag::default();
        let mut sut = TerminalInputProvider::new(Arc::clone(&interrupt));
        let key = |code| Event::Key(KeyEvent::new(code, KeyModifiers::NONE));
        expect_that!(sut.event_to_byte(&key(KeyCode::Char('q'))), some(eq(b'q')));
        expect_that!(sut.event_to_byte(&key(KeyCode::Enter)), some(eq(b'\n')));
        expect_that!(sut.event_to_byte(&key(KeyCode::Char('ä'))), none());
        expect_that!(sut.event_to_byte(&key(KeyCode::F(1))), none());
        expect_that!(sut.is_interrupted(), eq(false));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        expect_that!(sut.event_to_byte(&ctrl_c), none());
        expect_that!(sut.is_interrupted(), eq(true));
        expect_that!(interrupt.load(Ordering::Relaxed), eq(true));
    }
}
