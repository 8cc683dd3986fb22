//! Integer I/O behind `Lread` and `Lwrite`.

use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use lama_common_core::Value;

use crate::error::RuntimeError;

pub trait Host {
    fn read_int(&mut self) -> Result<i64, RuntimeError>;
    fn write_int(&mut self, n: i64) -> Result<(), RuntimeError>;
}

/// Line-oriented host over any reader/writer pair. `read_int` prompts with
/// `"> "` unless prompting is turned off.
pub struct IoHost<R, W> {
    input: R,
    output: W,
    prompt: bool,
}

impl IoHost<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> IoHost<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            prompt: true,
        }
    }

    pub fn without_prompt(mut self) -> Self {
        self.prompt = false;
        self
    }

    pub fn output(&self) -> &W {
        &self.output
    }

    pub fn into_output(self) -> W {
        self.output
    }
}

impl<R: BufRead, W: Write> Host for IoHost<R, W> {
    fn read_int(&mut self) -> Result<i64, RuntimeError> {
        if self.prompt {
            self.output.write_all(b"> ")?;
            self.output.flush()?;
        }
        let mut line = String::new();
        loop {
            line.clear();
            if self.input.read_line(&mut line)? == 0 {
                return Err(RuntimeError::EndOfInput);
            }
            if !line.trim().is_empty() {
                break;
            }
        }
        let text = line.trim();
        match text.parse::<i64>() {
            Ok(n) if Value::fits_int(n) => Ok(n),
            _ => Err(RuntimeError::BadInput(text.to_string())),
        }
    }

    fn write_int(&mut self, n: i64) -> Result<(), RuntimeError> {
        writeln!(self.output, "{}", n)?;
        Ok(())
    }
}
