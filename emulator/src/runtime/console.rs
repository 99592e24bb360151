//! Character I/O for the `in` and `out` instructions

use std::io::{self, BufRead, Write};

use tracing::debug;

use crate::constants::Word;

/// A character device the computer reads from and writes to
pub trait Console {
    /// Emit one character
    ///
    /// # Errors
    ///
    /// Fails if the underlying sink fails.
    fn write(&mut self, value: Word) -> io::Result<()>;

    /// Consume the next input character, blocking until one is available.
    /// Returns `None` once every input source is exhausted.
    ///
    /// # Errors
    ///
    /// Fails if the underlying source fails.
    fn read(&mut self) -> io::Result<Option<Word>>;

    /// Flush any buffered output
    ///
    /// # Errors
    ///
    /// Fails if the underlying sink fails.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Input fed from a script first, then from a fallback source.
///
/// The script is probed with [`BufRead::fill_buf`], which does not consume
/// anything. As soon as it reports no more bytes, it is dropped and every
/// subsequent read comes from the fallback.
pub struct ScriptedInput<S, F> {
    script: Option<S>,
    fallback: F,
}

impl<S: BufRead, F: BufRead> ScriptedInput<S, F> {
    #[must_use]
    pub const fn new(script: S, fallback: F) -> Self {
        Self {
            script: Some(script),
            fallback,
        }
    }

    /// Whether reads still come from the script
    #[must_use]
    pub const fn is_scripted(&self) -> bool {
        self.script.is_some()
    }

    /// Consume the next byte from the active source
    ///
    /// # Errors
    ///
    /// Fails if the active source fails.
    pub fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(script) = &mut self.script {
            if let Some(byte) = take_byte(script)? {
                return Ok(Some(byte));
            }

            debug!("Scripted input exhausted, switching to fallback input");
            self.script = None;
        }

        take_byte(&mut self.fallback)
    }
}

impl<F: BufRead> ScriptedInput<io::Empty, F> {
    /// Input without a script
    #[must_use]
    pub const fn unscripted(fallback: F) -> Self {
        Self {
            script: None,
            fallback,
        }
    }
}

fn take_byte<R: BufRead>(reader: &mut R) -> io::Result<Option<u8>> {
    let byte = reader.fill_buf()?.first().copied();
    if byte.is_some() {
        reader.consume(1);
    }
    Ok(byte)
}

/// A [`Console`] over a [`ScriptedInput`] and any byte sink.
///
/// Characters are single bytes both ways: a value is written as its
/// Latin-1 byte, and values above 255, which have none, are written as `?`.
pub struct Terminal<S, F, W> {
    input: ScriptedInput<S, F>,
    output: W,
}

impl<S: BufRead, F: BufRead, W: Write> Terminal<S, F, W> {
    #[must_use]
    pub const fn new(input: ScriptedInput<S, F>, output: W) -> Self {
        Self { input, output }
    }

    #[must_use]
    pub const fn input(&self) -> &ScriptedInput<S, F> {
        &self.input
    }

    #[must_use]
    pub const fn output(&self) -> &W {
        &self.output
    }

    #[must_use]
    pub fn into_output(self) -> W {
        self.output
    }
}

impl<S: BufRead, F: BufRead, W: Write> Console for Terminal<S, F, W> {
    fn write(&mut self, value: Word) -> io::Result<()> {
        let byte = u8::try_from(value).unwrap_or_else(|_| {
            debug!(value, "Character out of the byte range");
            b'?'
        });
        self.output.write_all(&[byte])
    }

    fn read(&mut self) -> io::Result<Option<Word>> {
        // Prompts must be visible before blocking on input
        self.output.flush()?;
        Ok(self.input.next_byte()?.map(Word::from))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.output.flush()
    }
}
