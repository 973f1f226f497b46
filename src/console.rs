//! Operator console output.
//!
//! While the keyboard listener holds the terminal in raw mode, the tty no
//! longer turns `\n` into `\r\n`, so everything written to stdout goes
//! through [`ConsoleWriter`], which does the translation itself.

use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::catalog::{NotificationType, FALLBACK_GLYPH, RESET_COLOR};

static RAW_MODE: AtomicBool = AtomicBool::new(false);

pub fn set_raw_mode(enabled: bool) {
    RAW_MODE.store(enabled, Ordering::Relaxed);
}

/// stdout writer, also used as the tracing-subscriber writer.
pub struct ConsoleWriter {
    inner: io::Stdout,
}

pub fn stdout() -> ConsoleWriter {
    ConsoleWriter { inner: io::stdout() }
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !RAW_MODE.load(Ordering::Relaxed) {
            return self.inner.write(buf);
        }

        let mut out = self.inner.lock();
        write_crlf(&mut out, buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn write_crlf(out: &mut impl Write, buf: &[u8]) -> io::Result<()> {
    for chunk in buf.split_inclusive(|b| *b == b'\n') {
        match chunk.strip_suffix(b"\n") {
            Some(line) => {
                out.write_all(line.strip_suffix(b"\r").unwrap_or(line))?;
                out.write_all(b"\r\n")?;
            }
            None => out.write_all(chunk)?,
        }
    }
    Ok(())
}

/// `<color><glyph> <TYPE padded to 10>: "<message>"<reset>`
///
/// Unknown or missing types get the fallback glyph and no color.
pub fn notification_line(kind: Option<&str>, message: Option<&str>, ansi: bool) -> String {
    let parsed = kind.and_then(|k| k.parse::<NotificationType>().ok());
    let glyph = parsed.map_or(FALLBACK_GLYPH, NotificationType::glyph);
    let (color, reset) = match parsed {
        Some(t) if ansi => (t.color_code(), RESET_COLOR),
        _ => ("", ""),
    };
    let label = kind.unwrap_or_default().to_uppercase();
    format!(
        "{color}{glyph} {label:<10}: \"{}\"{reset}",
        message.unwrap_or_default()
    )
}

/// Print an incoming notification to the operator console.
pub fn echo_notification(kind: Option<&str>, message: Option<&str>) {
    let line = notification_line(kind, message, io::stdout().is_terminal());
    let _ = writeln!(stdout(), "{line}");
}
