//! Minimal streaming JSON writer.
//!
//! Members are emitted straight into a `core::fmt::Write` sink in call
//! order, so field order in the published payload is fixed by construction.
//! Floats use the `{:?}` rendering, which keeps a fractional digit on whole
//! numbers (`15.0`, not `15`).

use core::fmt::{self, Write};

/// Comma-tracking writer for one JSON document.
pub struct JsonWriter<'a, W: Write> {
    out: &'a mut W,
    needs_comma: bool,
}

impl<'a, W: Write> JsonWriter<'a, W> {
    pub fn new(out: &'a mut W) -> Self {
        Self {
            out,
            needs_comma: false,
        }
    }

    fn separate(&mut self) -> fmt::Result {
        if self.needs_comma {
            self.out.write_char(',')?;
        }
        Ok(())
    }

    pub fn open_object(&mut self) -> fmt::Result {
        self.separate()?;
        self.out.write_char('{')?;
        self.needs_comma = false;
        Ok(())
    }

    pub fn close_object(&mut self) -> fmt::Result {
        self.out.write_char('}')?;
        self.needs_comma = true;
        Ok(())
    }

    pub fn open_array(&mut self) -> fmt::Result {
        self.separate()?;
        self.out.write_char('[')?;
        self.needs_comma = false;
        Ok(())
    }

    pub fn close_array(&mut self) -> fmt::Result {
        self.out.write_char(']')?;
        self.needs_comma = true;
        Ok(())
    }

    /// Writes a member key. Keys are compile-time literals and are not
    /// escaped.
    pub fn key(&mut self, name: &str) -> fmt::Result {
        self.separate()?;
        write!(self.out, "\"{name}\":")?;
        self.needs_comma = false;
        Ok(())
    }

    pub fn string(&mut self, value: &str) -> fmt::Result {
        self.separate()?;
        self.out.write_char('"')?;
        self.write_escaped(value)?;
        self.out.write_char('"')?;
        self.needs_comma = true;
        Ok(())
    }

    pub fn number(&mut self, value: f32) -> fmt::Result {
        self.separate()?;
        write!(self.out, "{value:?}")?;
        self.needs_comma = true;
        Ok(())
    }

    pub fn integer(&mut self, value: i32) -> fmt::Result {
        self.separate()?;
        write!(self.out, "{value}")?;
        self.needs_comma = true;
        Ok(())
    }

    pub fn boolean(&mut self, value: bool) -> fmt::Result {
        self.separate()?;
        self.out.write_str(if value { "true" } else { "false" })?;
        self.needs_comma = true;
        Ok(())
    }

    fn write_escaped(&mut self, value: &str) -> fmt::Result {
        for ch in value.chars() {
            match ch {
                '"' => self.out.write_str("\\\"")?,
                '\\' => self.out.write_str("\\\\")?,
                '\n' => self.out.write_str("\\n")?,
                '\r' => self.out.write_str("\\r")?,
                '\t' => self.out.write_str("\\t")?,
                c if (c as u32) < 0x20 => write!(self.out, "\\u{:04x}", c as u32)?,
                c => self.out.write_char(c)?,
            }
        }
        Ok(())
    }
}
