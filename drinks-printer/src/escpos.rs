//! ESC/POS command builder
//!
//! Provides a fluent API for building ESC/POS print data.

use crate::encoding::{CodePage, encode_for_printer};

/// ESC/POS command builder
///
/// Builds ESC/POS byte sequences for thermal printers. Text is kept as UTF-8
/// while building and converted to the selected code page in [`build`].
///
/// [`build`]: EscPosBuilder::build
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
    code_page: CodePage,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize) -> Self {
        Self::with_code_page(width, CodePage::default())
    }

    /// Create a builder that encodes text for a specific code page
    pub fn with_code_page(width: usize, code_page: CodePage) -> Self {
        let mut buf = Vec::with_capacity(512);
        // Initialize printer (ESC @)
        buf.extend_from_slice(&[0x1B, 0x40]);
        Self {
            buf,
            width,
            code_page,
        }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(b'\n');
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(b'\n');
        self
    }

    // === Alignment ===

    pub fn center(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x01]);
        self
    }

    pub fn left(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x61, 0x00]);
        self
    }

    // === Text Style ===

    pub fn bold(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x01]);
        self
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1B, 0x45, 0x00]);
        self
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x11]);
        self
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x21, 0x00]);
        self
    }

    // === Paper Control ===

    /// Full cut after feeding n lines (GS V 66 n).
    /// Lets the printer manage the cutter-to-head distance.
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[0x1D, 0x56, 0x42, lines]);
        self
    }

    // === Build ===

    /// Build the final byte buffer encoded for the configured code page
    pub fn build(self) -> Vec<u8> {
        encode_for_printer(&self.buf, self.code_page)
    }

    /// Build without code page conversion (for debugging or ASCII-only content)
    pub fn build_raw(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(48)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_starts_with_init() {
        let mut b = EscPosBuilder::new(32);
        b.center().double_size().line("Negroni").reset_size();

        let data = b.build_raw();
        assert_eq!(&data[..2], &[0x1B, 0x40]);
        assert!(String::from_utf8_lossy(&data).contains("Negroni"));
    }

    #[test]
    fn test_cut_feed_is_last() {
        let mut b = EscPosBuilder::new(10);
        b.line("Aperol").cut_feed(4);

        let data = b.build_raw();
        assert!(data.ends_with(&[0x1D, 0x56, 0x42, 4]));
        assert!(String::from_utf8_lossy(&data).contains("Aperol\n"));
    }

    #[test]
    fn test_build_applies_code_page() {
        let mut b = EscPosBuilder::with_code_page(32, CodePage::Wpc1252);
        b.line("Café");

        let data = b.build();
        assert!(data.windows(5).any(|w| w == [b'C', b'a', b'f', 0xE9, b'\n']));
    }
}
