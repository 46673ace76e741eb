//! Code page handling for thermal printers
//!
//! Receipt content is built as UTF-8 mixed with ESC/POS command bytes. Before
//! it reaches the printer, text has to be converted to the code page the
//! printer has selected. This module provides:
//! - Truncating strings to a printed width
//! - Converting UTF-8 to the printer code page while preserving ESC/POS commands

use std::str::FromStr;

use encoding_rs::Encoding;
use tracing::instrument;

use crate::error::PrintError;

/// Character table selected on the printer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodePage {
    /// Windows-1252 (Latin-1 superset, includes €). `ESC t 16` on Epson-compatible printers.
    #[default]
    Wpc1252,
    /// GBK double-byte mode for Chinese firmware
    Gbk,
}

impl CodePage {
    fn encoding(self) -> &'static Encoding {
        match self {
            CodePage::Wpc1252 => encoding_rs::WINDOWS_1252,
            CodePage::Gbk => encoding_rs::GBK,
        }
    }

    /// Bytes that put the printer into this code page
    fn select_bytes(self) -> &'static [u8] {
        match self {
            // ESC t 16 - Select character code table WPC1252
            CodePage::Wpc1252 => &[0x1B, 0x74, 16],
            // FS & - Enable Chinese mode, FS C 1 - Select GBK
            CodePage::Gbk => &[0x1C, 0x26, 0x1C, 0x43, 0x01],
        }
    }

    /// Bytes to re-enter the code page after an ESC @ reset
    fn reselect_bytes(self) -> &'static [u8] {
        match self {
            CodePage::Wpc1252 => &[0x1B, 0x74, 16],
            CodePage::Gbk => &[0x1C, 0x26],
        }
    }
}

impl FromStr for CodePage {
    type Err = PrintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wpc1252" | "cp1252" | "windows-1252" | "latin1" => Ok(CodePage::Wpc1252),
            "gbk" => Ok(CodePage::Gbk),
            other => Err(PrintError::InvalidConfig(format!(
                "Unknown code page: {}",
                other
            ))),
        }
    }
}

/// Encode a single character, substituting '?' for anything the code page lacks
fn encode_char(c: char, code_page: CodePage) -> Vec<u8> {
    let mut tmp = [0u8; 4];
    let (cow, _, had_errors) = code_page.encoding().encode(c.encode_utf8(&mut tmp));
    if had_errors {
        vec![b'?']
    } else {
        cow.into_owned()
    }
}

/// Truncate a string to fit within a printed width
pub fn truncate_width(s: &str, max_width: usize, code_page: CodePage) -> String {
    let mut width = 0;
    let mut result = String::new();
    for c in s.chars() {
        let char_len = encode_char(c, code_page).len();
        if width + char_len > max_width {
            break;
        }
        result.push(c);
        width += char_len;
    }
    result
}

/// Convert mixed UTF-8 content (with ESC/POS commands) to the printer code page
///
/// ASCII bytes (0x00-0x7F) pass through untouched so command sequences are
/// never corrupted. Only bytes >= 0x80 are treated as UTF-8 text and
/// converted. The code page is selected up front and re-selected after every
/// INIT (ESC @), which resets the character table.
#[instrument(skip(bytes), fields(len = bytes.len()))]
pub fn encode_for_printer(bytes: &[u8], code_page: CodePage) -> Vec<u8> {
    let mut result = Vec::with_capacity(bytes.len() + 16);
    result.extend_from_slice(code_page.select_bytes());

    let mut buffer = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];

        if b == 0x1B && i + 1 < bytes.len() && bytes[i + 1] == 0x40 {
            flush_buffer(&mut buffer, &mut result, code_page);
            result.extend_from_slice(&[0x1B, 0x40]);
            result.extend_from_slice(code_page.reselect_bytes());
            i += 2;
            continue;
        }

        if b < 128 {
            flush_buffer(&mut buffer, &mut result, code_page);
            result.push(b);
        } else {
            buffer.push(b);
        }
        i += 1;
    }

    flush_buffer(&mut buffer, &mut result, code_page);

    if code_page == CodePage::Gbk {
        // FS . - Exit Chinese mode
        result.extend_from_slice(&[0x1C, 0x2E]);
    }

    result
}

/// Flush the pending non-ASCII run into the output
fn flush_buffer(buffer: &mut Vec<u8>, result: &mut Vec<u8>, code_page: CodePage) {
    if buffer.is_empty() {
        return;
    }

    let s = String::from_utf8_lossy(buffer);
    for c in s.chars() {
        if c == '€' && code_page == CodePage::Gbk {
            // GBK has no euro: exit Chinese mode -> PC858 -> euro -> re-enter
            result.extend_from_slice(&[0x1C, 0x2E, 0x1B, 0x74, 19, 0xD5, 0x1C, 0x26]);
            continue;
        }
        result.extend_from_slice(&encode_char(c, code_page));
    }
    buffer.clear();
}
