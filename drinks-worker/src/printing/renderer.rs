//! Drink receipt renderer
//!
//! Renders one drink order into ESC/POS bytes:
//!
//! ```text
//!        MOJITO          (centered, bold, double size)
//!
//!          Ana           (centered, normal size)
//! ----- cut -----
//! ```

use drinks_printer::{CodePage, EscPosBuilder, truncate_width};

/// Lines fed before the cut so the text clears the cutter
const CUT_FEED_LINES: u8 = 4;

pub struct ReceiptRenderer {
    width: usize,
    code_page: CodePage,
    placeholder: String,
}

impl ReceiptRenderer {
    /// Create a renderer for a paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 48 characters
    pub fn new(width: usize, code_page: CodePage, placeholder: impl Into<String>) -> Self {
        Self {
            width,
            code_page,
            placeholder: placeholder.into(),
        }
    }

    pub fn render(&self, drink: &str, client_name: &str) -> Vec<u8> {
        let mut b = EscPosBuilder::with_code_page(self.width, self.code_page);

        // Double size halves the characters per line
        let drink = truncate_width(drink.trim(), self.width / 2, self.code_page);
        b.center();
        b.double_size();
        b.bold();
        b.line(&drink);
        b.bold_off();
        b.reset_size();

        b.newline();

        let client = match client_name.trim() {
            "" => self.placeholder.as_str(),
            name => name,
        };
        b.line(&truncate_width(client, self.width, self.code_page));

        b.left();
        b.cut_feed(CUT_FEED_LINES);

        b.build()
    }
}

impl Default for ReceiptRenderer {
    fn default() -> Self {
        Self::new(48, CodePage::default(), "Guest")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(data: &[u8], needle: &[u8]) -> bool {
        data.windows(needle.len()).any(|w| w == needle)
    }

    fn position(data: &[u8], needle: &[u8]) -> usize {
        data.windows(needle.len())
            .position(|w| w == needle)
            .unwrap_or(usize::MAX)
    }

    #[test]
    fn test_layout_order() {
        let data = ReceiptRenderer::default().render("Mojito", "Ana");

        let double = position(&data, &[0x1D, 0x21, 0x11]);
        let drink = position(&data, b"Mojito\n");
        let normal = position(&data, &[0x1D, 0x21, 0x00]);
        let client = position(&data, b"Ana\n");

        assert!(double < drink);
        assert!(drink < normal);
        assert!(normal < client);
        assert!(contains(&data, &[0x1B, 0x61, 0x01]));
        assert!(data.ends_with(&[0x1D, 0x56, 0x42, CUT_FEED_LINES]));
    }

    #[test]
    fn test_blank_line_between_drink_and_client() {
        let data = ReceiptRenderer::default().render("Mojito", "Ana");
        let drink = position(&data, b"Mojito\n") + b"Mojito\n".len();
        let client = position(&data, b"Ana\n");
        assert!(data[drink..client].contains(&b'\n'));
    }

    #[test]
    fn test_empty_client_uses_placeholder() {
        let renderer = ReceiptRenderer::new(32, CodePage::Wpc1252, "Cliente");
        let data = renderer.render("Caña", "   ");
        assert!(contains(&data, b"Cliente\n"));
        // ñ in Windows-1252
        assert!(contains(&data, &[b'C', b'a', 0xF1, b'a']));
    }

    #[test]
    fn test_long_drink_is_truncated() {
        let renderer = ReceiptRenderer::new(32, CodePage::Wpc1252, "Guest");
        let data = renderer.render(&"x".repeat(40), "Bo");
        assert!(!contains(&data, "x".repeat(17).as_bytes()));
    }
}
