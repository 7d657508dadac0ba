use super::DrawError;

/// Opaque handle to a font loaded into a [`TextFactory`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct FontId(pub(crate) usize);

/// Device-independent font registry.
///
/// Fonts are parsed once and kept across device loss; glyph rasterization
/// happens against whatever device currently exists.
#[derive(Default)]
pub struct TextFactory {
    fonts: Vec<fontdue::Font>,
}

impl TextFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and stores a TrueType or OpenType font from raw bytes.
    pub fn load_font(&mut self, bytes: &[u8]) -> Result<FontId, DrawError> {
        let font = fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default())
            .map_err(|e| DrawError::FontLoad(e.to_string()))?;
        let id = FontId(self.fonts.len());
        self.fonts.push(font);
        Ok(id)
    }

    pub fn font_count(&self) -> usize {
        self.fonts.len()
    }

    pub fn font(&self, id: FontId) -> Option<&fontdue::Font> {
        self.fonts.get(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_font_bytes_are_rejected() {
        let mut factory = TextFactory::new();
        let err = factory.load_font(b"not a font").unwrap_err();
        assert!(matches!(err, DrawError::FontLoad(_)));
        assert_eq!(factory.font_count(), 0);
    }

    #[test]
    fn unknown_font_id_resolves_to_nothing() {
        let factory = TextFactory::new();
        assert!(factory.font(FontId(0)).is_none());
    }
}
