use kurbo::Size;

/// Options a host opens a reader with. Owned by the reader and lent to the
/// parts that need it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaderConfig {
    pub title: Option<String>,
    /// Restore the last read page on open and store it on close. Off unless
    /// the host asks for it.
    pub remember_last_page: bool,
    pub thumbnails_enabled: bool,
    pub crop_enabled: bool,
    /// Phone sized layout: thumbnails and spacings at half size.
    pub compact: bool,
    /// RGBA, 0.0 to 1.0.
    pub background: [f64; 4],
    /// Screen size in logical pixels.
    pub screen_size: Size,
    pub screen_scale: f64,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        ReaderConfig {
            title: None,
            remember_last_page: false,
            thumbnails_enabled: true,
            crop_enabled: true,
            compact: false,
            background: [0.5, 0.5, 0.5, 1.0],
            screen_size: Size::new(1024.0, 768.0),
            screen_scale: 1.0,
        }
    }
}

impl ReaderConfig {
    /// Title shown in the chrome, falling back to the document's file name.
    pub fn display_title(&self, uri: &str) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        uri.rsplit('/')
            .find(|part| !part.is_empty())
            .unwrap_or(uri)
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReaderConfig::default();
        assert!(!config.remember_last_page);
        assert!(config.thumbnails_enabled);
        assert!(config.crop_enabled);
        assert_eq!(config.screen_scale, 1.0);
    }

    #[test]
    fn test_display_title() {
        let mut config = ReaderConfig::default();
        assert_eq!(config.display_title("file:///home/me/book.pdf"), "book.pdf");
        assert_eq!(config.display_title("book.pdf"), "book.pdf");

        config.title = Some("My Book".to_string());
        assert_eq!(config.display_title("file:///home/me/book.pdf"), "My Book");
    }
}
