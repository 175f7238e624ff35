mod bg_job;
pub mod config;
pub mod crop;
pub mod document;
pub mod error;
pub mod navigation;
pub mod reader;
pub mod render;
pub mod settings;
pub mod slider;
pub mod thumbnails;
pub mod unit_rect;
pub mod zoom;

#[cfg(feature = "gtk")]
pub mod pdf;
#[cfg(feature = "gtk")]
pub mod window;

pub use config::ReaderConfig;
pub use document::{PdfDocument, PdfPage};
pub use error::{Error, Result};
pub use reader::{Reader, ReaderEvent, RenderRequest};
pub use unit_rect::UnitRect;
