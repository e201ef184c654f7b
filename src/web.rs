//! Static assets and built-in pages.

pub mod assets;
pub mod ui;
