//! Static serving of the kiosk/staff web assets (spec §4.11).

use std::path::Path;
use tower_http::services::{ServeDir, ServeFile};

pub fn web_assets_service(static_dir: &Path) -> ServeDir<ServeFile> {
    ServeDir::new(static_dir).fallback(ServeFile::new(static_dir.join("index.html")))
}
