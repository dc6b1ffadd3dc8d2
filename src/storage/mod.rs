//! Local file storage: download directory lifecycle.

mod download_dir;

pub use download_dir::DownloadDir;
