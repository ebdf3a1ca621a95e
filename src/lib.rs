pub mod batch;
pub mod compose;
pub mod config;
pub mod cover;
pub mod encoder;
pub mod error;
pub mod ffmpeg;
pub mod filter_graph;
pub mod font;
pub mod geometry;
pub mod highlight;
pub mod init;
pub mod layout;
pub mod metrics;
pub mod srt;
pub mod style;

pub use error::ComposeError;

pub(crate) fn logv(tag: &str, message: &str) {
    match tag {
        "WARN" => tracing::warn!(tag, "{}", message),
        _ => tracing::info!(tag, "{}", message),
    }
}

pub(crate) fn logi(message: impl AsRef<str>) {
    logv("INFO", message.as_ref());
}

pub(crate) fn logok(message: impl AsRef<str>) {
    logv("OK", message.as_ref());
}

pub(crate) fn logw(message: impl AsRef<str>) {
    logv("WARN", message.as_ref());
}
