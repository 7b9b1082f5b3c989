//! Terminal control panel plus an on-disk frame window.
//!
//! Text goes to the terminal; annotated pictures and webcam frames are
//! written into the display directory for an external viewer.

use facegate_core::Identity;
use image::RgbImage;
use std::io::Write;
use std::path::{Path, PathBuf};

/// File the webcam loop overwrites with every frame.
pub const LIVE_FRAME_FILE: &str = "latest.jpg";

pub struct Panel<W: Write> {
    out: W,
    display_dir: PathBuf,
    shown: Option<Identity>,
}

impl Panel<std::io::Stdout> {
    pub fn stdout(display_dir: impl Into<PathBuf>) -> Self {
        Self::new(std::io::stdout(), display_dir)
    }
}

impl<W: Write> Panel<W> {
    pub fn new(out: W, display_dir: impl Into<PathBuf>) -> Self {
        Self { out, display_dir: display_dir.into(), shown: None }
    }

    fn line(&mut self, text: std::fmt::Arguments<'_>) {
        // A closed stdout must not take the kiosk down.
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!(error = %e, "panel write failed");
        }
    }

    pub fn title(&mut self, text: &str) {
        self.line(format_args!("\n== {text} =="));
    }

    pub fn info(&mut self, text: &str) {
        self.line(format_args!("  {text}"));
    }

    pub fn success(&mut self, text: &str) {
        self.line(format_args!("  [ok] {text}"));
    }

    pub fn error(&mut self, text: &str) {
        self.line(format_args!("  [error] {text}"));
    }

    /// Print the identity block when it differs from what is on screen.
    /// Returns whether anything was printed.
    pub fn show_identity(&mut self, identity: &Identity) -> bool {
        if self.shown.as_ref() == Some(identity) {
            return false;
        }
        self.line(format_args!("  Name: {}", identity.name));
        self.line(format_args!("  ID: {}", identity.id));
        self.shown = Some(identity.clone());
        true
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    /// Write `image` into the display directory as `file_name`.
    pub fn show_image(&mut self, image: &RgbImage, file_name: &str) -> Result<PathBuf, image::ImageError> {
        std::fs::create_dir_all(&self.display_dir).map_err(image::ImageError::IoError)?;
        let path = self.display_dir.join(file_name);
        image.save(&path)?;
        tracing::trace!(path = %path.display(), "frame written");
        Ok(path)
    }
}

/// Display file name for an annotated input picture: `<stem>.annotated.png`.
pub fn annotated_name(picture: &Path) -> String {
    let stem = picture
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "picture".to_string());
    format!("{stem}.annotated.png")
}
