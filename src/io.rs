//! File dialogs and background codec I/O.
//!
//! Decode and encode can be slow on large files, so both run on worker
//! threads and report back over mpsc channels the app polls each frame.
//! Loads carry a generation number: when the user opens another file while a
//! decode is still in flight, the later load wins and the stale result is
//! dropped. Saves receive a by-value snapshot of the pixels, so the user can
//! keep editing while the encoder runs.

use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

use rfd::FileDialog;

use crate::raster::{RasterBuffer, RasterError, SaveFormat};

/// Result of a background image load.
pub struct LoadOutcome {
    /// Generation the load was started with; stale generations are discarded.
    pub generation: u64,
    pub path: PathBuf,
    pub result: Result<RasterBuffer, RasterError>,
}

/// Result of a background image save.
pub struct SaveOutcome {
    pub path: PathBuf,
    pub result: Result<(), RasterError>,
}

/// Native open dialog. `None` means the user cancelled — the operation is
/// simply abandoned, not an error.
pub fn pick_open_path() -> Option<PathBuf> {
    FileDialog::new()
        .add_filter("Images", &["png", "jpg", "jpeg", "bmp", "webp"])
        .add_filter("All Files", &["*"])
        .pick_file()
}

/// Native save dialog, suggesting `result.png` like a fresh export.
pub fn pick_save_path() -> Option<PathBuf> {
    FileDialog::new()
        .set_file_name("result.png")
        .add_filter("PNG", &["png"])
        .add_filter("JPEG", &["jpg", "jpeg"])
        .add_filter("BMP", &["bmp"])
        .save_file()
}

/// Read and decode an image file synchronously.
pub fn load_image(path: &Path) -> Result<RasterBuffer, RasterError> {
    let bytes = std::fs::read(path)?;
    RasterBuffer::decode(&bytes)
}

/// Decode `path` on a worker thread and deliver the outcome on `tx`.
pub fn start_load(path: PathBuf, generation: u64, tx: Sender<LoadOutcome>) {
    thread::spawn(move || {
        let result = load_image(&path);
        // Receiver may be gone if the app shut down mid-load
        let _ = tx.send(LoadOutcome {
            generation,
            path,
            result,
        });
    });
}

/// Encode `snapshot` to `path` on a worker thread. The snapshot is an owned
/// copy taken before the handoff, so concurrent edits cannot tear the file.
pub fn start_save(snapshot: RasterBuffer, path: PathBuf, format: SaveFormat, tx: Sender<SaveOutcome>) {
    thread::spawn(move || {
        let result = snapshot.save_to(&path, format);
        let _ = tx.send(SaveOutcome { path, result });
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn load_reports_io_error_for_missing_file() {
        let result = load_image(Path::new("/definitely/not/here.png"));
        assert!(matches!(result, Err(RasterError::Io(_))));
    }

    #[test]
    fn stale_load_generations_can_be_told_apart() {
        let (tx, rx) = mpsc::channel();
        start_load(PathBuf::from("/nope/a.png"), 1, tx.clone());
        start_load(PathBuf::from("/nope/b.png"), 2, tx);
        let first = rx.recv().unwrap();
        let second = rx.recv().unwrap();
        let mut generations = [first.generation, second.generation];
        generations.sort_unstable();
        assert_eq!(generations, [1, 2]);
    }

    #[test]
    fn background_save_round_trips() {
        let buf = RasterBuffer::new(8, 8, image::Rgba([10, 20, 30, 255]));
        let path = std::env::temp_dir().join(format!("picview_io_{}.png", std::process::id()));
        let (tx, rx) = mpsc::channel();
        start_save(buf.clone(), path.clone(), SaveFormat::Png, tx);
        let outcome = rx.recv().unwrap();
        assert!(outcome.result.is_ok());
        let reloaded = load_image(&path).unwrap();
        assert_eq!(reloaded.as_rgba().as_raw(), buf.as_rgba().as_raw());
        let _ = std::fs::remove_file(&path);
    }
}
