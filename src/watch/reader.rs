use crate::diff::LineSequence;
use crate::hunk::BufferEditor;
use std::io::ErrorKind;
use std::path::Path;

/// Reads the authoritative content of a watched document.
pub trait DocumentReader {
    /// `None` when the document does not exist or cannot be read.
    fn read(&self, path: &Path) -> Option<LineSequence>;
}

/// Reads files from disk, decoding invalid UTF-8 lossily.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsReader;

impl DocumentReader for FsReader {
    fn read(&self, path: &Path) -> Option<LineSequence> {
        match std::fs::read(path) {
            Ok(bytes) => Some(
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .map(String::from)
                    .collect(),
            ),
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    log::warn!("Failed to read {}: {}", path.display(), e);
                }
                None
            }
        }
    }
}

impl DocumentReader for BufferEditor {
    fn read(&self, path: &Path) -> Option<LineSequence> {
        self.lines(path).map(<[String]>::to_vec)
    }
}
