//! File persistence for message blocks
//!
//! Blocks travel to and from disk in their hex transport form. This is a
//! thin wrapper: the core codec never touches the filesystem.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::protocol::{MessageBlock, Result};

/// Write a block's hex transport form to `path`, creating parent directories
/// as needed
///
/// # Errors
///
/// Returns a validation error if the block is structurally broken (nothing
/// is written), or [`Error::Io`](crate::Error::Io) on filesystem failure.
pub fn export(block: &MessageBlock, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let text = block.to_hex()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, &text)?;
    debug!(id = block.id(), path = %path.display(), bytes = text.len(), "exported block");
    Ok(())
}

/// Read a block back from the hex transport form stored at `path`
pub fn import(path: impl AsRef<Path>) -> Result<MessageBlock> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    let block = MessageBlock::from_hex(&text)?;
    debug!(id = block.id(), path = %path.display(), "imported block");
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Value;

    #[test]
    fn test_export_import_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.hex");

        let mut block = MessageBlock::new();
        block.set("name", "disk").unwrap();
        export(&block, &path).unwrap();

        let restored = import(&path).unwrap();
        assert_eq!(restored, block);
        assert_eq!(restored.get("name"), Value::text("disk"));
    }

    #[test]
    fn test_export_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deeply/nested/dirs/block.hex");

        export(&MessageBlock::new(), &path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_exported_text_is_hex() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("block.hex");

        export(&MessageBlock::new(), &path).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(!text.is_empty());
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_import_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = import(dir.path().join("absent.hex"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }

    #[test]
    fn test_import_garbage_is_hex_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage");
        fs::write(&path, "not hex at all").unwrap();
        assert!(matches!(import(&path), Err(crate::Error::InvalidHex(_))));
    }
}
