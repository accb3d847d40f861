//! Infrastructure implementation of the `ConfigFileReader` port.

use std::path::Path;

use crate::application::ports::ConfigFileReader;

/// Reads configuration files from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsConfigReader;

impl ConfigFileReader for FsConfigReader {
    fn read_to_string(&self, path: &Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}
