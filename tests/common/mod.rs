#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use csv_recon::{Table, io_utils};
use tempfile::{TempDir, tempdir};

/// Returns the absolute path to a fixture under `tests/data`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("data")
        .join(name)
}

/// Parses headered, comma-separated UTF-8 text into a [`Table`].
pub fn table(csv_text: &str) -> Table {
    let mut reader = io_utils::open_csv_reader(csv_text.as_bytes(), b',');
    io_utils::read_table(&mut reader, encoding_rs::UTF_8).expect("parse csv fixture")
}

pub fn load_fixture(name: &str) -> Table {
    let path = fixture_path(name);
    let delimiter = io_utils::resolve_input_delimiter(&path, None);
    io_utils::load_table(&path, delimiter, Some(encoding_rs::UTF_8)).expect("load fixture")
}

/// Scratch directory that removes its files on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, contents).expect("write temp file bytes");
        path
    }
}
