use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::env;

use tempfile::NamedTempFile;

/// Reads a whole text file into memory.
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<String> {
	fs::read_to_string(filename)
}

/// Writes `contents` to `path` atomically.
///
/// - Creates the parent directory when missing
/// - Writes into a temporary file next to the target, then renames it
///
/// A crash mid-write leaves the previous file intact.
pub(crate) fn write_atomic<P: AsRef<Path>>(path: P, contents: &[u8]) -> io::Result<()> {
	let path = path.as_ref();
	let parent = match path.parent() {
		Some(p) if !p.as_os_str().is_empty() => p,
		_ => Path::new("."),
	};
	fs::create_dir_all(parent)?;

	let mut temp_file = NamedTempFile::new_in(parent)?;
	temp_file.write_all(contents)?;
	temp_file.flush()?;
	temp_file.persist(path).map_err(|e| e.error)?;
	Ok(())
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/quotations.json"` → `"quotations"`
/// - `"quotations.json"` → `"quotations"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory, sorted by name.
///
/// Returns file names only (no paths).
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}
