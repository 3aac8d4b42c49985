//! Input discovery: files pass through, directories are walked for MIDI files.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

fn is_midi(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("mid") || ext.eq_ignore_ascii_case("midi"))
}

/// Expand `inputs` into MIDI files. Each directory's files come out sorted by
/// path; inputs keep their command-line order.
pub fn discover(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = Vec::new();
            for entry in WalkDir::new(input) {
                let entry = entry.with_context(|| format!("walking {}", input.display()))?;
                if entry.file_type().is_file() && is_midi(entry.path()) {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            debug!(dir = %input.display(), files = found.len(), "scanned directory");
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            bail!("source not found: {}", input.display());
        }
    }

    if files.is_empty() {
        bail!("no .mid or .midi files found in the given sources");
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"").unwrap();
    }

    #[test]
    fn walks_directories_sorted() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("b.mid"));
        touch(&dir.path().join("nested/a.MIDI"));
        touch(&dir.path().join("a.mid"));
        touch(&dir.path().join("notes.txt"));

        let files = discover(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.mid"),
                PathBuf::from("b.mid"),
                PathBuf::from("nested/a.MIDI"),
            ]
        );
    }

    #[test]
    fn explicit_files_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("piece.bin");
        touch(&file);
        assert_eq!(discover(&[file.clone()]).unwrap(), vec![file]);
    }

    #[test]
    fn missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&[dir.path().join("absent.mid")]).is_err());
    }

    #[test]
    fn empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover(&[dir.path().to_path_buf()]).unwrap_err();
        assert!(err.to_string().contains("no .mid"));
    }
}
