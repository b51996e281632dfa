use anyhow::{anyhow, Context, Result};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub const GZIP_SUFFIX: &str = ".gz";

/// Decompress `archive` into its sibling path without the `.gz` suffix.
/// Output is staged in a temp file and renamed into place, so a failure
/// leaves the archive and any existing sibling untouched.
pub fn decompress_gzip(archive: &Path) -> Result<PathBuf> {
    let target = strip_gzip_suffix(archive)
        .ok_or_else(|| anyhow!("{} does not end in {GZIP_SUFFIX}", archive.display()))?;
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let input = File::open(archive).with_context(|| format!("open {}", archive.display()))?;
    let mut decoder = GzDecoder::new(input);
    let mut staged = NamedTempFile::new_in(parent)
        .with_context(|| format!("create temp file in {}", parent.display()))?;
    let bytes = io::copy(&mut decoder, staged.as_file_mut())
        .with_context(|| format!("decompress {}", archive.display()))?;
    staged
        .persist(&target)
        .with_context(|| format!("publish {}", target.display()))?;

    tracing::debug!(archive = %archive.display(), bytes, "decompressed");
    Ok(target)
}

fn strip_gzip_suffix(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(GZIP_SUFFIX).filter(|stem| !stem.is_empty())?;
    Some(path.with_file_name(stem))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;

    #[test]
    fn decompresses_next_to_the_archive() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let archive = dir.path().join("api.log.1.gz");
        let payload = b"2026-10-16 11:42:00 heat-target=38\n".repeat(50);
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&payload).expect("compress");
        fs::write(&archive, encoder.finish().expect("finish")).expect("write archive");

        let out = decompress_gzip(&archive).expect("decompress");
        assert_eq!(out, dir.path().join("api.log.1"));
        assert_eq!(fs::read(&out).expect("read"), payload);
        assert!(archive.exists());
    }

    #[test]
    fn corrupt_archive_is_kept_without_output() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let archive = dir.path().join("state.json.gz");
        fs::write(&archive, b"not gzip at all").expect("write archive");

        assert!(decompress_gzip(&archive).is_err());
        assert!(archive.exists());
        assert!(!dir.path().join("state.json").exists());
    }

    #[test]
    fn corrupt_archive_keeps_an_existing_sibling() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let plain = dir.path().join("state.json");
        let archive = dir.path().join("state.json.gz");
        fs::write(&plain, b"{\"target\":38.5}").expect("write plain");
        fs::write(&archive, b"\x1f\x8b truncated").expect("write archive");

        assert!(decompress_gzip(&archive).is_err());
        assert_eq!(fs::read(&plain).expect("plain survives"), b"{\"target\":38.5}");
        let leftovers = fs::read_dir(dir.path()).expect("read dir").count();
        assert_eq!(leftovers, 2);
    }

    #[test]
    fn suffix_handling() {
        assert_eq!(
            strip_gzip_suffix(Path::new("/x/a.tar.gz")),
            Some(PathBuf::from("/x/a.tar"))
        );
        assert_eq!(strip_gzip_suffix(Path::new("/x/.gz")), None);
        assert_eq!(strip_gzip_suffix(Path::new("/x/a.log")), None);
    }
}
