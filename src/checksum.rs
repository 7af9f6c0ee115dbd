use sha1::{Digest, Sha1};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Files are streamed through the digest in chunks of this size.
const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
    #[error("File modified during checksumming: {0}")]
    ConcurrentModification(PathBuf),
}

pub struct FileChecksum {
    /// Lowercase hex.
    pub sha1: String,
    /// File size in bytes, as observed after checksumming.
    pub size: u64,
}

/// Computes the SHA-1 checksum of a file with concurrent modification detection.
///
/// `on_progress` is called with the number of bytes consumed after every chunk.
///
/// # Behavior
/// - Records the file's modification time before reading
/// - Reads the file in fixed-size chunks, so memory use does not depend on file size
/// - Verifies the modification time hasn't changed after reading
///
/// # Errors
/// - `ChecksumError::Io`: File doesn't exist or other I/O errors
/// - `ChecksumError::PermissionDenied`: Insufficient permissions to read the file
/// - `ChecksumError::ConcurrentModification`: File was detected as being modified while
///   checksumming. The absence of this error is *not* a guarantee that the file was
///   *not* modified.
pub fn checksum_file(
    path: &Path,
    on_progress: &mut dyn FnMut(u64),
) -> Result<FileChecksum, ChecksumError> {
    debug!("Checksumming {}", path.display());

    let mtime_before = std::fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| map_io(e, path))?;

    let mut file = File::open(path).map_err(|e| map_io(e, path))?;
    let mut hasher = Sha1::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(ChecksumError::Io)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
        on_progress(bytes_read as u64);
    }

    let metadata_after = std::fs::metadata(path).map_err(ChecksumError::Io)?;
    let mtime_after = metadata_after.modified().map_err(ChecksumError::Io)?;

    if mtime_before != mtime_after {
        return Err(ChecksumError::ConcurrentModification(path.to_path_buf()));
    }

    let sha1 = format!("{:x}", hasher.finalize());

    debug!("Checksum of {} is {}", path.display(), sha1);

    Ok(FileChecksum {
        sha1,
        size: metadata_after.len(),
    })
}

fn map_io(e: std::io::Error, path: &Path) -> ChecksumError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        ChecksumError::PermissionDenied(path.to_path_buf())
    } else {
        ChecksumError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn checksum(path: &Path) -> Result<FileChecksum, ChecksumError> {
        checksum_file(path, &mut |_| {})
    }

    #[test]
    fn test_checksum_simple_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"hi").unwrap();
        temp_file.flush().unwrap();

        let result = checksum(temp_file.path()).unwrap();

        assert_eq!(result.sha1, "c22b5f9178342609428d6f51b2c5af4c0bde6a42");
        assert_eq!(result.size, 2);
    }

    #[test]
    fn test_checksum_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();

        let result = checksum(temp_file.path()).unwrap();

        assert_eq!(result.sha1, "da39a3ee5e6b4b0d3255bfef95601890afd80709");
        assert_eq!(result.size, 0);
    }

    #[test]
    fn test_checksum_reports_progress_per_chunk() {
        let mut temp_file = NamedTempFile::new().unwrap();
        let content = vec![b'A'; CHUNK_SIZE * 2 + 10];
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let mut calls = Vec::new();
        let result = checksum_file(temp_file.path(), &mut |n| calls.push(n)).unwrap();

        assert_eq!(result.sha1.len(), 40);
        assert_eq!(calls.iter().sum::<u64>(), content.len() as u64);
        assert!(calls.iter().all(|&n| n <= CHUNK_SIZE as u64));
        assert!(calls.len() >= 3);
    }

    #[test]
    fn test_checksum_nonexistent_file() {
        let result = checksum(Path::new("/nonexistent/file.txt"));

        match result {
            Err(ChecksumError::Io(_)) => {}
            _ => panic!("Expected IO error for nonexistent file"),
        }
    }

    #[test]
    fn test_checksum_deterministic() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        let result1 = checksum(temp_file.path()).unwrap();
        let result2 = checksum(temp_file.path()).unwrap();

        assert_eq!(result1.sha1, result2.sha1);
    }

    #[test]
    #[cfg(unix)]
    fn test_checksum_permission_denied() {
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        // Root bypasses permission bits.
        if nix::unistd::geteuid().is_root() {
            return;
        }

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"test content").unwrap();
        temp_file.flush().unwrap();

        fs::set_permissions(temp_file.path(), fs::Permissions::from_mode(0o000)).unwrap();

        match checksum(temp_file.path()) {
            Err(ChecksumError::PermissionDenied(_)) => {}
            _ => panic!("Expected PermissionDenied error for permission denied"),
        }
    }

    #[test]
    fn test_checksum_concurrent_modification() {
        // Racing a background thread that keeps bumping the mtime against the
        // checksum. With a 5MB file and 100 attempts a miss is extremely unlikely.
        use filetime::{FileTime, set_file_mtime};
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        let mut temp_file = NamedTempFile::new().unwrap();
        let content = vec![b'X'; 5 * 1024 * 1024];
        temp_file.write_all(&content).unwrap();
        temp_file.flush().unwrap();

        let path = temp_file.path().to_path_buf();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let stop_flag_clone = stop_flag.clone();

        let modifier_handle = thread::spawn(move || {
            let mut counter = 0u64;
            while !stop_flag_clone.load(Ordering::Relaxed) {
                counter = counter.wrapping_add(1);
                let mtime = FileTime::from_unix_time(1_000_000_000 + (counter as i64), 0);
                let _ = set_file_mtime(&path, mtime);
            }
        });

        let mut got_concurrent_modification = false;
        for _ in 0..100 {
            match checksum(temp_file.path()) {
                Err(ChecksumError::ConcurrentModification(_)) => {
                    got_concurrent_modification = true;
                    break;
                }
                Ok(_) => {
                    thread::sleep(Duration::from_millis(1));
                }
                Err(e) => panic!("Unexpected error: {}", e),
            }
        }

        stop_flag.store(true, Ordering::Relaxed);
        modifier_handle.join().unwrap();

        assert!(
            got_concurrent_modification,
            "Expected to detect concurrent modification at least once in 100 attempts"
        );
    }
}
