//! Sampled BLAKE3 content fingerprints.
//!
//! # Overview
//!
//! A fingerprint is a cheap equality proxy for file content. Small files are
//! hashed in full. Large files are hashed from a leading and a trailing
//! sample only, which bounds I/O to `2 * sample_size` bytes per file:
//!
//! ```text
//! size <= 2 * sample  ->  H(content)
//! size >  2 * sample  ->  H(hex(H(head)) || tail)
//! ```
//!
//! Two large files with identical head and tail but a different middle
//! collide. That risk is accepted in exchange for not reading multi-gigabyte
//! videos end to end.
//!
//! # Example
//!
//! ```no_run
//! use dupsort::scanner::{Hasher, DEDUPE_SAMPLE_SIZE};
//! use std::path::Path;
//!
//! let hasher = Hasher::new(DEDUPE_SAMPLE_SIZE);
//! let path = Path::new("photo.jpg");
//! let size = std::fs::metadata(path).unwrap().len();
//! let fp = hasher.fingerprint(path, size).unwrap();
//! println!("{}", dupsort::scanner::hash_to_hex(&fp));
//! ```

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::HashError;

/// A 32-byte content fingerprint.
pub type Hash = [u8; 32];

/// Sample size used when relocating files (2 MiB).
pub const MOVE_SAMPLE_SIZE: u64 = 2 * 1024 * 1024;

/// Sample size used when looking for duplicates (10 MiB).
pub const DEDUPE_SAMPLE_SIZE: u64 = 10 * 1024 * 1024;

/// Read buffer size for streaming.
const BUFFER_SIZE: usize = 64 * 1024;

/// Computes sampled fingerprints.
#[derive(Debug, Clone)]
pub struct Hasher {
    sample_size: u64,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Hasher {
    /// Create a hasher with the given sample size.
    ///
    /// A sample size of zero is bumped to one byte so that every non-empty
    /// file still has a head and a tail.
    #[must_use]
    pub fn new(sample_size: u64) -> Self {
        Self {
            sample_size: sample_size.max(1),
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag. Reads stop at the next buffer boundary once set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// The configured sample size in bytes.
    #[must_use]
    pub fn sample_size(&self) -> u64 {
        self.sample_size
    }

    /// Whether a file of `size` bytes is hashed in full.
    #[must_use]
    pub fn hashes_whole_file(&self, size: u64) -> bool {
        size <= self.sample_size.saturating_mul(2)
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Fingerprint the file at `path`, whose size was observed as `size`.
    ///
    /// # Errors
    ///
    /// Returns [`HashError`] if the file cannot be opened or read, or
    /// [`HashError::Interrupted`] if shutdown was requested mid-read.
    pub fn fingerprint(&self, path: &Path, size: u64) -> Result<Hash, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;

        if self.hashes_whole_file(size) {
            let mut hasher = blake3::Hasher::new();
            self.stream_into(&mut file, &mut hasher, u64::MAX, path)?;
            return Ok(*hasher.finalize().as_bytes());
        }

        let mut head = blake3::Hasher::new();
        self.stream_into(&mut file, &mut head, self.sample_size, path)?;
        let head_hex = head.finalize().to_hex();

        file.seek(SeekFrom::Start(size - self.sample_size))
            .map_err(|e| HashError::from_io(path, e))?;

        let mut outer = blake3::Hasher::new();
        outer.update(head_hex.as_bytes());
        let read = self.stream_into(&mut file, &mut outer, self.sample_size, path)?;
        if read < self.sample_size {
            // The file shrank after it was measured.
            return Err(HashError::from_io(
                path,
                io::Error::new(io::ErrorKind::UnexpectedEof, "file truncated during read"),
            ));
        }

        Ok(*outer.finalize().as_bytes())
    }

    /// Feed up to `limit` bytes from `reader` into `hasher`. Returns the byte count.
    fn stream_into<R: Read>(
        &self,
        reader: &mut R,
        hasher: &mut blake3::Hasher,
        limit: u64,
        path: &Path,
    ) -> Result<u64, HashError> {
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut total = 0u64;

        while total < limit {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }
            let want = (limit - total).min(BUFFER_SIZE as u64) as usize;
            let n = match reader.read(&mut buffer[..want]) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
            total += n as u64;
        }

        Ok(total)
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new(DEDUPE_SAMPLE_SIZE)
    }
}

/// Render a fingerprint as lowercase hex.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    use std::fmt::Write;
    hash.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

/// Parse a 64-character hex string back into a fingerprint.
#[must_use]
pub fn hex_to_hash(hex: &str) -> Option<Hash> {
    if hex.len() != 64 || !hex.is_ascii() {
        return None;
    }
    let mut hash = [0u8; 32];
    for (i, byte) in hash.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(hash)
}
