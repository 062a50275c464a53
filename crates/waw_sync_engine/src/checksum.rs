//! SHA-256 content hashing of files and streams.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use waw_sync_protocol::ContentHash;

/// Read buffer size used when hashing and streaming.
pub(crate) const CHUNK_SIZE: usize = 8 * 1024;

/// Hashes everything `reader` yields until EOF.
pub fn sha256_reader<R: Read>(mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(ContentHash::from_digest(hasher.finalize().into()))
}

/// Hashes the file at `path`.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn sha256_file(path: &Path) -> io::Result<Option<ContentHash>> {
    match File::open(path) {
        Ok(file) => sha256_reader(file).map(Some),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}
