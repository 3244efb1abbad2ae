//! Streaming content hashing for sync comparisons.

use std::io;
use std::path::Path;

use md5::{Digest, Md5};
use tokio::fs;
use tokio::io::AsyncReadExt;

/// Chunk size for streaming reads.
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Compute the MD5 digest of a file as a lowercase hex string, reading
/// in fixed-size chunks so large files never load whole.
pub async fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path).await?;
    let mut hasher = Md5::new();
    let mut buffer = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Digest of an in-memory buffer, hex-encoded like [`hash_file`].
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}
