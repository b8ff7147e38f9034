//! Memory-mapped statistics regions shared between a writer process and this
//! monitoring process.
//!
//! A [`MappedRegion`] attaches to a pre-existing, fixed-length file and exposes
//! scalar field accessors with release-store / acquire-load semantics. There is
//! no locking anywhere in this module: every field has exactly one writer, and
//! the ordering discipline of the accessors is the whole safety story. Readers
//! may observe snapshots that are torn across fields, but never within one.

mod error;

pub use error::{Error, Result};

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};

/// A releasable monitoring resource. `close` must be idempotent.
pub trait Closeable {
    fn close(&mut self) -> Result<()>;
}

/// Closes every resource, attempting each one even when earlier closes fail,
/// and returns every failure. The caller reports the aggregate.
pub fn close_all<'a>(resources: impl IntoIterator<Item = &'a mut dyn Closeable>) -> Vec<Error> {
    let mut failures = Vec::new();
    for resource in resources {
        if let Err(err) = resource.close() {
            failures.push(err);
        }
    }
    failures
}

/// A fixed-length span of a memory-mapped file.
///
/// Attaches only to files that already exist with the agreed length; region
/// sizes are a bit-exact contract between writer and reader, so there is no
/// negotiation and no resizing. The mapping is released on [`close`] or drop,
/// whichever comes first.
///
/// [`close`]: MappedRegion::close
pub struct MappedRegion {
    map: Option<MmapMut>,
    path: PathBuf,
    len: usize,
}

impl MappedRegion {
    /// Attaches to the entire file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Missing`] if the file does not exist and
    /// [`Error::SizeMismatch`] if its length is not exactly `expected_len`.
    pub fn attach(path: impl AsRef<Path>, expected_len: usize) -> Result<Self> {
        let path = path.as_ref();
        let actual = file_len(path)?;
        if actual != expected_len as u64 {
            return Err(Error::SizeMismatch {
                path: path.to_path_buf(),
                expected: expected_len as u64,
                actual,
            });
        }
        Self::map_range(path, 0, expected_len)
    }

    /// Attaches to `len` bytes of the file at `path`, starting at byte
    /// `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Missing`] if the file does not exist and
    /// [`Error::Undersized`] if it is shorter than `offset + len`.
    pub fn attach_at(path: impl AsRef<Path>, offset: usize, len: usize) -> Result<Self> {
        let path = path.as_ref();
        let required = (offset + len) as u64;
        let actual = file_len(path)?;
        if actual < required {
            return Err(Error::Undersized {
                path: path.to_path_buf(),
                required,
                actual,
            });
        }
        Self::map_range(path, offset, len)
    }

    fn map_range(path: &Path, offset: usize, len: usize) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        // Safety: the map is backed by a regular file opened read-write; all
        // concurrent access goes through the atomic accessors below.
        let map = unsafe { MmapOptions::new().offset(offset as u64).len(len).map_mut(&file) }
            .map_err(|source| Error::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            map: Some(map),
            path: path.to_path_buf(),
            len,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Acquire-loads the 8-byte field at `offset`.
    pub fn get_u64(&self, offset: usize) -> u64 {
        self.atomic_u64(offset).load(Ordering::Acquire)
    }

    /// Release-stores `value` into the 8-byte field at `offset`.
    ///
    /// All writes performed by this process before the store are visible to a
    /// reader no later than the stored value.
    pub fn put_u64(&self, offset: usize, value: u64) {
        self.atomic_u64(offset).store(value, Ordering::Release);
    }

    /// Acquire-loads the 4-byte field at `offset`.
    pub fn get_u32(&self, offset: usize) -> u32 {
        self.atomic_u32(offset).load(Ordering::Acquire)
    }

    /// Release-stores `value` into the 4-byte field at `offset`.
    pub fn put_u32(&self, offset: usize, value: u32) {
        self.atomic_u32(offset).store(value, Ordering::Release);
    }

    /// Copies `out.len()` bytes starting at `offset` into `out`.
    ///
    /// Plain (non-atomic) copy; callers establish visibility through a
    /// preceding acquire load of a length or generation field.
    pub fn read_bytes(&self, offset: usize, out: &mut [u8]) {
        let map = self.mapped();
        assert!(
            offset + out.len() <= self.len,
            "byte range {offset}..{} out of bounds for region of {} bytes",
            offset + out.len(),
            self.len
        );
        out.copy_from_slice(&map[offset..offset + out.len()]);
    }

    /// Copies `data` into the region starting at `offset`. Plain write, used
    /// for variable-length payloads whose visibility is published afterwards
    /// through an ordered length store.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) {
        let len = self.len;
        assert!(
            offset + data.len() <= len,
            "byte range {offset}..{} out of bounds for region of {len} bytes",
            offset + data.len(),
        );
        let map = self.map.as_mut().expect("region is mapped");
        map[offset..offset + data.len()].copy_from_slice(data);
    }

    /// Flushes and unmaps the region.
    ///
    /// Idempotent: a second call is a no-op. The mapping is released exactly
    /// once even when the flush fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Flush`] if flushing dirty pages back to the file
    /// fails.
    pub fn close(&mut self) -> Result<()> {
        if let Some(map) = self.map.take() {
            map.flush().map_err(|source| Error::Flush {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    fn atomic_u64(&self, offset: usize) -> &AtomicU64 {
        let map = self.mapped();
        assert!(
            offset % 8 == 0 && offset + 8 <= self.len,
            "misaligned or out-of-bounds u64 field at offset {offset}"
        );
        // Safety: in bounds, 8-byte aligned (the map base is page aligned),
        // and the backing memory is writable.
        unsafe { &*(map.as_ptr().add(offset) as *const AtomicU64) }
    }

    fn atomic_u32(&self, offset: usize) -> &AtomicU32 {
        let map = self.mapped();
        assert!(
            offset % 4 == 0 && offset + 4 <= self.len,
            "misaligned or out-of-bounds u32 field at offset {offset}"
        );
        // Safety: see `atomic_u64`.
        unsafe { &*(map.as_ptr().add(offset) as *const AtomicU32) }
    }

    fn mapped(&self) -> &MmapMut {
        self.map.as_ref().expect("region is mapped")
    }
}

impl Closeable for MappedRegion {
    fn close(&mut self) -> Result<()> {
        MappedRegion::close(self)
    }
}

impl std::fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedRegion")
            .field("path", &self.path)
            .field("len", &self.len)
            .field("mapped", &self.map.is_some())
            .finish()
    }
}

fn file_len(path: &Path) -> Result<u64> {
    match std::fs::metadata(path) {
        Ok(metadata) => Ok(metadata.len()),
        Err(source) if source.kind() == std::io::ErrorKind::NotFound => Err(Error::Missing {
            path: path.to_path_buf(),
        }),
        Err(source) => Err(Error::Open {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region_file(dir: &tempfile::TempDir, name: &str, len: usize) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, vec![0u8; len]).expect("failed to create region file");
        path
    }

    #[test]
    fn test_attach_missing_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let result = MappedRegion::attach(dir.path().join("missing.data"), 64);
        assert!(matches!(result, Err(Error::Missing { .. })));
    }

    #[test]
    fn test_attach_rejects_wrong_length() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "short.data", 32);
        let result = MappedRegion::attach(&path, 64);
        match result {
            Err(Error::SizeMismatch {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 64);
                assert_eq!(actual, 32);
            }
            other => panic!("expected size mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_attach_at_rejects_undersized_file() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "short.data", 100);
        let result = MappedRegion::attach_at(&path, 64, 64);
        assert!(matches!(result, Err(Error::Undersized { .. })));
    }

    #[test]
    fn test_field_round_trip() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "stats.data", 64);
        let region = MappedRegion::attach(&path, 64).expect("attach failed");
        region.put_u64(0, 42);
        region.put_u32(8, 7);
        assert_eq!(region.get_u64(0), 42);
        assert_eq!(region.get_u32(8), 7);
    }

    #[test]
    fn test_two_mappings_of_one_file_are_coherent() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "stats.data", 64);
        let writer = MappedRegion::attach(&path, 64).expect("attach failed");
        let reader = MappedRegion::attach(&path, 64).expect("attach failed");
        writer.put_u64(16, 99);
        assert_eq!(reader.get_u64(16), 99);
    }

    #[test]
    fn test_attach_at_sub_range() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "stats.data", 256);
        let whole = MappedRegion::attach(&path, 256).expect("attach failed");
        let tail = MappedRegion::attach_at(&path, 128, 128).expect("attach_at failed");
        tail.put_u64(0, 5);
        assert_eq!(whole.get_u64(128), 5);
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "stats.data", 64);
        let mut region = MappedRegion::attach(&path, 64).expect("attach failed");
        region.close().expect("first close failed");
        region.close().expect("second close should be a no-op");
    }

    struct StubResource {
        fail: bool,
        close_count: usize,
    }

    impl Closeable for StubResource {
        fn close(&mut self) -> Result<()> {
            self.close_count += 1;
            if self.fail {
                Err(Error::Flush {
                    path: PathBuf::from("stub"),
                    source: std::io::Error::other("flush failed"),
                })
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_close_all_attempts_every_resource_after_a_failure() {
        let mut first = StubResource {
            fail: false,
            close_count: 0,
        };
        let mut second = StubResource {
            fail: true,
            close_count: 0,
        };
        let mut third = StubResource {
            fail: false,
            close_count: 0,
        };
        let failures = close_all([
            &mut first as &mut dyn Closeable,
            &mut second,
            &mut third,
        ]);
        assert_eq!(failures.len(), 1);
        assert_eq!(first.close_count, 1);
        assert_eq!(second.close_count, 1);
        assert_eq!(third.close_count, 1);
    }

    #[test]
    fn test_close_all_collects_every_failure() {
        let mut first = StubResource {
            fail: true,
            close_count: 0,
        };
        let mut second = StubResource {
            fail: true,
            close_count: 0,
        };
        let failures = close_all([&mut first as &mut dyn Closeable, &mut second]);
        assert_eq!(failures.len(), 2);
    }

    #[test]
    fn test_byte_copies() {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let path = region_file(&dir, "stats.data", 64);
        let mut region = MappedRegion::attach(&path, 64).expect("attach failed");
        region.write_bytes(8, b"hello");
        let mut out = [0u8; 5];
        region.read_bytes(8, &mut out);
        assert_eq!(&out, b"hello");
    }
}
