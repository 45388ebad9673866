//! Local artifact cache
//!
//! Stores build outputs and their metadata (logs and the like) as plain
//! files, addressed by the identity of what produced them:
//!
//! | Blob | Path |
//! |------|------|
//! | Artifact | `<root>/<digest>.<artifact name>` |
//! | Artifact metadata | `<root>/meta/<digest>.<label>` |
//! | Source metadata | `<root>/meta/<digest>.<label>` |
//!
//! Each digest is a SHA-256 over the length-prefixed identity fields and a
//! per-namespace tag, so artifacts that differ only in name or cache key get
//! separate files and metadata never lands on an artifact's path.
//!
//! Writes go to a temporary file next to the destination and are renamed
//! into place on `commit`, so `has` and `get` never see partial content.
//! Storing under an existing identity replaces the previous blob.

use crate::error::{MorphError, MorphResult};
use crate::escape::escape_url;
use crate::model::{Artifact, Source};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::debug;

const META_DIR: &str = "meta";
const PARTIAL_PREFIX: &str = ".tmp-";
/// Longest name or label kept in a file name; the digest already covers
/// the whole string, this only keeps names under NAME_MAX
const MAX_SUFFIX_LEN: usize = 100;

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// What a stored file is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Artifact,
    Metadata,
    /// Left behind by a writer that never committed
    Partial,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Artifact => "artifact",
            Self::Metadata => "metadata",
            Self::Partial => "partial",
        };
        f.pad(s)
    }
}

/// One file in the cache
#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    pub path: PathBuf,
    pub kind: EntryKind,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Open write to one cache blob.
///
/// Nothing is visible under the final path until `commit`; dropping the
/// handle without committing discards what was written.
#[derive(Debug)]
pub struct WritableHandle {
    file: NamedTempFile,
    path: PathBuf,
}

impl WritableHandle {
    fn create(path: PathBuf) -> MorphResult<Self> {
        let dir = path
            .parent()
            .ok_or_else(|| MorphError::Internal(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)
            .map_err(|e| MorphError::io(format!("creating {}", dir.display()), e))?;

        let file = Builder::new()
            .prefix(PARTIAL_PREFIX)
            .tempfile_in(dir)
            .map_err(|e| MorphError::io(format!("creating temporary file in {}", dir.display()), e))?;
        Ok(Self { file, path })
    }

    /// Final location of the blob
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush to disk and move the blob into place
    pub fn commit(self) -> MorphResult<PathBuf> {
        let Self { mut file, path } = self;
        let context = || format!("committing {}", path.display());

        file.flush().map_err(|e| MorphError::io(context(), e))?;
        file.as_file()
            .sync_all()
            .map_err(|e| MorphError::io(context(), e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.as_file()
                .set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|e| MorphError::io(context(), e))?;
        }

        file.persist(&path)
            .map_err(|e| MorphError::io(context(), e.error))?;
        debug!("Stored {}", path.display());
        Ok(path)
    }
}

impl Write for WritableHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// File-per-blob artifact store under one root directory
#[derive(Debug, Clone)]
pub struct LocalArtifactCache {
    root: PathBuf,
}

impl LocalArtifactCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn put(&self, artifact: &Artifact) -> MorphResult<WritableHandle> {
        WritableHandle::create(self.artifact_path(artifact))
    }

    pub fn get(&self, artifact: &Artifact) -> MorphResult<File> {
        open("artifact", &self.artifact_path(artifact))
    }

    pub fn has(&self, artifact: &Artifact) -> bool {
        self.artifact_path(artifact).is_file()
    }

    pub fn put_artifact_metadata(
        &self,
        artifact: &Artifact,
        label: &str,
    ) -> MorphResult<WritableHandle> {
        WritableHandle::create(self.artifact_metadata_path(artifact, label))
    }

    pub fn get_artifact_metadata(&self, artifact: &Artifact, label: &str) -> MorphResult<File> {
        open(
            "artifact metadata",
            &self.artifact_metadata_path(artifact, label),
        )
    }

    pub fn has_artifact_metadata(&self, artifact: &Artifact, label: &str) -> bool {
        self.artifact_metadata_path(artifact, label).is_file()
    }

    /// Metadata scoped to a source and an explicit cache key, for use before
    /// the source's artifacts are known
    pub fn put_source_metadata(
        &self,
        source: &Source,
        cache_key: &str,
        label: &str,
    ) -> MorphResult<WritableHandle> {
        WritableHandle::create(self.source_metadata_path(source, cache_key, label))
    }

    pub fn get_source_metadata(
        &self,
        source: &Source,
        cache_key: &str,
        label: &str,
    ) -> MorphResult<File> {
        open(
            "source metadata",
            &self.source_metadata_path(source, cache_key, label),
        )
    }

    pub fn has_source_metadata(&self, source: &Source, cache_key: &str, label: &str) -> bool {
        self.source_metadata_path(source, cache_key, label).is_file()
    }

    fn artifact_path(&self, artifact: &Artifact) -> PathBuf {
        let mut fields = source_fields(artifact.source());
        fields.push(artifact.cache_key().to_string());
        fields.push(artifact.name().to_string());

        let name = format!("{}.{}", digest("artifact", &fields), suffix(artifact.name()));
        self.root.join(name)
    }

    fn artifact_metadata_path(&self, artifact: &Artifact, label: &str) -> PathBuf {
        let mut fields = source_fields(artifact.source());
        fields.push(artifact.cache_key().to_string());
        fields.push(artifact.name().to_string());
        fields.push(label.to_string());

        let name = format!("{}.{}", digest("artifact-metadata", &fields), suffix(label));
        self.root.join(META_DIR).join(name)
    }

    fn source_metadata_path(&self, source: &Source, cache_key: &str, label: &str) -> PathBuf {
        let mut fields = source_fields(source);
        fields.push(cache_key.to_string());
        fields.push(label.to_string());

        let name = format!("{}.{}", digest("source-metadata", &fields), suffix(label));
        self.root.join(META_DIR).join(name)
    }

    /// Every file in the cache, oldest first
    pub fn entries(&self) -> MorphResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();
        self.scan(&self.root, EntryKind::Artifact, &mut entries)?;
        self.scan(&self.root.join(META_DIR), EntryKind::Metadata, &mut entries)?;
        entries.sort_by(|a, b| a.modified.cmp(&b.modified).then(a.path.cmp(&b.path)));
        Ok(entries)
    }

    fn scan(&self, dir: &Path, kind: EntryKind, out: &mut Vec<CacheEntry>) -> MorphResult<()> {
        let read_dir = match fs::read_dir(dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(MorphError::io(format!("reading {}", dir.display()), e)),
        };

        for entry in read_dir {
            let entry = entry.map_err(|e| MorphError::io(format!("reading {}", dir.display()), e))?;
            let path = entry.path();
            let meta = entry
                .metadata()
                .map_err(|e| MorphError::io(format!("inspecting {}", path.display()), e))?;
            if !meta.is_file() {
                continue;
            }

            let partial = entry
                .file_name()
                .to_string_lossy()
                .starts_with(PARTIAL_PREFIX);
            let modified = meta
                .modified()
                .map_err(|e| MorphError::io(format!("inspecting {}", path.display()), e))?;

            out.push(CacheEntry {
                path,
                kind: if partial { EntryKind::Partial } else { kind },
                size: meta.len(),
                modified: DateTime::<Utc>::from(modified),
            });
        }
        Ok(())
    }

    /// Remove every file last written before `cutoff`; returns what was
    /// removed
    pub fn remove_older_than(&self, cutoff: DateTime<Utc>) -> MorphResult<Vec<CacheEntry>> {
        let stale: Vec<CacheEntry> = self
            .entries()?
            .into_iter()
            .filter(|e| e.modified < cutoff)
            .collect();
        for entry in &stale {
            remove(&entry.path)?;
        }
        Ok(stale)
    }

    /// Remove every file; returns how many were removed
    pub fn clear(&self) -> MorphResult<usize> {
        let entries = self.entries()?;
        for entry in &entries {
            remove(&entry.path)?;
        }
        Ok(entries.len())
    }
}

fn open(kind: &'static str, path: &Path) -> MorphResult<File> {
    match File::open(path) {
        Ok(file) => Ok(file),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(MorphError::NotInCache {
            kind,
            path: path.to_path_buf(),
        }),
        Err(e) => Err(MorphError::io(format!("opening {}", path.display()), e)),
    }
}

fn remove(path: &Path) -> MorphResult<()> {
    match fs::remove_file(path) {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        // Raced with another cleaner
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(MorphError::io(format!("removing {}", path.display()), e)),
    }
}

fn source_fields(source: &Source) -> Vec<String> {
    vec![
        source.repo().to_string(),
        source.original_ref().to_string(),
        source.sha1().to_string(),
        source.filename().to_string(),
        source.morphology().canonical_json(),
    ]
}

/// SHA-256 over a namespace tag and length-prefixed fields, hex encoded
/// Escaped `name`, cut to `MAX_SUFFIX_LEN` bytes
fn suffix(name: &str) -> String {
    let mut escaped = escape_url(name);
    escaped.truncate(MAX_SUFFIX_LEN);
    escaped
}

fn digest(tag: &str, fields: &[String]) -> String {
    let mut hasher = Sha256::new();
    for part in std::iter::once(tag).chain(fields.iter().map(String::as_str)) {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Morphology;
    use std::io::Read;
    use std::sync::Arc;
    use tempfile::TempDir;

    const MORPH: &str = r#"{
        "chunk": "chunk",
        "kind": "chunk",
        "artifacts": {
            "chunk-runtime": ["usr/bin", "usr/sbin", "usr/lib", "usr/libexec"],
            "chunk-devel": ["usr/include"]
        }
    }"#;

    struct Fixture {
        _temp: TempDir,
        cache: LocalArtifactCache,
        source: Arc<Source>,
        runtime: Artifact,
        devel: Artifact,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let morph = Morphology::from_json(MORPH, "chunk.morph").unwrap();
        let source = Arc::new(Source::new("repo", "ref", "sha1", morph, "chunk.morph"));
        Fixture {
            cache: LocalArtifactCache::new(temp.path()),
            _temp: temp,
            runtime: Artifact::new(source.clone(), "chunk-runtime", "cachekey"),
            devel: Artifact::new(source.clone(), "chunk-devel", "cachekey"),
            source,
        }
    }

    fn store(handle: MorphResult<WritableHandle>, content: &str) {
        let mut handle = handle.unwrap();
        handle.write_all(content.as_bytes()).unwrap();
        handle.commit().unwrap();
    }

    fn read(file: MorphResult<File>) -> String {
        let mut text = String::new();
        file.unwrap().read_to_string(&mut text).unwrap();
        text
    }

    #[test]
    fn put_artifacts_and_check_whether_the_cache_has_them() {
        let f = fixture();
        assert!(!f.cache.has(&f.runtime));

        store(f.cache.put(&f.runtime), "runtime");
        assert!(f.cache.has(&f.runtime));
        assert!(!f.cache.has(&f.devel));

        store(f.cache.put(&f.devel), "devel");
        assert!(f.cache.has(&f.runtime));
        assert!(f.cache.has(&f.devel));
    }

    #[test]
    fn put_artifacts_and_get_them_afterwards() {
        let f = fixture();

        store(f.cache.put(&f.runtime), "runtime");
        assert_eq!(read(f.cache.get(&f.runtime)), "runtime");

        store(f.cache.put(&f.devel), "devel");
        assert_eq!(read(f.cache.get(&f.runtime)), "runtime");
        assert_eq!(read(f.cache.get(&f.devel)), "devel");
    }

    #[test]
    fn put_check_and_get_artifact_metadata() {
        let f = fixture();

        store(
            f.cache.put_artifact_metadata(&f.runtime, "log"),
            "log line 1\nlog line 2\n",
        );
        assert!(f.cache.has_artifact_metadata(&f.runtime, "log"));
        assert!(!f.cache.has_artifact_metadata(&f.devel, "log"));
        assert_eq!(
            read(f.cache.get_artifact_metadata(&f.runtime, "log")),
            "log line 1\nlog line 2\n"
        );
    }

    #[test]
    fn put_check_and_get_source_metadata() {
        let f = fixture();

        store(
            f.cache.put_source_metadata(&f.source, "mycachekey", "log"),
            "source log line 1\nsource log line 2\n",
        );
        assert!(f.cache.has_source_metadata(&f.source, "mycachekey", "log"));
        assert!(!f.cache.has_source_metadata(&f.source, "otherkey", "log"));
        assert_eq!(
            read(f.cache.get_source_metadata(&f.source, "mycachekey", "log")),
            "source log line 1\nsource log line 2\n"
        );
    }

    #[test]
    fn metadata_namespaces_do_not_collide() {
        let f = fixture();

        store(f.cache.put_artifact_metadata(&f.runtime, "log"), "artifact log");
        store(
            f.cache.put_source_metadata(&f.source, "cachekey", "log"),
            "source log",
        );
        store(
            f.cache.put_artifact_metadata(&f.runtime, "chunk-runtime"),
            "labelled like an artifact",
        );

        assert_eq!(
            read(f.cache.get_artifact_metadata(&f.runtime, "log")),
            "artifact log"
        );
        assert_eq!(
            read(f.cache.get_source_metadata(&f.source, "cachekey", "log")),
            "source log"
        );
        assert!(!f.cache.has(&f.runtime));
    }

    #[test]
    fn cache_key_separates_artifacts() {
        let f = fixture();
        let rebuilt = Artifact::new(f.source.clone(), "chunk-runtime", "otherkey");

        store(f.cache.put(&f.runtime), "old");
        assert!(!f.cache.has(&rebuilt));
        store(f.cache.put(&rebuilt), "new");
        assert_eq!(read(f.cache.get(&f.runtime)), "old");
    }

    #[test]
    fn put_overwrites() {
        let f = fixture();
        store(f.cache.put(&f.runtime), "first");
        store(f.cache.put(&f.runtime), "second");
        assert_eq!(read(f.cache.get(&f.runtime)), "second");
    }

    #[test]
    fn uncommitted_write_is_invisible() {
        let f = fixture();

        let mut handle = f.cache.put(&f.runtime).unwrap();
        handle.write_all(b"half").unwrap();
        assert!(!f.cache.has(&f.runtime));

        drop(handle);
        assert!(!f.cache.has(&f.runtime));
        assert!(f.cache.entries().unwrap().is_empty());
    }

    #[test]
    fn get_missing_is_not_in_cache() {
        let f = fixture();
        assert!(matches!(
            f.cache.get(&f.runtime),
            Err(MorphError::NotInCache { kind: "artifact", .. })
        ));
        assert!(matches!(
            f.cache.get_source_metadata(&f.source, "k", "log"),
            Err(MorphError::NotInCache { .. })
        ));
    }

    #[test]
    fn entries_and_clear() {
        let f = fixture();
        store(f.cache.put(&f.runtime), "runtime");
        store(f.cache.put_artifact_metadata(&f.runtime, "log"), "log");

        let entries = f.cache.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.kind == EntryKind::Artifact && e.size == 7));
        assert!(entries.iter().any(|e| e.kind == EntryKind::Metadata));

        assert_eq!(f.cache.clear().unwrap(), 2);
        assert!(!f.cache.has(&f.runtime));
        assert!(f.cache.entries().unwrap().is_empty());
    }

    #[test]
    fn remove_older_than_keeps_recent_blobs() {
        let f = fixture();
        store(f.cache.put(&f.runtime), "runtime");

        let past = Utc::now() - chrono::Duration::days(1);
        assert!(f.cache.remove_older_than(past).unwrap().is_empty());
        assert!(f.cache.has(&f.runtime));

        let future = Utc::now() + chrono::Duration::days(1);
        assert_eq!(f.cache.remove_older_than(future).unwrap().len(), 1);
        assert!(!f.cache.has(&f.runtime));
    }

    #[test]
    fn long_names_and_labels_are_stored() {
        let f = fixture();
        let long_name = format!("chunk-{}", "x".repeat(300));
        let long_label = "l".repeat(300);
        let artifact = Artifact::new(f.source.clone(), long_name.as_str(), "cachekey");

        store(f.cache.put(&artifact), "blob");
        store(f.cache.put_artifact_metadata(&artifact, &long_label), "log");
        store(
            f.cache.put_source_metadata(&f.source, "cachekey", &long_label),
            "source log",
        );

        assert_eq!(read(f.cache.get(&artifact)), "blob");
        assert_eq!(
            read(f.cache.get_artifact_metadata(&artifact, &long_label)),
            "log"
        );
        assert_eq!(
            read(f.cache.get_source_metadata(&f.source, "cachekey", &long_label)),
            "source log"
        );
        for entry in f.cache.entries().unwrap() {
            let name = entry.path.file_name().unwrap().len();
            assert!(name <= 64 + 1 + MAX_SUFFIX_LEN, "{} bytes", name);
        }
    }

    #[test]
    fn names_sharing_a_long_prefix_stay_distinct() {
        let f = fixture();
        let prefix = "y".repeat(200);
        let first = Artifact::new(f.source.clone(), format!("{}-runtime", prefix), "cachekey");
        let second = Artifact::new(f.source.clone(), format!("{}-devel", prefix), "cachekey");

        store(f.cache.put(&first), "runtime");
        store(f.cache.put(&second), "devel");

        assert_eq!(read(f.cache.get(&first)), "runtime");
        assert_eq!(read(f.cache.get(&second)), "devel");
    }

    #[test]
    fn entries_of_missing_root_is_empty() {
        let cache = LocalArtifactCache::new("/nonexistent/morph/artifacts");
        assert!(cache.entries().unwrap().is_empty());
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.0 GB");
    }
}
