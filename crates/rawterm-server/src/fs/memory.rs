//! In-memory [`HostFs`] for tests and demos.
//!
//! Stores files in a flat map of normalized paths.  Everything under `rom`
//! is read-only, matching the layout clients expect from a stock server.
//! Timestamps are reported as zero (there is no clock here; absent fields
//! default to zero on the wire).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use super::{FsAttributes, FsError, HostFs};

const CAPACITY: u64 = 1_000_000;

/// A thread-safe in-memory filesystem.
pub struct MemoryFs {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    dirs: Mutex<BTreeSet<String>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self {
            files: Mutex::new(BTreeMap::new()),
            dirs: Mutex::new(BTreeSet::new()),
        }
    }

    /// Inserts a file directly, creating parent directories.  Intended for
    /// test setup; works on read-only paths too.
    pub fn seed_file(&self, path: &str, contents: &[u8]) {
        let path = normalize(path);
        self.add_parents(&path);
        self.files
            .lock()
            .expect("lock poisoned")
            .insert(path, contents.to_vec());
    }

    fn add_parents(&self, path: &str) {
        let mut dirs = self.dirs.lock().expect("lock poisoned");
        let mut prefix = String::new();
        for segment in path.split('/').rev().skip(1).collect::<Vec<_>>().iter().rev() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            dirs.insert(prefix.clone());
        }
    }

    fn used_space(&self) -> u64 {
        self.files
            .lock()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn is_rom(path: &str) -> bool {
    path == "rom" || path.starts_with("rom/")
}

/// `*`-wildcard match over whole normalized paths.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut pos = 0;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            if !text.starts_with(part) {
                return false;
            }
            pos = part.len();
        } else if i == parts.len() - 1 {
            return part.is_empty() || (text.len() >= pos && text[pos..].ends_with(part));
        } else if part.is_empty() {
            continue;
        } else {
            match text[pos..].find(part) {
                Some(found) => pos += found + part.len(),
                None => return false,
            }
        }
    }
    true
}

impl HostFs for MemoryFs {
    fn exists(&self, path: &str) -> bool {
        let path = normalize(path);
        path.is_empty()
            || self.files.lock().expect("lock poisoned").contains_key(&path)
            || self.dirs.lock().expect("lock poisoned").contains(&path)
    }

    fn is_dir(&self, path: &str) -> bool {
        let path = normalize(path);
        path.is_empty() || self.dirs.lock().expect("lock poisoned").contains(&path)
    }

    fn is_read_only(&self, path: &str) -> bool {
        is_rom(&normalize(path))
    }

    fn size(&self, path: &str) -> Result<u64, FsError> {
        let path = normalize(path);
        if self.is_dir(&path) {
            return Ok(0);
        }
        self.files
            .lock()
            .expect("lock poisoned")
            .get(&path)
            .map(|data| data.len() as u64)
            .ok_or(FsError::NotFound(path))
    }

    fn drive(&self, path: &str) -> Result<String, FsError> {
        let path = normalize(path);
        if !self.exists(&path) {
            return Err(FsError::NotFound(path));
        }
        Ok(if is_rom(&path) { "rom" } else { "hdd" }.to_string())
    }

    fn capacity(&self, _path: &str) -> Result<u64, FsError> {
        Ok(CAPACITY)
    }

    fn free_space(&self, path: &str) -> Result<u64, FsError> {
        if self.is_read_only(path) {
            return Ok(0);
        }
        Ok(CAPACITY.saturating_sub(self.used_space()))
    }

    fn list(&self, path: &str) -> Result<Vec<String>, FsError> {
        let path = normalize(path);
        if !self.is_dir(&path) {
            return Err(FsError::NotFound(path));
        }
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let mut entries = BTreeSet::new();
        let files = self.files.lock().expect("lock poisoned");
        let dirs = self.dirs.lock().expect("lock poisoned");
        for child in files.keys().chain(dirs.iter()) {
            if let Some(rest) = child.strip_prefix(&prefix) {
                if rest.is_empty() {
                    continue;
                }
                entries.insert(
                    rest.split_once('/')
                        .map(|(first, _)| first)
                        .unwrap_or(rest)
                        .to_string(),
                );
            }
        }
        Ok(entries.into_iter().collect())
    }

    fn attributes(&self, path: &str) -> Result<FsAttributes, FsError> {
        let path = normalize(path);
        if self.is_dir(&path) {
            return Ok(FsAttributes {
                is_dir: true,
                is_read_only: is_rom(&path),
                ..FsAttributes::default()
            });
        }
        let files = self.files.lock().expect("lock poisoned");
        let data = files.get(&path).ok_or_else(|| FsError::NotFound(path.clone()))?;
        Ok(FsAttributes {
            size: data.len() as u64,
            is_read_only: is_rom(&path),
            ..FsAttributes::default()
        })
    }

    fn find(&self, pattern: &str) -> Result<Vec<String>, FsError> {
        let pattern = normalize(pattern);
        let files = self.files.lock().expect("lock poisoned");
        let dirs = self.dirs.lock().expect("lock poisoned");
        let mut matches: Vec<String> = files
            .keys()
            .chain(dirs.iter())
            .filter(|candidate| wildcard_match(&pattern, candidate))
            .cloned()
            .collect();
        matches.sort();
        matches.dedup();
        Ok(matches)
    }

    fn make_dir(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path);
        if is_rom(&path) {
            return Err(FsError::AccessDenied(path));
        }
        if self.files.lock().expect("lock poisoned").contains_key(&path) {
            return Err(FsError::Other(format!("/{path}: File exists")));
        }
        self.add_parents(&format!("{path}/x"));
        self.dirs.lock().expect("lock poisoned").insert(path);
        Ok(())
    }

    fn delete(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path);
        if is_rom(&path) {
            return Err(FsError::AccessDenied(path));
        }
        if !self.exists(&path) {
            return Err(FsError::NotFound(path));
        }
        let prefix = format!("{path}/");
        let mut files = self.files.lock().expect("lock poisoned");
        let mut dirs = self.dirs.lock().expect("lock poisoned");
        files.retain(|key, _| key != &path && !key.starts_with(&prefix));
        dirs.retain(|key| key != &path && !key.starts_with(&prefix));
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), FsError> {
        let data = self.read(from)?;
        self.write(to, &data, false)
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), FsError> {
        self.copy(from, to)?;
        self.delete(from)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, FsError> {
        let path = normalize(path);
        self.files
            .lock()
            .expect("lock poisoned")
            .get(&path)
            .cloned()
            .ok_or(FsError::NotFound(path))
    }

    fn write(&self, path: &str, data: &[u8], append: bool) -> Result<(), FsError> {
        let path = normalize(path);
        if is_rom(&path) {
            return Err(FsError::AccessDenied(path));
        }
        if self.dirs.lock().expect("lock poisoned").contains(&path) {
            return Err(FsError::Other(format!("/{path}: Cannot write to directory")));
        }
        self.add_parents(&path);
        let mut files = self.files.lock().expect("lock poisoned");
        match files.get_mut(&path) {
            Some(existing) if append => existing.extend_from_slice(data),
            _ => {
                files.insert(path, data.to_vec());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_file_exists_and_reads_back() {
        let fs = MemoryFs::new();
        fs.seed_file("dir/file.txt", b"data");
        assert!(fs.exists("dir/file.txt"));
        assert!(fs.exists("/dir/file.txt"));
        assert!(fs.is_dir("dir"));
        assert_eq!(fs.read("dir/file.txt").unwrap(), b"data");
    }

    #[test]
    fn test_root_always_exists_and_is_dir() {
        let fs = MemoryFs::new();
        assert!(fs.exists(""));
        assert!(fs.exists("/"));
        assert!(fs.is_dir("/"));
    }

    #[test]
    fn test_rom_is_read_only() {
        let fs = MemoryFs::new();
        fs.seed_file("rom/boot.lua", b"x");
        assert!(fs.is_read_only("rom/boot.lua"));
        assert!(!fs.is_read_only("home.lua"));
        assert_eq!(
            fs.write("rom/boot.lua", b"y", false),
            Err(FsError::AccessDenied("rom/boot.lua".into()))
        );
        assert_eq!(
            fs.delete("rom"),
            Err(FsError::AccessDenied("rom".into()))
        );
    }

    #[test]
    fn test_list_shows_immediate_children_only() {
        let fs = MemoryFs::new();
        fs.seed_file("a/b/c.txt", b"1");
        fs.seed_file("a/d.txt", b"2");
        assert_eq!(fs.list("a").unwrap(), vec!["b".to_string(), "d.txt".to_string()]);
        assert_eq!(fs.list("").unwrap(), vec!["a".to_string()]);
        assert!(fs.list("a/b/c.txt").is_err());
    }

    #[test]
    fn test_find_with_wildcards() {
        let fs = MemoryFs::new();
        fs.seed_file("programs/edit.lua", b"");
        fs.seed_file("programs/paint.lua", b"");
        fs.seed_file("programs/data.bin", b"");
        let matches = fs.find("programs/*.lua").unwrap();
        assert_eq!(
            matches,
            vec!["programs/edit.lua".to_string(), "programs/paint.lua".to_string()]
        );
        assert_eq!(fs.find("*").unwrap().len(), 4); // three files + programs dir
    }

    #[test]
    fn test_write_append_and_overwrite() {
        let fs = MemoryFs::new();
        fs.write("log.txt", b"one", false).unwrap();
        fs.write("log.txt", b" two", true).unwrap();
        assert_eq!(fs.read("log.txt").unwrap(), b"one two");
        fs.write("log.txt", b"fresh", false).unwrap();
        assert_eq!(fs.read("log.txt").unwrap(), b"fresh");
    }

    #[test]
    fn test_delete_is_recursive() {
        let fs = MemoryFs::new();
        fs.seed_file("tmp/a.txt", b"");
        fs.seed_file("tmp/sub/b.txt", b"");
        fs.delete("tmp").unwrap();
        assert!(!fs.exists("tmp"));
        assert!(!fs.exists("tmp/sub/b.txt"));
    }

    #[test]
    fn test_copy_and_rename() {
        let fs = MemoryFs::new();
        fs.seed_file("src.txt", b"payload");
        fs.copy("src.txt", "dst.txt").unwrap();
        assert_eq!(fs.read("dst.txt").unwrap(), b"payload");
        assert!(fs.exists("src.txt"));

        fs.rename("dst.txt", "moved.txt").unwrap();
        assert!(!fs.exists("dst.txt"));
        assert_eq!(fs.read("moved.txt").unwrap(), b"payload");
    }

    #[test]
    fn test_free_space_shrinks_with_writes() {
        let fs = MemoryFs::new();
        let before = fs.free_space("").unwrap();
        fs.write("blob.bin", &[0u8; 1000], false).unwrap();
        assert_eq!(fs.free_space("").unwrap(), before - 1000);
    }

    #[test]
    fn test_make_dir_over_file_fails() {
        let fs = MemoryFs::new();
        fs.seed_file("taken", b"");
        assert!(matches!(fs.make_dir("taken"), Err(FsError::Other(_))));
        fs.make_dir("fresh/nested").unwrap();
        assert!(fs.is_dir("fresh"));
        assert!(fs.is_dir("fresh/nested"));
    }
}
