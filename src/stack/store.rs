use crate::config;
use crate::errors::{Result, StaxError};
use crate::stack::metadata::BranchMetadata;
use crate::utils::atomic_file;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

type BranchMap = HashMap<String, BranchMetadata>;

/// Disk-mirrored branch database.
///
/// Reads take a shared lock; every mutation takes the exclusive lock and
/// rewrites the whole file before releasing it.
pub struct BranchStore {
    /// Where writes go
    path: PathBuf,
    /// Files tried on load, newest first
    read_paths: Vec<PathBuf>,
    branches: RwLock<BranchMap>,
}

impl BranchStore {
    /// Open the database of the repository rooted at `repo_root`
    pub fn open(repo_root: &Path) -> Result<Self> {
        let read_paths = config::candidate_paths(repo_root, config::BRANCH_DB_FILES);
        Self::with_paths(read_paths)
    }

    /// Open a database stored at exactly `path`
    pub fn open_at(path: impl Into<PathBuf>) -> Result<Self> {
        Self::with_paths(vec![path.into()])
    }

    fn with_paths(read_paths: Vec<PathBuf>) -> Result<Self> {
        let path = read_paths
            .first()
            .cloned()
            .ok_or_else(|| StaxError::config("No branch database location given"))?;

        let store = Self {
            path,
            read_paths,
            branches: RwLock::new(HashMap::new()),
        };
        store.load()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata for `name`, or an untracked zero-value record
    pub fn get(&self, name: &str) -> BranchMetadata {
        self.read()
            .get(name)
            .cloned()
            .unwrap_or_else(|| BranchMetadata::untracked(name))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Insert or replace an entry and persist
    pub fn set(&self, meta: BranchMetadata) -> Result<()> {
        if meta.name.is_empty() {
            return Err(StaxError::validation("Branch metadata must have a name"));
        }

        let mut branches = self.write();
        let name = meta.name.clone();
        let previous = branches.insert(name.clone(), meta);

        if let Err(e) = self.persist(&branches) {
            match previous {
                Some(old) => branches.insert(name, old),
                None => branches.remove(&name),
            };
            return Err(e);
        }

        debug!("Saved metadata for '{}'", name);
        Ok(())
    }

    /// Read-modify-write one entry under a single exclusive lock
    pub fn update<F>(&self, name: &str, mutate: F) -> Result<BranchMetadata>
    where
        F: FnOnce(&mut BranchMetadata),
    {
        if name.is_empty() {
            return Err(StaxError::validation("Branch metadata must have a name"));
        }

        let mut branches = self.write();
        let previous = branches.get(name).cloned();
        let mut meta = previous
            .clone()
            .unwrap_or_else(|| BranchMetadata::untracked(name));
        mutate(&mut meta);
        meta.name = name.to_string();
        branches.insert(name.to_string(), meta.clone());

        if let Err(e) = self.persist(&branches) {
            match previous {
                Some(old) => branches.insert(name.to_string(), old),
                None => branches.remove(name),
            };
            return Err(e);
        }

        Ok(meta)
    }

    /// Drop an entry and persist; absent names are not an error
    pub fn remove(&self, name: &str) -> Result<()> {
        self.remove_many(&[name.to_string()]).map(|_| ())
    }

    /// Drop several entries with a single write. Returns how many were present.
    pub fn remove_many(&self, names: &[String]) -> Result<usize> {
        let mut branches = self.write();
        let removed: Vec<BranchMetadata> = names
            .iter()
            .filter_map(|name| branches.remove(name))
            .collect();

        if removed.is_empty() {
            return Ok(0);
        }

        if let Err(e) = self.persist(&branches) {
            for meta in removed {
                branches.insert(meta.name.clone(), meta);
            }
            return Err(e);
        }

        Ok(removed.len())
    }

    /// Copy of every named entry, oldest first, then by name
    pub fn snapshot(&self) -> Vec<BranchMetadata> {
        let mut entries: Vec<BranchMetadata> = self
            .read()
            .values()
            .filter(|meta| !meta.name.is_empty())
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        entries
    }

    /// Discard in-memory state and re-read from disk; a missing file means empty
    pub fn reload(&self) -> Result<()> {
        self.load()
    }

    fn load(&self) -> Result<()> {
        let source = self.read_paths.iter().find(|path| path.exists()).cloned();

        let mut branches = self.write();
        let Some(source) = source else {
            branches.clear();
            return Ok(());
        };

        let content = fs::read_to_string(&source).map_err(|e| {
            StaxError::config(format!("Failed to read branch database {source:?}: {e}"))
        })?;
        let mut loaded: BranchMap = if content.trim().is_empty() {
            HashMap::new()
        } else {
            serde_json::from_str(&content).map_err(|e| {
                StaxError::config(format!("Failed to parse branch database {source:?}: {e}"))
            })?
        };

        for (name, meta) in loaded.iter_mut() {
            meta.name = name.clone();
        }

        let stamped = backfill_created(&mut loaded);
        *branches = loaded;

        if stamped > 0 {
            info!("Backfilled creation time for {} branch(es)", stamped);
            self.persist(&branches)?;
        }

        debug!("Loaded {} branch(es) from {:?}", branches.len(), source);
        Ok(())
    }

    fn persist(&self, branches: &BranchMap) -> Result<()> {
        let ordered: BTreeMap<&String, &BranchMetadata> = branches.iter().collect();
        atomic_file::write_json(&self.path, &ordered)?;

        for legacy in self.read_paths.iter().skip(1) {
            if legacy.exists() {
                fs::remove_file(legacy).map_err(|e| {
                    StaxError::config(format!("Failed to remove legacy database {legacy:?}: {e}"))
                })?;
                debug!("Removed legacy branch database {:?}", legacy);
            }
        }
        Ok(())
    }

    fn read(&self) -> RwLockReadGuard<'_, BranchMap> {
        self.branches.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BranchMap> {
        self.branches.write().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stamp `created` on every named entry lacking one. Returns the count.
fn backfill_created(branches: &mut BranchMap) -> usize {
    let now = Utc::now();
    let mut stamped = 0;
    for meta in branches.values_mut() {
        if !meta.name.is_empty() && meta.created.is_none() {
            meta.created = Some(now);
            stamped += 1;
        }
    }
    stamped
}
