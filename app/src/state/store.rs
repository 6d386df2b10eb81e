//! Game store: durable collection of game documents keyed by game id.
//!
//! Each game is one document with its players embedded. `save()` replaces
//! the whole document at once; there are no partial updates and no
//! cross-game transactions.
//!
//! A document that cannot be decoded is an error when asked for by id
//! (`find`) and is logged and skipped by every bulk read (`list`,
//! `find_many`, `remove_where`). `count` still includes it.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use banker::Game;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("game '{0}' already exists")]
    Duplicate(String),
    #[error("game '{0}' does not exist")]
    Missing(String),
    #[error("store i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed game document {path}: {source}")]
    Codec {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Storage backend for game documents.
pub trait GameStore: Send + Sync {
    /// Look up one game by its external id.
    fn find(&self, id: &str) -> Result<Option<Game>, StoreError>;

    /// Insert a new game. Fails with `Duplicate` if the id is taken.
    fn insert(&self, game: &Game) -> Result<(), StoreError>;

    /// Replace an existing game document atomically.
    fn save(&self, game: &Game) -> Result<(), StoreError>;

    /// Total number of stored games.
    fn count(&self) -> Result<usize, StoreError>;

    /// At most `limit` readable games, in no particular order.
    fn list(&self, limit: usize) -> Result<Vec<Game>, StoreError>;

    /// Remove every game matching `predicate`. Returns how many were removed.
    fn remove_where(&self, predicate: &dyn Fn(&Game) -> bool) -> Result<usize, StoreError>;

    /// Games among `ids` that exist. Unknown ids are skipped.
    fn find_many(&self, ids: &[String]) -> Result<Vec<Game>, StoreError> {
        let mut found = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(game) = self.find(id)? {
                found.push(game);
            }
        }
        Ok(found)
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// Volatile store. Games are lost on restart.
#[derive(Default)]
pub struct MemoryGameStore {
    games: RwLock<HashMap<String, Game>>,
}

impl MemoryGameStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStore for MemoryGameStore {
    fn find(&self, id: &str) -> Result<Option<Game>, StoreError> {
        Ok(self
            .games
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(id)
            .cloned())
    }

    fn insert(&self, game: &Game) -> Result<(), StoreError> {
        let mut games = self.games.write().unwrap_or_else(|e| e.into_inner());
        if games.contains_key(&game.id) {
            return Err(StoreError::Duplicate(game.id.clone()));
        }
        games.insert(game.id.clone(), game.clone());
        Ok(())
    }

    fn save(&self, game: &Game) -> Result<(), StoreError> {
        let mut games = self.games.write().unwrap_or_else(|e| e.into_inner());
        match games.get_mut(&game.id) {
            Some(slot) => {
                *slot = game.clone();
                Ok(())
            }
            None => Err(StoreError::Missing(game.id.clone())),
        }
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.games.read().unwrap_or_else(|e| e.into_inner()).len())
    }

    fn list(&self, limit: usize) -> Result<Vec<Game>, StoreError> {
        Ok(self
            .games
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .take(limit)
            .cloned()
            .collect())
    }

    fn remove_where(&self, predicate: &dyn Fn(&Game) -> bool) -> Result<usize, StoreError> {
        let mut games = self.games.write().unwrap_or_else(|e| e.into_inner());
        let before = games.len();
        games.retain(|_, g| !predicate(g));
        Ok(before - games.len())
    }
}

// ---------------------------------------------------------------------------
// File-backed store
// ---------------------------------------------------------------------------

/// One pretty-printed JSON document per game (`<dir>/<id>.json`).
///
/// Saves write `<id>.json.tmp` and rename it over the document, so readers
/// see either the old or the new game, never a torn one. A single writer
/// lock serializes mutations within this process.
pub struct FileGameStore {
    dir: PathBuf,
    write_lock: RwLock<()>,
}

impl FileGameStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            write_lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Document path for `id`. Ids that are not plain file names map to
    /// nothing so they can never escape the store directory.
    fn doc_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{id}.json")))
    }

    fn read_doc(path: &Path) -> Result<Option<Game>, StoreError> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Codec {
                    path: path.to_path_buf(),
                    source,
                }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Bulk-read variant of `read_doc`: failures are logged and skipped.
    fn read_doc_or_skip(path: &Path) -> Option<Game> {
        match Self::read_doc(path) {
            Ok(game) => game,
            Err(e) => {
                tracing::warn!("store: skipping unreadable document: {e}");
                None
            }
        }
    }

    fn write_doc(path: &Path, game: &Game) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(game).map_err(|source| StoreError::Codec {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        let io = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        std::fs::write(&tmp, bytes).map_err(io)?;
        std::fs::rename(&tmp, path).map_err(io)
    }

    /// Every document path in the store directory.
    fn doc_paths(&self) -> Result<Vec<PathBuf>, StoreError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StoreError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut paths = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl GameStore for FileGameStore {
    fn find(&self, id: &str) -> Result<Option<Game>, StoreError> {
        let Some(path) = self.doc_path(id) else {
            return Ok(None);
        };
        let _guard = self.write_lock.read().unwrap_or_else(|e| e.into_inner());
        Self::read_doc(&path)
    }

    fn insert(&self, game: &Game) -> Result<(), StoreError> {
        let path = self
            .doc_path(&game.id)
            .ok_or_else(|| StoreError::Missing(game.id.clone()))?;
        let _guard = self.write_lock.write().unwrap_or_else(|e| e.into_inner());
        if path.exists() {
            return Err(StoreError::Duplicate(game.id.clone()));
        }
        Self::write_doc(&path, game)
    }

    fn save(&self, game: &Game) -> Result<(), StoreError> {
        let path = self
            .doc_path(&game.id)
            .ok_or_else(|| StoreError::Missing(game.id.clone()))?;
        let _guard = self.write_lock.write().unwrap_or_else(|e| e.into_inner());
        if !path.exists() {
            return Err(StoreError::Missing(game.id.clone()));
        }
        Self::write_doc(&path, game)
    }

    fn count(&self) -> Result<usize, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(|e| e.into_inner());
        Ok(self.doc_paths()?.len())
    }

    fn list(&self, limit: usize) -> Result<Vec<Game>, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(|e| e.into_inner());
        Ok(self
            .doc_paths()?
            .iter()
            .filter_map(|path| Self::read_doc_or_skip(path))
            .take(limit)
            .collect())
    }

    fn find_many(&self, ids: &[String]) -> Result<Vec<Game>, StoreError> {
        let _guard = self.write_lock.read().unwrap_or_else(|e| e.into_inner());
        Ok(ids
            .iter()
            .filter_map(|id| self.doc_path(id))
            .filter_map(|path| Self::read_doc_or_skip(&path))
            .collect())
    }

    fn remove_where(&self, predicate: &dyn Fn(&Game) -> bool) -> Result<usize, StoreError> {
        let _guard = self.write_lock.write().unwrap_or_else(|e| e.into_inner());
        let mut removed = 0;
        for path in self.doc_paths()? {
            let Some(game) = Self::read_doc_or_skip(&path) else {
                continue;
            };
            if predicate(&game) {
                std::fs::remove_file(&path).map_err(|source| StoreError::Io {
                    path: path.clone(),
                    source,
                })?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
