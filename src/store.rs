use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::{
    Credential, Paths, STORE_ERR_READ_CACHE, STORE_ERR_READ_STATE, STORE_ERR_SERIALIZE_CACHE,
    STORE_ERR_SERIALIZE_STATE, STORE_ERR_WRITE_CACHE, STORE_ERR_WRITE_STATE, now_timestamp,
    write_atomic_with_mode,
};

const STORE_FILE_MODE: u32 = 0o600;

pub trait CacheStore {
    fn load(&self) -> Result<Vec<Credential>, String>;
    fn save(&self, credentials: &[Credential]) -> Result<(), String>;
}

pub trait StateStore {
    fn load(&self) -> Result<Option<ActiveState>, String>;
    fn save(&self, state: &ActiveState) -> Result<(), String>;
}

impl<T: CacheStore + ?Sized> CacheStore for &T {
    fn load(&self) -> Result<Vec<Credential>, String> {
        (**self).load()
    }

    fn save(&self, credentials: &[Credential]) -> Result<(), String> {
        (**self).save(credentials)
    }
}

impl<T: StateStore + ?Sized> StateStore for &T {
    fn load(&self) -> Result<Option<ActiveState>, String> {
        (**self).load()
    }

    fn save(&self, state: &ActiveState) -> Result<(), String> {
        (**self).save(state)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveState {
    #[serde(default)]
    pub current_index: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

pub struct JsonCacheStore {
    path: PathBuf,
}

impl JsonCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonCacheStore { path: path.into() }
    }

    pub fn for_paths(paths: &Paths) -> Self {
        Self::new(&paths.cache)
    }
}

impl CacheStore for JsonCacheStore {
    fn load(&self) -> Result<Vec<Credential>, String> {
        let Some(contents) = read_optional(&self.path, STORE_ERR_READ_CACHE)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&contents) {
            Ok(credentials) => Ok(credentials),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring corrupt credential cache");
                Ok(Vec::new())
            }
        }
    }

    fn save(&self, credentials: &[Credential]) -> Result<(), String> {
        let json = serde_json::to_string_pretty(credentials)
            .map_err(|err| crate::msg1(STORE_ERR_SERIALIZE_CACHE, err))?;
        write_atomic_with_mode(&self.path, format!("{json}\n").as_bytes(), STORE_FILE_MODE)
            .map_err(|err| crate::msg1(STORE_ERR_WRITE_CACHE, err))?;
        debug!(path = %self.path.display(), entries = credentials.len(), "saved credential cache");
        Ok(())
    }
}

pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonStateStore { path: path.into() }
    }

    pub fn for_paths(paths: &Paths) -> Self {
        Self::new(&paths.state)
    }
}

impl StateStore for JsonStateStore {
    fn load(&self) -> Result<Option<ActiveState>, String> {
        let Some(contents) = read_optional(&self.path, STORE_ERR_READ_STATE)? else {
            return Ok(None);
        };
        match serde_json::from_str(&contents) {
            Ok(state) => Ok(Some(state)),
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "ignoring corrupt state file");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &ActiveState) -> Result<(), String> {
        let json = serde_json::to_string_pretty(state)
            .map_err(|err| crate::msg1(STORE_ERR_SERIALIZE_STATE, err))?;
        write_atomic_with_mode(&self.path, format!("{json}\n").as_bytes(), STORE_FILE_MODE)
            .map_err(|err| crate::msg1(STORE_ERR_WRITE_STATE, err))
    }
}

fn read_optional(path: &Path, read_err: &str) -> Result<Option<String>, String> {
    if !path.exists() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|err| crate::msg2(read_err, path.display(), err))
}

#[derive(Default)]
pub struct MemoryCacheStore {
    credentials: RefCell<Vec<Credential>>,
}

impl MemoryCacheStore {
    pub fn new(credentials: Vec<Credential>) -> Self {
        MemoryCacheStore {
            credentials: RefCell::new(credentials),
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<Vec<Credential>, String> {
        Ok(self.credentials.borrow().clone())
    }

    fn save(&self, credentials: &[Credential]) -> Result<(), String> {
        *self.credentials.borrow_mut() = credentials.to_vec();
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    state: RefCell<Option<ActiveState>>,
}

impl MemoryStateStore {
    pub fn new(state: Option<ActiveState>) -> Self {
        MemoryStateStore {
            state: RefCell::new(state),
        }
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Option<ActiveState>, String> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &ActiveState) -> Result<(), String> {
        *self.state.borrow_mut() = Some(state.clone());
        Ok(())
    }
}

pub struct StateTracker<S> {
    store: S,
}

impl<S: StateStore> StateTracker<S> {
    pub fn new(store: S) -> Self {
        StateTracker { store }
    }

    pub fn set_active(&self, index: &str) -> Result<ActiveState, String> {
        let state = ActiveState {
            current_index: Some(index.to_string()),
            updated_at: Some(now_timestamp()),
        };
        self.store.save(&state)?;
        debug!(index, "active credential recorded");
        Ok(state)
    }

    pub fn clear(&self) -> Result<(), String> {
        self.store.save(&ActiveState {
            current_index: None,
            updated_at: Some(now_timestamp()),
        })
    }

    pub fn get_active(&self) -> Result<Option<ActiveState>, String> {
        self.store.load()
    }

    pub fn current_index(&self) -> Result<Option<String>, String> {
        Ok(self.get_active()?.and_then(|state| state.current_index))
    }
}

pub fn find_by_index<'a>(credentials: &'a [Credential], index: &str) -> Option<&'a Credential> {
    credentials.iter().find(|credential| credential.index == index)
}

pub fn find_by_key<'a>(credentials: &'a [Credential], key: &str) -> Option<&'a Credential> {
    credentials.iter().find(|credential| credential.key == key)
}
