use crate::error::{EngineError, EngineResult};
use crate::storage::{EngineState, Store};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

pub const SCHEMA_VERSION: u32 = 2;
const STORE_FILE_NAME: &str = "store.json";
const STORE_ENV_VAR: &str = "SKINTEL_STORE_PATH";

#[derive(Debug, Serialize, Deserialize)]
struct StoredState {
    schema_version: u32,
    #[serde(flatten)]
    state: EngineState,
}

pub fn store_path() -> Result<PathBuf, EngineError> {
    if let Ok(path) = std::env::var(STORE_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| EngineError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("skintel").join(STORE_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| EngineError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("skintel")
            .join(STORE_FILE_NAME))
    }
}

pub fn load_state(path: &Path) -> Result<EngineState, EngineError> {
    if !path.exists() {
        return Ok(EngineState::default());
    }

    let content = std::fs::read_to_string(path)?;
    let stored: StoredState = serde_json::from_str(&content)
        .map_err(|err| EngineError::invalid_data(format!("{}: {}", path.display(), err)))?;

    if stored.schema_version != SCHEMA_VERSION {
        return Err(EngineError::invalid_data("schema_version mismatch"));
    }

    stored.state.validate()?;
    Ok(stored.state)
}

/// Writes the whole state to a sibling temp file and renames it over `path`,
/// so readers never observe a half-written store.
pub fn save_state(path: &Path, state: &EngineState) -> Result<(), EngineError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let stored = StoredState {
        schema_version: SCHEMA_VERSION,
        state: state.clone(),
    };
    let content = serde_json::to_string_pretty(&stored)?;

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    std::fs::write(&temp_path, content)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let permissions = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&temp_path, permissions)?;
    }

    std::fs::rename(&temp_path, path)?;
    Ok(())
}

/// Advisory lock on `<store>.lock`, released when dropped.
#[derive(Debug)]
struct StoreLock {
    _file: File,
}

impl StoreLock {
    fn open_file(store_path: &Path) -> Result<File, EngineError> {
        if let Some(parent) = store_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let mut lock_name = store_path.as_os_str().to_owned();
        lock_name.push(".lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(PathBuf::from(lock_name))?;
        Ok(file)
    }

    fn exclusive(store_path: &Path) -> Result<Self, EngineError> {
        let file = Self::open_file(store_path)?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }

    fn shared(store_path: &Path) -> Result<Self, EngineError> {
        let file = Self::open_file(store_path)?;
        FileExt::lock_shared(&file)?;
        Ok(Self { _file: file })
    }
}

/// File-backed store. Each transaction holds an exclusive OS lock on a
/// sibling lock file from load to rename, so separate processes sharing the
/// store are serialized too.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self, EngineError> {
        Ok(Self::open(store_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Store for JsonStore {
    fn read<T>(&self, f: impl FnOnce(&EngineState) -> T) -> EngineResult<T> {
        let _lock = StoreLock::shared(&self.path)?;
        let state = load_state(&self.path)?;
        Ok(f(&state))
    }

    fn transact<T>(
        &self,
        f: impl FnOnce(&mut EngineState) -> EngineResult<T>,
    ) -> EngineResult<T> {
        let _lock = StoreLock::exclusive(&self.path)?;
        let mut state = load_state(&self.path)?;
        let value = f(&mut state)?;
        save_state(&self.path, &state)?;
        Ok(value)
    }
}
