// src/store/mod.rs

//! Flat-file persistence: one JSON array per file, rewritten as a whole on
//! every mutation.

pub mod results;
pub mod users;

use std::{
    fmt, io,
    marker::PhantomData,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::Mutex;

pub use results::ResultStore;
pub use users::UserStore;

pub const USERS_FILE: &str = "users.json";
pub const RESULTS_FILE: &str = "results.json";

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    /// The file exists but is not a JSON array of the expected records.
    Corrupt { path: PathBuf, source: serde_json::Error },
    /// A uniqueness rule was violated (e.g. duplicate username).
    Conflict(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(e) => write!(f, "store I/O error: {}", e),
            StoreError::Corrupt { path, source } => {
                write!(f, "corrupt store file {}: {}", path.display(), source)
            }
            StoreError::Conflict(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

/// A JSON file holding a `Vec<T>`.
///
/// Mutations hold an async mutex for the whole read/modify/write cycle so two
/// requests in this process never interleave their writes. New contents go to
/// a sibling `.tmp` file that is renamed over the target, so readers see
/// either the old array or the new one.
pub struct JsonFile<T> {
    path: PathBuf,
    write_lock: Mutex<()>,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `[]` if the file does not exist yet.
    pub async fn ensure_exists(&self) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(&self.path).await? {
            tokio::fs::write(&self.path, b"[]").await?;
            tracing::info!("Initialized {}", self.path.display());
        }
        Ok(())
    }

    /// Reads every record. A missing file is an empty list.
    pub async fn load(&self) -> Result<Vec<T>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, records: &[T]) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(records).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Runs `f` over the current records and writes the result back.
    /// Nothing is written when `f` returns an error.
    pub async fn update<R, F>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Vec<T>) -> Result<R, StoreError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut records = self.load().await?;
        let out = f(&mut records)?;
        self.save(&records).await?;
        Ok(out)
    }
}

/// Both stores of the application, rooted in one data directory.
#[derive(Clone)]
pub struct Store {
    pub users: std::sync::Arc<UserStore>,
    pub results: std::sync::Arc<ResultStore>,
}

impl Store {
    /// Creates the data directory and both files when they are missing.
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;

        let users = UserStore::new(data_dir.join(USERS_FILE));
        let results = ResultStore::new(data_dir.join(RESULTS_FILE));
        users.file().ensure_exists().await?;
        results.file().ensure_exists().await?;

        Ok(Self {
            users: std::sync::Arc::new(users),
            results: std::sync::Arc::new(results),
        })
    }
}

#[cfg(test)]
pub(crate) fn temp_data_dir() -> PathBuf {
    std::env::temp_dir().join(format!("skillcheck_test_{}", uuid::Uuid::new_v4()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_empty_files() {
        let dir = temp_data_dir();
        let store = Store::open(&dir).await.unwrap();

        assert_eq!(tokio::fs::read_to_string(dir.join(USERS_FILE)).await.unwrap(), "[]");
        assert_eq!(tokio::fs::read_to_string(dir.join(RESULTS_FILE)).await.unwrap(), "[]");
        assert!(store.users.list().await.unwrap().is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn missing_file_loads_as_empty() {
        let file: JsonFile<u32> = JsonFile::new(temp_data_dir().join("nothing.json"));
        assert!(file.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_and_is_not_overwritten() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let path = dir.join("broken.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let file: JsonFile<u32> = JsonFile::new(&path);
        assert!(matches!(file.load().await, Err(StoreError::Corrupt { .. })));
        let result = file.update(|records| {
            records.push(1);
            Ok(())
        });
        assert!(result.await.is_err());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"{not json");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reads_during_writes_never_see_a_partial_file() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file: std::sync::Arc<JsonFile<String>> =
            std::sync::Arc::new(JsonFile::new(dir.join("records.json")));
        file.ensure_exists().await.unwrap();

        let writer = {
            let file = file.clone();
            tokio::spawn(async move {
                for i in 0..200 {
                    file.update(|records| {
                        records.push(format!("{i}-{}", "x".repeat(4096)));
                        Ok(())
                    })
                    .await
                    .unwrap();
                }
            })
        };

        let mut reads = 0;
        loop {
            let records = file.load().await.expect("a read saw a half-written file");
            assert!(records.len() <= 200);
            reads += 1;
            if writer.is_finished() {
                break;
            }
        }
        writer.await.unwrap();

        assert!(reads > 0);
        assert_eq!(file.load().await.unwrap().len(), 200);
        assert!(!tokio::fs::try_exists(dir.join("records.json.tmp")).await.unwrap());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn failed_update_writes_nothing() {
        let dir = temp_data_dir();
        tokio::fs::create_dir_all(&dir).await.unwrap();
        let file: JsonFile<u32> = JsonFile::new(dir.join("numbers.json"));
        file.ensure_exists().await.unwrap();

        let result = file
            .update(|records| {
                records.push(7);
                Err::<(), _>(StoreError::Conflict("nope".into()))
            })
            .await;

        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert!(file.load().await.unwrap().is_empty());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
