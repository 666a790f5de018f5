use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use fan_core::{ArticleStore, CheckpointStore, Error, Result};

pub mod backends;

pub use backends::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("Unknown storage backend: {}", other))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Both store views over a single backend.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleStore>,
    pub checkpoints: Arc<dyn CheckpointStore>,
}

impl Stores {
    pub fn from_backend<T>(backend: T) -> Self
    where
        T: ArticleStore + CheckpointStore + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            checkpoints: backend,
        }
    }
}

/// Open the named backend. `location` is the database path for SQLite.
pub async fn create_storage(kind: StorageKind, location: Option<&str>) -> Result<Stores> {
    match kind {
        StorageKind::Memory => Ok(Stores::from_backend(MemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        StorageKind::Sqlite => {
            let storage = match location {
                Some(path) => SQLiteStorage::new_with_path(std::path::Path::new(path)).await?,
                None => SQLiteStorage::new().await?,
            };
            tracing::info!("💾 Using SQLite database at {}", storage.get_db_path().display());
            Ok(Stores::from_backend(storage))
        }
        #[cfg(not(feature = "sqlite"))]
        StorageKind::Sqlite => {
            let _ = location;
            Err(Error::Config(
                "SQLite support not compiled in, rebuild with the `sqlite` feature".to_string(),
            ))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_storage, StorageKind, Stores};
}
