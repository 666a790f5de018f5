pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::{CrawlConfig, SourceConfig};
pub use error::{Error, Result};
pub use storage::{ArticleStore, CheckpointStore};
pub use types::{Article, Candidate, Checkpoint};
