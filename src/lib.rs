//! NutriSnap
//!
//! メニュー画像/PDFをAIで解析し、食事制限・アレルギーに合わせたおすすめと注意料理を返す。

pub mod analyzer;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod logging;
pub mod report;
pub mod storage;
pub mod store;

pub use analyzer::{AnalysisStage, Analyzer, Artifact, ArtifactKind};
pub use config::Config;
pub use coordinator::{Coordinator, RequestStatus};
pub use error::{NutriSnapError, Result};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::{ScanStore, MAX_SAVED_SCANS};
