//! Workspace and dataset lifecycle management for DataDesk.
//! 管理 DataDesk 工作區、資料集與工作階段狀態的核心模組。

mod util;

pub mod codec;
pub mod config;
pub mod dataset;
pub mod error;
pub mod events;
pub mod layout;
pub mod registry;
pub mod session;
pub mod table;
pub mod timestamp;

pub use codec::{CodecError, DatasetCodec, TabularCodec, TabularFormat};
pub use config::{AppConfig, ConfigError, ConfigStore};
pub use dataset::{DatasetDescriptor, DatasetStore, CANONICAL_DATASET, DATASET_EXTENSION};
pub use error::{ErrorKind, WorkspaceError, WorkspaceResult};
pub use events::SessionObserver;
pub use layout::{Counters, WorkspaceLayout, WorkspaceMetadata};
pub use registry::{WorkspaceId, WorkspaceRegistry, WorkspaceSummary};
pub use session::{Session, SessionState};
pub use table::{Cell, TabularDataset};
pub use timestamp::Timestamp;
