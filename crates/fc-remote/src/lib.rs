//! Backend side of the flow canvas: the `RemoteSync` seam and its HTTP
//! implementation, the source-sync lock, run log tailing, and the embedding
//! context that supplies credentials.

pub mod api;
pub mod config;
pub mod embed;
pub mod error;
pub mod http;
pub mod lock;
pub mod remote;
pub mod tail;

pub use api::{
    CanvasNodeResponse, CreateOperationPayload, EditOperationPayload, LockStatus, LogLine,
    LogPage, RunHandle, SqlResult, TaskHandle, TaskProgress, TerminateChainPayload,
};
pub use config::{BackoffConfig, RemoteConfig};
pub use embed::{EmbedContext, EmbedParams};
pub use error::RemoteError;
pub use http::HttpRemote;
pub use lock::{LockEvent, LockState, SyncLock};
pub use remote::RemoteSync;
pub use tail::{LogTail, TailConfig, TailOutcome};
