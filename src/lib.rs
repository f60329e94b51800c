pub mod config;
pub mod error;
pub mod ffi;
pub mod format;
pub mod logging;
pub mod model;
pub mod processor;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod test_utils;

pub use config::CatalogConfig;
pub use error::{CatalogError, RemoteApiError, Result, ValidationError};
pub use model::{Command, CommandKind, CommandRequest, CommandStatus, Commodity, NewUser, Tag, User, UserType};
pub use processor::CommandProcessor;
pub use remote::{CatalogApi, RemoteCatalogClient};
pub use store::Store;
pub use sync::{SyncOptions, SyncOrchestrator};
