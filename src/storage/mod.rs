//! Device directory
//!
//! Durable store of devices, their workloads and their last known online
//! state. The monitor consumes it through the [`DeviceDirectory`] trait; the
//! registration API uses the wider [`DeviceStore`] trait.
//!
//! ## Backends
//!
//! - **SQLite** (default): Embedded database, fine for a home or small-office network
//! - **In-Memory**: No persistence, for testing or `"backend": "none"`
//!
//! ## Usage
//!
//! ```no_run
//! use netwatch::storage::{DeviceDirectory, sqlite::SqliteDirectory};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let directory = SqliteDirectory::new("./netwatch.db").await?;
//!     let devices = directory.list_monitorable().await?;
//!     println!("{} devices", devices.len());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod error;
pub mod memory;
pub mod schema;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

pub use backend::{DeviceDirectory, DeviceStore};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryDirectory;
pub use schema::{Device, DeviceId, MonitoredDevice, NewDevice, NewWorkload, Workload, WorkloadType};
