//! # runproc
//!
//! **Minimal OCI-Compatible Runtime for Host Processes**
//!
//! This crate implements the OCI runtime command surface (`create`, `start`,
//! `state`, `kill`, `delete`) for a single process per container. There are
//! no namespaces, cgroups, or mounts; a container is an ordinary host process
//! whose only isolation is an optional `chroot` into the bundle's root.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                            runproc                                  │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  bin/runproc.rs   compat::normalize → clap → dispatch               │
//! │                              │                                      │
//! │  ┌───────────────────────────┼───────────────────────────────┐      │
//! │  │                    OciRuntime Trait                       │      │
//! │  │  create(id, bundle) → start(id) → kill(id) → delete(id)   │      │
//! │  │                         state(id)                         │      │
//! │  └───────────────────────────┼───────────────────────────────┘      │
//! │                              │                                      │
//! │  ┌────────────────────┐   ┌──┴──────────────┐   ┌────────────────┐  │
//! │  │  ProcessRuntime    │──▶│   StateStore    │◀──│ init supervisor│  │
//! │  │  (controller)      │   │ <root>/<id>/... │   │ (`runproc init`)│  │
//! │  └────────┬───────────┘   └─────────────────┘   └───────▲────────┘  │
//! │           │      fork/exec + InitMessage on fd 3        │           │
//! │           └─────────────────────────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Lifecycle
//!
//! ```text
//!   ┌─────────┐   create   ┌─────────┐   start   ┌─────────┐
//!   │ (none)  │ ─────────► │ Created │ ────────► │ Running │
//!   └─────────┘            └────┬────┘           └────┬────┘
//!        ▲                      │ process gone        │ process gone
//!        │                      ▼                     ▼
//!        │    delete       ┌─────────────────────────────┐
//!        └──────────────── │           Stopped           │
//!                          └─────────────────────────────┘
//! ```
//!
//! Status only moves forward. Each command is a separate invocation that
//! shares nothing with the others except the state root, so every write is
//! atomic (see [`storage`]) and stale records are corrected on read.
//!
//! # Example
//!
//! ```rust,ignore
//! use runproc::{OciRuntime, ProcessRuntime, RuntimeConfig};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> runproc::Result<()> {
//!     let runtime = ProcessRuntime::new(RuntimeConfig::new("/run/runproc")?)?;
//!
//!     runtime.create("web", "/bundles/web".as_ref()).await?;
//!     runtime.start("web").await?;
//!     println!("{}", runtime.state("web").await?.status);
//!     runtime.delete("web").await?;
//!     Ok(())
//! }
//! ```

#[cfg(not(unix))]
compile_error!("runproc supports Unix platforms only");

pub mod compat;
pub mod config;
pub mod constants;
pub mod error;
pub mod init;
pub mod logging;
pub mod process;
pub mod protocol;
pub mod runtime;
pub mod spec;
pub mod state;
pub mod storage;

pub mod runtimes;

// Re-exports
pub use config::RuntimeConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use runtime::{OciRuntime, Signal};
pub use runtimes::ProcessRuntime;
pub use spec::{Process, Root, Spec, load_spec};
pub use state::{ContainerState, ContainerStatus, StateView};
pub use storage::StateStore;
