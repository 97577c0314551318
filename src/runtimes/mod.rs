//! OCI runtime implementations.
//!
//! Each runtime implements [`OciRuntime`](crate::runtime::OciRuntime) for a
//! single container at a time. Only the host-process runtime exists today.

pub mod process;

pub use self::process::ProcessRuntime;
