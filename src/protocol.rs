//! Controller → init supervisor wire protocol.
//!
//! `create` hands the spawned supervisor its process description over a
//! one-way pipe installed as descriptor [`INIT_PIPE_FD`].
//!
//! # Protocol Format
//!
//! - **Transport**: anonymous pipe, controller writes, supervisor reads
//! - **Encoding**: a single JSON object
//! - **Framing**: end-of-stream; the controller closes its end after writing
//!
//! ```text
//! Controller (create)                 Supervisor (init)
//!   |                                   |
//!   |  {"version":1,"process":{...}}    |
//!   |---------------------------------->|
//!   |  close(W)                         |  EOF → message complete
//!   |                                   |
//! ```
//!
//! Root and annotations are not sent; the supervisor re-reads the bundle
//! after start for those.
//!
//! [`INIT_PIPE_FD`]: crate::constants::INIT_PIPE_FD

use crate::constants::INIT_PROTOCOL_VERSION;
use crate::error::{Error, Result};
use crate::spec::Process;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// The single message sent from controller to supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitMessage {
    /// Protocol version, see [`INIT_PROTOCOL_VERSION`].
    pub version: u32,
    /// The process to exec once started.
    pub process: Process,
}

impl InitMessage {
    /// Wraps a process in a message of the current version.
    pub fn new(process: Process) -> Self {
        Self {
            version: INIT_PROTOCOL_VERSION,
            process,
        }
    }
}

/// Writes `process` as one message. The caller closes the writer.
pub fn write_message<W: Write>(mut writer: W, process: &Process) -> Result<()> {
    let message = InitMessage::new(process.clone());
    serde_json::to_writer(&mut writer, &message)?;
    writer.flush()?;
    Ok(())
}

/// Reads one message, blocking until the writer closes its end.
///
/// # Errors
///
/// [`Error::Serialization`] on malformed or truncated input, and
/// [`Error::Internal`] on a version mismatch.
pub fn read_message<R: Read>(reader: R) -> Result<Process> {
    let message: InitMessage = serde_json::from_reader(reader)?;
    if message.version != INIT_PROTOCOL_VERSION {
        return Err(Error::Internal(format!(
            "init protocol version {} not supported (expected {})",
            message.version, INIT_PROTOCOL_VERSION
        )));
    }
    Ok(message.process)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Process {
        Process {
            terminal: false,
            args: vec!["/bin/echo".to_string(), "hi".to_string()],
            env: vec!["PATH=/bin".to_string()],
            cwd: "/tmp".to_string(),
        }
    }

    #[test]
    fn test_message_through_buffer() {
        let mut buf = Vec::new();
        write_message(&mut buf, &sample()).unwrap();
        assert_eq!(read_message(buf.as_slice()).unwrap(), sample());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let json = r#"{"version":99,"process":{"args":["/bin/true"]}}"#;
        assert!(read_message(json.as_bytes()).is_err());
    }

    #[test]
    fn test_truncated_message_rejected() {
        let json = r#"{"version":1,"process":{"args":["/bin"#;
        assert!(read_message(json.as_bytes()).is_err());
    }
}
