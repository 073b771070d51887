pub mod command;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod report;
pub mod serial;
pub mod transport;
pub mod ups;

#[cfg(test)]
pub(crate) mod mock;

pub use command::{Command, CommandCode, RegisterWrite};
pub use error::{PowerbankError, Result};
pub use frame::{DeviceState, OutputFlags, RawFrame, StatusFlags};
pub use protocol::{DeviceInfo, Powerbank, ProtocolConfig};
pub use report::StateReport;
pub use serial::SerialTransport;
pub use transport::Transport;
pub use ups::{PowerState, ShutdownAction, ShutdownCommand, UpsConfig, UpsMonitor};
