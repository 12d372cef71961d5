//! # ferrocli
//!
//! Async CLI session automation for network appliances over SSH and Telnet.
//!
//! A [`Session`] logs in to a device, runs commands until the device's
//! prompt reappears at the end of the output, dismisses `--More--` pagers,
//! walks between user, privileged and config modes, and performs save,
//! reload and exit dialogs. Everything device-specific lives in a
//! [`DeviceProfile`], which is plain data.
//!
//! ## Features
//!
//! - Async SSH (russh) and Telnet transports, including console servers
//! - Tail-anchored prompt matching with a quiet window for loose prompts
//! - Pager dismissal with backspace-safe output reassembly
//! - Built-in profiles for Adtran AOS, AudioCodes and Cisco ASA
//! - Cooperative cancellation and explicit resync after interruptions
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrocli::{Mode, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrocli::Error> {
//!     let mut session = SessionBuilder::new("192.0.2.1")
//!         .username("admin")
//!         .password("secret")
//!         .profile("cisco_asa")
//!         .connect()
//!         .await?;
//!
//!     session.enter_mode(Mode::Privileged).await?;
//!     let result = session.execute("show version").await?;
//!     println!("{}", result.text);
//!
//!     session.graceful_exit().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod error;
pub mod profile;
pub mod session;
pub mod transport;

pub use error::{Error, Result};
pub use profile::{DeviceProfile, Mode, ProfileRegistry};
pub use session::{
    CancelToken, CommandResult, Credentials, Health, ReloadOutcome, Session, SessionBuilder,
};
pub use transport::{AuthMethod, SshConfig, TelnetConfig};
