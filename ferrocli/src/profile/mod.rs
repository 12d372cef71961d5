//! Device profiles.
//!
//! A profile is the data describing one device family's CLI dialect:
//! prompt patterns per mode, paging control, mode-transition commands and
//! lifecycle scripts. The session core has no vendor logic of its own.

mod definition;
mod document;
mod mode;
mod prompt;
mod registry;
mod script;
pub mod vendors;

pub use definition::{DeviceProfile, Timeouts};
pub use document::{
    ConfirmationDocument, ExitDocument, LoginDocument, PagerDocument, ProfileDocument,
    PromptDocument, ReloadDocument, ScriptDocument, TimeoutsDocument,
};
pub use mode::Mode;
pub use prompt::PromptPattern;
pub use registry::ProfileRegistry;
pub use script::{
    ExitScript, LifecycleScript, LoginScript, ModeCommands, Pager, PendingPrompt, ReloadScript,
};
