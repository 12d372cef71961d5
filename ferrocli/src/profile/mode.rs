//! Session modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Privilege/context level of a CLI session.
///
/// Modes are ordered: each step up is reached from the one below it with a
/// profile command, and left again with the matching exit command.
///
/// ```text
/// Unauthenticated ──login──► User ──enable──► Privileged ──configure──► Config
///                            ◄──disable──             ◄──exit config──
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Connected, not logged in.
    Unauthenticated,
    /// User EXEC (`>` on most devices).
    User,
    /// Privileged EXEC (`#`).
    Privileged,
    /// Configuration (`(config)#`).
    Config,
}

impl Mode {
    /// The next mode up, if any.
    pub fn up(self) -> Option<Mode> {
        match self {
            Mode::Unauthenticated => Some(Mode::User),
            Mode::User => Some(Mode::Privileged),
            Mode::Privileged => Some(Mode::Config),
            Mode::Config => None,
        }
    }

    /// The mode an exit command drops to. Leaving User mode means logging
    /// out, which is not a mode change.
    pub fn down(self) -> Option<Mode> {
        match self {
            Mode::Config => Some(Mode::Privileged),
            Mode::Privileged => Some(Mode::User),
            Mode::User | Mode::Unauthenticated => None,
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Unauthenticated => "unauthenticated",
            Mode::User => "user",
            Mode::Privileged => "privileged",
            Mode::Config => "config",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
