//! Built-in device profiles.
//!
//! These illustrate the profile format for a few families seen in the
//! field. Integrators add their own through [`ProfileRegistry`](super::ProfileRegistry)
//! or a [`ProfileDocument`](super::ProfileDocument).

pub mod adtran;
pub mod audiocodes;
pub mod cisco_asa;
