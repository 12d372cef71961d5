//! Cisco ASA profile.
//!
//! ```text
//! asa>                 # user
//! asa#                 # privileged
//! asa(config)#         # config
//! asa/ctx1#            # privileged, multi-context
//! ```
//!
//! Reloads use `noconfirm`, so the device drops the session without asking.
//!
//! The pager text `<--- More --->` ends in `>` like a user prompt. Hostnames
//! never start with `-`, and the prompt classes exclude that, so the pager
//! match is the one that covers the line.
//!
//! Without an enable secret, privilege 15 is reached with `login`, which
//! asks for the username and password again.

use crate::profile::{
    DeviceProfile, LifecycleScript, Mode, Pager, PendingPrompt, PromptPattern, ReloadScript,
};

/// Registry name.
pub const PROFILE_NAME: &str = "cisco_asa";

/// Create the Cisco ASA profile.
pub fn profile() -> DeviceProfile {
    let config = PromptPattern::new(
        Mode::Config,
        r"[\w.@/:][\w.\-@/:]{0,62}\(conf[^)]{0,63}\)#",
    )
    .unwrap();
    let privileged = PromptPattern::new(Mode::Privileged, r"[\w.@/:][\w.\-@/:]{0,62}#")
        .unwrap()
        .with_not_contains("(conf");
    let user = PromptPattern::new(Mode::User, r"[\w.@/:][\w.\-@/:]{0,62}>").unwrap();

    let save = LifecycleScript::new("write memory")
        .with_confirmation(PendingPrompt::new(r"\[confirm\]", "").unwrap());

    DeviceProfile::new(PROFILE_NAME)
        .with_prompt(config)
        .with_prompt(privileged)
        .with_prompt(user)
        .with_enable("enable")
        .with_enable_prompt(r"(?i)ssword:")
        .unwrap()
        .with_login_enable("login")
        .with_disable("disable")
        .with_configure("configure terminal")
        .with_exit_config("end")
        .with_pager(Pager::new(r"<--- More --->", " ").unwrap())
        .with_paging_disable("terminal pager 0")
        .with_paging_mode(Mode::Privileged)
        .with_save(save)
        .with_reload(
            ReloadScript::new("reload save-config noconfirm").with_without_save("reload noconfirm"),
        )
        .with_failure_pattern("ERROR:")
        .with_failure_pattern("% Invalid input")
}
