//! Adtran AOS profile (access and transport devices).
//!
//! # Prompt Examples
//!
//! ```text
//! NetVanta>                 # user
//! NetVanta#                 # privileged
//! NetVanta(config)#         # config
//! NetVanta(config-eth 0/1)# # config sub-mode
//! ```
//!
//! Event logging is switched off right after login (`no events`) so alarm
//! chatter does not interleave with command output. AOS only accepts it in
//! privileged mode; in user mode the command fails and is skipped.

use std::time::Duration;

use crate::profile::{
    DeviceProfile, LifecycleScript, Mode, Pager, PendingPrompt, PromptPattern, ReloadScript,
    Timeouts,
};

/// Registry name.
pub const PROFILE_NAME: &str = "adtran_aos";

/// Create the Adtran AOS profile.
pub fn profile() -> DeviceProfile {
    let config = PromptPattern::new(
        Mode::Config,
        r"[\w.@/:][\w.\-@/:]{0,62}\(config[^)]{0,63}\)#",
    )
    .unwrap();
    let privileged = PromptPattern::new(Mode::Privileged, r"[\w.@/:][\w.\-@/:]{0,62}#")
        .unwrap()
        .with_not_contains("(config");
    let user = PromptPattern::new(Mode::User, r"[\w.@/:][\w.\-@/:]{0,62}>").unwrap();

    let reload = ReloadScript::new("reload")
        .with_confirmation(
            PendingPrompt::new(r"(?i)configuration.*modified.*save\?.*\[y/n\]", "y").unwrap(),
        )
        .with_confirmation(PendingPrompt::new(r"(?i)proceed with reload\?.*\[y/n\]", "y").unwrap());

    DeviceProfile::new(PROFILE_NAME)
        .with_prompt(config)
        .with_prompt(privileged)
        .with_prompt(user)
        .with_enable("enable")
        .with_enable_prompt(r"(?i)ssword:")
        .unwrap()
        .with_disable("disable")
        .with_configure("config term")
        .with_exit_config("end")
        .with_pager(Pager::new(r"(?i)--more--", " ").unwrap())
        .with_setup_command("no events")
        .with_paging_disable("terminal length 0")
        .with_save(LifecycleScript::new("write memory"))
        .with_reload(reload)
        .with_failure_pattern("% Invalid")
        .with_failure_pattern("% Incomplete command")
        .with_failure_pattern("% Ambiguous command")
        .with_timeouts(Timeouts {
            save: Duration::from_secs(180),
            ..Timeouts::default()
        })
}
