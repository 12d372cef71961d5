//! AudioCodes voice gateway profile.
//!
//! Gateways with unsaved changes mark the prompt with `*`:
//!
//! ```text
//! gw>        gw*>        # user
//! gw#        gw*#        # privileged
//! gw(config-system)#     # config
//! ```
//!
//! Paging is a configuration setting rather than a terminal command, so
//! turning it off walks into `config system` / `cli-settings` and back out.
//! That only works from privileged mode. Paging is turned back on before
//! leaving, since the setting outlives the session.
//!
//! Firmware 6.6 keeps the setting under `cli-terminal` instead; use the
//! `audiocodes_66` profile for it.

use std::time::Duration;

use crate::profile::{
    DeviceProfile, ExitScript, LifecycleScript, LoginScript, Mode, Pager, PendingPrompt,
    PromptPattern, ReloadScript,
};

/// Registry name.
pub const PROFILE_NAME: &str = "audiocodes";

/// Registry name for 6.6 firmware.
pub const PROFILE_NAME_66: &str = "audiocodes_66";

/// Create the AudioCodes profile.
pub fn profile() -> DeviceProfile {
    with_window_height(
        base(PROFILE_NAME),
        "cli-settings",
        "window-height 0",
        "window-height automatic",
    )
}

/// Create the AudioCodes 6.6 profile.
pub fn profile_66() -> DeviceProfile {
    with_window_height(
        base(PROFILE_NAME_66),
        "cli-terminal",
        "set window-height 0",
        "set window-height 100",
    )
}

fn with_window_height(
    mut profile: DeviceProfile,
    section: &str,
    disable: &str,
    restore: &str,
) -> DeviceProfile {
    let mut exit = ExitScript::new(["exit"]);
    for (off, on) in [
        ("config system", "config system"),
        (section, section),
        (disable, restore),
        ("exit", "exit"),
        ("exit", "exit"),
    ] {
        profile = profile.with_paging_disable(off);
        exit = exit.with_restore_paging(on);
    }
    profile.with_exit(exit)
}

fn base(name: &str) -> DeviceProfile {
    let config = PromptPattern::new(
        Mode::Config,
        r"[\w.@/:][\w.\-@/:]{0,62}\([\w.\-@/: ]{1,63}\)\*?#",
    )
    .unwrap();
    let privileged = PromptPattern::new(Mode::Privileged, r"[\w.@/:][\w.\-@/:]{0,62}\*?#")
        .unwrap()
        .with_not_contains(")#")
        .with_not_contains(")*#");
    let user = PromptPattern::new(Mode::User, r"[\w.@/:][\w.\-@/:]{0,62}\*?>").unwrap();

    let login = LoginScript::default()
        .with_dialog(
            PendingPrompt::new(r"initial configuration dialog\? \[yes/no\]:", "no").unwrap(),
        )
        .with_fatal(r"(?i)password required, but none set")
        .unwrap();

    let reload = ReloadScript::new("reload now")
        .with_without_save("reload without-saving")
        .with_confirmation(PendingPrompt::new(r"(?i)are you sure.*\(y/n\)", "y").unwrap())
        .with_disconnect_grace(Duration::from_secs(15));

    DeviceProfile::new(name)
        .with_prompt(config)
        .with_prompt(privileged)
        .with_prompt(user)
        .with_login(login)
        .with_enable("enable")
        .with_enable_prompt(r"(?i)ssword:")
        .unwrap()
        .with_disable("disable")
        .with_configure("config system")
        .with_exit_config("exit")
        .with_pager(Pager::new(r"(?i)--more--", " ").unwrap())
        .with_paging_mode(Mode::Privileged)
        .with_save(LifecycleScript::new("write"))
        .with_reload(reload)
        .with_failure_pattern("Invalid command")
        .with_failure_pattern("Error:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::PromptMatcher;

    #[test]
    fn test_audiocodes_profile() {
        let profile = profile();
        assert_eq!(profile.name, "audiocodes");
        assert_eq!(
            profile.paging_disable,
            vec!["config system", "cli-settings", "window-height 0", "exit", "exit"]
        );
        assert_eq!(
            profile.exit.restore_paging,
            vec!["config system", "cli-settings", "window-height automatic", "exit", "exit"]
        );
        assert_eq!(profile.exit.commands, vec!["exit"]);
        assert_eq!(profile.paging_mode, Some(Mode::Privileged));
        assert_eq!(
            profile.reload.as_ref().unwrap().without_save_command.as_deref(),
            Some("reload without-saving")
        );
        profile.validate().unwrap();
    }

    #[test]
    fn test_audiocodes_prompts_with_unsaved_marker() {
        let matcher = PromptMatcher::from_profile(&profile());
        let mode = |s: &str| matcher.match_prompt(s.as_bytes()).map(|m| m.mode);

        assert_eq!(mode("gw>"), Some(Mode::User));
        assert_eq!(mode("gw*>"), Some(Mode::User));
        assert_eq!(mode("gw#"), Some(Mode::Privileged));
        assert_eq!(mode("gw*#"), Some(Mode::Privileged));
        assert_eq!(mode("gw(config-system)#"), Some(Mode::Config));
        assert_eq!(mode("gw(cli-settings)*#"), Some(Mode::Config));
    }

    #[test]
    fn test_audiocodes_setup_dialog() {
        let profile = profile();
        let dialog = &profile.login.dialogs[0];
        assert!(
            dialog
                .pattern
                .is_match(b"Would you like to enter the initial configuration dialog? [yes/no]: ")
        );
        assert_eq!(dialog.response, "no");
    }

    #[test]
    fn test_audiocodes_66_window_height() {
        let profile = profile_66();
        assert_eq!(profile.name, "audiocodes_66");
        assert_eq!(profile.paging_disable[1], "cli-terminal");
        assert_eq!(profile.paging_disable[2], "set window-height 0");
        assert_eq!(profile.exit.restore_paging[2], "set window-height 100");
        profile.validate().unwrap();
    }

    #[test]
    fn test_missing_password_is_fatal() {
        let profile = profile();
        assert!(profile.login.fatal[0].is_match(b"Password required, but none set"));
        assert!(
            !profile
                .login
                .access_denied
                .iter()
                .any(|p| p.is_match(b"password required, but none set"))
        );
    }
}
