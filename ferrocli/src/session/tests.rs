use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::*;
use crate::channel::mock::ScriptedChannel;
use crate::error::TransportError;
use crate::profile::{
    LifecycleScript, LoginScript, Pager, PendingPrompt, PromptPattern, ReloadScript, vendors,
};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn base_profile() -> DeviceProfile {
    DeviceProfile::new("test")
        .with_prompt(PromptPattern::new(Mode::Config, r"device\(config[^)]*\)#").unwrap())
        .with_prompt(
            PromptPattern::new(Mode::Privileged, r"device#")
                .unwrap()
                .with_not_contains("(config"),
        )
        .with_prompt(PromptPattern::new(Mode::User, r"device>").unwrap())
        .with_enable("enable")
        .with_enable_prompt(r"(?i)password:")
        .unwrap()
        .with_disable("disable")
        .with_configure("configure terminal")
        .with_exit_config("end")
        .with_pager(Pager::new(r"--More--", " ").unwrap())
        .with_failure_pattern("% Invalid")
        .with_save(
            LifecycleScript::new("write memory")
                .with_confirmation(PendingPrompt::new(r"\[confirm\]", "").unwrap()),
        )
        .with_reload(
            ReloadScript::new("reload")
                .with_without_save("reload discard")
                .with_confirmation(
                    PendingPrompt::new(r"(?i)proceed with reload\? \[y/n\]", "y").unwrap(),
                ),
        )
}

fn credentials() -> Credentials {
    Credentials::new("admin", "pw")
}

async fn login(channel: ScriptedChannel) -> Session<ScriptedChannel> {
    login_with(channel, base_profile()).await
}

async fn login_with(channel: ScriptedChannel, profile: DeviceProfile) -> Session<ScriptedChannel> {
    Session::login(channel, Arc::new(profile), credentials())
        .await
        .unwrap()
}

fn sent(log: &Arc<std::sync::Mutex<Vec<String>>>) -> Vec<String> {
    log.lock().unwrap().clone()
}

// --- login ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_login_with_console_prompts() {
    init();
    let channel = ScriptedChannel::new()
        .output("\r\nUser Access Verification\r\n\r\nUsername: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\ndevice>");
    let log = channel.sent_log();

    let session = login(channel).await;
    assert_eq!(session.mode(), Mode::User);
    assert_eq!(session.last_prompt(), "device>");
    assert_eq!(sent(&log), vec!["admin", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_login_already_authenticated() {
    let channel = ScriptedChannel::new().output("Last login: today\r\ndevice#");
    let log = channel.sent_log();

    let session = login(channel).await;
    assert_eq!(session.mode(), Mode::Privileged);
    assert!(sent(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_login_access_denied_twice() {
    init();
    let channel = ScriptedChannel::new()
        .output("Username: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\n% Access denied\r\n\r\nUsername: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\n% Access denied\r\n\r\nUsername: ");
    let log = channel.sent_log();

    let result = Session::login(channel, Arc::new(base_profile()), credentials()).await;
    match result {
        Err(Error::Authentication { user, attempts, .. }) => {
            assert_eq!(user, "admin");
            assert_eq!(attempts, 2);
        }
        other => panic!("expected authentication error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(sent(&log), vec!["admin", "pw", "admin", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_login_nudges_idle_console() {
    let channel = ScriptedChannel::new().on("", "\r\ndevice>");

    let session = login(channel).await;
    assert_eq!(session.mode(), Mode::User);
}

#[tokio::test(start_paused = true)]
async fn test_login_answers_dialog() {
    let profile = base_profile().with_login(LoginScript::default().with_dialog(
        PendingPrompt::new(r"configuration dialog\? \[yes/no\]:", "no").unwrap(),
    ));
    let channel = ScriptedChannel::new()
        .output("Would you like to enter the initial configuration dialog? [yes/no]: ")
        .on("no", "no\r\n\r\ndevice>");
    let log = channel.sent_log();

    let session = login_with(channel, profile).await;
    assert_eq!(session.mode(), Mode::User);
    assert_eq!(sent(&log), vec!["no"]);
}

#[tokio::test(start_paused = true)]
async fn test_login_times_out() {
    let mut profile = base_profile();
    profile.timeouts.login = Duration::from_secs(10);
    let channel = ScriptedChannel::new().output("Connecting...");

    let result = Session::login(channel, Arc::new(profile), credentials()).await;
    assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_secs(10)));
}

#[tokio::test(start_paused = true)]
async fn test_login_waits_out_retry_banners() {
    init();
    let channel = ScriptedChannel::new()
        .output("% Connection refused by remote host\r\n")
        .output("% Connection refused by remote host\r\n")
        .output("% Connection refused by remote host\r\nUsername: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\ndevice>");
    let log = channel.sent_log();

    let session = login(channel).await;
    assert_eq!(session.mode(), Mode::User);
    assert_eq!(sent(&log), vec!["admin", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_endless_retry_banner_times_out() {
    let mut profile = base_profile();
    profile.timeouts.login = Duration::from_secs(10);
    let channel = ScriptedChannel::new().idle_output("% Connection refused, retry later\r\n");
    let log = channel.sent_log();

    let started = Instant::now();
    let result = Session::login(channel, Arc::new(profile), credentials()).await;
    assert!(matches!(result, Err(Error::Timeout(d)) if d == Duration::from_secs(10)));
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(sent(&log).is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_login_fatal_banner_is_not_retried() {
    let profile = base_profile().with_login(
        LoginScript::default()
            .with_fatal(r"(?i)password required, but none set")
            .unwrap(),
    );
    let channel = ScriptedChannel::new()
        .output("Username: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\nPassword required, but none set\r\nUsername: ")
        .on("admin", "admin\r\nPassword: ");
    let log = channel.sent_log();

    let result = Session::login(channel, Arc::new(profile), credentials()).await;
    match result {
        Err(Error::Authentication {
            attempts, reason, ..
        }) => {
            assert_eq!(attempts, 1);
            assert!(reason.contains("none set"));
        }
        other => panic!("expected authentication error, got {:?}", other.map(|_| ())),
    }
    assert_eq!(sent(&log), vec!["admin", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_setup_and_paging_commands_run_after_login() {
    init();
    let profile = base_profile()
        .with_setup_command("no events")
        .with_paging_disable("terminal length 0");
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("no events", "no events\r\n% Invalid input\r\ndevice#")
        .on("terminal length 0", "terminal length 0\r\ndevice#");
    let log = channel.sent_log();

    let session = login_with(channel, profile).await;
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(sent(&log), vec!["no events", "terminal length 0"]);
}

#[tokio::test(start_paused = true)]
async fn test_paging_timeout_is_tolerated() {
    let mut profile = base_profile().with_paging_disable("terminal length 0");
    profile.timeouts.command = Duration::from_secs(2);
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("", "\r\ndevice#");

    let session = login_with(channel, profile).await;
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(session.mode(), Mode::Privileged);
}

fn window_height(channel: ScriptedChannel, setting: &str) -> ScriptedChannel {
    channel
        .on("config system", "config system\r\ngw(config-system)#")
        .on("cli-settings", "cli-settings\r\ngw(cli-settings)#")
        .on(setting, &format!("{}\r\ngw(cli-settings)#", setting))
        .on("exit", "exit\r\ngw(config-system)#")
        .on("exit", "exit\r\ngw#")
}

#[tokio::test(start_paused = true)]
async fn test_paging_disabled_from_privileged_after_user_login() {
    init();
    let channel = ScriptedChannel::new()
        .output("gw>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\ngw#");
    let channel = window_height(channel, "window-height 0");
    let log = channel.sent_log();

    let session = login_with(channel, vendors::audiocodes::profile()).await;
    assert_eq!(session.mode(), Mode::Privileged);
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(
        sent(&log),
        vec![
            "enable",
            "pw",
            "config system",
            "cli-settings",
            "window-height 0",
            "exit",
            "exit"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_paging_skipped_when_paging_mode_unreachable() {
    let channel = ScriptedChannel::new()
        .output("gw>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\nAccess denied\r\ngw>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\nAccess denied\r\ngw>");
    let log = channel.sent_log();

    let session = login_with(channel, vendors::audiocodes::profile()).await;
    assert_eq!(session.mode(), Mode::User);
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(sent(&log), vec!["enable", "pw", "enable", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_paging_step_returns_to_paging_mode() {
    let channel = ScriptedChannel::new()
        .output("gw#")
        .on("config system", "config system\r\ngw(config-system)#")
        .on("cli-settings", "cli-settings\r\nInvalid command\r\ngw(config-system)#")
        .on("exit", "exit\r\ngw#");
    let log = channel.sent_log();

    let session = login_with(channel, vendors::audiocodes::profile()).await;
    assert_eq!(session.mode(), Mode::Privileged);
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(sent(&log), vec!["config system", "cli-settings", "exit"]);
}

#[tokio::test(start_paused = true)]
async fn test_telnet_terminator_is_used() {
    let channel = ScriptedChannel::new()
        .terminator("\r\n")
        .output("device#")
        .on("show clock", "show clock\r\n10:00:00\r\ndevice#");

    let mut session = login(channel).await;
    let result = session.execute("show clock").await.unwrap();
    assert_eq!(result.text, "10:00:00");
}

// --- execute -------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_execute_strips_echo_and_prompt() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("show version", "show version\r\nVersion 1.2\r\nUptime 3d\r\ndevice#");

    let mut session = login(channel).await;
    let result = session.execute("show version").await.unwrap();
    assert_eq!(result.text, "Version 1.2\nUptime 3d");
    assert_eq!(result.prompt, "device#");
    assert_eq!(result.mode, Mode::Privileged);
    assert!(!result.continuation_handled());
    assert!(result.is_success());
}

#[tokio::test(start_paused = true)]
async fn test_prompt_in_middle_of_output_does_not_end_command() {
    let channel = ScriptedChannel::new().output("device#").on_chunks(
        "show banner",
        &["show banner\r\ndevice# is the hostname\r\n", "done\r\ndevice#"],
    );

    let mut session = login(channel).await;
    let result = session.execute("show banner").await.unwrap();
    assert_eq!(result.text, "device# is the hostname\ndone");
}

#[tokio::test(start_paused = true)]
async fn test_more_prompt_is_dismissed() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on_chunks("show status", &["show status\r\n", "--More--"])
        .on(" ", "\r        \rOK\r\ndevice#");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    let result = session.execute("show status").await.unwrap();
    assert_eq!(result.text, "OK");
    assert!(result.continuation_handled());
    assert_eq!(result.continuations, 1);
    assert_eq!(sent(&log), vec!["show status", " "]);
}

#[tokio::test(start_paused = true)]
async fn test_paged_output_matches_single_screen() {
    let single = ScriptedChannel::new()
        .output("device#")
        .on("show log", "show log\r\nline1\r\nline2\r\nline3\r\ndevice#");
    let paged = ScriptedChannel::new()
        .output("device#")
        .on("show log", "show log\r\nline1\r\n--More--")
        .on(
            " ",
            "\x08\x08\x08\x08\x08\x08\x08\x08        \x08\x08\x08\x08\x08\x08\x08\x08line2\r\n--More--",
        )
        .on(" ", "\r        \rline3\r\ndevice#");

    let mut a = login(single).await;
    let mut b = login(paged).await;
    let one = a.execute("show log").await.unwrap();
    let many = b.execute("show log").await.unwrap();

    assert_eq!(one.text, "line1\nline2\nline3");
    assert_eq!(many.text, one.text);
    assert_eq!(many.continuations, 2);
}

#[tokio::test(start_paused = true)]
async fn test_pagination_limit() {
    let profile = base_profile().with_max_continuations(2);
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("show forever", "show forever\r\n--More--")
        .on(" ", "a\r\n--More--")
        .on(" ", "b\r\n--More--");

    let mut session = login_with(channel, profile).await;
    let result = session.execute("show forever").await;
    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::PaginationLimit { limit: 2, .. }))
    ));
    assert_eq!(session.health(), Health::Unusable);
    assert!(matches!(
        session.execute("show clock").await,
        Err(Error::Session(SessionError::Unusable))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_asa_pager_is_not_taken_for_a_prompt() {
    let channel = ScriptedChannel::new()
        .output("asa#")
        .on("terminal pager 0", "terminal pager 0\r\nasa#")
        .on("show route", "show route\r\nroute A\r\n<--- More --->")
        .on(" ", "\r              \rroute B\r\nasa#");
    let log = channel.sent_log();

    let mut session = login_with(channel, vendors::cisco_asa::profile()).await;
    let result = session.execute("show route").await.unwrap();
    assert_eq!(result.text, "route A\nroute B");
    assert_eq!(result.mode, Mode::Privileged);
    assert_eq!(result.continuations, 1);
    assert_eq!(sent(&log), vec!["terminal pager 0", "show route", " "]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_substring_marks_result() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("show bogus", "show bogus\r\n% Invalid input detected\r\ndevice#");

    let mut session = login(channel).await;
    let result = session.execute("show bogus").await.unwrap();
    assert!(!result.is_success());
    assert_eq!(result.failure_message.as_deref(), Some("% Invalid"));
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_inexact_prompt_waits_for_quiet_window() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("show clock", "show clock\r\n10:00\r\ndevice# ");

    let mut session = login(channel).await;
    let result = session.execute("show clock").await.unwrap();
    assert_eq!(result.text, "10:00");
    assert!(result.elapsed >= Duration::from_millis(200));
}

#[tokio::test(start_paused = true)]
async fn test_silent_device_times_out_then_resyncs() {
    init();
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("", "\r\ndevice#");

    let mut session = login(channel).await;
    let poll = session.timeouts().poll_interval;
    let deadline = Duration::from_secs(2);

    let started = Instant::now();
    let result = session.execute_with_timeout("show slow", deadline).await;
    assert!(matches!(result, Err(Error::Timeout(d)) if d == deadline));
    assert!(started.elapsed() <= deadline + poll);
    assert_eq!(session.health(), Health::ResyncRequired);

    assert!(matches!(
        session.execute("show clock").await,
        Err(Error::Session(SessionError::ResyncRequired))
    ));

    session.resync().await.unwrap();
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(session.mode(), Mode::Privileged);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_between_polls() {
    let channel = ScriptedChannel::new().output("device#");
    let mut session = login(channel).await;

    let token = session.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        token.cancel();
    });

    let started = Instant::now();
    let result = session.execute("show tech-support").await;
    assert!(matches!(result, Err(Error::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(session.health(), Health::ResyncRequired);
    assert!(!session.cancel_token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_closes_session() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .disconnect_on("show clock");

    let mut session = login(channel).await;
    let result = session.execute("show clock").await;
    assert!(matches!(
        result,
        Err(Error::Transport(TransportError::Disconnected))
    ));
    assert_eq!(session.health(), Health::Closed);
    assert!(!session.is_open());
    assert!(matches!(
        session.execute("show clock").await,
        Err(Error::Session(SessionError::Closed))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_execute_expecting_other_mode() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("configure terminal", "configure terminal\r\ndevice(config)#");

    let mut session = login(channel).await;
    let result = session
        .execute_expecting("configure terminal", Mode::Privileged)
        .await;
    assert!(matches!(
        result,
        Err(Error::Protocol(ProtocolError::UnexpectedMode {
            expected: Mode::Privileged,
            actual: Mode::Config,
            ..
        }))
    ));
    assert_eq!(session.health(), Health::Unusable);
}

#[tokio::test(start_paused = true)]
async fn test_execute_all() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("show a", "show a\r\nA\r\ndevice#")
        .on("show b", "show b\r\nB\r\ndevice#");

    let mut session = login(channel).await;
    let results = session.execute_all(&["show a", "show b"]).await.unwrap();
    let texts: Vec<&str> = results.iter().map(|r| r.text.as_str()).collect();
    assert_eq!(texts, vec!["A", "B"]);
}

// --- modes ---------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_enable_with_password() {
    init();
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\ndevice#");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    session.enter_mode(Mode::Privileged).await.unwrap();
    assert_eq!(session.mode(), Mode::Privileged);
    assert_eq!(sent(&log), vec!["enable", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_enable_uses_separate_secret_and_retries() {
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\nPassword: ")
        .on("en-secret", "\r\n% Access denied\r\ndevice>")
        .on("enable", "enable\r\nPassword: ")
        .on("en-secret", "\r\ndevice#");
    let log = channel.sent_log();

    let mut session = Session::login(
        channel,
        Arc::new(base_profile()),
        credentials().with_enable_secret("en-secret"),
    )
    .await
    .unwrap();
    session.enter_mode(Mode::Privileged).await.unwrap();
    assert_eq!(
        sent(&log),
        vec!["enable", "en-secret", "enable", "en-secret"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_enable_failure_is_mode_transition_error() {
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\n% Bad secrets\r\ndevice>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\n% Bad secrets\r\ndevice>");

    let mut session = login(channel).await;
    let result = session.enter_mode(Mode::Privileged).await;
    assert!(matches!(
        result,
        Err(Error::ModeTransition {
            target: Mode::Privileged,
            reached: Mode::User
        })
    ));
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_login_command_used_without_enable_secret() {
    let profile = base_profile().with_login_enable("login");
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("login", "login\r\nUsername: ")
        .on("admin", "admin\r\nPassword: ")
        .on("pw", "\r\ndevice#");
    let log = channel.sent_log();

    let mut session = login_with(channel, profile).await;
    session.enter_mode(Mode::Privileged).await.unwrap();
    assert_eq!(session.mode(), Mode::Privileged);
    assert_eq!(sent(&log), vec!["login", "admin", "pw"]);
}

#[tokio::test(start_paused = true)]
async fn test_enable_secret_takes_precedence_over_login_command() {
    let profile = base_profile().with_login_enable("login");
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\nPassword: ")
        .on("en-secret", "\r\ndevice#");
    let log = channel.sent_log();

    let mut session = Session::login(
        channel,
        Arc::new(profile),
        credentials().with_enable_secret("en-secret"),
    )
    .await
    .unwrap();
    session.enter_mode(Mode::Privileged).await.unwrap();
    assert_eq!(sent(&log), vec!["enable", "en-secret"]);
}

#[tokio::test(start_paused = true)]
async fn test_enter_exit_enter_is_idempotent() {
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\ndevice#")
        .on("disable", "disable\r\ndevice>")
        .on("enable", "enable\r\nPassword: ")
        .on("pw", "\r\ndevice#");

    let mut session = login(channel).await;
    session.enter_mode(Mode::Privileged).await.unwrap();
    assert_eq!(session.exit_mode().await.unwrap(), Mode::User);
    session.enter_mode(Mode::Privileged).await.unwrap();

    assert_eq!(session.mode(), Mode::Privileged);
    assert_eq!(session.last_prompt(), "device#");
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_walk_from_user_to_config_and_back() {
    let channel = ScriptedChannel::new()
        .output("device>")
        .on("enable", "enable\r\ndevice#")
        .on("configure terminal", "configure terminal\r\ndevice(config)#")
        .on("end", "end\r\ndevice#")
        .on("disable", "disable\r\ndevice>");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    session.enter_mode(Mode::Config).await.unwrap();
    assert_eq!(session.mode(), Mode::Config);
    session.enter_mode(Mode::User).await.unwrap();
    assert_eq!(session.mode(), Mode::User);
    assert_eq!(
        sent(&log),
        vec!["enable", "configure terminal", "end", "disable"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_exit_mode_from_user_fails() {
    let channel = ScriptedChannel::new().output("device>");

    let mut session = login(channel).await;
    assert!(matches!(
        session.exit_mode().await,
        Err(Error::ModeTransition {
            reached: Mode::User,
            ..
        })
    ));
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_send_config_returns_to_previous_mode() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("configure terminal", "configure terminal\r\ndevice(config)#")
        .on("interface ge1", "interface ge1\r\ndevice(config-if)#")
        .on("description uplink", "description uplink\r\ndevice(config-if)#")
        .on("end", "end\r\ndevice#");

    let mut session = login(channel).await;
    let results = session
        .send_config(&["interface ge1", "description uplink"])
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.mode == Mode::Config));
    assert_eq!(session.mode(), Mode::Privileged);
}

// --- lifecycle -----------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_save_config_answers_confirmation() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on(
            "write memory",
            "write memory\r\nDestination filename [startup-config]? [confirm]",
        )
        .on("", "\r\nBuilding configuration...\r\n[OK]\r\ndevice#");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    let result = session.save_config().await.unwrap();
    assert!(result.contains("[OK]"));
    assert_eq!(session.phase(), Phase::Idle);
    assert_eq!(sent(&log), vec!["write memory", ""]);
}

#[tokio::test(start_paused = true)]
async fn test_save_config_from_config_mode_returns_there() {
    let channel = ScriptedChannel::new()
        .output("device(config)#")
        .on("end", "end\r\ndevice#")
        .on("write memory", "write memory\r\n[OK]\r\ndevice#")
        .on("configure terminal", "configure terminal\r\ndevice(config)#");

    let mut session = login(channel).await;
    session.save_config().await.unwrap();
    assert_eq!(session.mode(), Mode::Config);
}

#[tokio::test(start_paused = true)]
async fn test_save_config_failure() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("write memory", "write memory\r\n% Invalid input detected\r\ndevice#");

    let mut session = login(channel).await;
    assert!(matches!(
        session.save_config().await,
        Err(Error::Protocol(ProtocolError::CommandFailed { .. }))
    ));
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_save_config_failure_returns_to_previous_mode() {
    let channel = ScriptedChannel::new()
        .output("device(config)#")
        .on("end", "end\r\ndevice#")
        .on("write memory", "write memory\r\n% Invalid input detected\r\ndevice#")
        .on("configure terminal", "configure terminal\r\ndevice(config)#");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    assert!(matches!(
        session.save_config().await,
        Err(Error::Protocol(ProtocolError::CommandFailed { .. }))
    ));
    assert_eq!(session.mode(), Mode::Config);
    assert_eq!(session.health(), Health::Ready);
    assert_eq!(sent(&log), vec!["end", "write memory", "configure terminal"]);
}

#[tokio::test(start_paused = true)]
async fn test_confirmation_limit() {
    let mut channel = ScriptedChannel::new()
        .output("device#")
        .on("write memory", "write memory\r\n[confirm]");
    for _ in 0..5 {
        channel = channel.on("", "\r\n[confirm]");
    }

    let mut session = login(channel).await;
    assert!(matches!(
        session.save_config().await,
        Err(Error::Protocol(ProtocolError::ConfirmationLimit { limit: 4, .. }))
    ));
    assert_eq!(session.health(), Health::Unusable);
}

#[tokio::test(start_paused = true)]
async fn test_reload_disconnect_after_confirmation_is_rebooting() {
    init();
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("reload", "reload\r\nProceed with reload? [y/n] ")
        .disconnect_on("y");

    let mut session = login(channel).await;
    let outcome = session.reload_device().await.unwrap();
    assert!(outcome.is_rebooting());
    assert_eq!(session.health(), Health::Closed);
    assert!(!session.is_open());
    session.close().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_reload_silence_after_confirmation_is_rebooting() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("reload", "reload\r\nProceed with reload? [y/n] ");

    let mut session = login(channel).await;
    let started = Instant::now();
    let outcome = session.reload_device().await.unwrap();
    assert!(outcome.is_rebooting());
    assert!(started.elapsed() >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn test_reload_disconnect_before_confirmation_is_transport_error() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .disconnect_on("reload");

    let mut session = login(channel).await;
    assert!(matches!(
        session.reload_device().await,
        Err(Error::Transport(TransportError::Disconnected))
    ));
    assert_eq!(session.health(), Health::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_reload_returning_to_prompt() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("reload", "reload\r\nProceed with reload? [y/n] ")
        .on("y", "y\r\nReload scheduled in 5 minutes\r\ndevice#");

    let mut session = login(channel).await;
    match session.reload_device().await.unwrap() {
        ReloadOutcome::Returned(result) => assert!(result.contains("Reload scheduled")),
        ReloadOutcome::Rebooting => panic!("device did not go away"),
    }
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_reload_without_saving_uses_its_command() {
    let channel = ScriptedChannel::new()
        .output("device#")
        .on("reload discard", "reload discard\r\nProceed with reload? [y/n] ")
        .disconnect_on("y");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    assert!(session.reload_device_without_saving().await.unwrap().is_rebooting());
    assert_eq!(sent(&log), vec!["reload discard", "y"]);
}

#[tokio::test(start_paused = true)]
async fn test_reload_without_confirmation_commits_on_send() {
    let profile = base_profile().with_reload(ReloadScript::new("reload noconfirm"));
    let channel = ScriptedChannel::new()
        .output("device#")
        .disconnect_on("reload noconfirm");

    let mut session = login_with(channel, profile).await;
    assert!(session.reload_device().await.unwrap().is_rebooting());
}

#[tokio::test(start_paused = true)]
async fn test_missing_lifecycle_script() {
    let mut profile = base_profile();
    profile.save = None;
    let channel = ScriptedChannel::new().output("device#");

    let mut session = login_with(channel, profile).await;
    assert!(matches!(
        session.save_config().await,
        Err(Error::Protocol(ProtocolError::Unsupported { .. }))
    ));
    assert_eq!(session.health(), Health::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_graceful_exit_leaves_config_first() {
    let channel = ScriptedChannel::new()
        .output("device(config)#")
        .on("end", "end\r\ndevice#")
        .disconnect_on("exit");
    let log = channel.sent_log();

    let mut session = login(channel).await;
    session.graceful_exit().await.unwrap();
    assert_eq!(sent(&log), vec!["end", "exit"]);
    assert_eq!(session.health(), Health::Closed);
    assert!(!session.is_open());

    session.close().await.unwrap();
    session.graceful_exit().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_graceful_exit_restores_paging() {
    let channel = ScriptedChannel::new().output("gw#");
    let channel = window_height(channel, "window-height 0");
    let channel = window_height(channel, "window-height automatic").disconnect_on("exit");
    let log = channel.sent_log();

    let mut session = login_with(channel, vendors::audiocodes::profile()).await;
    session.graceful_exit().await.unwrap();

    let log = sent(&log);
    assert_eq!(log.len(), 11);
    assert_eq!(log[7], "window-height automatic");
    assert_eq!(log[10], "exit");
    assert_eq!(session.health(), Health::Closed);
}
