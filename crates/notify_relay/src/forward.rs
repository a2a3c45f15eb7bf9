use std::collections::HashMap;

use rand::{rngs::SmallRng, Rng, SeedableRng};
use zbus::zvariant::OwnedValue;

pub const ENV_ID: &str = "NOTIF_ID";
pub const ENV_APP_NAME: &str = "NOTIF_APP_NAME";
pub const ENV_APP_ICON: &str = "NOTIF_APP_ICON";
pub const ENV_SUMMARY: &str = "NOTIF_SUMMARY";
pub const ENV_BODY: &str = "NOTIF_BODY";

/// The decoded arguments of a single `Notify` call.
///
/// `actions`, `hints` and `expire_timeout` are carried opaquely: callers may
/// rely on sending them, but the relay never interprets them. A `replaces_id`
/// of 0 means "new notification"; honouring replacement is the handler's
/// business, not ours.
#[derive(Debug)]
pub struct NotificationRequest {
    pub app_name: String,
    pub replaces_id: u32,
    pub app_icon: String,
    pub summary: String,
    pub body: String,
    pub actions: Vec<String>,
    pub hints: HashMap<String, OwnedValue>,
    pub expire_timeout: i32,
}

/// A fully materialized handler call: the shell command to run, plus the
/// environment snapshot the handler reads its notification content from.
#[derive(Debug, Clone)]
pub struct ForwardInvocation {
    pub command: String,
    pub env: [(&'static str, String); 5],
}

impl ForwardInvocation {
    fn new(command: &str, id: u32, request: &NotificationRequest) -> Self {
        ForwardInvocation {
            command: command.to_string(),
            env: [
                (ENV_ID, id.to_string()),
                (ENV_APP_NAME, request.app_name.clone()),
                (ENV_APP_ICON, request.app_icon.clone()),
                (ENV_SUMMARY, request.summary.clone()),
                (ENV_BODY, request.body.clone()),
            ],
        }
    }

    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.iter().find(|(key, _)| *key == name).map(|(_, value)| value.as_str())
    }
}

/// The spawn seam. Implementations must return without waiting for the handler
/// to finish; launch failures go to a side channel (the log), never back to the
/// caller, since the bus reply has to be sent regardless.
pub trait Launcher: Send + Sync {
    fn launch(&self, invocation: ForwardInvocation);
}

/// Runs the invocation through `sh -c`, with the environment snapshot applied
/// to the child process only. Fire and forget: a background task reaps the
/// child so the dispatcher is never blocked on the handler's runtime.
pub struct ShellLauncher;

impl Launcher for ShellLauncher {
    fn launch(&self, invocation: ForwardInvocation) {
        let mut command = tokio::process::Command::new("sh");
        command
            .arg("-c")
            .arg(&invocation.command)
            .envs(invocation.env.iter().map(|(key, value)| (*key, value.as_str())));

        match command.spawn() {
            Ok(mut child) => {
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            log::debug!("notification handler exited with {}", status)
                        }
                        Ok(_) => {}
                        Err(e) => log::warn!("failed to wait for notification handler: {}", e),
                    }
                });
            }
            Err(e) => {
                log::warn!("failed to launch notification handler {:?}: {}", invocation.command, e)
            }
        }
    }
}

/// Serializes notification forwarding.
///
/// The gate owns the id source and is held from the id draw through the launch,
/// so two overlapping `Notify` calls can never interleave: each spawned handler
/// sees the environment snapshot of exactly one call.
pub struct Forwarder {
    command: String,
    launcher: Box<dyn Launcher>,
    gate: tokio::sync::Mutex<SmallRng>,
}

impl Forwarder {
    pub fn new(command: String) -> Forwarder {
        Forwarder::with_launcher(command, Box::new(ShellLauncher))
    }

    pub fn with_launcher(command: String, launcher: Box<dyn Launcher>) -> Forwarder {
        Forwarder { command, launcher, gate: tokio::sync::Mutex::new(SmallRng::from_entropy()) }
    }

    /// Generate a notification id, hand the invocation to the launcher, and
    /// return the id. Blocks while a previous forward is still between its id
    /// draw and its launch; there is no timeout and no cancellation.
    ///
    /// Ids are pseudo-random, not cryptographic: clients only use them to
    /// replace a still-visible notification, so a collision is cosmetic.
    pub async fn forward(&self, request: &NotificationRequest) -> u32 {
        let mut rng = self.gate.lock().await;
        let id = rng.gen::<u32>();
        self.launcher.launch(ForwardInvocation::new(&self.command, id, request));
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{Arc, Mutex};

    struct RecordingLauncher(Arc<Mutex<Vec<ForwardInvocation>>>);

    impl Launcher for RecordingLauncher {
        fn launch(&self, invocation: ForwardInvocation) {
            self.0.lock().unwrap().push(invocation);
        }
    }

    fn recording_forwarder(command: &str) -> (Forwarder, Arc<Mutex<Vec<ForwardInvocation>>>) {
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let forwarder =
            Forwarder::with_launcher(command.to_string(), Box::new(RecordingLauncher(recorded.clone())));
        (forwarder, recorded)
    }

    fn request(app_name: &str, app_icon: &str, summary: &str, body: &str) -> NotificationRequest {
        NotificationRequest {
            app_name: app_name.to_string(),
            replaces_id: 0,
            app_icon: app_icon.to_string(),
            summary: summary.to_string(),
            body: body.to_string(),
            actions: Vec::new(),
            hints: HashMap::new(),
            expire_timeout: -1,
        }
    }

    #[tokio::test]
    async fn returned_id_round_trips_through_the_env_snapshot() {
        let (forwarder, recorded) = recording_forwarder("true");

        let id = forwarder.forward(&request("app", "", "summary", "body")).await;

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 1);
        let exported = recorded[0].env_var(ENV_ID).unwrap();
        assert_eq!(exported.parse::<u32>().unwrap(), id);
    }

    #[tokio::test]
    async fn mail_scenario_produces_the_expected_bindings() {
        let (forwarder, recorded) = recording_forwarder("true");

        let id = forwarder
            .forward(&request("Mail", "mail-icon", "New message", "You have 1 new email"))
            .await;

        let recorded = recorded.lock().unwrap();
        let invocation = &recorded[0];
        assert_eq!(invocation.env_var(ENV_ID), Some(id.to_string().as_str()));
        assert_eq!(invocation.env_var(ENV_APP_NAME), Some("Mail"));
        assert_eq!(invocation.env_var(ENV_APP_ICON), Some("mail-icon"));
        assert_eq!(invocation.env_var(ENV_SUMMARY), Some("New message"));
        assert_eq!(invocation.env_var(ENV_BODY), Some("You have 1 new email"));
        assert_eq!(invocation.command, "true");
    }

    #[tokio::test]
    async fn empty_icon_is_passed_through_verbatim() {
        let (forwarder, recorded) = recording_forwarder("true");

        forwarder.forward(&request("app", "", "summary", "body")).await;

        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded[0].env_var(ENV_APP_ICON), Some(""));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_forwards_never_mix_fields() {
        let (forwarder, recorded) = recording_forwarder("true");
        let forwarder = Arc::new(forwarder);

        let mut tasks = tokio::task::JoinSet::new();
        for i in 0..32 {
            let forwarder = forwarder.clone();
            tasks.spawn(async move {
                let request = request(
                    &format!("app-{}", i),
                    &format!("icon-{}", i),
                    &format!("summary-{}", i),
                    &format!("body-{}", i),
                );
                forwarder.forward(&request).await
            });
        }
        let mut ids = Vec::new();
        while let Some(id) = tasks.join_next().await {
            ids.push(id.unwrap());
        }

        // Every recorded invocation must carry the fields of exactly one call,
        // never a mixture of two.
        let recorded = recorded.lock().unwrap();
        assert_eq!(recorded.len(), 32);
        for invocation in recorded.iter() {
            let app_name = invocation.env_var(ENV_APP_NAME).unwrap();
            let i = app_name.strip_prefix("app-").unwrap();
            assert_eq!(invocation.env_var(ENV_APP_ICON), Some(format!("icon-{}", i).as_str()));
            assert_eq!(invocation.env_var(ENV_SUMMARY), Some(format!("summary-{}", i).as_str()));
            assert_eq!(invocation.env_var(ENV_BODY), Some(format!("body-{}", i).as_str()));
            let id = invocation.env_var(ENV_ID).unwrap().parse::<u32>().unwrap();
            assert!(ids.contains(&id));
        }
    }
}
