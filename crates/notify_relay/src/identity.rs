/// The four-tuple returned by `GetServerInformation`. Fixed for the lifetime of
/// the process.
#[derive(Debug, Clone, Copy)]
pub struct ServerInformation {
    pub name: &'static str,
    pub vendor: &'static str,
    pub version: &'static str,
    pub spec_version: &'static str,
}

pub const SERVER_INFORMATION: ServerInformation = ServerInformation {
    name: "notifd",
    vendor: "notifd",
    version: env!("CARGO_PKG_VERSION"),
    spec_version: "1.2",
};

/// Optional features of the notification protocol this server claims to
/// support, drawn from the fixed vocabulary in
/// <https://specifications.freedesktop.org/notification-spec/latest/protocol.html>.
///
/// Notably absent: "actions" (callbacks to the caller are out of scope) and
/// "persistence" (no notification history is kept).
pub const CAPABILITIES: [&str; 4] = ["body", "body-hyperlinks", "body-markup", "icon-static"];
