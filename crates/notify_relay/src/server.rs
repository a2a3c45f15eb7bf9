use std::collections::HashMap;

use futures::StreamExt;
use zbus::zvariant::OwnedValue;

use crate::{Forwarder, NotificationRequest, Result, CAPABILITIES, SERVER_INFORMATION};

pub const BUS_NAME: &str = "org.freedesktop.Notifications";
pub const OBJECT_PATH: &str = "/org/freedesktop/Notifications";
pub const INTERFACE: &str = "org.freedesktop.Notifications";

/// Outcome of trying to become the notification server.
#[derive(Debug, PartialEq, Eq)]
pub enum NameClaim {
    /// We are the primary owner and should start serving.
    Claimed,
    /// Another connection owns the name and refused replacement. Yielding to it
    /// (exiting cleanly) is the correct response, not an error.
    Yielded,
}

/// Request the well-known service name, allowing a later instance to take it
/// over and refusing to queue behind an existing owner.
pub async fn claim_name(con: &zbus::Connection) -> Result<NameClaim> {
    use zbus::fdo::{RequestNameFlags, RequestNameReply};

    let flags = [RequestNameFlags::AllowReplacement, RequestNameFlags::DoNotQueue];
    match con.request_name_with_flags(BUS_NAME, flags.into_iter().collect()).await? {
        RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => Ok(NameClaim::Claimed),
        RequestNameReply::Exists => Ok(NameClaim::Yielded),
        RequestNameReply::InQueue => panic!("request_name_with_flags returned InQueue even though we specified DoNotQueue"),
    }
}

/// Resolve once another connection takes the service name over. Only one server
/// owns the endpoint at a time, so this is the designed shutdown path.
pub async fn wait_until_name_lost(con: &zbus::Connection) -> Result<()> {
    let dbus = zbus::fdo::DBusProxy::new(con).await?;
    let mut name_lost = dbus.receive_name_lost().await?;

    while let Some(sig) = name_lost.next().await {
        let args = sig.args()?;
        if args.name().as_str() == BUS_NAME {
            break;
        }
    }

    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Method {
    ServerInformation,
    Capabilities,
    Notify,
}

fn route(member: &str) -> Option<Method> {
    match member {
        "GetServerInformation" => Some(Method::ServerInformation),
        "GetCapabilities" => Some(Method::Capabilities),
        "Notify" => Some(Method::Notify),
        _ => None,
    }
}

/// Dispatch loop: answer method calls on the notification object until the
/// message stream ends.
///
/// The stream is taken as an argument rather than created here so the caller
/// can subscribe it before claiming the name; calls racing the name grant are
/// then not missed.
pub async fn serve(
    con: &zbus::Connection,
    mut messages: zbus::MessageStream,
    forwarder: &Forwarder,
) -> Result<()> {
    while let Some(msg) = messages.next().await {
        let msg = msg?;
        if msg.message_type() != zbus::MessageType::MethodCall {
            continue;
        }
        handle_call(con, forwarder, &msg).await;
    }
    Ok(())
}

async fn handle_call(con: &zbus::Connection, forwarder: &Forwarder, msg: &zbus::Message) {
    if msg.path().as_ref().map(|p| p.as_str()) != Some(OBJECT_PATH)
        || msg.interface().as_ref().map(|i| i.as_str()) != Some(INTERFACE)
    {
        log::info!("ignoring call to {:?} on {:?}", msg.member(), msg.path());
        return;
    }

    let member = msg.member();
    let member = member.as_ref().map(|m| m.as_str()).unwrap_or_default();

    let reply_result = match route(member) {
        Some(Method::ServerInformation) => {
            log::debug!("'GetServerInformation' method called");
            let info = SERVER_INFORMATION;
            con.reply(msg, &(info.name, info.vendor, info.version, info.spec_version)).await
        }
        Some(Method::Capabilities) => {
            log::debug!("'GetCapabilities' method called");
            con.reply(msg, &(&CAPABILITIES[..],)).await
        }
        Some(Method::Notify) => {
            log::debug!("'Notify' method called");
            let request = match decode_notify(msg) {
                Ok(request) => request,
                Err(e) => {
                    // No error reply; the caller observes the bus timeout, the
                    // same as for an unknown method.
                    log::warn!("dropping malformed 'Notify' call: {}", e);
                    return;
                }
            };
            let id = forwarder.forward(&request).await;
            con.reply(msg, &(id,)).await
        }
        None => {
            log::info!("no handling for '{}' method", member);
            return;
        }
    };

    if let Err(e) = reply_result {
        log::warn!("failed to reply to '{}': {}", member, e);
    }
}

type NotifyArgs = (String, u32, String, String, String, Vec<String>, HashMap<String, OwnedValue>, i32);

fn decode_notify(msg: &zbus::Message) -> zbus::Result<NotificationRequest> {
    let (app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout) =
        msg.body::<NotifyArgs>()?;
    Ok(NotificationRequest { app_name, replaces_id, app_icon, summary, body, actions, hints, expire_timeout })
}
