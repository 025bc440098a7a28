use serde::Deserialize;
use serde_json::Value;

use super::events::{ChannelData, GatewayEvent, GuildCreateData, ReadyData, RelationshipData};
use super::state::SessionState;
use crate::error::GatewayError;
use crate::models::channel::{kind, Channel};

/// Fold one named dispatch event into the session state. Runs synchronously
/// on the session task; reductions never overlap within a connection.
///
/// Returns the domain event to emit, if the dispatch produces one. A payload
/// that fails to deserialize is a `Decode` error: the caller logs it and
/// drops the single dispatch, leaving the connection up.
pub(crate) fn dispatch(
    state: &SessionState,
    event: &str,
    data: Value,
) -> Result<Option<GatewayEvent>, GatewayError> {
    match event {
        "READY" => apply_ready(state, data),
        "GUILD_CREATE" => {
            apply_guild_create(state, serde_json::from_value(data)?);
            Ok(None)
        }
        "GUILD_DELETE" => {
            apply_guild_delete(state, serde_json::from_value(data)?);
            Ok(None)
        }
        "CHANNEL_CREATE" | "CHANNEL_UPDATE" => {
            apply_channel(state, serde_json::from_value(data)?);
            Ok(None)
        }
        "CHANNEL_DELETE" => {
            apply_channel_delete(state, serde_json::from_value(data)?);
            Ok(None)
        }
        // Message history is out of scope; forward the payload verbatim.
        "MESSAGE_CREATE" => Ok(Some(GatewayEvent::Message(data))),
        "RELATIONSHIP_ADD" => {
            apply_relationship_add(state, serde_json::from_value(data)?);
            Ok(None)
        }
        "RELATIONSHIP_REMOVE" => {
            let removed: DeletedEntity = serde_json::from_value(data)?;
            // Idempotent: removing an absent id is a no-op.
            state.relationships.remove(&removed.id);
            Ok(None)
        }
        _ => {
            tracing::trace!("unhandled dispatch event {event}");
            Ok(None)
        }
    }
}

/// Payloads that only matter for the id they carry.
#[derive(Debug, Deserialize)]
struct DeletedEntity {
    id: String,
}

fn apply_ready(state: &SessionState, data: Value) -> Result<Option<GatewayEvent>, GatewayError> {
    let ready: ReadyData = serde_json::from_value(data)?;

    // Ready stays down until the whole snapshot is in place.
    state.set_ready(false);
    state.clear();
    state.set_session(ready.session_id, ready.resume_gateway_url);
    state.set_current_user(ready.user.clone());

    for guild in ready.guilds {
        apply_guild_create(state, guild);
    }
    for channel in ready.private_channels {
        apply_dm_channel(state, channel);
    }
    for rel in ready.relationships {
        if rel.is_friend() {
            state.relationships.insert(rel.key(), rel.user);
        }
    }

    // Ready flips only after the whole snapshot has been folded.
    state.set_ready(true);
    Ok(Some(GatewayEvent::Ready {
        user: ready.user,
        guilds: state.guilds(),
    }))
}

fn apply_guild_create(state: &SessionState, data: GuildCreateData) {
    let guild_id = data.guild.id.clone();
    state.guilds.insert(guild_id.clone(), data.guild);

    // Only text and voice channels are retained; categories, threads and the
    // rest of the guild channel types are not.
    for channel in data.channels {
        if matches!(channel.kind, kind::GUILD_TEXT | kind::GUILD_VOICE) {
            state.channels.insert(
                channel.id.clone(),
                Channel {
                    id: channel.id,
                    name: channel.name.unwrap_or_default(),
                    kind: channel.kind,
                    guild_id: Some(guild_id.clone()),
                    recipients: Vec::new(),
                },
            );
        }
    }
}

fn apply_guild_delete(state: &SessionState, data: DeletedEntity) {
    state.guilds.remove(&data.id);
    state
        .channels
        .retain(|_, channel| channel.guild_id.as_deref() != Some(data.id.as_str()));
}

/// CHANNEL_CREATE / CHANNEL_UPDATE, routed by type code.
fn apply_channel(state: &SessionState, data: ChannelData) {
    if data.is_direct() {
        apply_dm_channel(state, data);
    } else {
        state.channels.insert(
            data.id.clone(),
            Channel {
                id: data.id,
                name: data.name.unwrap_or_default(),
                kind: data.kind,
                guild_id: data.guild_id,
                recipients: Vec::new(),
            },
        );
    }
}

fn apply_channel_delete(state: &SessionState, data: DeletedEntity) {
    state.channels.remove(&data.id);
    state.dm_channels.remove(&data.id);
}

/// DM channels take their display name from the first recipient, falling
/// back to a literal placeholder when the recipient list is empty.
fn apply_dm_channel(state: &SessionState, data: ChannelData) {
    let name = data
        .recipients
        .first()
        .map(|user| user.username.clone())
        .unwrap_or_else(|| "DM".to_string());
    state.dm_channels.insert(
        data.id.clone(),
        Channel {
            id: data.id,
            name,
            kind: data.kind,
            guild_id: None,
            recipients: data.recipients,
        },
    );
}

fn apply_relationship_add(state: &SessionState, data: RelationshipData) {
    if data.is_friend() {
        state.relationships.insert(data.key(), data.user);
    }
}
