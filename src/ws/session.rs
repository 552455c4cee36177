//! Per-connection validation between decoded frames and world intents

use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use crate::game::Intent;
use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::{ClientMsg, PlayerClass};

/// Longest accepted display name, in characters
pub const MAX_NAME_CHARS: usize = 16;

/// Longest accepted chat line, in characters
pub const MAX_CHAT_CHARS: usize = 200;

/// Rate limits applied to one connection
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub input_per_second: u32,
    pub chat_burst: u32,
    pub chat_window: Duration,
}

/// What the socket loop should do with one inbound frame
#[derive(Debug)]
pub enum SessionAction {
    /// Ask the world to add (or respawn) this player
    Join { name: String, class: PlayerClass },
    Forward(Intent),
    /// Answer a ping; once joined it also keeps the player from timing out
    Pong { t: u64, heartbeat: Option<Intent> },
    /// Dropped: malformed, rate limited or not allowed yet
    Ignore,
}

pub struct Session {
    pub player_id: Uuid,
    joined: bool,
    limiter: SessionRateLimiter,
}

impl Session {
    pub fn new(player_id: Uuid, limits: SessionLimits) -> Self {
        Self {
            player_id,
            joined: false,
            limiter: SessionRateLimiter::new(limits.input_per_second, limits.chat_burst, limits.chat_window),
        }
    }

    /// Called once the world has answered with a welcome
    pub fn mark_joined(&mut self) {
        self.joined = true;
    }

    /// Decode and validate a text frame. Never fails; bad frames are ignored.
    pub fn handle_text(&mut self, text: &str) -> SessionAction {
        if !self.limiter.check_input() {
            debug!(player_id = %self.player_id, "Inbound frame rate limited");
            return SessionAction::Ignore;
        }

        let msg = match ClientMsg::decode(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(player_id = %self.player_id, error = %e, "Dropping client message");
                return SessionAction::Ignore;
            }
        };

        let player_id = self.player_id;
        match msg {
            ClientMsg::Join { name, class } => SessionAction::Join {
                name: sanitize_name(&name, player_id),
                class,
            },
            ClientMsg::Ping { t } => SessionAction::Pong {
                t,
                heartbeat: self.joined.then_some(Intent::Heartbeat { player_id }),
            },
            _ if !self.joined => {
                debug!(player_id = %player_id, "Message before join ignored");
                SessionAction::Ignore
            }
            ClientMsg::Input { seq, vector } => SessionAction::Forward(Intent::Input {
                player_id,
                seq,
                x: vector.x,
                y: vector.y,
            }),
            ClientMsg::Cast {
                skill_slot,
                aim_direction,
            } => SessionAction::Forward(Intent::Cast {
                player_id,
                slot: skill_slot,
                aim_x: aim_direction.x,
                aim_y: aim_direction.y,
            }),
            ClientMsg::Chat { text } => {
                let Some(text) = sanitize_chat(&text) else {
                    return SessionAction::Ignore;
                };
                if !self.limiter.check_chat() {
                    debug!(player_id = %player_id, "Chat rate limited");
                    return SessionAction::Ignore;
                }
                SessionAction::Forward(Intent::Chat { player_id, text })
            }
            ClientMsg::Equip { item_id, slot } => SessionAction::Forward(Intent::Equip {
                player_id,
                item_id,
                slot,
            }),
        }
    }
}

/// Trimmed and truncated display name, or a generated one when empty
pub fn sanitize_name(raw: &str, player_id: Uuid) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim_end().to_string();
    if name.is_empty() {
        format!("Player_{}", &player_id.simple().to_string()[..8])
    } else {
        name
    }
}

/// Trimmed and truncated chat text; `None` when nothing is left
pub fn sanitize_chat(raw: &str) -> Option<String> {
    let text: String = raw.trim().chars().take(MAX_CHAT_CHARS).collect();
    (!text.is_empty()).then_some(text)
}
