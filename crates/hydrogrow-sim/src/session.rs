//! Session player registry: roles, ownership hand-off and history.

use crate::events::SimEvent;
use crate::history::{
    ActionLogEntry, BoundedLog, ChatMessage, ACTION_HISTORY_CAP, CHAT_HISTORY_CAP,
};
use crate::permissions::{NetworkAction, PlayerPermissions, PlayerRole};
use hydrogrow_common::{ContainerId, PlayerId, SimError, SimResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Name shown for system chat lines.
pub const SYSTEM_NAME: &str = "System";

/// Multiplayer session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Session name
    pub session_name: String,
    /// Maximum connected players
    pub max_players: usize,
    /// Later joiners become Helpers rather than Visitors
    pub allow_visitors: bool,
    /// Joining needs an invitation (enforced by the host)
    pub require_invitation: bool,
    /// Minutes without an accepted command before a player is marked offline
    pub session_timeout_minutes: f32,
    /// Seconds between auto-saves
    pub auto_save_interval_secs: f32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            session_name: "HydroGrow Garden".to_string(),
            max_players: 4,
            allow_visitors: true,
            require_invitation: false,
            session_timeout_minutes: 60.0,
            auto_save_interval_secs: 300.0,
        }
    }
}

/// One connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPlayerData {
    /// Player ID
    pub id: PlayerId,
    /// Display name
    pub name: String,
    /// Session role
    pub role: PlayerRole,
    /// Permissions derived from the role
    pub permissions: PlayerPermissions,
    /// Whether the player is active
    pub is_online: bool,
    /// Session time (seconds) of joining
    pub join_time: f64,
    /// Session time (seconds) of the last accepted action
    pub last_active: f64,
    /// Applied actions count, used for owner succession
    pub contribution_score: u32,
}

impl NetworkPlayerData {
    fn new(id: PlayerId, name: String, role: PlayerRole, now: f64) -> Self {
        Self {
            id,
            name,
            role,
            permissions: role.permissions(),
            is_online: true,
            join_time: now,
            last_active: now,
            contribution_score: 0,
        }
    }

    fn assign_role(&mut self, role: PlayerRole) {
        self.role = role;
        self.permissions = role.permissions();
    }
}

/// Flat record of the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Settings
    pub settings: SessionSettings,
    /// Connected players
    pub players: Vec<NetworkPlayerData>,
    /// Session owner
    pub owner: Option<PlayerId>,
    /// Session time (seconds)
    pub elapsed: f64,
    /// Chat history
    pub chat: BoundedLog<ChatMessage>,
    /// Action history
    pub actions: BoundedLog<ActionLogEntry>,
}

/// Registry of connected players.
#[derive(Debug, Clone)]
pub struct PlayerRegistry {
    settings: SessionSettings,
    players: BTreeMap<PlayerId, NetworkPlayerData>,
    owner: Option<PlayerId>,
    elapsed: f64,
    chat: BoundedLog<ChatMessage>,
    actions: BoundedLog<ActionLogEntry>,
}

impl Default for PlayerRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl PlayerRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            players: BTreeMap::new(),
            owner: None,
            elapsed: 0.0,
            chat: BoundedLog::new(CHAT_HISTORY_CAP),
            actions: BoundedLog::new(ACTION_HISTORY_CAP),
        }
    }

    /// Session settings.
    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Session owner.
    #[must_use]
    pub fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    /// Session time in seconds.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// A player's data.
    #[must_use]
    pub fn get(&self, id: PlayerId) -> Option<&NetworkPlayerData> {
        self.players.get(&id)
    }

    /// A player's permissions.
    #[must_use]
    pub fn permissions(&self, id: PlayerId) -> Option<&PlayerPermissions> {
        self.players.get(&id).map(|p| &p.permissions)
    }

    /// All players in ID order.
    pub fn players(&self) -> impl Iterator<Item = &NetworkPlayerData> {
        self.players.values()
    }

    /// Number of connected players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Number of players currently online.
    #[must_use]
    pub fn online_count(&self) -> usize {
        self.players.values().filter(|p| p.is_online).count()
    }

    /// Chat history.
    #[must_use]
    pub fn chat(&self) -> &BoundedLog<ChatMessage> {
        &self.chat
    }

    /// Action history.
    #[must_use]
    pub fn actions(&self) -> &BoundedLog<ActionLogEntry> {
        &self.actions
    }

    /// Advances session time.
    pub fn advance(&mut self, dt: f32) {
        self.elapsed += f64::from(dt.max(0.0));
    }

    /// Registers a joining player and assigns their role.
    ///
    /// The first player becomes Owner; later players become Helpers when
    /// visitors are allowed and Visitors otherwise.
    pub fn join(&mut self, id: PlayerId, name: impl Into<String>) -> SimResult<Vec<SimEvent>> {
        if let Some(existing) = self.players.get_mut(&id) {
            if existing.is_online {
                return Err(SimError::AlreadyConnected(id));
            }
            existing.is_online = true;
            existing.last_active = self.elapsed;
            let (name, role) = (existing.name.clone(), existing.role);
            info!("Player {name} ({id}) reconnected as {}", role.display_name());
            return Ok(vec![
                SimEvent::PlayerJoined {
                    player: id,
                    name: name.clone(),
                    role,
                },
                self.system_chat(format!("{name} rejoined the garden")),
            ]);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(SimError::SessionFull {
                max: self.settings.max_players,
            });
        }

        let role = if self.players.is_empty() {
            PlayerRole::Owner
        } else if self.settings.allow_visitors {
            PlayerRole::Helper
        } else {
            PlayerRole::Visitor
        };
        let data = NetworkPlayerData::new(id, name.into(), role, self.elapsed);
        let name = data.name.clone();
        self.players.insert(id, data);

        let mut events = vec![SimEvent::PlayerJoined {
            player: id,
            name: name.clone(),
            role,
        }];
        if role == PlayerRole::Owner {
            self.owner = Some(id);
            events.push(SimEvent::OwnershipTransferred { from: None, to: id });
        }
        events.push(self.system_chat(format!("{name} joined the garden")));
        info!("Player {name} ({id}) joined as {}", role.display_name());
        Ok(events)
    }

    /// Removes a leaving player, handing ownership on if they owned the session.
    pub fn leave(&mut self, id: PlayerId) -> SimResult<Vec<SimEvent>> {
        let data = self.players.remove(&id).ok_or(SimError::UnknownPlayer(id))?;
        info!("Player {} ({id}) left", data.name);

        let mut events = vec![
            SimEvent::PlayerLeft { player: id },
            self.system_chat(format!("{} left the garden", data.name)),
        ];
        if self.owner == Some(id) {
            self.owner = None;
            events.extend(self.promote_successor(id));
        }
        Ok(events)
    }

    /// Picks the connected player with the highest contribution score,
    /// falling back to offline players when nobody is online.
    ///
    /// Ties go to the first player in ID order.
    fn promote_successor(&mut self, previous: PlayerId) -> Vec<SimEvent> {
        let rank = |p: &NetworkPlayerData| (p.is_online, p.contribution_score);
        let mut best: Option<(PlayerId, (bool, u32))> = None;
        for player in self.players.values() {
            if best.map_or(true, |(_, top)| rank(player) > top) {
                best = Some((player.id, rank(player)));
            }
        }
        let Some((successor, _)) = best else {
            debug!("Session owner left an empty session");
            return Vec::new();
        };

        self.owner = Some(successor);
        let mut events = Vec::new();
        if let Some(data) = self.players.get_mut(&successor) {
            data.assign_role(PlayerRole::Owner);
            info!("{} is now the garden owner", data.name);
            let line = format!("{} is now the garden owner", data.name);
            events.push(SimEvent::RoleChanged {
                player: successor,
                role: PlayerRole::Owner,
            });
            events.push(SimEvent::OwnershipTransferred {
                from: Some(previous),
                to: successor,
            });
            events.push(self.system_chat(line));
        }
        events
    }

    /// Reassigns a player's role, recomputing their whole permission set.
    ///
    /// Assigning Owner transfers session ownership and demotes the previous
    /// owner to Manager. The owner cannot be demoted directly.
    pub fn set_role(&mut self, target: PlayerId, role: PlayerRole) -> SimResult<Vec<SimEvent>> {
        if !self.players.contains_key(&target) {
            return Err(SimError::UnknownPlayer(target));
        }
        let is_owner = self.owner == Some(target);
        if is_owner && role != PlayerRole::Owner {
            return Err(SimError::InvalidState(
                "the session owner cannot be demoted; transfer ownership instead".to_string(),
            ));
        }

        let mut events = Vec::new();
        if role == PlayerRole::Owner && !is_owner {
            if let Some(previous) = self.owner {
                if let Some(old) = self.players.get_mut(&previous) {
                    old.assign_role(PlayerRole::Manager);
                    events.push(SimEvent::RoleChanged {
                        player: previous,
                        role: PlayerRole::Manager,
                    });
                }
            }
            events.push(SimEvent::OwnershipTransferred {
                from: self.owner,
                to: target,
            });
            self.owner = Some(target);
        }

        if let Some(data) = self.players.get_mut(&target) {
            let old_role = data.role;
            data.assign_role(role);
            info!(
                "Player {} role changed from {} to {}",
                data.name,
                old_role.display_name(),
                role.display_name()
            );
        }
        events.insert(
            0,
            SimEvent::RoleChanged {
                player: target,
                role,
            },
        );
        Ok(events)
    }

    /// Removes a player from the session. The owner cannot be kicked.
    pub fn kick(&mut self, target: PlayerId, reason: &str) -> SimResult<Vec<SimEvent>> {
        if self.owner == Some(target) {
            return Err(SimError::InvalidState(
                "the session owner cannot be kicked".to_string(),
            ));
        }
        let data = self
            .players
            .remove(&target)
            .ok_or(SimError::UnknownPlayer(target))?;
        info!("Player {} was kicked: {reason}", data.name);
        Ok(vec![
            SimEvent::PlayerLeft { player: target },
            self.system_chat(format!("{} was removed from the garden", data.name)),
        ])
    }

    /// Appends an applied action to the history.
    ///
    /// Non-system players gain one contribution point and are marked active.
    pub fn record_action(
        &mut self,
        player: PlayerId,
        action: NetworkAction,
        container: Option<ContainerId>,
        detail: impl Into<String>,
    ) {
        let detail = detail.into();
        debug!("Action [{player}] {}: {detail}", action.display_name());
        self.actions.push(ActionLogEntry {
            player,
            action,
            container,
            detail,
            timestamp: self.elapsed,
        });
        if player.is_system() {
            return;
        }
        if let Some(data) = self.players.get_mut(&player) {
            data.contribution_score += 1;
        }
        self.touch(player);
    }

    /// Marks a player active now, bringing them back online if idle.
    pub fn touch(&mut self, player: PlayerId) {
        if let Some(data) = self.players.get_mut(&player) {
            data.last_active = self.elapsed;
            data.is_online = true;
        }
    }

    /// Posts a chat line.
    pub fn broadcast_chat(
        &mut self,
        sender: PlayerId,
        text: &str,
        is_system: bool,
    ) -> SimResult<SimEvent> {
        let sender_name = if is_system || sender.is_system() {
            SYSTEM_NAME.to_string()
        } else {
            self.players
                .get(&sender)
                .map(|p| p.name.clone())
                .ok_or(SimError::UnknownPlayer(sender))?
        };
        let message = ChatMessage {
            sender,
            sender_name,
            text: text.to_string(),
            timestamp: self.elapsed,
            is_system: is_system || sender.is_system(),
        };
        debug!("Chat [{}]: {}", message.sender_name, message.text);
        self.chat.push(message.clone());
        Ok(SimEvent::Chat(message))
    }

    fn system_chat(&mut self, text: String) -> SimEvent {
        let message = ChatMessage {
            sender: PlayerId::SYSTEM,
            sender_name: SYSTEM_NAME.to_string(),
            text,
            timestamp: self.elapsed,
            is_system: true,
        };
        self.chat.push(message.clone());
        SimEvent::Chat(message)
    }

    /// Marks players idle past the session timeout as offline.
    pub fn sweep_idle(&mut self) -> Vec<SimEvent> {
        let timeout = f64::from(self.settings.session_timeout_minutes) * 60.0;
        let now = self.elapsed;
        let mut events = Vec::new();
        for data in self.players.values_mut() {
            if data.is_online && now - data.last_active >= timeout {
                data.is_online = false;
                info!("Player {} marked offline after inactivity", data.name);
                events.push(SimEvent::PlayerIdle { player: data.id });
            }
        }
        events
    }

    /// Exports the registry as a flat record.
    #[must_use]
    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            settings: self.settings.clone(),
            players: self.players.values().cloned().collect(),
            owner: self.owner,
            elapsed: self.elapsed,
            chat: self.chat.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Rebuilds a registry from a record.
    ///
    /// Permission sets are recomputed from roles.
    #[must_use]
    pub fn from_record(record: SessionRecord) -> Self {
        let players = record
            .players
            .into_iter()
            .map(|mut p| {
                p.permissions = p.role.permissions();
                (p.id, p)
            })
            .collect::<BTreeMap<_, _>>();
        let owner = record.owner.filter(|id| players.contains_key(id));
        Self {
            settings: record.settings,
            players,
            owner,
            elapsed: record.elapsed,
            chat: record.chat,
            actions: record.actions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: PlayerId = PlayerId::from_raw(1);
    const B: PlayerId = PlayerId::from_raw(2);
    const C: PlayerId = PlayerId::from_raw(3);

    fn registry() -> PlayerRegistry {
        PlayerRegistry::default()
    }

    fn bump(registry: &mut PlayerRegistry, player: PlayerId, times: u32) {
        for _ in 0..times {
            registry.record_action(player, NetworkAction::PlantSeed, None, "test");
        }
    }

    #[test]
    fn test_first_joiner_owns() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        assert_eq!(reg.owner(), Some(A));
        assert_eq!(reg.get(A).map(|p| p.role), Some(PlayerRole::Owner));
        assert_eq!(reg.get(B).map(|p| p.role), Some(PlayerRole::Helper));
        assert_eq!(reg.chat().len(), 2);
    }

    #[test]
    fn test_visitors_when_not_allowed() {
        let mut reg = PlayerRegistry::new(SessionSettings {
            allow_visitors: false,
            ..Default::default()
        });
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        assert_eq!(reg.get(B).map(|p| p.role), Some(PlayerRole::Visitor));
    }

    #[test]
    fn test_join_limits() {
        let mut reg = PlayerRegistry::new(SessionSettings {
            max_players: 2,
            ..Default::default()
        });
        reg.join(A, "Alice").expect("join");
        assert_eq!(reg.join(A, "Alice again"), Err(SimError::AlreadyConnected(A)));
        reg.join(B, "Bob").expect("join");
        assert_eq!(reg.join(C, "Carol"), Err(SimError::SessionFull { max: 2 }));
    }

    #[test]
    fn test_offline_player_can_rejoin() {
        let mut reg = PlayerRegistry::new(SessionSettings {
            session_timeout_minutes: 1.0,
            ..Default::default()
        });
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        reg.advance(61.0);
        assert_eq!(reg.sweep_idle().len(), 2);

        let events = reg.join(B, "Bob").expect("rejoin");
        assert!(events.contains(&SimEvent::PlayerJoined {
            player: B,
            name: "Bob".to_string(),
            role: PlayerRole::Helper,
        }));
        assert_eq!(reg.player_count(), 2);
        assert_eq!(reg.online_count(), 1);
    }

    #[test]
    fn test_ownership_hand_off_to_top_contributor() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        bump(&mut reg, A, 5);
        bump(&mut reg, B, 12);

        let events = reg.leave(A).expect("leave");
        assert_eq!(reg.owner(), Some(B));
        let bob = reg.get(B).expect("bob present");
        assert_eq!(bob.role, PlayerRole::Owner);
        assert_eq!(bob.permissions, PlayerPermissions::ALL);
        assert!(events.contains(&SimEvent::OwnershipTransferred {
            from: Some(A),
            to: B,
        }));
    }

    #[test]
    fn test_hand_off_tie_goes_to_first() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(C, "Carol").expect("join");
        reg.join(B, "Bob").expect("join");
        bump(&mut reg, B, 3);
        bump(&mut reg, C, 3);
        reg.leave(A).expect("leave");
        assert_eq!(reg.owner(), Some(B));
    }

    #[test]
    fn test_hand_off_prefers_online_players() {
        let mut reg = PlayerRegistry::new(SessionSettings {
            session_timeout_minutes: 1.0,
            ..Default::default()
        });
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        bump(&mut reg, B, 12);
        reg.advance(30.0);
        bump(&mut reg, A, 1);
        reg.advance(40.0);
        assert_eq!(reg.sweep_idle(), vec![SimEvent::PlayerIdle { player: B }]);

        reg.join(C, "Carol").expect("join");
        reg.leave(A).expect("leave");
        assert_eq!(reg.owner(), Some(C));
        assert_eq!(reg.get(B).map(|p| p.role), Some(PlayerRole::Helper));

        // With nobody online the top offline contributor still takes over.
        reg.advance(120.0);
        assert_eq!(reg.sweep_idle(), vec![SimEvent::PlayerIdle { player: C }]);
        reg.leave(C).expect("leave");
        assert_eq!(reg.owner(), Some(B));
    }

    #[test]
    fn test_last_owner_leaving_empties_session() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.leave(A).expect("leave");
        assert_eq!(reg.owner(), None);
        assert_eq!(reg.leave(A), Err(SimError::UnknownPlayer(A)));
    }

    #[test]
    fn test_set_role_recomputes_permissions() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        reg.set_role(B, PlayerRole::Manager).expect("set role");
        let bob = reg.get(B).expect("bob present");
        assert_eq!(bob.permissions, PlayerRole::Manager.permissions());

        reg.set_role(B, PlayerRole::Visitor).expect("set role");
        assert_eq!(reg.permissions(B), Some(&PlayerPermissions::NONE));
    }

    #[test]
    fn test_owner_transfer_and_demotion_rules() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        assert!(matches!(
            reg.set_role(A, PlayerRole::Helper),
            Err(SimError::InvalidState(_))
        ));

        reg.set_role(B, PlayerRole::Owner).expect("transfer");
        assert_eq!(reg.owner(), Some(B));
        assert_eq!(reg.get(A).map(|p| p.role), Some(PlayerRole::Manager));
        assert_eq!(reg.get(B).map(|p| p.role), Some(PlayerRole::Owner));
    }

    #[test]
    fn test_kick() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        assert!(reg.kick(A, "nope").is_err());
        let events = reg.kick(B, "spam").expect("kick");
        assert_eq!(events.first(), Some(&SimEvent::PlayerLeft { player: B }));
        assert!(reg.get(B).is_none());
        assert_eq!(
            reg.chat().last().map(|m| m.text.as_str()),
            Some("Bob was removed from the garden")
        );
    }

    #[test]
    fn test_contribution_and_history() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        bump(&mut reg, A, 3);
        reg.record_action(PlayerId::SYSTEM, NetworkAction::ManagePermissions, None, "sys");
        assert_eq!(reg.get(A).map(|p| p.contribution_score), Some(3));
        assert_eq!(reg.actions().len(), 4);

        for i in 0..600 {
            reg.record_action(A, NetworkAction::WaterPlant, None, format!("{i}"));
        }
        assert_eq!(reg.actions().len(), ACTION_HISTORY_CAP);
    }

    #[test]
    fn test_chat() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        let event = reg.broadcast_chat(A, "hello", false).expect("chat");
        assert!(matches!(event, SimEvent::Chat(ref m) if m.sender_name == "Alice"));
        assert_eq!(reg.broadcast_chat(B, "hi", false), Err(SimError::UnknownPlayer(B)));
    }

    #[test]
    fn test_idle_sweep() {
        let mut reg = PlayerRegistry::new(SessionSettings {
            session_timeout_minutes: 1.0,
            ..Default::default()
        });
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        reg.advance(30.0);
        bump(&mut reg, B, 1);
        reg.advance(40.0);

        let events = reg.sweep_idle();
        assert_eq!(events, vec![SimEvent::PlayerIdle { player: A }]);
        assert_eq!(reg.online_count(), 1);
        assert!(reg.sweep_idle().is_empty());

        bump(&mut reg, A, 1);
        assert_eq!(reg.online_count(), 2);
    }

    #[test]
    fn test_record_round_trip() {
        let mut reg = registry();
        reg.join(A, "Alice").expect("join");
        reg.join(B, "Bob").expect("join");
        bump(&mut reg, B, 2);
        let record = reg.to_record();
        let restored = PlayerRegistry::from_record(record.clone());
        assert_eq!(restored.to_record(), record);
        assert_eq!(restored.owner(), Some(A));
    }
}
