//! Player records and the player-state store contract.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::creature::{CreatureId, Health};
use crate::store::StoreError;
use crate::world::Pos;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    #[must_use]
    pub fn new(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    #[serde(default)]
    pub name: String,
    /// Canonical position.
    pub pos: Pos,
    /// Transient copy of the position cached by a view; must not outlive a tick.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_pos: Option<Pos>,
    pub hp: Health,
    #[serde(default = "Player::default_level")]
    pub level: i32,
    #[serde(default)]
    pub ions: i64,
    #[serde(default)]
    pub riblets: i64,
    #[serde(default)]
    pub ready_target: Option<CreatureId>,
}

impl Player {
    const fn default_level() -> i32 {
        1
    }

    #[must_use]
    pub fn new(id: &str, pos: Pos, hp: i32) -> Self {
        Self {
            id: PlayerId::new(id),
            name: id.to_string(),
            pos,
            view_pos: None,
            hp: Health::full(hp),
            level: 1,
            ions: 0,
            riblets: 0,
            ready_target: None,
        }
    }
}

/// Access to the live player profile.
pub trait PlayerStore {
    /// The player whose command is being processed.
    fn active(&self) -> Option<&Player>;

    fn active_mut(&mut self) -> Option<&mut Player>;

    fn canonical_pos(&self) -> Option<Pos> {
        self.active().map(|player| player.pos)
    }

    fn clear_ready_target(&mut self) {
        if let Some(player) = self.active_mut() {
            player.ready_target = None;
        }
    }

    fn mark_dirty(&mut self);

    fn is_dirty(&self) -> bool;

    /// Persist the live profile and clear the dirty flag.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` when the backing store rejects the write.
    fn save(&mut self) -> Result<(), StoreError>;
}

/// In-memory player store; `save` snapshots the roster.
#[derive(Debug, Clone, Default)]
pub struct MemoryPlayerStore {
    players: BTreeMap<PlayerId, Player>,
    active: Option<PlayerId>,
    dirty: bool,
    saved: Option<BTreeMap<PlayerId, Player>>,
    saves: u32,
}

impl MemoryPlayerStore {
    #[must_use]
    pub fn with_active(player: Player) -> Self {
        let mut store = Self::default();
        store.active = Some(player.id.clone());
        store.players.insert(player.id.clone(), player);
        store
    }

    pub fn insert(&mut self, player: Player) {
        self.players.insert(player.id.clone(), player);
    }

    pub fn set_active(&mut self, id: &PlayerId) -> bool {
        if self.players.contains_key(id) {
            self.active = Some(id.clone());
            return true;
        }
        false
    }

    #[must_use]
    pub fn get(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    #[must_use]
    pub const fn saves(&self) -> u32 {
        self.saves
    }

    #[must_use]
    pub const fn last_saved(&self) -> Option<&BTreeMap<PlayerId, Player>> {
        self.saved.as_ref()
    }
}

impl PlayerStore for MemoryPlayerStore {
    fn active(&self) -> Option<&Player> {
        self.active.as_ref().and_then(|id| self.players.get(id))
    }

    fn active_mut(&mut self) -> Option<&mut Player> {
        let id = self.active.clone()?;
        self.players.get_mut(&id)
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn save(&mut self) -> Result<(), StoreError> {
        self.saved = Some(self.players.clone());
        self.saves = self.saves.saturating_add(1);
        self.dirty = false;
        Ok(())
    }
}
