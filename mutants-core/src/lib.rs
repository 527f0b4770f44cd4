//! Mutants simulation core
//!
//! Deterministic turn scheduler and creature decision engine for a tile-grid
//! role-playing game. Persistence, rendering and command parsing live with the
//! caller; this crate only talks to them through the store and bus traits.

pub mod ai;
pub mod catalog;
pub mod combat;
pub mod config;
pub mod constants;
pub mod context;
pub mod creature;
pub mod feedback;
pub mod items;
pub mod numbers;
pub mod player;
pub mod rng;
pub mod scheduler;
pub mod session;
pub mod spawner;
pub mod species;
pub mod state;
pub mod status;
pub mod store;
pub mod turnlog;
pub mod world;

// Re-export commonly used types
pub use ai::{
    Action, ActionError, ActionOutcome, AttackPlan, Decision, DispatchSummary, Gate, GateDetail,
    WakeEvent, attempt_pursuit, evaluate_cascade, execute_random_action, on_player_command,
    select_attack, should_wake, update_target_positions,
};
pub use catalog::{ItemCatalog, ItemTemplate};
pub use combat::{AttackSource, DamageEngine, DamageResult, StandardDamage};
pub use config::{CombatConfig, CombatConfigOverlay, ConfigError};
pub use constants::{BARE_HANDED_ID, BROKEN_ARMOUR_ID, BROKEN_WEAPON_ID, TURN_STREAM, WAKE_STREAM};
pub use context::{AiContext, Context, ContextExt, ContextKey, ContextMap, ContextValue};
pub use creature::{Creature, CreatureId, Health};
pub use feedback::{Feedback, FeedbackBus, FeedbackKind};
pub use items::{ItemArena, ItemError, ItemId, ItemOrigin, ItemRecord, Owner};
pub use player::{MemoryPlayerStore, Player, PlayerId, PlayerStore};
pub use rng::{CountingRng, RngError, RngHandle, RngPool};
pub use scheduler::{
    CommandEcho, FreeAction, TickReport, TurnScheduler, queue_bonus_action, queue_free_emote,
    queue_player_respawn,
};
pub use session::GameSession;
pub use spawner::{FloorSpawner, SpawnError, SpawnReport, SpawnTemplate, Spawner, YearFloor};
pub use species::{SpeciesProfile, SpeciesTable, ThresholdOverride};
pub use state::SimState;
pub use status::StatusManager;
pub use store::{CreatureStore, MemoryCreatureStore, StoreError};
pub use turnlog::{TurnLog, TurnLogEntry};
pub use world::{Direction, EdgeResolver, EdgeResult, GridMap, Pos};
