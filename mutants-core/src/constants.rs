//! Centralized tuning constants and turn-log kinds for the simulation core.
//!
//! Percent thresholds that designers tune live in `CombatConfig`; the values
//! here are structural and only change through reviewed code.

// Turn log kinds ------------------------------------------------------------
pub(crate) const LOG_TURN_TICK: &str = "TURN/TICK";
pub(crate) const LOG_TURN_FREE: &str = "TURN/FREE";
pub(crate) const LOG_TURN_BONUS: &str = "TURN/BONUS";
pub(crate) const LOG_TURN_RESPAWN: &str = "TURN/RESPAWN";
pub(crate) const LOG_TURN_FAILURE: &str = "TURN/FAILURE";
pub(crate) const LOG_AI_GATE: &str = "AI/GATE";
pub(crate) const LOG_AI_TICK: &str = "AI/TICK";
pub(crate) const LOG_AI_REENTRY: &str = "AI/REENTRY";
pub(crate) const LOG_AI_WAKE: &str = "AI/WAKE";
pub(crate) const LOG_AI_TARGET: &str = "AI/TARGET";
pub(crate) const LOG_AI_PURSUIT: &str = "AI/PURSUIT";
pub(crate) const LOG_AI_ACT_PREFIX: &str = "AI/ACT/";
pub(crate) const LOG_ITEM_CONVERT: &str = "ITEM/CONVERT";
pub(crate) const LOG_ITEM_PICKUP: &str = "ITEM/PICKUP";
pub(crate) const LOG_ITEM_DROP: &str = "ITEM/DROP";
pub(crate) const LOG_COMBAT_HIT: &str = "COMBAT/HIT";
pub(crate) const LOG_COMBAT_KILL: &str = "COMBAT/KILL";
pub(crate) const LOG_CHECK_POS: &str = "CHECK/POS";
pub(crate) const LOG_STATUS_EXPIRED: &str = "STATUS/EXPIRED";
pub(crate) const LOG_SPAWN: &str = "SPAWN/CREATURE";

// Default stream names --------------------------------------------------------
pub const TURN_STREAM: &str = "turn";
pub const WAKE_STREAM: &str = "wake";

// Reserved catalog ids --------------------------------------------------------
pub const BROKEN_WEAPON_ID: &str = "broken_weapon";
pub const BROKEN_ARMOUR_ID: &str = "broken_armour";
pub const BARE_HANDED_ID: &str = "skull";

// Pursuit ---------------------------------------------------------------------
pub(crate) const PURSUIT_BASE_CHANCE: i32 = 70;
pub(crate) const PURSUIT_HP_DISTRACTION_PCT: i32 = 40;
pub(crate) const PURSUIT_LOOT_PENALTY: i32 = 20;
pub(crate) const PURSUIT_ION_PENALTY: i32 = 15;
pub(crate) const PURSUIT_HP_PENALTY: i32 = 20;
pub(crate) const PURSUIT_CRACKED_PENALTY: i32 = 25;

// Cascade ---------------------------------------------------------------------
pub(crate) const PANIC_LEVEL_DELTA: i32 = 5;
pub(crate) const LEVEL_DELTA_FLEE_SHIFT: i32 = 5;
pub(crate) const LOW_ION_SPEND_FACTOR: f64 = 0.6;
pub(crate) const LOW_ION_CONVERT_BONUS: i32 = 10;
pub(crate) const CRACKED_ATTACK_FACTOR: f64 = 0.5;

// Attack selection ------------------------------------------------------------
pub(crate) const ENCHANT_POWER_STEP: i32 = 4;
pub(crate) const CRACKED_POWER_NUM: i32 = 3;
pub(crate) const CRACKED_POWER_DEN: i32 = 4;
pub(crate) const RANGED_PREFERENCE_FACTOR: f64 = 1.2;
pub(crate) const INNATE_PREFERENCE_FACTOR: f64 = 1.3;
pub(crate) const WEAPON_WEIGHT_FLOOR: i32 = 10;
pub(crate) const INNATE_BASELINE_WEIGHT: i32 = 100;

// Actions ---------------------------------------------------------------------
pub(crate) const HEAL_LEVEL_BONUS: i32 = 5;
pub(crate) const CAST_LEVEL_BONUS: i32 = 2;
pub(crate) const WEAPON_DROP_PCT: i32 = 80;
pub(crate) const READY_TAUNT_PCT: i32 = 5;
pub(crate) const PICKUP_DAMAGE_WEIGHT: i64 = 1_000;
