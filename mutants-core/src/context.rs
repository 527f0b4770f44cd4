//! Narrow key/value capability shared by the scheduler and the AI.
//!
//! The scheduler only ever talks to a [`Context`] through `get`/`set`; both a
//! plain map ([`ContextMap`]) and a struct with named slots ([`AiContext`])
//! satisfy it.
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use crate::config::sanitize_credit_weights;
use crate::creature::CreatureId;
use crate::rng::RngHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContextKey {
    /// Stream every AI decision draws from during a tick.
    AiRng,
    /// Optional dedicated stream for wake checks.
    WakeRng,
    /// Payload set while a bonus action replays the cascade.
    BonusAction,
    PrefersRanged,
    AllowPickup,
    AllowHeal,
    CreditWeights,
    /// Overrides the configured bonus pickup bias.
    BonusPickupPct,
}

/// Bonus replay marker threaded through the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonusAction {
    pub monster_id: CreatureId,
    pub force_pickup: bool,
}

#[derive(Debug, Clone)]
pub enum ContextValue {
    Rng(RngHandle),
    Bonus(BonusAction),
    Flag(bool),
    Weights(Vec<f64>),
    Percent(i32),
}

pub trait Context {
    fn get(&self, key: ContextKey) -> Option<&ContextValue>;

    /// Store `value` (or clear the slot with `None`), returning the previous value.
    fn set(&mut self, key: ContextKey, value: Option<ContextValue>) -> Option<ContextValue>;
}

/// Typed readers layered over any [`Context`].
pub trait ContextExt: Context {
    fn rng(&self, key: ContextKey) -> Option<RngHandle> {
        match self.get(key) {
            Some(ContextValue::Rng(handle)) => Some(handle.clone()),
            _ => None,
        }
    }

    fn flag(&self, key: ContextKey) -> Option<bool> {
        match self.get(key) {
            Some(ContextValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    fn percent(&self, key: ContextKey) -> Option<i32> {
        match self.get(key) {
            Some(ContextValue::Percent(value)) => Some(*value),
            _ => None,
        }
    }

    fn bonus_action(&self) -> Option<BonusAction> {
        match self.get(ContextKey::BonusAction) {
            Some(ContextValue::Bonus(bonus)) => Some(bonus.clone()),
            _ => None,
        }
    }

    /// Sanitized credit weights, if the context carries a usable override.
    fn credit_weights(&self) -> Option<[f64; 4]> {
        match self.get(ContextKey::CreditWeights) {
            Some(ContextValue::Weights(raw)) => Some(sanitize_credit_weights(raw)),
            _ => None,
        }
    }
}

impl<T: Context + ?Sized> ContextExt for T {}

/// Map-backed context.
#[derive(Debug, Clone, Default)]
pub struct ContextMap(BTreeMap<ContextKey, ContextValue>);

impl ContextMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, key: ContextKey) -> bool {
        self.0.contains_key(&key)
    }
}

impl Context for ContextMap {
    fn get(&self, key: ContextKey) -> Option<&ContextValue> {
        self.0.get(&key)
    }

    fn set(&mut self, key: ContextKey, value: Option<ContextValue>) -> Option<ContextValue> {
        match value {
            Some(value) => self.0.insert(key, value),
            None => self.0.remove(&key),
        }
    }
}

/// Struct-backed context with one slot per key.
#[derive(Debug, Clone, Default)]
pub struct AiContext {
    pub ai_rng: Option<ContextValue>,
    pub wake_rng: Option<ContextValue>,
    pub bonus_action: Option<ContextValue>,
    pub prefers_ranged: Option<ContextValue>,
    pub allow_pickup: Option<ContextValue>,
    pub allow_heal: Option<ContextValue>,
    pub credit_weights: Option<ContextValue>,
    pub bonus_pickup_pct: Option<ContextValue>,
}

impl AiContext {
    fn slot(&self, key: ContextKey) -> &Option<ContextValue> {
        match key {
            ContextKey::AiRng => &self.ai_rng,
            ContextKey::WakeRng => &self.wake_rng,
            ContextKey::BonusAction => &self.bonus_action,
            ContextKey::PrefersRanged => &self.prefers_ranged,
            ContextKey::AllowPickup => &self.allow_pickup,
            ContextKey::AllowHeal => &self.allow_heal,
            ContextKey::CreditWeights => &self.credit_weights,
            ContextKey::BonusPickupPct => &self.bonus_pickup_pct,
        }
    }

    fn slot_mut(&mut self, key: ContextKey) -> &mut Option<ContextValue> {
        match key {
            ContextKey::AiRng => &mut self.ai_rng,
            ContextKey::WakeRng => &mut self.wake_rng,
            ContextKey::BonusAction => &mut self.bonus_action,
            ContextKey::PrefersRanged => &mut self.prefers_ranged,
            ContextKey::AllowPickup => &mut self.allow_pickup,
            ContextKey::AllowHeal => &mut self.allow_heal,
            ContextKey::CreditWeights => &mut self.credit_weights,
            ContextKey::BonusPickupPct => &mut self.bonus_pickup_pct,
        }
    }
}

impl Context for AiContext {
    fn get(&self, key: ContextKey) -> Option<&ContextValue> {
        self.slot(key).as_ref()
    }

    fn set(&mut self, key: ContextKey, value: Option<ContextValue>) -> Option<ContextValue> {
        std::mem::replace(self.slot_mut(key), value)
    }
}

/// Scoped binding of a value into a context slot.
///
/// The previous value (or absence) is restored when the guard drops, on every
/// exit path including unwinding.
pub struct SlotGuard<'a> {
    ctx: &'a mut dyn Context,
    key: ContextKey,
    previous: Option<ContextValue>,
}

impl<'a> SlotGuard<'a> {
    pub fn bind(ctx: &'a mut dyn Context, key: ContextKey, value: ContextValue) -> Self {
        let previous = ctx.set(key, Some(value));
        Self { ctx, key, previous }
    }
}

impl<'a> Deref for SlotGuard<'a> {
    type Target = dyn Context + 'a;

    fn deref(&self) -> &Self::Target {
        self.ctx
    }
}

impl DerefMut for SlotGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.ctx
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        let previous = self.previous.take();
        self.ctx.set(self.key, previous);
    }
}
