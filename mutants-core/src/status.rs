//! Timed status effects on players and creatures.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StatusKey {
    pub target: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiredStatus {
    pub target: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusManager {
    active: BTreeMap<StatusKey, u32>,
}

impl StatusManager {
    /// Apply `status` to `target`; re-applying keeps the longer duration.
    pub fn apply(&mut self, target: &str, status: &str, duration: u32) {
        if duration == 0 {
            return;
        }
        let key = StatusKey {
            target: target.to_string(),
            status: status.to_string(),
        };
        let remaining = self.active.entry(key).or_insert(0);
        *remaining = (*remaining).max(duration);
    }

    #[must_use]
    pub fn remaining(&self, target: &str, status: &str) -> Option<u32> {
        self.active
            .iter()
            .find(|(key, _)| key.target == target && key.status == status)
            .map(|(_, left)| *left)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Advance every duration by `amount`, returning what expired.
    pub fn tick(&mut self, amount: u32) -> Vec<ExpiredStatus> {
        let mut expired = Vec::new();
        self.active.retain(|key, left| {
            *left = left.saturating_sub(amount);
            if *left == 0 {
                expired.push(ExpiredStatus {
                    target: key.target.clone(),
                    status: key.status.clone(),
                });
                false
            } else {
                true
            }
        });
        expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reapply_keeps_longest_and_tick_expires() {
        let mut manager = StatusManager::default();
        manager.apply("p1", "poison", 3);
        manager.apply("p1", "poison", 1);
        manager.apply("m1", "stun", 1);
        assert_eq!(manager.remaining("p1", "poison"), Some(3));

        let expired = manager.tick(1);
        assert_eq!(
            expired,
            vec![ExpiredStatus {
                target: "m1".to_string(),
                status: "stun".to_string()
            }]
        );
        assert_eq!(manager.remaining("p1", "poison"), Some(2));
        assert_eq!(manager.tick(5).len(), 1);
        assert!(manager.is_empty());
    }
}
