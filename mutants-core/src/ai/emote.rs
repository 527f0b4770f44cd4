//! Flavour lines a creature can push to the feedback bus.
use rand::{Rng, RngCore};
use serde_json::json;

use crate::constants::READY_TAUNT_PCT;
use crate::creature::Creature;
use crate::feedback::{FeedbackBus, FeedbackKind};
use crate::rng::percent_roll;

pub const EMOTES: [&str; 20] = [
    "{monster} is looking awfully sad.",
    "{monster} is singing a strange song.",
    "{monster} is making strange noises.",
    "{monster} looks at you.",
    "{monster} is pondering life.",
    "{monster} is doing a dance.",
    "{monster} yawns.",
    "{monster} is picking its teeth.",
    "{monster} scratches itself.",
    "{monster} grunts at you.",
    "{monster} is sniffing the air.",
    "{monster} mutters under its breath.",
    "{monster} glares at the ceiling.",
    "{monster} shifts its weight uneasily.",
    "{monster} cracks its knuckles.",
    "{monster} hums tunelessly.",
    "{monster} licks its lips.",
    "{monster} stares off into space.",
    "{monster} paces back and forth.",
    "{monster} lets out a low growl.",
];

pub const READY_TAUNT: &str = "{monster} readies itself to strike at {target}!";

/// What an emote turn produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmoteLine {
    Emote(usize),
    Taunt,
}

/// Push an emote, or occasionally a ready taunt, for `creature`.
pub fn emit_emote(
    creature: &Creature,
    target: Option<&str>,
    feedback: &mut FeedbackBus,
    rng: &mut dyn RngCore,
) -> EmoteLine {
    let monster = creature.display_name();
    if let Some(target) = target
        && percent_roll(rng) < READY_TAUNT_PCT
    {
        feedback.push(
            FeedbackKind::Taunt,
            READY_TAUNT,
            json!({ "monster": monster, "target": target }),
        );
        return EmoteLine::Taunt;
    }
    let index = rng.gen_range(0..EMOTES.len());
    feedback.push(
        FeedbackKind::Emote,
        EMOTES[index],
        json!({ "monster": monster }),
    );
    EmoteLine::Emote(index)
}
