//! Plain-text command scripts.
//!
//! One command per line: `[<count>x] <token> [-> <resolved>]`. Blank lines and
//! `#` comments are skipped. A resolved `north`/`south`/`east`/`west` moves the
//! player one tile when the edge is open; `travel:<year>` moves them to the same
//! tile in another year. Anything else is echoed to the scheduler untouched.
use anyhow::{Context, Result, bail};
use mutants_core::{CommandEcho, CreatureId, Direction, GameSession, SimState, TickReport};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(?P<count>\d+)\s*x\s+)?(?P<token>\S+?)(?:\s*->\s*(?P<resolved>\S+))?$")
        .expect("command pattern is valid")
});

const MAX_REPEAT: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptCommand {
    pub token: String,
    pub resolved: Option<String>,
}

impl ScriptCommand {
    /// The word that decides what the player does: the resolved form when present.
    pub fn verb(&self) -> &str {
        self.resolved.as_deref().unwrap_or(&self.token)
    }

    pub fn direction(&self) -> Option<Direction> {
        match self.verb().to_ascii_lowercase().as_str() {
            "n" | "north" => Some(Direction::North),
            "s" | "south" => Some(Direction::South),
            "e" | "east" => Some(Direction::East),
            "w" | "west" => Some(Direction::West),
            _ => None,
        }
    }

    pub fn travel_year(&self) -> Option<i32> {
        self.verb()
            .strip_prefix("travel:")
            .and_then(|year| year.parse().ok())
    }

    fn echo(&self) -> CommandEcho {
        CommandEcho::new(&self.token, self.resolved.as_deref())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    pub commands: Vec<ScriptCommand>,
}

impl Script {
    pub fn parse(text: &str) -> Result<Self> {
        let mut commands = Vec::new();
        for (index, raw) in text.lines().enumerate() {
            let line = raw.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let Some(caps) = LINE.captures(line) else {
                bail!("line {}: cannot parse '{line}'", index + 1);
            };
            let count = match caps.name("count") {
                Some(count) => count
                    .as_str()
                    .parse::<usize>()
                    .with_context(|| format!("line {}: bad repeat count", index + 1))?,
                None => 1,
            };
            if count == 0 || count > MAX_REPEAT {
                bail!(
                    "line {}: repeat count {count} outside 1..={MAX_REPEAT}",
                    index + 1
                );
            }
            let command = ScriptCommand {
                token: caps["token"].to_string(),
                resolved: caps.name("resolved").map(|m| m.as_str().to_string()),
            };
            commands.extend(std::iter::repeat_n(command, count));
        }
        Ok(Self { commands })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::parse(&text)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Run every command as one tick of `session`.
    pub fn play(&self, session: &mut GameSession) -> Result<Vec<TickReport>> {
        let mut reports = Vec::with_capacity(self.commands.len());
        for command in &self.commands {
            let report = session
                .tick(|state, _| {
                    apply_player_move(state, command);
                    Ok(command.echo())
                })
                .with_context(|| format!("command '{}'", command.token))?;
            reports.push(report);
        }
        Ok(reports)
    }
}

fn apply_player_move(state: &mut SimState, command: &ScriptCommand) {
    let Some(player) = state.players.active() else {
        return;
    };
    let from = player.pos;
    let actor = CreatureId::new(&player.id.0);
    let destination = if let Some(dir) = command.direction() {
        let edge = state.edges.resolve(from, dir, &actor);
        if !edge.passable {
            log::debug!("player blocked heading {}: {}", dir.code(), edge.reason);
            return;
        }
        from.step(dir)
    } else if let Some(year) = command.travel_year() {
        mutants_core::Pos::new(year, from.x, from.y)
    } else {
        return;
    };
    if let Some(player) = state.players.active_mut() {
        player.pos = destination;
        state.players.mark_dirty();
    }
}
