//! Tile geometry, edge passability and path finding.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

use crate::creature::CreatureId;

/// Canonical (year, x, y) tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub year: i32,
    pub x: i32,
    pub y: i32,
}

impl Pos {
    #[must_use]
    pub const fn new(year: i32, x: i32, y: i32) -> Self {
        Self { year, x, y }
    }

    #[must_use]
    pub const fn same_year(&self, other: &Self) -> bool {
        self.year == other.year
    }

    #[must_use]
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            year: self.year,
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    #[must_use]
    pub const fn with_xy(self, x: i32, y: i32) -> Self {
        Self {
            year: self.year,
            x,
            y,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.year, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "N")]
    North,
    #[serde(rename = "S")]
    South,
    #[serde(rename = "E")]
    East,
    #[serde(rename = "W")]
    West,
}

impl Direction {
    /// Probe order used when a creature has to pick an exit.
    pub const ALL: [Self; 4] = [Self::East, Self::West, Self::North, Self::South];

    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::North => (0, 1),
            Self::South => (0, -1),
            Self::East => (1, 0),
            Self::West => (-1, 0),
        }
    }

    #[must_use]
    pub const fn from_delta(dx: i32, dy: i32) -> Option<Self> {
        match (dx, dy) {
            (1, 0) => Some(Self::East),
            (-1, 0) => Some(Self::West),
            (0, 1) => Some(Self::North),
            (0, -1) => Some(Self::South),
            _ => None,
        }
    }

    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::North => Self::South,
            Self::South => Self::North,
            Self::East => Self::West,
            Self::West => Self::East,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::North => "N",
            Self::South => "S",
            Self::East => "E",
            Self::West => "W",
        }
    }
}

/// Result of asking whether an edge can be crossed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResult {
    pub passable: bool,
    pub reason: &'static str,
}

impl EdgeResult {
    #[must_use]
    pub const fn open() -> Self {
        Self {
            passable: true,
            reason: "open",
        }
    }

    #[must_use]
    pub const fn blocked(reason: &'static str) -> Self {
        Self {
            passable: false,
            reason,
        }
    }
}

/// Edge passability and routing for the tile grid.
pub trait EdgeResolver {
    /// Can `actor` leave `from` heading `dir`?
    fn resolve(&self, from: Pos, dir: Direction, actor: &CreatureId) -> EdgeResult;

    /// Tiles from `start` to `end` inclusive within `year`; fewer than two
    /// entries means there is no route.
    fn find_path_between(&self, year: i32, start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)>;
}

/// Square grid per year with optional blocked edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMap {
    pub min: i32,
    pub max: i32,
    #[serde(default)]
    walls: BTreeSet<(Pos, Direction)>,
}

impl GridMap {
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self {
            min,
            max,
            walls: BTreeSet::new(),
        }
    }

    /// Block the edge between `pos` and its neighbour in `dir`, both ways.
    pub fn wall(&mut self, pos: Pos, dir: Direction) {
        self.walls.insert((pos, dir));
        self.walls.insert((pos.step(dir), dir.opposite()));
    }

    #[must_use]
    pub const fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= self.min && x <= self.max && y >= self.min && y <= self.max
    }

    fn edge(&self, from: Pos, dir: Direction) -> EdgeResult {
        let to = from.step(dir);
        if !self.in_bounds(to.x, to.y) {
            return EdgeResult::blocked("boundary");
        }
        if self.walls.contains(&(from, dir)) {
            return EdgeResult::blocked("wall");
        }
        EdgeResult::open()
    }
}

impl Default for GridMap {
    fn default() -> Self {
        Self::new(-15, 15)
    }
}

impl EdgeResolver for GridMap {
    fn resolve(&self, from: Pos, dir: Direction, _actor: &CreatureId) -> EdgeResult {
        self.edge(from, dir)
    }

    fn find_path_between(&self, year: i32, start: (i32, i32), end: (i32, i32)) -> Vec<(i32, i32)> {
        if !self.in_bounds(start.0, start.1) || !self.in_bounds(end.0, end.1) {
            return Vec::new();
        }
        if start == end {
            return vec![start];
        }
        let mut came_from: BTreeMap<(i32, i32), (i32, i32)> = BTreeMap::new();
        let mut queue = VecDeque::from([start]);
        came_from.insert(start, start);
        while let Some(current) = queue.pop_front() {
            if current == end {
                break;
            }
            let here = Pos::new(year, current.0, current.1);
            for dir in Direction::ALL {
                if !self.edge(here, dir).passable {
                    continue;
                }
                let next = here.step(dir);
                let key = (next.x, next.y);
                if came_from.contains_key(&key) {
                    continue;
                }
                came_from.insert(key, current);
                queue.push_back(key);
            }
        }
        if !came_from.contains_key(&end) {
            return Vec::new();
        }
        let mut path = vec![end];
        let mut cursor = end;
        while cursor != start {
            let Some(prev) = came_from.get(&cursor) else {
                return Vec::new();
            };
            cursor = *prev;
            path.push(cursor);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> CreatureId {
        CreatureId::new("rat#1")
    }

    #[test]
    fn directions_round_trip_deltas() {
        for dir in Direction::ALL {
            let (dx, dy) = dir.delta();
            assert_eq!(Direction::from_delta(dx, dy), Some(dir));
        }
        assert_eq!(Direction::from_delta(1, 1), None);
        assert_eq!(Direction::East.code(), "E");
    }

    #[test]
    fn walls_block_both_sides() {
        let mut grid = GridMap::new(0, 4);
        let origin = Pos::new(2000, 1, 1);
        grid.wall(origin, Direction::East);
        assert!(!grid.resolve(origin, Direction::East, &actor()).passable);
        assert!(
            !grid
                .resolve(origin.step(Direction::East), Direction::West, &actor())
                .passable
        );
        assert_eq!(
            grid.resolve(Pos::new(2000, 4, 4), Direction::North, &actor()),
            EdgeResult::blocked("boundary")
        );
    }

    #[test]
    fn path_routes_around_walls() {
        let mut grid = GridMap::new(0, 2);
        grid.wall(Pos::new(2000, 0, 0), Direction::East);
        let path = grid.find_path_between(2000, (0, 0), (1, 0));
        assert_eq!(path.first(), Some(&(0, 0)));
        assert_eq!(path.last(), Some(&(1, 0)));
        assert!(path.len() > 2);
    }

    #[test]
    fn sealed_target_has_no_route() {
        let mut grid = GridMap::new(0, 2);
        let target = Pos::new(2000, 2, 2);
        grid.wall(target, Direction::West);
        grid.wall(target, Direction::South);
        assert!(grid.find_path_between(2000, (0, 0), (2, 2)).len() < 2);
    }
}
