//! Terrain cells of the grid world.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::gridworld::{Action, Coord};

/// The terrain of a cell. A portal carries the coordinate of its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    Plain,
    Obstacle,
    Portal(Coord),
    Trap,
    Start,
    End,
    RestArea,
}

/// Reward collected when standing on each kind of cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Rewards {
    pub plain: f64,
    pub obstacle: f64,
    pub portal: f64,
    pub trap: f64,
    pub start: f64,
    pub end: f64,
    pub rest_area: f64,
}

impl Default for Rewards {
    fn default() -> Self {
        Self {
            plain: -1.0,
            obstacle: 0.0,
            portal: -1.0,
            trap: -10.0,
            start: -5.0,
            end: 100.0,
            rest_area: 0.0,
        }
    }
}

impl Rewards {
    pub fn for_kind(&self, kind: CellKind) -> f64 {
        match kind {
            CellKind::Plain => self.plain,
            CellKind::Obstacle => self.obstacle,
            CellKind::Portal(_) => self.portal,
            CellKind::Trap => self.trap,
            CellKind::Start => self.start,
            CellKind::End => self.end,
            CellKind::RestArea => self.rest_area,
        }
    }

    /// Every reward must be a finite number.
    pub fn validate(&self) -> Result<()> {
        let named = [
            ("plain", self.plain),
            ("obstacle", self.obstacle),
            ("portal", self.portal),
            ("trap", self.trap),
            ("start", self.start),
            ("end", self.end),
            ("rest_area", self.rest_area),
        ];
        for (name, value) in named {
            if !value.is_finite() {
                return Err(Error::InvalidArgument(format!(
                    "reward for {name} cells must be a finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// A single grid cell: its terrain, the reward for standing on it, and the
/// cells reachable from it in one move.
///
/// `neighbors` stays empty until the owning grid derives adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub kind: CellKind,
    pub reward: f64,
    pub neighbors: BTreeMap<Action, Coord>,
}

impl Cell {
    pub fn new(kind: CellKind, rewards: &Rewards) -> Self {
        Self {
            kind,
            reward: rewards.for_kind(kind),
            neighbors: BTreeMap::new(),
        }
    }

    pub fn is_obstacle(&self) -> bool {
        matches!(self.kind, CellKind::Obstacle)
    }

    pub fn is_end(&self) -> bool {
        matches!(self.kind, CellKind::End)
    }

    pub fn is_trap(&self) -> bool {
        matches!(self.kind, CellKind::Trap)
    }

    /// The partner coordinate when this cell is a portal.
    pub fn partner(&self) -> Option<Coord> {
        match self.kind {
            CellKind::Portal(partner) => Some(partner),
            _ => None,
        }
    }

    /// Actions available from this cell, in `Action` order.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.neighbors.keys().copied()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.kind {
            CellKind::Plain => "[ ]",
            CellKind::Obstacle => "[X]",
            CellKind::Portal(_) => "[O]",
            CellKind::Start => "[S]",
            CellKind::End => "[E]",
            CellKind::Trap | CellKind::RestArea => "[*]",
        };
        f.pad(tag)
    }
}
