//! Randomized grid generation.
//!
//! A grid always has `Start` at the top-left corner, `End` at the bottom-right
//! corner and a pair of portals on the two remaining corners. Generation lays
//! down a guaranteed route from `End` to `Start`, links each portal to its
//! closest point on that route, scatters traps, rest areas and obstacles over
//! the remaining cells and finally derives which moves are possible from each
//! cell.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::ops::Index;

use log::debug;
use ndarray::Array2;
use rand::Rng;

use crate::error::{Error, Result};
use crate::gridworld::cell::{Cell, CellKind, Rewards};
use crate::gridworld::{Action, Coord};

/// Parameters for [`Grid::generate`].
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    /// Side length of the square grid (at least 3)
    pub size: usize,
    /// Share of unprotected cells turned into obstacles
    pub obstacle_density: f64,
    /// Share of cells turned into traps
    pub trap_density: f64,
    /// Share of cells turned into rest areas
    pub rest_density: f64,
    /// Reward per cell kind
    pub rewards: Rewards,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            size: 10,
            obstacle_density: 0.7,
            trap_density: 0.1,
            rest_density: 0.03,
            rewards: Rewards::default(),
        }
    }
}

impl GridConfig {
    pub fn validate(&self) -> Result<()> {
        if self.size < 3 {
            return Err(Error::InvalidArgument(format!(
                "grid size must be at least 3, got {}",
                self.size
            )));
        }
        let densities = [
            ("obstacle", self.obstacle_density),
            ("trap", self.trap_density),
            ("rest", self.rest_density),
        ];
        for (name, density) in densities {
            if !(0.0..=1.0).contains(&density) {
                return Err(Error::InvalidArgument(format!(
                    "{name} density must lie in [0, 1], got {density}"
                )));
            }
        }
        let total = self.obstacle_density + self.trap_density + self.rest_density;
        if total > 1.0 {
            return Err(Error::InvalidArgument(format!(
                "densities must not sum above 1, got {total}"
            )));
        }
        self.rewards.validate()
    }
}

/// A square grid world. Cells are addressed with [`Coord`] through `Index`.
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    entries: Array2<Cell>,
    start: Coord,
    end: Coord,
    portal_top: Coord,
    portal_bottom: Coord,
    path: Vec<Coord>,
    portal_links: Vec<Coord>,
    obstacle_density: f64,
    trap_density: f64,
    rest_density: f64,
    rewards: Rewards,
}

impl Grid {
    /// Generates a random grid, drawing every random decision from `rng`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] when `config` fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use gridworld_dp::gridworld::{Grid, GridConfig};
    /// use rand::SeedableRng;
    /// use rand_chacha::ChaCha8Rng;
    ///
    /// let mut rng = ChaCha8Rng::seed_from_u64(7);
    /// let grid = Grid::generate(&GridConfig::default(), &mut rng).unwrap();
    ///
    /// assert_eq!(grid.size(), 10);
    /// assert!(grid[grid.end()].is_end());
    /// ```
    pub fn generate<R: Rng + ?Sized>(config: &GridConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;
        let mut grid = Self::blank(config.size, config.rewards.clone());
        grid.obstacle_density = config.obstacle_density;
        grid.trap_density = config.trap_density;
        grid.rest_density = config.rest_density;

        let mut path = Vec::new();
        grid.create_path(grid.end, grid.start, &mut path, rng);
        grid.path = path;

        let top_target = grid.target(grid.portal_top);
        let bottom_target = grid.target(grid.portal_bottom);

        let mut links = Vec::new();
        grid.create_path(top_target, grid.portal_top, &mut links, rng);
        grid.create_path(grid.portal_bottom, bottom_target, &mut links, rng);
        grid.portal_links = links;
        debug!(
            "grid {}x{}: main path of {} cells, {} portal link cells",
            grid.size,
            grid.size,
            grid.path.len(),
            grid.portal_links.len()
        );

        grid.fill_remaining(rng);
        grid.place_corners();
        grid.derive_adjacency();
        Ok(grid)
    }

    /// Builds a grid from a hand-written layout, one string per row.
    ///
    /// Symbols: `S` start, `E` end, `O` portal, `#` obstacle, `.` plain,
    /// `T` trap, `R` rest area. `S` must be the top-left corner, `E` the
    /// bottom-right one and the two `O`s the remaining corners. The layout
    /// has no generated route, so [`Grid::path`] is empty.
    ///
    /// # Errors
    /// Returns [`Error::InvalidArgument`] for a non-square or too small
    /// layout, an unknown symbol, misplaced corners or invalid rewards.
    pub fn from_layout(rows: &[&str], rewards: Rewards) -> Result<Self> {
        rewards.validate()?;
        let size = rows.len();
        if size < 3 {
            return Err(Error::InvalidArgument(format!(
                "grid size must be at least 3, got {size}"
            )));
        }
        let mut grid = Self::blank(size, rewards);
        let corners = grid.corners();
        for (y, row) in rows.iter().enumerate() {
            let symbols: Vec<char> = row.chars().collect();
            if symbols.len() != size {
                return Err(Error::InvalidArgument(format!(
                    "row {y} has {} cells, expected {size}",
                    symbols.len()
                )));
            }
            for (x, symbol) in symbols.into_iter().enumerate() {
                let here = Coord::new(x, y);
                let kind = match symbol {
                    '.' => CellKind::Plain,
                    '#' => CellKind::Obstacle,
                    'T' => CellKind::Trap,
                    'R' => CellKind::RestArea,
                    'S' | 'E' | 'O' => {
                        if !corners.contains(&here) {
                            return Err(Error::InvalidArgument(format!(
                                "'{symbol}' at {here} must sit on a corner"
                            )));
                        }
                        continue;
                    }
                    other => {
                        return Err(Error::InvalidArgument(format!(
                            "unknown layout symbol '{other}' at {here}"
                        )))
                    }
                };
                if corners.contains(&here) {
                    return Err(Error::InvalidArgument(format!(
                        "corner {here} must hold 'S', 'E' or 'O', got '{symbol}'"
                    )));
                }
                grid.set(here, kind);
            }
        }
        let expected = [
            (grid.start, 'S'),
            (grid.end, 'E'),
            (grid.portal_top, 'O'),
            (grid.portal_bottom, 'O'),
        ];
        for (corner, symbol) in expected {
            let found = rows[corner.y].chars().nth(corner.x);
            if found != Some(symbol) {
                return Err(Error::InvalidArgument(format!(
                    "corner {corner} must hold '{symbol}'"
                )));
            }
        }
        grid.place_corners();
        grid.derive_adjacency();
        Ok(grid)
    }

    fn blank(size: usize, rewards: Rewards) -> Self {
        let plain = Cell::new(CellKind::Plain, &rewards);
        Self {
            size,
            entries: Array2::from_elem((size, size), plain),
            start: Coord::new(0, 0),
            end: Coord::new(size - 1, size - 1),
            portal_top: Coord::new(size - 1, 0),
            portal_bottom: Coord::new(0, size - 1),
            path: Vec::new(),
            portal_links: Vec::new(),
            obstacle_density: 0.0,
            trap_density: 0.0,
            rest_density: 0.0,
            rewards,
        }
    }

    fn set(&mut self, at: Coord, kind: CellKind) {
        self.entries[[at.y, at.x]] = Cell::new(kind, &self.rewards);
    }

    /// Walks from `from` to `to`, one step at a time, picking the axis at
    /// random while both are misaligned. Every visited coordinate except `to`
    /// is made plain and pushed onto `sink`.
    fn create_path<R: Rng + ?Sized>(
        &mut self,
        from: Coord,
        to: Coord,
        sink: &mut Vec<Coord>,
        rng: &mut R,
    ) {
        let toward = |from: usize, to: usize| if to > from { from + 1 } else { from - 1 };
        let (mut x, mut y) = (from.x, from.y);
        while (x, y) != (to.x, to.y) {
            let here = Coord::new(x, y);
            self.set(here, CellKind::Plain);
            sink.push(here);
            if x == to.x {
                y = toward(y, to.y);
            } else if y == to.y || rng.gen_bool(0.5) {
                x = toward(x, to.x);
            } else {
                y = toward(y, to.y);
            }
        }
    }

    /// Scatters traps, rest areas and obstacles. Protected coordinates (the
    /// corners and both kinds of guaranteed route) never become obstacles.
    fn fill_remaining<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let protected: HashSet<Coord> = self
            .corners()
            .into_iter()
            .chain(self.path.iter().copied())
            .chain(self.portal_links.iter().copied())
            .collect();
        let trap = self.trap_density;
        let rest = trap + self.rest_density;
        let obstacle = rest + self.obstacle_density;

        for here in self.coords() {
            let draw: f64 = rng.gen();
            let kind = if draw < trap {
                CellKind::Trap
            } else if draw < rest {
                CellKind::RestArea
            } else if !protected.contains(&here) && draw < obstacle {
                CellKind::Obstacle
            } else {
                CellKind::Plain
            };
            self.set(here, kind);
        }
    }

    fn place_corners(&mut self) {
        self.set(self.start, CellKind::Start);
        self.set(self.end, CellKind::End);
        self.set(self.portal_top, CellKind::Portal(self.portal_bottom));
        self.set(self.portal_bottom, CellKind::Portal(self.portal_top));
    }

    /// Records, for each non-obstacle cell, the in-bounds non-obstacle cells
    /// one move away. A single pass afterwards turns every cell left without
    /// neighbors into an obstacle; the pass is not repeated.
    fn derive_adjacency(&mut self) {
        for here in self.coords() {
            if self[here].is_obstacle() {
                continue;
            }
            let neighbors: BTreeMap<Action, Coord> = Action::ALL
                .iter()
                .filter_map(|&action| {
                    action
                        .step(here, self.size)
                        .filter(|&next| !self[next].is_obstacle())
                        .map(|next| (action, next))
                })
                .collect();
            self.entries[[here.y, here.x]].neighbors = neighbors;
        }

        let orphans: Vec<Coord> = self
            .coords()
            .filter(|&here| !self[here].is_obstacle() && self[here].neighbors.is_empty())
            .collect();
        for &orphan in &orphans {
            self.set(orphan, CellKind::Obstacle);
        }
        if !orphans.is_empty() {
            debug!("pruned {} isolated cells into obstacles", orphans.len());
        }
    }

    /// Every coordinate, column by column.
    pub fn coords(&self) -> impl Iterator<Item = Coord> {
        let size = self.size;
        (0..size).flat_map(move |x| (0..size).map(move |y| Coord::new(x, y)))
    }

    pub fn corners(&self) -> [Coord; 4] {
        [self.start, self.end, self.portal_bottom, self.portal_top]
    }

    /// The point of the main path closest to `portal`; ties go to the point
    /// laid down first.
    pub fn target(&self, portal: Coord) -> Coord {
        self.path
            .iter()
            .copied()
            .min_by(|&a, &b| {
                Self::distance(portal, a).total_cmp(&Self::distance(portal, b))
            })
            .unwrap_or(portal)
    }

    pub fn distance(a: Coord, b: Coord) -> f64 {
        let dx = a.x.abs_diff(b.x) as f64;
        let dy = a.y.abs_diff(b.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// The partner of the portal at `at`, if `at` is a portal.
    pub fn other_portal(&self, at: Coord) -> Option<Coord> {
        self.get(at).and_then(Cell::partner)
    }

    pub fn get(&self, at: Coord) -> Option<&Cell> {
        self.entries.get([at.y, at.x])
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn start(&self) -> Coord {
        self.start
    }

    pub fn end(&self) -> Coord {
        self.end
    }

    pub fn portal_top(&self) -> Coord {
        self.portal_top
    }

    pub fn portal_bottom(&self) -> Coord {
        self.portal_bottom
    }

    /// Guaranteed route from `end` towards `start` (`start` itself excluded).
    pub fn path(&self) -> &[Coord] {
        &self.path
    }

    /// Guaranteed routes joining each portal to the main path.
    pub fn portal_links(&self) -> &[Coord] {
        &self.portal_links
    }

    pub fn obstacle_density(&self) -> f64 {
        self.obstacle_density
    }

    pub fn trap_density(&self) -> f64 {
        self.trap_density
    }

    pub fn rest_density(&self) -> f64 {
        self.rest_density
    }

    /// Read-only view of the cells, indexed `[[y, x]]`.
    pub fn entries(&self) -> &Array2<Cell> {
        &self.entries
    }

    /// Reward of every cell laid out like [`Grid`]'s `Display` output.
    pub fn reward_map(&self) -> String {
        let mut out = format!("{:^5}", "\\");
        for x in 0..self.size {
            out.push_str(&format!("{x:^5}"));
        }
        out.push('\n');
        for (y, row) in self.entries.rows().into_iter().enumerate() {
            out.push_str(&format!("{y:^5}"));
            for cell in row {
                out.push_str(&format!("{:^5}", cell.reward));
            }
            out.push('\n');
        }
        out
    }
}

impl Index<Coord> for Grid {
    type Output = Cell;

    fn index(&self, at: Coord) -> &Cell {
        &self.entries[[at.y, at.x]]
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:^5}", "\\")?;
        for x in 0..self.size {
            write!(f, "{x:^5}")?;
        }
        writeln!(f)?;
        for (y, row) in self.entries.rows().into_iter().enumerate() {
            write!(f, "{y:^5}")?;
            for cell in row {
                write!(f, "{cell:^5}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
