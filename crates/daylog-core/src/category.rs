//! Category hierarchy with memoized node identity.
//!
//! Every distinct category name maps to exactly one [`Category`] record for
//! the lifetime of a run. Records live in an arena; parent links are indices
//! into it, so chains built from the collapse map cannot dangle and cannot
//! form a cycle once resolution has accepted them.

use std::collections::{HashMap, HashSet};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

/// Name of the universal sleep category, pre-seeded with no parent.
pub const SLEEP_CATEGORY: &str = "Zzz";

/// Pseudo-category that collects activities no rule matched.
pub const ERROR_CATEGORY: &str = "Error";

/// Seed for generated colors. Fixed so identical inputs give identical
/// output across runs.
const COLOR_SEED: u64 = 1;

/// Errors from category resolution.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CategoryError {
    /// The collapse map contains a cycle reachable from this name.
    #[error("collapse chain starting at {name:?} never reaches a fixed point")]
    CollapseCycle { name: String },
}

/// Index of a [`Category`] in its [`CategorySet`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CategoryId(usize);

/// A category of an activity's weighted split, with its share in `(0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedCategory {
    pub category: CategoryId,
    pub weight: f64,
}

/// One node of the category hierarchy.
#[derive(Debug, Clone)]
pub struct Category {
    name: String,
    parent: Option<CategoryId>,
    weekday_minutes: f64,
    holiday_minutes: f64,
}

impl Category {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub const fn parent(&self) -> Option<CategoryId> {
        self.parent
    }

    /// Accumulated non-holiday minutes, including children's contributions.
    pub const fn weekday_minutes(&self) -> f64 {
        self.weekday_minutes
    }

    /// Accumulated holiday minutes, including children's contributions.
    pub const fn holiday_minutes(&self) -> f64 {
        self.holiday_minutes
    }

    pub const fn total_minutes(&self) -> f64 {
        self.weekday_minutes + self.holiday_minutes
    }
}

/// Arena of canonical [`Category`] records plus the collapse and color maps.
#[derive(Debug)]
pub struct CategorySet {
    arena: Vec<Category>,
    index: HashMap<String, CategoryId>,
    collapse: HashMap<String, String>,
    colors: HashMap<String, String>,
    sleep: CategoryId,
}

impl CategorySet {
    /// Creates a set from a collapse map and configured colors.
    ///
    /// The sleep sentinel is pre-seeded without a parent; any collapse entry
    /// for it is ignored.
    pub fn new(collapse: HashMap<String, String>, colors: HashMap<String, String>) -> Self {
        let sleep = CategoryId(0);
        let arena = vec![Category {
            name: SLEEP_CATEGORY.to_string(),
            parent: None,
            weekday_minutes: 0.0,
            holiday_minutes: 0.0,
        }];
        let index = HashMap::from([(SLEEP_CATEGORY.to_string(), sleep)]);
        Self {
            arena,
            index,
            collapse,
            colors,
            sleep,
        }
    }

    /// The pre-seeded sleep category.
    pub const fn sleep(&self) -> CategoryId {
        self.sleep
    }

    pub fn category(&self, id: CategoryId) -> &Category {
        &self.arena[id.0]
    }

    pub fn name(&self, id: CategoryId) -> &str {
        &self.arena[id.0].name
    }

    /// Looks up an already-resolved category without creating it.
    pub fn get(&self, name: &str) -> Option<CategoryId> {
        self.index.get(name).copied()
    }

    /// Returns the canonical category for `name`, creating it (and its
    /// ancestors from the collapse map) on first access. Idempotent:
    /// repeated calls return the same id.
    pub fn resolve(&mut self, name: &str) -> Result<CategoryId, CategoryError> {
        let mut visited = HashSet::new();
        self.resolve_guarded(name, &mut visited)
    }

    fn resolve_guarded(
        &mut self,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Result<CategoryId, CategoryError> {
        if let Some(&id) = self.index.get(name) {
            return Ok(id);
        }
        if !visited.insert(name.to_string()) {
            return Err(CategoryError::CollapseCycle {
                name: name.to_string(),
            });
        }
        let parent = match self.collapse.get(name) {
            Some(target) if target != name => {
                let target = target.clone();
                Some(self.resolve_guarded(&target, visited)?)
            }
            _ => None,
        };
        let id = CategoryId(self.arena.len());
        self.arena.push(Category {
            name: name.to_string(),
            parent,
            weekday_minutes: 0.0,
            holiday_minutes: 0.0,
        });
        self.index.insert(name.to_string(), id);
        Ok(id)
    }

    /// Fully-collapsed ancestor of a category (itself if it has no parent).
    pub fn root_of(&self, id: CategoryId) -> CategoryId {
        let mut current = id;
        while let Some(parent) = self.arena[current.0].parent {
            current = parent;
        }
        current
    }

    /// Adds minutes to a category and every ancestor up the chain.
    pub fn add_time(&mut self, id: CategoryId, minutes: f64, holiday: bool) {
        let mut current = Some(id);
        while let Some(cat) = current {
            let record = &mut self.arena[cat.0];
            if holiday {
                record.holiday_minutes += minutes;
            } else {
                record.weekday_minutes += minutes;
            }
            current = record.parent;
        }
    }

    /// Configured or inherited color for a category, walking toward the
    /// root. `None` means the whole chain is colorless.
    pub fn color_of(&self, id: CategoryId) -> Option<&str> {
        let mut current = Some(id);
        while let Some(cat) = current {
            let record = &self.arena[cat.0];
            if let Some(color) = self.colors.get(&record.name) {
                return Some(color);
            }
            current = record.parent;
        }
        None
    }

    /// Color for a name, resolving through the hierarchy when the name is a
    /// known category.
    pub fn color_for_name(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(id) => self.color_of(id),
            None => self.colors.get(name).map(String::as_str),
        }
    }

    /// Assigns a deterministic pseudo-random color to every listed name that
    /// has neither its own color nor an inherited one.
    pub fn generate_colors<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let mut rng = StdRng::seed_from_u64(COLOR_SEED);
        for name in names {
            if self.color_for_name(name).is_none() {
                let color = format!("#{:06X}", rng.gen_range(0..0x00FF_FFFFu32));
                self.colors.insert(name.to_string(), color);
            }
        }
    }

    /// All resolved categories in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, &Category)> {
        self.arena
            .iter()
            .enumerate()
            .map(|(i, c)| (CategoryId(i), c))
    }
}
