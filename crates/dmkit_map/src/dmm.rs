//! The map: a 3-D grid of tiles with an undo history.
//!
//! Every change to tile contents goes through four primitives ([`Dmm::push`],
//! [`Dmm::pop`], [`Dmm::splice`], [`Dmm::replace`]). Each records the
//! [`Edit`] that reverses it in the open frame; [`Dmm::commit`] closes the
//! frame so that one user action undoes as a unit.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::mem;
use std::rc::Rc;
use std::sync::Arc;

use dmkit_foundation::{Error, Result, Value};
use dmkit_language::{TypeRegistry, eval_text};
use tracing::debug;

use crate::codec::MapFormat;
use crate::instance::{Instance, InstanceId};
use crate::tile::{Coord, Tile};

// =============================================================================
// Edit
// =============================================================================

/// An undo-log entry: the operation that reverses one mutation.
#[derive(Clone, Debug)]
pub enum Edit {
    /// Push `instance` back onto the tile.
    Push {
        /// The tile.
        coord: Coord,
        /// The instance to push.
        instance: Rc<Instance>,
    },
    /// Pop the top of the tile.
    Pop {
        /// The tile.
        coord: Coord,
    },
    /// Remove `count` instances at `index` and put `removed` back.
    Splice {
        /// The tile.
        coord: Coord,
        /// Where the splice starts.
        index: usize,
        /// How many instances to take out.
        count: usize,
        /// The instances to put back.
        removed: Vec<Rc<Instance>>,
    },
    /// Put `old` back at `index`.
    Replace {
        /// The tile.
        coord: Coord,
        /// The slot.
        index: usize,
        /// The instance to restore.
        old: Rc<Instance>,
    },
}

// =============================================================================
// Dmm
// =============================================================================

/// A map parsed against (or created for) a type tree.
#[derive(Debug)]
pub struct Dmm<'t> {
    pub(crate) types: &'t TypeRegistry,
    pub(crate) maxx: u32,
    pub(crate) maxy: u32,
    pub(crate) maxz: u32,
    /// Tiles ordered by z, then y, then x.
    pub(crate) tiles: Vec<Tile>,
    pub(crate) format: MapFormat,
    pub(crate) crlf: bool,
    /// Tile signature to the key it had in the parsed file.
    pub(crate) original_keys: HashMap<String, String>,
    signature_counts: HashMap<String, usize>,
    undo_frames: Vec<Vec<Edit>>,
    redo_frames: Vec<Vec<Edit>>,
    frame: Vec<Edit>,
    modified: bool,
    generation: u64,
}

impl<'t> Dmm<'t> {
    /// Creates a map filled with the world's default turf and area.
    #[must_use]
    pub fn new(types: &'t TypeRegistry, maxx: u32, maxy: u32, maxz: u32) -> Self {
        let mut dmm = Self::empty(types);
        dmm.resize(maxx, maxy, maxz);
        dmm.modified = false;
        dmm
    }

    pub(crate) fn empty(types: &'t TypeRegistry) -> Self {
        Self {
            types,
            maxx: 0,
            maxy: 0,
            maxz: 0,
            tiles: Vec::new(),
            format: MapFormat::Standard,
            crlf: false,
            original_keys: HashMap::new(),
            signature_counts: HashMap::new(),
            undo_frames: Vec::new(),
            redo_frames: Vec::new(),
            frame: Vec::new(),
            modified: false,
            generation: 0,
        }
    }

    /// The type tree instances are resolved against.
    #[must_use]
    pub const fn types(&self) -> &'t TypeRegistry {
        self.types
    }

    /// Width, height and depth.
    #[must_use]
    pub const fn size(&self) -> (u32, u32, u32) {
        (self.maxx, self.maxy, self.maxz)
    }

    /// The format the map was read in, used by default when saving.
    #[must_use]
    pub const fn format(&self) -> MapFormat {
        self.format
    }

    /// Sets the default save format.
    pub fn set_format(&mut self, format: MapFormat) {
        self.format = format;
    }

    /// Returns true if saved text uses CRLF line endings.
    #[must_use]
    pub const fn is_crlf(&self) -> bool {
        self.crlf
    }

    /// Chooses the line endings of saved text.
    pub fn set_crlf(&mut self, crlf: bool) {
        self.crlf = crlf;
    }

    /// Returns true if the map changed since it was loaded or marked saved.
    #[must_use]
    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    /// Clears the modified flag.
    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    /// A counter that increases on every change and every new instance.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of keys recovered from the parsed file.
    #[must_use]
    pub fn original_key_count(&self) -> usize {
        self.original_keys.len()
    }

    // -------------------------------------------------------------------------
    // Tiles
    // -------------------------------------------------------------------------

    fn index(&self, coord: Coord) -> Option<usize> {
        if coord.x == 0 || coord.y == 0 || coord.z == 0 {
            return None;
        }
        if coord.x > self.maxx || coord.y > self.maxy || coord.z > self.maxz {
            return None;
        }
        Some(coord.grid_index(self.maxx, self.maxy))
    }

    fn require(&self, coord: Coord) -> Result<usize> {
        self.index(coord)
            .ok_or_else(|| Error::map(format!("no tile at {coord}"), None))
    }

    /// The tile at `coord`, if it is inside the map.
    #[must_use]
    pub fn tile(&self, coord: Coord) -> Option<&Tile> {
        self.index(coord).map(|i| &self.tiles[i])
    }

    /// Every tile, ordered by z, then y, then x.
    pub fn tiles(&self) -> std::slice::Iter<'_, Tile> {
        self.tiles.iter()
    }

    /// Every coordinate in the map, in the same order as [`Dmm::tiles`].
    pub fn all_coordinates(&self) -> impl Iterator<Item = Coord> + use<> {
        let (maxx, maxy, maxz) = self.size();
        (1..=maxz).flat_map(move |z| {
            (1..=maxy).flat_map(move |y| (1..=maxx).map(move |x| Coord::new(x, y, z)))
        })
    }

    // -------------------------------------------------------------------------
    // Instances
    // -------------------------------------------------------------------------

    fn next_id(&mut self) -> InstanceId {
        self.generation += 1;
        InstanceId(self.generation)
    }

    /// Creates an instance of `path` without overrides.
    pub fn new_instance(&mut self, path: &str) -> Instance {
        self.instance_with_vars(path, Vec::new())
    }

    /// Creates an instance of `path` with overrides.
    pub fn instance_with_vars(
        &mut self,
        path: &str,
        vars: impl IntoIterator<Item = (Arc<str>, Value)>,
    ) -> Instance {
        let id = self.next_id();
        Instance::new(self.types, id, path, vars)
    }

    /// Creates an instance from a typepath value such as
    /// `/obj/item{name = "x"}`.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if the value is not a typepath.
    pub fn instance_from_value(&mut self, value: &Value) -> Result<Instance> {
        let Value::Typepath(t) = value else {
            return Err(Error::map(
                format!("expected a typepath, found {}", value.kind_name()),
                None,
            ));
        };
        Ok(self.instance_with_vars(&t.path, t.vars.iter().flatten().cloned()))
    }

    /// Creates an instance from text such as `/obj/item{name = "x"}`.
    ///
    /// # Errors
    ///
    /// Returns a `Syntax` or `NonConstant` error for bad text and a `Map`
    /// error if it is not a typepath.
    pub fn instance_from_text(&mut self, text: &str) -> Result<Instance> {
        let value = eval_text(text)?;
        self.instance_from_value(&value)
    }

    /// Copies `instance` under a new id.
    pub fn copy_instance(&mut self, instance: &Instance) -> Instance {
        let id = self.next_id();
        instance.copy(id)
    }

    fn world_default(&self, var: &str, fallback: &str) -> Arc<str> {
        self.types
            .lookup("/world")
            .and_then(|world| self.types.get_var(world, var))
            .and_then(|value| match value {
                Value::Typepath(t) => Some(t.path),
                _ => None,
            })
            .unwrap_or_else(|| Arc::from(fallback))
    }

    fn default_turf(&mut self) -> Rc<Instance> {
        let path = self.world_default("turf", "/turf");
        Rc::new(self.new_instance(&path))
    }

    fn default_area(&mut self) -> Rc<Instance> {
        let path = self.world_default("area", "/area");
        Rc::new(self.new_instance(&path))
    }

    // -------------------------------------------------------------------------
    // Signature counts
    // -------------------------------------------------------------------------

    /// How many instances with exactly this signature are on the map.
    #[must_use]
    pub fn signature_count(&self, signature: &str) -> usize {
        self.signature_counts.get(signature).copied().unwrap_or(0)
    }

    /// Every instance signature on the map with its count.
    pub fn signature_counts(&self) -> impl Iterator<Item = (&str, usize)> {
        self.signature_counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    fn count_added(&mut self, instance: &Instance) {
        *self
            .signature_counts
            .entry(instance.signature(false))
            .or_insert(0) += 1;
    }

    fn count_removed(&mut self, instance: &Instance) {
        if let Entry::Occupied(mut entry) = self.signature_counts.entry(instance.signature(false)) {
            if *entry.get() <= 1 {
                entry.remove();
            } else {
                *entry.get_mut() -= 1;
            }
        }
    }

    fn touch(&mut self) {
        self.modified = true;
        self.generation += 1;
    }

    // -------------------------------------------------------------------------
    // Primitives
    // -------------------------------------------------------------------------

    /// Puts `instance` on top of the tile's stack.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn push(&mut self, coord: Coord, instance: impl Into<Rc<Instance>>) -> Result<()> {
        let index = self.require(coord)?;
        let instance = instance.into();
        self.count_added(&instance);
        self.tiles[index].contents.push(instance);
        self.frame.push(Edit::Pop { coord });
        self.touch();
        Ok(())
    }

    /// Removes the top of the tile's stack.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map or the tile is
    /// empty.
    pub fn pop(&mut self, coord: Coord) -> Result<Rc<Instance>> {
        let index = self.require(coord)?;
        let Some(popped) = self.tiles[index].contents.pop() else {
            return Err(Error::map(format!("cannot pop empty tile {coord}"), None));
        };
        self.count_removed(&popped);
        self.frame.push(Edit::Push {
            coord,
            instance: Rc::clone(&popped),
        });
        self.touch();
        Ok(popped)
    }

    /// Removes `count` instances starting at `index` and inserts `insert` in
    /// their place. Both are clamped to the stack.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn splice(
        &mut self,
        coord: Coord,
        index: usize,
        count: usize,
        insert: Vec<Rc<Instance>>,
    ) -> Result<Vec<Rc<Instance>>> {
        let tile = self.require(coord)?;
        let len = self.tiles[tile].contents.len();
        let index = index.min(len);
        let end = index.saturating_add(count).min(len);
        let inserted = insert.len();
        for instance in &insert {
            self.count_added(instance);
        }
        let removed: Vec<Rc<Instance>> = self.tiles[tile]
            .contents
            .splice(index..end, insert)
            .collect();
        for instance in &removed {
            self.count_removed(instance);
        }
        self.frame.push(Edit::Splice {
            coord,
            index,
            count: inserted,
            removed: removed.clone(),
        });
        self.touch();
        Ok(removed)
    }

    /// Replaces the instance at `index`, returning the old one.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map or `index` past
    /// the end of the stack.
    pub fn replace(
        &mut self,
        coord: Coord,
        index: usize,
        instance: impl Into<Rc<Instance>>,
    ) -> Result<Rc<Instance>> {
        let tile = self.require(coord)?;
        let len = self.tiles[tile].contents.len();
        if index >= len {
            return Err(Error::map(
                format!("cannot set index {index} of tile {coord} with only {len} elements"),
                None,
            ));
        }
        let instance = instance.into();
        self.count_added(&instance);
        let old = mem::replace(&mut self.tiles[tile].contents[index], instance);
        self.count_removed(&old);
        self.frame.push(Edit::Replace {
            coord,
            index,
            old: Rc::clone(&old),
        });
        self.touch();
        Ok(old)
    }

    // -------------------------------------------------------------------------
    // Placement helpers
    // -------------------------------------------------------------------------

    fn turf_and_area(&self, coord: Coord) -> Result<(Option<usize>, Option<usize>)> {
        let tile = &self.tiles[self.require(coord)?];
        let mut turf = None;
        let mut area = None;
        for (i, instance) in tile.iter().enumerate() {
            if instance.is_a(self.types, "/turf", false) {
                turf = Some(i);
            }
            if instance.is_a(self.types, "/area", false) {
                area = Some(i);
            }
        }
        Ok((turf, area))
    }

    /// Makes `instance` the tile's turf: replaces the current one, or goes
    /// just below the area, or on top.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn set_turf(&mut self, coord: Coord, instance: impl Into<Rc<Instance>>) -> Result<()> {
        match self.turf_and_area(coord)? {
            (Some(turf), _) => {
                self.replace(coord, turf, instance)?;
            }
            (None, Some(area)) => {
                self.splice(coord, area, 0, vec![instance.into()])?;
            }
            (None, None) => self.push(coord, instance)?,
        }
        Ok(())
    }

    /// Makes `instance` the tile's area: replaces the current one, or goes
    /// just above the turf, or on top.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn set_area(&mut self, coord: Coord, instance: impl Into<Rc<Instance>>) -> Result<()> {
        match self.turf_and_area(coord)? {
            (_, Some(area)) => {
                self.replace(coord, area, instance)?;
            }
            (Some(turf), None) => {
                self.splice(coord, turf + 1, 0, vec![instance.into()])?;
            }
            (None, None) => self.push(coord, instance)?,
        }
        Ok(())
    }

    /// Adds an object just before the turf or area.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn add_object(&mut self, coord: Coord, instance: impl Into<Rc<Instance>>) -> Result<()> {
        let types = self.types;
        let tile = &self.tiles[self.require(coord)?];
        let slot = tile
            .iter()
            .position(|i| i.is_a(types, "/turf", false) || i.is_a(types, "/area", false));
        match slot {
            Some(index) => {
                self.splice(coord, index, 0, vec![instance.into()])?;
            }
            None => self.push(coord, instance)?,
        }
        Ok(())
    }

    /// Places `instance` where its type belongs: turfs and areas into their
    /// slots, anything else as an object.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn place(&mut self, coord: Coord, instance: impl Into<Rc<Instance>>) -> Result<()> {
        let instance = instance.into();
        if instance.is_a(self.types, "/turf", false) {
            self.set_turf(coord, instance)
        } else if instance.is_a(self.types, "/area", false) {
            self.set_area(coord, instance)
        } else {
            self.add_object(coord, instance)
        }
    }

    /// Removes `instance` from the tile. A deleted turf or area is replaced
    /// by the world's default. Returns false if the instance is not there.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if `coord` is outside the map.
    pub fn delete(&mut self, coord: Coord, instance: &Rc<Instance>) -> Result<bool> {
        let tile = &self.tiles[self.require(coord)?];
        let Some(index) = tile.position(instance) else {
            return Ok(false);
        };
        let is_turf = tile
            .get_turf(self.types)
            .is_some_and(|t| Rc::ptr_eq(t, instance));
        let is_area = tile
            .get_area(self.types)
            .is_some_and(|a| Rc::ptr_eq(a, instance));
        if is_turf {
            let turf = self.default_turf();
            self.set_turf(coord, turf)?;
        } else if is_area {
            let area = self.default_area();
            self.set_area(coord, area)?;
        } else {
            self.splice(coord, index, 1, Vec::new())?;
        }
        Ok(true)
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// Closes the open frame. Does nothing if no change was made since the
    /// last commit.
    pub fn commit(&mut self) {
        if !self.frame.is_empty() {
            self.undo_frames.push(mem::take(&mut self.frame));
            self.redo_frames.clear();
        }
    }

    /// Returns true if there is anything to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.frame.is_empty() || !self.undo_frames.is_empty()
    }

    /// Returns true if there is anything to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.frame.is_empty() && !self.redo_frames.is_empty()
    }

    /// Reverts the last frame, committing the open one first. Returns false
    /// if there was nothing to undo.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if the history no longer matches the grid.
    pub fn undo(&mut self) -> Result<bool> {
        self.commit();
        let Some(frame) = self.undo_frames.pop() else {
            return Ok(false);
        };
        debug!(edits = frame.len(), "undo");
        self.apply(frame)?;
        if !self.frame.is_empty() {
            self.redo_frames.push(mem::take(&mut self.frame));
        }
        Ok(true)
    }

    /// Re-applies the last undone frame. Returns false if there was nothing
    /// to redo; uncommitted changes discard the redo history.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if the history no longer matches the grid.
    pub fn redo(&mut self) -> Result<bool> {
        self.commit();
        let Some(frame) = self.redo_frames.pop() else {
            return Ok(false);
        };
        debug!(edits = frame.len(), "redo");
        self.apply(frame)?;
        if !self.frame.is_empty() {
            self.undo_frames.push(mem::take(&mut self.frame));
        }
        Ok(true)
    }

    fn apply(&mut self, frame: Vec<Edit>) -> Result<()> {
        for edit in frame.into_iter().rev() {
            match edit {
                Edit::Push { coord, instance } => self.push(coord, instance)?,
                Edit::Pop { coord } => {
                    self.pop(coord)?;
                }
                Edit::Splice {
                    coord,
                    index,
                    count,
                    removed,
                } => {
                    self.splice(coord, index, count, removed)?;
                }
                Edit::Replace { coord, index, old } => {
                    self.replace(coord, index, old)?;
                }
            }
        }
        Ok(())
    }

    fn clear_history(&mut self) {
        self.undo_frames.clear();
        self.redo_frames.clear();
        self.frame.clear();
    }

    // -------------------------------------------------------------------------
    // Resizing
    // -------------------------------------------------------------------------

    /// Changes the map's bounds. Tiles inside both the old and new bounds
    /// are kept; new tiles get the default turf and area. History is
    /// cleared.
    pub fn resize(&mut self, maxx: u32, maxy: u32, maxz: u32) {
        let (old_x, old_y, old_z) = self.size();
        let mut old: Vec<Option<Tile>> = mem::take(&mut self.tiles).into_iter().map(Some).collect();
        let old_index = |c: Coord| -> Option<usize> {
            (c.x <= old_x && c.y <= old_y && c.z <= old_z).then(|| c.grid_index(old_x, old_y))
        };

        self.maxx = maxx;
        self.maxy = maxy;
        self.maxz = maxz;
        let coords: Vec<Coord> = self.all_coordinates().collect();
        let mut tiles = Vec::with_capacity(coords.len());
        for coord in coords {
            let kept = old_index(coord).and_then(|i| old.get_mut(i).and_then(Option::take));
            let tile = match kept {
                Some(tile) => tile,
                None => {
                    let turf = self.default_turf();
                    let area = self.default_area();
                    self.count_added(&turf);
                    self.count_added(&area);
                    Tile::new(coord, vec![turf, area])
                }
            };
            tiles.push(tile);
        }
        for tile in old.into_iter().flatten() {
            for instance in tile.iter() {
                self.count_removed(instance);
            }
        }
        self.tiles = tiles;
        self.clear_history();
        self.touch();
    }

    /// Installs a freshly parsed grid and recounts its signatures.
    pub(crate) fn install(&mut self, maxx: u32, maxy: u32, maxz: u32, tiles: Vec<Tile>) {
        self.maxx = maxx;
        self.maxy = maxy;
        self.maxz = maxz;
        self.tiles = tiles;
        let mut counts: HashMap<String, usize> = HashMap::new();
        for instance in self.tiles.iter().flat_map(Tile::iter) {
            *counts.entry(instance.signature(false)).or_insert(0) += 1;
        }
        self.signature_counts = counts;
        self.clear_history();
    }
}
