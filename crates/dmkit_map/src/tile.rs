//! Grid cells and their coordinates.

use std::fmt;
use std::rc::Rc;

use dmkit_language::TypeRegistry;

use crate::instance::Instance;

/// A 1-based map coordinate. `(1, 1, z)` is the bottom-left corner.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// Column, left to right.
    pub x: u32,
    /// Row, bottom to top.
    pub y: u32,
    /// Level.
    pub z: u32,
}

impl Coord {
    /// Creates a coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Position in a row-major, level-by-level grid of `maxx` by `maxy`
    /// levels. The coordinate must be in bounds.
    pub(crate) const fn grid_index(self, maxx: u32, maxy: u32) -> usize {
        let (x, y, z) = (self.x as usize - 1, self.y as usize - 1, self.z as usize - 1);
        (z * maxy as usize + y) * maxx as usize + x
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// One cell of the grid: an ordered stack of instances.
///
/// By convention a tile holds objects first, then one turf, then one area.
/// Contents only change through the map's undo-logged operations.
#[derive(Debug)]
pub struct Tile {
    coord: Coord,
    pub(crate) contents: Vec<Rc<Instance>>,
}

impl Tile {
    pub(crate) const fn new(coord: Coord, contents: Vec<Rc<Instance>>) -> Self {
        Self { coord, contents }
    }

    /// Where this tile is.
    #[must_use]
    pub const fn coord(&self) -> Coord {
        self.coord
    }

    /// The instances, in order.
    #[must_use]
    pub fn contents(&self) -> &[Rc<Instance>] {
        &self.contents
    }

    /// Iterates over the instances.
    pub fn iter(&self) -> std::slice::Iter<'_, Rc<Instance>> {
        self.contents.iter()
    }

    /// Number of instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contents.len()
    }

    /// Returns true if the tile holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    /// The first instance of type `path` (or, unless `strict`, a subtype).
    #[must_use]
    pub fn locate(&self, types: &TypeRegistry, path: &str, strict: bool) -> Option<&Rc<Instance>> {
        self.contents.iter().find(|i| i.is_a(types, path, strict))
    }

    /// The turf, if any.
    #[must_use]
    pub fn get_turf(&self, types: &TypeRegistry) -> Option<&Rc<Instance>> {
        self.locate(types, "/turf", false)
    }

    /// The area, if any.
    #[must_use]
    pub fn get_area(&self, types: &TypeRegistry) -> Option<&Rc<Instance>> {
        self.locate(types, "/area", false)
    }

    /// Position of `instance` in the stack, by identity.
    #[must_use]
    pub fn position(&self, instance: &Rc<Instance>) -> Option<usize> {
        self.contents.iter().position(|i| Rc::ptr_eq(i, instance))
    }

    /// The tile as it appears in a map key table: `(a,b,c)`.
    ///
    /// With `pretty`, each instance starts on a new line and its overrides
    /// are spread one per line.
    #[must_use]
    pub fn signature(&self, pretty: bool) -> String {
        signature_of(self.contents.iter().map(|i| &**i), pretty)
    }
}

impl<'a> IntoIterator for &'a Tile {
    type Item = &'a Rc<Instance>;
    type IntoIter = std::slice::Iter<'a, Rc<Instance>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub(crate) fn signature_of<'a>(
    contents: impl IntoIterator<Item = &'a Instance>,
    pretty: bool,
) -> String {
    let mut out = String::from("(");
    for (i, instance) in contents.into_iter().enumerate() {
        if i != 0 {
            out.push(',');
        }
        if pretty {
            out.push('\n');
        }
        out.push_str(&instance.signature(pretty));
    }
    out.push(')');
    out
}
