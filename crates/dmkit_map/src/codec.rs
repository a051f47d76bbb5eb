//! Reading and writing map files.
//!
//! A map file is a key table followed by grid blocks:
//!
//! ```text
//! "a" = (/obj/chair{dir = 4},/turf/floor,/area/hall)
//! "b" = (/turf/wall,/area/hall)
//!
//! (1,1,1) = {"
//! ab
//! ba
//! "}
//! ```
//!
//! All keys in a file have the same width. Grid rows run top to bottom, so
//! each level's rows are reversed on the way in and out. The TGM and maphash
//! variants store one column per block, one key per line.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write as _};
use std::rc::Rc;
use std::str::FromStr;

use dmkit_foundation::{Error, ErrorKind, MapConfig, Result, SourcePos, Value};
use dmkit_language::{Cursor, EvalContext, Token, TokenKind, TypeRegistry, parse_expression};
use dmkit_language::parser::parse_primary;
use dmkit_language::tokenize;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use sha1::{Digest, Sha1};
use tracing::{debug, warn};

use crate::dmm::Dmm;
use crate::instance::Instance;
use crate::keys::{capacity, compare_keys, number_to_key, width_for};
use crate::tile::{Coord, Tile, signature_of};

const TGM_HEADER: &str =
    "//MAP CONVERTED BY dmm2tgm.py THIS HEADER COMMENT PREVENTS RECONVERSION, DO NOT REMOVE";
const MAPHASH_HEADER: &str = "// This map has been converted using maphash";

/// Width of every maphash key.
pub const MAPHASH_KEY_LEN: usize = 3;

/// Largest key pool drawn from, whatever the key width.
const MAX_POOL: u64 = 0xFFFF;

// =============================================================================
// Format
// =============================================================================

/// On-disk map variants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapFormat {
    /// One block per level, one grid row per line.
    #[default]
    Standard,
    /// One column per block, one key per line, overrides spread over lines.
    Tgm,
    /// Like TGM, but keys are derived from a hash of the tile's contents.
    Maphash,
}

impl MapFormat {
    /// Every format.
    pub const ALL: [Self; 3] = [Self::Standard, Self::Tgm, Self::Maphash];

    /// Looks a format up by name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// The format's name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Tgm => "tgm",
            Self::Maphash => "maphash",
        }
    }

    const fn header(self) -> Option<&'static str> {
        match self {
            Self::Standard => None,
            Self::Tgm => Some(TGM_HEADER),
            Self::Maphash => Some(MAPHASH_HEADER),
        }
    }

    /// The format announced by a leading comment.
    #[must_use]
    pub fn detect(comment: &str) -> Self {
        if comment.contains("dmm2tgm.py") {
            Self::Tgm
        } else if comment.contains("maphash") {
            Self::Maphash
        } else {
            Self::Standard
        }
    }
}

impl fmt::Display for MapFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MapFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| {
            Error::map(
                format!("unknown map format {s} (expected standard, tgm or maphash)"),
                None,
            )
        })
    }
}

// =============================================================================
// Parsing
// =============================================================================

/// Grid cells read so far, keyed by column, file row and level.
type Cells = HashMap<(u32, u32, u32), Vec<Rc<Instance>>>;

struct MapReader<'t, 'f> {
    dmm: Dmm<'t>,
    file: &'f str,
    models: HashMap<String, Vec<Instance>>,
    key_len: usize,
    cells: Cells,
    /// Rows per level as written in the file.
    heights: HashMap<u32, u32>,
    maxx: u32,
    maxy: u32,
    maxz: u32,
}

impl<'t> Dmm<'t> {
    /// Parses map text against a type tree.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error for malformed tables or grids, unknown keys and
    /// holes in the grid; a `Syntax` error for a bad value literal.
    pub fn parse(types: &'t TypeRegistry, file: &str, text: &str) -> Result<Self> {
        let tokens = tokenize(file, text);
        let mut reader = MapReader {
            dmm: Dmm::empty(types),
            file,
            models: HashMap::new(),
            key_len: 1,
            cells: HashMap::new(),
            heights: HashMap::new(),
            maxx: 0,
            maxy: 0,
            maxz: 0,
        };
        reader.dmm.crlf = text.contains('\r');
        if let Some(TokenKind::Comment(comment)) =
            tokens.iter().find(|t| !t.is_newline()).map(|t| &t.kind)
        {
            reader.dmm.format = MapFormat::detect(comment);
        }
        reader.read(&tokens)?;
        reader.finish()
    }

    /// Serializes the map in the format it was read in.
    ///
    /// # Errors
    ///
    /// See [`Dmm::serialize`].
    pub fn to_text(&self, config: &MapConfig) -> Result<String> {
        self.serialize(self.format, config)
    }

    /// Serializes the map.
    ///
    /// Standard and TGM output reuse the keys of the parsed file for
    /// unchanged tiles and draw new keys from a pool shuffled with
    /// `config.key_seed`. Maphash keys depend only on tile contents.
    ///
    /// # Errors
    ///
    /// Returns a `Map` error if the key space runs out or a maphash key
    /// cannot be found within `config.maphash_attempts`.
    pub fn serialize(&self, format: MapFormat, config: &MapConfig) -> Result<String> {
        let plain: Vec<String> = self.tiles.iter().map(|t| t.signature(false)).collect();
        let pretty: Vec<String> = if format == MapFormat::Tgm {
            self.tiles.iter().map(|t| t.signature(true)).collect()
        } else {
            Vec::new()
        };
        let signatures = if format == MapFormat::Tgm { &pretty } else { &plain };

        let keys = match format {
            MapFormat::Maphash => maphash_keys(&plain, config)?,
            MapFormat::Standard | MapFormat::Tgm => self.pooled_keys(signatures, &plain, config)?,
        };

        let mut out = String::new();
        if let Some(header) = format.header() {
            out.push_str(header);
            out.push('\n');
        }
        let mut table: Vec<(&str, &str)> = keys.iter().map(|(s, k)| (k.as_str(), s.as_str())).collect();
        table.sort_by(|a, b| compare_keys(a.0, b.0));
        for (key, signature) in table {
            let _ = writeln!(out, "\"{key}\" = {signature}");
        }
        out.push('\n');

        let key_at = |x: u32, y: u32, z: u32| -> Result<&str> {
            let index = Coord::new(x, y, z).grid_index(self.maxx, self.maxy);
            signatures
                .get(index)
                .and_then(|s| keys.get(s))
                .map(String::as_str)
                .ok_or_else(|| {
                    Error::new(ErrorKind::Internal(format!("no key for tile ({x},{y},{z})")))
                })
        };

        for z in 1..=self.maxz {
            match format {
                MapFormat::Standard => {
                    let _ = writeln!(out, "(1,1,{z}) = {{\"");
                    for y in (1..=self.maxy).rev() {
                        for x in 1..=self.maxx {
                            out.push_str(key_at(x, y, z)?);
                        }
                        out.push('\n');
                    }
                    out.push_str("\"}\n");
                }
                MapFormat::Tgm | MapFormat::Maphash => {
                    for x in 1..=self.maxx {
                        let _ = writeln!(out, "({x},1,{z}) = {{\"");
                        for y in (1..=self.maxy).rev() {
                            out.push_str(key_at(x, y, z)?);
                            out.push('\n');
                        }
                        out.push_str("\"}\n");
                    }
                }
            }
            if z != self.maxz {
                out.push('\n');
            }
        }

        if self.crlf {
            out = out.replace('\n', "\r\n");
        }
        Ok(out)
    }

    /// Keys for the standard and TGM formats, by output signature.
    fn pooled_keys(
        &self,
        signatures: &[String],
        plain: &[String],
        config: &MapConfig,
    ) -> Result<HashMap<String, String>> {
        let mut order: Vec<&str> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut assigned: HashMap<String, String> = HashMap::new();
        let mut used: HashSet<String> = HashSet::new();
        for (signature, plain) in signatures.iter().zip(plain) {
            if seen.insert(signature) {
                order.push(signature);
            }
            if let Some(key) = self.original_keys.get(plain) {
                used.insert(key.clone());
                assigned.insert(signature.clone(), key.clone());
            }
        }
        debug!(
            reused = used.len(),
            original = self.original_keys.len(),
            "reusing original keys"
        );

        let original_len = used.iter().next().map_or(1, String::len);
        let len = width_for(order.len(), original_len);
        if len > original_len {
            let prefix = "a".repeat(len - original_len);
            used = used.into_iter().map(|k| format!("{prefix}{k}")).collect();
            for key in assigned.values_mut() {
                key.insert_str(0, &prefix);
            }
        }

        let mut pool: Vec<String> = (0..capacity(len).min(MAX_POOL))
            .map(|n| number_to_key(n, len))
            .filter(|k| !used.contains(k))
            .collect();
        pool.shuffle(&mut ChaCha8Rng::seed_from_u64(config.key_seed));
        let mut pool = pool.into_iter();

        let mut fresh = 0usize;
        for signature in order {
            if assigned.contains_key(signature) {
                continue;
            }
            let key = pool.next().ok_or_else(|| {
                Error::map(format!("ran out of {len}-character keys"), None)
            })?;
            assigned.insert(signature.to_string(), key);
            fresh += 1;
        }
        debug!(fresh, width = len, "assigned new keys");
        Ok(assigned)
    }
}

impl<'t> MapReader<'t, '_> {
    fn read(&mut self, tokens: &[Token]) -> Result<()> {
        let mut cursor = Cursor::new(tokens);
        while let Some(token) = cursor.peek() {
            match &token.kind {
                TokenKind::Newline(_) => cursor.advance(),
                TokenKind::Str(lit) => {
                    let Some(key) = lit.as_plain() else {
                        return Err(map_error("keys must be plain text", &token.pos));
                    };
                    cursor.advance();
                    self.read_key(&mut cursor, key, &token.pos)?;
                }
                TokenKind::Symbol("(") => self.read_block(&mut cursor, &token.pos)?,
                _ => return Err(map_error(format!("unexpected '{token}'"), &token.pos)),
            }
        }
        Ok(())
    }

    /// Reads `= (a,b,c)` after a key.
    fn read_key(&mut self, cursor: &mut Cursor<'_>, key: String, pos: &SourcePos) -> Result<()> {
        if key.is_empty() {
            return Err(map_error("empty key", pos));
        }
        self.key_len = key.chars().count();
        expect(cursor, "=")?;
        expect(cursor, "(")?;
        let mut model: Vec<Instance> = Vec::new();
        loop {
            cursor.skip_newlines(false);
            match cursor.peek() {
                None => return Err(map_error("unterminated key definition", pos)),
                Some(t) if t.is_symbol(")") => {
                    cursor.advance();
                    break;
                }
                Some(_) => {}
            }
            if !model.is_empty() {
                expect(cursor, ",")?;
                cursor.skip_newlines(false);
            }
            let item_pos = cursor.error_pos();
            let value = parse_primary(cursor)?
                .evaluate_constant(&EvalContext::new())
                .map_err(|e| map_error(e.to_string(), &item_pos))?;
            let Value::Typepath(t) = value else {
                return Err(map_error(
                    format!("expected a typepath, found {}", value.kind_name()),
                    &item_pos,
                ));
            };
            model.push(
                self.dmm
                    .instance_with_vars(&t.path, t.vars.into_iter().flatten()),
            );
        }
        match cursor.peek() {
            None => {}
            Some(t) if t.is_newline() => cursor.advance(),
            Some(t) => return Err(map_error(format!("unexpected '{t}' after key definition"), &t.pos)),
        }

        match self
            .dmm
            .original_keys
            .entry(signature_of(model.iter(), false))
        {
            Entry::Occupied(existing) => {
                warn!(
                    key = %key,
                    existing = %existing.get(),
                    "duplicate key signature {}",
                    existing.key()
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(key.clone());
            }
        }
        self.models.entry(key).or_insert(model);
        Ok(())
    }

    /// Reads `(x,y,z) = {"rows"}`; the cursor is on the `(`.
    fn read_block(&mut self, cursor: &mut Cursor<'_>, pos: &SourcePos) -> Result<()> {
        cursor.advance();
        let x = coordinate(cursor)?;
        expect(cursor, ",")?;
        let mut y = coordinate(cursor)?;
        expect(cursor, ",")?;
        let z = coordinate(cursor)?;
        expect(cursor, ")")?;
        expect(cursor, "=")?;
        let text = match cursor.peek() {
            Some(Token {
                kind: TokenKind::Str(lit),
                pos,
                ..
            }) => lit
                .as_plain()
                .ok_or_else(|| map_error("grid must be plain text", pos))?,
            other => {
                let found = other.map_or_else(|| "end of input".to_string(), |t| format!("'{t}'"));
                return Err(map_error(format!("expected grid text, found {found}"), &cursor.error_pos()));
            }
        };
        cursor.advance();

        for line in text.trim().split('\n') {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let chars: Vec<char> = line.chars().collect();
            if chars.len() % self.key_len != 0 {
                return Err(map_error(
                    format!("row of {} characters does not divide into {}-character keys", chars.len(), self.key_len),
                    pos,
                ));
            }
            let mut column = x;
            for chunk in chars.chunks(self.key_len) {
                let key: String = chunk.iter().collect();
                let Some(model) = self.models.get(&key) else {
                    return Err(map_error(format!("key {key} does not exist"), pos));
                };
                let contents = model
                    .iter()
                    .map(|i| Rc::new(self.dmm.copy_instance(i)))
                    .collect();
                self.cells.insert((column, y, z), contents);
                self.maxx = self.maxx.max(column);
                column = column
                    .checked_add(1)
                    .ok_or_else(|| map_error("grid is too wide", pos))?;
            }
            let height = self.heights.entry(z).or_insert(0);
            *height = (*height).max(y);
            self.maxy = self.maxy.max(y);
            y = y
                .checked_add(1)
                .ok_or_else(|| map_error("grid is too tall", pos))?;
        }
        self.maxz = self.maxz.max(z);
        Ok(())
    }

    /// Flips each level bottom-up and installs the grid.
    fn finish(mut self) -> Result<Dmm<'t>> {
        let expected = u64::from(self.maxx) * u64::from(self.maxy) * u64::from(self.maxz);
        if expected != self.cells.len() as u64 {
            return Err(Error::map(
                format!(
                    "{}: {}x{}x{} grid has {} tiles defined",
                    self.file,
                    self.maxx,
                    self.maxy,
                    self.maxz,
                    self.cells.len()
                ),
                None,
            ));
        }
        let mut tiles = Vec::with_capacity(self.cells.len());
        for z in 1..=self.maxz {
            let height = self.heights.get(&z).copied().unwrap_or(0);
            for y in 1..=self.maxy {
                for x in 1..=self.maxx {
                    let contents = (y <= height)
                        .then(|| self.cells.remove(&(x, height - y + 1, z)))
                        .flatten();
                    let Some(contents) = contents else {
                        return Err(Error::map(
                            format!("{}: no tile at ({x},{y},{z})", self.file),
                            None,
                        ));
                    };
                    tiles.push(Tile::new(Coord::new(x, y, z), contents));
                }
            }
        }
        debug!(
            file = self.file,
            keys = self.models.len(),
            size = ?(self.maxx, self.maxy, self.maxz),
            format = %self.dmm.format,
            "map parsed"
        );
        self.dmm.install(self.maxx, self.maxy, self.maxz, tiles);
        Ok(self.dmm)
    }
}

fn map_error(message: impl Into<String>, pos: &SourcePos) -> Error {
    Error::map(message, Some(pos.clone()))
}

fn expect(cursor: &mut Cursor<'_>, symbol: &str) -> Result<()> {
    match cursor.peek() {
        Some(t) if t.is_symbol(symbol) => {
            cursor.advance();
            Ok(())
        }
        Some(t) => Err(map_error(format!("expected '{symbol}', found '{t}'"), &t.pos)),
        None => Err(map_error(format!("expected '{symbol}', found end of input"), &cursor.error_pos())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn coordinate(cursor: &mut Cursor<'_>) -> Result<u32> {
    let pos = cursor.error_pos();
    let value = parse_expression(cursor)?
        .evaluate_constant(&EvalContext::new())
        .map_err(|e| map_error(e.to_string(), &pos))?;
    match value.as_number() {
        Some(n) if n >= 1.0 && n.fract() == 0.0 && n <= f64::from(u32::MAX) => Ok(n as u32),
        _ => Err(map_error(format!("invalid coordinate {value}"), &pos)),
    }
}

// =============================================================================
// Maphash
// =============================================================================

/// Hashes `signature` into a key not in `used`, trying successive salts.
///
/// The hash input is the signature without its outer parentheses followed
/// by the decimal salt. The first two bytes of the SHA-1 digest, read big
/// endian, give the key number; `0xFFFF` is skipped. Returns the key and the
/// salt that produced it.
#[must_use]
pub fn maphash_key(signature: &str, used: &HashSet<String>, attempts: u32) -> Option<(String, u32)> {
    let body = signature
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(signature);
    (0..attempts).find_map(|salt| {
        let digest = Sha1::digest(format!("{body}{salt}").as_bytes());
        let number = u16::from_be_bytes([digest[0], digest[1]]);
        if number == u16::MAX {
            return None;
        }
        let key = number_to_key(u64::from(number), MAPHASH_KEY_LEN);
        (!used.contains(&key)).then_some((key, salt))
    })
}

/// Assigns maphash keys. More frequent signatures pick first, so a
/// collision moves a rare tile's key rather than a common one.
fn maphash_keys(signatures: &[String], config: &MapConfig) -> Result<HashMap<String, String>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for signature in signatures {
        *counts.entry(signature).or_insert(0) += 1;
    }
    let mut ordered: Vec<(&str, usize)> = counts.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

    let mut used: HashSet<String> = HashSet::new();
    let mut keys: HashMap<String, String> = HashMap::new();
    let mut rehashes: BTreeMap<u32, usize> = BTreeMap::new();
    for (signature, _) in ordered {
        let Some((key, salt)) = maphash_key(signature, &used, config.maphash_attempts) else {
            return Err(Error::map(
                format!(
                    "could not find a key for {signature} in {} attempts",
                    config.maphash_attempts
                ),
                None,
            ));
        };
        used.insert(key.clone());
        if salt > 0 {
            *rehashes.entry(salt).or_insert(0) += 1;
        }
        keys.insert(signature.to_string(), key);
    }
    for (salt, count) in rehashes {
        debug!(count, salt, "maphash collisions");
    }
    Ok(keys)
}
