/// Level sources: legacy ASCII courses, JSON level documents, and the
/// catalog that maps `(world, stage)` to a memoised blueprint.
///
/// ## Sources (priority order)
///   1. `levels_dir/world{N}_stage{M}.json` (or `.area.json`) override
///   2. Stage 1: the labyrinth generator seeded by the world's track name
///   3. Other stages: the embedded ASCII course named after the world
///
/// ## Legacy row format
///   'G' / 'B' / 'Q' = solid materials     '.' = empty
///   'C' = coin     'S' = spike     'F' = flag     'R' = robot spawn
///
/// Marker cells are empty terrain; the markers become placements.
///
/// ## Level document (JSON)
///   ```text
///   {
///     "width": 128, "height": 15,
///     "tileWidth": 16, "tileHeight": 16,
///     "tileset": "tilesets/platformer16.png",
///     "solidGids": [1, 2, 3],
///     "layers": [ { "name": "ground", "encoding": "csv", "data": "0,0,1,..." } ],
///     "entities": [ { "type": "coin", "x": 320, "y": 160 } ]
///   }
///   ```
/// Entity coordinates are pixels. Instead of `layers`, a document may give
/// `columns`: `{ "repeat": n, "metatile": [gid per row], "rows": [{from, to, gid}] }`,
/// each expanded `repeat` times left to right.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{EntityKind, EntityPlacement};
use crate::domain::grid::{cell_count, TileGrid, MAX_CELLS};
use crate::domain::tile::Tile;
use crate::error::{LevelError, Result};

use super::builder::Blueprint;
use super::labyrinth;

/// Generator seeds, one world per track, in world order.
pub const TRACKS: [&str; 9] = [
    "background",
    "pointer_plains",
    "lambda_gardens",
    "namespace_nebula",
    "template_temple",
    "multithread_foundry",
    "exception_volcano",
    "heap_caverns",
    "boss_fight",
];

/// Seed of the single world a catalog gets when it has no tracks.
pub const FALLBACK_SEED: &str = "robot_cpp";

const FEET: (f32, f32) = (0.5, 1.0);
const CENTRE: (f32, f32) = (0.5, 0.5);

// ══════════════════════════════════════════════════════════════
// Legacy ASCII courses
// ══════════════════════════════════════════════════════════════

impl Blueprint {
    /// Parse legacy row strings, turning marker characters into placements.
    pub fn from_legacy_rows<S: AsRef<str>>(rows: &[S], tile_size: u32) -> Result<Blueprint> {
        let grid = TileGrid::from_rows(rows, tile_size)?;
        let mut placements = Vec::new();
        for (y, line) in rows.iter().enumerate() {
            for (x, ch) in line.as_ref().chars().enumerate() {
                let (fx, fy) = (x as f32, y as f32);
                let placement = match ch {
                    'C' => EntityPlacement::new(EntityKind::Coin, fx + 0.5, fy + 0.4, CENTRE),
                    'S' => EntityPlacement::new(EntityKind::Spike, fx + 0.5, fy + 1.0, FEET),
                    'F' => EntityPlacement::new(EntityKind::Flag, fx + 0.5, fy + 1.0, FEET),
                    'R' => EntityPlacement::new(EntityKind::Spawn, fx + 0.5, fy + 1.0, FEET),
                    _ => continue,
                };
                placements.push(placement);
            }
        }
        Ok(Blueprint::new(grid, placements))
    }
}

/// Embedded course for a world display name. Unknown names get Pointer Plains.
pub fn legacy_course(name: &str) -> &'static [&'static str] {
    match name {
        "Template Temple" => TEMPLATE_TEMPLE,
        "Namespace Nebula" => NAMESPACE_NEBULA,
        "Exception Volcano" => EXCEPTION_VOLCANO,
        "STL City" => STL_CITY,
        "Heap Caverns" => HEAP_CAVERNS,
        "Lambda Gardens" => LAMBDA_GARDENS,
        "Multithread Foundry" => MULTITHREAD_FOUNDRY,
        "NullPointer-Nexus" => NULLPOINTER_NEXUS,
        _ => POINTER_PLAINS,
    }
}

// ══════════════════════════════════════════════════════════════
// Level document
// ══════════════════════════════════════════════════════════════

fn default_tile_extent() -> u32 { 16 }
fn default_repeat() -> i64 { 1 }
fn default_entity_type() -> String { "unknown".into() }

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LevelDocument {
    #[serde(default)]
    pub width: usize,
    #[serde(default)]
    pub height: usize,
    #[serde(default = "default_tile_extent", alias = "tilewidth")]
    pub tile_width: u32,
    #[serde(default = "default_tile_extent", alias = "tileheight")]
    pub tile_height: u32,
    #[serde(default)]
    pub tileset: String,
    #[serde(default)]
    pub solid_gids: Vec<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<TileLayer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<AreaColumn>,
    #[serde(default)]
    pub entities: Vec<EntityRecord>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TileLayer {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub encoding: String,
    #[serde(default)]
    pub data: String,
}

/// One column description of the area format.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AreaColumn {
    #[serde(default = "default_repeat")]
    pub repeat: i64,
    /// Gid per row from the top; shorter than the height leaves the rest empty.
    #[serde(default)]
    pub metatile: Vec<u32>,
    /// Inclusive row runs painted over the metatile.
    #[serde(default)]
    pub rows: Vec<AreaRun>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AreaRun {
    #[serde(default)]
    pub from: i64,
    #[serde(default)]
    pub to: Option<i64>,
    #[serde(default)]
    pub gid: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EntityRecord {
    #[serde(rename = "type", default = "default_entity_type")]
    pub kind: String,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, serde_json::Value>,
    /// Only written when it differs from the kind's usual anchor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<[f32; 2]>,
}

/// Coins float, everything else stands on its position.
fn default_anchor(kind: &EntityKind) -> (f32, f32) {
    match kind {
        EntityKind::Coin => CENTRE,
        _ => FEET,
    }
}

impl LevelDocument {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Encode a blueprint as a single CSV layer with pixel-space entities.
    pub fn from_blueprint(bp: &Blueprint) -> Self {
        let ts = bp.grid.tile_size();
        let solid_gids: BTreeSet<u32> =
            bp.grid.cells().iter().filter(|t| t.is_solid()).map(|t| t.gid()).collect();
        let data = bp
            .grid
            .cells()
            .iter()
            .map(|t| t.gid().to_string())
            .collect::<Vec<_>>()
            .join(",");

        let entities = bp
            .placements
            .iter()
            .map(|p| {
                let (x, y) = p.pixel_pos(ts as f32);
                let anchor = (p.anchor != default_anchor(&p.kind)).then(|| [p.anchor.0, p.anchor.1]);
                EntityRecord {
                    kind: p.kind.tag().to_string(),
                    x,
                    y,
                    properties: p
                        .extras
                        .iter()
                        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                        .collect(),
                    anchor,
                }
            })
            .collect();

        LevelDocument {
            width: bp.grid.width(),
            height: bp.grid.height(),
            tile_width: ts,
            tile_height: ts,
            tileset: String::new(),
            solid_gids: solid_gids.into_iter().collect(),
            layers: vec![TileLayer { name: "ground".into(), encoding: "csv".into(), data }],
            columns: Vec::new(),
            entities,
        }
    }

    /// Decode into a blueprint. The first layer wins over `columns`.
    pub fn to_blueprint(&self) -> Result<Blueprint> {
        if self.tile_width != self.tile_height {
            return Err(LevelError::NonSquareTiles { width: self.tile_width, height: self.tile_height });
        }
        let (width, gids) = if let Some(layer) = self.layers.first() {
            if layer.encoding != "csv" {
                return Err(LevelError::UnsupportedEncoding(layer.encoding.clone()));
            }
            cell_count(self.width, self.height)?;
            (self.width, parse_csv(&layer.data)?)
        } else if !self.columns.is_empty() {
            self.expand_columns()?
        } else {
            return Err(LevelError::MissingLayer);
        };

        let solid: BTreeSet<u32> = self.solid_gids.iter().copied().collect();
        let cells = gids.into_iter().map(|gid| Tile::from_gid(gid, solid.contains(&gid))).collect();
        let grid = TileGrid::new(width, self.height, self.tile_width, cells)?;

        let ts = self.tile_width as f32;
        let placements = self
            .entities
            .iter()
            .map(|e| {
                let kind = EntityKind::from_tag(&e.kind);
                let anchor = e.anchor.map(|[ax, ay]| (ax, ay)).unwrap_or_else(|| default_anchor(&kind));
                let mut p = EntityPlacement::new(kind, e.x / ts, e.y / ts, anchor);
                for (key, value) in &e.properties {
                    if let Some(text) = property_text(value) {
                        p.extras.insert(key.clone(), text);
                    }
                }
                p
            })
            .collect();

        debug!(
            "decoded {}x{} level document: {} entities",
            grid.width(),
            grid.height(),
            self.entities.len()
        );
        Ok(Blueprint::new(grid, placements))
    }

    /// Expand the area format into row-major gids. The column count is
    /// the width; a disagreeing declared width is ignored.
    fn expand_columns(&self) -> Result<(usize, Vec<u32>)> {
        let height = self.height;
        if height == 0 {
            return Err(LevelError::EmptyGrid);
        }
        let max_columns = MAX_CELLS / height;
        if max_columns == 0 {
            return Err(LevelError::TooLarge { width: self.width, height });
        }

        let mut columns: Vec<Vec<u32>> = Vec::new();
        for column in &self.columns {
            let repeat = usize::try_from(column.repeat.max(1)).unwrap_or(usize::MAX);
            if repeat > max_columns - columns.len() {
                return Err(LevelError::TooLarge { width: columns.len().saturating_add(repeat), height });
            }
            let mut tiles = vec![0u32; height];
            for (y, gid) in column.metatile.iter().take(height).enumerate() {
                tiles[y] = *gid;
            }
            for run in &column.rows {
                let from = run.from.max(0);
                let to = run.to.unwrap_or(run.from).min(height as i64 - 1);
                for y in from..=to {
                    tiles[y as usize] = run.gid;
                }
            }
            for _ in 0..repeat {
                columns.push(tiles.clone());
            }
        }

        let width = columns.len();
        if self.width != 0 && self.width != width {
            warn!("area document declares width {} but its columns give {}", self.width, width);
        }
        let mut gids = Vec::with_capacity(width * height);
        for y in 0..height {
            gids.extend(columns.iter().map(|c| c[y]));
        }
        Ok((width, gids))
    }
}

/// Comma-separated gids. Blank cells are 0; a trailing comma ends the list.
fn parse_csv(data: &str) -> Result<Vec<u32>> {
    let data = data.trim();
    if data.is_empty() {
        return Ok(Vec::new());
    }
    let data = data.strip_suffix(',').unwrap_or(data);
    data.split(',')
        .enumerate()
        .map(|(index, cell)| {
            let cell = cell.trim();
            if cell.is_empty() {
                return Ok(0);
            }
            cell.parse::<u32>()
                .map_err(|_| LevelError::BadCell { index, value: cell.to_string() })
        })
        .collect()
}

fn property_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ══════════════════════════════════════════════════════════════
// Catalog
// ══════════════════════════════════════════════════════════════

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldInfo {
    pub number: u32,
    pub name: String,
    pub description: String,
    pub seed: String,
}

/// Where a level comes from before an override file is considered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LevelOrigin {
    Generated { variant: usize, seed: String },
    Legacy { name: String },
}

/// Everything needed to produce one level, detached from the catalog so it
/// can be loaded on a worker thread.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelSource {
    pub world: u32,
    pub stage: u32,
    pub origin: LevelOrigin,
    pub override_path: Option<PathBuf>,
}

impl LevelSource {
    /// Produce the blueprint. A broken override file is logged and skipped.
    pub fn load(&self) -> Result<Blueprint> {
        if let Some(path) = &self.override_path {
            match LevelDocument::load(path).and_then(|doc| doc.to_blueprint()) {
                Ok(bp) => {
                    info!("world {} stage {}: loaded {}", self.world, self.stage, path.display());
                    return Ok(bp);
                }
                Err(e) => warn!("ignoring level file {}: {e}", path.display()),
            }
        }
        match &self.origin {
            LevelOrigin::Generated { variant, seed } => Ok(labyrinth::generate(*variant, seed)),
            LevelOrigin::Legacy { name } => {
                Blueprint::from_legacy_rows(legacy_course(name), labyrinth::TILE_SIZE)
            }
        }
    }
}

/// World list plus a memo of every level produced so far.
pub struct LevelCatalog {
    worlds: Vec<WorldInfo>,
    levels_dir: Option<PathBuf>,
    cache: HashMap<(u32, u32), Arc<Blueprint>>,
}

impl LevelCatalog {
    /// One world per track. An empty track list still yields one world.
    pub fn new(tracks: &[&str], levels_dir: Option<PathBuf>) -> Self {
        let mut worlds: Vec<WorldInfo> = tracks
            .iter()
            .filter(|t| !t.is_empty())
            .enumerate()
            .map(|(i, track)| WorldInfo {
                number: i as u32 + 1,
                name: display_name(track),
                description: format!("Labyrinth synced to \"{}\"", display_name(track)),
                seed: track.to_string(),
            })
            .collect();
        if worlds.is_empty() {
            worlds.push(WorldInfo {
                number: 1,
                name: "Pointer Plains".into(),
                description: "Classic debug course".into(),
                seed: FALLBACK_SEED.into(),
            });
        }
        LevelCatalog { worlds, levels_dir, cache: HashMap::new() }
    }

    pub fn standard(levels_dir: Option<PathBuf>) -> Self {
        Self::new(&TRACKS, levels_dir)
    }

    pub fn worlds(&self) -> &[WorldInfo] {
        &self.worlds
    }

    pub fn world(&self, number: u32) -> Option<&WorldInfo> {
        self.worlds.iter().find(|w| w.number == number)
    }

    /// World after `current`, wrapping to the first.
    pub fn next_world(&self, current: u32) -> u32 {
        if current as usize >= self.worlds.len() { 1 } else { current + 1 }
    }

    /// How to build `(world, stage)`, or `None` for an unknown world or stage 0.
    pub fn source(&self, world: u32, stage: u32) -> Option<LevelSource> {
        let info = self.world(world)?;
        if stage == 0 {
            return None;
        }
        let origin = if stage == 1 {
            LevelOrigin::Generated { variant: world as usize - 1, seed: info.seed.clone() }
        } else {
            LevelOrigin::Legacy { name: info.name.clone() }
        };
        Some(LevelSource { world, stage, origin, override_path: self.override_file(world, stage) })
    }

    pub fn cached(&self, world: u32, stage: u32) -> Option<Arc<Blueprint>> {
        self.cache.get(&(world, stage)).cloned()
    }

    pub fn store(&mut self, world: u32, stage: u32, bp: Blueprint) -> Arc<Blueprint> {
        let bp = Arc::new(bp);
        self.cache.insert((world, stage), Arc::clone(&bp));
        bp
    }

    /// Memoised level for `(world, stage)`, built on first request.
    pub fn level(&mut self, world: u32, stage: u32) -> Option<Arc<Blueprint>> {
        if let Some(bp) = self.cached(world, stage) {
            return Some(bp);
        }
        let source = self.source(world, stage)?;
        match source.load() {
            Ok(bp) => Some(self.store(world, stage, bp)),
            Err(e) => {
                warn!("world {world} stage {stage} failed to load: {e}");
                None
            }
        }
    }

    fn override_file(&self, world: u32, stage: u32) -> Option<PathBuf> {
        let dir = self.levels_dir.as_ref()?;
        let base = format!("world{world}_stage{stage}");
        [format!("{base}.json"), format!("{base}.area.json")]
            .into_iter()
            .map(|name| dir.join(name))
            .find(|p| p.is_file())
    }
}

/// `multithread_foundry` -> `Multithread Foundry`.
pub fn display_name(track: &str) -> String {
    track
        .split(|c| c == '_' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            let mut word = String::new();
            if let Some(first) = chars.next() {
                word.extend(first.to_uppercase());
                word.push_str(&chars.as_str().to_lowercase());
            }
            word
        })
        .collect::<Vec<String>>()
        .join(" ")
}

// ══════════════════════════════════════════════════════════════
// Embedded courses
// ══════════════════════════════════════════════════════════════

const POINTER_PLAINS: &[&str] = &[
    "................................................",
    "................................................",
    "................................................",
    "...............C...........C.................F..",
    "..........GGGGGGGGGG................GGGGGGGGGGGG",
    "......C..G........GGGGGGGGGGGGGGGGGG...........G",
    "..R.G...G....C.....................C..........G.",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const TEMPLATE_TEMPLE: &[&str] = &[
    "................................................",
    ".............C....................C.............",
    "....QQQQQQQQQQQQ...........QQQQQQQQQQQQQF.......",
    "....Q..........Q....C......Q..........Q.........",
    "..RQ..........QGGGGGGGGGGGGQ..........Q.........",
    "..GGGGGGGGGGGGQ......C.....Q....SSSS..Q.........",
    "............C.Q............Q..........Q.........",
    "..........QQQQQQQQQQQQQQQQQQQQQQQQQQQQQQ........",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const NAMESPACE_NEBULA: &[&str] = &[
    "................................................",
    "...........C......................C.............",
    "....B....BBBBBB.........C.....BBBBBB....F.......",
    ".........B....B....BBBBBBB....B....B............",
    "..R......B....B....B.....B....B....B............",
    "BBBBBBBBBB....BBBBB.....BBBBBBB....BBBBBBBBBBBBB",
    "...............C...................C............",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const EXCEPTION_VOLCANO: &[&str] = &[
    "................................................",
    ".............C...........S.SS...................",
    "....GGGGGGGGGGGGGGG....SSSSSS....GGGGGGGGGGGF...",
    "..RG..............G....S....S....G..............",
    "..GGGGGGGGGGGGGGGGGGGGG....GGGGGGGGGGGGGGGGGGGGG",
    "........C.........S............C................",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const STL_CITY: &[&str] = &[
    "................................................",
    ".................C..............C...............",
    "....BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBF........",
    "....B....C.....B..........C.....B.....B.........",
    "..RB....BBBBB..B....BBBBBBBBB...B..C..B.........",
    "..GGGGGGG..B..BB....B......B....B.....B.........",
    "..........CB..BB....B..C...B....BBBBBBB.........",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const HEAP_CAVERNS: &[&str] = &[
    "................................................",
    ".............C...........C......................",
    "..BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBF....",
    "..B....C.....B..............C.........B.........",
    "..B....BBBBB.BBBBBBBBBBBBBBBBBBBBBB...B.........",
    "..B........B..............C.........B...........",
    "..RBBBBBBB.B....C.................B.............",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const LAMBDA_GARDENS: &[&str] = &[
    "................................................",
    "...........C.............C..............C.......",
    "....GGGGGGGGGGGG....C....GGGGGGGGGGGGGGGGGF.....",
    "..RG.........C.G.........G..............G.......",
    "..GGGGGGGGGGGGGGGGGGGGGGG....C.........GGGGGGGGG",
    "..............C...............C.................",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const MULTITHREAD_FOUNDRY: &[&str] = &[
    "................................................",
    "........C...........C.............C.............",
    "....GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGF......",
    "..RG....C.....G....C....G.....C......G..........",
    "..GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
    "....C.........C............C....................",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

const NULLPOINTER_NEXUS: &[&str] = &[
    "................................................",
    ".............C....S....C....S....C..............",
    "....GGGGGGGGGGSSSSGGGGGGGGSSSSGGGGGGGGGGF.......",
    "..RG...............G....G...............G.......",
    "..GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
    "...........C........C........C..................",
    "GGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGGG",
];

#[cfg(test)]
mod tests {
    use super::*;

    const COURSES: [&str; 9] = [
        "Pointer Plains",
        "Template Temple",
        "Namespace Nebula",
        "Exception Volcano",
        "STL City",
        "Heap Caverns",
        "Lambda Gardens",
        "Multithread Foundry",
        "NullPointer-Nexus",
    ];

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("robot-parkour-{tag}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    // ── Legacy rows ──

    #[test]
    fn legacy_markers_become_placements() {
        let bp = Blueprint::from_legacy_rows(&["..C.", "R.SF", "GGGG"], 32).unwrap();
        assert!(!bp.grid.is_solid(0, 1));
        assert!(!bp.grid.is_solid(2, 0));
        assert!(bp.grid.is_solid(0, 2));

        let coin = bp.placements.iter().find(|p| p.kind == EntityKind::Coin).unwrap();
        assert_eq!((coin.x, coin.y, coin.anchor), (2.5, 0.4, CENTRE));
        let spawn = bp.spawn().unwrap();
        assert_eq!((spawn.x, spawn.y, spawn.anchor), (0.5, 2.0, FEET));
        let flag = bp.flag().unwrap();
        assert_eq!((flag.x, flag.y), (3.5, 2.0));
        assert_eq!(bp.count(&EntityKind::Spike), 1);
        assert_eq!(bp.spawn_point(), (16.0, 64.0));
    }

    #[test]
    fn legacy_rows_must_be_rectangular() {
        let err = Blueprint::from_legacy_rows(&["GGG", "GG"], 32).unwrap_err();
        assert!(matches!(err, LevelError::RaggedRow { row: 1, .. }));
    }

    #[test]
    fn embedded_courses_are_complete() {
        for name in COURSES {
            let bp = Blueprint::from_legacy_rows(legacy_course(name), 32).unwrap();
            assert_eq!(bp.grid.width(), 48, "{name}");
            assert_eq!(bp.count(&EntityKind::Spawn), 1, "{name}");
            assert_eq!(bp.count(&EntityKind::Flag), 1, "{name}");
            assert!(bp.count(&EntityKind::Coin) > 0, "{name}");
        }
    }

    #[test]
    fn unknown_course_is_pointer_plains() {
        assert_eq!(legacy_course("Boss Fight"), legacy_course("Pointer Plains"));
    }

    // ── Documents ──

    #[test]
    fn decodes_lowercase_aliases_and_blank_cells() {
        let doc = LevelDocument::from_json(
            r#"{
                "width": 3, "height": 2,
                "tilewidth": 16, "tileheight": 16,
                "solidGids": [1],
                "layers": [{ "name": "ground", "encoding": "csv", "data": "0, ,1,\n1,1,1" }],
                "entities": [
                    { "type": "coin", "x": 24, "y": 8 },
                    { "type": "Spike", "x": 40, "y": 32,
                      "properties": { "channel": 3, "armed": true, "label": "a", "nested": {} } }
                ]
            }"#,
        )
        .unwrap();
        let bp = doc.to_blueprint().unwrap();
        assert_eq!(bp.rows(), vec!["..G", "GGG"]);
        assert_eq!(bp.grid.tile_size(), 16);

        let coin = &bp.placements[0];
        assert_eq!((coin.kind.clone(), coin.x, coin.y, coin.anchor), (EntityKind::Coin, 1.5, 0.5, CENTRE));
        let spike = &bp.placements[1];
        assert_eq!(spike.kind, EntityKind::Spike);
        assert_eq!((spike.x, spike.y, spike.anchor), (2.5, 2.0, FEET));
        assert_eq!(spike.extras.get("channel").map(String::as_str), Some("3"));
        assert_eq!(spike.extras.get("armed").map(String::as_str), Some("true"));
        assert_eq!(spike.extras.get("label").map(String::as_str), Some("a"));
        assert!(!spike.extras.contains_key("nested"));
    }

    #[test]
    fn tile_size_defaults_to_sixteen() {
        let doc = LevelDocument::from_json(
            r#"{ "width": 1, "height": 1, "layers": [{ "encoding": "csv", "data": "0" }] }"#,
        )
        .unwrap();
        assert_eq!(doc.tile_width, 16);
        assert_eq!(doc.to_blueprint().unwrap().grid.tile_size(), 16);
    }

    #[test]
    fn unknown_gids_keep_their_solidity() {
        let doc = LevelDocument::from_json(
            r#"{ "width": 2, "height": 1, "solidGids": [7],
                 "layers": [{ "encoding": "csv", "data": "7,5" }] }"#,
        )
        .unwrap();
        let bp = doc.to_blueprint().unwrap();
        assert_eq!(bp.grid.tile(0, 0), Tile::Custom { gid: 7, solid: true });
        assert_eq!(bp.grid.tile(1, 0), Tile::Custom { gid: 5, solid: false });
    }

    #[test]
    fn rejects_malformed_documents() {
        let decode = |json: &str| LevelDocument::from_json(json).and_then(|d| d.to_blueprint());

        assert!(matches!(
            decode(r#"{ "width": 1, "height": 1, "tileWidth": 16, "tileHeight": 8,
                        "layers": [{ "encoding": "csv", "data": "0" }] }"#),
            Err(LevelError::NonSquareTiles { width: 16, height: 8 })
        ));
        assert!(matches!(
            decode(r#"{ "width": 1, "height": 1, "layers": [{ "encoding": "base64", "data": "AA==" }] }"#),
            Err(LevelError::UnsupportedEncoding(e)) if e == "base64"
        ));
        assert!(matches!(decode(r#"{ "width": 1, "height": 1 }"#), Err(LevelError::MissingLayer)));
        assert!(matches!(
            decode(r#"{ "width": 2, "height": 1, "layers": [{ "encoding": "csv", "data": "1,x" }] }"#),
            Err(LevelError::BadCell { index: 1, .. })
        ));
        assert!(matches!(
            decode(r#"{ "width": 2, "height": 2, "layers": [{ "encoding": "csv", "data": "1,1,1" }] }"#),
            Err(LevelError::CellCount { expected: 4, found: 3 })
        ));
        assert!(matches!(
            decode(r#"{ "width": 0, "height": 0, "layers": [{ "encoding": "csv", "data": "" }] }"#),
            Err(LevelError::EmptyGrid)
        ));
        assert!(matches!(decode("{ not json"), Err(LevelError::Json(_))));
    }

    #[test]
    fn decodes_area_columns() {
        let doc = LevelDocument::from_json(
            r#"{
                "height": 3, "width": 10, "solidGids": [1, 2],
                "columns": [
                    { "repeat": 2, "rows": [{ "from": 2, "gid": 1 }] },
                    { "metatile": [0, 0, 2] },
                    { "rows": [{ "from": 1, "to": 9, "gid": 1 }] }
                ]
            }"#,
        )
        .unwrap();
        let bp = doc.to_blueprint().unwrap();
        assert_eq!(bp.grid.width(), 4);
        assert_eq!(bp.rows(), vec!["....", "...G", "GGBG"]);
        assert_eq!(bp.grid.tile(2, 2), Tile::Terminal);
    }

    #[test]
    fn oversized_documents_are_refused() {
        let decode = |json: &str| LevelDocument::from_json(json).and_then(|d| d.to_blueprint());

        assert!(matches!(
            decode(r#"{ "width": 4294967296, "height": 4294967296,
                        "layers": [{ "encoding": "csv", "data": "" }] }"#),
            Err(LevelError::TooLarge { .. })
        ));
        assert!(matches!(
            decode(r#"{ "height": 15, "columns": [{ "repeat": 9223372036854775807 }] }"#),
            Err(LevelError::TooLarge { height: 15, .. })
        ));
        assert!(matches!(
            decode(r#"{ "height": 4194304, "columns": [{ "repeat": 1 }, { "repeat": 1 }] }"#),
            Err(LevelError::TooLarge { .. })
        ));
        assert!(matches!(
            decode(r#"{ "height": 4194305, "columns": [{ "repeat": 1 }] }"#),
            Err(LevelError::TooLarge { .. })
        ));
    }

    #[test]
    fn area_needs_a_height() {
        let doc = LevelDocument::from_json(r#"{ "columns": [{ "repeat": 3 }] }"#).unwrap();
        assert!(matches!(doc.to_blueprint(), Err(LevelError::EmptyGrid)));
    }

    #[test]
    fn generated_blueprint_survives_json() {
        let bp = labyrinth::generate(2, "robot_cpp");
        let json = LevelDocument::from_blueprint(&bp).to_json().unwrap();
        let back = LevelDocument::from_json(&json).unwrap().to_blueprint().unwrap();
        assert_eq!(back, bp);
    }

    #[test]
    fn legacy_blueprint_survives_json() {
        let bp = Blueprint::from_legacy_rows(legacy_course("Template Temple"), 32).unwrap();
        let doc = LevelDocument::from_blueprint(&bp);
        assert_eq!(doc.solid_gids, vec![1, 3]);
        assert_eq!(doc.to_blueprint().unwrap(), bp);
    }

    // ── Catalog ──

    #[test]
    fn display_names() {
        assert_eq!(display_name("multithread_foundry"), "Multithread Foundry");
        assert_eq!(display_name("boss-fight"), "Boss Fight");
        assert_eq!(display_name("__heap"), "Heap");
        assert_eq!(display_name("rOBOT_cPP"), "Robot Cpp");
    }

    #[test]
    fn standard_catalog_worlds() {
        let catalog = LevelCatalog::standard(None);
        assert_eq!(catalog.worlds().len(), 9);
        assert_eq!(catalog.world(2).unwrap().name, "Pointer Plains");
        assert_eq!(catalog.world(9).unwrap().seed, "boss_fight");
        assert!(catalog.world(10).is_none());
        assert_eq!(catalog.next_world(3), 4);
        assert_eq!(catalog.next_world(9), 1);
    }

    #[test]
    fn stage_one_is_generated_and_memoised() {
        let mut catalog = LevelCatalog::standard(None);
        let first = catalog.level(3, 1).unwrap();
        assert_eq!(*first, labyrinth::generate(2, "lambda_gardens"));
        let again = catalog.level(3, 1).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn later_stages_use_the_legacy_course() {
        let mut catalog = LevelCatalog::standard(None);
        let temple = catalog.level(5, 2).unwrap();
        assert_eq!(temple.rows().len(), 9);
        assert_eq!(catalog.source(1, 3).unwrap().origin, LevelOrigin::Legacy { name: "Background".into() });
        assert_eq!(catalog.level(1, 3).unwrap().grid.width(), 48);
    }

    #[test]
    fn unknown_keys_have_no_level() {
        let mut catalog = LevelCatalog::standard(None);
        assert!(catalog.level(42, 1).is_none());
        assert!(catalog.level(1, 0).is_none());
    }

    #[test]
    fn empty_track_list_falls_back() {
        let mut catalog = LevelCatalog::new(&[], None);
        assert_eq!(catalog.worlds().len(), 1);
        assert_eq!(catalog.world(1).unwrap().name, "Pointer Plains");
        assert_eq!(*catalog.level(1, 1).unwrap(), labyrinth::generate(0, FALLBACK_SEED));
    }

    #[test]
    fn json_file_overrides_the_generator() {
        let dir = scratch_dir("override");
        let small = Blueprint::from_legacy_rows(&["R..F", "GGGG"], 32).unwrap();
        let json = LevelDocument::from_blueprint(&small).to_json().unwrap();
        std::fs::write(dir.join("world2_stage1.json"), json).unwrap();
        std::fs::write(dir.join("world3_stage1.json"), "{ broken").unwrap();

        let mut catalog = LevelCatalog::standard(Some(dir.clone()));
        assert_eq!(*catalog.level(2, 1).unwrap(), small);
        // A broken file is skipped in favour of the generator
        assert_eq!(*catalog.level(3, 1).unwrap(), labyrinth::generate(2, "lambda_gardens"));
        assert!(catalog.source(4, 1).unwrap().override_path.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
