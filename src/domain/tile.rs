/// Tile types and their properties.
/// Solidity is a property of the variant, not a side table,
/// so tile semantics are centralized here.
///
/// The legacy ASCII codes (`.`, `G`, `B`, `Q`) and the numeric gids used by
/// level documents only exist at the translation boundary below.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Tile {
    #[default]
    Empty,
    Editor,   // 'G', gid 1
    Terminal, // 'B', gid 2
    Debug,    // 'Q', gid 3
    /// A gid from an external level document with its own solidity flag.
    Custom { gid: u32, solid: bool },
}

/// The three materials a generated level paints with.
pub const MATERIALS: [Tile; 3] = [Tile::Editor, Tile::Terminal, Tile::Debug];

impl Tile {
    /// Can an actor collide with this tile?
    pub fn is_solid(self) -> bool {
        match self {
            Tile::Empty => false,
            Tile::Editor | Tile::Terminal | Tile::Debug => true,
            Tile::Custom { solid, .. } => solid,
        }
    }

    pub fn is_empty(self) -> bool {
        !self.is_solid()
    }

    // ── Legacy ASCII boundary ──

    /// Decode a legacy row character. Unknown characters (including the
    /// entity markers `C`, `S`, `F`, `R`) are empty terrain.
    pub fn from_code(code: char) -> Tile {
        match code {
            'G' => Tile::Editor,
            'B' => Tile::Terminal,
            'Q' => Tile::Debug,
            _ => Tile::Empty,
        }
    }

    /// Encode as a legacy row character. Custom gids have no legacy
    /// letter and degrade to the closest legacy meaning.
    pub fn code(self) -> char {
        match self {
            Tile::Empty => '.',
            Tile::Editor => 'G',
            Tile::Terminal => 'B',
            Tile::Debug => 'Q',
            Tile::Custom { solid: true, .. } => 'B',
            Tile::Custom { solid: false, .. } => '.',
        }
    }

    // ── Gid boundary ──

    pub fn gid(self) -> u32 {
        match self {
            Tile::Empty => 0,
            Tile::Editor => 1,
            Tile::Terminal => 2,
            Tile::Debug => 3,
            Tile::Custom { gid, .. } => gid,
        }
    }

    /// Decode a gid given the document's solidity for it.
    /// Built-in gids map back to their named variants when the solidity agrees.
    pub fn from_gid(gid: u32, solid: bool) -> Tile {
        match (gid, solid) {
            (0, false) => Tile::Empty,
            (1, true) => Tile::Editor,
            (2, true) => Tile::Terminal,
            (3, true) => Tile::Debug,
            _ => Tile::Custom { gid, solid },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn materials_are_solid() {
        for t in MATERIALS {
            assert!(t.is_solid());
        }
        assert!(!Tile::Empty.is_solid());
    }

    #[test]
    fn legacy_codes_round_trip() {
        for t in [Tile::Empty, Tile::Editor, Tile::Terminal, Tile::Debug] {
            assert_eq!(Tile::from_code(t.code()), t);
        }
    }

    #[test]
    fn entity_markers_are_empty_terrain() {
        for c in ['C', 'S', 'F', 'R', '?'] {
            assert_eq!(Tile::from_code(c), Tile::Empty);
        }
    }

    #[test]
    fn gid_round_trip() {
        for t in [Tile::Empty, Tile::Editor, Tile::Terminal, Tile::Debug] {
            assert_eq!(Tile::from_gid(t.gid(), t.is_solid()), t);
        }
        let custom = Tile::from_gid(17, true);
        assert_eq!(custom, Tile::Custom { gid: 17, solid: true });
        assert!(custom.is_solid());
    }

    #[test]
    fn builtin_gid_with_other_solidity_stays_custom() {
        assert_eq!(Tile::from_gid(2, false), Tile::Custom { gid: 2, solid: false });
        assert!(!Tile::from_gid(2, false).is_solid());
    }
}
