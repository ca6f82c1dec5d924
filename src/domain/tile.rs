/// Cell kinds and their static properties.
/// Properties come from one lookup table keyed by variant,
/// so cell semantics are centralized here.

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Default)]
pub enum Tile {
    #[default]
    Empty,
    Dirt,       // Walkable, dug away by the player
    Rock,       // Falls, pushable sideways
    Gem,        // Falls, collected by walking in
    Wall,       // Immovable, blast-proof
    ExitClosed, // Immovable until enough gems are collected
    ExitOpen,   // Walking in wins the level
    Player,     // Marker for the player's cell
}

/// Static predicates for one tile kind.
#[derive(Clone, Copy, Debug)]
struct TileProps {
    walkable: bool,
    immovable: bool,
    can_fall: bool,
}

const fn props(walkable: bool, immovable: bool, can_fall: bool) -> TileProps {
    TileProps { walkable, immovable, can_fall }
}

impl Tile {
    pub const ALL: [Tile; 8] = [
        Tile::Empty,
        Tile::Dirt,
        Tile::Rock,
        Tile::Gem,
        Tile::Wall,
        Tile::ExitClosed,
        Tile::ExitOpen,
        Tile::Player,
    ];

    fn props(self) -> TileProps {
        //                              walkable immovable can_fall
        const TABLE: [TileProps; 8] = [
            /* Empty      */ props(true,  false, false),
            /* Dirt       */ props(true,  false, false),
            /* Rock       */ props(false, false, true),
            /* Gem        */ props(true,  false, true),
            /* Wall       */ props(false, true,  false),
            /* ExitClosed */ props(false, true,  false),
            /* ExitOpen   */ props(true,  false, false),
            /* Player     */ props(false, false, false),
        ];
        TABLE[self as usize]
    }

    /// Can the player step into this cell?
    pub fn is_walkable(self) -> bool {
        self.props().walkable
    }

    /// Does this cell block the player outright (no push, no entry)?
    pub fn is_immovable(self) -> bool {
        self.props().immovable
    }

    /// Is this cell subject to gravity?
    pub fn can_fall(self) -> bool {
        self.props().can_fall
    }

    /// Level-file character for this kind.
    pub fn glyph(self) -> char {
        match self {
            Tile::Empty      => ' ',
            Tile::Dirt       => '.',
            Tile::Rock       => 'R',
            Tile::Gem        => 'G',
            Tile::Wall       => '#',
            Tile::ExitClosed => 'E',
            Tile::ExitOpen   => 'O',
            Tile::Player     => '@',
        }
    }

    pub fn from_glyph(c: char) -> Option<Tile> {
        Tile::ALL.iter().copied().find(|t| t.glyph() == c)
    }

    pub fn is_exit(self) -> bool {
        matches!(self, Tile::ExitClosed | Tile::ExitOpen)
    }
}
