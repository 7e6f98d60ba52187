//! Map and tile types.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::error::MapFormatError;
use crate::game::PlayerKind;

/// Side length of the square window returned by a `LOOK`.
pub const LOOK_RADIUS: i32 = 5;

/// A coordinate on the map.
///
/// Signed so that windows and moves can step off the edge; anything outside
/// the grid reads as [`Tile::Void`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    /// X coordinate (column).
    pub x: i32,
    /// Y coordinate (row).
    pub y: i32,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// This coordinate shifted by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x.saturating_add(dx), self.y.saturating_add(dy))
    }
}

/// Kind of terrain on a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tile {
    /// Open floor.
    Empty,
    /// Impassable wall.
    Wall,
    /// Floor holding one gold coin.
    Gold,
    /// The dungeon exit.
    Exit,
    /// Off-map placeholder. Impassable and never part of the grid.
    Void,
}

impl Tile {
    /// Parse a map-file glyph. `Void` has no glyph of its own.
    #[must_use]
    pub const fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Self::Empty),
            '#' => Some(Self::Wall),
            'G' => Some(Self::Gold),
            'E' => Some(Self::Exit),
            _ => None,
        }
    }

    /// Wire glyph for this tile. Clients only know `#`, so `Void` renders as a wall.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Wall | Self::Void => '#',
            Self::Gold => 'G',
            Self::Exit => 'E',
        }
    }

    /// Check if a player may stand on this tile.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        !matches!(self, Self::Wall | Self::Void)
    }
}

/// A rendered cell: terrain, or a player standing on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    /// Bare terrain.
    Tile(Tile),
    /// A player's icon.
    Player(PlayerKind),
}

impl Cell {
    /// Wire glyph for this cell.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Tile(tile) => tile.glyph(),
            Self::Player(kind) => kind.icon(),
        }
    }
}

/// The dungeon map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    /// Display name from the `name` line.
    name: String,
    /// Gold a player must carry to leave through an exit.
    gold_to_win: u32,
    /// Width of the map in tiles.
    width: i32,
    /// Height of the map in tiles.
    height: i32,
    /// Tiles stored in row-major order.
    tiles: Vec<Tile>,
}

impl TileMap {
    /// Parse a map description.
    ///
    /// ```text
    /// name <display name>
    /// win <gold threshold>
    /// <grid rows of # . G E>
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`MapFormatError`] describing the first structural problem.
    pub fn load(source: &str) -> Result<Self, MapFormatError> {
        let mut lines = source.lines().map(|line| line.trim_end_matches('\r'));

        let name = parse_name(lines.next())?;
        let gold_to_win = parse_win(lines.next())?;

        let mut rows: Vec<&str> = lines.collect();
        while rows.last().is_some_and(|row| row.is_empty()) {
            rows.pop();
        }

        let Some(first) = rows.first() else {
            return Err(MapFormatError::NoRows);
        };
        let expected = first.chars().count();

        let mut tiles = Vec::with_capacity(expected * rows.len());
        for (row, line) in rows.iter().enumerate() {
            let found = line.chars().count();
            if found != expected {
                return Err(MapFormatError::RowWidth {
                    row,
                    expected,
                    found,
                });
            }
            for (col, glyph) in line.chars().enumerate() {
                let tile = Tile::from_glyph(glyph)
                    .ok_or(MapFormatError::UnknownGlyph { row, col, glyph })?;
                tiles.push(tile);
            }
        }

        if !tiles.iter().any(|tile| tile.is_passable()) {
            return Err(MapFormatError::NoOpenFloor);
        }

        let width = i32::try_from(expected).map_err(|_| MapFormatError::TooLarge)?;
        let height = i32::try_from(rows.len()).map_err(|_| MapFormatError::TooLarge)?;
        width.checked_mul(height).ok_or(MapFormatError::TooLarge)?;

        Ok(Self {
            name,
            gold_to_win,
            width,
            height,
            tiles,
        })
    }

    /// Read and parse a map file.
    ///
    /// # Errors
    ///
    /// Returns [`MapFormatError::Io`] if the file cannot be read, or any
    /// parse error from [`TileMap::load`].
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self, MapFormatError> {
        let source = fs::read_to_string(path)?;
        Self::load(&source)
    }

    /// Display name of the map.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gold required to win.
    #[must_use]
    pub const fn gold_to_win(&self) -> u32 {
        self.gold_to_win
    }

    /// Get the width of the map.
    #[must_use]
    pub const fn width(&self) -> i32 {
        self.width
    }

    /// Get the height of the map.
    #[must_use]
    pub const fn height(&self) -> i32 {
        self.height
    }

    /// Check if a coordinate is within the map bounds.
    #[must_use]
    pub const fn in_bounds(&self, coord: Coord) -> bool {
        coord.x >= 0 && coord.y >= 0 && coord.x < self.width && coord.y < self.height
    }

    /// Convert a coordinate to an index into the tiles array.
    fn coord_to_index(&self, coord: Coord) -> Option<usize> {
        if self.in_bounds(coord) {
            usize::try_from(coord.y * self.width + coord.x).ok()
        } else {
            None
        }
    }

    /// Tile at `coord`, or [`Tile::Void`] outside the map.
    #[must_use]
    pub fn tile_at(&self, coord: Coord) -> Tile {
        self.coord_to_index(coord)
            .and_then(|idx| self.tiles.get(idx))
            .copied()
            .unwrap_or(Tile::Void)
    }

    /// Overwrite the tile at `coord`. Out-of-bounds writes are ignored.
    pub fn replace_tile(&mut self, coord: Coord, tile: Tile) {
        if let Some(slot) = self
            .coord_to_index(coord)
            .and_then(|idx| self.tiles.get_mut(idx))
        {
            *slot = tile;
        }
    }

    /// Square `radius`×`radius` window with `center` at `(radius/2, radius/2)`.
    ///
    /// Rows run top to bottom, cells left to right. The window keeps its size
    /// at the map edges; cells beyond the map are [`Tile::Void`].
    #[must_use]
    pub fn look_window(&self, center: Coord, radius: i32) -> Vec<Vec<Tile>> {
        let half = radius / 2;
        (0..radius)
            .map(|dy| {
                (0..radius)
                    .map(|dx| self.tile_at(center.offset(dx - half, dy - half)))
                    .collect()
            })
            .collect()
    }

    /// Iterate over all coordinates and tiles in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Coord, Tile)> + '_ {
        let width = self.width;
        (0..self.height)
            .flat_map(move |y| (0..width).map(move |x| Coord::new(x, y)))
            .zip(self.tiles.iter().copied())
    }

    /// Gold coins still lying on the map.
    #[must_use]
    pub fn total_gold(&self) -> usize {
        self.tiles.iter().filter(|&&tile| tile == Tile::Gold).count()
    }
}

impl FromStr for TileMap {
    type Err = MapFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::load(s)
    }
}

fn parse_name(line: Option<&str>) -> Result<String, MapFormatError> {
    let line = line.unwrap_or_default();
    line.strip_prefix("name ")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| MapFormatError::MalformedName(line.to_owned()))
}

fn parse_win(line: Option<&str>) -> Result<u32, MapFormatError> {
    let line = line.ok_or(MapFormatError::MissingWin)?;
    line.strip_prefix("win ")
        .and_then(|value| value.trim().parse::<u32>().ok())
        .ok_or_else(|| MapFormatError::InvalidWin(line.to_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MAP: &str = "name Test Dungeon\nwin 2\n\
                            ######\n\
                            #....#\n\
                            #....#\n\
                            #GE.G#\n\
                            ######\n";

    fn test_map() -> TileMap {
        TileMap::load(TEST_MAP).unwrap()
    }

    #[test]
    fn test_map_load() {
        let map = test_map();
        assert_eq!(map.name(), "Test Dungeon");
        assert_eq!(map.gold_to_win(), 2);
        assert_eq!(map.width(), 6);
        assert_eq!(map.height(), 5);
        assert_eq!(map.total_gold(), 2);
    }

    #[test]
    fn test_map_load_crlf() {
        let source = TEST_MAP.replace('\n', "\r\n");
        let map: TileMap = source.parse().unwrap();
        assert_eq!(map.width(), 6);
        assert_eq!(map.tile_at(Coord::new(2, 3)), Tile::Exit);
    }

    #[test]
    fn test_map_bad_name() {
        let err = TileMap::load("nam Broken\nwin 1\n.\n").unwrap_err();
        assert!(matches!(err, MapFormatError::MalformedName(_)));

        let err = TileMap::load("name    \nwin 1\n.\n").unwrap_err();
        assert!(matches!(err, MapFormatError::MalformedName(_)));

        let err = TileMap::load("").unwrap_err();
        assert!(matches!(err, MapFormatError::MalformedName(_)));
    }

    #[test]
    fn test_map_bad_win() {
        assert!(matches!(
            TileMap::load("name A\n").unwrap_err(),
            MapFormatError::MissingWin
        ));
        assert!(matches!(
            TileMap::load("name A\nwin -1\n.\n").unwrap_err(),
            MapFormatError::InvalidWin(_)
        ));
        assert!(matches!(
            TileMap::load("name A\nwin lots\n.\n").unwrap_err(),
            MapFormatError::InvalidWin(_)
        ));
        assert!(matches!(
            TileMap::load("name A\ngold 3\n.\n").unwrap_err(),
            MapFormatError::InvalidWin(_)
        ));
    }

    #[test]
    fn test_map_ragged_rows() {
        let err = TileMap::load("name A\nwin 0\n####\n#..#\n#.#\n####\n").unwrap_err();
        assert!(matches!(
            err,
            MapFormatError::RowWidth {
                row: 2,
                expected: 4,
                found: 3
            }
        ));
    }

    #[test]
    fn test_map_no_rows_and_no_floor() {
        assert!(matches!(
            TileMap::load("name A\nwin 0\n\n").unwrap_err(),
            MapFormatError::NoRows
        ));
        assert!(matches!(
            TileMap::load("name A\nwin 0\n###\n###\n").unwrap_err(),
            MapFormatError::NoOpenFloor
        ));
    }

    #[test]
    fn test_map_unknown_glyph() {
        let err = TileMap::load("name A\nwin 0\n#.#\n#X#\n").unwrap_err();
        assert!(matches!(
            err,
            MapFormatError::UnknownGlyph {
                row: 1,
                col: 1,
                glyph: 'X'
            }
        ));
    }

    #[test]
    fn test_tile_at_bounds() {
        let map = test_map();
        assert_eq!(map.tile_at(Coord::new(1, 2)), Tile::Empty);
        assert_eq!(map.tile_at(Coord::new(1, 3)), Tile::Gold);
        assert_eq!(map.tile_at(Coord::new(0, 0)), Tile::Wall);
        assert_eq!(map.tile_at(Coord::new(-1, 0)), Tile::Void);
        assert_eq!(map.tile_at(Coord::new(0, -1)), Tile::Void);
        assert_eq!(map.tile_at(Coord::new(6, 0)), Tile::Void);
        assert_eq!(map.tile_at(Coord::new(0, 5)), Tile::Void);
    }

    #[test]
    fn test_replace_tile() {
        let mut map = test_map();
        map.replace_tile(Coord::new(1, 2), Tile::Gold);
        assert_eq!(map.tile_at(Coord::new(1, 2)), Tile::Gold);

        // Out of bounds is a no-op
        let before = map.clone();
        map.replace_tile(Coord::new(40, 40), Tile::Gold);
        map.replace_tile(Coord::new(-1, 2), Tile::Gold);
        assert_eq!(map, before);
    }

    #[test]
    fn test_look_window_interior() {
        let map = test_map();
        let window = map.look_window(Coord::new(2, 2), LOOK_RADIUS);
        let rows: Vec<String> = window
            .iter()
            .map(|row| row.iter().map(|tile| tile.glyph()).collect())
            .collect();
        assert_eq!(rows, vec!["#####", "#....", "#....", "#GE.G", "#####"]);
    }

    #[test]
    fn test_look_window_corner_pads_with_void() {
        let map = test_map();
        let window = map.look_window(Coord::new(0, 0), LOOK_RADIUS);
        assert_eq!(window.len(), 5);
        assert!(window.iter().all(|row| row.len() == 5));

        // Top two rows and left two columns lie off the map
        for (y, row) in window.iter().enumerate() {
            for (x, tile) in row.iter().enumerate() {
                if x < 2 || y < 2 {
                    assert_eq!(*tile, Tile::Void, "({x}, {y}) should be void");
                }
            }
        }
        assert_eq!(window[2][2], Tile::Wall);
        assert_eq!(window[3][3], Tile::Empty);
    }

    #[test]
    fn test_iter_row_major() {
        let map = test_map();
        let cells: Vec<(Coord, Tile)> = map.iter().collect();
        assert_eq!(cells.len(), 30);
        assert_eq!(cells[0], (Coord::new(0, 0), Tile::Wall));
        assert_eq!(cells[19], (Coord::new(1, 3), Tile::Gold));
        assert_eq!(cells[20], (Coord::new(2, 3), Tile::Exit));
    }

    #[test]
    fn test_tile_passable() {
        assert!(Tile::Empty.is_passable());
        assert!(Tile::Gold.is_passable());
        assert!(Tile::Exit.is_passable());
        assert!(!Tile::Wall.is_passable());
        assert!(!Tile::Void.is_passable());
    }

    #[test]
    fn test_cell_glyph() {
        assert_eq!(Cell::Tile(Tile::Void).glyph(), '#');
        assert_eq!(Cell::Player(PlayerKind::Human).glyph(), 'H');
        assert_eq!(Cell::Player(PlayerKind::Bot).glyph(), 'B');
    }
}
