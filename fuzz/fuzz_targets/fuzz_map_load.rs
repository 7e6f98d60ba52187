#![no_main]

use dod::game::{Coord, LOOK_RADIUS, TileMap};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(map) = TileMap::load(source) else {
        return;
    };

    // A loaded map always has a floor tile and answers reads anywhere
    assert!(map.iter().any(|(_, tile)| tile.is_passable()));
    for (coord, tile) in map.iter() {
        assert_eq!(map.tile_at(coord), tile);
    }
    let window = map.look_window(Coord::new(-1, map.height()), LOOK_RADIUS);
    assert_eq!(window.len(), 5);
});
