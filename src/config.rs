//! Server configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use crate::error::MapFormatError;
use crate::game::{GameEngine, TileMap};

/// Port clients connect to unless told otherwise.
pub const DEFAULT_PORT: u16 = 4444;

/// Map loaded unless told otherwise.
pub const DEFAULT_MAP_PATH: &str = "maps/example_map.txt";

/// Everything needed to boot a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to listen on.
    pub bind: IpAddr,
    /// TCP port.
    pub port: u16,
    /// Map description file.
    pub map_path: PathBuf,
    /// Spawn RNG seed. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            map_path: PathBuf::from(DEFAULT_MAP_PATH),
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind, self.port)
    }

    /// Load the configured map from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or malformed.
    pub fn load_map(&self) -> Result<TileMap, MapFormatError> {
        TileMap::load_file(&self.map_path)
    }

    /// Load the map and build a fresh engine over it.
    ///
    /// # Errors
    ///
    /// Returns an error if the map cannot be loaded.
    pub fn build_engine(&self) -> Result<GameEngine, MapFormatError> {
        let map = self.load_map()?;
        Ok(match self.seed {
            Some(seed) => GameEngine::with_seed(map, seed),
            None => GameEngine::new(map),
        })
    }
}
