//! Boot the server: load the map, start accepting, run the console.

use std::io;
use std::thread;
use std::time::Duration;

use dod::game::SharedEngine;
use dod::server::Server;
use dod::{ServerConfig, ServerError};
use tracing::{error, info, warn};

use super::CliError;
use super::console::{self, ConsoleExit};

/// How long a console quit waits for farewells to reach clients.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Execute the server.
///
/// # Errors
///
/// Returns an error if the map cannot be loaded, the port cannot be bound,
/// or the console fails.
pub(crate) fn execute(config: &ServerConfig) -> Result<(), CliError> {
    let engine = SharedEngine::new(config.build_engine().map_err(ServerError::from)?);
    engine.with_engine(|e| {
        let map = e.map();
        info!(
            map = map.name(),
            width = map.width(),
            height = map.height(),
            gold_to_win = map.gold_to_win(),
            "map loaded"
        );
    });

    let server = Server::bind(config.socket_addr(), engine.clone())?;
    let connections = server.connections();
    let accept = thread::Builder::new()
        .name("dod-accept".to_owned())
        .spawn(move || {
            if let Err(e) = server.serve() {
                error!(error = %e, "server stopped");
            }
        })?;

    let exit = console::run(io::stdin().lock(), &mut io::stdout().lock(), &engine, config)?;
    match exit {
        ConsoleExit::Quit => {
            info!(open = connections.count(), "shutting down");
            if !connections.wait_idle(DRAIN_TIMEOUT) {
                warn!(open = connections.count(), "exiting with connections still writing");
            }
        }
        ConsoleExit::InputClosed => {
            info!("console input closed; serving until killed");
            accept
                .join()
                .map_err(|_| ServerError::WorkerPanicked("accept"))?;
        }
    }
    Ok(())
}
