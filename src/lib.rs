/// Robot Parkour: the simulation core of a 2D tile platformer.
///
/// ## Layers
///
///   - `domain`: pure data and algorithms: tiles, grid, collision, actor
///     physics, reachability. No I/O, no clocks.
///   - `sim`   : levels and runs: the builder, the labyrinth generator,
///     level files and the catalog, the game session and its real-time runner.
///   - `ui`    : crossterm keyboard input and an ASCII viewport
///     (`terminal` feature).

pub mod config;
pub mod domain;
pub mod error;
pub mod sim;
#[cfg(feature = "terminal")]
pub mod ui;
