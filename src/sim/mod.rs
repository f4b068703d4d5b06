pub mod builder;
pub mod event;
pub mod labyrinth;
pub mod level;
pub mod runner;
pub mod step;
pub mod world;
