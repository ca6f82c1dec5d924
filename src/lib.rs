//! digdig: a terminal rock-and-gem digging game.
//!
//! `domain` holds the pure grid, rules and gravity; `sim` the game session
//! and level loading; `ui` the crossterm front end.

pub mod config;
pub mod domain;
pub mod sim;
pub mod ui;
