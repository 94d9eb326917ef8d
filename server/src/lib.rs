//! # Effect Roulette Server Library
//!
//! This library provides the timed-effect roulette engine for a live
//! multiplayer session, together with a small UDP host that drives it. Every
//! so often the engine picks a participant (or everyone), an effect and a
//! power level, reveals the pick over a short animated timeline and then
//! applies the effect for a limited time.
//!
//! ## Core Responsibilities
//!
//! ### Deterministic Selection
//! A roll is a pure function of its seed and the roster. The session seed
//! feeds a single random stream, so a whole session can be replayed from
//! one number.
//!
//! ### Effect Lifecycle
//! Effects are applied through handlers that snapshot what they change,
//! update on a fixed interval where needed and restore the snapshot when
//! they end. Every active effect is removed through its handler exactly
//! once: on expiry, supersession, a forced clear or the participant leaving.
//!
//! ### Session Safety
//! The first roll of a session freezes everyone while it is revealed. The
//! freeze is re-asserted every tick and always released, including when a
//! roll is cancelled.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Tick
//! The engine never runs concurrently with itself. Commands received from
//! the network are parsed at the boundary and queued; the next tick drains
//! the queue before anything else happens.
//!
//! ### Host Abstraction
//! The engine talks to the session through the traits in [`host`]: roster
//! queries, an attribute getter/setter, session globals and a one-way
//! presentation channel. [`game::GameState`] implements all of them for the
//! bundled server, and tests use it as an in-memory session.
//!
//! ## Module Organization
//!
//! - `effects`: effect catalog, power levels and handlers
//! - `state_store`: active per-participant and global effects
//! - `selector`: seeded target/effect/power selection
//! - `scheduler`: when the next automatic roll fires
//! - `animation`: reveal timeline and final application
//! - `safety`: freeze enforcement around rolls
//! - `commands`: operator command grammar and queue
//! - `engine`: the per-tick pipeline tying it all together
//! - `game`, `client_manager`, `network`: the UDP host
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::EngineConfig;
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig {
//!         seed: Some(42),
//!         ..EngineConfig::default()
//!     };
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(50), // 20Hz
//!         32,
//!         config,
//!     ).await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod animation;
pub mod client_manager;
pub mod commands;
pub mod config;
pub mod effects;
pub mod engine;
pub mod error;
pub mod game;
pub mod host;
pub mod network;
pub mod safety;
pub mod scheduler;
pub mod selector;
pub mod state_store;
