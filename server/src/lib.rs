//! # House of Last Light match server
//!
//! Authoritative server for an asymmetric horror match: a handful of
//! survivors repair fuse boxes inside a procedurally generated house while a
//! server-controlled killer hunts them. Clients send intents; the server owns
//! every outcome and broadcasts the full match state each tick.
//!
//! ## Architecture
//!
//! ### Single-threaded event loop
//! One `tokio::select!` loop in [`network::Server::run`] owns every room.
//! Datagrams, client timeouts and the tick interval are processed
//! sequentially, so match state never needs a lock.
//!
//! ### UDP with JSON envelopes
//! Each datagram carries one `{type, seq?, replyTo?, payload}` envelope
//! (see [`shared::protocol`]). A client is identified by its socket address
//! and is welcomed on first contact. Silence for five seconds counts as
//! leaving.
//!
//! ### Rooms
//! [`rooms::RoomRegistry`] maps room names to [`game::Room`]s. A room is
//! created by the first `joinRoom` naming it and dropped when its last
//! survivor leaves. Each room owns its house, physics world, killer AI,
//! disaster schedule and deferred effects, and advances them in a fixed
//! order every tick.
//!
//! ## Module Organization
//!
//! - `world`: seeded house generation (rooms, doors, stairs, fuse boxes)
//! - `physics`: box bodies, gravity, wall collisions, impact contacts
//! - `ai`: killer state machine and the phantom's invisibility ability
//! - `disasters`: weighted random earthquakes, lightning and floods
//! - `timers`: one-shot effects counted down in simulation time
//! - `game`: the per-room match orchestrator
//! - `rooms`: room lifecycle
//! - `client_manager`: connected clients and timeouts
//! - `network`: UDP tasks and the tick loop
//! - `config`: JSON tuning file
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//! use server::rooms::{RoomDefaults, RoomRegistry};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rooms = RoomRegistry::new(GameConfig::default(), RoomDefaults::default());
//!
//!     // 20 Hz tick, at most 32 clients
//!     let server = Server::new("127.0.0.1:8080", Duration::from_millis(50), 32, rooms).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod ai;
pub mod client_manager;
pub mod config;
pub mod disasters;
pub mod error;
pub mod game;
pub mod network;
pub mod physics;
pub mod rooms;
pub mod timers;
pub mod world;
