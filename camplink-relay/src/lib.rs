//! CampLink realtime relay library.
//!
//! Exposes the relay server for use in tests and embedding. The relay
//! accepts WebSocket connections, tracks which camp, session and user rooms
//! each connection has joined, and fans events out to the other members of
//! a room.

pub mod config;
pub mod relay;
pub mod rooms;
