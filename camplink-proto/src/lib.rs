//! Shared protocol definitions for the CampLink relay wire format.

pub mod codec;
pub mod event;
pub mod room;
