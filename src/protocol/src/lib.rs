//! Target determination between a forking app process and the privileged
//! companion.
//!
//! The exchange is a single request/response over a connected byte stream:
//!
//! | field | size |
//! |---|---|
//! | request type | 1 byte, always [`TARGET_QUERY`] |
//! | name length | 4 bytes, native endian, at most [`MAX_NAME_LEN`] |
//! | name | `name length` bytes, not nul-terminated |
//! | scope user id | 4 bytes, native endian, signed |
//!
//! The companion answers with one [`Verdict`] byte or closes the stream.

pub mod client;
pub mod codec;
pub mod message;
pub mod service;
pub mod store;

pub use message::{ExchangeError, HookRequest, Verdict, Violation};

pub const TARGET_QUERY: u8 = 1;
pub const MAX_NAME_LEN: u32 = 4096;

/// Width of one user's uid range; `uid / PER_USER_RANGE` is the user id.
pub const PER_USER_RANGE: i32 = 100000;
