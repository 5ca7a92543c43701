use nix::libc::c_long;

pub mod api;
pub mod args;
pub mod flags;
pub mod module;

pub const ZYGISK_API_VERSION: c_long = 4;
