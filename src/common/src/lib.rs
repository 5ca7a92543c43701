pub mod ext;
pub mod ffi;
