use crate::abi::args::{AppSpecializeArgs, ServerSpecializeArgs};
use nix::libc::c_long;
use std::ffi::c_void;

pub type ModuleImpl = c_void;

#[repr(C)]
pub struct ModuleAbi {
    pub version: c_long,
    pub module_impl: *mut ModuleImpl,
    pub app_pre: extern "C" fn(*mut ModuleImpl, *mut AppSpecializeArgs),
    pub app_post: extern "C" fn(*mut ModuleImpl, *const AppSpecializeArgs),
    pub server_pre: extern "C" fn(*mut ModuleImpl, *mut ServerSpecializeArgs),
    pub server_post: extern "C" fn(*mut ModuleImpl, *const ServerSpecializeArgs),
}
