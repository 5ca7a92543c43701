use crate::abi::api::ApiTable;
use jni::sys;
use log::{LevelFilter, error};
use nix::libc::c_int;
use std::os::fd::{FromRawFd, OwnedFd};
use zyscope_common::ext::ResultExt;
use zyscope_common::ffi;

mod abi;
mod channel;
mod companion;
mod config;
mod framework;
mod module;

fn init_logger(tag: &'static str) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(if cfg!(debug_assertions) {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            })
            .with_tag(tag),
    );
}

#[unsafe(no_mangle)]
extern "C" fn zygisk_module_entry(table: *mut ApiTable, env: *mut sys::JNIEnv) {
    ffi::guard("zygisk_module_entry", || {
        init_logger("zyscope::loader");
        module::register(table, env).log_if_error();
    })
}

#[unsafe(no_mangle)]
extern "C" fn zygisk_companion_entry(fd: c_int) {
    ffi::guard("zygisk_companion_entry", || {
        init_logger("zyscope::companion");

        if fd < 0 {
            error!("invalid companion fd: {fd}");
            return;
        }

        companion::handle(unsafe { OwnedFd::from_raw_fd(fd) });
    })
}
