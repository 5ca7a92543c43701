use crate::config::OatHookConfigs;
use anyhow::{Context, Result, bail};
use log::{LevelFilter, info};
use std::ffi::c_void;
use zyscope_common::ext::ResultExt;
use zyscope_common::ffi;
use zyscope_plthook::{HookRegistry, ProcessMaps};

mod config;
pub mod patcher;

fn init_logger() {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(if cfg!(debug_assertions) {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            })
            .with_tag("zyscope::oat"),
    );
}

/// Redirects the compiler's call to the `CompilerOptions` constructor.
///
/// One shot per process: nothing is retried when the compiler is not mapped
/// or the slot cannot be rewritten.
pub fn install() -> Result<()> {
    let configs = OatHookConfigs::instance();
    let maps = ProcessMaps::scan().context("failed to read memory maps")?;

    let Some(compiler) = maps.find_first(configs.compiler_fragment) else {
        bail!("no mapping matches {}", configs.compiler_fragment);
    };

    info!("compiler found: {compiler:?}");

    let mut registry = HookRegistry::new();
    registry.register(
        compiler.library_id(),
        configs.symbol,
        patcher::compiler_options_ctor as *const c_void,
        &patcher::ORIGINAL_CTOR,
    );

    if !registry.commit() {
        bail!("failed to hook {}", configs.symbol);
    }

    Ok(())
}

#[cfg_attr(test, allow(dead_code))]
extern "C" fn on_load() {
    ffi::guard("on_load", || {
        init_logger();
        install().log_if_error();
    })
}

#[cfg(not(test))]
#[used]
#[unsafe(link_section = ".init_array")]
static INIT_CTOR: extern "C" fn() = on_load;
