use crate::abi::ZYGISK_API_VERSION;
use crate::abi::api::{Api, ApiTable};
use crate::abi::args::{AppSpecializeArgs, ServerSpecializeArgs};
use crate::abi::flags::{ZygiskOption, ZygiskStateFlag};
use crate::abi::module::{ModuleAbi, ModuleImpl};
use crate::channel::CompanionChannel;
use crate::config::LoaderConfigs;
use crate::framework::Framework;
use anyhow::{Result, bail};
use jni::JNIEnv;
use jni::objects::{JObject, JString, JValue};
use jni::sys::{self, jint, jstring};
use log::{debug, error, info};
use std::cell::RefCell;
use std::os::fd::AsFd;
use zyscope_common::ext::ResultExt;
use zyscope_common::ffi;
use zyscope_misc::props;
use zyscope_protocol::{PER_USER_RANGE, client};

const SHARED_RELRO_UID: jint = 1037;
const FIRST_APP_ZYGOTE_ISOLATED_UID: jint = 90000;
const LAST_ISOLATED_UID: jint = 99999;

/// Decisions carried from pre- to post-specialization of one process.
#[derive(Default)]
pub struct ProcessContext {
    /// Not targeted, or target determination failed.
    pub ignore: bool,
    pub allow_unload: bool,
    framework: Option<Framework>,
}

impl ProcessContext {
    fn wants_unload(&self) -> bool {
        self.ignore || self.allow_unload
    }

    fn record_bootstrap(&mut self, result: Result<()>) {
        if let Err(err) = result {
            error!("framework bootstrap failed: {err:?}");
            self.allow_unload = true;
        }
    }
}

/// Why a targeted app process still gets no framework.
fn skip_reason(uid: jint, is_child_zygote: bool, has_data_dir: bool) -> Option<&'static str> {
    let app_id = uid % PER_USER_RANGE;

    if !has_data_dir {
        return Some("no app data dir");
    }

    if is_child_zygote {
        return Some("child zygote");
    }

    if (FIRST_APP_ZYGOTE_ISOLATED_UID..=LAST_ISOLATED_UID).contains(&app_id)
        || app_id == SHARED_RELRO_UID
    {
        return Some("isolated process");
    }

    None
}

fn process_name(env: &mut JNIEnv, name: jstring) -> Result<String> {
    if name.is_null() {
        bail!("nice name is null");
    }

    let name = unsafe { JString::from_raw(name) };
    Ok(env.get_string(&name)?.into())
}

fn reset_argv0(env: &mut JNIEnv) -> Result<()> {
    let process = env.find_class("android/os/Process")?;
    let name = env.new_string("system_server")?;

    env.call_static_method(
        &process,
        "setArgV0",
        "(Ljava/lang/String;)V",
        &[JValue::Object(&name)],
    )?;

    env.delete_local_ref(name)?;
    env.delete_local_ref(process)?;

    Ok(())
}

pub struct LoaderModule {
    api: Api,
    env: *mut sys::JNIEnv,
    context: RefCell<ProcessContext>,
}

impl LoaderModule {
    fn env(&self) -> Result<JNIEnv<'static>> {
        Ok(unsafe { JNIEnv::from_raw(self.env) }?)
    }

    fn read_framework(&self) -> Result<Framework> {
        let configs = LoaderConfigs::instance();
        let module_dir = self.api.module_dir()?;

        Framework::read(module_dir.as_fd(), configs.framework_dex, configs.entry_class)
    }

    fn unload_if_allowed(&self, context: &ProcessContext) {
        if context.wants_unload() {
            self.api.set_option(ZygiskOption::DlcloseModuleLibrary);
        }
    }

    fn on_app_pre(&self, args: &mut AppSpecializeArgs) -> Result<()> {
        let mut context = self.context.borrow_mut();

        let mut env = match self.env() {
            Ok(env) => env,
            Err(err) => {
                error!("failed to wrap jni env: {err:?}");
                context.ignore = true;
                return Ok(());
            }
        };

        let uid = args.uid();

        let name = match process_name(&mut env, args.nice_name()) {
            Ok(name) => name,
            Err(err) => {
                error!("failed to get process name: {err:?}");
                context.ignore = true;
                return Ok(());
            }
        };

        let channel = self.api.connect_companion().map(CompanionChannel::from);
        if !client::resolve(channel, &name, uid) {
            context.ignore = true;
            return Ok(());
        }

        if let Some(reason) = skip_reason(uid, args.is_child_zygote(), !args.app_data_dir().is_null()) {
            debug!("skip injecting into {name}: {reason}");
            context.allow_unload = true;
            return Ok(());
        }

        match self.read_framework() {
            Ok(framework) => context.framework = Some(framework),
            Err(err) => context.record_bootstrap(Err(err)),
        }

        Ok(())
    }

    fn on_app_post(&self, args: &AppSpecializeArgs) -> Result<()> {
        let mut context = self.context.borrow_mut();

        if context.ignore {
            debug!("process not targeted, unloading");
            self.api.set_option(ZygiskOption::DlcloseModuleLibrary);
            return Ok(());
        }

        if let Some(framework) = context.framework.take() {
            let result = self.env().and_then(|mut env| {
                let nice_name = unsafe { JObject::from_raw(args.nice_name()) };
                let app_data_dir = unsafe { JObject::from_raw(args.app_data_dir()) };

                framework.fork_common(&mut env, false, &nice_name, &app_data_dir)
            });

            context.record_bootstrap(result);
        }

        self.unload_if_allowed(&context);

        Ok(())
    }

    fn on_server_pre(&self) -> Result<()> {
        let mut context = self.context.borrow_mut();

        match self.read_framework() {
            Ok(framework) => context.framework = Some(framework),
            Err(err) => context.record_bootstrap(Err(err)),
        }

        Ok(())
    }

    fn on_server_post(&self) -> Result<()> {
        let mut context = self.context.borrow_mut();
        let mut env = self.env()?;

        if props::exists("ro.vendor.product.ztename")
            && let Err(err) = reset_argv0(&mut env)
        {
            error!("failed to reset argv0: {err:?}");
            env.exception_clear().ok();
        }

        if let Some(framework) = context.framework.take() {
            let result = framework.fork_common(&mut env, true, &JObject::null(), &JObject::null());
            context.record_bootstrap(result);
        }

        self.unload_if_allowed(&context);

        Ok(())
    }
}

extern "C" fn app_pre(module: *mut ModuleImpl, args: *mut AppSpecializeArgs) {
    ffi::guard("preAppSpecialize", || {
        let module = unsafe { &*(module as *const LoaderModule) };

        match unsafe { args.as_mut() } {
            Some(args) => module.on_app_pre(args).log_if_error(),
            None => error!("null app specialize args"),
        }
    })
}

extern "C" fn app_post(module: *mut ModuleImpl, args: *const AppSpecializeArgs) {
    ffi::guard("postAppSpecialize", || {
        let module = unsafe { &*(module as *const LoaderModule) };

        match unsafe { args.as_ref() } {
            Some(args) => module.on_app_post(args).log_if_error(),
            None => error!("null app specialize args"),
        }
    })
}

extern "C" fn server_pre(module: *mut ModuleImpl, _args: *mut ServerSpecializeArgs) {
    ffi::guard("preServerSpecialize", || {
        let module = unsafe { &*(module as *const LoaderModule) };
        module.on_server_pre().log_if_error()
    })
}

extern "C" fn server_post(module: *mut ModuleImpl, _args: *const ServerSpecializeArgs) {
    ffi::guard("postServerSpecialize", || {
        let module = unsafe { &*(module as *const LoaderModule) };
        module.on_server_post().log_if_error()
    })
}

/// Registers the module with the host. Both tables live until the library
/// is unloaded.
pub fn register(table: *mut ApiTable, env: *mut sys::JNIEnv) -> Result<()> {
    let api = unsafe { Api::new(table)? };

    let module: &'static LoaderModule = Box::leak(Box::new(LoaderModule {
        api,
        env,
        context: RefCell::default(),
    }));

    let abi = Box::leak(Box::new(ModuleAbi {
        version: ZYGISK_API_VERSION,
        module_impl: module as *const LoaderModule as *mut ModuleImpl,
        app_pre,
        app_post,
        server_pre,
        server_post,
    }));

    if !module.api.register(abi) {
        bail!("host refused module registration");
    }

    let flags = module.api.flags();
    info!(
        "module registered, api v{ZYGISK_API_VERSION}, root granted = {}",
        ZygiskStateFlag::ProcessGrantedRoot.is_set(flags)
    );

    Ok(())
}
