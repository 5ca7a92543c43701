use crate::abi::flags::ZygiskOption;
use crate::abi::module::ModuleAbi;
use anyhow::{Context, Result, bail};
use jni::sys::{JNIEnv, JNINativeMethod};
use nix::errno::Errno;
use nix::libc::{c_char, c_int, dev_t, ino_t};
use std::ffi::c_void;
use std::os::fd::{FromRawFd, OwnedFd};

/// Function table handed to `zygisk_module_entry`, owned by the host.
#[allow(dead_code)]
#[repr(C)]
pub struct ApiTable {
    pub host_impl: *mut c_void,
    pub register_module: Option<extern "C" fn(*mut ApiTable, *mut ModuleAbi) -> bool>,

    pub hook_jni_native_methods:
        Option<extern "C" fn(*mut JNIEnv, *const c_char, *mut JNINativeMethod, c_int)>,
    pub plt_hook_register:
        Option<extern "C" fn(dev_t, ino_t, *const c_char, *mut c_void, *mut *mut c_void)>,
    pub exempt_fd: Option<extern "C" fn(c_int) -> bool>,
    pub plt_hook_commit: Option<extern "C" fn() -> bool>,
    pub connect_companion: Option<extern "C" fn(*mut c_void) -> c_int>,
    pub set_option: Option<extern "C" fn(*mut c_void, ZygiskOption)>,
    pub get_module_dir: Option<extern "C" fn(*mut c_void) -> c_int>,
    pub get_flags: Option<extern "C" fn(*mut c_void) -> u32>,
}

/// Safe view over a registered [`ApiTable`].
pub struct Api {
    table: *mut ApiTable,
}

impl Api {
    /// # Safety
    ///
    /// `table` must stay valid for as long as the module is loaded.
    pub unsafe fn new(table: *mut ApiTable) -> Result<Self> {
        if table.is_null() {
            bail!("null api table");
        }

        Ok(Self { table })
    }

    fn table(&self) -> &ApiTable {
        unsafe { &*self.table }
    }

    pub fn register(&self, module: &'static mut ModuleAbi) -> bool {
        match self.table().register_module {
            Some(register) => register(self.table, module as *mut ModuleAbi),
            None => false,
        }
    }

    pub fn connect_companion(&self) -> Result<OwnedFd> {
        let connect = self.table().connect_companion.context("connectCompanion unavailable")?;
        let fd = connect(self.table().host_impl);

        if fd < 0 {
            bail!("failed to connect to companion: {}", Errno::last());
        }

        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn set_option(&self, option: ZygiskOption) {
        if let Some(set_option) = self.table().set_option {
            set_option(self.table().host_impl, option);
        }
    }

    /// Directory fd of this module's installation, only usable before specialization.
    pub fn module_dir(&self) -> Result<OwnedFd> {
        let get_module_dir = self.table().get_module_dir.context("getModuleDir unavailable")?;
        let fd = get_module_dir(self.table().host_impl);

        if fd < 0 {
            bail!("failed to open module dir: {}", Errno::last());
        }

        Ok(unsafe { OwnedFd::from_raw_fd(fd) })
    }

    pub fn flags(&self) -> u32 {
        self.table()
            .get_flags
            .map(|get_flags| get_flags(self.table().host_impl))
            .unwrap_or_default()
    }
}
