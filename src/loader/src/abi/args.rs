use jni::sys::{jboolean, jint, jintArray, jlong, jobjectArray, jstring};

#[allow(dead_code)]
#[repr(C)]
pub struct AppSpecializeArgs {
    // required
    pub uid: *mut jint,
    pub gid: *mut jint,
    pub gids: *mut jintArray,
    pub runtime_flags: *mut jint,
    pub rlimits: *mut jobjectArray,
    pub mount_external: *mut jint,
    pub se_info: *mut jstring,
    pub nice_name: *mut jstring,
    pub instruction_set: *mut jstring,
    pub app_data_dir: *mut jstring,

    // optional
    pub fds_to_ignore: *mut jintArray,
    pub is_child_zygote: *mut jboolean,
    pub is_top_app: *mut jboolean,
    pub pkg_data_info_list: *mut jobjectArray,
    pub whitelisted_data_info_list: *mut jobjectArray,
    pub mount_data_dirs: *mut jboolean,
    pub mount_storage_dirs: *mut jboolean,
}

impl AppSpecializeArgs {
    pub fn uid(&self) -> jint {
        unsafe { *self.uid }
    }

    pub fn nice_name(&self) -> jstring {
        unsafe { *self.nice_name }
    }

    /// Null when the app has no data directory.
    pub fn app_data_dir(&self) -> jstring {
        unsafe { *self.app_data_dir }
    }

    pub fn is_child_zygote(&self) -> bool {
        unsafe { self.is_child_zygote.as_ref() }.is_some_and(|it| *it != 0)
    }
}

#[allow(dead_code)]
#[repr(C)]
pub struct ServerSpecializeArgs {
    pub uid: *mut jint,
    pub gid: *mut jint,
    pub gids: *mut jintArray,
    pub runtime_flags: *mut jint,
    pub permitted_capabilities: *mut jlong,
    pub effective_capabilities: *mut jlong,
}
