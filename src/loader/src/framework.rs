use anyhow::{Context, Result};
use jni::JNIEnv;
use jni::objects::{JClass, JObject, JValue};
use log::{info, warn};
use std::fs;
use std::os::fd::{AsRawFd, BorrowedFd};
use std::path::PathBuf;

/// Framework dex image, read while the module directory is still reachable.
pub struct Framework {
    dex: Vec<u8>,
    entry_class: &'static str,
}

impl Framework {
    pub fn read(module_dir: BorrowedFd, relative: &str, entry_class: &'static str) -> Result<Self> {
        let path = PathBuf::from(format!("/proc/self/fd/{}", module_dir.as_raw_fd())).join(relative);
        let dex = fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;

        info!("framework read: {relative}, {} bytes", dex.len());

        Ok(Self { dex, entry_class })
    }

    /// Loads the dex into an `InMemoryDexClassLoader` and runs the entry's
    /// static `forkCommon(boolean, String, String)`.
    ///
    /// A pending Java exception is described and cleared before returning.
    pub fn fork_common(
        mut self,
        env: &mut JNIEnv,
        is_system: bool,
        nice_name: &JObject,
        app_data_dir: &JObject,
    ) -> Result<()> {
        let result = self.invoke(env, is_system, nice_name, app_data_dir);

        if result.is_err() && env.exception_check().unwrap_or_default() {
            warn!("java exception during framework bootstrap");
            env.exception_describe().ok();
            env.exception_clear().ok();
        }

        result
    }

    fn invoke(
        &mut self,
        env: &mut JNIEnv,
        is_system: bool,
        nice_name: &JObject,
        app_data_dir: &JObject,
    ) -> Result<()> {
        let class_loader_class = env.find_class("java/lang/ClassLoader")?;
        let system_class_loader = env
            .call_static_method(
                &class_loader_class,
                "getSystemClassLoader",
                "()Ljava/lang/ClassLoader;",
                &[],
            )?
            .l()?;

        let dex_loader_class = env.find_class("dalvik/system/InMemoryDexClassLoader")?;
        let buffer = unsafe { env.new_direct_byte_buffer(self.dex.as_mut_ptr(), self.dex.len())? };

        let class_loader = env.new_object(
            &dex_loader_class,
            "(Ljava/nio/ByteBuffer;Ljava/lang/ClassLoader;)V",
            &[JValue::Object(&buffer), JValue::Object(&system_class_loader)],
        )?;

        env.delete_local_ref(buffer)?;

        let class_name = env.new_string(self.entry_class)?;
        let entry_class: JClass = env
            .call_method(
                &class_loader,
                "loadClass",
                "(Ljava/lang/String;)Ljava/lang/Class;",
                &[JValue::Object(&class_name)],
            )?
            .l()?
            .into();

        env.call_static_method(
            &entry_class,
            "forkCommon",
            "(ZLjava/lang/String;Ljava/lang/String;)V",
            &[
                JValue::Bool(u8::from(is_system)),
                JValue::Object(nice_name),
                JValue::Object(app_data_dir),
            ],
        )?;

        info!("framework started, system = {is_system}");

        Ok(())
    }
}
