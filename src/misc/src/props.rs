use log::warn;
use std::ops::Deref;
use std::str::FromStr;

#[cfg(target_os = "android")]
mod system {
    use std::ffi::{CStr, CString, c_char};

    const PROP_VALUE_MAX: usize = 92;

    unsafe extern "C" {
        fn __system_property_get(name: *const c_char, value: *mut c_char) -> u32;
    }

    pub fn read(name: &str) -> Option<String> {
        let name = CString::new(name).ok()?;
        let mut buffer = [0u8; PROP_VALUE_MAX + 1];

        let len = unsafe { __system_property_get(name.as_ptr(), buffer.as_mut_ptr() as _) };

        if len == 0 {
            return None;
        }

        let value = CStr::from_bytes_until_nul(&buffer).ok()?;
        Some(value.to_string_lossy().into_owned())
    }
}

// host builds have no property area
#[cfg(not(target_os = "android"))]
mod system {
    pub fn read(_name: &str) -> Option<String> {
        None
    }
}

// https://cs.android.com/android/platform/superproject/main/+/main:system/libbase/parsebool.cpp;l=23-31;drc=61197364367c9e404c7da6900658f1b16c42d0da
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "y" | "yes" | "on" | "true" => Some(true),
        "0" | "n" | "no" | "off" | "false" => Some(false),
        _ => None,
    }
}

pub struct Property(String);

impl From<Property> for bool {
    fn from(value: Property) -> Self {
        parse_bool(&value).unwrap_or_default()
    }
}

impl Deref for Property {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

pub fn get(name: &str) -> Option<Property> {
    system::read(name).map(Property)
}

pub fn exists(name: &str) -> bool {
    get(name).is_some()
}

pub fn prop_on(name: &str) -> bool {
    get(name).map(|it| it.into()).unwrap_or_default()
}

/// Parses a property, falling back to `default` when it is unset or malformed.
pub fn get_parsed<T: FromStr>(name: &str, default: T) -> T {
    let Some(value) = get(name) else {
        return default;
    };

    match value.parse() {
        Ok(parsed) => parsed,
        Err(_) => {
            warn!("ignoring malformed property {name}={:?}", &*value);
            default
        }
    }
}
