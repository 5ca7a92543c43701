pub mod props;

/// True when the `debug.zyscope.<key>` property is on; always false in release builds.
#[macro_export]
macro_rules! debug_on {
    ($key: literal) => {
        cfg!(debug_assertions) && $crate::props::prop_on(concat!("debug.zyscope.", $key))
    };
}
