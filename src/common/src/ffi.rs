use log::error;
use std::panic::{self, UnwindSafe};
use std::process;

/// Runs an `extern "C"` entry body, aborting instead of unwinding into the caller.
pub fn guard<R>(entry: &str, body: impl FnOnce() -> R + UnwindSafe) -> R {
    match panic::catch_unwind(body) {
        Ok(value) => value,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|it| it.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "(non-string payload)".into());

            error!("panic in {entry}: {message}");
            process::abort()
        }
    }
}
