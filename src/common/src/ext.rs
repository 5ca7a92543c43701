use log::error;
use std::fmt::Debug;

pub trait ResultExt<T> {
    fn log_if_error(self);

    /// Absorbs the error into `fallback`, logging it under `what`.
    fn or_log(self, what: &str, fallback: T) -> T;
}

impl<T, E: Debug> ResultExt<T> for Result<T, E> {
    fn log_if_error(self) {
        if let Err(err) = self {
            error!("error: {err:?}")
        }
    }

    fn or_log(self, what: &str, fallback: T) -> T {
        match self {
            Ok(value) => value,
            Err(err) => {
                error!("{what}: {err:?}");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ResultExt;

    #[test]
    fn or_log_returns_fallback_on_error() {
        let failed: Result<bool, &str> = Err("broken pipe");
        assert!(!failed.or_log("exchange", false));

        let ok: Result<bool, &str> = Ok(true);
        assert!(ok.or_log("exchange", false));
    }
}
