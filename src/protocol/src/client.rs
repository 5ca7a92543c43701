use crate::message::{ExchangeError, HookRequest, Verdict};
use anyhow::Result;
use log::debug;
use std::io::{Read, Write};
use zyscope_common::ext::ResultExt;

/// Processes that are instrumented whatever the companion says, so the
/// manager stays reachable with an empty configuration.
pub const ALWAYS_TARGETED: [&str; 2] = ["com.android.shell", "org.lsposed.manager"];

/// Sends one request and reads the verdict.
pub fn query<C: Read + Write + ?Sized>(
    channel: &mut C,
    request: &HookRequest,
) -> Result<Verdict, ExchangeError> {
    request.write_to(channel)?;
    Verdict::read_from(channel)
}

/// Decides whether the forking process `name` (running as `uid`) is instrumented.
///
/// Any failure to reach or talk to the companion counts as "not targeted".
pub fn resolve<C: Read + Write>(channel: Result<C>, name: &str, uid: i32) -> bool {
    let verdict = channel
        .and_then(|mut channel| Ok(query(&mut channel, &HookRequest::new(name, uid))?))
        .or_log("target query failed", Verdict::NotTargeted);

    if verdict.is_targeted() {
        return true;
    }

    if ALWAYS_TARGETED.contains(&name) {
        debug!("{name} is always targeted");
        return true;
    }

    debug!("process {name} is not targeted by any module");
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::io::Cursor;
    use std::os::unix::net::UnixStream;

    /// Replays a canned response and records what was written.
    struct Scripted {
        response: Cursor<Vec<u8>>,
        written: Vec<u8>,
    }

    impl Scripted {
        fn new(response: &[u8]) -> Self {
            Self {
                response: Cursor::new(response.to_vec()),
                written: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.response.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn follows_companion_verdict() {
        assert!(resolve(Ok(Scripted::new(&[1])), "com.example.app", 10123));
        assert!(!resolve(Ok(Scripted::new(&[0])), "com.example.app", 10123));
    }

    #[test]
    fn sends_user_partition_not_raw_uid() {
        let mut channel = Scripted::new(&[0]);
        query(&mut channel, &HookRequest::new("app", 1010123)).unwrap();

        let tail = &channel.written[channel.written.len() - 4..];
        assert_eq!(i32::from_ne_bytes(tail.try_into().unwrap()), 10);
    }

    #[test]
    fn reserved_names_survive_negative_verdict_and_outage() {
        for name in ALWAYS_TARGETED {
            assert!(resolve(Ok(Scripted::new(&[0])), name, 2000));
            assert!(resolve(Err::<Scripted, _>(anyhow!("refused")), name, 2000));
        }
    }

    #[test]
    fn fails_closed_on_transport_errors() {
        // connection refused
        assert!(!resolve(
            Err::<Scripted, _>(anyhow!("connection refused")),
            "com.example.app",
            10123
        ));

        // truncated read
        assert!(!resolve(Ok(Scripted::new(&[])), "com.example.app", 10123));

        // garbage verdict
        assert!(!resolve(Ok(Scripted::new(&[2])), "com.example.app", 10123));
    }

    #[test]
    fn fails_closed_when_peer_is_gone() {
        let (ours, theirs) = UnixStream::pair().unwrap();
        drop(theirs);

        assert!(!resolve(Ok(ours), "com.example.app", 10123));
    }
}
