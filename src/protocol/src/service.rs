use crate::message::{HookRequest, Verdict};
use crate::store::ScopeStore;
use log::{debug, error};
use std::io::{Read, Write};
use zyscope_common::ext::ResultExt;

/// Answers one target query on `channel`, then drops it.
///
/// Malformed requests are answered by closing the channel without a reply.
/// Store failures answer [`Verdict::NotTargeted`]. Returns the verdict that
/// was written, if any.
pub fn serve<C: Read + Write, S: ScopeStore + ?Sized>(mut channel: C, store: &S) -> Option<Verdict> {
    let request = match HookRequest::read_from(&mut channel) {
        Ok(request) => request,
        Err(err) if err.is_protocol() => {
            error!("rejecting request: {err}");
            return None;
        }
        Err(err) => {
            error!("failed to read request: {err}");
            return None;
        }
    };

    let HookRequest {
        name,
        scope_user_id,
    } = &request;

    debug!("checking whether {name} (user {scope_user_id}) is targeted by any module");

    let verdict = Verdict::from(
        store
            .is_targeted(name, *scope_user_id)
            .or_log("scope lookup failed", false),
    );

    debug!("{name} (user {scope_user_id}) -> {verdict:?}");

    if let Err(err) = verdict.write_to(&mut channel) {
        error!("failed to write verdict: {err}");
        return None;
    }

    Some(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::seeded;
    use crate::{MAX_NAME_LEN, TARGET_QUERY};
    use anyhow::{Result, bail};
    use std::io::{ErrorKind, Read};
    use std::os::unix::net::UnixStream;

    struct BrokenStore;

    impl ScopeStore for BrokenStore {
        fn is_targeted(&self, _app_name: &str, _user_id: i32) -> Result<bool> {
            bail!("database is locked")
        }
    }

    /// Everything the service sent before closing; unread request bytes make
    /// the close surface as a reset, which still means "no more data".
    fn reply_of(mut client: UnixStream) -> Vec<u8> {
        let mut reply = Vec::new();

        match client.read_to_end(&mut reply) {
            Ok(_) => {}
            Err(err) if err.kind() == ErrorKind::ConnectionReset => {}
            Err(err) => panic!("unexpected read error: {err}"),
        }

        reply
    }

    #[test]
    fn replies_exactly_one_byte() {
        let store = seeded(&[("io.github.module", true, "com.example.app", 0)]);
        let (mut client, server) = UnixStream::pair().unwrap();

        HookRequest::new("com.example.app", 10123)
            .write_to(&mut client)
            .unwrap();

        assert_eq!(serve(server, &store), Some(Verdict::Targeted));
        assert_eq!(reply_of(client), [1]);
    }

    #[test]
    fn oversized_name_closes_without_reply() {
        let store = seeded(&[]);
        let (mut client, server) = UnixStream::pair().unwrap();

        client.write_all(&[TARGET_QUERY]).unwrap();
        client.write_all(&(MAX_NAME_LEN + 1).to_ne_bytes()).unwrap();

        assert_eq!(serve(server, &store), None);
        assert!(reply_of(client).is_empty());
    }

    #[test]
    fn unknown_request_type_closes_without_reply() {
        let store = seeded(&[]);
        let (mut client, server) = UnixStream::pair().unwrap();

        client.write_all(&[2, 0, 0, 0, 0]).unwrap();

        assert_eq!(serve(server, &store), None);
        assert!(reply_of(client).is_empty());
    }

    #[test]
    fn store_failure_is_not_targeted() {
        let (mut client, server) = UnixStream::pair().unwrap();

        HookRequest::new("com.example.app", 0)
            .write_to(&mut client)
            .unwrap();

        assert_eq!(serve(server, &BrokenStore), Some(Verdict::NotTargeted));
        assert_eq!(reply_of(client), [0]);
    }

    #[test]
    fn truncated_request_gets_no_reply() {
        let store = seeded(&[]);
        let (mut client, server) = UnixStream::pair().unwrap();

        client.write_all(&[TARGET_QUERY, 3, 0]).unwrap();
        client.shutdown(std::net::Shutdown::Write).unwrap();

        assert_eq!(serve(server, &store), None);
        assert!(reply_of(client).is_empty());
    }
}
