use crate::codec::{read_all, write_all};
use crate::{MAX_NAME_LEN, PER_USER_RANGE, TARGET_QUERY};
use std::io::{self, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),
    #[error("peer closed after {got} of {expected} bytes of {field}")]
    Truncated {
        field: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("protocol violation: {0}")]
    Protocol(#[from] Violation),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Violation {
    #[error("unsupported request type {0}")]
    UnknownRequest(u8),
    #[error("name length {0} exceeds {max}", max = MAX_NAME_LEN)]
    NameTooLong(u32),
    #[error("invalid verdict byte {0}")]
    InvalidVerdict(u8),
}

impl ExchangeError {
    pub fn is_protocol(&self) -> bool {
        matches!(self, ExchangeError::Protocol(_))
    }
}

fn recv<R: Read + ?Sized, const N: usize>(
    channel: &mut R,
    field: &'static str,
) -> Result<[u8; N], ExchangeError> {
    let mut buffer = [0u8; N];
    recv_into(channel, &mut buffer, field)?;
    Ok(buffer)
}

fn recv_into<R: Read + ?Sized>(
    channel: &mut R,
    buffer: &mut [u8],
    field: &'static str,
) -> Result<(), ExchangeError> {
    let got = read_all(channel, buffer)?;

    if got != buffer.len() {
        return Err(ExchangeError::Truncated {
            field,
            expected: buffer.len(),
            got,
        });
    }

    Ok(())
}

/// "Is any enabled module scoped to this process?"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRequest {
    pub name: String,
    pub scope_user_id: i32,
}

impl HookRequest {
    pub fn new(name: impl Into<String>, uid: i32) -> Self {
        Self {
            name: name.into(),
            scope_user_id: uid / PER_USER_RANGE,
        }
    }

    pub fn write_to<W: Write + ?Sized>(&self, channel: &mut W) -> Result<(), ExchangeError> {
        let name = self.name.as_bytes();
        let name_len = u32::try_from(name.len())
            .ok()
            .filter(|len| *len <= MAX_NAME_LEN)
            .ok_or(Violation::NameTooLong(name.len().min(u32::MAX as usize) as u32))?;

        write_all(channel, &[TARGET_QUERY])?;
        write_all(channel, &name_len.to_ne_bytes())?;
        write_all(channel, name)?;
        write_all(channel, &self.scope_user_id.to_ne_bytes())?;

        Ok(())
    }

    /// Decodes a request, stopping at the first field that is out of bounds.
    ///
    /// Name bytes that are not valid UTF-8 are decoded lossily; such a name
    /// never matches a scope entry.
    pub fn read_from<R: Read + ?Sized>(channel: &mut R) -> Result<Self, ExchangeError> {
        let [request_type] = recv::<_, 1>(channel, "request type")?;
        if request_type != TARGET_QUERY {
            return Err(Violation::UnknownRequest(request_type).into());
        }

        let name_len = u32::from_ne_bytes(recv(channel, "name length")?);
        if name_len > MAX_NAME_LEN {
            return Err(Violation::NameTooLong(name_len).into());
        }

        let mut name = vec![0u8; name_len as usize];
        recv_into(channel, &mut name, "name")?;

        let scope_user_id = i32::from_ne_bytes(recv(channel, "scope user id")?);

        Ok(Self {
            name: String::from_utf8_lossy(&name).into_owned(),
            scope_user_id,
        })
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    NotTargeted = 0,
    Targeted = 1,
}

impl From<bool> for Verdict {
    fn from(targeted: bool) -> Self {
        if targeted {
            Verdict::Targeted
        } else {
            Verdict::NotTargeted
        }
    }
}

impl Verdict {
    pub fn is_targeted(self) -> bool {
        self == Verdict::Targeted
    }

    pub fn write_to<W: Write + ?Sized>(self, channel: &mut W) -> Result<(), ExchangeError> {
        Ok(write_all(channel, &[self as u8])?)
    }

    pub fn read_from<R: Read + ?Sized>(channel: &mut R) -> Result<Self, ExchangeError> {
        match recv::<_, 1>(channel, "verdict")? {
            [0] => Ok(Verdict::NotTargeted),
            [1] => Ok(Verdict::Targeted),
            [other] => Err(Violation::InvalidVerdict(other).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn encode(request: &HookRequest) -> Vec<u8> {
        let mut buffer = Vec::new();
        request.write_to(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn scope_user_id_is_the_user_partition() {
        assert_eq!(HookRequest::new("a", 10123).scope_user_id, 0);
        assert_eq!(HookRequest::new("a", 1010123).scope_user_id, 10);
    }

    #[test]
    fn request_layout() {
        let bytes = encode(&HookRequest {
            name: "app".into(),
            scope_user_id: -2,
        });

        let mut expected = vec![1u8];
        expected.extend_from_slice(&3u32.to_ne_bytes());
        expected.extend_from_slice(b"app");
        expected.extend_from_slice(&(-2i32).to_ne_bytes());

        assert_eq!(bytes, expected);
    }

    #[test]
    fn rejects_unknown_request_type() {
        let mut bytes = encode(&HookRequest::new("app", 0));
        bytes[0] = 2;

        let err = HookRequest::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            ExchangeError::Protocol(Violation::UnknownRequest(2))
        ));
    }

    #[test]
    fn rejects_oversized_name_before_reading_it() {
        let mut bytes = vec![TARGET_QUERY];
        bytes.extend_from_slice(&(MAX_NAME_LEN + 1).to_ne_bytes());

        let err = HookRequest::read_from(&mut Cursor::new(bytes)).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn accepts_name_at_the_bound() {
        let name = "a".repeat(MAX_NAME_LEN as usize);
        let bytes = encode(&HookRequest::new(name.clone(), 0));

        let decoded = HookRequest::read_from(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(decoded.name, name);
    }

    #[test]
    fn refuses_to_encode_oversized_name() {
        let request = HookRequest::new("a".repeat(MAX_NAME_LEN as usize + 1), 0);
        let err = request.write_to(&mut Vec::new()).unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn truncated_request_names_the_missing_field() {
        let mut bytes = encode(&HookRequest::new("com.example.app", 0));
        bytes.truncate(bytes.len() - 2);

        match HookRequest::read_from(&mut Cursor::new(bytes)).unwrap_err() {
            ExchangeError::Truncated {
                field,
                expected,
                got,
            } => {
                assert_eq!(field, "scope user id");
                assert_eq!((expected, got), (4, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn verdict_byte_must_be_boolean() {
        assert_eq!(
            Verdict::read_from(&mut Cursor::new([1u8])).unwrap(),
            Verdict::Targeted
        );
        assert!(
            Verdict::read_from(&mut Cursor::new([7u8]))
                .unwrap_err()
                .is_protocol()
        );
        assert!(matches!(
            Verdict::read_from(&mut Cursor::new([0u8; 0])).unwrap_err(),
            ExchangeError::Truncated { .. }
        ));
    }
}
