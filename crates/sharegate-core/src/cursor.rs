//! Opaque pagination cursors.
//!
//! A cursor names the last row of a page by its sort key. It is encoded as a
//! small CBOR map with integer keys and handed to clients as hex; clients must
//! treat it as opaque.

use ciborium::value::Value;

use crate::error::{CoreError, Result};
use crate::types::{SessionId, ID_LEN};

/// Map keys inside the encoded cursor.
mod keys {
    pub const SORT_TS: u64 = 0;
    pub const SESSION_ID: u64 = 1;
}

/// Position after which the next page starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListCursor {
    /// Activity timestamp of the last row returned (Unix ms).
    pub sort_ts: i64,
    /// Id of the last row returned.
    pub session_id: SessionId,
}

impl ListCursor {
    pub fn new(sort_ts: i64, session_id: SessionId) -> Self {
        Self {
            sort_ts,
            session_id,
        }
    }

    /// Whether a row with `key` sorts strictly after this cursor.
    ///
    /// Lists run newest first with ties broken by descending id.
    pub fn precedes(&self, key: (i64, SessionId)) -> bool {
        key < (self.sort_ts, self.session_id)
    }

    /// Encode to the opaque client-facing form.
    pub fn encode(&self) -> Result<String> {
        let value = Value::Map(vec![
            (
                Value::Integer(keys::SORT_TS.into()),
                Value::Integer(self.sort_ts.into()),
            ),
            (
                Value::Integer(keys::SESSION_ID.into()),
                Value::Bytes(self.session_id.as_bytes().to_vec()),
            ),
        ]);
        let mut buf = Vec::new();
        ciborium::into_writer(&value, &mut buf).map_err(|e| CoreError::Cursor(e.to_string()))?;
        Ok(hex::encode(buf))
    }

    /// Decode a client-supplied cursor.
    pub fn decode(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CoreError::Cursor(e.to_string()))?;
        let value: Value = ciborium::from_reader(bytes.as_slice())
            .map_err(|e| CoreError::Cursor(e.to_string()))?;

        let map = match value {
            Value::Map(m) => m,
            _ => return Err(CoreError::Cursor("expected map".into())),
        };

        let get = |key: u64| -> Option<&Value> {
            map.iter()
                .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
                .map(|(_, v)| v)
        };

        let sort_ts = match get(keys::SORT_TS) {
            Some(Value::Integer(i)) => i64::try_from(*i)
                .map_err(|_| CoreError::Cursor("timestamp out of range".into()))?,
            _ => return Err(CoreError::Cursor("missing timestamp".into())),
        };

        let session_id = match get(keys::SESSION_ID) {
            Some(Value::Bytes(b)) if b.len() == ID_LEN => {
                let mut arr = [0u8; ID_LEN];
                arr.copy_from_slice(b);
                SessionId(arr)
            }
            _ => return Err(CoreError::Cursor("invalid session id".into())),
        };

        Ok(Self {
            sort_ts,
            session_id,
        })
    }
}
