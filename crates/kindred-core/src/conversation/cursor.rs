//! Opaque pagination cursors.
//!
//! A cursor encodes `(created_at, seq)` of the last message on a page as
//! URL-safe base64, so clients can't depend on its shape. Timestamps keep
//! full nanosecond precision so a decoded cursor compares equal to the row
//! it came from.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use kindred_types::chat::MessageCursor;

/// Encode a store position as an opaque token.
pub fn encode_cursor(cursor: &MessageCursor) -> String {
    let raw = format!(
        "{}|{}|{}",
        cursor.created_at.timestamp(),
        cursor.created_at.timestamp_subsec_nanos(),
        cursor.seq
    );
    URL_SAFE_NO_PAD.encode(raw.as_bytes())
}

/// Decode a token produced by [`encode_cursor`].
pub fn decode_cursor(token: &str) -> Result<MessageCursor, String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|e| format!("malformed cursor: {e}"))?;
    let raw = String::from_utf8(bytes).map_err(|_| "malformed cursor".to_string())?;
    let malformed = || "malformed cursor".to_string();

    let mut parts = raw.split('|');
    let (Some(secs), Some(nanos), Some(seq), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(malformed());
    };

    let secs: i64 = secs.parse().map_err(|_| malformed())?;
    let nanos: u32 = nanos.parse().map_err(|_| malformed())?;
    let seq: i64 = seq.parse().map_err(|_| malformed())?;
    let created_at: DateTime<Utc> = DateTime::from_timestamp(secs, nanos).ok_or_else(malformed)?;

    Ok(MessageCursor { created_at, seq })
}
