use base64::Engine;
use serde::{Deserialize, Serialize};

/// Keyset pagination cursor over (created_at, id).
///
/// The id tie-break keeps ordering stable when concurrent inserts share a
/// millisecond timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    /// Epoch milliseconds of the last row seen
    pub created_at: i64,
    pub id: String,
}

/// Encode a cursor as an opaque base64url token.
pub fn encode_cursor(cursor: &Cursor) -> String {
    let json = serde_json::to_vec(cursor).expect("cursor serializes");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(json)
}

/// Decode a cursor token. Invalid or unparseable tokens mean "no cursor"
/// (start from the beginning), never an error.
pub fn decode_cursor(token: &str) -> Option<Cursor> {
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(token.trim())
        .ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Parse an optional `cursor` query parameter.
pub fn decode_cursor_param(param: Option<&str>) -> Option<Cursor> {
    match param {
        Some(token) if !token.is_empty() => decode_cursor(token),
        _ => None,
    }
}

/// A page of results plus the token for the next page, if any.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    /// Build a page from up to `limit + 1` fetched rows; the extra row, when
    /// present, signals there is a next page.
    pub fn from_rows(mut rows: Vec<T>, limit: usize, cursor_of: impl Fn(&T) -> Cursor) -> Self {
        let next_cursor = if rows.len() > limit {
            rows.truncate(limit);
            rows.last().map(|row| encode_cursor(&cursor_of(row)))
        } else {
            None
        };
        Page {
            items: rows,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_round_trip() {
        let cursor = Cursor {
            created_at: 1_700_000_000_123,
            id: "42".to_string(),
        };
        let token = encode_cursor(&cursor);
        assert_eq!(decode_cursor(&token), Some(cursor));
    }

    #[test]
    fn test_garbage_decodes_to_none() {
        assert_eq!(decode_cursor("garbage"), None);
        assert_eq!(decode_cursor("!!!not-base64!!!"), None);
        // valid base64, invalid JSON
        let token = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(b"not json");
        assert_eq!(decode_cursor(&token), None);
        assert_eq!(decode_cursor(""), None);
    }

    #[test]
    fn test_cursor_param() {
        assert_eq!(decode_cursor_param(None), None);
        assert_eq!(decode_cursor_param(Some("")), None);
        let cursor = Cursor {
            created_at: 1,
            id: "a".to_string(),
        };
        let token = encode_cursor(&cursor);
        assert_eq!(decode_cursor_param(Some(&token)), Some(cursor));
    }

    #[test]
    fn test_page_detects_next() {
        let rows = vec![1, 2, 3];
        let page = Page::from_rows(rows, 2, |n| Cursor {
            created_at: *n as i64,
            id: n.to_string(),
        });
        assert_eq!(page.items, vec![1, 2]);
        let next = decode_cursor(page.next_cursor.as_deref().unwrap()).unwrap();
        assert_eq!(next.id, "2");

        let page = Page::from_rows(vec![1, 2], 2, |n| Cursor {
            created_at: *n as i64,
            id: n.to_string(),
        });
        assert!(page.next_cursor.is_none());
    }
}
