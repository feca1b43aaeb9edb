//! JSON-RPC 2.0 `Content-Length` framing over a pair of async pipes
//! (spec.md §4.7/§6), plus the `Location`/`file://` URI conversions at the
//! LSP wire boundary.

use crate::types::Location;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, value: &Value) -> std::io::Result<()> {
    let body = serde_json::to_vec(value)?;
    let header = format!("Content-Length: {}\r\n\r\n", body.len());
    writer.write_all(header.as_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one framed message. Returns `Ok(None)` on a clean EOF (the child
/// closed its stdout).
pub async fn read_frame<R: AsyncBufReadExt + Unpin>(reader: &mut R) -> std::io::Result<Option<Value>> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let read = reader.read_line(&mut line).await?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = value.trim().parse().ok();
        }
    }

    let Some(len) = content_length else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "frame missing Content-Length header",
        ));
    };

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    let value = serde_json::from_slice(&body)?;
    Ok(Some(value))
}

pub fn request_frame(id: u64, method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": method,
        "params": params,
    })
}

pub fn notification_frame(method: &str, params: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
    })
}

pub type LineReader = BufReader<tokio::process::ChildStdout>;

/// Percent-encode everything outside RFC 3986 unreserved characters, leaving
/// `/` alone so path separators stay readable in the resulting URI. No crate
/// in this project's dependency stack does URL percent-encoding, so this is
/// hand-written against the wire format directly (the same reasoning that
/// keeps the JSON-RPC framing above hand-rolled).
fn percent_encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for byte in path.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

fn percent_decode_path(encoded: &str) -> String {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(value) = u8::from_str_radix(&encoded[i + 1..i + 3], 16) {
                out.push(value);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Build a `file://` URI for an absolute path (spec.md §4.7 "rootUri").
pub fn file_uri(path: &std::path::Path) -> String {
    format!("file://{}", percent_encode_path(&path.to_string_lossy()))
}

/// Recover a plain path from a `file://` URI. Returns `None` for any other scheme.
pub fn file_path_from_uri(uri: &str) -> Option<String> {
    uri.strip_prefix("file://").map(percent_decode_path)
}

/// Convert a core [`Location`] (1-indexed line / 0-indexed column) into an
/// LSP `Location` (0-indexed line and column, zero-width range).
pub fn location_to_lsp(location: &Location) -> Value {
    let lsp_line = location.line.saturating_sub(1);
    serde_json::json!({
        "uri": file_uri(std::path::Path::new(&location.file_path)),
        "range": {
            "start": { "line": lsp_line, "character": location.col },
            "end": { "line": lsp_line, "character": location.col },
        },
    })
}

/// Convert an LSP `Location` response back into a core [`Location`].
/// Returns `None` if the JSON shape doesn't match (missing/non-file uri,
/// missing range).
pub fn lsp_to_location(value: &Value) -> Option<Location> {
    let file_path = file_path_from_uri(value.get("uri")?.as_str()?)?;
    let start = value.get("range")?.get("start")?;
    let line = start.get("line")?.as_u64()? as u32;
    let col = start.get("character")?.as_u64()? as u32;
    Some(Location {
        file_path,
        line: line + 1,
        col,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (client, server) = tokio::io::duplex(4096);
        let (mut read_half, mut write_half) = tokio::io::split(client);
        let (server_read, _server_write) = tokio::io::split(server);
        let mut server_reader = BufReader::new(server_read);

        let value = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "initialize"});
        write_frame(&mut write_half, &value).await.unwrap();
        drop(write_half);

        let framed = read_frame(&mut server_reader).await.unwrap().unwrap();
        assert_eq!(framed, value);

        let mut buf = [0u8; 1];
        let _ = read_half.read(&mut buf).await;
    }

    #[test]
    fn location_round_trips_through_lsp_shape() {
        let location = Location {
            file_path: "/home/me/project/main.go".to_string(),
            line: 12,
            col: 4,
        };
        let lsp = location_to_lsp(&location);
        assert_eq!(lsp["range"]["start"]["line"], 11);
        assert_eq!(lsp["range"]["start"]["character"], 4);

        let round_tripped = lsp_to_location(&lsp).unwrap();
        assert_eq!(round_tripped, location);
    }

    #[test]
    fn file_uri_percent_encodes_spaces() {
        let path = std::path::Path::new("/home/me/my project/main.go");
        let uri = file_uri(path);
        assert_eq!(uri, "file:///home/me/my%20project/main.go");
        assert_eq!(file_path_from_uri(&uri).unwrap(), "/home/me/my project/main.go");
    }

    #[test]
    fn lsp_to_location_rejects_non_file_scheme() {
        let value = serde_json::json!({
            "uri": "untitled:Untitled-1",
            "range": { "start": { "line": 0, "character": 0 }, "end": { "line": 0, "character": 0 } },
        });
        assert!(lsp_to_location(&value).is_none());
    }
}
