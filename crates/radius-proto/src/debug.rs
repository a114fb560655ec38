//! Human-readable packet dumps for trace logging
//!
//! Works on raw bytes so it can describe packets that failed validation.

use crate::dictionary::Dictionary;
use crate::packet::{Code, SocketInfo};
use crate::validation::RawAttributes;
use tracing::trace;

const MAX_VALUE_BYTES: usize = 15;

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Describe a raw packet one line at a time.
///
/// Header fields are printed only as far as the buffer reaches. Attribute
/// values are cut at fifteen bytes. Never panics.
pub fn dump_lines(
    data: &[u8],
    socket: Option<&SocketInfo>,
    dictionary: Option<&Dictionary>,
) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(socket) = socket {
        lines.push(format!("Socket : {}", socket.transport));
        if let Some(src) = socket.src {
            lines.push(format!("Src    : {src}"));
        }
        if let Some(dst) = socket.dst {
            lines.push(format!("Dst    : {dst}"));
        }
    }

    let Some(&code) = data.first() else {
        return lines;
    };
    match Code::from_u8(code) {
        Some(known) => lines.push(format!("Code   : {code} ({})", known.name())),
        None => lines.push(format!("Code   : {code}")),
    }
    if let Some(&id) = data.get(1) {
        lines.push(format!("Id     : {id}"));
    }
    if let Some(len) = data.get(2..4) {
        lines.push(format!("Length : {}", u16::from_be_bytes([len[0], len[1]])));
    }
    if let Some(vector) = data.get(4..20) {
        lines.push(format!("Vector : {}", hex(vector)));
    }

    for raw in RawAttributes::new(data) {
        let name = dictionary
            .and_then(|d| d.attribute(raw.attr_type))
            .map(|def| def.name.as_str())
            .unwrap_or("");
        let mut line = format!(
            "  {:02x} {:02x}  {name:<24}",
            raw.attr_type,
            raw.value.len() + 2
        );

        if raw.attr_type == 26 && raw.value.len() > 4 {
            let vendor = u32::from_be_bytes([raw.value[0], raw.value[1], raw.value[2], raw.value[3]]);
            line.push_str(&format!(" vendor {vendor}"));
        }

        let shown = raw.value.len().min(MAX_VALUE_BYTES);
        line.push(' ');
        line.push_str(&hex(&raw.value[..shown]));
        if raw.value.len() > MAX_VALUE_BYTES {
            line.push_str("...");
        }
        lines.push(line);
    }

    lines
}

/// Emit a packet dump at trace level.
pub fn log_hex(data: &[u8], socket: Option<&SocketInfo>, dictionary: Option<&Dictionary>) {
    for line in dump_lines(data, socket, dictionary) {
        trace!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_header_and_attributes() {
        let mut data = vec![1, 9, 0, 45];
        data.extend_from_slice(&[0xab; 16]);
        data.extend_from_slice(&[1, 5, b'b', b'o', b'b']);
        data.extend_from_slice(&[18, 20]);
        data.extend_from_slice(&[b'x'; 18]);

        let dict = Dictionary::standard();
        let lines = dump_lines(&data, None, Some(&dict));
        assert_eq!(lines[0], "Code   : 1 (Access-Request)");
        assert_eq!(lines[1], "Id     : 9");
        assert_eq!(lines[2], "Length : 45");
        assert!(lines[4].contains("User-Name"));
        assert!(lines[4].ends_with("62 6f 62"));
        assert!(lines[5].ends_with("..."));
    }

    #[test]
    fn test_dump_vendor_specific() {
        let mut data = vec![2, 1, 0, 31];
        data.extend_from_slice(&[0u8; 16]);
        data.extend_from_slice(&[26, 11, 0, 0, 0x01, 0x37, 1, 5, b'a', b'b', b'c']);
        let lines = dump_lines(&data, None, None);
        assert!(lines.last().unwrap().contains("vendor 311"));
    }

    #[test]
    fn test_dump_truncated_input() {
        assert!(dump_lines(&[], None, None).is_empty());
        assert_eq!(dump_lines(&[4, 1], None, None).len(), 2);
        let lines = dump_lines(&[1, 1, 0, 30, 0, 0], None, None);
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_dump_socket() {
        let socket = SocketInfo {
            src: Some("127.0.0.1:1812".parse().unwrap()),
            ..Default::default()
        };
        let lines = dump_lines(&[], Some(&socket), None);
        assert_eq!(lines[0], "Socket : udp");
        assert_eq!(lines[1], "Src    : 127.0.0.1:1812");
    }
}
