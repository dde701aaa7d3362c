//! Rendering device output as terminal text.

/// Drain buffered bytes into displayable UTF-8 text.
///
/// Invalid sequences become `�`. An incomplete sequence at the end stays in
/// `buffer` so the next chunk can complete it.
pub fn drain_utf8_lossy(buffer: &mut Vec<u8>) -> String {
    let mut output = String::new();

    loop {
        match std::str::from_utf8(buffer) {
            Ok(valid) => {
                output.push_str(valid);
                buffer.clear();
                break;
            },
            Err(err) => {
                let valid_up_to = err.valid_up_to();
                if let Ok(valid) = std::str::from_utf8(&buffer[..valid_up_to]) {
                    output.push_str(valid);
                }

                match err.error_len() {
                    Some(invalid_len) => {
                        output.push('\u{FFFD}');
                        let drain_to = valid_up_to.saturating_add(invalid_len).min(buffer.len());
                        buffer.drain(..drain_to);
                    },
                    None => {
                        buffer.drain(..valid_up_to);
                        break;
                    },
                }
            },
        }
    }

    output
}

/// Normalize line endings and drop control characters.
///
/// `\r\n` and lone `\r` both become `\n`. Tabs survive.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push('\n');
            },
            '\n' | '\t' => out.push(ch),
            _ if ch.is_control() => {},
            _ => out.push(ch),
        }
    }
    out
}
