//! MAC address query.

use super::{InteractOptions, issue_command};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::port::Transport;

/// Vendor prefixes of the Wi-Fi modules whose manufacturing firmware may
/// drop leading MAC bytes.
const MODULE_PREFIXES: [[&str; 3]; 2] = [["6c", "0b", "84"], ["44", "39", "c4"]];

/// Ask the device for its Wi-Fi MAC address.
///
/// Spark Core devices do not answer this query.
pub fn mac_address<T, C>(port: &mut T, clock: &C, options: &InteractOptions) -> Result<String>
where
    T: Transport + ?Sized,
    C: Clock,
{
    let reply = issue_command(port, clock, "m", options)?;
    parse_mac_address(&reply).ok_or_else(|| Error::UnexpectedReply(reply.trim().to_string()))
}

/// Find a MAC address in the reply to the `m` command, lowercased.
///
/// A truncated address is padded with `00` bytes, and when one of its
/// leading bytes lines up with a known module prefix the prefix is
/// restored.
pub fn parse_mac_address(text: &str) -> Option<String> {
    let (start, end) = (0..text.len()).find_map(|start| mac_span(text.as_bytes(), start))?;
    let mac = text[start..end].to_ascii_lowercase();
    if mac.len() >= 17 {
        return Some(mac);
    }

    let mut bytes: Vec<&str> = mac.split(':').collect();
    while bytes.len() < 6 {
        bytes.insert(0, "00");
    }
    for prefix in MODULE_PREFIXES {
        if (0..prefix.len()).rev().any(|i| bytes[i] == prefix[i]) {
            let repaired: Vec<&str> = prefix.iter().copied().chain(bytes[3..].iter().copied()).collect();
            return Some(repaired.join(":"));
        }
    }
    Some(mac)
}

/// Span of `hh:` repeated one to five times, then an optional `hh`.
fn mac_span(bytes: &[u8], start: usize) -> Option<(usize, usize)> {
    let pair = |at: usize| {
        bytes
            .get(at..at + 2)
            .is_some_and(|p| p.iter().all(u8::is_ascii_hexdigit))
    };

    let mut end = start;
    let mut groups = 0;
    while groups < 5 && pair(end) && bytes.get(end + 2) == Some(&b':') {
        end += 3;
        groups += 1;
    }
    if groups == 0 {
        return None;
    }
    if pair(end) {
        end += 2;
    }
    Some((start, end))
}
