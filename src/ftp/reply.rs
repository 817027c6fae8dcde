//! FTP reply parsing (RFC 959 §4.2)

use super::error::{FtpError, FtpResult};
use regex::Regex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

/// A complete, possibly multi-line, server reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl Reply {
    /// 1xx: the command started, another reply will follow
    pub const fn is_preliminary(&self) -> bool {
        self.code / 100 == 1
    }

    /// 2xx
    pub const fn is_success(&self) -> bool {
        self.code / 100 == 2
    }

    /// 3xx: more input expected (e.g. after USER or REST)
    pub const fn is_intermediate(&self) -> bool {
        self.code / 100 == 3
    }

    /// Text of the final line, including the code
    pub fn text(&self) -> String {
        self.lines.last().cloned().unwrap_or_default()
    }

    pub fn into_error(self) -> FtpError {
        FtpError::Reply {
            code: self.code,
            text: self.text(),
        }
    }
}

/// Parse the 3-digit reply code at the start of a line
pub fn parse_code(line: &str) -> FtpResult<u16> {
    line.get(..3)
        .filter(|digits| digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u16>().ok())
        .ok_or_else(|| FtpError::Protocol(format!("invalid reply code in '{line}'")))
}

/// Whether `line` is the first line of a multi-line reply (`NNN-text`)
pub fn opens_multiline(line: &str) -> bool {
    line.as_bytes().get(3) == Some(&b'-')
}

/// Whether `line` terminates a multi-line reply started with `code`
pub fn closes_multiline(line: &str, code: u16) -> bool {
    line.len() >= 3
        && line.starts_with(&code.to_string())
        && line.as_bytes().get(3).map_or(true, |b| *b == b' ')
}

fn pasv_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3}),(\d{1,3})")
            .unwrap_or_else(|e| unreachable!("static PASV pattern: {e}"))
    })
}

/// Parse the data address from a `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)` reply
pub fn parse_pasv(text: &str) -> FtpResult<SocketAddr> {
    let caps = pasv_pattern()
        .captures(text)
        .ok_or_else(|| FtpError::Protocol(format!("cannot parse PASV reply: {text}")))?;

    let mut nums = [0u8; 6];
    for (i, slot) in nums.iter_mut().enumerate() {
        *slot = caps[i + 1]
            .parse::<u8>()
            .map_err(|_| FtpError::Protocol(format!("PASV field out of range: {text}")))?;
    }

    let ip = IpAddr::V4(Ipv4Addr::new(nums[0], nums[1], nums[2], nums[3]));
    let port = (u16::from(nums[4]) << 8) | u16::from(nums[5]);
    Ok(SocketAddr::new(ip, port))
}

/// Parse the byte count from a `213 <size>` reply
pub fn parse_size(text: &str) -> FtpResult<u64> {
    text.split_whitespace()
        .nth(1)
        .and_then(|n| n.parse::<u64>().ok())
        .ok_or_else(|| FtpError::Protocol(format!("cannot parse SIZE reply: {text}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_classes() {
        let reply = |code| Reply {
            code,
            lines: vec![format!("{code} text")],
        };
        assert!(reply(150).is_preliminary());
        assert!(reply(226).is_success());
        assert!(reply(350).is_intermediate());
        assert!(!reply(550).is_success());
        assert_eq!(reply(226).text(), "226 text");
    }

    #[test]
    fn test_parse_code() {
        assert_eq!(parse_code("220 Welcome").unwrap(), 220);
        assert_eq!(parse_code("211-Features:").unwrap(), 211);
        assert!(parse_code("2x0 bad").is_err());
        assert!(parse_code("22").is_err());
    }

    #[test]
    fn test_multiline_markers() {
        assert!(opens_multiline("220-Hello"));
        assert!(!opens_multiline("220 Hello"));
        assert!(closes_multiline("220 End", 220));
        assert!(closes_multiline("220", 220));
        assert!(!closes_multiline("220-More", 220));
        assert!(!closes_multiline(" 220 indented", 220));
    }

    #[test]
    fn test_parse_pasv() {
        let addr = parse_pasv("227 Entering Passive Mode (192,168,1,10,195,80)").unwrap();
        assert_eq!(addr, "192.168.1.10:50000".parse().unwrap());

        // Some servers omit the parentheses
        let addr = parse_pasv("227 =127,0,0,1,4,1").unwrap();
        assert_eq!(addr.port(), 1025);

        assert!(parse_pasv("227 Entering Passive Mode").is_err());
        assert!(parse_pasv("227 (300,0,0,1,4,1)").is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("213 10000").unwrap(), 10_000);
        assert!(parse_size("213").is_err());
        assert!(parse_size("213 lots").is_err());
    }
}
