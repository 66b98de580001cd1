// flowwatch - network flow anomaly detector
// Copyright (C) 2025 Laurence Oberman <loberman@redhat.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Flow record and line tokenizer.
//!
//! One flow per line, space-separated, fields in this exact order:
//! `dst_ip src_ip dst_port src_port protocol time_first unknown time_last bytes
//! packets syn_flag`. This module is the "boundary only" CSV-tokenization
//! collaborator named in spec.md §1/§2 — its internals are not part of the detection
//! core, but the crate needs a real implementation to run end to end.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub dst_ip: u32,
    pub src_ip: u32,
    pub dst_port: u16,
    pub src_port: u16,
    pub protocol: u8,
    pub time_first: u64,
    pub time_last: u64,
    pub bytes: u64,
    pub packets: u64,
    pub syn_flag: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowParseError {
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
}

impl fmt::Display for FlowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowParseError::MissingField(name) => write!(f, "missing {name}, parsing interrupted"),
            FlowParseError::InvalidField { field, value } => {
                write!(f, "cannot parse {field} from '{value}', parsing interrupted")
            }
        }
    }
}

/// Splits a line into its eleven whitespace-delimited fields and converts them.
/// Returns `None` for a blank line or one starting with `#` (both are silently
/// skipped by the caller, matching the original's comment/blank-line handling).
pub fn parse_line(line: &str) -> Option<Result<Flow, FlowParseError>> {
    let line = line.trim_end_matches(|c| c == '\r' || c == '\n');
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(parse_fields(line))
}

fn parse_fields(line: &str) -> Result<Flow, FlowParseError> {
    let mut tokens = line.split_whitespace();

    let dst_ip = parse_ip(next_field(&mut tokens, "destination IP address")?, "destination IP address")?;
    let src_ip = parse_ip(next_field(&mut tokens, "source IP address")?, "source IP address")?;
    let dst_port = parse_num::<u16>(next_field(&mut tokens, "destination port")?, "destination port")?;
    let src_port = parse_num::<u16>(next_field(&mut tokens, "source port")?, "source port")?;
    let protocol = parse_num::<u8>(next_field(&mut tokens, "protocol")?, "protocol")?;
    let time_first = parse_num::<u64>(next_field(&mut tokens, "time of the first packet")?, "time of the first packet")?;
    // Unknown field, skipped (positional placeholder in the original record).
    next_field(&mut tokens, "unknown field")?;
    let time_last = parse_num::<u64>(next_field(&mut tokens, "time of the last packet")?, "time of the last packet")?;
    let bytes = parse_num::<u64>(next_field(&mut tokens, "number of transmitted bytes")?, "number of transmitted bytes")?;
    let packets = parse_num::<u64>(next_field(&mut tokens, "number of transmitted packets")?, "number of transmitted packets")?;
    let syn_flag = parse_num::<u8>(next_field(&mut tokens, "SYN flag")?, "SYN flag")?;

    if time_last < time_first {
        return Err(FlowParseError::InvalidField {
            field: "time of the last packet",
            value: format!("{time_last} < time_first {time_first}"),
        });
    }

    Ok(Flow {
        dst_ip,
        src_ip,
        dst_port,
        src_port,
        protocol,
        time_first,
        time_last,
        bytes,
        packets,
        syn_flag,
    })
}

fn next_field<'a, I: Iterator<Item = &'a str>>(
    tokens: &mut I,
    name: &'static str,
) -> Result<&'a str, FlowParseError> {
    tokens.next().ok_or(FlowParseError::MissingField(name))
}

fn parse_ip(value: &str, field: &'static str) -> Result<u32, FlowParseError> {
    Ipv4Addr::from_str(value)
        .map(u32::from)
        .map_err(|_| FlowParseError::InvalidField {
            field,
            value: value.to_string(),
        })
}

fn parse_num<T: FromStr>(value: &str, field: &'static str) -> Result<T, FlowParseError> {
    value.parse::<T>().map_err(|_| FlowParseError::InvalidField {
        field,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line() {
        let line = "10.0.0.1 10.0.0.2 80 5000 6 1000 0 1010 1500 10 1";
        let flow = parse_line(line).unwrap().unwrap();
        assert_eq!(flow.dst_ip, u32::from(Ipv4Addr::new(10, 0, 0, 1)));
        assert_eq!(flow.dst_port, 80);
        assert_eq!(flow.time_first, 1000);
        assert_eq!(flow.time_last, 1010);
        assert_eq!(flow.packets, 10);
        assert_eq!(flow.syn_flag, 1);
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   ").is_none());
        assert!(parse_line("# a comment").is_none());
    }

    #[test]
    fn rejects_bad_ip() {
        let line = "not-an-ip 10.0.0.2 80 5000 6 1000 0 1010 1500 10 1";
        let err = parse_line(line).unwrap().unwrap_err();
        assert!(matches!(err, FlowParseError::InvalidField { field: "destination IP address", .. }));
    }

    #[test]
    fn rejects_missing_field() {
        let line = "10.0.0.1 10.0.0.2 80";
        let err = parse_line(line).unwrap().unwrap_err();
        assert!(matches!(err, FlowParseError::MissingField(_)));
    }

    #[test]
    fn rejects_time_last_before_first() {
        let line = "10.0.0.1 10.0.0.2 80 5000 6 1000 0 999 1500 10 1";
        let err = parse_line(line).unwrap().unwrap_err();
        assert!(matches!(err, FlowParseError::InvalidField { field: "time of the last packet", .. }));
    }
}
