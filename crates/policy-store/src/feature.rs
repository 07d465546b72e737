//! Turning raw feature strings into [`ExceptApp`] records.
//!
//! The store does not care how a feature string is encoded; it only needs
//! something implementing [`ExceptAppBuilder`]. [`FeatureStringBuilder`] is
//! the encoding used by the policy file:
//!
//! ```text
//! proto[/sport]:dports[:host[:request[:dict]]]
//!
//! tcp:443:example.com
//! udp/68:67|!1000-2000:::0=0x1&&4=0x63
//! ```
//!
//! `dports` is a `|`-separated list of `N` or `N-M` ranges, each optionally
//! prefixed with `!`. `dict` is a `&&`-separated list of `offset=0xHH` byte
//! signatures. No field may contain `:`.
//!
//! The minimum source length applies to raw policy input and is enforced by
//! the store before a builder runs. The builder itself accepts any length, so
//! the normalized output of [`ExceptApp::feature_string`] always parses back.

use crate::error::PolicyError;
use crate::except_app::{
    ByteSignature, ExceptApp, PortRange, PortSet, IPPROTO_ICMP, IPPROTO_TCP, IPPROTO_UDP,
};
use crate::limits::{
    MAX_APP_NAME_LEN, MAX_HOST_URL_LEN, MAX_POS_INFO_PER_FEATURE, MAX_PORT_RANGE_NUM,
    MAX_REQUEST_URL_LEN,
};

/// Builds one exception-app record from its raw source string.
pub trait ExceptAppBuilder: Send + Sync {
    /// `name` is the record name chosen by the owning rule.
    fn build(&self, name: &str, source: &str) -> Result<ExceptApp, PolicyError>;
}

/// Parser for the colon-separated feature-string encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureStringBuilder;

impl ExceptAppBuilder for FeatureStringBuilder {
    fn build(&self, name: &str, source: &str) -> Result<ExceptApp, PolicyError> {
        let fields: Vec<&str> = source.split(':').collect();
        if fields.len() < 2 {
            return Err(PolicyError::feature(source, "missing destination-port field"));
        }
        if fields.len() > 5 {
            return Err(PolicyError::feature(source, "more than five fields"));
        }
        let field = |i: usize| fields.get(i).copied().unwrap_or("").trim();

        let (proto, sport) = parse_proto(source, field(0))?;
        let dports = parse_dports(source, field(1))?;

        let host_url = field(2);
        if host_url.len() > MAX_HOST_URL_LEN {
            return Err(PolicyError::feature(
                source,
                format!("host longer than {MAX_HOST_URL_LEN} bytes"),
            ));
        }
        let request_url = field(3);
        if request_url.len() > MAX_REQUEST_URL_LEN {
            return Err(PolicyError::feature(
                source,
                format!("request url longer than {MAX_REQUEST_URL_LEN} bytes"),
            ));
        }
        let signatures = parse_dict(source, field(4))?;

        Ok(ExceptApp {
            name: bounded_name(name),
            proto,
            sport,
            dports,
            host_url: host_url.to_string(),
            request_url: request_url.to_string(),
            signatures,
        })
    }
}

fn parse_proto(source: &str, field: &str) -> Result<(u8, u16), PolicyError> {
    let (proto, sport) = match field.split_once('/') {
        Some((proto, sport)) => {
            let sport = sport
                .parse::<u16>()
                .map_err(|_| PolicyError::feature(source, format!("invalid source port '{sport}'")))?;
            (proto, sport)
        }
        None => (field, 0),
    };

    let proto = match proto.to_ascii_lowercase().as_str() {
        "tcp" => IPPROTO_TCP,
        "udp" => IPPROTO_UDP,
        "icmp" => IPPROTO_ICMP,
        other => other
            .parse::<u8>()
            .map_err(|_| PolicyError::feature(source, format!("unknown protocol '{other}'")))?,
    };
    Ok((proto, sport))
}

fn parse_dports(source: &str, field: &str) -> Result<PortSet, PolicyError> {
    if field.is_empty() {
        return Ok(PortSet::default());
    }

    let mut ranges = Vec::new();
    for token in field.split('|') {
        let token = token.trim();
        let (negated, body) = match token.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        let port = |s: &str| {
            s.trim()
                .parse::<u16>()
                .map_err(|_| PolicyError::feature(source, format!("invalid port range '{token}'")))
        };
        let range = match body.split_once('-') {
            Some((start, end)) => PortRange::span(port(start)?, port(end)?),
            None => PortRange::single(port(body)?),
        };
        if range.start > range.end {
            return Err(PolicyError::feature(
                source,
                format!("port range '{token}' is reversed"),
            ));
        }
        ranges.push(if negated { range.negate() } else { range });
    }

    if ranges.len() > MAX_PORT_RANGE_NUM {
        return Err(PolicyError::feature(
            source,
            format!("more than {MAX_PORT_RANGE_NUM} port ranges"),
        ));
    }
    Ok(PortSet::new(ranges))
}

fn parse_dict(source: &str, field: &str) -> Result<Vec<ByteSignature>, PolicyError> {
    if field.is_empty() {
        return Ok(Vec::new());
    }

    let mut signatures = Vec::new();
    for token in field.split("&&") {
        let token = token.trim();
        let invalid = || PolicyError::feature(source, format!("invalid byte signature '{token}'"));

        let (offset, value) = token.split_once('=').ok_or_else(invalid)?;
        let offset = offset.trim().parse::<u16>().map_err(|_| invalid())?;
        let value = value.trim();
        let hex = value
            .strip_prefix("0x")
            .or_else(|| value.strip_prefix("0X"))
            .ok_or_else(invalid)?;
        let value = u8::from_str_radix(hex, 16).map_err(|_| invalid())?;
        signatures.push(ByteSignature { offset, value });
    }

    if signatures.len() > MAX_POS_INFO_PER_FEATURE {
        return Err(PolicyError::feature(
            source,
            format!("more than {MAX_POS_INFO_PER_FEATURE} byte signatures"),
        ));
    }
    Ok(signatures)
}

fn bounded_name(name: &str) -> String {
    if name.len() <= MAX_APP_NAME_LEN {
        return name.to_string();
    }
    let mut end = MAX_APP_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    name[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(source: &str) -> Result<ExceptApp, PolicyError> {
        FeatureStringBuilder.build("r1_except_app_0", source)
    }

    #[test]
    fn parse_protocol_port_and_host() {
        let app = build("tcp:443:example.com").unwrap();
        assert_eq!(app.name, "r1_except_app_0");
        assert_eq!(app.proto, IPPROTO_TCP);
        assert_eq!(app.sport, 0);
        assert_eq!(app.dports.ranges(), &[PortRange::single(443)]);
        assert_eq!(app.host_url, "example.com");
        assert!(app.request_url.is_empty());
        assert!(app.signatures.is_empty());
    }

    #[test]
    fn parse_every_field() {
        let app = build("udp/68:67|!1000-2000:dhcp.lan:/lease:0=0x1&&4=0x63").unwrap();
        assert_eq!(app.proto, IPPROTO_UDP);
        assert_eq!(app.sport, 68);
        assert_eq!(
            app.dports.ranges(),
            &[PortRange::single(67), PortRange::span(1000, 2000).negate()]
        );
        assert_eq!(app.host_url, "dhcp.lan");
        assert_eq!(app.request_url, "/lease");
        assert_eq!(
            app.signatures,
            vec![
                ByteSignature { offset: 0, value: 0x01 },
                ByteSignature { offset: 4, value: 0x63 },
            ]
        );
    }

    #[test]
    fn numeric_protocol() {
        let app = build("47:::vpn.example.org").unwrap();
        assert_eq!(app.proto, 47);
        assert!(app.dports.is_empty());
        assert_eq!(app.request_url, "vpn.example.org");
    }

    #[test]
    fn reject_missing_port_field() {
        let err = build("tcp/1234567890123").unwrap_err();
        assert!(err.to_string().contains("destination-port"), "unexpected error: {err}");
    }

    #[test]
    fn normalized_rendering_shorter_than_source_parses_back() {
        let app = build("tcp:00443:ab.com").unwrap();
        let rendered = app.feature_string();
        assert_eq!(rendered, "tcp:443:ab.com");
        assert_eq!(build(&rendered).unwrap(), app);
    }

    #[test]
    fn reject_unknown_protocol() {
        let err = build("sctp:443:example.com").unwrap_err();
        assert!(err.to_string().contains("unknown protocol"), "unexpected error: {err}");
    }

    #[test]
    fn reject_reversed_range() {
        let err = build("tcp:9000-8000:example.com").unwrap_err();
        assert!(err.to_string().contains("reversed"), "unexpected error: {err}");
    }

    #[test]
    fn reject_too_many_ranges() {
        let err = build("tcp:1|2|3|4|5|6:example.com").unwrap_err();
        assert!(err.to_string().contains("port ranges"), "unexpected error: {err}");
    }

    #[test]
    fn reject_signature_without_hex_prefix() {
        let err = build("tcp:443:example.com::0=16").unwrap_err();
        assert!(err.to_string().contains("byte signature"), "unexpected error: {err}");
    }

    #[test]
    fn reject_extra_fields() {
        let err = build("tcp:443:example.com:/a:0=0x1:extra").unwrap_err();
        assert!(err.to_string().contains("five fields"), "unexpected error: {err}");
    }

    #[test]
    fn long_names_are_truncated() {
        let name = "x".repeat(MAX_APP_NAME_LEN + 10);
        let app = FeatureStringBuilder.build(&name, "tcp:443:example.com").unwrap();
        assert_eq!(app.name.len(), MAX_APP_NAME_LEN);
    }

    #[test]
    fn rendered_feature_string_parses_back() {
        let source = "udp/68:67|!1000-2000:dhcp.lan:/lease:0=0x1&&4=0x63";
        let app = build(source).unwrap();
        assert_eq!(app.feature_string(), source);
        assert_eq!(build(&app.feature_string()).unwrap(), app);
    }

    #[test]
    fn every_accepted_source_reparses_from_its_rendering() {
        let sources = [
            "tcp:443:example.com",
            "TCP : 0080 | 08080 : host.example",
            "udp/0053:53:::0=0X0A",
            "icmp::::0=0x8&&1=0x0",
            "47:::vpn.example.org",
            "tcp:!1-1023:::",
            "udp/68:67|!1000-2000:dhcp.lan:/lease:0=0x1&&4=0x63",
        ];
        for source in sources {
            let app = build(source).unwrap_or_else(|e| panic!("{source}: {e}"));
            let reparsed = build(&app.feature_string())
                .unwrap_or_else(|e| panic!("{source} -> {}: {e}", app.feature_string()));
            assert_eq!(reparsed, app, "{source}");
        }
    }
}
