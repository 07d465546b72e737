//! Exception-app records: the packed signature descriptors a rule carries so
//! that the packet-inspection side can let specific traffic through even when
//! the rule's blanket action is DROP.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::limits::EXCEPT_APP_ID;

pub const IPPROTO_ICMP: u8 = 1;
pub const IPPROTO_TCP: u8 = 6;
pub const IPPROTO_UDP: u8 = 17;

// ---------------------------------------------------------------------------
// Destination ports
// ---------------------------------------------------------------------------

/// One destination-port range. `start == end` denotes a single port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
    /// Inverts the match for this range only.
    #[serde(default)]
    pub negated: bool,
}

impl PortRange {
    pub fn single(port: u16) -> Self {
        Self::span(port, port)
    }

    pub fn span(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            negated: false,
        }
    }

    pub fn negate(mut self) -> Self {
        self.negated = !self.negated;
        self
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negated {
            f.write_str("!")?;
        }
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Ordered destination-port ranges, OR'd together by the packet inspector,
/// each range applying its own negation. An empty set places no constraint on
/// the destination port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSet(Vec<PortRange>);

impl PortSet {
    pub fn new(ranges: Vec<PortRange>) -> Self {
        Self(ranges)
    }

    pub fn ranges(&self) -> &[PortRange] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Renders as `80|!8000-9000`.
impl fmt::Display for PortSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, range) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("|")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Payload signatures
// ---------------------------------------------------------------------------

/// Payload byte expected at a fixed offset. A record's signatures are AND'd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByteSignature {
    pub offset: u16,
    pub value: u8,
}

impl fmt::Display for ByteSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=0x{:x}", self.offset, self.value)
    }
}

// ---------------------------------------------------------------------------
// ExceptApp
// ---------------------------------------------------------------------------

/// A fixed-shape descriptor of one allow-listed application signature.
///
/// Every constraint left at its zero / empty value is unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptApp {
    pub name: String,
    pub proto: u8,
    #[serde(default)]
    pub sport: u16,
    #[serde(default)]
    pub dports: PortSet,
    #[serde(default)]
    pub host_url: String,
    #[serde(default)]
    pub request_url: String,
    #[serde(default)]
    pub signatures: Vec<ByteSignature>,
}

impl ExceptApp {
    /// The sentinel id every exception record carries, distinct from generic
    /// app-category ids.
    pub fn app_id(&self) -> u32 {
        EXCEPT_APP_ID
    }

    /// Renders the record back into the feature-string form accepted by
    /// [`FeatureStringBuilder`](crate::feature::FeatureStringBuilder).
    ///
    /// Trailing empty fields are omitted.
    pub fn feature_string(&self) -> String {
        let mut proto = protocol_name(self.proto);
        if self.sport != 0 {
            proto = format!("{proto}/{}", self.sport);
        }
        let dict = self
            .signatures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("&&");

        let mut fields = vec![
            proto,
            self.dports.to_string(),
            self.host_url.clone(),
            self.request_url.clone(),
            dict,
        ];
        while fields.len() > 2 && fields.last().is_some_and(|f| f.is_empty()) {
            fields.pop();
        }
        fields.join(":")
    }
}

/// Symbolic name for the common transport protocols, decimal otherwise.
pub fn protocol_name(proto: u8) -> String {
    match proto {
        IPPROTO_TCP => "tcp".to_string(),
        IPPROTO_UDP => "udp".to_string(),
        IPPROTO_ICMP => "icmp".to_string(),
        other => other.to_string(),
    }
}
