//! Node address tracking
//!
//! The container writes `<address> [<name>]` to a small text file in the
//! shared volume once the node has booted. This module parses it and reports
//! when the identity actually changes.

use tracing::info;

/// Node address and alias as published by the container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeIdentity {
    pub address: String,
    pub name: String,
}

impl NodeIdentity {
    /// Parse whitespace separated `<address> [<name>]`
    pub fn parse(raw: &str) -> Option<Self> {
        let mut tokens = raw.split_whitespace();
        let address = tokens.next()?.to_string();
        let name = tokens.next().unwrap_or_default().to_string();
        Some(Self { address, name })
    }

    pub fn short_address(&self) -> String {
        shorten_address(&self.address)
    }
}

/// `first8...last8`; addresses shorter than 16 characters are returned whole
pub fn shorten_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() < 16 {
        return address.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{}...{}", head, tail)
}

/// What is currently known about the node identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AddressState {
    /// Nothing read yet
    #[default]
    Unknown,
    /// Address file absent or empty
    Unavailable,
    Known(NodeIdentity),
}

impl AddressState {
    #[cfg(test)]
    pub fn identity(&self) -> Option<&NodeIdentity> {
        match self {
            AddressState::Known(identity) => Some(identity),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct AddressTracker {
    state: AddressState,
}

impl AddressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AddressState {
        &self.state
    }

    /// Apply the address file content, `None` when the file is absent.
    ///
    /// The identity is replaced as a whole whenever address or name differ.
    /// Becoming unavailable only counts as a change when an identity was held.
    pub fn refresh(&mut self, raw: Option<&str>) -> (&AddressState, bool) {
        let next = match raw.and_then(NodeIdentity::parse) {
            Some(identity) => AddressState::Known(identity),
            None => AddressState::Unavailable,
        };

        if next == self.state {
            return (&self.state, false);
        }

        let changed = match &next {
            AddressState::Known(identity) => {
                info!("Local address updated: {} : {}", identity.address, identity.name);
                true
            }
            _ => {
                info!("Address file not found.");
                matches!(self.state, AddressState::Known(_))
            }
        };
        self.state = next;
        (&self.state, changed)
    }
}
