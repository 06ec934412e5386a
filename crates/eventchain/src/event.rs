//! Event vocabulary, seeded entities and the typed payload of every event.
//!
//! Field names on the wire are fixed (`ID`, `ItemID`, `UserID`, ...) so that
//! downstream graph consumers see the same JSON regardless of which producer
//! emitted it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::envelope::Envelope;
use crate::error::ChainError;

// ============================================================================
// Event Types
// ============================================================================

/// Closed vocabulary of event type tags.
///
/// Tags are case-sensitive. An unknown tag fails envelope decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    UserRegistered,
    ItemCreated,
    ItemViewed,
    UserAddressValidated,
    UserAddressValidationFailed,
    ItemPurchased,
    ItemDropped,
    /// Sentinel drawn by the engine to end a chain. Never published.
    Nothing,
    ItemDelivered,
    ItemNotDelivered,
}

impl EventType {
    /// Every tag in the vocabulary.
    pub const ALL: [EventType; 10] = [
        EventType::UserRegistered,
        EventType::ItemCreated,
        EventType::ItemViewed,
        EventType::UserAddressValidated,
        EventType::UserAddressValidationFailed,
        EventType::ItemPurchased,
        EventType::ItemDropped,
        EventType::Nothing,
        EventType::ItemDelivered,
        EventType::ItemNotDelivered,
    ];

    /// Types the root emitter draws from each tick.
    pub const ROOTS: [EventType; 3] = [
        EventType::ItemViewed,
        EventType::UserAddressValidated,
        EventType::UserAddressValidationFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserRegistered => "UserRegistered",
            EventType::ItemCreated => "ItemCreated",
            EventType::ItemViewed => "ItemViewed",
            EventType::UserAddressValidated => "UserAddressValidated",
            EventType::UserAddressValidationFailed => "UserAddressValidationFailed",
            EventType::ItemPurchased => "ItemPurchased",
            EventType::ItemDropped => "ItemDropped",
            EventType::Nothing => "Nothing",
            EventType::ItemDelivered => "ItemDelivered",
            EventType::ItemNotDelivered => "ItemNotDelivered",
        }
    }

    pub fn is_root(&self) -> bool {
        Self::ROOTS.contains(self)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// A tag outside the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventType(pub String);

// ============================================================================
// Entities
// ============================================================================

/// A seeded user. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Age")]
    pub age: u32,
}

/// A seeded item. Immutable once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    #[serde(rename = "ID")]
    pub id: u64,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Manufacturer")]
    pub manufacturer: String,
    #[serde(rename = "Origin")]
    pub origin: String,
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemViewedPayload {
    #[serde(rename = "ItemID")]
    pub item_id: u64,
    #[serde(rename = "UserID")]
    pub user_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPurchasedPayload {
    #[serde(rename = "ItemID")]
    pub item_id: u64,
    #[serde(rename = "UserID")]
    pub user_id: u64,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDroppedPayload {
    #[serde(rename = "ItemID")]
    pub item_id: u64,
    #[serde(rename = "UserID")]
    pub user_id: u64,
    #[serde(rename = "Quantity")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDeliveredPayload {
    #[serde(rename = "ItemID")]
    pub item_id: u64,
    #[serde(rename = "UserID")]
    pub user_id: u64,
    #[serde(rename = "Address")]
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemNotDeliveredPayload {
    #[serde(rename = "ItemID")]
    pub item_id: u64,
    #[serde(rename = "UserID")]
    pub user_id: u64,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Reason")]
    pub reason: String,
}

/// Typed payload, one variant per event type that carries data.
///
/// `UserAddressValidated`, `UserAddressValidationFailed` and `Nothing` have no
/// payload shape; decoding an envelope with one of those tags fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    UserRegistered(User),
    ItemCreated(Item),
    ItemViewed(ItemViewedPayload),
    ItemPurchased(ItemPurchasedPayload),
    ItemDropped(ItemDroppedPayload),
    ItemDelivered(ItemDeliveredPayload),
    ItemNotDelivered(ItemNotDeliveredPayload),
}

impl Payload {
    /// Decode the envelope's payload into the variant its tag names.
    pub fn from_envelope(envelope: &Envelope) -> Result<Self, ChainError> {
        let payload = match envelope.event_type {
            EventType::UserRegistered => Payload::UserRegistered(envelope.payload()?),
            EventType::ItemCreated => Payload::ItemCreated(envelope.payload()?),
            EventType::ItemViewed => Payload::ItemViewed(envelope.payload()?),
            EventType::ItemPurchased => Payload::ItemPurchased(envelope.payload()?),
            EventType::ItemDropped => Payload::ItemDropped(envelope.payload()?),
            EventType::ItemDelivered => Payload::ItemDelivered(envelope.payload()?),
            EventType::ItemNotDelivered => Payload::ItemNotDelivered(envelope.payload()?),
            other @ (EventType::UserAddressValidated
            | EventType::UserAddressValidationFailed
            | EventType::Nothing) => {
                return Err(ChainError::Decoding(serde::de::Error::custom(format!(
                    "{other} has no payload shape"
                ))))
            }
        };
        Ok(payload)
    }

    pub fn event_type(&self) -> EventType {
        match self {
            Payload::UserRegistered(_) => EventType::UserRegistered,
            Payload::ItemCreated(_) => EventType::ItemCreated,
            Payload::ItemViewed(_) => EventType::ItemViewed,
            Payload::ItemPurchased(_) => EventType::ItemPurchased,
            Payload::ItemDropped(_) => EventType::ItemDropped,
            Payload::ItemDelivered(_) => EventType::ItemDelivered,
            Payload::ItemNotDelivered(_) => EventType::ItemNotDelivered,
        }
    }

    /// The `(ItemID, UserID)` pair carried forward along a chain.
    ///
    /// `None` for entity creation payloads, which are not part of a chain.
    pub fn identity(&self) -> Option<(u64, u64)> {
        match self {
            Payload::UserRegistered(_) | Payload::ItemCreated(_) => None,
            Payload::ItemViewed(p) => Some((p.item_id, p.user_id)),
            Payload::ItemPurchased(p) => Some((p.item_id, p.user_id)),
            Payload::ItemDropped(p) => Some((p.item_id, p.user_id)),
            Payload::ItemDelivered(p) => Some((p.item_id, p.user_id)),
            Payload::ItemNotDelivered(p) => Some((p.item_id, p.user_id)),
        }
    }

    /// Serialize the inner structure as a JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, ChainError> {
        let value = match self {
            Payload::UserRegistered(p) => serde_json::to_value(p),
            Payload::ItemCreated(p) => serde_json::to_value(p),
            Payload::ItemViewed(p) => serde_json::to_value(p),
            Payload::ItemPurchased(p) => serde_json::to_value(p),
            Payload::ItemDropped(p) => serde_json::to_value(p),
            Payload::ItemDelivered(p) => serde_json::to_value(p),
            Payload::ItemNotDelivered(p) => serde_json::to_value(p),
        };
        value.map_err(ChainError::Encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_strings_round_trip_through_from_str() {
        for t in EventType::ALL {
            assert_eq!(t.as_str().parse::<EventType>().unwrap(), t);
            assert_eq!(serde_json::to_value(t).unwrap(), t.as_str());
        }
    }

    #[test]
    fn event_type_parsing_is_case_sensitive() {
        assert!("itemviewed".parse::<EventType>().is_err());
        assert!("ItemViewed ".parse::<EventType>().is_err());
    }

    #[test]
    fn only_three_types_are_roots() {
        let roots: Vec<_> = EventType::ALL.iter().filter(|t| t.is_root()).collect();
        assert_eq!(roots.len(), 3);
        assert!(EventType::ItemViewed.is_root());
        assert!(!EventType::ItemPurchased.is_root());
    }

    #[test]
    fn payload_uses_wire_field_names() {
        let json = serde_json::to_value(ItemNotDeliveredPayload {
            item_id: 2,
            user_id: 3,
            address: "1 Main St, Springfield, Canada".into(),
            reason: "fake".into(),
        })
        .unwrap();

        assert_eq!(json["ItemID"], 2);
        assert_eq!(json["UserID"], 3);
        assert_eq!(json["Reason"], "fake");
        assert!(json.get("item_id").is_none());
    }

    #[test]
    fn identity_is_none_for_entities() {
        let user = Payload::UserRegistered(User {
            id: 1,
            name: "Ada".into(),
            age: 30,
        });
        assert_eq!(user.identity(), None);

        let viewed = Payload::ItemViewed(ItemViewedPayload {
            item_id: 4,
            user_id: 9,
        });
        assert_eq!(viewed.identity(), Some((4, 9)));
        assert_eq!(viewed.event_type(), EventType::ItemViewed);
    }
}
