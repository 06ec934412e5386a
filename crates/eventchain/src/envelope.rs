//! Generic event envelope: type tag, creation time and an embedded payload.
//!
//! Wire format:
//!
//! ```text
//! {"type": "ItemViewed", "created_at": 1718000000, "payload": {"ItemID": 1, "UserID": 7}}
//! ```
//!
//! The tag alone determines how `payload` is decoded. Decode failures are
//! always surfaced as [`ChainError::Decoding`], never coerced.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ChainError;
use crate::event::{EventType, Payload};

/// Outer structure wrapped around every published event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Unix seconds.
    pub created_at: i64,
    pub payload: serde_json::Value,
}

impl Envelope {
    /// Wrap a payload, stamping `created_at` with the current time.
    pub fn new<P: Serialize>(event_type: EventType, payload: &P) -> Result<Self, ChainError> {
        let payload = serde_json::to_value(payload).map_err(ChainError::Encoding)?;
        Ok(Self {
            event_type,
            created_at: Utc::now().timestamp(),
            payload,
        })
    }

    /// Wrap a typed payload under the tag its variant names.
    pub fn from_payload(payload: &Payload) -> Result<Self, ChainError> {
        Ok(Self {
            event_type: payload.event_type(),
            created_at: Utc::now().timestamp(),
            payload: payload.to_value()?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, ChainError> {
        serde_json::to_vec(self).map_err(ChainError::Encoding)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ChainError> {
        serde_json::from_slice(bytes).map_err(ChainError::Decoding)
    }

    /// Decode the embedded payload into `T`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T, ChainError> {
        T::deserialize(&self.payload).map_err(ChainError::Decoding)
    }

    /// The embedded payload as standalone JSON bytes.
    pub fn payload_bytes(&self) -> Result<Vec<u8>, ChainError> {
        serde_json::to_vec(&self.payload).map_err(ChainError::Encoding)
    }
}

/// Encode `payload` under `event_type` into envelope bytes.
pub fn encode<P: Serialize>(event_type: EventType, payload: &P) -> Result<Vec<u8>, ChainError> {
    Envelope::new(event_type, payload)?.encode()
}

/// Split envelope bytes into the type tag and the raw payload bytes.
pub fn decode(bytes: &[u8]) -> Result<(EventType, Vec<u8>), ChainError> {
    let envelope = Envelope::decode(bytes)?;
    let payload = envelope.payload_bytes()?;
    Ok((envelope.event_type, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{
        Item, ItemDeliveredPayload, ItemDroppedPayload, ItemNotDeliveredPayload,
        ItemPurchasedPayload, ItemViewedPayload, User,
    };

    #[test]
    fn decode_returns_what_was_encoded() {
        let payload = ItemPurchasedPayload {
            item_id: 2,
            user_id: 3,
            quantity: 4,
        };
        let bytes = encode(EventType::ItemPurchased, &payload).unwrap();

        let (event_type, raw) = decode(&bytes).unwrap();
        assert_eq!(event_type, EventType::ItemPurchased);
        let back: ItemPurchasedPayload = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn envelope_wire_shape() {
        let envelope = Envelope::new(
            EventType::ItemViewed,
            &ItemViewedPayload {
                item_id: 1,
                user_id: 1,
            },
        )
        .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();

        assert_eq!(json["type"], "ItemViewed");
        assert!(json["created_at"].is_i64());
        assert_eq!(json["payload"]["ItemID"], 1);
        assert_eq!(json["payload"]["UserID"], 1);
    }

    #[test]
    fn created_at_is_current_unix_seconds() {
        let before = Utc::now().timestamp();
        let envelope = Envelope::new(EventType::ItemViewed, &serde_json::json!({})).unwrap();
        let after = Utc::now().timestamp();

        assert!(envelope.created_at >= before && envelope.created_at <= after);
    }

    #[test]
    fn malformed_bytes_are_a_decoding_error() {
        let err = Envelope::decode(b"{not json").unwrap_err();
        assert!(matches!(err, ChainError::Decoding(_)));
    }

    #[test]
    fn unknown_tag_is_a_decoding_error() {
        let bytes = br#"{"type":"ItemStolen","created_at":0,"payload":{}}"#;
        assert!(matches!(
            Envelope::decode(bytes),
            Err(ChainError::Decoding(_))
        ));
    }

    #[test]
    fn payload_of_wrong_shape_is_a_decoding_error() {
        let bytes = br#"{"type":"UserRegistered","created_at":0,"payload":{"ItemID":"x"}}"#;
        let envelope = Envelope::decode(bytes).unwrap();

        assert!(matches!(
            envelope.payload::<User>(),
            Err(ChainError::Decoding(_))
        ));
        assert!(matches!(
            Payload::from_envelope(&envelope),
            Err(ChainError::Decoding(_))
        ));
    }

    #[test]
    fn every_payload_variant_survives_the_wire() {
        let samples = [
            Payload::UserRegistered(User {
                id: 1,
                name: "Ada Lovelace".into(),
                age: 36,
            }),
            Payload::ItemCreated(Item {
                id: 2,
                title: "Volvo XC60 2020".into(),
                manufacturer: "Volvo".into(),
                origin: "Sweden".into(),
            }),
            Payload::ItemViewed(ItemViewedPayload {
                item_id: 2,
                user_id: 1,
            }),
            Payload::ItemPurchased(ItemPurchasedPayload {
                item_id: 2,
                user_id: 1,
                quantity: 3,
            }),
            Payload::ItemDropped(ItemDroppedPayload {
                item_id: 2,
                user_id: 1,
                quantity: 5,
            }),
            Payload::ItemDelivered(ItemDeliveredPayload {
                item_id: 2,
                user_id: 1,
                address: "1 Main Street, Oslo, Norway".into(),
            }),
            Payload::ItemNotDelivered(ItemNotDeliveredPayload {
                item_id: 2,
                user_id: 1,
                address: "1 Main Street, Oslo, Norway".into(),
                reason: "fake".into(),
            }),
        ];

        for payload in samples {
            let bytes = Envelope::from_payload(&payload).unwrap().encode().unwrap();

            let (event_type, _) = decode(&bytes).unwrap();
            assert_eq!(event_type, payload.event_type());

            let envelope = Envelope::decode(&bytes).unwrap();
            assert_eq!(Payload::from_envelope(&envelope).unwrap(), payload);
        }
    }
}
