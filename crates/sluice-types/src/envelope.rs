//! Message envelope: the metadata attached to every outbound message.
//!
//! An [`Envelope`] is an ordered set of [`MessageAttribute`]s. The four
//! well-known attributes (identity, contract, sender, creation time) are
//! mandatory and appear exactly once; any number of custom attributes may
//! follow. Envelopes are assembled through [`EnvelopeBuilder`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::message_id::MessageId;

/// A single envelope attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageAttribute {
    /// Unique identity of the logical send.
    Identity(MessageId),
    /// Stable contract name of the payload type.
    Contract(String),
    /// Address of the endpoint that composed the message.
    Sender(String),
    /// Wall-clock composition time.
    CreatedUtc(DateTime<Utc>),
    /// Application-defined attribute.
    Custom { key: String, value: String },
}

/// Validated set of message attributes.
///
/// Serialized as its attribute list; decoding re-applies the same checks as
/// [`EnvelopeBuilder::build`], so every `Envelope` value is well formed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MessageAttribute>", into = "Vec<MessageAttribute>")]
pub struct Envelope {
    message_id: MessageId,
    contract: String,
    sender: String,
    created_at: DateTime<Utc>,
    custom: Vec<(String, String)>,
}

impl Envelope {
    /// Start building an envelope.
    pub fn builder() -> EnvelopeBuilder {
        EnvelopeBuilder::default()
    }

    /// All attributes, well-known ones first.
    pub fn attributes(&self) -> Vec<MessageAttribute> {
        self.clone().into()
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Look up a custom attribute by key.
    pub fn custom(&self, key: &str) -> Option<&str> {
        self.custom
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl TryFrom<Vec<MessageAttribute>> for Envelope {
    type Error = TypeError;

    fn try_from(attributes: Vec<MessageAttribute>) -> Result<Self, Self::Error> {
        fn set<T>(slot: &mut Option<T>, value: T, name: &'static str) -> Result<(), TypeError> {
            if slot.replace(value).is_some() {
                return Err(TypeError::DuplicateAttribute(name));
            }
            Ok(())
        }

        let mut message_id = None;
        let mut contract = None;
        let mut sender = None;
        let mut created_at = None;
        let mut custom = Vec::new();
        for attribute in attributes {
            match attribute {
                MessageAttribute::Identity(id) => set(&mut message_id, id, "identity")?,
                MessageAttribute::Contract(c) => set(&mut contract, c, "contract")?,
                MessageAttribute::Sender(s) => set(&mut sender, s, "sender")?,
                MessageAttribute::CreatedUtc(t) => set(&mut created_at, t, "created")?,
                MessageAttribute::Custom { key, value } => custom.push((key, value)),
            }
        }

        Ok(Self {
            message_id: message_id.ok_or(TypeError::MissingAttribute("identity"))?,
            contract: contract.ok_or(TypeError::MissingAttribute("contract"))?,
            sender: sender.ok_or(TypeError::MissingAttribute("sender"))?,
            created_at: created_at.ok_or(TypeError::MissingAttribute("created"))?,
            custom,
        })
    }
}

impl From<Envelope> for Vec<MessageAttribute> {
    fn from(envelope: Envelope) -> Self {
        let mut attributes = vec![
            MessageAttribute::Identity(envelope.message_id),
            MessageAttribute::Contract(envelope.contract),
            MessageAttribute::Sender(envelope.sender),
            MessageAttribute::CreatedUtc(envelope.created_at),
        ];
        attributes.extend(
            envelope
                .custom
                .into_iter()
                .map(|(key, value)| MessageAttribute::Custom { key, value }),
        );
        attributes
    }
}

/// Accumulates attributes and produces a validated [`Envelope`].
#[derive(Clone, Debug, Default)]
pub struct EnvelopeBuilder {
    attributes: Vec<MessageAttribute>,
}

impl EnvelopeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_identity(mut self, id: MessageId) -> Self {
        self.attributes.push(MessageAttribute::Identity(id));
        self
    }

    pub fn add_contract(mut self, contract: impl Into<String>) -> Self {
        self.attributes.push(MessageAttribute::Contract(contract.into()));
        self
    }

    pub fn add_sender(mut self, sender: impl Into<String>) -> Self {
        self.attributes.push(MessageAttribute::Sender(sender.into()));
        self
    }

    pub fn add_created(mut self, created: DateTime<Utc>) -> Self {
        self.attributes.push(MessageAttribute::CreatedUtc(created));
        self
    }

    pub fn add_custom(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(MessageAttribute::Custom {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Finish the envelope, failing if a mandatory attribute is missing or
    /// repeated.
    pub fn build(self) -> Result<Envelope, TypeError> {
        Envelope::try_from(self.attributes)
    }
}
