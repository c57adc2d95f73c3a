//! Sending side of the hybrid transport.
//!
//! Each payload becomes exactly one queue message. A serialized data
//! message smaller than the overflow threshold goes to the queue as is;
//! anything at or above it is uploaded to the blob container first and the
//! queue receives a small [`ReferenceRecord`] pointing at the blob.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sluice_codec::Codec;
use sluice_types::{Envelope, MessageId, ReferenceId, ReferenceRecord};
use tracing::{debug, info, warn};

use crate::blob::BlobStore;
use crate::channel::QueueChannel;
use crate::clock::{Clock, SystemClock};
use crate::codec::WireCodec;
use crate::config::TransportConfig;
use crate::error::{SendFailure, TransportError, TransportResult};

/// How a payload reached the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    /// The whole data message went to the queue.
    Inline,
    /// The data message went to a blob; the queue got a reference to it.
    Overflow { reference_id: ReferenceId },
}

/// Report for one delivered payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    pub message_id: MessageId,
    pub contract: String,
    /// Size in bytes of the serialized data message.
    pub size: usize,
    pub route: Route,
}

impl Delivery {
    pub fn is_overflow(&self) -> bool {
        matches!(self.route, Route::Overflow { .. })
    }
}

/// Writes payloads to a queue, spilling oversized ones to blob storage.
pub struct HybridWriter<C> {
    config: TransportConfig,
    codec: Arc<C>,
    queue: Arc<dyn QueueChannel>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl<C: Codec> HybridWriter<C> {
    /// Create a writer. Fails if the configuration is invalid or the
    /// threshold exceeds what the queue accepts.
    pub fn new(
        config: TransportConfig,
        codec: Arc<C>,
        queue: Arc<dyn QueueChannel>,
        blobs: Arc<dyn BlobStore>,
    ) -> TransportResult<Self> {
        config.validate()?;
        if config.overflow_threshold >= queue.max_message_size() {
            return Err(TransportError::InvalidConfig(format!(
                "overflow_threshold ({}) must be below the queue limit ({}) of {}",
                config.overflow_threshold,
                queue.max_message_size(),
                queue.address()
            )));
        }
        Ok(Self {
            config,
            codec,
            queue,
            blobs,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the creation-time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Provision the queue and the blob container. Idempotent.
    pub fn ensure_exists(&self) -> TransportResult<()> {
        self.queue.ensure_exists()?;
        self.blobs.ensure_exists()?;
        info!(
            queue = %self.queue.address(),
            container = %self.blobs.location(),
            "transport provisioned"
        );
        Ok(())
    }

    /// Send `payloads` in order, one queue message each.
    ///
    /// Stops at the first failure; [`SendFailure::delivered`] lists what
    /// reached the queue before it. Nothing is retried.
    pub fn send<T: Serialize + 'static>(
        &self,
        payloads: &[T],
    ) -> Result<Vec<Delivery>, SendFailure> {
        let mut delivered = Vec::with_capacity(payloads.len());
        let mut last_created: Option<DateTime<Utc>> = None;

        for payload in payloads {
            let now = self.clock.now();
            let created_at = match last_created {
                Some(prev) if prev > now => prev,
                _ => now,
            };
            last_created = Some(created_at);

            match self.deliver(payload, created_at) {
                Ok(delivery) => delivered.push(delivery),
                Err(error) => {
                    warn!(
                        queue = %self.queue.address(),
                        delivered = delivered.len(),
                        remaining = payloads.len() - delivered.len(),
                        error = %error,
                        "send aborted"
                    );
                    return Err(SendFailure { delivered, error });
                }
            }
        }
        Ok(delivered)
    }

    /// Send a single payload.
    pub fn send_one<T: Serialize + 'static>(&self, payload: &T) -> TransportResult<Delivery> {
        let created_at = self.clock.now();
        self.deliver(payload, created_at)
    }

    fn deliver<T: Serialize + 'static>(
        &self,
        payload: &T,
        created_at: DateTime<Utc>,
    ) -> TransportResult<Delivery> {
        let contract = self
            .codec
            .contract_name_of::<T>()
            .ok_or_else(|| TransportError::Configuration {
                type_name: std::any::type_name::<T>(),
                codec: self.codec.name().to_string(),
            })?
            .to_string();

        let message_id = MessageId::new();
        let envelope = Envelope::builder()
            .add_identity(message_id)
            .add_contract(contract.clone())
            .add_sender(self.queue.address())
            .add_created(created_at)
            .build()?;

        let message = WireCodec::encode_data(&envelope, |buf| {
            self.codec
                .serialize(payload, buf)
                .map_err(TransportError::from)
        })?;
        let size = message.len();

        if size < self.config.overflow_threshold {
            self.queue.push(&message)?;
            debug!(%message_id, %contract, size, "delivered inline");
            return Ok(Delivery {
                message_id,
                contract,
                size,
                route: Route::Inline,
            });
        }

        let reference_id =
            ReferenceId::compose(&self.config.reference_format, &created_at, &message_id)?;
        self.blobs.upload(&reference_id, &message)?;

        let record = ReferenceRecord::new(
            message_id,
            contract.clone(),
            self.blobs.location(),
            reference_id.clone(),
        );
        self.queue.push(&WireCodec::encode_reference(&record)?)?;
        debug!(
            %message_id,
            %contract,
            size,
            reference_id = %reference_id,
            "delivered via blob overflow"
        );

        Ok(Delivery {
            message_id,
            contract,
            size,
            route: Route::Overflow { reference_id },
        })
    }
}
