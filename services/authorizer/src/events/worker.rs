//! Per-topic consumer loops.
//!
//! Each topic gets its own task. A task polls while it has free permits
//! (`max_in_flight`), runs every message on its own task under the handler
//! timeout, and acks or nacks according to [`disposition`]. A handler panic is
//! caught and treated as an internal failure, so the message is redelivered.
//! Flipping the shutdown signal stops polling; handlers already running finish
//! first.
use super::bus::{Message, MessageQueue};
use super::handlers::{EventError, EventHandler};
use super::retry::{Disposition, disposition};
use crate::config::ConsumerConfig;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Start one consumer per topic. Each handle resolves once its consumer has
/// drained after shutdown.
pub fn spawn_consumers(
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn EventHandler>,
    topics: &[&str],
    config: ConsumerConfig,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    topics
        .iter()
        .map(|topic| {
            tokio::spawn(consume_topic(
                topic.to_string(),
                queue.clone(),
                handler.clone(),
                config.clone(),
                shutdown.clone(),
            ))
        })
        .collect()
}

async fn consume_topic(
    topic: String,
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn EventHandler>,
    config: ConsumerConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let permits = Arc::new(Semaphore::new(config.max_in_flight.max(1)));
    let mut in_flight = JoinSet::new();
    tracing::info!(%topic, max_in_flight = config.max_in_flight, "event consumer started");

    while !*shutdown.borrow() {
        while let Some(joined) = in_flight.try_join_next() {
            log_join_error(&topic, joined);
        }

        let free = permits.available_permits();
        if free == 0 {
            tokio::select! {
                joined = in_flight.join_next() => {
                    if let Some(joined) = joined {
                        log_join_error(&topic, joined);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let batch = match queue.poll(&topic, free).await {
            Ok(batch) => batch,
            Err(err) => {
                tracing::warn!(%topic, error = %err, "event poll failed");
                Vec::new()
            }
        };
        if batch.is_empty() {
            tokio::select! {
                _ = tokio::time::sleep(config.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        for message in batch {
            // Cannot fail: the batch never exceeds the free permits and the
            // semaphore is never closed.
            let Ok(permit) = permits.clone().try_acquire_owned() else {
                if let Err(err) = queue.nack(&message).await {
                    tracing::warn!(%topic, error = %err, "event nack failed");
                }
                continue;
            };
            in_flight.spawn(process(
                queue.clone(),
                handler.clone(),
                config.clone(),
                message,
                permit,
            ));
        }
    }

    let draining = in_flight.len();
    while let Some(joined) = in_flight.join_next().await {
        log_join_error(&topic, joined);
    }
    tracing::info!(%topic, drained = draining, "event consumer stopped");
}

async fn process(
    queue: Arc<dyn MessageQueue>,
    handler: Arc<dyn EventHandler>,
    config: ConsumerConfig,
    message: Message,
    _permit: OwnedSemaphorePermit,
) {
    let guarded = AssertUnwindSafe(handler.handle(&message)).catch_unwind();
    let result = match tokio::time::timeout(config.handler_timeout, guarded).await {
        Ok(Ok(result)) => result,
        Ok(Err(panic)) => Err(EventError::Panicked(panic_message(panic.as_ref())).into()),
        Err(_) => Err(EventError::Timeout(config.handler_timeout).into()),
    };

    let outcome = match result {
        Ok(()) => {
            ack(queue.as_ref(), &message).await;
            "applied"
        }
        Err(err) => {
            let verdict = disposition(&err);
            match verdict {
                Disposition::Ack => {
                    tracing::warn!(
                        topic = %message.topic,
                        message_id = message.id,
                        error = %err,
                        "event rejected"
                    );
                    ack(queue.as_ref(), &message).await;
                }
                Disposition::Redeliver => {
                    tracing::error!(
                        topic = %message.topic,
                        message_id = message.id,
                        attempt = message.attempt,
                        error = %err,
                        "event failed, redelivering"
                    );
                    if let Err(err) = queue.nack(&message).await {
                        tracing::warn!(topic = %message.topic, error = %err, "event nack failed");
                    }
                }
            }
            verdict.as_str()
        }
    };
    metrics::counter!(
        "warden_events_total",
        "topic" => message.topic.clone(),
        "outcome" => outcome
    )
    .increment(1);
}

async fn ack(queue: &dyn MessageQueue, message: &Message) {
    if let Err(err) = queue.ack(message).await {
        tracing::warn!(topic = %message.topic, error = %err, "event ack failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn log_join_error(topic: &str, joined: Result<(), tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::error!(topic, error = %err, "event handler task failed");
    }
}
