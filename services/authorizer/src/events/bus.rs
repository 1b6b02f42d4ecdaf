//! Event bus boundary.
//!
//! The broker itself is an external collaborator; [`MemoryQueue`] provides
//! at-least-once semantics in-process for local runs and tests.
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: u64,
    pub topic: String,
    pub payload: Vec<u8>,
    /// 1 on first delivery, incremented on every redelivery.
    pub attempt: u32,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<u64>;
    /// Up to `max` messages ready on `topic`. Returned messages stay leased
    /// until acked or nacked.
    async fn poll(&self, topic: &str, max: usize) -> anyhow::Result<Vec<Message>>;
    async fn ack(&self, message: &Message) -> anyhow::Result<()>;
    /// Give the message back for redelivery.
    async fn nack(&self, message: &Message) -> anyhow::Result<()>;
}

#[derive(Debug, Default)]
struct TopicQueue {
    ready: VecDeque<Message>,
    leased: HashMap<u64, Message>,
    acked: u64,
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    topics: Mutex<HashMap<String, TopicQueue>>,
    next_id: AtomicU64,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages waiting for delivery on `topic`.
    pub async fn ready(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |queue| queue.ready.len())
    }

    /// Messages delivered but neither acked nor nacked yet.
    pub async fn leased(&self, topic: &str) -> usize {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |queue| queue.leased.len())
    }

    pub async fn acked(&self, topic: &str) -> u64 {
        self.topics
            .lock()
            .await
            .get(topic)
            .map_or(0, |queue| queue.acked)
    }
}

#[async_trait]
impl MessageQueue for MemoryQueue {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> anyhow::Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.topics
            .lock()
            .await
            .entry(topic.to_string())
            .or_default()
            .ready
            .push_back(Message {
                id,
                topic: topic.to_string(),
                payload,
                attempt: 0,
            });
        Ok(id)
    }

    async fn poll(&self, topic: &str, max: usize) -> anyhow::Result<Vec<Message>> {
        let mut topics = self.topics.lock().await;
        let Some(queue) = topics.get_mut(topic) else {
            return Ok(Vec::new());
        };
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(mut message) = queue.ready.pop_front() else {
                break;
            };
            message.attempt += 1;
            queue.leased.insert(message.id, message.clone());
            batch.push(message);
        }
        Ok(batch)
    }

    async fn ack(&self, message: &Message) -> anyhow::Result<()> {
        let mut topics = self.topics.lock().await;
        if let Some(queue) = topics.get_mut(&message.topic) {
            if queue.leased.remove(&message.id).is_some() {
                queue.acked += 1;
            }
        }
        Ok(())
    }

    async fn nack(&self, message: &Message) -> anyhow::Result<()> {
        let mut topics = self.topics.lock().await;
        if let Some(queue) = topics.get_mut(&message.topic) {
            if let Some(leased) = queue.leased.remove(&message.id) {
                queue.ready.push_back(leased);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn nacked_messages_are_redelivered_with_higher_attempt() {
        let queue = MemoryQueue::new();
        queue.publish("t", b"one".to_vec()).await.expect("publish");
        queue.publish("t", b"two".to_vec()).await.expect("publish");

        let first = queue.poll("t", 1).await.expect("poll");
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].attempt, 1);
        assert_eq!(queue.leased("t").await, 1);

        queue.nack(&first[0]).await.expect("nack");
        let rest = queue.poll("t", 10).await.expect("poll");
        assert_eq!(rest.len(), 2);
        assert_eq!(rest[0].payload, b"two".to_vec());
        assert_eq!(rest[1].attempt, 2);

        for message in &rest {
            queue.ack(message).await.expect("ack");
        }
        assert_eq!(queue.ready("t").await, 0);
        assert_eq!(queue.leased("t").await, 0);
        assert_eq!(queue.acked("t").await, 2);
    }

    #[tokio::test]
    async fn unknown_topic_polls_empty() {
        let queue = MemoryQueue::new();
        assert!(queue.poll("nothing", 5).await.expect("poll").is_empty());
    }
}
