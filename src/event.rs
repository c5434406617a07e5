//! Event publishing: an at-least-once bus event per completed or failed
//! execution.

use async_trait::async_trait;
use rdkafka::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};

use crate::error::{CoreError, CoreResult};
use crate::model::ExecutionMetricsEvent;

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ExecutionMetricsEvent) -> CoreResult<()>;
}

/// Discards every event. Used by tests and by a Coordinator configured
/// without a bus.
pub struct NullPublisher;

#[async_trait]
impl EventPublisher for NullPublisher {
    async fn publish(&self, _event: &ExecutionMetricsEvent) -> CoreResult<()> {
        Ok(())
    }
}

/// Logs the event at info level instead of publishing it. Useful for local
/// runs and as the default when no bus is configured.
pub struct LoggingPublisher;

#[async_trait]
impl EventPublisher for LoggingPublisher {
    async fn publish(&self, event: &ExecutionMetricsEvent) -> CoreResult<()> {
        tracing::info!(
            execution_id = %event.execution_id,
            success = event.success,
            status = ?event.status,
            total_tests = event.total_tests,
            passed_tests = event.passed_tests,
            "execution metrics event"
        );
        Ok(())
    }
}

/// Publishes to a Kafka topic.
pub struct KafkaPublisher {
    producer: FutureProducer,
    topic: String,
}

impl KafkaPublisher {
    /// `bootstrap_servers` e.g. `"localhost:9092"`. Configures acks=all,
    /// snappy compression and bounded retries.
    pub fn new(bootstrap_servers: &str, topic: impl Into<String>) -> CoreResult<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers)
            .set("acks", "all")
            .set("compression.type", "snappy")
            .set("message.send.max.retries", "5")
            .create()
            .map_err(|e| CoreError::Infrastructure(format!("kafka producer init: {e}")))?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl EventPublisher for KafkaPublisher {
    async fn publish(&self, event: &ExecutionMetricsEvent) -> CoreResult<()> {
        let payload = serde_json::to_vec(event)
            .map_err(|e| CoreError::Infrastructure(format!("event serialization: {e}")))?;

        let record = FutureRecord::to(&self.topic)
            .key(&event.execution_id)
            .payload(&payload);

        self.producer
            .send(record, std::time::Duration::from_secs(5))
            .await
            .map_err(|(e, _)| CoreError::Infrastructure(format!("kafka publish: {e}")))?;

        Ok(())
    }
}
