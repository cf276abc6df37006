mod consumer;
mod publisher;
mod rabbit;

pub use consumer::{remove_audio_file, ConsumerError, HandlerError, MessageHandler, QueueConsumer};
pub use publisher::{PublisherError, RetryPublisher};
pub use rabbit::{build_pool, retry_queue_name, Pool, RabbitError, RETRY_TTL_MS};
