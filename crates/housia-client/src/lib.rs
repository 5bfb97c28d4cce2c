pub mod config;
pub mod delegate;
pub mod rabbitmq;
pub mod redis_store;

pub use config::{BrokerConfig, DelegateConfig, StatusStoreConfig};
pub use delegate::HttpScrapeDelegate;
pub use rabbitmq::RabbitBroker;
pub use redis_store::RedisStatusStore;
