use housia_client::{BrokerConfig, RabbitBroker, RedisStatusStore, StatusStoreConfig};
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, GenericImage};

const MAX_RETRIES: u32 = 30;

/// Spins up a RabbitMQ container and returns a connected broker.
///
/// The `ContainerAsync` must be kept in scope for the test duration;
/// dropping it stops the container.
pub async fn setup_broker(queue: &str) -> (RabbitBroker, BrokerConfig, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("rabbitmq", "3.13-alpine")
        .with_exposed_port(ContainerPort::Tcp(5672))
        .with_wait_for(WaitFor::message_on_stdout("Server startup complete"))
        .start()
        .await
        .expect("Failed to start RabbitMQ container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(5672)
        .await
        .expect("Failed to get port");

    let config = BrokerConfig::new(format!("amqp://guest:guest@{host}:{port}/%2f")).with_queue(queue);

    // Retry connection until the AMQP listener accepts clients
    let mut retries = 0;
    let broker = loop {
        match RabbitBroker::connect(&config).await {
            Ok(broker) => break broker,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to RabbitMQ after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(200)).await;
            }
        }
    };

    (broker, config, container)
}

/// Spins up a Redis container and returns a connected status store.
pub async fn setup_status_store() -> (RedisStatusStore, ContainerAsync<GenericImage>) {
    let container = GenericImage::new("redis", "7-alpine")
        .with_exposed_port(ContainerPort::Tcp(6379))
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await
        .expect("Failed to start Redis container");

    let host = container.get_host().await.expect("Failed to get host");
    let port = container
        .get_host_port_ipv4(6379)
        .await
        .expect("Failed to get port");

    let config = StatusStoreConfig {
        url: format!("redis://{host}:{port}"),
    };

    let mut retries = 0;
    let store = loop {
        match RedisStatusStore::connect(&config).await {
            Ok(store) => break store,
            Err(e) => {
                retries += 1;
                if retries >= MAX_RETRIES {
                    panic!("Failed to connect to Redis after {MAX_RETRIES} retries: {e}");
                }
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    };

    (store, container)
}
