use std::time::Duration;

use housia_client::RabbitBroker;
use housia_core::job::Job;
use housia_core::traits::{Broker, Deliveries, Delivery};

use crate::integration::common::setup_broker;

const QUEUE: &str = "scraping_queue_test";

async fn next(deliveries: &mut Deliveries) -> Delivery {
    tokio::time::timeout(Duration::from_secs(10), deliveries.recv())
        .await
        .expect("No delivery within 10s")
        .expect("Consumer stream closed")
        .expect("Consumer failed")
}

#[tokio::test]
async fn published_job_is_consumed_intact() {
    let (broker, _config, _container) = setup_broker(QUEUE).await;
    let job = Job::new("https://example.com/house/1", 3);

    broker.publish(QUEUE, job.to_payload().unwrap()).await.unwrap();
    let mut deliveries = broker.consume(QUEUE, 3).await.unwrap();
    let delivery = next(&mut deliveries).await;

    assert_eq!(Job::parse(&delivery.body).unwrap(), job);
    assert!(!delivery.redelivered);
    broker.ack(delivery.tag).await.unwrap();
    broker.close().await.unwrap();
}

#[tokio::test]
async fn nack_with_requeue_redelivers() {
    let (broker, _config, _container) = setup_broker(QUEUE).await;
    broker.publish(QUEUE, b"{\"hello\":1}".to_vec()).await.unwrap();

    let mut deliveries = broker.consume(QUEUE, 1).await.unwrap();
    let first = next(&mut deliveries).await;
    broker.nack(first.tag, true).await.unwrap();

    let second = next(&mut deliveries).await;
    assert_eq!(second.body, first.body);
    assert!(second.redelivered);
    broker.ack(second.tag).await.unwrap();
}

#[tokio::test]
async fn nack_without_requeue_drops_the_message() {
    let (broker, _config, _container) = setup_broker(QUEUE).await;
    broker.publish(QUEUE, b"garbage".to_vec()).await.unwrap();
    broker.publish(QUEUE, b"second".to_vec()).await.unwrap();

    let mut deliveries = broker.consume(QUEUE, 1).await.unwrap();
    let poison = next(&mut deliveries).await;
    broker.nack(poison.tag, false).await.unwrap();

    let following = next(&mut deliveries).await;
    assert_eq!(following.body, b"second");
    assert!(!following.redelivered);
}

#[tokio::test]
async fn concurrent_publishes_from_clones_all_land() {
    let (broker, _config, _container) = setup_broker(QUEUE).await;

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let broker = broker.clone();
            tokio::spawn(async move {
                let job = Job::new(format!("https://example.com/house/{i}"), 3);
                broker.publish(QUEUE, job.to_payload().unwrap()).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut deliveries = broker.consume(QUEUE, 20).await.unwrap();
    let mut urls = Vec::new();
    for _ in 0..20 {
        let delivery = next(&mut deliveries).await;
        urls.push(Job::parse(&delivery.body).unwrap().url);
        broker.ack(delivery.tag).await.unwrap();
    }
    urls.sort();
    urls.dedup();
    assert_eq!(urls.len(), 20);
}

#[tokio::test]
async fn unacked_message_survives_a_new_connection() {
    let (broker, config, _container) = setup_broker(QUEUE).await;
    let job = Job::new("https://example.com/house/7", 3);
    broker.publish(QUEUE, job.to_payload().unwrap()).await.unwrap();

    let mut deliveries = broker.consume(QUEUE, 1).await.unwrap();
    let _unacked = next(&mut deliveries).await;
    drop(deliveries);
    broker.close().await.unwrap();

    let reconnected = RabbitBroker::connect(&config).await.unwrap();
    let mut deliveries = reconnected.consume(QUEUE, 1).await.unwrap();
    let again = next(&mut deliveries).await;

    assert_eq!(Job::parse(&again.body).unwrap(), job);
    assert!(again.redelivered);
}

#[tokio::test]
async fn commands_after_close_are_connection_errors() {
    let (broker, _config, _container) = setup_broker(QUEUE).await;

    broker.close().await.unwrap();

    let err = broker.publish(QUEUE, b"late".to_vec()).await.unwrap_err();
    assert!(err.is_fatal());
}
