use std::collections::HashSet;

use futures::StreamExt;
use housia_core::AppError;
use housia_core::traits::{Broker, Deliveries, Delivery};
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::{Confirmation, PublisherConfirm};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use tokio::sync::{mpsc, oneshot};

use crate::config::BrokerConfig;

const COMMAND_BUFFER: usize = 64;
const DELIVERY_BUFFER: usize = 64;
/// AMQP delivery mode for messages that survive a broker restart.
const PERSISTENT: u8 = 2;

type Reply<T> = oneshot::Sender<Result<T, AppError>>;

/// Command sent to the task owning the channel.
enum BrokerCommand {
    Publish {
        queue: String,
        payload: Vec<u8>,
        reply: Reply<PublisherConfirm>,
    },
    Consume {
        queue: String,
        prefetch: u16,
        reply: Reply<Deliveries>,
    },
    Ack {
        tag: u64,
        reply: Reply<()>,
    },
    Nack {
        tag: u64,
        requeue: bool,
        reply: Reply<()>,
    },
    Close {
        reply: Reply<()>,
    },
}

/// Handle to a RabbitMQ connection with a single channel.
///
/// One task owns the channel and runs every operation in arrival order;
/// clones of this handle only send it commands. Publisher confirms are
/// awaited by the caller, outside the owner task.
#[derive(Clone)]
pub struct RabbitBroker {
    commands: mpsc::Sender<BrokerCommand>,
}

impl RabbitBroker {
    /// Connect, enable publisher confirms and declare the configured queue.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, AppError> {
        let connection = Connection::connect(&config.url, ConnectionProperties::default())
            .await
            .map_err(broker_error("Failed to connect"))?;
        let channel = connection
            .create_channel()
            .await
            .map_err(broker_error("Failed to open channel"))?;
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(broker_error("Failed to enable publisher confirms"))?;

        let mut owner = ChannelOwner {
            connection,
            channel,
            declared: HashSet::new(),
            consumers: 0,
        };
        owner.declare(&config.queue).await?;

        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(owner.run(rx));

        tracing::info!(queue = %config.queue, "Connected to RabbitMQ");
        Ok(Self { commands: tx })
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> BrokerCommand,
    ) -> Result<T, AppError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| closed())?;
        response.await.map_err(|_| closed())?
    }
}

impl Broker for RabbitBroker {
    async fn publish(&self, queue: &str, payload: Vec<u8>) -> Result<(), AppError> {
        let confirm = self
            .request(|reply| BrokerCommand::Publish {
                queue: queue.to_string(),
                payload,
                reply,
            })
            .await?;

        match confirm
            .await
            .map_err(broker_error("Publisher confirm failed"))?
        {
            Confirmation::Nack(_) => Err(AppError::ConnectionError(format!(
                "Broker rejected message for queue {queue}"
            ))),
            _ => Ok(()),
        }
    }

    async fn consume(&self, queue: &str, prefetch: u16) -> Result<Deliveries, AppError> {
        self.request(|reply| BrokerCommand::Consume {
            queue: queue.to_string(),
            prefetch,
            reply,
        })
        .await
    }

    async fn ack(&self, tag: u64) -> Result<(), AppError> {
        self.request(|reply| BrokerCommand::Ack { tag, reply }).await
    }

    async fn nack(&self, tag: u64, requeue: bool) -> Result<(), AppError> {
        self.request(|reply| BrokerCommand::Nack {
            tag,
            requeue,
            reply,
        })
        .await
    }

    async fn close(&self) -> Result<(), AppError> {
        self.request(|reply| BrokerCommand::Close { reply }).await
    }
}

struct ChannelOwner {
    connection: Connection,
    channel: Channel,
    declared: HashSet<String>,
    consumers: usize,
}

impl ChannelOwner {
    async fn run(mut self, mut commands: mpsc::Receiver<BrokerCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                BrokerCommand::Publish {
                    queue,
                    payload,
                    reply,
                } => {
                    let _ = reply.send(self.publish(&queue, &payload).await);
                }
                BrokerCommand::Consume {
                    queue,
                    prefetch,
                    reply,
                } => {
                    let _ = reply.send(self.consume(&queue, prefetch).await);
                }
                BrokerCommand::Ack { tag, reply } => {
                    let result = self
                        .channel
                        .basic_ack(tag, BasicAckOptions::default())
                        .await
                        .map_err(broker_error("Failed to ack"));
                    let _ = reply.send(result);
                }
                BrokerCommand::Nack {
                    tag,
                    requeue,
                    reply,
                } => {
                    let result = self
                        .channel
                        .basic_nack(
                            tag,
                            BasicNackOptions {
                                requeue,
                                ..Default::default()
                            },
                        )
                        .await
                        .map_err(broker_error("Failed to nack"));
                    let _ = reply.send(result);
                }
                BrokerCommand::Close { reply } => {
                    let _ = reply.send(self.close().await);
                    break;
                }
            }
        }
        tracing::debug!("RabbitMQ channel owner stopped");
    }

    /// Declare `queue` durable, once per queue name.
    async fn declare(&mut self, queue: &str) -> Result<(), AppError> {
        if self.declared.contains(queue) {
            return Ok(());
        }
        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(broker_error("Failed to declare queue"))?;
        self.declared.insert(queue.to_string());
        Ok(())
    }

    async fn publish(&mut self, queue: &str, payload: &[u8]) -> Result<PublisherConfirm, AppError> {
        self.declare(queue).await?;
        self.channel
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default()
                    .with_delivery_mode(PERSISTENT)
                    .with_content_type("application/json".into()),
            )
            .await
            .map_err(broker_error("Failed to publish"))
    }

    async fn consume(&mut self, queue: &str, prefetch: u16) -> Result<Deliveries, AppError> {
        self.declare(queue).await?;
        self.channel
            .basic_qos(prefetch, BasicQosOptions::default())
            .await
            .map_err(broker_error("Failed to set prefetch"))?;

        self.consumers += 1;
        let consumer_tag = format!("housia-consumer-{}", self.consumers);
        let consumer = self
            .channel
            .basic_consume(
                queue,
                &consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await
            .map_err(broker_error("Failed to start consumer"))?;

        let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
        tokio::spawn(forward(consumer, tx));

        tracing::info!(%queue, %prefetch, %consumer_tag, "Consuming queue");
        Ok(rx)
    }

    async fn close(&mut self) -> Result<(), AppError> {
        self.channel
            .close(200, "OK")
            .await
            .map_err(broker_error("Failed to close channel"))?;
        self.connection
            .close(200, "OK")
            .await
            .map_err(broker_error("Failed to close connection"))?;
        tracing::info!("RabbitMQ connection closed");
        Ok(())
    }
}

/// Pump consumer deliveries into the receiver handed to the worker.
///
/// Stops after the first stream error or once the receiver is dropped.
async fn forward(mut consumer: Consumer, deliveries: mpsc::Sender<Result<Delivery, AppError>>) {
    while let Some(next) = consumer.next().await {
        let item = next
            .map(|d| Delivery {
                tag: d.delivery_tag,
                body: d.data,
                redelivered: d.redelivered,
            })
            .map_err(broker_error("Consumer failed"));
        let failed = item.is_err();

        if deliveries.send(item).await.is_err() || failed {
            break;
        }
    }
}

fn broker_error(context: &'static str) -> impl Fn(lapin::Error) -> AppError {
    move |e| AppError::ConnectionError(format!("{context}: {e}"))
}

fn closed() -> AppError {
    AppError::ConnectionError("Broker connection is closed".into())
}
