mod common;
mod rabbitmq_tests;
mod redis_tests;
