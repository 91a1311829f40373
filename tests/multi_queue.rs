mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{config_for, MockRedis};
use redis_multiqueue::config::PoolConfig;
use redis_multiqueue::{MultiQueue, Queue, RedisPool};

#[tokio::test]
async fn test_push_then_pop_across_two_backends() {
    let a = MockRedis::start().await;
    let b = MockRedis::start().await;
    let queue = MultiQueue::connect(&config_for(&[a.address(), b.address()]))
        .await
        .unwrap();

    queue.push("a").await.unwrap();
    queue.push("b").await.unwrap();
    assert_eq!(queue.length().await.unwrap(), 2);

    let mut popped = HashSet::new();
    while popped.len() < 2 {
        if let Some(value) = queue.pop(1).await.unwrap() {
            popped.insert(value);
        }
    }
    assert_eq!(popped, HashSet::from(["a".to_string(), "b".to_string()]));
    assert_eq!(queue.length().await.unwrap(), 0);

    queue.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_order_is_fifo_per_backend() {
    let a = MockRedis::start().await;
    let b = MockRedis::start().await;
    let queue = MultiQueue::connect(&config_for(&[a.address(), b.address()]))
        .await
        .unwrap();

    for i in 0..20 {
        queue.push(&format!("{:02}", i)).await.unwrap();
    }

    let on_a = a.list("jobs");
    let on_b = b.list("jobs");
    assert_eq!(on_a.len() + on_b.len(), 20);
    for list in [&on_a, &on_b] {
        let mut sorted = list.clone();
        sorted.sort();
        assert_eq!(list, &sorted);
    }
}

#[tokio::test]
async fn test_pop_on_empty_queue_times_out() {
    let a = MockRedis::start().await;
    let queue = MultiQueue::connect(&config_for(&[a.address()])).await.unwrap();

    let started = Instant::now();
    assert_eq!(queue.pop(1).await.unwrap(), None);
    assert!(started.elapsed() >= Duration::from_millis(900));

    // An empty pop is not a failure.
    let status = queue.status().await;
    assert_eq!(status[0].error_score, 0.0);
    assert!(status[0].healthy);
}

#[tokio::test]
async fn test_blocked_pop_receives_later_push() {
    let a = MockRedis::start().await;
    let queue = Arc::new(MultiQueue::connect(&config_for(&[a.address()])).await.unwrap());

    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.pop(5).await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    queue.push("late").await.unwrap();

    let value = waiter.await.unwrap().unwrap();
    assert_eq!(value, Some("late".to_string()));
}

#[tokio::test]
async fn test_database_index_in_address() {
    let a = MockRedis::start().await;
    let address = format!("{}/2", a.address());
    let queue = MultiQueue::connect(&config_for(&[address.as_str()])).await.unwrap();

    queue.push("x").await.unwrap();
    assert_eq!(a.list("jobs"), vec!["x"]);
    assert_eq!(queue.status().await[0].id, address);
}

#[tokio::test]
async fn test_single_backend_queue() {
    let a = MockRedis::start().await;
    let pool = RedisPool::new(a.address().parse().unwrap(), PoolConfig::default());
    let queue = Queue::new(Arc::new(pool), "single");

    queue.push("1").await.unwrap();
    queue.push("2").await.unwrap();
    assert_eq!(queue.length().await.unwrap(), 2);
    assert_eq!(queue.pop(1).await.unwrap(), Some("1".to_string()));
    assert_eq!(queue.pop(1).await.unwrap(), Some("2".to_string()));
    assert_eq!(queue.pop(1).await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_producers() {
    let a = MockRedis::start().await;
    let b = MockRedis::start().await;
    let queue = Arc::new(
        MultiQueue::connect(&config_for(&[a.address(), b.address()]))
            .await
            .unwrap(),
    );

    let mut producers = Vec::new();
    for i in 0..40 {
        let queue = queue.clone();
        producers.push(tokio::spawn(async move {
            queue.push(&i.to_string()).await.unwrap();
        }));
    }
    for producer in producers {
        producer.await.unwrap();
    }
    assert_eq!(queue.length().await.unwrap(), 40);

    let mut stored: Vec<String> = a.list("jobs");
    stored.extend(b.list("jobs"));
    let stored: HashSet<String> = stored.into_iter().collect();
    assert_eq!(stored, (0..40).map(|i| i.to_string()).collect::<HashSet<_>>());
}
