use std::sync::Arc;
use std::time::Duration;

use subhub::config::Settings;
use subhub::utils::logging;
use subhub::{Broker, BrokerError, BrokerOptions, Directory, Subscriber, Topic};

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Text(&'static str),
    Tick(u32),
}

fn directory() -> Arc<Directory<Event>> {
    logging::init("warn");
    Arc::new(Directory::new())
}

#[tokio::test]
async fn news_reaches_every_subscriber_and_nobody_else() {
    let directory = directory();
    let p = Broker::start(BrokerOptions::new().name("P"), &directory).unwrap();

    let (h1, mut m1) = Subscriber::channel();
    let (h2, mut m2) = Subscriber::channel();
    let (h3, mut m3) = Subscriber::channel();
    p.subscribe("news", &h1).await.unwrap();
    p.subscribe("news", &h2).await.unwrap();
    p.subscribe("weather", &h3).await.unwrap();

    p.publish("news", Event::Text("hello")).unwrap();

    assert_eq!(m1.recv().await, Some(Event::Text("hello")));
    assert_eq!(m2.recv().await, Some(Event::Text("hello")));
    assert!(m3.try_recv().is_err());
}

#[tokio::test]
async fn per_caller_order_is_preserved() {
    let directory = directory();
    let p = Broker::start(BrokerOptions::new().name("ordered"), &directory).unwrap();
    let (h, mut m) = Subscriber::channel();

    p.subscribe("x", &h).await.unwrap();
    for i in 0..100 {
        p.publish("x", Event::Tick(i)).unwrap();
    }
    p.unsubscribe("x", &h).await.unwrap();
    p.publish("x", Event::Tick(100)).unwrap();

    for i in 0..100 {
        assert_eq!(m.recv().await, Some(Event::Tick(i)));
    }
    assert!(m.try_recv().is_err());
}

#[tokio::test]
async fn topics_reflect_live_subscriptions() {
    let directory = directory();
    let p = Broker::start(BrokerOptions::new().name("listing"), &directory).unwrap();
    let (h1, _m1) = Subscriber::channel();

    p.subscribe("a", &h1).await.unwrap();
    p.subscribe("b", &h1).await.unwrap();
    let mut topics = p.topics().await.unwrap();
    topics.sort();
    assert_eq!(topics, vec![Topic::from("a"), Topic::from("b")]);

    p.unsubscribe("a", &h1).await.unwrap();
    assert_eq!(p.topics().await.unwrap(), vec![Topic::from("b")]);
}

#[tokio::test]
async fn subscriber_task_exit_cleans_up_subscriptions() {
    let directory = directory();
    let p = Broker::start(BrokerOptions::new().name("liveness"), &directory).unwrap();
    let (h, mut mailbox) = Subscriber::channel();

    for topic in ["t1", "t2", "t3"] {
        p.subscribe(topic, &h).await.unwrap();
    }

    // the subscriber task consumes one message and then exits, dropping its mailbox
    let worker = tokio::spawn(async move { mailbox.recv().await });
    p.publish("t2", Event::Text("last")).unwrap();
    assert_eq!(worker.await.unwrap(), Some(Event::Text("last")));

    let cleaned = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if p.topics().await.unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(cleaned.is_ok(), "terminated subscriber kept its topics");
    for topic in ["t1", "t2", "t3"] {
        assert!(p.subscribers(topic).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn brokers_with_distinct_names_do_not_share_state() {
    let directory = directory();
    let a = Broker::start(BrokerOptions::new().name("A"), &directory).unwrap();
    let b = Broker::start(BrokerOptions::new().name("B"), &directory).unwrap();
    let (h, _m) = Subscriber::channel();

    a.subscribe("T", &h).await.unwrap();
    assert_eq!(a.subscribers("T").await.unwrap(), vec![h.clone()]);
    assert!(b.subscribers("T").await.unwrap().is_empty());
}

#[tokio::test]
async fn settings_drive_broker_options() {
    let directory = directory();
    let mut settings = Settings::default();
    settings.broker.name = "configured".to_string();
    settings.broker.registry_partitions = Some(2);

    let broker = Broker::start(BrokerOptions::from(&settings.broker), &directory).unwrap();
    assert_eq!(broker.name(), "configured");
    assert_eq!(broker.registry_identity(), "configured.registry");
    assert_eq!(broker.partitions(), 2);

    let again = Broker::start(BrokerOptions::from(&settings.broker), &directory);
    assert!(matches!(again, Err(BrokerError::StartFailure { .. })));
}

#[tokio::test]
async fn callers_bound_their_own_waits() {
    let directory = directory();
    let p = Broker::start(BrokerOptions::new().name("bounded"), &directory).unwrap();

    let topics = tokio::time::timeout(Duration::from_millis(500), p.topics())
        .await
        .expect("broker did not answer in time")
        .unwrap();
    assert!(topics.is_empty());
}
