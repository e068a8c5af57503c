//! End-to-end dispatch tests: ingress event to provider wire.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use herald::Dispatcher;
use herald_common::{Channel, DomainEvent, EventKind, Priority};
use herald_dispatch::{
    ChannelConfig, DeadLetterQueue, EmailHandlerService, HandlerEnv, MemoryQueue,
    NotificationQueue, SmsHandlerService,
};
use herald_provider::{
    EmailProviderConfig, MemoryEmailTransport, MemorySmsTransport, SmsProviderConfig,
};
use herald_status::{MemoryStatusStore, StatusStore};
use herald_subscriber::{
    MemorySubscriberStore, NotificationMethod, Schedule, SubscriberDraft, SubscriberStatus,
    SubscriberStore,
};
use serde_json::{Map, Value};

struct Stack {
    subscribers: Arc<MemorySubscriberStore>,
    status_store: Arc<MemoryStatusStore>,
    dead_letters: Arc<DeadLetterQueue>,
    email_transport: Arc<MemoryEmailTransport>,
    sms_transport: Arc<MemorySmsTransport>,
    email: EmailHandlerService,
    sms: SmsHandlerService,
    dispatcher: Dispatcher,
}

async fn stack() -> Stack {
    let subscribers = Arc::new(MemorySubscriberStore::new());
    let status_store = Arc::new(MemoryStatusStore::new());
    let dead_letters = Arc::new(DeadLetterQueue::new());
    let queue = Arc::new(MemoryQueue::new());
    let email_transport = Arc::new(MemoryEmailTransport::new());
    let sms_transport = Arc::new(MemorySmsTransport::new());

    let env = HandlerEnv {
        status_store: Arc::clone(&status_store) as Arc<dyn StatusStore>,
        dead_letters: Arc::clone(&dead_letters),
        audit: None,
        environment: "test".to_string(),
    };

    let mut email_config = ChannelConfig::for_channel(Channel::Email);
    email_config.workers = 1;
    email_config.retry_sweep_interval_secs = 3600;
    email_config.maintenance_interval_secs = 3600;
    let email = EmailHandlerService::start(
        email_config,
        EmailProviderConfig {
            connection_string: "endpoint=https://mail.example.com;key=secret".to_string(),
            sender_address: "noreply@example.com".to_string(),
            reply_to_address: None,
            timeout_secs: 5,
            max_retries: 3,
        },
        email_transport.clone(),
        queue.clone() as Arc<dyn NotificationQueue>,
        env.clone(),
    )
    .await
    .unwrap();

    let mut sms_config = ChannelConfig::for_channel(Channel::Sms);
    sms_config.workers = 1;
    sms_config.retry_sweep_interval_secs = 3600;
    sms_config.maintenance_interval_secs = 3600;
    let sms = SmsHandlerService::start(
        sms_config,
        SmsProviderConfig {
            connection_string: "endpoint=https://sms.example.com;key=secret".to_string(),
            from_number: "+12025550100".to_string(),
            max_retries: 3,
            retry_delay_secs: 30,
            request_timeout_secs: 5,
        },
        sms_transport.clone(),
        queue.clone() as Arc<dyn NotificationQueue>,
        env,
    )
    .await
    .unwrap();

    let dispatcher = Dispatcher::new(
        Arc::clone(&subscribers) as Arc<dyn SubscriberStore>,
        queue as Arc<dyn NotificationQueue>,
        "notifications-email",
        "notifications-sms",
        "test",
    );

    Stack {
        subscribers,
        status_store,
        dead_letters,
        email_transport,
        sms_transport,
        email,
        sms,
        dispatcher,
    }
}

fn draft(
    email: &str,
    methods: Vec<NotificationMethod>,
    kinds: BTreeSet<EventKind>,
    threshold: Priority,
    schedule: Schedule,
) -> SubscriberDraft {
    SubscriberDraft {
        name: email.to_string(),
        email: email.to_string(),
        phone: methods
            .iter()
            .any(|method| matches!(method, NotificationMethod::Sms | NotificationMethod::Both))
            .then(|| "(212) 555-1234".to_string()),
        status: SubscriberStatus::Active,
        event_types: kinds,
        methods,
        schedule,
        priority_threshold: threshold,
        notes: String::new(),
        created_by: "tester".to_string(),
    }
}

fn event(topic: &str, data: &[(&str, &str)]) -> DomainEvent {
    DomainEvent {
        event_id: "evt-1".to_string(),
        topic: topic.to_string(),
        event_type: String::new(),
        entity_type: String::new(),
        entity_id: String::new(),
        operation_type: None,
        user_id: None,
        correlation_id: Some("corr-e2e".to_string()),
        data: data
            .iter()
            .map(|(key, value)| ((*key).to_string(), Value::String((*value).to_string())))
            .collect::<Map<String, Value>>(),
        timestamp: Utc::now(),
        environment: "test".to_string(),
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..300 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never satisfied");
}

#[tokio::test]
async fn test_business_inquiry_sms_happy_path() {
    let stack = stack().await;

    stack
        .subscribers
        .create(draft(
            "a@example.com",
            vec![NotificationMethod::Sms],
            BTreeSet::from([EventKind::InquiryBusiness]),
            Priority::Medium,
            Schedule::Immediate,
        ))
        .await
        .unwrap();

    let published = stack
        .dispatcher
        .dispatch(event(
            "business-inquiry",
            &[("entity_id", "biz-001"), ("priority", "high")],
        ))
        .await
        .unwrap();
    assert_eq!(published, 1);

    let transport = Arc::clone(&stack.sms_transport);
    wait_until(move || transport.sent_count() == 1).await;

    let sent = stack.sms_transport.sent();
    assert_eq!(sent[0].to, vec!["+12125551234".to_string()]);
    assert!(sent[0].message.starts_with("New business inquiry biz-001"));
    assert!(sent[0].message.len() <= 160);

    // Status went pending -> sent with a single attempt
    let mut reached = false;
    for _ in 0..300 {
        let counts = stack.status_store.count_by_status().await;
        if counts.get("sent").copied() == Some(1) {
            reached = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(reached, "status never reached sent");
    assert!(stack.dead_letters.is_empty());
    assert_eq!(stack.email_transport.sent_count(), 0);

    stack.sms.stop().await.unwrap();
    stack.email.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_urgent_system_error_mixed_fan_out() {
    let stack = stack().await;

    // B: both channels, threshold high
    stack
        .subscribers
        .create(draft(
            "b@example.com",
            vec![NotificationMethod::Both],
            BTreeSet::from([EventKind::SystemError]),
            Priority::High,
            Schedule::Immediate,
        ))
        .await
        .unwrap();
    // C: email only, threshold urgent
    stack
        .subscribers
        .create(draft(
            "c@example.com",
            vec![NotificationMethod::Email],
            BTreeSet::from([EventKind::SystemError]),
            Priority::Urgent,
            Schedule::Immediate,
        ))
        .await
        .unwrap();
    // D: deleted before the event arrives
    let d = stack
        .subscribers
        .create(draft(
            "d@example.com",
            vec![NotificationMethod::Email],
            BTreeSet::from([EventKind::SystemError]),
            Priority::Low,
            Schedule::Immediate,
        ))
        .await
        .unwrap();
    stack.subscribers.soft_delete(d.id, "admin").await.unwrap();

    let published = stack
        .dispatcher
        .dispatch(event("system-health", &[("event_type", "database_error")]))
        .await
        .unwrap();
    assert_eq!(published, 3);

    let email_transport = Arc::clone(&stack.email_transport);
    let sms_transport = Arc::clone(&stack.sms_transport);
    wait_until(move || email_transport.sent_count() == 2 && sms_transport.sent_count() == 1)
        .await;

    let emails = stack.email_transport.sent();
    let email_recipients: BTreeSet<String> = emails
        .iter()
        .flat_map(|request| request.recipients.to.clone())
        .collect();
    assert_eq!(
        email_recipients,
        BTreeSet::from(["b@example.com".to_string(), "c@example.com".to_string()])
    );

    let sms = stack.sms_transport.sent();
    assert_eq!(sms.len(), 1);
    assert!(sms[0].message.contains("URGENT"));
    assert!(sms[0].message.contains("database_error"));

    stack.sms.stop().await.unwrap();
    stack.email.stop().await.unwrap();
}

#[tokio::test]
async fn test_hourly_schedule_windows_and_flush() {
    let stack = stack().await;

    stack
        .subscribers
        .create(draft(
            "hourly@example.com",
            vec![NotificationMethod::Email],
            BTreeSet::from([EventKind::CapacityAlert]),
            Priority::Low,
            Schedule::Hourly,
        ))
        .await
        .unwrap();

    // Two capacity alerts inside the same window collapse to one
    for _ in 0..2 {
        let published = stack
            .dispatcher
            .dispatch(event("system-health", &[("event_type", "capacity_high")]))
            .await
            .unwrap();
        assert_eq!(published, 0);
    }
    assert_eq!(stack.dispatcher.scheduled_len(), 1);
    assert_eq!(stack.email_transport.sent_count(), 0);

    // Nothing due inside the window
    assert_eq!(stack.dispatcher.flush_due(Utc::now()).await.unwrap(), 0);

    // Past the window the notification flushes to the email queue
    let flushed = stack
        .dispatcher
        .flush_due(Utc::now() + chrono::Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(flushed, 1);

    let transport = Arc::clone(&stack.email_transport);
    wait_until(move || transport.sent_count() == 1).await;

    stack.sms.stop().await.unwrap();
    stack.email.stop().await.unwrap();
}

#[tokio::test]
async fn test_dispatch_without_matching_subscribers_is_a_no_op() {
    let stack = stack().await;

    let published = stack
        .dispatcher
        .dispatch(event("business-inquiry", &[("entity_id", "biz-002")]))
        .await
        .unwrap();
    assert_eq!(published, 0);
    assert_eq!(stack.email_transport.sent_count(), 0);
    assert_eq!(stack.sms_transport.sent_count(), 0);

    stack.sms.stop().await.unwrap();
    stack.email.stop().await.unwrap();
}
