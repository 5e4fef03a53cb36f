//! Authority and replicas wired over the in-process network.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relaycache_core::{Cache, CacheConfig, GateDecision, Lifetime, ManualClock};
use relaycache_replication::{
    CodecError, JsonCodec, MemoryEndpoint, MemoryNetwork, Payload, PeerId, PullHandler,
    ReplicationConfig, ReplicationError, Replicator, Role, Transport, TransportError,
};
use serde::{Deserialize, Serialize};

type Node<V> = Arc<Replicator<String, V, MemoryEndpoint<String, V>>>;

fn cache<V>(name: &str) -> Arc<Cache<String, V>>
where
    V: Clone + Send + Sync + 'static,
{
    Cache::new_shared(CacheConfig::new().with_name(name)).unwrap()
}

fn node<V>(role: Role, endpoint: MemoryEndpoint<String, V>, config: ReplicationConfig) -> Node<V>
where
    V: Clone + Send + Sync + 'static,
{
    let name = match role {
        Role::Authority => "authority",
        Role::Replica => "replica",
    };
    Arc::new(Replicator::new(role, cache(name), Arc::new(endpoint), config))
}

/// Poll `check` until it holds or roughly a second has passed.
async fn eventually(check: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_replica_receives_authority_write_without_grab() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    authority.cache().write_with_lifetime(
        "score".to_string(),
        42,
        Lifetime::Bounded(Duration::from_secs(10)),
    );

    let key = "score".to_string();
    assert!(eventually(|| replica.cache().read(&key) == Some(42)).await);
}

#[tokio::test]
async fn test_denied_peer_never_gets_notice_or_value() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    authority.add_rule(|peer: &PeerId, _key: &String| peer.as_str() != "blocked");
    authority.enable_replication().unwrap();

    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    replica.enable_replication().unwrap();
    let blocked = net.connect("blocked");
    let mut blocked_notices = blocked.take_notices().unwrap();

    authority.cache().write("score".to_string(), 42);

    let key = "score".to_string();
    assert!(eventually(|| replica.cache().read(&key) == Some(42)).await);
    settle().await;
    assert!(blocked_notices.try_recv().is_err());

    // Pulling directly is refused too, and looks like "not written".
    assert_eq!(blocked.pull(&key).await.unwrap(), None);
}

#[tokio::test]
async fn test_rule_that_denies_suppresses_push_entirely() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    authority.add_rule(|_: &PeerId, _: &String| true);
    authority.add_rule(|_: &PeerId, _: &String| false);
    authority.enable_replication().unwrap();

    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    replica.enable_replication().unwrap();
    let watcher = net.connect("watcher");
    let mut watcher_notices = watcher.take_notices().unwrap();

    authority.cache().write("score".to_string(), 42);
    settle().await;

    // No notice left the authority, not just a refused pull.
    assert!(watcher_notices.try_recv().is_err());
    assert_eq!(replica.cache().read(&"score".to_string()), None);
    assert_eq!(replica.grab(&"score".to_string()).await.unwrap(), None);
}

#[tokio::test]
async fn test_replica_rule_that_denies_ignores_every_notice() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    replica.add_rule(|_: &PeerId, _: &String| true);
    replica.add_rule(|_: &PeerId, _: &String| false);
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();
    let watcher = net.connect("watcher");
    let mut watcher_notices = watcher.take_notices().unwrap();

    authority.cache().write("score".to_string(), 42);

    // The authority pushed; only the replica's own gate stops it.
    assert_eq!(watcher_notices.recv().await.as_deref(), Some("score"));
    settle().await;

    let key = "score".to_string();
    assert_eq!(replica.cache().read(&key), None);
    assert_eq!(
        replica.gate().evaluate(&PeerId::from("r1"), &key),
        GateDecision::Deny {
            rule: "rule-1".to_string()
        }
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_write_from_thread_outside_runtime_still_replicates() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    let cache = authority.cache().clone();
    std::thread::spawn(move || cache.write("score".to_string(), 42))
        .join()
        .unwrap();

    let key = "score".to_string();
    assert!(eventually(|| replica.cache().read(&key) == Some(42)).await);
}

#[tokio::test]
async fn test_dropping_replica_stops_its_listener() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = net.authority();
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    replica.enable_replication().unwrap();
    drop(replica);

    // Once the listener exits its receiver is gone and sends fail.
    let peer = PeerId::from("r1");
    let mut closed = false;
    for _ in 0..100 {
        if let Err(TransportError::Closed) = authority.notify(&peer, &"k".to_string()).await {
            closed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(closed);
}

#[tokio::test]
async fn test_replica_gate_ignores_notices_it_rejects() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    replica.add_rule(|_: &PeerId, key: &String| !key.starts_with("secret"));
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    authority.cache().write("secret-plan".to_string(), 7);
    authority.cache().write("open".to_string(), 1);

    let open = "open".to_string();
    assert!(eventually(|| replica.cache().read(&open) == Some(1)).await);
    settle().await;
    assert!(!replica.cache().contains_key(&"secret-plan".to_string()));
}

#[test]
fn test_expired_authority_entry_is_absent_and_gone() {
    let clock = ManualClock::new_shared();
    let cache: Cache<String, i64> =
        Cache::with_clock(CacheConfig::new().with_name("authority"), clock.clone()).unwrap();

    cache.write_with_lifetime("x".to_string(), 1, Duration::from_secs(10));
    clock.advance(Duration::from_secs(11));

    assert_eq!(cache.read(&"x".to_string()), None);
    assert!(!cache.contains_key(&"x".to_string()));
    assert_eq!(cache.len(), 0);
    assert_eq!(cache.sweep(), 0);
}

#[tokio::test]
async fn test_grab_works_with_push_disabled() {
    let net = MemoryNetwork::<String, String>::new();
    let authority = node(
        Role::Authority,
        net.authority(),
        ReplicationConfig::new().with_push(false),
    );
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    authority
        .cache()
        .write("y".to_string(), "hello".to_string());
    settle().await;

    // Nothing was pushed.
    assert_eq!(replica.cache().read(&"y".to_string()), None);

    let grabbed = replica.grab(&"y".to_string()).await.unwrap();
    assert_eq!(grabbed.as_deref(), Some("hello"));

    // grab does not cache on its own.
    assert_eq!(replica.cache().read(&"y".to_string()), None);
}

#[tokio::test]
async fn test_grab_recovers_a_dropped_notice() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    net.set_drop_notices(&PeerId::from("r1"), true);
    authority.cache().write("score".to_string(), 5);
    settle().await;

    let key = "score".to_string();
    assert_eq!(replica.cache().read(&key), None);

    let value = replica.grab(&key).await.unwrap().unwrap();
    replica.cache().write(key.clone(), value);
    assert_eq!(replica.cache().read(&key), Some(5));
}

#[tokio::test]
async fn test_later_writes_replace_replica_value() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    let key = "score".to_string();
    authority.cache().write(key.clone(), 1);
    assert!(eventually(|| replica.cache().read(&key) == Some(1)).await);

    authority.cache().write(key.clone(), 2);
    assert!(eventually(|| replica.cache().read(&key) == Some(2)).await);
}

#[tokio::test]
async fn test_replicated_writes_fire_replica_hooks() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());

    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    replica.cache().on_any_update(move |_key: String| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();
    authority.cache().write("a".to_string(), 1);

    assert!(eventually(|| seen.load(Ordering::SeqCst) == 1).await);
}

#[tokio::test]
async fn test_every_connected_replica_is_notified() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());
    let replicas: Vec<_> = ["r1", "r2", "r3"]
        .into_iter()
        .map(|id| node(Role::Replica, net.connect(id), ReplicationConfig::default()))
        .collect();

    authority.enable_replication().unwrap();
    for replica in &replicas {
        replica.enable_replication().unwrap();
    }

    authority.cache().write("k".to_string(), 9);

    let key = "k".to_string();
    for replica in &replicas {
        assert!(eventually(|| replica.cache().read(&key) == Some(9)).await);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Score {
    player: String,
    points: u32,
}

#[tokio::test]
async fn test_values_cross_through_codec() {
    let net = MemoryNetwork::<String, Score>::new();
    let authority = Arc::new(
        Replicator::new(
            Role::Authority,
            cache("authority"),
            Arc::new(net.authority()),
            ReplicationConfig::default(),
        )
        .with_codec(Arc::new(JsonCodec::<Score>::new())),
    );
    let replica = Arc::new(
        Replicator::new(
            Role::Replica,
            cache("replica"),
            Arc::new(net.connect("r1")),
            ReplicationConfig::default(),
        )
        .with_codec(Arc::new(JsonCodec::<Score>::new())),
    );
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    // The authority serves encoded bytes.
    let raw = net.connect("raw");
    let score = Score {
        player: "ada".to_string(),
        points: 3,
    };
    authority.cache().write("top".to_string(), score.clone());

    let key = "top".to_string();
    assert!(eventually(|| replica.cache().read(&key) == Some(score.clone())).await);

    let payload = raw.pull(&key).await.unwrap().unwrap();
    assert!(payload.is_encoded());
}

#[tokio::test]
async fn test_encoded_payload_without_decoder_fails() {
    let net = MemoryNetwork::<String, Score>::new();
    let authority = Arc::new(
        Replicator::new(
            Role::Authority,
            cache("authority"),
            Arc::new(net.authority()),
            ReplicationConfig::new().with_push(false),
        )
        .with_codec(Arc::new(JsonCodec::<Score>::new())),
    );
    let replica = node(Role::Replica, net.connect("r1"), ReplicationConfig::default());
    authority.enable_replication().unwrap();
    replica.enable_replication().unwrap();

    authority.cache().write(
        "top".to_string(),
        Score {
            player: "ada".to_string(),
            points: 3,
        },
    );

    let err = replica.grab(&"top".to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        ReplicationError::Codec(CodecError::MissingDecoder)
    ));
}

#[tokio::test]
async fn test_enable_twice_is_rejected() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());

    assert!(!authority.is_enabled());
    authority.enable_replication().unwrap();
    assert!(authority.is_enabled());
    assert!(matches!(
        authority.enable_replication(),
        Err(ReplicationError::AlreadyEnabled)
    ));
}

#[tokio::test]
async fn test_grab_on_authority_is_wrong_role() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());

    let err = authority.grab(&"k".to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        ReplicationError::WrongRole {
            expected: Role::Replica,
            actual: Role::Authority,
        }
    ));
}

#[tokio::test]
async fn test_failed_enable_can_be_retried() {
    let net = MemoryNetwork::<String, i64>::new();
    let endpoint = net.connect("r1");
    // Someone else already holds the notice stream.
    let stolen = endpoint.take_notices().unwrap();

    let replica = node(Role::Replica, endpoint, ReplicationConfig::default());
    assert!(matches!(
        replica.enable_replication(),
        Err(ReplicationError::Transport(_))
    ));
    assert!(!replica.is_enabled());
    drop(stolen);
}

#[test]
fn test_enable_outside_runtime_fails() {
    let net = MemoryNetwork::<String, i64>::new();
    let authority = node(Role::Authority, net.authority(), ReplicationConfig::default());

    assert!(matches!(
        authority.enable_replication(),
        Err(ReplicationError::NoRuntime)
    ));
    assert!(!authority.is_enabled());
}

struct SlowAuthority;

#[async_trait]
impl PullHandler<PeerId, String, i64> for SlowAuthority {
    async fn handle_pull(&self, _peer: &PeerId, _key: &String) -> Option<Payload<i64>> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Some(Payload::Value(1))
    }
}

#[tokio::test]
async fn test_slow_pull_times_out() {
    let net = MemoryNetwork::<String, i64>::new();
    net.authority().serve_pulls(Arc::new(SlowAuthority)).unwrap();

    let replica = node(
        Role::Replica,
        net.connect("r1"),
        ReplicationConfig::new().with_pull_timeout(Duration::from_millis(50)),
    );

    let err = replica.grab(&"k".to_string()).await.unwrap_err();
    assert!(matches!(err, ReplicationError::Timeout(_)));
}
