//! In-process replication walk-through.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use relaycache_config::{CodecKind, RelayCacheConfig};
use relaycache_core::{Cache, Lifetime};
use relaycache_replication::{
    Codec, JsonCodec, MemoryEndpoint, MemoryNetwork, PeerId, Replicator, Role,
};
use serde_json::Value;
use tracing::info;

use crate::cli::{DemoArgs, OutputFormat};
use crate::output::{print_rows, print_success, print_warning};

type Node = Arc<Replicator<String, Value, MemoryEndpoint<String, Value>>>;

/// What one replica ended up with.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicaReport {
    pub peer: PeerId,
    /// Value present in the replica's own cache after pushes settled.
    pub pushed: Option<Value>,
    /// Value returned by an explicit grab, or the grab error.
    pub grabbed: std::result::Result<Option<Value>, String>,
}

pub async fn run(cfg: &RelayCacheConfig, args: &DemoArgs, format: OutputFormat) -> Result<()> {
    let reports = simulate(cfg, args).await?;

    let rows: Vec<Vec<String>> = reports
        .iter()
        .map(|r| {
            vec![
                r.peer.to_string(),
                show(r.pushed.as_ref()),
                match &r.grabbed {
                    Ok(v) => show(v.as_ref()),
                    Err(e) => format!("error: {e}"),
                },
            ]
        })
        .collect();
    print_rows(&["Replica", "Pushed", "Grabbed"], &rows, format);

    let missing = reports.iter().filter(|r| r.pushed.is_none()).count();
    if missing == 0 {
        print_success(&format!("All {} replicas received '{}'", reports.len(), args.key));
    } else {
        print_warning(&format!(
            "{missing} of {} replicas did not receive '{}' by push",
            reports.len(),
            args.key
        ));
    }
    Ok(())
}

/// Run one authority write through `args.replicas` replicas and report the outcome.
pub async fn simulate(cfg: &RelayCacheConfig, args: &DemoArgs) -> Result<Vec<ReplicaReport>> {
    let net = MemoryNetwork::<String, Value>::new();
    let codec: Option<Arc<dyn Codec<Value>>> = match cfg.replication.codec {
        CodecKind::None => None,
        CodecKind::Json => Some(Arc::new(JsonCodec::<Value>::new())),
    };

    let authority = build_node(cfg, Role::Authority, "authority", net.authority(), codec.clone())?;
    for denied in &args.deny {
        let denied = PeerId::from(denied.as_str());
        authority.gate().add_named_rule(
            format!("deny-{denied}"),
            move |peer: &PeerId, _key: &String| *peer != denied,
        );
    }
    authority.enable_replication()?;

    let mut replicas = Vec::with_capacity(args.replicas);
    for i in 1..=args.replicas {
        let peer = PeerId::new(format!("replica-{i}"));
        let node = build_node(
            cfg,
            Role::Replica,
            peer.as_str(),
            net.connect(peer.clone()),
            codec.clone(),
        )?;
        node.enable_replication()?;
        replicas.push((peer, node));
    }

    for dropped in &args.drop {
        if !net.set_drop_notices(&PeerId::from(dropped.as_str()), true) {
            bail!("Unknown replica in --drop: {dropped}");
        }
    }

    let value = parse_value(&args.value);
    let lifetime = args
        .ttl_ms
        .map(|ms| Lifetime::Bounded(Duration::from_millis(ms)))
        .unwrap_or_default();
    info!(key = %args.key, ?lifetime, replicas = args.replicas, "Authority writing");
    authority
        .cache()
        .write_with_lifetime(args.key.clone(), value, lifetime);

    tokio::time::sleep(Duration::from_millis(args.wait_ms)).await;

    let mut reports = Vec::with_capacity(replicas.len());
    for (peer, node) in replicas {
        let pushed = node.cache().read(&args.key);
        let grabbed = node.grab(&args.key).await.map_err(|e| e.to_string());
        reports.push(ReplicaReport {
            peer,
            pushed,
            grabbed,
        });
    }
    Ok(reports)
}

fn build_node(
    cfg: &RelayCacheConfig,
    role: Role,
    label: &str,
    endpoint: MemoryEndpoint<String, Value>,
    codec: Option<Arc<dyn Codec<Value>>>,
) -> Result<Node> {
    let cache_config = cfg
        .cache_config()
        .with_name(format!("{}:{label}", cfg.cache.name));
    let cache = Cache::new_shared(cache_config)?;

    let mut node = Replicator::new(role, cache, Arc::new(endpoint), cfg.replication_config());
    if let Some(codec) = codec {
        node = node.with_codec(codec);
    }
    Ok(Arc::new(node))
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn show(value: Option<&Value>) -> String {
    value.map_or_else(|| "-".to_string(), Value::to_string)
}
