//! End-to-end verification and sweep scenarios.
//!
//! Covers:
//! - T1 -> A1 (unspent, enabled): U1 verifies, record written
//! - U2 replays a signature made for U1's challenge: rejected, nothing stored
//! - T1 spent later: sweep revokes U1, no errors
//! - Registry outage during sweep: error reported, record untouched
//! - The scheduler drives the sweep on its own
//! - Records survive a restart of the SQLite store
//! - A channel removal that fails is retried by later sweeps
//!
//! Oracles are mocks; the store is the real SQLite backend in a temp dir.

use k256::ecdsa::SigningKey;
use snov::chain::{MockChainResolver, MockRegistry};
use snov::chat::{
    ChatError, ComplianceBot, GroupId, GroupNotifier, Message, MockChatTransport, ServiceId,
};
use snov::crypto::{address_for_key, sign_message, NetworkParams, SignatureKind, SignatureVerifier};
use snov::gatekeeper::{
    challenge_message, ComplianceEngine, ComplianceError, ManualClock, RecordingNotifier,
    SweepScheduler, Sweeper,
};
use snov::persistence::{MemoryRecordStore, RecordStatus, RecordStore, SqliteRecordStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const T1: &str = "7b0f33c1c5a2e4d6f8091a2b3c4d5e6f708192a3b4c5d6e7f8091a2b3c4d5e6f";

type Engine = ComplianceEngine<MockChainResolver, MockRegistry, SqliteRecordStore>;

struct World {
    dir: TempDir,
    chain: Arc<MockChainResolver>,
    registry: Arc<MockRegistry>,
    store: Arc<SqliteRecordStore>,
    notifier: Arc<RecordingNotifier>,
    engine: Arc<Engine>,
    a1: String,
}

fn owner_key() -> SigningKey {
    SigningKey::from_slice(&[0x42; 32]).unwrap()
}

fn sign_for(requester: &str) -> String {
    sign_message(
        &owner_key(),
        &NetworkParams::mainnet().message_magic,
        &challenge_message(T1, requester),
        SignatureKind::Bech32,
    )
    .unwrap()
}

async fn world() -> World {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteRecordStore::open(&dir.path().join("snov.db")).await.unwrap());
    let chain = Arc::new(MockChainResolver::new());
    let registry = Arc::new(MockRegistry::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let a1 = address_for_key(&owner_key(), SignatureKind::Bech32, &NetworkParams::mainnet()).unwrap();
    chain.set_unspent(T1, &a1);
    registry.add_member(&a1);

    let engine = Arc::new(
        ComplianceEngine::new(
            chain.clone(),
            registry.clone(),
            store.clone(),
            SignatureVerifier::new(NetworkParams::mainnet()),
            notifier.clone(),
        )
        .with_clock(Arc::new(ManualClock::new(1_700_000_000))),
    );

    World {
        dir,
        chain,
        registry,
        store,
        notifier,
        engine,
        a1,
    }
}

#[tokio::test]
async fn test_successful_verification() {
    let w = world().await;

    let result = w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();
    assert_eq!(result.address, w.a1);

    let record = w.store.get("U1").await.unwrap().unwrap();
    assert_eq!(record.transaction_id, T1);
    assert_eq!(record.address, w.a1);
    assert_eq!(record.status, RecordStatus::Active);
    assert_eq!(record.verified_at, 1_700_000_000);
}

#[tokio::test]
async fn test_signature_for_another_requester_is_rejected() {
    let w = world().await;

    let result = w.engine.verify(T1, "U2", &sign_for("U1")).await;
    assert!(matches!(result, Err(ComplianceError::SignatureInvalid)));
    assert!(w.store.get("U2").await.unwrap().is_none());
}

#[tokio::test]
async fn test_spent_collateral_is_revoked_by_sweep() {
    let w = world().await;
    w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();

    w.chain.set_spent(T1, &w.a1);
    let report = w.engine.sweep().await.unwrap();

    assert_eq!(report.revoked, vec!["U1".to_string()]);
    assert!(report.errors.is_empty());
    assert_eq!(
        w.store.get("U1").await.unwrap().unwrap().status,
        RecordStatus::Revoked
    );
    assert_eq!(w.notifier.revoked(), vec!["U1".to_string()]);
}

#[tokio::test]
async fn test_registry_outage_is_not_a_revocation() {
    let w = world().await;
    w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();

    w.registry.set_unavailable(true);
    let report = w.engine.sweep().await.unwrap();

    assert!(report.revoked.is_empty());
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].requester_id, "U1");
    assert!(w.store.get("U1").await.unwrap().unwrap().is_active());

    // Next sweep after recovery finds the node fine
    w.registry.set_unavailable(false);
    let report = w.engine.sweep().await.unwrap();
    assert!(report.errors.is_empty());
    assert!(report.revoked.is_empty());
}

#[tokio::test]
async fn test_reverification_is_idempotent() {
    let w = world().await;
    let sig = sign_for("U1");

    w.engine.verify(T1, "U1", &sig).await.unwrap();
    w.engine.verify(T1, "U1", &sig).await.unwrap();

    let all = w.store.list_all().await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_active());
}

#[tokio::test]
async fn test_revoked_owner_can_verify_again() {
    let w = world().await;
    w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();
    w.registry.remove_member(&w.a1);
    w.engine.sweep().await.unwrap();
    assert!(!w.store.get("U1").await.unwrap().unwrap().is_active());

    w.registry.add_member(&w.a1);
    w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();
    assert!(w.store.get("U1").await.unwrap().unwrap().is_active());
}

// In-memory store here: paused time must not race the SQLite worker thread
#[tokio::test(start_paused = true)]
async fn test_scheduler_revokes_on_its_own() {
    let chain = Arc::new(MockChainResolver::new());
    let registry = Arc::new(MockRegistry::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let a1 = address_for_key(&owner_key(), SignatureKind::Bech32, &NetworkParams::mainnet()).unwrap();
    chain.set_unspent(T1, &a1);
    registry.add_member(&a1);

    let engine = Arc::new(ComplianceEngine::new(
        chain.clone(),
        registry,
        Arc::new(MemoryRecordStore::new()),
        SignatureVerifier::new(NetworkParams::mainnet()),
        notifier.clone(),
    ));
    engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();
    chain.set_spent(T1, &a1);

    let sweeper: Arc<dyn Sweeper> = engine.clone();
    let scheduler = SweepScheduler::start(sweeper, Duration::from_secs(24 * 3600));

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(notifier.revoked().is_empty());

    tokio::time::sleep(Duration::from_secs(23 * 3600 + 1)).await;
    scheduler.stop().await;

    assert_eq!(notifier.revoked(), vec!["U1".to_string()]);
}

#[tokio::test]
async fn test_records_survive_restart() {
    let w = world().await;
    w.engine.verify(T1, "U1", &sign_for("U1")).await.unwrap();

    let reopened = SqliteRecordStore::open(&w.dir.path().join("snov.db")).await.unwrap();
    let active = reopened.list_active().await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].requester_id, "U1");
    assert_eq!(active[0].address, w.a1);
}

#[tokio::test]
async fn test_chat_flow_grants_and_sweep_removes_access() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(SqliteRecordStore::open(&dir.path().join("snov.db")).await.unwrap());
    let chain = Arc::new(MockChainResolver::new());
    let registry = Arc::new(MockRegistry::new());
    let a1 = address_for_key(&owner_key(), SignatureKind::Bech32, &NetworkParams::mainnet()).unwrap();
    chain.set_unspent(T1, &a1);
    registry.add_member(&a1);

    let transport = MockChatTransport::new(ServiceId("snov-bot".to_string()));
    let group = GroupId("sentry-owners".to_string());
    let engine = Arc::new(ComplianceEngine::new(
        chain.clone(),
        registry,
        store,
        SignatureVerifier::new(NetworkParams::mainnet()),
        Arc::new(GroupNotifier::new(transport.clone(), group.clone())),
    ));
    let bot = ComplianceBot::new(transport.clone(), engine.clone());
    let u1 = ServiceId("U1".to_string());

    bot.handle_message(Message::direct("U1", &format!("!getmessage {}", T1)))
        .await
        .unwrap();
    assert!(transport.sent_to(&u1)[0].contains(&challenge_message(T1, "U1")));

    bot.handle_message(Message::direct("U1", &format!("!verify {} {}", T1, sign_for("U1"))))
        .await
        .unwrap();
    assert!(transport.is_member(&group, &u1));

    chain.set_spent(T1, &a1);
    engine.sweep().await.unwrap();
    assert!(!transport.is_member(&group, &u1));
}

#[tokio::test]
async fn test_failed_channel_removal_is_retried_until_done() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("snov.db");
    let store = Arc::new(SqliteRecordStore::open(&db).await.unwrap());
    let chain = Arc::new(MockChainResolver::new());
    let registry = Arc::new(MockRegistry::new());
    let a1 = address_for_key(&owner_key(), SignatureKind::Bech32, &NetworkParams::mainnet()).unwrap();
    chain.set_unspent(T1, &a1);
    registry.add_member(&a1);

    let transport = MockChatTransport::new(ServiceId("snov-bot".to_string()));
    let group = GroupId("sentry-owners".to_string());
    let engine = Arc::new(ComplianceEngine::new(
        chain.clone(),
        registry,
        store,
        SignatureVerifier::new(NetworkParams::mainnet()),
        Arc::new(GroupNotifier::new(transport.clone(), group.clone())),
    ));
    let bot = ComplianceBot::new(transport.clone(), engine.clone());
    let u1 = ServiceId("U1".to_string());

    bot.handle_message(Message::direct("U1", &format!("!verify {} {}", T1, sign_for("U1"))))
        .await
        .unwrap();
    assert!(transport.is_member(&group, &u1));

    // Not a network error, so the transport does not retry it
    chain.set_spent(T1, &a1);
    transport.fail_next_membership_change(ChatError::Unauthorized);
    let report = engine.sweep().await.unwrap();
    assert_eq!(report.revoked, vec!["U1".to_string()]);
    assert_eq!(report.notify_failures.len(), 1);
    assert!(transport.is_member(&group, &u1));

    // The owed removal survives a restart of the store
    let reopened = SqliteRecordStore::open(&db).await.unwrap();
    assert_eq!(reopened.list_pending_removals().await.unwrap().len(), 1);

    let report = engine.sweep().await.unwrap();
    assert_eq!(report.checked, 0);
    assert_eq!(report.removals_retried, vec!["U1".to_string()]);
    assert!(!transport.is_member(&group, &u1));
    assert!(reopened.list_pending_removals().await.unwrap().is_empty());
}
