// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::auth::AuthService;
use crate::events::{EventBus, Navigator, Notifier, SessionEvent};
use crate::store::SessionTokens;
use crate::test_support::{
    mint_in, sample_profile, session_tokens, FakeAuthService, RecordingNavigator,
    RecordingNotifier,
};

struct Harness {
    store: Arc<TokenStore>,
    service: Arc<FakeAuthService>,
    events: EventBus,
    notifier: Arc<RecordingNotifier>,
    navigator: Arc<RecordingNavigator>,
    monitor: Arc<SessionMonitor>,
}

async fn harness(seed: Option<SessionTokens>, throttle: Duration) -> anyhow::Result<Harness> {
    let store = Arc::new(TokenStore::in_memory());
    if let Some(ref tokens) = seed {
        store.replace(tokens).await?;
    }
    let service = Arc::new(FakeAuthService::new());
    let events = EventBus::default();
    let notifier = Arc::new(RecordingNotifier::default());
    let navigator = Arc::new(RecordingNavigator::default());
    let validator = TokenValidator::new(Duration::from_secs(60));
    let expiration = Arc::new(ExpirationHandler::new(
        Arc::clone(&store),
        events.clone(),
        Arc::clone(&notifier) as Arc<dyn Notifier>,
        Arc::clone(&navigator) as Arc<dyn Navigator>,
        Duration::from_secs(3),
    ));
    let coordinator = Arc::new(RefreshCoordinator::new(
        Arc::clone(&store),
        validator,
        Arc::clone(&service) as Arc<dyn AuthService>,
        Arc::clone(&expiration),
        events.clone(),
    ));
    let monitor = Arc::new(SessionMonitor::new(
        Arc::clone(&store),
        validator,
        coordinator,
        expiration,
        Duration::from_secs(60),
        throttle,
    ));
    Ok(Harness { store, service, events, notifier, navigator, monitor })
}

fn removed(slot: Slot) -> Trigger {
    Trigger::StorageChanged(StorageChange { slot, value: None })
}

fn written(slot: Slot, value: &str) -> Trigger {
    Trigger::StorageChanged(StorageChange { slot, value: Some(value.to_owned()) })
}

#[tokio::test]
async fn active_session_is_left_alone() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(3600, 86_400)), Duration::ZERO).await?;
    assert!(h.monitor.last_checked_at().is_none());

    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Active);

    assert_eq!(h.service.refresh_calls(), 0);
    assert!(h.monitor.last_checked_at().is_some());
    assert!(!h.monitor.is_checking());
    Ok(())
}

#[tokio::test]
async fn stale_access_is_refreshed_proactively() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(10, 86_400)), Duration::ZERO).await?;
    let issued = session_tokens(3600, 86_400);
    h.service.push_refresh(Ok(issued.clone()));

    assert_eq!(h.monitor.handle(Trigger::FocusRegained).await, SessionState::Active);

    assert_eq!(h.service.refresh_calls(), 1);
    assert_eq!(h.store.access(), Some(issued.access));
    Ok(())
}

#[tokio::test]
async fn dead_session_is_expired() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(-10, -10)), Duration::ZERO).await?;
    let mut rx = h.events.subscribe();

    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Expired);

    assert_eq!(h.service.refresh_calls(), 0);
    assert!(h.store.is_empty());
    assert_eq!(h.notifier.messages().len(), 1);
    assert_eq!(h.navigator.count(), 1);
    assert_eq!(rx.try_recv()?, SessionEvent::SessionExpired);
    Ok(())
}

#[tokio::test]
async fn empty_store_expires_once() -> anyhow::Result<()> {
    let h = harness(None, Duration::ZERO).await?;

    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Expired);
    assert_eq!(h.notifier.messages().len(), 1);
    assert_eq!(h.navigator.count(), 1);

    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Expired);
    assert_eq!(h.navigator.count(), 1, "repeat check collapses into the first expiry");
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn checks_within_throttle_reuse_last_result() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(3600, 86_400)), Duration::from_secs(5)).await?;
    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Active);
    let first_check = h.monitor.last_checked_at();

    // The access credential goes stale, but the throttle hides it for now.
    h.store.set_access(&mint_in(-10)).await?;
    h.service.push_refresh(Ok(session_tokens(3600, 86_400)));
    tokio::time::advance(Duration::from_secs(2)).await;

    assert_eq!(h.monitor.handle(Trigger::FocusRegained).await, SessionState::Active);
    assert_eq!(h.service.refresh_calls(), 0);
    assert_eq!(h.monitor.last_checked_at(), first_check);

    tokio::time::advance(Duration::from_secs(4)).await;
    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Active);
    assert_eq!(h.service.refresh_calls(), 1);
    assert!(h.monitor.last_checked_at() > first_check);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn removed_credential_expires_despite_throttle() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(3600, 86_400)), Duration::from_secs(60)).await?;
    assert_eq!(h.monitor.handle(Trigger::Timer).await, SessionState::Active);

    assert_eq!(h.monitor.handle(removed(Slot::Access)).await, SessionState::Expired);

    assert!(h.store.is_empty());
    assert_eq!(h.notifier.messages().len(), 1);
    assert_eq!(h.navigator.count(), 1);
    assert_eq!(h.monitor.last_result(), SessionState::Expired);
    Ok(())
}

#[tokio::test]
async fn removal_of_every_slot_expires_once() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(3600, 86_400)), Duration::ZERO).await?;
    let mut rx = h.events.subscribe();

    for slot in Slot::ALL {
        h.monitor.handle(removed(slot)).await;
    }

    assert_eq!(h.navigator.count(), 1);
    assert_eq!(rx.try_recv()?, SessionEvent::SessionExpired);
    assert!(rx.try_recv().is_err());
    Ok(())
}

#[tokio::test]
async fn foreign_login_is_adopted() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(3600, 86_400)), Duration::ZERO).await?;
    h.monitor.handle(removed(Slot::Access)).await;
    assert!(h.store.is_empty());

    let foreign = session_tokens(3600, 86_400);
    h.monitor.handle(written(Slot::Access, &foreign.access)).await;
    let state = h.monitor.handle(written(Slot::Refresh, &foreign.refresh)).await;

    assert_eq!(state, SessionState::Active);
    assert_eq!(h.store.access(), Some(foreign.access));
    assert_eq!(h.store.refresh(), Some(foreign.refresh));
    assert_eq!(h.service.refresh_calls(), 0);

    // The adopted session can be expired again.
    assert_eq!(h.monitor.handle(removed(Slot::Refresh)).await, SessionState::Expired);
    assert_eq!(h.navigator.count(), 2);
    Ok(())
}

#[tokio::test]
async fn profile_change_is_adopted_without_check() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(-10, 86_400)), Duration::ZERO).await?;
    let raw = serde_json::to_string(&sample_profile())?;

    h.monitor.handle(written(Slot::Profile, &raw)).await;

    assert_eq!(h.store.profile(), Some(sample_profile()));
    assert_eq!(h.service.refresh_calls(), 0);
    assert!(h.monitor.last_checked_at().is_none());
    Ok(())
}

#[tokio::test]
async fn echo_of_own_write_is_ignored() -> anyhow::Result<()> {
    let tokens = session_tokens(3600, 86_400);
    let h = harness(Some(tokens.clone()), Duration::ZERO).await?;

    h.monitor.handle(written(Slot::Access, &tokens.access)).await;

    assert!(h.monitor.last_checked_at().is_none());
    assert_eq!(h.navigator.count(), 0);
    Ok(())
}

#[tokio::test]
async fn run_checks_on_start_and_on_signals() -> anyhow::Result<()> {
    let h = harness(Some(session_tokens(10, 86_400)), Duration::ZERO).await?;
    h.service.push_refresh(Ok(session_tokens(3600, 86_400)));
    let mut rx = h.events.subscribe();

    let (tx, signals) = mpsc::channel(8);
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(Arc::clone(&h.monitor).run(signals, shutdown.clone()));

    let first = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??;
    assert_eq!(first, SessionEvent::Refreshed);

    tx.send(removed(Slot::Access)).await?;
    let second = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await??;
    assert_eq!(second, SessionEvent::SessionExpired);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await??;
    assert_eq!(h.service.refresh_calls(), 1);
    Ok(())
}
