mod common;

use assert_matches::assert_matches;
use common::ScriptedBackend;
use opsdeck::api::{self, ApiClient, GraphqlRefresher};
use opsdeck::managers::TeamManager;
use opsdeck::models::Team;
use opsdeck::session::{AuthInterceptor, AuthSignal, RefreshState, Session, SessionStorage, Signals, TokenPair};
use opsdeck::store::{self, Store};
use opsdeck::Error;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_test::{assert_err, assert_ok};

async fn store_with_tokens(dir: &TempDir, access: &str, refresh: &str) -> Store {
    let store = Store::open_at(&dir.path().join("opsdeck.db")).await.unwrap();
    store
        .save_tokens(&TokenPair::new(access.into(), refresh.into()))
        .await
        .unwrap();
    store
}

async fn client(backend: Arc<ScriptedBackend>, store: Store, signals: Signals) -> ApiClient {
    let session = Session::restore(Arc::new(store)).await.unwrap();
    let refresher = Arc::new(GraphqlRefresher::new(backend.clone()));
    ApiClient::new(backend, AuthInterceptor::new(session, refresher, signals))
}

fn team(id: &str, slug: &str) -> serde_json::Value {
    json!({ "id": id, "name": slug.to_uppercase(), "slug": slug })
}

#[tokio::test]
async fn expired_token_is_refreshed_once_and_persisted() {
    let dir = TempDir::new().unwrap();
    let store = store_with_tokens(&dir, "stale", "r0").await;
    let backend = ScriptedBackend::new("fresh-from-elsewhere");
    backend.respond("MyTeams", json!({ "myTeams": [team("t1", "ops")] }));

    let client = client(backend.clone(), store, Signals::new()).await;

    let (a, b, c) = tokio::join!(
        api::teams::my_teams(&client),
        api::teams::my_teams(&client),
        api::teams::my_teams(&client),
    );
    assert_eq!(assert_ok!(a).len(), 1);
    assert_eq!(assert_ok!(b).len(), 1);
    assert_eq!(assert_ok!(c).len(), 1);
    assert_eq!(backend.refreshes(), 1);

    // Replays carried the refreshed token
    let bearers = backend.bearers("MyTeams");
    assert_eq!(bearers.len(), 6);
    assert_eq!(
        bearers.iter().filter(|b| b.as_deref() == Some("access-1")).count(),
        3
    );

    // A new process sees the refreshed pair
    let reopened = Store::open_at(&dir.path().join("opsdeck.db")).await.unwrap();
    let tokens = reopened.load_tokens().await.unwrap().unwrap();
    assert_eq!(tokens.access_token(), "access-1");
    assert_eq!(tokens.refresh_token(), "refresh-1");
}

#[tokio::test]
async fn failed_refresh_logs_out_and_clears_stored_tokens() {
    let dir = TempDir::new().unwrap();
    let store = store_with_tokens(&dir, "stale", "revoked").await;
    let backend = ScriptedBackend::new("never-issued");
    backend.fail_refresh();

    let signals = Signals::new();
    let mut events = signals.channel();
    let client = client(backend.clone(), store.clone(), signals).await;

    let (a, b) = tokio::join!(
        api::teams::my_teams(&client),
        api::teams::my_teams(&client),
    );
    assert_matches!(a, Err(Error::Unauthenticated { .. }));
    assert_matches!(b, Err(Error::Unauthenticated { .. }));

    assert_eq!(events.recv().await.unwrap(), AuthSignal::RefreshNeeded);
    assert_eq!(events.recv().await.unwrap(), AuthSignal::Logout);
    assert!(events.try_recv().is_err());

    assert_eq!(client.interceptor().state(), RefreshState::LoggedOut);
    assert!(store.load_tokens().await.unwrap().is_none());
    assert!(client.session().tokens().await.is_none());

    // Later calls fail fast without another refresh attempt
    assert_err!(api::teams::my_teams(&client).await);
    assert_eq!(backend.bearers("RefreshToken").len(), 1);
}

#[tokio::test]
async fn selected_team_survives_restart_and_follows_membership() {
    let dir = TempDir::new().unwrap();
    let store = store_with_tokens(&dir, "good", "r").await;
    let backend = ScriptedBackend::new("good");
    backend.respond("MyTeams", json!({ "myTeams": [team("t1", "ops"), team("t2", "web")] }));

    let teams = TeamManager::new(client(backend.clone(), store.clone(), Signals::new()).await, store);
    let listed = assert_ok!(teams.list().await);
    assert_eq!(teams.current().await.unwrap().unwrap().id, "t1");

    let web: &Team = listed.iter().find(|t| t.slug == "web").unwrap();
    teams.select(web).await.unwrap();

    // Restart: the selection comes back from disk
    let reopened = Store::open_at(&dir.path().join("opsdeck.db")).await.unwrap();
    let row = store::get_selected_team(reopened.pool()).await.unwrap().unwrap();
    assert_eq!(row.team.id, "t2");

    // Removed from that team: falls back to the first remaining one
    backend.respond("MyTeams", json!({ "myTeams": [team("t1", "ops")] }));
    let teams = TeamManager::new(client(backend.clone(), reopened.clone(), Signals::new()).await, reopened);
    assert_ok!(teams.list().await);
    assert_eq!(teams.current().await.unwrap().unwrap().slug, "ops");
}
