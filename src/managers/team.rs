use crate::api::{teams, ApiClient};
use crate::error::{Error, Result};
use crate::models::{SelectedTeam, Team};
use crate::store::{self, Store};
use tracing::{debug, info, instrument};

/// Tracks which team scopes team-level requests
pub struct TeamManager {
    client: ApiClient,
    store: Store,
}

impl TeamManager {
    pub fn new(client: ApiClient, store: Store) -> Self {
        Self { client, store }
    }

    pub async fn current(&self) -> Result<Option<SelectedTeam>> {
        Ok(store::get_selected_team(self.store.pool())
            .await?
            .map(|row| row.team))
    }

    /// Explicit user choice
    #[instrument(skip(self, team), fields(team = %team.slug))]
    pub async fn select(&self, team: &Team) -> Result<SelectedTeam> {
        let selected = SelectedTeam::from(team);
        store::save_selected_team(self.store.pool(), &selected).await?;
        info!(team = %selected.slug, "Selected team");
        Ok(selected)
    }

    pub async fn select_slug(&self, slug: &str) -> Result<SelectedTeam> {
        let team = teams::team_by_slug(&self.client, slug).await?;
        self.select(&team).await
    }

    /// Keep a still-valid selection, otherwise fall back to the first team
    pub async fn ensure_default(&self, teams: &[Team]) -> Result<Option<SelectedTeam>> {
        if let Some(current) = self.current().await? {
            if let Some(team) = teams.iter().find(|t| t.id == current.id) {
                // Pick up renames
                let fresh = SelectedTeam::from(team);
                if fresh != current {
                    store::save_selected_team(self.store.pool(), &fresh).await?;
                }
                return Ok(Some(fresh));
            }
            debug!(team = %current.slug, "Stored team no longer available");
        }

        match teams.first() {
            Some(first) => self.select(first).await.map(Some),
            None => {
                self.clear().await?;
                Ok(None)
            }
        }
    }

    /// Current selection, defaulting from the user's teams when unset
    pub async fn resolve(&self) -> Result<SelectedTeam> {
        if let Some(current) = self.current().await? {
            return Ok(current);
        }
        let teams = teams::my_teams(&self.client).await?;
        self.ensure_default(&teams).await?.ok_or(Error::NoTeamSelected)
    }

    pub async fn clear(&self) -> Result<()> {
        store::delete_selected_team(self.store.pool()).await
    }

    /// Teams of the current user; reconciles the selection as a side effect
    pub async fn list(&self) -> Result<Vec<Team>> {
        let teams = teams::my_teams(&self.client).await?;
        self.ensure_default(&teams).await?;
        Ok(teams)
    }

    /// Create a team and switch to it
    pub async fn create(&self, name: &str, slug: Option<&str>) -> Result<Team> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("name", "must not be empty"));
        }
        let team = teams::create_team(&self.client, name, slug).await?;
        self.select(&team).await?;
        Ok(team)
    }

    pub async fn leave(&self, team_id: &str) -> Result<bool> {
        let left = teams::leave_team(&self.client, team_id).await?;
        if left {
            self.forget(team_id).await?;
        }
        Ok(left)
    }

    pub async fn delete(&self, team_id: &str) -> Result<bool> {
        let deleted = teams::delete_team(&self.client, team_id).await?;
        if deleted {
            self.forget(team_id).await?;
        }
        Ok(deleted)
    }

    async fn forget(&self, team_id: &str) -> Result<()> {
        if self.current().await?.is_some_and(|t| t.id == team_id) {
            info!(team_id, "Clearing selection of team no longer available");
            self.clear().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{signed_in_client, FakeTransport};
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::sync::Arc;

    fn team(id: &str, slug: &str) -> Team {
        Team {
            id: id.into(),
            name: slug.to_uppercase(),
            slug: slug.into(),
            members: vec![],
            created_at: None,
            updated_at: None,
        }
    }

    async fn manager(transport: Arc<FakeTransport>) -> TeamManager {
        let client = signed_in_client(transport).await;
        TeamManager::new(client, Store::in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn defaults_to_first_team() {
        let teams = manager(FakeTransport::new()).await;
        let selected = teams
            .ensure_default(&[team("t1", "ops"), team("t2", "dev")])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(selected.id, "t1");
        assert_eq!(teams.current().await.unwrap().unwrap().slug, "ops");
    }

    #[tokio::test]
    async fn keeps_valid_selection_and_replaces_stale_one() {
        let teams = manager(FakeTransport::new()).await;
        teams.select(&team("t2", "dev")).await.unwrap();

        let kept = teams
            .ensure_default(&[team("t1", "ops"), team("t2", "dev")])
            .await
            .unwrap();
        assert_eq!(kept.unwrap().id, "t2");

        // t2 no longer among the user's teams
        let replaced = teams.ensure_default(&[team("t1", "ops")]).await.unwrap();
        assert_eq!(replaced.unwrap().id, "t1");

        assert!(teams.ensure_default(&[]).await.unwrap().is_none());
        assert!(teams.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaving_selected_team_clears_it() {
        let transport = FakeTransport::new().respond("LeaveTeam", json!({ "leaveTeam": true }));
        let teams = manager(transport).await;
        teams.select(&team("t1", "ops")).await.unwrap();

        assert!(teams.leave("t1").await.unwrap());
        assert!(teams.current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_other_team_keeps_selection() {
        let transport = FakeTransport::new().respond("DeleteTeam", json!({ "deleteTeam": true }));
        let teams = manager(transport.clone()).await;
        teams.select(&team("t1", "ops")).await.unwrap();

        assert!(teams.delete("t2").await.unwrap());
        assert_eq!(teams.current().await.unwrap().unwrap().id, "t1");

        assert!(teams.delete("t1").await.unwrap());
        assert!(teams.current().await.unwrap().is_none());
        assert_eq!(transport.count("DeleteTeam"), 2);
    }

    #[tokio::test]
    async fn created_team_becomes_current() {
        let transport = FakeTransport::new().respond(
            "CreateTeam",
            json!({ "createTeam": { "id": "t9", "name": "New", "slug": "new" } }),
        );
        let teams = manager(transport).await;

        teams.create("New", None).await.unwrap();
        assert_eq!(teams.current().await.unwrap().unwrap().id, "t9");
    }

    #[tokio::test]
    async fn resolve_without_teams_fails() {
        let transport = FakeTransport::new().respond("MyTeams", json!({ "myTeams": [] }));
        let teams = manager(transport).await;
        assert_matches!(teams.resolve().await, Err(Error::NoTeamSelected));
    }
}
