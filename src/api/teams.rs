use super::client::ApiClient;
use crate::error::{Error, Result};
use crate::models::{Team, TeamInvite, TeamMember, TeamRole};
use serde::Deserialize;
use serde_json::json;

pub const MY_TEAMS: &str = r#"
query MyTeams {
  myTeams { id name slug createdAt }
}"#;

pub const TEAM: &str = r#"
query Team($id: ID!) {
  team(id: $id) {
    id name slug
    members { id userId role user { id name email avatarUrl } }
    createdAt updatedAt
  }
}"#;

pub const TEAM_BY_SLUG: &str = r#"
query TeamBySlug($slug: String!) {
  teamBySlug(slug: $slug) {
    id name slug
    members { id userId role user { id name email avatarUrl } }
    createdAt updatedAt
  }
}"#;

pub const CREATE_TEAM: &str = r#"
mutation CreateTeam($input: CreateTeamInput!) {
  createTeam(input: $input) { id name slug }
}"#;

pub const UPDATE_TEAM: &str = r#"
mutation UpdateTeam($input: UpdateTeamInput!) {
  updateTeam(input: $input) { id name slug }
}"#;

pub const DELETE_TEAM: &str = r#"
mutation DeleteTeam($teamId: ID!) {
  deleteTeam(teamId: $teamId)
}"#;

pub const INVITE_TEAM_MEMBER: &str = r#"
mutation InviteTeamMember($input: InviteTeamMemberInput!) {
  inviteTeamMember(input: $input) { id status }
}"#;

pub const ACCEPT_TEAM_INVITE: &str = r#"
mutation AcceptTeamInvite($input: AcceptTeamInviteInput!) {
  acceptTeamInvite(input: $input) { id role }
}"#;

pub const UPDATE_TEAM_MEMBER_ROLE: &str = r#"
mutation UpdateTeamMemberRole($input: UpdateTeamMemberRoleInput!) {
  updateTeamMemberRole(input: $input) { id role }
}"#;

pub const REMOVE_TEAM_MEMBER: &str = r#"
mutation RemoveTeamMember($input: RemoveTeamMemberInput!) {
  removeTeamMember(input: $input)
}"#;

pub const LEAVE_TEAM: &str = r#"
mutation LeaveTeam($teamId: ID!) {
  leaveTeam(teamId: $teamId)
}"#;

pub const TRANSFER_TEAM_OWNERSHIP: &str = r#"
mutation TransferTeamOwnership($teamId: ID!, $newOwnerId: ID!) {
  transferTeamOwnership(teamId: $teamId, newOwnerId: $newOwnerId) { id }
}"#;

/// `{ id }` answer of ownership transfer
#[derive(Debug, Deserialize)]
struct TeamId {
    id: String,
}

pub async fn my_teams(client: &ApiClient) -> Result<Vec<Team>> {
    client.query(MY_TEAMS, "MyTeams", json!({}), "myTeams").await
}

pub async fn team(client: &ApiClient, id: &str) -> Result<Team> {
    let team: Option<Team> = client.query(TEAM, "Team", json!({ "id": id }), "team").await?;
    team.ok_or_else(|| Error::NotFound {
        what: format!("Team {}", id),
    })
}

pub async fn team_by_slug(client: &ApiClient, slug: &str) -> Result<Team> {
    let team: Option<Team> = client
        .query(TEAM_BY_SLUG, "TeamBySlug", json!({ "slug": slug }), "teamBySlug")
        .await?;
    team.ok_or_else(|| Error::TeamNotFound {
        slug: slug.to_string(),
    })
}

pub async fn create_team(client: &ApiClient, name: &str, slug: Option<&str>) -> Result<Team> {
    let mut input = json!({ "name": name });
    if let Some(slug) = slug {
        input["slug"] = json!(slug);
    }
    client
        .query(CREATE_TEAM, "CreateTeam", json!({ "input": input }), "createTeam")
        .await
}

pub async fn update_team(client: &ApiClient, team_id: &str, name: &str) -> Result<Team> {
    client
        .query(
            UPDATE_TEAM,
            "UpdateTeam",
            json!({ "input": { "teamId": team_id, "name": name } }),
            "updateTeam",
        )
        .await
}

pub async fn delete_team(client: &ApiClient, team_id: &str) -> Result<bool> {
    client
        .query(DELETE_TEAM, "DeleteTeam", json!({ "teamId": team_id }), "deleteTeam")
        .await
}

pub async fn invite_member(
    client: &ApiClient,
    team_id: &str,
    email: &str,
    role: TeamRole,
) -> Result<TeamInvite> {
    client
        .query(
            INVITE_TEAM_MEMBER,
            "InviteTeamMember",
            json!({ "input": { "teamId": team_id, "email": email, "role": role } }),
            "inviteTeamMember",
        )
        .await
}

pub async fn accept_invite(client: &ApiClient, token: &str) -> Result<TeamMember> {
    client
        .query(
            ACCEPT_TEAM_INVITE,
            "AcceptTeamInvite",
            json!({ "input": { "token": token } }),
            "acceptTeamInvite",
        )
        .await
}

pub async fn update_member_role(
    client: &ApiClient,
    team_id: &str,
    user_id: &str,
    role: TeamRole,
) -> Result<TeamMember> {
    client
        .query(
            UPDATE_TEAM_MEMBER_ROLE,
            "UpdateTeamMemberRole",
            json!({ "input": { "teamId": team_id, "userId": user_id, "role": role } }),
            "updateTeamMemberRole",
        )
        .await
}

pub async fn remove_member(client: &ApiClient, team_id: &str, user_id: &str) -> Result<bool> {
    client
        .query(
            REMOVE_TEAM_MEMBER,
            "RemoveTeamMember",
            json!({ "input": { "teamId": team_id, "userId": user_id } }),
            "removeTeamMember",
        )
        .await
}

pub async fn leave_team(client: &ApiClient, team_id: &str) -> Result<bool> {
    client
        .query(LEAVE_TEAM, "LeaveTeam", json!({ "teamId": team_id }), "leaveTeam")
        .await
}

pub async fn transfer_ownership(
    client: &ApiClient,
    team_id: &str,
    new_owner_id: &str,
) -> Result<String> {
    let team: TeamId = client
        .query(
            TRANSFER_TEAM_OWNERSHIP,
            "TransferTeamOwnership",
            json!({ "teamId": team_id, "newOwnerId": new_owner_id }),
            "transferTeamOwnership",
        )
        .await?;
    Ok(team.id)
}
