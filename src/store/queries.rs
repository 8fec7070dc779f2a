use super::models::*;
use crate::error::Result;
use crate::models::{SelectedTeam, UserProfile};
use crate::session::TokenPair;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

impl SessionRow {
    pub fn from_row(row: SqliteRow) -> Result<Self> {
        let profile: String = row.get("profile");
        Ok(Self {
            profile: serde_json::from_str(&profile)?,
            updated_at: row.get("updated_at"),
        })
    }
}

impl TokensRow {
    pub fn from_row(row: SqliteRow) -> Result<Self> {
        Ok(Self {
            tokens: TokenPair::new(row.get("access_token"), row.get("refresh_token")),
            updated_at: row.get("updated_at"),
        })
    }
}

impl SelectedTeamRow {
    pub fn from_row(row: SqliteRow) -> Result<Self> {
        Ok(Self {
            team: SelectedTeam {
                id: row.get("team_id"),
                name: row.get("name"),
                slug: row.get("slug"),
            },
            selected_at: row.get("selected_at"),
        })
    }
}

pub async fn get_session(pool: &SqlitePool) -> Result<Option<SessionRow>> {
    let row = sqlx::query("SELECT profile, updated_at FROM session WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    row.map(SessionRow::from_row).transpose()
}

pub async fn save_session(pool: &SqlitePool, profile: &UserProfile) -> Result<()> {
    let profile = serde_json::to_string(profile)?;
    sqlx::query(
        r#"
        INSERT INTO session (id, profile) VALUES (1, ?1)
        ON CONFLICT(id) DO UPDATE SET profile = excluded.profile, updated_at = datetime('now')
        "#,
    )
    .bind(profile)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_session(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM session").execute(pool).await?;
    Ok(())
}

pub async fn get_tokens(pool: &SqlitePool) -> Result<Option<TokensRow>> {
    let row = sqlx::query("SELECT access_token, refresh_token, updated_at FROM tokens WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    row.map(TokensRow::from_row).transpose()
}

/// Both tokens go through one statement; a reader never sees half a pair
pub async fn save_tokens(pool: &SqlitePool, tokens: &TokenPair) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tokens (id, access_token, refresh_token) VALUES (1, ?1, ?2)
        ON CONFLICT(id) DO UPDATE SET
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            updated_at = datetime('now')
        "#,
    )
    .bind(tokens.access_token())
    .bind(tokens.refresh_token())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_tokens(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM tokens").execute(pool).await?;
    Ok(())
}

pub async fn get_selected_team(pool: &SqlitePool) -> Result<Option<SelectedTeamRow>> {
    let row = sqlx::query("SELECT team_id, name, slug, selected_at FROM selected_team WHERE id = 1")
        .fetch_optional(pool)
        .await?;

    row.map(SelectedTeamRow::from_row).transpose()
}

pub async fn save_selected_team(pool: &SqlitePool, team: &SelectedTeam) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO selected_team (id, team_id, name, slug) VALUES (1, ?1, ?2, ?3)
        ON CONFLICT(id) DO UPDATE SET
            team_id = excluded.team_id,
            name = excluded.name,
            slug = excluded.slug,
            selected_at = datetime('now')
        "#,
    )
    .bind(&team.id)
    .bind(&team.name)
    .bind(&team.slug)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_selected_team(pool: &SqlitePool) -> Result<()> {
    sqlx::query("DELETE FROM selected_team").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    fn profile() -> UserProfile {
        UserProfile {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn session_round_trips_and_overwrites() {
        let store = Store::in_memory().await.unwrap();
        assert!(get_session(store.pool()).await.unwrap().is_none());

        save_session(store.pool(), &profile()).await.unwrap();
        let mut renamed = profile();
        renamed.name = "Ada L.".into();
        save_session(store.pool(), &renamed).await.unwrap();

        let row = get_session(store.pool()).await.unwrap().unwrap();
        assert_eq!(row.profile.name, "Ada L.");

        delete_session(store.pool()).await.unwrap();
        assert!(get_session(store.pool()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn tokens_are_replaced_as_a_pair() {
        let store = Store::in_memory().await.unwrap();
        save_tokens(store.pool(), &TokenPair::new("a1".into(), "r1".into()))
            .await
            .unwrap();
        save_tokens(store.pool(), &TokenPair::new("a2".into(), "r2".into()))
            .await
            .unwrap();

        let row = get_tokens(store.pool()).await.unwrap().unwrap();
        assert_eq!(row.tokens.access_token(), "a2");
        assert_eq!(row.tokens.refresh_token(), "r2");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tokens")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn selected_team_is_single_row() {
        let store = Store::in_memory().await.unwrap();
        let ops = SelectedTeam {
            id: "t1".into(),
            name: "Ops".into(),
            slug: "ops".into(),
        };
        let dev = SelectedTeam {
            id: "t2".into(),
            name: "Dev".into(),
            slug: "dev".into(),
        };

        save_selected_team(store.pool(), &ops).await.unwrap();
        save_selected_team(store.pool(), &dev).await.unwrap();
        let row = get_selected_team(store.pool()).await.unwrap().unwrap();
        assert_eq!(row.team, dev);

        delete_selected_team(store.pool()).await.unwrap();
        assert!(get_selected_team(store.pool()).await.unwrap().is_none());
    }
}
