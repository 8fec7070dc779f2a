use crate::api::{ApiClient, ReconnectPolicy, SubscriptionClient};
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::managers::{AuthManager, TeamManager};
use crate::models::SelectedTeam;
use crate::session::{AuthSignal, Session, Signals};
use crate::store::{self, Store};
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs: config, local store and the API client
pub struct Context {
    pub config: Config,
    pub store: Store,
    pub client: ApiClient,
    logged_out: Arc<AtomicBool>,
}

impl Context {
    pub async fn load() -> Result<Self> {
        let config = config::load()?;
        config.validate().map_err(Error::ConfigError)?;

        let store = Store::open().await?;
        let session = Session::restore(Arc::new(store.clone())).await?;

        // Interceptor logouts are handled once the command settles
        let signals = Signals::new();
        let logged_out = Arc::new(AtomicBool::new(false));
        let flag = logged_out.clone();
        signals.subscribe(move |signal| {
            if signal == AuthSignal::Logout {
                flag.store(true, Ordering::SeqCst);
            }
        });

        let client = ApiClient::connect(&config.endpoints, session, signals);
        debug!(graphql = %config.endpoints.graphql_url, "Client ready");

        Ok(Self {
            config,
            store,
            client,
            logged_out,
        })
    }

    /// Load and require a signed-in session
    pub async fn authenticated() -> Result<Self> {
        let ctx = Self::load().await?;
        if ctx.client.session().tokens().await.is_none() {
            return Err(Error::NotLoggedIn);
        }
        Ok(ctx)
    }

    pub fn auth(&self) -> AuthManager {
        AuthManager::new(self.client.clone(), self.store.clone())
    }

    pub fn teams(&self) -> TeamManager {
        TeamManager::new(self.client.clone(), self.store.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionClient {
        SubscriptionClient::for_client(
            &self.client,
            self.config.endpoints.ws_url.clone(),
            ReconnectPolicy::from(&self.config.subscriptions),
        )
    }

    /// Selected team, defaulting to the user's first team
    pub async fn team(&self) -> Result<SelectedTeam> {
        self.teams().resolve().await
    }

    /// Finish a command: a logout raised by the interceptor drops the team too
    pub async fn settle<T>(&self, result: Result<T>) -> Result<T> {
        if !self.logged_out.load(Ordering::SeqCst) {
            return result;
        }
        if let Err(e) = store::delete_selected_team(self.store.pool()).await {
            warn!(error = %e, "Failed to clear selected team after logout");
        }
        result.map_err(after_logout)
    }
}

/// Once the session is gone, a rejected token means the user must sign in again
fn after_logout(err: Error) -> Error {
    match err {
        Error::Unauthenticated { .. } | Error::NotLoggedIn => Error::SessionExpired,
        other => other,
    }
}

/// Read one line from stdin after printing `label`
pub fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

/// Ask for confirmation unless `yes` was passed
pub fn confirm(question: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let answer = prompt(&format!("{} [y/N]: ", question))?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn rejected_tokens_surface_as_session_expired_after_logout() {
        let err = after_logout(Error::Unauthenticated {
            message: "jwt expired".into(),
        });
        assert_matches!(err, Error::SessionExpired);

        let err = after_logout(Error::Forbidden {
            message: "not a member".into(),
        });
        assert_matches!(err, Error::Forbidden { .. });

        let err = after_logout(Error::NoTeamSelected);
        assert_matches!(err, Error::NoTeamSelected);
    }
}
