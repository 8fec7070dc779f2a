use crate::models::{SelectedTeam, UserProfile};
use crate::session::TokenPair;

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub profile: UserProfile,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct TokensRow {
    pub tokens: TokenPair,
    pub updated_at: String,
}

#[derive(Debug, Clone)]
pub struct SelectedTeamRow {
    pub team: SelectedTeam,
    pub selected_at: String,
}
