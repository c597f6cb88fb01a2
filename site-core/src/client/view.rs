use crate::models::{AdminEmail, Session};

/// What the auth gate currently knows about the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    /// No notification has arrived from the session store yet.
    Loading,
    Ready(Option<Session>),
}

impl GateState {
    pub fn session(&self) -> Option<&Session> {
        match self {
            GateState::Loading => None,
            GateState::Ready(session) => session.as_ref(),
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, GateState::Loading)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewMode {
    Loading,
    LoginForm,
    AdminPanel,
    PublicSite,
}

/// Picks the screen for a gate state. Depends only on the latest state, so
/// skipped or coalesced notifications cannot change the outcome.
pub fn view_mode(state: &GateState, admin: &AdminEmail) -> ViewMode {
    match state {
        GateState::Loading => ViewMode::Loading,
        GateState::Ready(None) => ViewMode::LoginForm,
        GateState::Ready(Some(session)) if admin.matches(Some(session)) => ViewMode::AdminPanel,
        GateState::Ready(Some(_)) => ViewMode::PublicSite,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> AdminEmail {
        AdminEmail::parse("admin@x.com").unwrap()
    }

    #[test]
    fn loading_before_first_notification() {
        assert_eq!(view_mode(&GateState::Loading, &admin()), ViewMode::Loading);
    }

    #[test]
    fn absent_session_shows_login() {
        assert_eq!(view_mode(&GateState::Ready(None), &admin()), ViewMode::LoginForm);
    }

    #[test]
    fn admin_session_shows_panel() {
        let state = GateState::Ready(Some(Session::credentialed("u", "t", "admin@x.com")));
        assert_eq!(view_mode(&state, &admin()), ViewMode::AdminPanel);
    }

    #[test]
    fn other_sessions_show_public_site() {
        let anon = GateState::Ready(Some(Session::anonymous("u", "t")));
        let reader = GateState::Ready(Some(Session::credentialed("u", "t", "reader@x.com")));
        assert_eq!(view_mode(&anon, &admin()), ViewMode::PublicSite);
        assert_eq!(view_mode(&reader, &admin()), ViewMode::PublicSite);
    }
}
