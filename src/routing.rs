//! Client-side routes and login gating.

use std::fmt;

use url::Url;

/// A screen of the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Home,
    Chat(String),
    Image(String),
    /// Public read-only transcript.
    View(String),
    Realtime,
    Admin,
    Login { expired: bool },
    Register,
}

impl Route {
    /// Parse a client path such as `/chat/abc` or `/login?expired=true`.
    /// Unknown paths yield `None`.
    pub fn parse(path: &str) -> Option<Self> {
        let base = Url::parse("http://client.invalid/").ok()?;
        let url = base.join(path).ok()?;
        let segments: Vec<String> = url
            .path_segments()?
            .filter(|s| !s.is_empty())
            .map(|s| {
                urlencoding::decode(s)
                    .map(|d| d.into_owned())
                    .unwrap_or_else(|_| s.to_string())
            })
            .collect();

        let route = match segments.as_slice() {
            [] => Self::Home,
            [page, id] if page == "chat" => Self::Chat(id.clone()),
            [page, id] if page == "image" => Self::Image(id.clone()),
            [page, id] if page == "view" => Self::View(id.clone()),
            [page] if page == "realtime" => Self::Realtime,
            [page] if page == "admin" => Self::Admin,
            [page] if page == "login" => Self::Login {
                expired: url.query_pairs().any(|(k, v)| k == "expired" && v == "true"),
            },
            [page] if page == "register" => Self::Register,
            _ => return None,
        };
        Some(route)
    }

    /// Whether the screen needs a session.
    pub fn requires_login(&self) -> bool {
        !matches!(self, Self::View(_) | Self::Login { .. } | Self::Register)
    }

    /// Login or register.
    pub fn is_auth_page(&self) -> bool {
        matches!(self, Self::Login { .. } | Self::Register)
    }

    /// Sidebar is shown to signed-in users outside the auth pages.
    pub fn shows_sidebar(&self, logged_in: bool) -> bool {
        logged_in && !self.is_auth_page()
    }

    /// Header is additionally hidden on the public view.
    pub fn shows_header(&self, logged_in: bool) -> bool {
        self.shows_sidebar(logged_in) && !matches!(self, Self::View(_))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Home => f.write_str("/"),
            Self::Chat(id) => write!(f, "/chat/{}", urlencoding::encode(id)),
            Self::Image(id) => write!(f, "/image/{}", urlencoding::encode(id)),
            Self::View(id) => write!(f, "/view/{}", urlencoding::encode(id)),
            Self::Realtime => f.write_str("/realtime"),
            Self::Admin => f.write_str("/admin"),
            Self::Login { expired: true } => f.write_str("/login?expired=true"),
            Self::Login { expired: false } => f.write_str("/login"),
            Self::Register => f.write_str("/register"),
        }
    }
}

/// Who is signed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuthState {
    pub logged_in: bool,
    pub admin: bool,
}

/// The route actually shown for `requested`.
///
/// Signed-out users are sent to login; signed-in users are sent home from
/// the auth pages. The admin screen is only shown to administrators.
pub fn gate(requested: Route, auth: AuthState) -> Route {
    match requested {
        route if route.requires_login() && !auth.logged_in => Route::Login { expired: false },
        route if route.is_auth_page() && auth.logged_in => Route::Home,
        Route::Admin if !auth.admin => Route::Home,
        route => route,
    }
}

/// Redirect taken when the backend answers 401 while `current` is shown.
/// Nothing happens on the login and register pages.
pub fn expired_redirect(current: &Route) -> Option<Route> {
    (!current.is_auth_page()).then_some(Route::Login { expired: true })
}

/// A route change with an optional flash message for the target screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub route: Route,
    pub flash: Option<String>,
}

impl Navigation {
    pub fn to(route: Route) -> Self {
        Self { route, flash: None }
    }

    pub fn with_flash(route: Route, flash: impl Into<String>) -> Self {
        Self {
            route,
            flash: Some(flash.into()),
        }
    }
}
