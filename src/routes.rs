// Route table and guards.
// Maps dashboard paths to pages and decides redirects from the stored credential alone.

use crate::query::QueryKey;
use crate::storage::Credentials;

use crate::hooks::keys;

pub const SIGN_IN_PATH: &str = "/sign-in";
pub const DASHBOARD_PATH: &str = "/dashboard";

/// A page of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Page {
    SignIn,
    SignUp,
    VerifyOtp,
    Dashboard,
    Foods,
    NewFood,
    Profile,
    ChangePassword,
    NotFound,
}

impl Page {
    /// Get the display title for this page.
    pub fn title(&self) -> &'static str {
        match self {
            Page::SignIn => "Sign in",
            Page::SignUp => "Sign up",
            Page::VerifyOtp => "Verify OTP",
            Page::Dashboard => "Dashboard",
            Page::Foods => "Foods",
            Page::NewFood => "New food",
            Page::Profile => "Profile",
            Page::ChangePassword => "Change password",
            Page::NotFound => "Page not found",
        }
    }

    /// Cache keys the page reads when it renders.
    pub fn queries(&self) -> Vec<QueryKey> {
        match self {
            Page::Foods => vec![keys::foods()],
            _ => Vec::new(),
        }
    }
}

/// Access rule wrapped around a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Always rendered.
    Public,
    /// Auth pages: signed-in users are sent to the dashboard.
    AuthRedirect,
    /// Dashboard pages: anonymous users are sent to sign-in.
    Protected,
}

impl Guard {
    /// Where to redirect, if anywhere, given whether a credential is stored.
    pub fn evaluate(&self, authenticated: bool) -> Option<&'static str> {
        match (self, authenticated) {
            (Guard::AuthRedirect, true) => Some(DASHBOARD_PATH),
            (Guard::Protected, false) => Some(SIGN_IN_PATH),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub page: Page,
    pub guard: Guard,
}

const fn route(path: &'static str, page: Page, guard: Guard) -> Route {
    Route { path, page, guard }
}

pub const ROUTES: &[Route] = &[
    route("/", Page::SignIn, Guard::AuthRedirect),
    route("/sign-in", Page::SignIn, Guard::AuthRedirect),
    route("/sign-up", Page::SignUp, Guard::AuthRedirect),
    route("/verify-otp", Page::VerifyOtp, Guard::AuthRedirect),
    route("/dashboard", Page::Dashboard, Guard::Protected),
    route("/dashboard/foods", Page::Foods, Guard::Protected),
    route("/dashboard/foods/new", Page::NewFood, Guard::Protected),
    route("/profile", Page::Profile, Guard::Protected),
    route("/change-password", Page::ChangePassword, Guard::Protected),
    route("/404", Page::NotFound, Guard::Public),
];

static FALLBACK: Route = route("*", Page::NotFound, Guard::Public);

/// Outcome of navigating to a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Render(Page),
    Redirect(&'static str),
}

/// Find the route for `path`, ignoring query string, fragment and trailing slash.
/// Unknown paths map to the not-found page.
pub fn match_route(path: &str) -> &'static Route {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim_end_matches('/');
    let path = if trimmed.is_empty() { "/" } else { trimmed };

    ROUTES
        .iter()
        .find(|route| route.path == path)
        .unwrap_or(&FALLBACK)
}

pub fn resolve(path: &str, authenticated: bool) -> Resolution {
    let route = match_route(path);
    match route.guard.evaluate(authenticated) {
        Some(target) => Resolution::Redirect(target),
        None => Resolution::Render(route.page),
    }
}

/// Resolve against the stored credential, read fresh on every call.
pub fn resolve_with(path: &str, credentials: &Credentials) -> Resolution {
    resolve(path, credentials.is_authenticated())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    #[test]
    fn test_match_route_normalises_path() {
        assert_eq!(match_route("/dashboard/foods/").page, Page::Foods);
        assert_eq!(match_route("/dashboard/foods?page=2").page, Page::Foods);
        assert_eq!(match_route("/sign-up#top").page, Page::SignUp);
        assert_eq!(match_route("").page, Page::SignIn);
        assert_eq!(match_route("/nowhere").page, Page::NotFound);
    }

    #[test]
    fn test_guards() {
        assert_eq!(Guard::Public.evaluate(true), None);
        assert_eq!(Guard::Public.evaluate(false), None);
        assert_eq!(Guard::AuthRedirect.evaluate(true), Some("/dashboard"));
        assert_eq!(Guard::AuthRedirect.evaluate(false), None);
        assert_eq!(Guard::Protected.evaluate(false), Some("/sign-in"));
        assert_eq!(Guard::Protected.evaluate(true), None);
    }

    #[test]
    fn test_resolve() {
        assert_eq!(resolve("/", false), Resolution::Render(Page::SignIn));
        assert_eq!(resolve("/", true), Resolution::Redirect("/dashboard"));
        assert_eq!(resolve("/profile", false), Resolution::Redirect("/sign-in"));
        assert_eq!(resolve("/dashboard/foods/new", true), Resolution::Render(Page::NewFood));
        assert_eq!(resolve("/missing", false), Resolution::Render(Page::NotFound));
        assert_eq!(resolve("/404", true), Resolution::Render(Page::NotFound));
    }

    #[test]
    fn test_resolve_with_rereads_credential() {
        let temp_dir = TempDir::new().unwrap();
        let credentials = Credentials::new(LocalStorage::at(temp_dir.path().join("storage.json")));

        assert_eq!(
            resolve_with("/dashboard", &credentials),
            Resolution::Redirect("/sign-in")
        );
        credentials.store_token("abc123").unwrap();
        assert_eq!(
            resolve_with("/dashboard", &credentials),
            Resolution::Render(Page::Dashboard)
        );
        credentials.clear().unwrap();
        assert_eq!(
            resolve_with("/sign-in", &credentials),
            Resolution::Render(Page::SignIn)
        );
    }

    #[test]
    fn test_page_queries() {
        assert_eq!(Page::Foods.queries(), vec![keys::foods()]);
        assert!(Page::SignIn.queries().is_empty());
        assert_eq!(Page::ChangePassword.title(), "Change password");
    }
}
