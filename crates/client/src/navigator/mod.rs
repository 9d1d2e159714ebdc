//! In-app navigation with resident views.
//!
//! Every visited page stays in the content region as a [`ViewSnapshot`];
//! revisiting toggles visibility instead of fetching. At most one
//! navigation runs at a time and calls made meanwhile are dropped.

pub mod markup;
pub mod surface;
pub mod view;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arcade_core::{AppConfig, Error};
use url::Url;

pub use markup::{Script, extract_scripts};
pub use surface::{DisplaySurface, History, TransitionPlan, plan_transition};
pub use view::{ViewRegistry, ViewSnapshot, view_id};

use crate::fetch::{Network, PARTIAL_NAVIGATION_HEADER, Request, resolve};

/// What a navigation call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Already showing the path.
    Unchanged,
    /// Another navigation was in flight.
    Dropped,
    Switched { view_id: String, fetched: bool },
}

/// Releases the in-flight flag on every exit path.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Navigator {
    origin: Url,
    network: Arc<dyn Network>,
    surface: Arc<dyn DisplaySurface>,
    history: Arc<dyn History>,
    transition_delay: Duration,
    views: Mutex<ViewRegistry>,
    current_path: Mutex<String>,
    in_flight: AtomicBool,
}

impl Navigator {
    /// Adopt the page already on screen as the view for `current_path`.
    pub fn new(
        config: &AppConfig, current_path: &str, network: Arc<dyn Network>, surface: Arc<dyn DisplaySurface>,
        history: Arc<dyn History>,
    ) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::InvalidUrl(format!("{}: {}", config.origin, e)))?;
        let markup = surface
            .main_region_markup()
            .ok_or_else(|| Error::NotReady("main content region not found".into()))?;

        let current = ViewSnapshot::new(current_path, markup, true);
        surface.adopt_current(&current.id);

        let mut views = ViewRegistry::default();
        views.insert(current);

        Ok(Self {
            origin,
            network,
            surface,
            history,
            transition_delay: config.transition_delay(),
            views: Mutex::new(views),
            current_path: Mutex::new(current_path.to_string()),
            in_flight: AtomicBool::new(false),
        })
    }

    pub fn current_path(&self) -> String {
        self.current_path.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_resident(&self, path: &str) -> bool {
        self.views.lock().unwrap_or_else(|e| e.into_inner()).contains(&view_id(path))
    }

    /// Show the view for `path`, fetching it the first time.
    pub async fn navigate(&self, path: &str) -> Result<NavigationOutcome, Error> {
        if self.current_path() == path {
            return Ok(NavigationOutcome::Unchanged);
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            tracing::debug!(path, "navigation in flight, dropping");
            return Ok(NavigationOutcome::Dropped);
        }
        let _in_flight = InFlight(&self.in_flight);

        let id = view_id(path);
        let fetched = !self.is_resident(path);
        if fetched {
            self.load_view(path).await.inspect_err(|e| {
                tracing::error!(path, error = %e, "navigation failed");
            })?;
        }

        let from = self.views.lock().unwrap_or_else(|e| e.into_inner()).visible_id();
        let plan =
            plan_transition(from.as_deref(), &id, self.surface.supports_view_transition(), self.transition_delay);
        plan.apply(self.surface.as_ref()).await;

        let resident = {
            let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
            views.show_only(plan.target());
            views.len()
        };
        *self.current_path.lock().unwrap_or_else(|e| e.into_inner()) = path.to_string();
        tracing::debug!(path, view = %id, fetched, resident, "navigated");

        Ok(NavigationOutcome::Switched { view_id: id, fetched })
    }

    /// Fetch `path`, append it hidden and run its scripts.
    async fn load_view(&self, path: &str) -> Result<(), Error> {
        let url = resolve(&self.origin, path).map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))?;
        let (name, value) = PARTIAL_NAVIGATION_HEADER;
        let response = self.network.fetch(&Request::get(url).with_header(name, value)).await?;
        if !response.status.is_success() {
            return Err(Error::NetworkFailure(format!("HTTP {}", response.status.as_u16())));
        }

        let snapshot = ViewSnapshot::new(path, response.text(), false);
        self.surface.append_view(&snapshot);
        for script in extract_scripts(&snapshot.markup) {
            self.surface.run_script(&snapshot.id, &script);
        }
        self.surface.dispatch_view_loaded();

        self.views.lock().unwrap_or_else(|e| e.into_inner()).insert(snapshot);
        Ok(())
    }

    /// Handle a click on a nav link. The caller suppresses the default
    /// action; history is pushed without a reload.
    pub async fn on_link_click(&self, href: &str) -> Result<NavigationOutcome, Error> {
        if self.current_path() == href {
            return Ok(NavigationOutcome::Unchanged);
        }
        self.surface.highlight_nav(href);
        self.history.push(href);
        self.navigate(href).await
    }

    /// Back/forward restored `path`.
    pub async fn on_history_pop(&self, path: &str) -> Result<NavigationOutcome, Error> {
        self.navigate(path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedNetwork;
    use async_trait::async_trait;

    #[derive(Default)]
    struct FakeSurface {
        atomic: bool,
        ops: Mutex<Vec<String>>,
    }

    impl FakeSurface {
        fn record(&self, op: String) {
            self.ops.lock().unwrap().push(op);
        }

        fn ops(&self) -> Vec<String> {
            self.ops.lock().unwrap().clone()
        }

        fn count(&self, prefix: &str) -> usize {
            self.ops().iter().filter(|op| op.starts_with(prefix)).count()
        }
    }

    #[async_trait]
    impl DisplaySurface for FakeSurface {
        fn main_region_markup(&self) -> Option<String> {
            Some("<h1>Recent games</h1>".into())
        }

        fn adopt_current(&self, id: &str) {
            self.record(format!("adopt {id}"));
        }

        fn append_view(&self, view: &ViewSnapshot) {
            self.record(format!("append {}", view.id));
        }

        fn set_visible(&self, id: &str, visible: bool) {
            self.record(format!("visible {id} {visible}"));
        }

        fn set_opacity(&self, id: &str, opacity: f32) {
            self.record(format!("opacity {id} {opacity}"));
        }

        fn run_script(&self, id: &str, script: &Script) {
            self.record(format!("script {id} {}", script.attribute("src").unwrap_or("inline")));
        }

        fn dispatch_view_loaded(&self) {
            self.record("viewLoaded".into());
        }

        fn highlight_nav(&self, path: &str) {
            self.record(format!("highlight {path}"));
        }

        fn supports_view_transition(&self) -> bool {
            self.atomic
        }

        async fn view_transition(&self, from: Option<&str>, to: &str) {
            self.record(format!("transition {} -> {to}", from.unwrap_or("none")));
        }
    }

    #[derive(Default)]
    struct FakeHistory(Mutex<Vec<String>>);

    impl History for FakeHistory {
        fn push(&self, path: &str) {
            self.0.lock().unwrap().push(path.to_string());
        }
    }

    struct Setup {
        network: Arc<ScriptedNetwork>,
        surface: Arc<FakeSurface>,
        history: Arc<FakeHistory>,
        navigator: Navigator,
    }

    fn setup(atomic: bool) -> Setup {
        let network = Arc::new(ScriptedNetwork::new());
        network
            .route("http://localhost:5000/week", 200, r#"<canvas></canvas><script src="/static/js/pages/week.js"></script>"#)
            .route("http://localhost:5000/friends", 200, "<ul></ul><script>loadFriends()</script>");
        let surface = Arc::new(FakeSurface { atomic, ..Default::default() });
        let history = Arc::new(FakeHistory::default());
        let navigator =
            Navigator::new(&AppConfig::default(), "/", network.clone(), surface.clone(), history.clone()).unwrap();
        Setup { network, surface, history, navigator }
    }

    #[tokio::test]
    async fn test_construction_adopts_current_page() {
        let s = setup(true);
        assert_eq!(s.navigator.current_path(), "/");
        assert!(s.navigator.is_resident("/"));
        assert_eq!(s.surface.ops(), vec!["adopt view-home"]);
    }

    #[tokio::test]
    async fn test_missing_main_region() {
        struct Bare;

        #[async_trait]
        impl DisplaySurface for Bare {
            fn main_region_markup(&self) -> Option<String> {
                None
            }
            fn adopt_current(&self, _: &str) {}
            fn append_view(&self, _: &ViewSnapshot) {}
            fn set_visible(&self, _: &str, _: bool) {}
            fn set_opacity(&self, _: &str, _: f32) {}
            fn run_script(&self, _: &str, _: &Script) {}
            fn dispatch_view_loaded(&self) {}
            fn highlight_nav(&self, _: &str) {}
            fn supports_view_transition(&self) -> bool {
                false
            }
            async fn view_transition(&self, _: Option<&str>, _: &str) {}
        }

        let result = Navigator::new(
            &AppConfig::default(),
            "/",
            Arc::new(ScriptedNetwork::new()),
            Arc::new(Bare),
            Arc::new(FakeHistory::default()),
        );
        assert!(matches!(result, Err(Error::NotReady(_))));
    }

    #[tokio::test]
    async fn test_first_visit_fetches_and_runs_scripts() {
        let s = setup(true);

        let outcome = s.navigator.navigate("/week").await.unwrap();
        assert_eq!(outcome, NavigationOutcome::Switched { view_id: "view-week".into(), fetched: true });
        assert_eq!(s.navigator.current_path(), "/week");

        let request = s.network.last_request().unwrap();
        assert_eq!(request.header("X-Requested-With"), Some("XMLHttpRequest"));
        assert_eq!(
            s.surface.ops()[1..],
            [
                "append view-week",
                "script view-week /static/js/pages/week.js",
                "viewLoaded",
                "transition view-home -> view-week",
            ]
        );
    }

    #[tokio::test]
    async fn test_revisit_issues_no_requests() {
        let s = setup(true);
        s.navigator.navigate("/week").await.unwrap();
        s.navigator.navigate("/").await.unwrap();
        let before = s.network.request_count();

        let outcome = s.navigator.navigate("/week").await.unwrap();
        assert_eq!(outcome, NavigationOutcome::Switched { view_id: "view-week".into(), fetched: false });
        assert_eq!(s.network.request_count(), before);
        assert_eq!(s.surface.count("append"), 1);
    }

    #[tokio::test]
    async fn test_rapid_double_navigate_changes_view_once() {
        let s = setup(true);

        let (first, second) = tokio::join!(s.navigator.navigate("/week"), s.navigator.navigate("/week"));
        assert!(matches!(first.unwrap(), NavigationOutcome::Switched { .. }));
        assert_eq!(second.unwrap(), NavigationOutcome::Dropped);
        assert_eq!(s.surface.count("transition"), 1);
        assert_eq!(s.network.request_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_navigation_to_other_path_dropped() {
        let s = setup(true);

        let (first, second) = tokio::join!(s.navigator.navigate("/week"), s.navigator.navigate("/friends"));
        assert!(first.is_ok());
        assert_eq!(second.unwrap(), NavigationOutcome::Dropped);
        assert_eq!(s.navigator.current_path(), "/week");
        assert!(!s.navigator.is_resident("/friends"));
    }

    #[tokio::test]
    async fn test_navigate_to_current_path_is_noop() {
        let s = setup(true);
        assert_eq!(s.navigator.navigate("/").await.unwrap(), NavigationOutcome::Unchanged);
        assert_eq!(s.network.request_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_fetch_releases_lock() {
        let s = setup(true);
        s.network.route("http://localhost:5000/achievements", 500, "");

        let err = s.navigator.navigate("/achievements").await.unwrap_err();
        assert!(matches!(err, Error::NetworkFailure(_)));
        assert_eq!(s.navigator.current_path(), "/");
        assert!(!s.navigator.is_resident("/achievements"));
        assert_eq!(s.surface.count("transition"), 0);

        assert!(s.navigator.navigate("/week").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_fade_fallback_sequence() {
        let s = setup(false);
        s.navigator.navigate("/friends").await.unwrap();

        let ops = s.surface.ops();
        let tail = &ops[ops.len() - 4..];
        assert_eq!(
            tail,
            [
                "opacity view-home 0",
                "visible view-home false",
                "visible view-friends true",
                "opacity view-friends 1",
            ]
        );
        assert_eq!(s.surface.count("script view-friends inline"), 1);
    }

    #[tokio::test]
    async fn test_link_click_pushes_history() {
        let s = setup(true);

        s.navigator.on_link_click("/week").await.unwrap();
        assert_eq!(*s.history.0.lock().unwrap(), vec!["/week"]);
        assert_eq!(s.surface.count("highlight /week"), 1);

        assert_eq!(s.navigator.on_link_click("/week").await.unwrap(), NavigationOutcome::Unchanged);
        assert_eq!(s.history.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_pop_navigates() {
        let s = setup(true);
        s.navigator.on_link_click("/week").await.unwrap();

        let outcome = s.navigator.on_history_pop("/").await.unwrap();
        assert_eq!(outcome, NavigationOutcome::Switched { view_id: "view-home".into(), fetched: false });
        assert_eq!(s.history.0.lock().unwrap().len(), 1);
    }
}
