//! Display seam and transition planning.
//!
//! [`plan_transition`] decides what a view swap looks like; applying the
//! plan is the only part that touches a [`DisplaySurface`].

use std::time::Duration;

use async_trait::async_trait;

use super::markup::Script;
use super::view::ViewSnapshot;

/// Main content region and its resident views.
#[async_trait]
pub trait DisplaySurface: Send + Sync {
    /// Markup currently in the main content region, or `None` if the page has none.
    fn main_region_markup(&self) -> Option<String>;

    /// Wrap the region's current content as the visible view `id`.
    fn adopt_current(&self, id: &str);

    /// Append a hidden view to the region.
    fn append_view(&self, view: &ViewSnapshot);

    fn set_visible(&self, id: &str, visible: bool);

    fn set_opacity(&self, id: &str, opacity: f32);

    /// Recreate `script` inside view `id` so the platform runs it.
    fn run_script(&self, id: &str, script: &Script);

    /// Announce that a freshly loaded view's scripts have run.
    fn dispatch_view_loaded(&self);

    /// Mark the nav link for `path` active and every other one inactive.
    fn highlight_nav(&self, path: &str);

    fn supports_view_transition(&self) -> bool;

    /// Hide `from` and show `to` as one crossfade. Resolves when it finishes.
    async fn view_transition(&self, from: Option<&str>, to: &str);
}

/// Session history.
pub trait History: Send + Sync {
    /// Push `path` without reloading.
    fn push(&self, path: &str);
}

/// How to swap the visible view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Single crossfade by the surface.
    Atomic { from: Option<String>, to: String },
    /// Fade `from` out, wait `delay`, hide it, then show and fade in `to`.
    Fade { from: Option<String>, to: String, delay: Duration },
}

pub fn plan_transition(from: Option<&str>, to: &str, atomic: bool, delay: Duration) -> TransitionPlan {
    let from = from.filter(|id| *id != to).map(str::to_string);
    let to = to.to_string();
    if atomic {
        TransitionPlan::Atomic { from, to }
    } else {
        let delay = if from.is_some() { delay } else { Duration::ZERO };
        TransitionPlan::Fade { from, to, delay }
    }
}

impl TransitionPlan {
    pub fn target(&self) -> &str {
        match self {
            TransitionPlan::Atomic { to, .. } | TransitionPlan::Fade { to, .. } => to,
        }
    }

    pub async fn apply(&self, surface: &dyn DisplaySurface) {
        match self {
            TransitionPlan::Atomic { from, to } => {
                surface.view_transition(from.as_deref(), to).await;
            }
            TransitionPlan::Fade { from, to, delay } => {
                if let Some(from) = from {
                    surface.set_opacity(from, 0.0);
                    tokio::time::sleep(*delay).await;
                    surface.set_visible(from, false);
                }
                surface.set_visible(to, true);
                surface.set_opacity(to, 1.0);
            }
        }
    }
}
