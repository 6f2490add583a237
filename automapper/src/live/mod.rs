//! Reconciliation of live grid windows.
//!
//! A playing client streams the N×N window of grid ids around its
//! character. [`LiveReconciler::reconcile`] decides which map the window
//! belongs to, merging maps that turn out to be connected, and inserts
//! the grids it has not seen before. Images for those grids arrive later
//! through [`LiveReconciler::accept_grid_image`].

mod error;
mod reconciler;
mod window;

pub use error::LiveError;
pub use reconciler::{
    pick_target, GridImageReport, LiveConfig, LiveReconciler, ReconcileOutcome, WindowPlacement,
    LIVE_MAP_PRIORITY,
};
pub use window::GridWindow;
