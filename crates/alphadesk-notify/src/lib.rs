//! Notification fan-out.
//!
//! Pure projections of lifecycle events into the three user-facing
//! surfaces: an auto-dismissing flash queue, a persistent toast list with
//! a retry affordance for failures, and a discreet status line. Nothing
//! here calls back into the job machinery.

pub mod center;
pub mod types;

pub use center::{NotificationCenter, NotifyConfig};
pub use types::{Flash, Severity, Toast};
