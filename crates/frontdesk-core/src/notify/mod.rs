//! Transient toast notifications.
//!
//! `ToastService` keeps an ordered list of toasts, each removed automatically
//! after its duration. Renderers subscribe to the list through a watch channel.

pub mod toast;

pub use toast::{Severity, Toast, ToastService};
