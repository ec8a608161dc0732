//! User-facing notifications.
//!
//! Fire-and-forget: a [`Toast`] goes to a [`Notifier`] and is never seen
//! again. Presentation belongs to whoever implements the trait;
//! [`TracingNotifier`] just logs.

use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub title: String,
    pub description: Option<String>,
    pub severity: Severity,
}

impl Toast {
    #[must_use]
    pub fn info(title: &str, description: impl Into<String>) -> Self {
        Self { title: title.to_owned(), description: Some(description.into()), severity: Severity::Info }
    }

    #[must_use]
    pub fn error(title: &str, description: impl Into<String>) -> Self {
        Self { title: title.to_owned(), description: Some(description.into()), severity: Severity::Error }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes every toast to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        let description = toast.description.as_deref().unwrap_or_default();
        match toast.severity {
            Severity::Info => info!(title = %toast.title, %description, "notification"),
            Severity::Error => error!(title = %toast.title, %description, "notification"),
        }
    }
}

// =============================================================================
// MESSAGES
// =============================================================================

pub mod messages {
    use super::Toast;
    use crate::canvas::ShapeType;

    #[must_use]
    pub fn shape_added() -> Toast {
        Toast::info("Shape added", "A new rectangle has been added to the canvas.")
    }

    #[must_use]
    pub fn shape_updated(target: ShapeType) -> Toast {
        Toast::info("Shape updated", format!("Changed to {target} shape"))
    }

    #[must_use]
    pub fn changes_saved() -> Toast {
        Toast::info("Changes saved", "Your whiteboard has been updated.")
    }

    #[must_use]
    pub fn error_loading(message: impl Into<String>) -> Toast {
        Toast::error("Error loading whiteboard", message)
    }

    #[must_use]
    pub fn error_saving(message: impl Into<String>) -> Toast {
        Toast::error("Error saving whiteboard", message)
    }

    #[must_use]
    pub fn error_adding_shape() -> Toast {
        Toast::error("Error adding shape", "Failed to add a new shape to the canvas.")
    }

    #[must_use]
    pub fn error_changing_shape(message: impl Into<String>) -> Toast {
        Toast::error("Error", message)
    }
}
