//! User-facing notifications (toasts).
//!
//! The cart engine reports outcomes through a [`Notifier`] and never waits
//! on it or inspects a result.

use tokio::sync::mpsc;

use fresh_market_core::ToastVariant;

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub variant: ToastVariant,
    pub title: String,
    pub description: String,
}

impl Toast {
    /// Neutral toast.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Default,
            title: title.into(),
            description: description.into(),
        }
    }

    /// Error toast.
    #[must_use]
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Destructive,
            ..Self::new(title, description)
        }
    }

    /// Success toast.
    #[must_use]
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Success,
            ..Self::new(title, description)
        }
    }

    /// Informational toast.
    #[must_use]
    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            variant: ToastVariant::Info,
            ..Self::new(title, description)
        }
    }

    /// The generic "Error" toast used for failed backend calls.
    #[must_use]
    pub fn error(description: impl Into<String>) -> Self {
        Self::destructive("Error", description)
    }
}

impl std::fmt::Display for Toast {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.variant, self.title, self.description)
    }
}

/// Fire-and-forget sink for toasts.
pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.variant {
            ToastVariant::Destructive => tracing::warn!(
                title = %toast.title,
                description = %toast.description,
                "toast"
            ),
            _ => tracing::info!(
                variant = %toast.variant,
                title = %toast.title,
                description = %toast.description,
                "toast"
            ),
        }
    }
}

/// Forwards toasts to a channel, for a UI loop to render.
///
/// Toasts sent after the receiver is dropped are discarded.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<Toast>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, toast: Toast) {
        if self.tx.send(toast).is_err() {
            tracing::debug!("Toast receiver dropped");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_toast_constructors() {
        let toast = Toast::error("Failed to sync cart data");
        assert_eq!(toast.variant, ToastVariant::Destructive);
        assert_eq!(toast.title, "Error");
        assert_eq!(
            toast.to_string(),
            "[destructive] Error: Failed to sync cart data"
        );
        assert_eq!(Toast::success("a", "b").variant, ToastVariant::Success);
        assert_eq!(Toast::info("a", "b").variant, ToastVariant::Info);
    }

    #[test]
    fn test_channel_notifier_delivers_in_order() {
        let (notifier, mut rx) = ChannelNotifier::new();
        notifier.notify(Toast::new("one", ""));
        notifier.notify(Toast::new("two", ""));
        assert_eq!(rx.try_recv().unwrap().title, "one");
        assert_eq!(rx.try_recv().unwrap().title, "two");
    }

    #[test]
    fn test_channel_notifier_survives_dropped_receiver() {
        let (notifier, rx) = ChannelNotifier::new();
        drop(rx);
        notifier.notify(Toast::new("ignored", ""));
    }
}
