//! Session lifecycle: resolve a provider, check availability, create the
//! session, and report every state change through a notification callback.
//!
//! The UI subscribes to [`LifecycleEvent`]s and renders them as the status
//! line and the setup-guide panel; this module never touches the terminal.

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};
use crate::progress::ProgressCallback;
use crate::provider::{Availability, LanguageSession, ProviderResolver, SessionOptions};
use crate::ui::StatusCategory;
use std::sync::Arc;
use tracing::{info, warn};

/// Status text shown while the availability check runs.
pub const STATUS_CHECKING: &str = "Checking model...";
/// Status text for the terminal no-provider state.
pub const STATUS_UNSUPPORTED: &str = "API unsupported";
/// Status text when the availability check itself fails.
pub const STATUS_CHECK_FAILED: &str = "Availability check failed";
/// Status text when the provider reports no usable model.
pub const STATUS_UNAVAILABLE: &str = "Model unavailable";
/// Status text while the model downloads (downloadable and downloading share it).
pub const STATUS_DOWNLOADING: &str = "Downloading model...";
/// Status text when session creation fails.
pub const STATUS_CREATE_FAILED: &str = "Session creation failed";
/// Status text once the session is usable.
pub const STATUS_READY: &str = "Ready";

/// Lifecycle notifications consumed by the UI.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// Update the status label.
    Status {
        /// Visible label text.
        text: String,
        /// Styling category.
        category: StatusCategory,
    },
    /// Reveal the setup-guide panel.
    ShowSetupGuide,
}

/// Callback receiving lifecycle notifications.
pub type LifecycleNotify = Arc<dyn Fn(LifecycleEvent) + Send + Sync>;

fn status(notify: &LifecycleNotify, text: &str, category: StatusCategory) {
    notify(LifecycleEvent::Status {
        text: text.to_owned(),
        category,
    });
}

/// Initialize the model session, reporting progress through `notify`.
///
/// Terminal failures (no provider, unavailable model, failed check or
/// creation) set an error status and reveal the setup guide before returning;
/// the caller only has to enable the controls on success.
///
/// # Errors
///
/// Returns the error that made the lifecycle terminal for this run.
pub async fn initialize_session(
    config: &ChatConfig,
    resolver: &ProviderResolver,
    notify: LifecycleNotify,
) -> Result<Box<dyn LanguageSession>> {
    let Some(provider) = resolver.resolve(config) else {
        warn!("no provider-resolution strategy matched the configuration");
        status(&notify, STATUS_UNSUPPORTED, StatusCategory::Error);
        notify(LifecycleEvent::ShowSetupGuide);
        return Err(ChatError::Unsupported(
            "no provider-resolution strategy matched".to_owned(),
        ));
    };

    status(&notify, STATUS_CHECKING, StatusCategory::Plain);

    let availability = match provider.availability().await {
        Ok(a) => a,
        Err(e) => {
            warn!("availability check failed: {e}");
            status(&notify, STATUS_CHECK_FAILED, StatusCategory::Error);
            notify(LifecycleEvent::ShowSetupGuide);
            return Err(e);
        }
    };
    info!(provider = provider.name(), ?availability, "availability checked");

    if availability == Availability::Unavailable {
        status(&notify, STATUS_UNAVAILABLE, StatusCategory::Error);
        notify(LifecycleEvent::ShowSetupGuide);
        return Err(ChatError::Unavailable(provider.name().to_owned()));
    }

    if availability.needs_download() {
        status(&notify, STATUS_DOWNLOADING, StatusCategory::Downloading);
    }

    let monitor_notify = Arc::clone(&notify);
    let monitor: ProgressCallback = Box::new(move |event| {
        if let Some(pct) = event.percent() {
            monitor_notify(LifecycleEvent::Status {
                text: format!("Downloading model {pct}%"),
                category: StatusCategory::Downloading,
            });
        }
    });

    let session = match provider
        .create(SessionOptions {
            system_prompt: config.llm.system_prompt.clone(),
            monitor: Some(monitor),
        })
        .await
    {
        Ok(s) => s,
        Err(e) => {
            warn!("session creation failed: {e}");
            status(&notify, STATUS_CREATE_FAILED, StatusCategory::Error);
            notify(LifecycleEvent::ShowSetupGuide);
            return Err(e);
        }
    };

    status(&notify, STATUS_READY, StatusCategory::Ready);
    Ok(session)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::sync::Mutex;

    fn recording_notify() -> (LifecycleNotify, Arc<Mutex<Vec<LifecycleEvent>>>) {
        let events: Arc<Mutex<Vec<LifecycleEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = Arc::clone(&events);
        let notify: LifecycleNotify = Arc::new(move |event| {
            events_clone.lock().unwrap().push(event);
        });
        (notify, events)
    }

    #[tokio::test]
    async fn unsupported_when_nothing_configured() {
        let mut config = ChatConfig::default();
        config.llm.model_id = String::new();
        config.llm.gguf_file = String::new();
        config.api.base_url = None;

        let (notify, events) = recording_notify();
        let result = initialize_session(&config, &ProviderResolver::default(), notify).await;

        assert!(matches!(result, Err(ChatError::Unsupported(_))));
        let events = events.lock().unwrap();
        assert!(matches!(
            &events[0],
            LifecycleEvent::Status { text, category }
                if text == STATUS_UNSUPPORTED && *category == StatusCategory::Error
        ));
        assert!(matches!(&events[1], LifecycleEvent::ShowSetupGuide));
    }
}
