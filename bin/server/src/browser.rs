//! Browser-side handshake plumbing: `window.open` popups, timer sleeps and
//! the page clock.

use crate::state::{FormState, HandshakeTicket};
use async_trait::async_trait;
use futures::channel::oneshot;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tether_core::SessionContext;
use tether_integration::{
    Clock, Handshake, HandshakeDriver, HandshakeState, HttpIntegrationsClient, PollSchedule,
    PopupOpener, PopupRequest, PopupWindow, Sleeper,
};

/// A consent popup opened with `window.open`.
pub struct BrowserPopup(web_sys::Window);

impl PopupWindow for BrowserPopup {
    fn is_closed(&self) -> bool {
        // A window we can no longer inspect is as good as closed.
        self.0.closed().unwrap_or(true)
    }

    fn close(&self) {
        if let Err(err) = self.0.close() {
            tracing::debug!(?err, "failed to close consent popup");
        }
    }
}

/// Opens consent popups in the current browser window.
pub struct BrowserPopupOpener;

impl PopupOpener for BrowserPopupOpener {
    type Window = BrowserPopup;

    fn open(&self, request: &PopupRequest) -> Option<BrowserPopup> {
        web_sys::window()?
            .open_with_url_and_target_and_features(
                request.url.as_str(),
                request.window_name,
                &request.features(),
            )
            .ok()
            .flatten()
            .map(BrowserPopup)
    }
}

/// Sleeps on the browser event loop via `setTimeout` and reads
/// `performance.now()` for elapsed time.
///
/// Without a `Performance` object the clock falls back to the total time
/// requested from `sleep`.
#[derive(Default)]
pub struct BrowserTimer {
    slept_ms: AtomicU64,
}

impl Clock for BrowserTimer {
    fn now(&self) -> Duration {
        match web_sys::window().and_then(|window| window.performance()) {
            Some(performance) => Duration::from_secs_f64(performance.now().max(0.0) / 1000.0),
            None => Duration::from_millis(self.slept_ms.load(Ordering::Relaxed)),
        }
    }
}

#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
impl Sleeper for BrowserTimer {
    async fn sleep(&self, duration: Duration) {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        self.slept_ms.fetch_add(millis, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        set_timeout(
            move || {
                let _ = tx.send(());
            },
            duration,
        );
        let _ = rx.await;
    }
}

/// Returns the origin of the current page, e.g. `http://localhost:3000`.
pub fn page_origin() -> Option<String> {
    web_sys::window()?.location().origin().ok()
}

/// Runs a handshake in the background, mirroring its state into `status`.
///
/// The handshake stops, and its outcome is dropped, as soon as `ticket` goes
/// stale. On success the params are stored in `form`.
pub fn spawn_handshake(
    client: HttpIntegrationsClient,
    context: SessionContext,
    form: FormState,
    status: RwSignal<HandshakeState>,
    ticket: HandshakeTicket,
) {
    spawn_local(async move {
        let mut handshake = Handshake::new(context.integration_type, PollSchedule::default());
        let (opener, timer) = (BrowserPopupOpener, BrowserTimer::default());
        let stale = move || !form.is_current(ticket);
        let driver = HandshakeDriver::new(&client, &opener, &timer).cancel_when(&stale);
        let result = driver
            .run(&mut handshake, &context, |state| {
                if form.is_current(ticket) {
                    status.set(state.clone());
                }
            })
            .await;

        if let Ok(params) = result {
            if !form.finish_handshake(ticket, params) {
                tracing::debug!(integration = %context.integration_type, "dropping stale handshake result");
            }
        }
    });
}
