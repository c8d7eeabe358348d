//! Panic diagnostics for the pipeline's recovery boundary.
//!
//! `catch_unwind` hands back only the payload. The source location lives in
//! the `PanicHookInfo` seen by the panic hook, so a chained hook stashes it in
//! a thread-local for the recovering frame to pick up. Unwinding never leaves
//! the thread, so the frame that catches reads what the hook just wrote.

use std::any::Any;
use std::cell::RefCell;
use std::panic::{self, PanicHookInfo};
use std::sync::Once;

use crate::abort::Abort;

thread_local! {
    static LAST_LOCATION: RefCell<Option<String>> = const { RefCell::new(None) };
}

static INSTALL: Once = Once::new();

/// Installs the location-recording hook in front of the current one.
///
/// Safe to call repeatedly; only the first call installs. `Abort` payloads are
/// control flow, not faults, so they skip the previous hook's report.
pub(crate) fn install_hook() {
    INSTALL.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            if info.payload().is::<Abort>() {
                return;
            }
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()));
            LAST_LOCATION.with(|slot| *slot.borrow_mut() = location);
            previous(info);
        }));
    });
}

/// Takes the location recorded for the most recent panic on this thread.
pub(crate) fn take_location() -> Option<String> {
    LAST_LOCATION.with(|slot| slot.borrow_mut().take())
}

/// Extracts a human-readable message from a panic payload.
pub(crate) fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_owned()
    }
}

/// `"<message> (<file>:<line>)"`, or just the message without a location.
pub(crate) fn describe(payload: &(dyn Any + Send)) -> String {
    let message = payload_message(payload);
    match take_location() {
        Some(location) => format!("{message} ({location})"),
        None => message,
    }
}
