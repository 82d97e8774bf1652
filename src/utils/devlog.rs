//! Structured benchmark events with a thread-local sink for deterministic tests.
//! Every event also goes to the `docbench::metrics` log target.

use std::cell::RefCell;

thread_local! {
    static TL_SINK: RefCell<Option<Vec<String>>> = const { RefCell::new(None) };
}

/// Guard that disables the thread-local sink on drop.
pub struct EventSinkGuard;
impl Drop for EventSinkGuard {
    fn drop(&mut self) {
        TL_SINK.with(|s| *s.borrow_mut() = None);
    }
}

/// Enable the thread-local sink for the current thread. Returns a guard that will disable it on drop.
pub fn enable_thread_sink() -> EventSinkGuard {
    TL_SINK.with(|s| *s.borrow_mut() = Some(Vec::new()));
    EventSinkGuard
}

/// Push a message into the thread-local sink if enabled.
pub fn write_str(msg: &str) {
    TL_SINK.with(|s| {
        if let Some(buf) = s.borrow_mut().as_mut() {
            buf.push(msg.to_owned());
        }
    });
}

/// Drain and return the captured messages for the current thread. If disabled, returns an empty vec.
pub fn drain() -> Vec<String> {
    TL_SINK.with(|s| match s.borrow_mut().as_mut() {
        Some(buf) => std::mem::take(buf),
        None => Vec::new(),
    })
}

/// Emit one JSON benchmark event built from `serde_json::json!` syntax.
#[macro_export]
macro_rules! bench_event {
    ($($json:tt)+) => {{
        let __s = $crate::__private::serde_json::json!($($json)+).to_string();
        $crate::utils::devlog::write_str(&__s);
        $crate::__private::log::info!(target: $crate::logger::METRICS_TARGET, "{}", __s);
    }};
}
