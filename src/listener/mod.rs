//! Listener trait and the fan-out that delivers run events to every
//! registered listener.
//!
//! The [`TestListener`] trait enables:
//! - **Progress output** while the run is in flight ([`ResultPrinter`])
//! - **Machine-readable logs** written when the run ends ([`JsonLogger`], [`JunitLogger`])
//! - **Custom observers** that only override the events they care about
//!
//! Every method has a no-op default. Events for one test always arrive as
//! `start_test`, at most one `add_*`, then `end_test`.

mod console;
mod json;
mod junit;

pub use console::ResultPrinter;
pub use json::JsonLogger;
pub use junit::JunitLogger;

use crate::core::error::Result;
use crate::node::{SuiteInfo, TestInfo};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// Observer of run lifecycle events.
pub trait TestListener {
    /// Called when a suite starts, before any of its tests.
    fn start_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
        let _ = suite;
        Ok(())
    }

    /// Called when a suite ends, including suites cut short by a stop.
    fn end_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
        let _ = suite;
        Ok(())
    }

    /// Called before a test executes.
    fn start_test(&mut self, test: &TestInfo) -> Result<()> {
        let _ = test;
        Ok(())
    }

    /// Called after a test's outcome has been reported.
    fn end_test(&mut self, test: &TestInfo, elapsed: Duration) -> Result<()> {
        let _ = (test, elapsed);
        Ok(())
    }

    /// The test raised an unexpected error.
    fn add_error(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// An assertion in the test failed.
    fn add_failure(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// The test raised a warning.
    fn add_warning(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// The test marked itself incomplete.
    fn add_incomplete(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// The test is risky.
    fn add_risky(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// The test was skipped.
    fn add_skipped(&mut self, test: &TestInfo, message: &str, elapsed: Duration) -> Result<()> {
        let _ = (test, message, elapsed);
        Ok(())
    }

    /// Called exactly once when the run is over. Buffered output is written here.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Ordered set of listeners.
///
/// Each call is delivered to every listener in registration order. A listener
/// that returns an error or panics is logged and skipped for that event only;
/// the remaining listeners still receive it.
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn TestListener>>,
    flushed: bool,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners added after the set was flushed never
    /// receive `flush`.
    pub fn add(&mut self, listener: Box<dyn TestListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Deliver one event to every listener.
    pub fn dispatch<F>(&mut self, event: &str, mut f: F)
    where
        F: FnMut(&mut dyn TestListener) -> Result<()>,
    {
        for (index, listener) in self.listeners.iter_mut().enumerate() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| f(listener.as_mut())));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::warn!(target: "suite_runner::listener", listener = index, event, "listener failed: {e}");
                }
                Err(payload) => {
                    tracing::warn!(
                        target: "suite_runner::listener",
                        listener = index,
                        event,
                        "listener panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }

    /// Flush every listener. Only the first call has any effect.
    pub fn flush(&mut self) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        self.dispatch("flush", |l| l.flush());
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::error::Error;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Listener that records every event as a string.
    pub(crate) struct Recorder {
        pub tag: &'static str,
        pub events: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        pub(crate) fn new(tag: &'static str, events: &Rc<RefCell<Vec<String>>>) -> Self {
            Self {
                tag,
                events: Rc::clone(events),
            }
        }

        fn push(&self, event: String) {
            self.events.borrow_mut().push(format!("{}:{}", self.tag, event));
        }
    }

    impl TestListener for Recorder {
        fn start_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
            self.push(format!("start_suite {}", suite.name));
            Ok(())
        }

        fn end_suite(&mut self, suite: &SuiteInfo) -> Result<()> {
            self.push(format!("end_suite {}", suite.name));
            Ok(())
        }

        fn start_test(&mut self, test: &TestInfo) -> Result<()> {
            self.push(format!("start_test {}", test.display_name()));
            Ok(())
        }

        fn end_test(&mut self, test: &TestInfo, _elapsed: Duration) -> Result<()> {
            self.push(format!("end_test {}", test.display_name()));
            Ok(())
        }

        fn add_error(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("error {} {}", test.display_name(), message));
            Ok(())
        }

        fn add_failure(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("failure {} {}", test.display_name(), message));
            Ok(())
        }

        fn add_warning(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("warning {} {}", test.display_name(), message));
            Ok(())
        }

        fn add_incomplete(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("incomplete {} {}", test.display_name(), message));
            Ok(())
        }

        fn add_risky(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("risky {} {}", test.display_name(), message));
            Ok(())
        }

        fn add_skipped(&mut self, test: &TestInfo, message: &str, _: Duration) -> Result<()> {
            self.push(format!("skipped {} {}", test.display_name(), message));
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.push("flush".to_string());
            Ok(())
        }
    }

    struct Failing;

    impl TestListener for Failing {
        fn start_test(&mut self, _test: &TestInfo) -> Result<()> {
            Err(Error::listener("disk full"))
        }
    }

    struct Panicking;

    impl TestListener for Panicking {
        fn start_test(&mut self, _test: &TestInfo) -> Result<()> {
            panic!("listener bug");
        }
    }

    #[test]
    fn test_default_listener_noop() {
        struct Noop;
        impl TestListener for Noop {}

        let mut listener = Noop;
        let info = TestInfo::new("t");
        assert!(listener.start_test(&info).is_ok());
        assert!(listener.add_failure(&info, "m", Duration::ZERO).is_ok());
        assert!(listener.end_test(&info, Duration::ZERO).is_ok());
        assert!(listener.flush().is_ok());
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.add(Box::new(Recorder::new("a", &events)));
        set.add(Box::new(Recorder::new("b", &events)));

        set.dispatch("start_test", |l| l.start_test(&TestInfo::new("t")));
        assert_eq!(*events.borrow(), vec!["a:start_test t", "b:start_test t"]);
    }

    #[test]
    fn test_failing_and_panicking_listeners_are_isolated() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.add(Box::new(Failing));
        set.add(Box::new(Panicking));
        set.add(Box::new(Recorder::new("ok", &events)));

        set.dispatch("start_test", |l| l.start_test(&TestInfo::new("t")));
        assert_eq!(*events.borrow(), vec!["ok:start_test t"]);
    }

    #[test]
    fn test_flush_once() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut set = ListenerSet::new();
        set.add(Box::new(Recorder::new("a", &events)));

        assert!(!set.is_flushed());
        set.flush();
        set.flush();
        assert!(set.is_flushed());
        assert_eq!(*events.borrow(), vec!["a:flush"]);
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(payload.as_ref()), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
