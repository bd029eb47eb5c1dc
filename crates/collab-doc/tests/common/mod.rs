#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use collab_doc::Event;

/// Installs a fmt subscriber once per test binary. Filter with `RUST_LOG`.
pub fn setup_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Shared event log plus a listener appending to it.
pub fn recorder() -> (Rc<RefCell<Vec<Event>>>, impl Fn(&Event) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |event: &Event| sink.borrow_mut().push(event.clone()))
}
