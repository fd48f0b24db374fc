use super::*;

#[test]
fn wait_times_out_without_cancel() {
    let token = CancelToken::new();
    let start = Instant::now();
    assert!(!token.wait_timeout(Duration::from_millis(20)));
    assert!(start.elapsed() >= Duration::from_millis(20));
}

#[test]
fn cancel_wakes_waiter_early() {
    let token = CancelToken::new();
    let waiter = token.clone();
    let handle = std::thread::spawn(move || {
        let start = Instant::now();
        let canceled = waiter.wait_timeout(Duration::from_secs(10));
        (canceled, start.elapsed())
    });
    std::thread::sleep(Duration::from_millis(10));
    token.cancel();
    let (canceled, waited) = handle.join().unwrap();
    assert!(canceled);
    assert!(waited < Duration::from_secs(5));
}

#[test]
fn clones_share_state() {
    let a = CancelToken::new();
    let b = a.clone();
    b.cancel();
    assert!(a.is_canceled());
    assert!(a.wait_timeout(Duration::from_secs(1)));
}
