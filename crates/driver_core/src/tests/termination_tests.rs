use super::*;

use std::time::Duration;

use transport::LocalCell;

fn fresh() -> (Arc<LocalCell>, Termination) {
    let cell = Arc::new(LocalCell::new(RUNNING));
    let termination = Termination::new(cell.clone());
    (cell, termination)
}

#[test]
fn set_raises_shared_flag_and_cancels() {
    let (cell, termination) = fresh();
    assert!(!termination.is_set());

    termination.set();
    assert!(termination.is_set());
    assert_eq!(cell.load(), TERMINATED);
    assert!(termination.observe());
}

#[test]
fn flag_is_never_reset_by_a_second_set() {
    let (cell, termination) = fresh();
    termination.set();
    termination.set();
    assert_eq!(cell.load(), TERMINATED);
}

#[test]
fn peer_flag_is_visible_and_observed_into_the_token() {
    let (cell, termination) = fresh();
    cell.store(TERMINATED);

    assert!(termination.is_set());
    assert!(termination.observe());
}

#[tokio::test]
async fn cancelled_wakes_on_set_from_another_task() {
    let (_cell, termination) = fresh();
    let remote = termination.clone();
    let setter = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        remote.set();
    });

    tokio::time::timeout(Duration::from_secs(1), termination.cancelled())
        .await
        .expect("cancelled in time");
    setter.await.expect("join");
}
