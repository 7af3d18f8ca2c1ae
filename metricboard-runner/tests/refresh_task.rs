//! Refresh task lifecycle: ticking, pause/resume, generations, cancel.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{at, rule, MockProvider};
use metricboard_core::{Granularity, RawPoint};
use metricboard_runner::{ChartPanel, Clock, FetchMode, RefreshEvent, RefreshTask};

const WAIT: Duration = Duration::from_secs(5);

fn fixed_clock() -> Clock {
    Arc::new(|| at(0, 3, 0))
}

fn spawn(provider: &Arc<MockProvider>, interval: Duration) -> RefreshTask {
    let mut panel =
        ChartPanel::new(provider.clone(), Granularity::Minute, 4, FetchMode::Tabular).unwrap();
    panel.set_rules(vec![rule(0, "latency", &["h", "m"])]);
    RefreshTask::spawn_with_clock(panel, interval, fixed_clock()).unwrap()
}

#[test]
fn delivers_frames_on_interval() {
    let provider = Arc::new(MockProvider::new());
    provider.set_points(0, None, vec![RawPoint::new(at(0, 1, 0), 2.0)]);
    let task = spawn(&provider, Duration::from_millis(10));

    let first = task.next_frame(WAIT).expect("first frame");
    assert_eq!(first.frame.series("latency").unwrap().values, vec![0.0, 2.0, 0.0, 0.0]);
    assert!(task.next_frame(WAIT).is_some());
    assert!(provider.calls().len() >= 2);

    task.cancel();
}

#[test]
fn paused_task_stops_refreshing() {
    let provider = Arc::new(MockProvider::new());
    let task = spawn(&provider, Duration::from_millis(10));
    assert!(task.next_frame(WAIT).is_some());

    task.pause();
    // Drain whatever was already in flight when the pause landed.
    while task.next_event(Duration::from_millis(200)).is_some() {}
    let calls = provider.calls().len();
    assert!(task.next_event(Duration::from_millis(100)).is_none());
    assert_eq!(provider.calls().len(), calls);

    task.resume();
    assert!(task.next_frame(WAIT).is_some());
    task.cancel();
}

#[test]
fn refresh_now_skips_the_wait() {
    let provider = Arc::new(MockProvider::new());
    let task = spawn(&provider, Duration::from_secs(60));
    assert!(task.next_frame(WAIT).is_some());
    assert!(task.next_event(Duration::from_millis(100)).is_none());

    task.refresh_now();
    assert!(task.next_frame(WAIT).is_some());
    assert_eq!(provider.calls().len(), 2);
    task.cancel();
}

#[test]
fn refresh_now_is_ignored_while_paused() {
    let provider = Arc::new(MockProvider::new());
    let task = spawn(&provider, Duration::from_secs(60));
    assert!(task.next_frame(WAIT).is_some());

    task.pause();
    task.refresh_now();
    assert!(task.next_event(Duration::from_millis(200)).is_none());
    assert_eq!(provider.calls().len(), 1);
    task.cancel();
}

#[test]
fn frames_from_an_older_generation_are_discarded() {
    // Slow fetches so a refresh is in flight when the granularity changes.
    let provider = Arc::new(MockProvider::with_delay(Duration::from_millis(150)));
    let task = spawn(&provider, Duration::from_millis(10));
    std::thread::sleep(Duration::from_millis(20));

    task.set_granularity(Granularity::Hour);
    assert_eq!(task.generation(), 1);

    let refresh = task.next_frame(WAIT).expect("frame after switch");
    assert_eq!(refresh.frame.granularity, Granularity::Hour);
    assert_eq!(refresh.frame.labels[3], "2024-01-01 00:00:00");
    task.cancel();
}

#[test]
fn set_rules_starts_a_new_generation() {
    let provider = Arc::new(MockProvider::new());
    let task = spawn(&provider, Duration::from_millis(10));
    assert!(task.next_frame(WAIT).is_some());

    task.set_rules(vec![rule(0, "latency", &["m"]), rule(1, "errors", &["m"])]);
    let event = task.next_event(WAIT).expect("event after set_rules");
    assert_eq!(event.generation(), 1);
    match event {
        RefreshEvent::Frame { refresh, .. } => assert_eq!(refresh.frame.series.len(), 2),
        RefreshEvent::Error { message, .. } => panic!("unexpected error: {message}"),
    }
    task.cancel();
}

#[test]
fn cancel_stops_the_worker() {
    let provider = Arc::new(MockProvider::new());
    let task = spawn(&provider, Duration::from_millis(10));
    assert!(task.is_running());
    task.cancel();

    let calls = provider.calls().len();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(provider.calls().len(), calls);
}

#[test]
fn dropping_the_handle_stops_the_worker() {
    let provider = Arc::new(MockProvider::new());
    {
        let task = spawn(&provider, Duration::from_millis(10));
        assert!(task.next_frame(WAIT).is_some());
    }
    let calls = provider.calls().len();
    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(provider.calls().len(), calls);
}
