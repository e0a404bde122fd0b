use super::*;
use serde_json::json;

#[test]
fn headline_updates_and_is_kept_in_history() {
    let log = StatusLog::new(10);
    log.record(StatusEvent::status("initializing"));
    log.record(StatusEvent::status("building"));

    assert_eq!(log.headline(), "building");
    assert_eq!(log.entries().len(), 2);
}

#[test]
fn leveled_events_do_not_touch_headline() {
    let log = StatusLog::new(10);
    log.set_status("ready");
    log.record(StatusEvent::log(LogLevel::Debug, "fetch ok").with_extra(json!({"rows": 3})));

    assert_eq!(log.headline(), "ready");
    let last = log.entries().pop().expect("entry");
    assert_eq!(last.level, LogLevel::Debug);
    assert_eq!(last.extra, Some(json!({"rows": 3})));
}

#[test]
fn history_is_capped_and_drops_oldest_first() {
    let log = StatusLog::new(3);
    for n in 0..5 {
        log.log(LogLevel::Info, &format!("line {n}"), None);
    }

    let messages: Vec<_> = log.entries().into_iter().map(|entry| entry.message).collect();
    assert_eq!(messages, vec!["line 2", "line 3", "line 4"]);
}

#[test]
fn render_text_includes_level_and_extra() {
    let log = StatusLog::new(5);
    log.log(LogLevel::Warning, "package failed", Some(json!({"name": "vizro"})));

    assert_eq!(
        log.render_text(),
        "[warning] package failed {\"name\":\"vizro\"}\n"
    );
}
