//! Ask for a review after five launches, at most once a month.

use rulekit::{Event, Frequency, Rule, RuleKit, RuleOption, StoreLocation};
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let kit = RuleKit::builder()
        .app_version("3.1.0")
        .configure(StoreLocation::Directory(dir.path().to_path_buf()))?;

    kit.set_rule(
        "ask.review",
        vec![RuleOption::trigger_frequency(Frequency::Monthly)],
        Rule::all_of([
            Rule::event("app.launched", |e| e.donations.count >= 5),
            Rule::condition(|| async { true }),
        ]),
    );
    kit.set_callback_rule(
        "welcome.back",
        || println!("  -> welcome back!"),
        vec![],
        Rule::event("app.launched", |e| e.donations.count == 2),
    );

    let mut signals = kit.subscribe();
    let launched = Event::new("app.launched");
    for launch in 1..=7 {
        println!("Launch #{launch}");
        kit.donate(&launched).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        while let Ok(signal) = signals.try_recv() {
            println!("  -> {signal}");
        }
    }

    let counters = kit.donations(&launched).await;
    println!("\n{launched}: {} donations", counters.count);
    if let Some(first) = counters.first {
        println!("  first at {}", first.date);
    }
    if let Some(at) = kit.last_fired("ask.review").await {
        println!("ask.review last fired at {at}");
    }

    Ok(())
}
