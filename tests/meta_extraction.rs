//! Scenario 6 (spec §8): an auth-log-style line is annotated with both an
//! IP address and a username, end to end through the follower and buffer.

mod common;

use std::time::Duration;

use common::TestEnv;
use mockito::Matcher;

#[test]
fn follower_annotates_ip_and_user_on_delivered_event() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/ingest")
        .match_body(Matcher::Regex(r#""ip":"10\.0\.0\.5".*"user":"alice""#.to_string()))
        .with_status(200)
        .create();

    let env = TestEnv::start(&format!("{}/ingest", server.url()), 1, 60.0, u64::MAX);
    std::thread::sleep(Duration::from_millis(100));

    env.append_line("Failed password for user alice from 10.0.0.5 port 22");
    std::thread::sleep(Duration::from_millis(600));
    mock.assert();

    env.stop();
}
