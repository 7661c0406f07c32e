//! Camera Test Demo
//!
//! Runs the camera and microphone self-test, including the three second
//! microphone echo, then tries a screen share.

use anyhow::Result;
use chatreal::{ChatReal, CollectingSink, DebugLogger, EchoStatus, TestStatus};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    DebugLogger::init_logging()?;

    println!("🎥 Chat Real Camera Test");
    println!("========================");

    let chat_real = ChatReal::init()?;
    let sink = Arc::new(CollectingSink::new());
    let mut test = chat_real.camera_test(sink.clone());

    test.start_test().await;
    println!("{}", test.message());
    if test.status() != TestStatus::Success {
        return Ok(());
    }

    test.toggle_video();
    println!("📷 Camera {}", if test.video_enabled() { "on" } else { "off" });
    test.toggle_video();

    test.start_echo_test()?;
    println!("🎙️ {}", test.echo_status().label());
    while test.echo_status() != EchoStatus::Success && test.echo_status() != EchoStatus::Idle {
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    println!("🔊 Echo played back {} recording(s)", sink.played().len());
    test.stop_test();

    let share = chat_real.screen_share().on_share_end(|| println!("🖥️ Screen share ended"));
    if share.start_share().await {
        println!("🖥️ {}", share.title());
        share.stop_share();
    } else {
        println!("⚠️ Screen share unavailable");
    }

    let mut theme = chat_real.theme(false);
    println!("🎨 Theme toggled to {}", theme.toggle_theme());
    Ok(())
}
