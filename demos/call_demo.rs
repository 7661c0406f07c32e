//! Call Demo
//!
//! Joins a room with the synthetic devices (or the real camera and
//! microphone with `--features native`), sends a chat message, waits for the
//! mirrored remote preview and prints stream health before hanging up.
//!
//! Set `CHAT_REAL_SOCKET_URL` to relay chat through a backend; without one
//! the chat stays local.

use anyhow::Result;
use chatreal::{ChatReal, DebugLogger, Event, LandingForm, StreamMonitor};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    DebugLogger::init_logging()?;

    println!("🚀 Chat Real Call Demo");
    println!("======================");

    let chat_real = ChatReal::init()?;
    let mut app = chat_real.app()?;
    println!("✅ Chat Real initialized, page {}", app.location());

    // ============================================================================
    // Step 1: Create a room from the landing page
    // ============================================================================
    let action = LandingForm::new().create_room();
    app.handle(action);
    let room_id = app.room_id().to_string();
    println!("\n📋 Room created: {}", room_id);
    println!("   Share link: {}", app.location());

    // ============================================================================
    // Step 2: Join it
    // ============================================================================
    let builder = chat_real.room(&room_id).username("demo-user");
    let builder = if std::env::var(chatreal::config::SOCKET_URL_ENV_VAR).is_ok() {
        builder
    } else {
        builder.without_chat()
    };
    let session = builder.join().await?;
    let mut events = session.events();

    println!("\n📞 {} ({})", session.room_label(), session.connection_status());
    if let Some(error) = session.error() {
        println!("❌ Media unavailable: {}", error);
        return Ok(());
    }

    let monitors: Vec<StreamMonitor> = session
        .service()
        .local_stream()
        .map(|stream| stream.tracks().iter().map(StreamMonitor::watch).collect())
        .unwrap_or_default();

    // ============================================================================
    // Step 3: Chat
    // ============================================================================
    let mut chat = session.chat_panel();
    chat.toggle_open();
    chat.send_text("Hello from the call demo").await;
    for message in chat.messages() {
        println!("💬 {}: {}", message.sender, message.text);
    }

    // ============================================================================
    // Step 4: Wait for the remote preview
    // ============================================================================
    println!("\n⏳ Waiting for the remote stream...");
    let arrival = tokio::time::timeout(Duration::from_secs(10), async {
        while let Some(event) = events.next().await {
            println!("   event: {}", event.event_type());
            if matches!(event, Event::RemoteStream { .. }) {
                return true;
            }
        }
        false
    })
    .await
    .unwrap_or(false);
    println!(
        "{} Status: {}",
        if arrival { "✅" } else { "⚠️" },
        session.connection_status()
    );

    // ============================================================================
    // Step 5: Toggle media and report health
    // ============================================================================
    session.toggle_audio();
    println!("\n🎙️ Media state after mute: {:?}", session.media_state());
    session.toggle_audio();

    for monitor in &monitors {
        println!("📊 {}", monitor.snapshot().to_json()?);
    }

    session.end_call();
    app.back_to_landing();
    println!("\n👋 Call ended, back at {}", app.location());
    Ok(())
}
