use anyhow::{bail, Result};
use signal_reveal::api::{AggregatorEvent, ArgueClient};
use signal_reveal::config::Config;
use signal_reveal::error::ArgueError;
use signal_reveal::reveal::{
    measure_render_size, render_highlight, RevealDriver, RevealFrame, RevealState,
};
use tokio::sync::mpsc;

const HIGHLIGHT_OPEN: &str = "\x1b[7m";
const HIGHLIGHT_CLOSE: &str = "\x1b[0m";

#[tokio::main]
async fn main() -> Result<()> {
    let question = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        bail!("usage: argue <question...>");
    }

    let config = Config::load()?;
    config.validate()?;
    let client = ArgueClient::new(&config)?;

    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let notices = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            if let AggregatorEvent::UpstreamError(message) = event {
                eprintln!("upstream error: {message}");
            }
        }
    });

    let result = client.argue(&question, Some(&events_tx)).await;
    drop(events_tx);
    let _ = notices.await;

    let answer = match result {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            response.response
        }
        Err(ArgueError::Stream(error)) => {
            eprintln!("{error}");
            let partial = error.partial().chat.clone();
            if partial.is_empty() {
                return Err(error.into());
            }
            partial
        }
        Err(error) => return Err(error.into()),
    };

    play_reveal(&config, &answer).await;
    Ok(())
}

async fn play_reveal(config: &Config, text: &str) {
    let profile = config.profile_id().profile();
    let (frames_tx, mut frames_rx) = mpsc::unbounded_channel::<RevealFrame>();

    let mut driver = RevealDriver::new(config.reveal_timing(), frames_tx);
    driver.start(text, || {});

    // The driver holds a sender, so the channel only ends via the Done frame.
    while let Some(frame) = frames_rx.recv().await {
        let size = measure_render_size(&frame.html, &profile);
        match frame.state {
            RevealState::Diffing(_) => println!(
                "[{}x{}] {}",
                size.width,
                size.height,
                render_highlight(&frame.highlight, HIGHLIGHT_OPEN, HIGHLIGHT_CLOSE)
            ),
            RevealState::Done => break,
            _ => println!("[{}x{}] {}", size.width, size.height, frame.html),
        }
    }
}
