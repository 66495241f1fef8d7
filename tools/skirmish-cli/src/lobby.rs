//! Shared terminal lobby loop for host and join

use anyhow::{Context, Result};
use std::io::BufRead;
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use skirmish_core::config::{self, NetConfig};
use skirmish_core::net::{
    DeferredEvent, GameStateMutator, KickReason, NetEvent, NetSession, ScriptCallbacks,
    SessionConfig, SessionPhase, Transport,
};
use skirmish_shared::BuildInfo;

/// Poll rate of the lobby loop
const TICK: Duration = Duration::from_millis(33);

/// Load the net config from `path`, or from the platform directory
pub fn load_config(path: Option<&Path>) -> Result<NetConfig> {
    match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(config::load()),
    }
}

/// Game stand-in for a terminal lobby; it only logs what the session asks
pub struct HeadlessGame;

impl GameStateMutator for HeadlessGame {
    fn clear_player_entities(&mut self, slot: usize) {
        tracing::debug!(slot, "Clearing player entities");
    }

    fn apply_session_config(&mut self, config: &SessionConfig) {
        tracing::debug!(
            map = %config.map_name,
            max_players = config.max_players,
            "Applying session config"
        );
    }

    fn spawn_remote_proxy(&mut self, slot: usize) {
        tracing::debug!(slot, "Spawning remote proxy");
    }
}

/// Prints deferred script events as they fire
struct PrintCallbacks;

impl ScriptCallbacks for PrintCallbacks {
    fn on_beacon(&mut self, event: DeferredEvent) {
        println!(
            "[beacon] slot {} at ({}, {}): {}",
            event.from_slot, event.x, event.y, event.text
        );
    }

    fn on_ai_message(&mut self, event: DeferredEvent) {
        println!("[ai] {} -> {}: {}", event.from_slot, event.to_slot, event.text);
    }

    fn on_video_quit(&mut self, event: DeferredEvent) {
        println!("[video] slot {} closed the video", event.from_slot);
    }
}

enum Command<'a> {
    Start,
    Ready,
    Kick(usize),
    Quit,
    Chat(&'a str),
    Unknown(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Chat(line);
    };
    let mut parts = rest.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("start"), None) => Command::Start,
        (Some("ready"), None) => Command::Ready,
        (Some("quit"), None) => Command::Quit,
        (Some("kick"), Some(slot)) => match slot.parse() {
            Ok(slot) => Command::Kick(slot),
            Err(_) => Command::Unknown(line),
        },
        _ => Command::Unknown(line),
    }
}

/// Lines typed on stdin, read on a background thread
fn spawn_stdin() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

fn print_event(event: &NetEvent) {
    match event {
        NetEvent::PlayerJoined { slot, name } => println!("* {name} joined in slot {slot}"),
        NetEvent::PlayerLeft { slot, reason } => println!("* slot {slot} left ({reason:?})"),
        NetEvent::OptionsUpdated => tracing::debug!("Options updated"),
        NetEvent::SlotAssigned { slot } => println!("* you are in slot {slot}"),
        NetEvent::VersionMismatch { local, remote } => {
            println!("* host runs {remote}, you run {local}")
        }
        NetEvent::JoinRejected(reason) => println!("* the host refused the join ({reason:?})"),
        NetEvent::Kicked(reason) => println!("* you were kicked ({reason:?})"),
        NetEvent::HostLeft => println!("* the host left"),
        NetEvent::GameStarted => println!("* game started"),
        NetEvent::MapProgress { name, percent } => println!("* {name}: {percent}%"),
        NetEvent::MapReceived { name } => println!("* received {name}"),
        NetEvent::MapSent { name, peer } => println!("* sent {name} to {peer}"),
        NetEvent::TextReceived { .. } => {}
        NetEvent::GameMessage { from_slot, kind, .. } => {
            tracing::debug!(from_slot, ?kind, "Game message")
        }
        NetEvent::AudioStream { from_slot, data } => {
            tracing::debug!(from_slot, bytes = data.len(), "Audio")
        }
    }
}

fn run_command<T: Transport>(session: &mut NetSession<T, HeadlessGame>, line: &str) {
    let result = match parse_command(line) {
        Command::Start => session.start_game(),
        Command::Ready => {
            let ready = !session.is_ready();
            session.set_ready(ready).map(|()| {
                println!("* {}", if ready { "ready" } else { "not ready" });
            })
        }
        Command::Kick(slot) => session.kick(slot, KickReason::Moderator),
        Command::Quit => session.leave(),
        Command::Chat(text) => session.send_text(text, false),
        Command::Unknown(line) => {
            println!("* unknown command: {line}");
            Ok(())
        }
    };
    if let Err(e) = result {
        println!("* {e}");
    }
}

/// Drive the session until it closes
pub fn run<T: Transport>(mut session: NetSession<T, HeadlessGame>) -> Result<()> {
    let input = spawn_stdin();
    let mut callbacks = PrintCallbacks;

    let build = BuildInfo::current();
    println!("skirmish {} (protocol {})", build.version, build.protocol);
    println!("Type to chat. Commands: /ready /start /kick N /quit");

    loop {
        let frame_start = Instant::now();

        loop {
            match input.try_recv() {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        run_command(&mut session, line);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    session.leave()?;
                    break;
                }
            }
        }

        for event in session.poll() {
            print_event(&event);
        }
        session.fire_deferred(&mut callbacks);
        for line in session.drain_console() {
            println!("{line}");
        }

        if session.phase() == SessionPhase::Closed {
            break;
        }

        if let Some(rest) = TICK.checked_sub(frame_start.elapsed()) {
            thread::sleep(rest);
        }
    }

    tracing::info!("Session closed");
    Ok(())
}
