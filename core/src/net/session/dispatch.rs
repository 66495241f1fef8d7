//! Message dispatch table
//!
//! Each session message kind maps to one handler. Simulation traffic is
//! routed before the table is consulted, so only session kinds appear here.

use hashbrown::HashMap;

use super::NetSession;
use crate::net::codec::MessageType;
use crate::net::game::GameStateMutator;
use crate::net::messages::MessageBody;
use crate::net::transport::Transport;
use crate::net::types::{PeerHandle, SessionError};

/// Handler invoked with the sending peer and the decoded body
pub type Handler<T, G> = fn(&mut NetSession<T, G>, PeerHandle, MessageBody) -> Result<(), SessionError>;

pub type HandlerTable<T, G> = HashMap<MessageType, Handler<T, G>>;

/// Build the table for one session
pub fn handler_table<T: Transport, G: GameStateMutator>() -> HandlerTable<T, G> {
    let mut table: HandlerTable<T, G> = HashMap::new();

    macro_rules! route {
        ($($kind:ident => $method:ident),* $(,)?) => {
            $(
                table.insert(MessageType::$kind, |session: &mut NetSession<T, G>, from, body| {
                    match body {
                        MessageBody::$kind(message) => session.$method(from, message),
                        other => Err(mismatched(MessageType::$kind, &other)),
                    }
                });
            )*
        };
    }

    route! {
        Options => recv_options,
        Leaving => recv_leaving,
        Kick => recv_kick,
        JoinRejected => recv_join_rejected,
        PlayerResponding => recv_player_responding,
        VersionCheck => recv_version_check,
        ColourRequest => recv_colour_request,
        TeamRequest => recv_team_request,
        ReadyRequest => recv_ready_request,
        RequestMap => recv_map_request,
        FileChunk => recv_file_chunk,
        Text => recv_text,
        AiText => recv_ai_text,
        Beacon => recv_beacon,
        Ping => recv_ping,
        Pong => recv_pong,
        AudioStream => recv_audio,
    }

    table.insert(MessageType::FireUp, |session: &mut NetSession<T, G>, from, _body| {
        session.recv_fire_up(from)
    });

    table
}

fn mismatched(expected: MessageType, body: &MessageBody) -> SessionError {
    SessionError::Codec(crate::net::codec::CodecError::Payload {
        kind: expected,
        reason: format!("handler received a {} body", body.kind()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::game::RecordingGame;
    use crate::net::transport::LoopbackTransport;

    #[test]
    fn test_every_session_kind_has_handler() {
        let table = handler_table::<LoopbackTransport, RecordingGame>();
        for kind in MessageType::ALL {
            assert_eq!(
                table.contains_key(kind),
                !kind.is_game_traffic(),
                "{kind} routing"
            );
        }
    }
}
