//! Tests for message bodies

use skirmish_shared::{BuildInfo, MAX_SLOTS};

use super::*;
use crate::net::codec::Codec;
use crate::net::types::{KickReason, PeerHandle};

fn sample_config() -> SessionConfig {
    SessionConfig {
        session_name: "Friday Night".to_string(),
        map_name: "Sk-Rush".to_string(),
        max_players: 4,
        game_type: GameType::TeamPlay,
        fog_enabled: false,
        alliances: AlliancesMode::FixedTeams,
        power_level: PowerLevel::High,
        base_type: BaseType::AdvancedBases,
        structure_limits: vec![
            StructureLimit {
                structure_id: 3,
                limit: 5,
            },
            StructureLimit {
                structure_id: 11,
                limit: 0,
            },
        ],
    }
}

fn sample_snapshot() -> OptionsSnapshot {
    let mut slots = vec![SlotInfo::default(); MAX_SLOTS];
    slots[0] = SlotInfo {
        peer: Some(PeerHandle(1)),
        ready: true,
        colour: 2,
        difficulty: u8::MAX,
        name: "Host".to_string(),
        ..Default::default()
    };
    slots[3] = SlotInfo {
        ai: true,
        colour: 5,
        team: 1,
        difficulty: 15,
        name: "Nexus".to_string(),
        ..Default::default()
    };
    slots[5] = SlotInfo {
        peer: Some(PeerHandle(7)),
        joining: true,
        colour: 6,
        team: 1,
        name: "Guest".to_string(),
        ..Default::default()
    };

    OptionsSnapshot {
        version: "0.1.0".to_string(),
        config: sample_config(),
        slots,
        new_player: Some(NewPlayer {
            peer: PeerHandle(7),
            slot: 5,
        }),
    }
}

#[test]
fn test_options_roundtrip_through_wire() {
    let snapshot = sample_snapshot();
    let codec = Codec::obfuscated(99);

    let bytes = codec.encode(&MessageBody::Options(snapshot.clone()).to_envelope().unwrap());
    let envelope = codec.decode(&bytes).unwrap();
    let body = MessageBody::from_envelope(&envelope).unwrap();

    match body {
        MessageBody::Options(decoded) => {
            assert_eq!(decoded.config, snapshot.config);
            assert_eq!(decoded, snapshot);
        }
        other => panic!("expected options, got {:?}", other),
    }
}

#[test]
fn test_body_kind_matches_envelope() {
    let bodies = vec![
        MessageBody::Leaving(LeavingNotice { slot: 2, host: false }),
        MessageBody::Kick(KickNotice {
            slot: 1,
            reason: KickReason::SessionFull,
        }),
        MessageBody::VersionCheck(VersionCheck {
            slot: 1,
            build: BuildInfo::new("0.1.0", 1),
        }),
        MessageBody::FireUp,
        MessageBody::Text(TextMessage {
            from: 0,
            private: true,
            text: "hi".to_string(),
        }),
        MessageBody::Beacon(BeaconMessage {
            from: 0,
            to: 3,
            x: -40,
            y: 1200,
            text: "here".to_string(),
        }),
    ];

    for body in bodies {
        let envelope = body.to_envelope().unwrap();
        assert_eq!(envelope.kind(), body.kind());
        assert_eq!(MessageBody::from_envelope(&envelope).unwrap(), body);
    }
}

#[test]
fn test_fire_up_has_empty_payload() {
    let envelope = MessageBody::FireUp.to_envelope().unwrap();
    assert_eq!(envelope.size(), 0);
}

#[test]
fn test_game_traffic_passthrough() {
    let envelope = crate::net::codec::Envelope::new(MessageType::Research, vec![9, 8, 7]).unwrap();
    let body = MessageBody::from_envelope(&envelope).unwrap();
    assert_eq!(
        body,
        MessageBody::Game {
            kind: MessageType::Research,
            payload: vec![9, 8, 7]
        }
    );
}

#[test]
fn test_garbage_payload_is_codec_error() {
    let envelope = crate::net::codec::Envelope::new(MessageType::Options, vec![0xFF; 3]).unwrap();
    let result = MessageBody::from_envelope(&envelope);
    assert!(matches!(
        result,
        Err(CodecError::Payload {
            kind: MessageType::Options,
            ..
        })
    ));
}

#[test]
fn test_file_chunk_layout() {
    let chunk = FileChunk {
        total_bytes: 5000,
        offset: 2048,
        name: "4c-Rush.wz".to_string(),
        data: vec![1, 2, 3],
    };
    let bytes = chunk.to_bytes();

    assert_eq!(&bytes[0..4], &5000u32.to_le_bytes());
    assert_eq!(&bytes[4..8], &3u32.to_le_bytes());
    assert_eq!(&bytes[8..12], &2048u32.to_le_bytes());
    assert_eq!(bytes[12] as usize, "4c-Rush.wz".len());
    assert_eq!(&bytes[13..23], b"4c-Rush.wz");
    assert_eq!(&bytes[23..], &[1, 2, 3]);

    assert_eq!(FileChunk::from_bytes(&bytes).unwrap(), chunk);
}

#[test]
fn test_file_chunk_truncated_rejected() {
    let chunk = FileChunk {
        total_bytes: 10,
        offset: 0,
        name: "a.wz".to_string(),
        data: vec![0; 10],
    };
    let bytes = chunk.to_bytes();
    assert!(FileChunk::from_bytes(&bytes[..bytes.len() - 1]).is_err());
    assert!(FileChunk::from_bytes(&bytes[..5]).is_err());
}

#[test]
fn test_file_chunk_progress() {
    let mut chunk = FileChunk {
        total_bytes: 4096,
        offset: 0,
        name: "m.wz".to_string(),
        data: vec![0; 2048],
    };
    assert_eq!(chunk.progress(), 50);
    assert!(!chunk.is_last());

    chunk.offset = 2048;
    assert_eq!(chunk.progress(), 100);
    assert!(chunk.is_last());

    let empty = FileChunk {
        total_bytes: 0,
        offset: 0,
        name: "e.wz".to_string(),
        data: Vec::new(),
    };
    assert_eq!(empty.progress(), 100);
    assert!(empty.is_last());
}
