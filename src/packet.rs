//! Aurora packet type table and packet codec.
//!
//! Every Aurora frame is `[type: u32 LE][len: u32 LE][body]` where the
//! body is a wire-encoded message whose type follows from the packet
//! type through a fixed table. The table must be identical on encode
//! and decode; an id missing from it is `UnknownPacketType`.

use crate::error::{DecodeError, DecodeErrorKind};
use crate::registry::Registry;
use crate::value::MessageValue;

/// Aurora packet type ids, including the sparse high-range ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum PacketType {
    GetGameState = 1,
    ChooseOption = 2,
    ChooseEntities = 3,
    PreCast = 4,
    DebugMessage = 5,
    ClientPacket = 6,
    StartGameState = 7,
    FinishGameState = 8,
    TurnTimer = 9,
    NackOption = 10,
    GiveUp = 11,
    GameCancelled = 12,
    ForcedEntityChoice = 13,
    AllOptions = 14,
    UserUi = 15,
    GameSetup = 16,
    EntityChoice = 17,
    PreLoad = 18,
    PowerHistory = 19,
    Notification = 21,
    SpectatorHandshake = 22,
    ServerResult = 23,
    SpectatorNotify = 24,
    InviteToSpectate = 25,
    AutoLogin = 103,
    BeginPlaying = 113,
    GameStarting = 114,
    Ping = 115,
    Pong = 116,
    DebugConsoleCommand = 123,
    DebugConsoleResponse = 124,
    AuroraHandshake = 168,
}

/// The fixed packet-type ↔ message-type table.
static PACKET_TABLE: &[(PacketType, &str)] = &[
    (PacketType::GetGameState, "GetGameState"),
    (PacketType::ChooseOption, "ChooseOption"),
    (PacketType::ChooseEntities, "ChooseEntities"),
    (PacketType::PreCast, "PreCast"),
    (PacketType::DebugMessage, "DebugMessage"),
    (PacketType::ClientPacket, "ClientPacket"),
    (PacketType::StartGameState, "StartGameState"),
    (PacketType::FinishGameState, "FinishGameState"),
    (PacketType::TurnTimer, "TurnTimer"),
    (PacketType::NackOption, "NAckOption"),
    (PacketType::GiveUp, "GiveUp"),
    (PacketType::GameCancelled, "GameCancelled"),
    (PacketType::ForcedEntityChoice, "ForcedEntityChoice"),
    (PacketType::AllOptions, "AllOptions"),
    (PacketType::UserUi, "UserUI"),
    (PacketType::GameSetup, "GameSetup"),
    (PacketType::EntityChoice, "EntityChoice"),
    (PacketType::PreLoad, "PreLoad"),
    (PacketType::PowerHistory, "PowerHistory"),
    (PacketType::Notification, "Notification"),
    (PacketType::SpectatorHandshake, "SpectatorHandshake"),
    (PacketType::ServerResult, "ServerResult"),
    (PacketType::SpectatorNotify, "SpectatorNotify"),
    (PacketType::InviteToSpectate, "InviteToSpectate"),
    (PacketType::AutoLogin, "AutoLogin"),
    (PacketType::BeginPlaying, "BeginPlaying"),
    (PacketType::GameStarting, "GameStarting"),
    (PacketType::Ping, "Ping"),
    (PacketType::Pong, "Pong"),
    (PacketType::DebugConsoleCommand, "DebugConsoleCommand"),
    (PacketType::DebugConsoleResponse, "DebugConsoleResponse"),
    (PacketType::AuroraHandshake, "AuroraHandshake"),
];

impl PacketType {
    pub fn from_id(id: u32) -> Option<PacketType> {
        PACKET_TABLE
            .iter()
            .find(|(ty, _)| *ty as u32 == id)
            .map(|(ty, _)| *ty)
    }

    pub fn message_type_name(&self) -> &'static str {
        PACKET_TABLE
            .iter()
            .find(|(ty, _)| ty == self)
            .map(|(_, name)| *name)
            .unwrap_or_else(|| unreachable!("every packet type is in the table"))
    }
}

/// A decoded Aurora packet.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub body: MessageValue,
}

impl Packet {
    pub fn new(packet_type: PacketType, body: MessageValue) -> Packet {
        Packet { packet_type, body }
    }
}

/// Decodes an Aurora frame body against the type table.
pub fn decode_packet(
    registry: &Registry,
    type_id: u32,
    body: &[u8],
) -> Result<Packet, DecodeError> {
    let packet_type = PacketType::from_id(type_id)
        .ok_or_else(|| DecodeError::new(DecodeErrorKind::UnknownPacketType(type_id)))?;
    let message_type = registry
        .lookup(packet_type.message_type_name())
        .ok_or_else(|| DecodeError::new(DecodeErrorKind::UnknownPacketType(type_id)))?;
    let body = MessageValue::decode(registry, message_type, body)?;
    Ok(Packet { packet_type, body })
}

/// Encodes a packet into a whole Aurora frame, prefix included.
pub fn encode_packet(registry: &Registry, packet: &Packet) -> Vec<u8> {
    let body_len = packet.body.encoded_len(registry);
    let mut frame = Vec::with_capacity(8 + body_len);
    frame.extend_from_slice(&(packet.packet_type as u32).to_le_bytes());
    frame.extend_from_slice(&(body_len as u32).to_le_bytes());
    packet.body.encode_raw(registry, &mut frame);
    frame
}
