//! Declarative message and service tables.
//!
//! These tables are data, not code: each row is `(field number, name,
//! type)`, transcribed from the wire protocol. The registry is built
//! once per process and is read-only afterwards; everything that
//! decodes or encodes borrows it through [`registry()`].

use std::sync::OnceLock;

use crate::registry::{field, repeated, Registry, RegistryBuilder, TypeId};
use crate::service::{method, RespSpec, ServiceRegistry, ServiceRegistryBuilder};

use crate::registry::FieldType::{
    Bool, Bytes, Enum, Fixed32, Fixed64, Float, Int32, Int64, Message, Str, Uint32, Uint64,
};

/// The process-wide message type registry.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut builder = RegistryBuilder::new();
        register_game_messages(&mut builder);
        register_bnet_messages(&mut builder);
        builder.build().expect("static message tables must build")
    })
}

/// The process-wide service registry.
pub fn services() -> &'static ServiceRegistry {
    static SERVICES: OnceLock<ServiceRegistry> = OnceLock::new();
    SERVICES.get_or_init(|| {
        let mut builder = ServiceRegistryBuilder::new();
        register_services(&mut builder);
        builder
            .build(registry())
            .expect("static service tables must build")
    })
}

/// `TypeId` of the RPC envelope header message.
pub fn packet_header_type() -> TypeId {
    match registry().lookup("BnetPacketHeader") {
        Some(id) => id,
        None => unreachable!("the header type is registered with the batch"),
    }
}

pub const CONNECTION_SERVICE: &str = "bnet.protocol.connection.ConnectionService";
pub const AUTHENTICATION_SERVER: &str = "bnet.protocol.authentication.AuthenticationServer";
pub const AUTHENTICATION_CLIENT: &str = "bnet.protocol.authentication.AuthenticationClient";

fn register_game_messages(b: &mut RegistryBuilder) {
    b.message("PowerHistory", &[repeated(1, "List", Message("PowerHistoryData"))]);

    b.message(
        "PowerHistoryData",
        &[
            field(1, "FullEntity", Message("PowerHistoryEntity")),
            field(2, "ShowEntity", Message("PowerHistoryEntity")),
            field(3, "HideEntity", Message("PowerHistoryHide")),
            field(4, "TagChange", Message("PowerHistoryTagChange")),
            field(5, "CreateGame", Message("PowerHistoryCreateGame")),
            field(6, "PowerStart", Message("PowerHistoryStart")),
            field(7, "PowerEnd", Message("PowerHistoryEnd")),
            field(8, "MetaData", Message("PowerHistoryMetaData")),
        ],
    );

    b.message(
        "PowerHistoryStart",
        &[
            field(1, "Type", Enum),
            field(2, "Index", Int32),
            field(3, "Source", Int32),
            field(4, "Target", Int32),
        ],
    );

    b.message("PowerHistoryEnd", &[]);

    b.message(
        "PowerHistoryMetaData",
        &[
            repeated(2, "Info", Int32),
            field(3, "MetaType", Int32),
            field(4, "Data", Int32),
        ],
    );

    b.message("ClientPacket", &[field(1, "Packet", Bytes)]);

    b.message("DebugMessage", &[field(1, "Message", Str)]);

    b.message(
        "Entity",
        &[field(1, "Id", Int32), repeated(2, "Tags", Message("Tag"))],
    );

    b.message(
        "EntityChoice",
        &[
            field(1, "Id", Int32),
            field(2, "ChoiceType", Int32),
            field(3, "Cancelable", Bool),
            field(4, "CountMin", Int32),
            field(5, "CountMax", Int32),
            repeated(6, "Entities", Int32),
            field(7, "SourceField", Int32),
        ],
    );

    b.message(
        "PowerHistoryCreateGame",
        &[
            field(1, "GameEntity", Message("Entity")),
            repeated(2, "Players", Message("Player")),
        ],
    );

    b.message("BeginPlaying", &[field(1, "Mode", Enum)]);

    b.message(
        "Platform",
        &[
            field(1, "OS", Int32),
            field(2, "Screen", Int32),
            field(3, "Name", Str),
        ],
    );

    b.message(
        "AuroraHandshake",
        &[
            field(1, "GameHandle", Int32),
            field(2, "Password", Str),
            field(3, "ClientHandle", Int64),
            field(4, "Mission", Int32),
            field(5, "Version", Str),
            field(6, "OldPlatform", Int32),
            field(7, "Platform", Message("Platform")),
        ],
    );

    b.message(
        "AutoLogin",
        &[
            field(1, "User", Str),
            field(2, "Pwd", Str),
            field(3, "BuildId", Int32),
            field(4, "DebugName", Str),
            field(5, "Source", Int32),
        ],
    );

    b.message("BnetId", &[field(1, "Lo", Uint64), field(2, "Hi", Uint64)]);

    b.message(
        "Player",
        &[
            field(1, "Id", Int32),
            field(2, "GameAccountId", Message("BnetId")),
            field(3, "CardBack", Int32),
            field(4, "Entity", Message("Entity")),
        ],
    );

    b.message(
        "PowerHistoryHide",
        &[field(1, "Entity", Int32), field(2, "Zone", Int32)],
    );

    b.message(
        "PowerHistoryTagChange",
        &[
            field(1, "Entity", Int32),
            field(2, "Tag", Int32),
            field(3, "Value", Int32),
        ],
    );

    b.message(
        "PowerHistoryEntity",
        &[
            field(1, "Entity", Int32),
            field(2, "Name", Str),
            repeated(3, "Tags", Message("Tag")),
        ],
    );

    b.message("Tag", &[field(1, "Name", Int32), field(2, "Value", Int32)]);

    b.message(
        "MouseInfo",
        &[
            field(1, "ArrowOrigin", Int32),
            field(2, "HeldCard", Int32),
            field(3, "OverCard", Int32),
            field(4, "X", Int32),
            field(5, "Y", Int32),
        ],
    );

    b.message(
        "UserUI",
        &[field(1, "MouseInfo", Message("MouseInfo")), field(2, "Emote", Int32)],
    );

    b.message(
        "TurnTimer",
        &[
            field(1, "Seconds", Int32),
            field(2, "Turn", Int32),
            field(3, "Show", Bool),
        ],
    );

    b.message(
        "Option",
        &[
            field(1, "Type", Enum),
            field(2, "MainOption", Message("SubOption")),
            repeated(3, "SubOptions", Message("SubOption")),
        ],
    );

    b.message(
        "SpectatorHandshake",
        &[
            field(1, "GameHandle", Uint32),
            field(2, "Password", Str),
            field(3, "Version", Str),
            field(4, "Platform", Message("Platform")),
            field(5, "GameAccountId", Message("BnetId")),
        ],
    );

    b.message(
        "SpectatorChange",
        &[
            field(1, "GameAccountId", Message("BnetId")),
            field(2, "IsRemoved", Bool),
        ],
    );

    b.message("SpectatorRemoved", &[field(1, "ReasonCode", Int32)]);

    b.message(
        "SpectatorNotify",
        &[
            field(1, "PlayerId", Int32),
            field(2, "ChooseOption", Message("ChooseOption")),
            field(3, "ChooseEntities", Message("ChooseEntities")),
            repeated(4, "SpectatorChange", Message("SpectatorChange")),
            field(5, "SpectatorPasswordUpdate", Str),
            field(6, "SpectatorRemoved", Message("SpectatorRemoved")),
        ],
    );

    b.message(
        "InviteToSpectate",
        &[
            field(1, "BnetAccountId", Message("BnetId")),
            field(2, "GameAccountId", Message("BnetId")),
        ],
    );

    b.message(
        "ForcedEntityChoice",
        &[field(1, "Id", Int32), field(2, "Entities", Int32)],
    );

    b.message(
        "AllOptions",
        &[field(1, "Id", Int32), repeated(2, "Options", Message("Option"))],
    );

    b.message(
        "ChooseEntities",
        &[field(1, "Id", Int32), repeated(2, "Entities", Int32)],
    );

    b.message(
        "ChooseOption",
        &[
            field(1, "Id", Int32),
            field(2, "Index", Int32),
            field(3, "Target", Int32),
            field(4, "SubOption", Int32),
            field(5, "Position", Int32),
            field(6, "OldPlatform", Int32),
            field(7, "Platform", Message("Platform")),
        ],
    );

    b.message(
        "ServerResult",
        &[
            field(1, "ResultCode", Int32),
            field(2, "RetryDelaySeconds", Float),
        ],
    );

    b.message("Ping", &[]);
    b.message("Pong", &[]);

    b.message("Notification", &[field(1, "Type", Int32)]);

    b.message("NAckOption", &[field(1, "Id", Int32)]);

    b.message("GameStarting", &[field(1, "GameHandle", Int32)]);

    b.message("FinishGameState", &[]);

    b.message("GameCancelled", &[field(1, "Reason", Int32)]);

    b.message(
        "GameSetup",
        &[
            field(1, "Board", Int32),
            field(2, "MaxSecretsPerPlayer", Int32),
            field(3, "MaxFriendlyMinionPerPlayer", Int32),
            field(4, "KeepAliveFrequency", Int32),
        ],
    );

    b.message("GetGameState", &[]);

    b.message(
        "GiveUp",
        &[field(1, "OldPlatform", Int32), field(2, "Platform", Message("Platform"))],
    );

    b.message(
        "SubOption",
        &[field(1, "Id", Int32), repeated(3, "Targets", Int32)],
    );

    b.message(
        "StartGameState",
        &[
            field(1, "GameEntity", Message("Entity")),
            repeated(2, "Players", Message("Player")),
        ],
    );

    b.message("PreLoad", &[repeated(1, "Cards", Int32)]);

    b.message("PreCast", &[field(1, "Entity", Int32)]);

    b.message("DebugConsoleCommand", &[field(1, "Command", Str)]);

    b.message(
        "DebugConsoleResponse",
        &[field(1, "Response", Str), field(2, "ResponseType", Enum)],
    );
}

fn register_bnet_messages(b: &mut RegistryBuilder) {
    b.message(
        "BnetBoundService",
        &[field(1, "Hash", Fixed32), field(2, "Id", Uint32)],
    );

    b.message(
        "BnetBindRequest",
        &[
            repeated(1, "ImportedServiceHash", Fixed32),
            repeated(2, "ExportedService", Message("BnetBoundService")),
        ],
    );

    b.message(
        "BnetConnectRequest",
        &[
            field(1, "ClientId", Message("BnetProcessId")),
            field(2, "BindRequest", Message("BnetBindRequest")),
        ],
    );

    b.message(
        "BnetContentHandle",
        &[
            field(1, "region", Fixed32),
            field(2, "usage", Fixed32),
            field(3, "hash", Bytes),
            field(4, "proto_url", Str),
        ],
    );

    b.message(
        "BnetContentMeteringContentHandles",
        &[repeated(1, "List", Message("BnetContentHandle"))],
    );

    b.message("BnetBindResponse", &[repeated(1, "ImportedServices", Uint32)]);

    b.message(
        "BnetConnectResponse",
        &[
            field(1, "ServerId", Message("BnetProcessId")),
            field(2, "ClientId", Message("BnetProcessId")),
            field(3, "BindResult", Uint32),
            field(4, "BindResponse", Message("BnetBindResponse")),
            field(5, "ContentHandleArray", Message("BnetContentMeteringContentHandles")),
            field(6, "ServerTime", Uint64),
        ],
    );

    b.message("BnetNoData", &[]);

    b.message(
        "BnetLogonRequest",
        &[
            field(1, "program", Str),
            field(2, "platform", Str),
            field(3, "locale", Str),
            field(4, "email", Str),
            field(5, "version", Str),
            field(6, "application_version", Int32),
            field(7, "public_computer", Bool),
            field(8, "sso_id", Bytes),
            field(9, "disconnect_on_cookie_fail", Bool),
            field(10, "allow_logon_queue_notifications", Bool),
            field(11, "web_client_verification", Bool),
            field(12, "cached_web_credentials", Bytes),
            field(14, "user_agent", Str),
        ],
    );

    b.message(
        "EntityId",
        &[field(1, "high", Fixed64), field(2, "low", Fixed64)],
    );

    b.message(
        "Attribute",
        &[field(1, "name", Str), field(2, "value", Message("BnetVariant"))],
    );

    b.message(
        "Friend",
        &[
            field(1, "id", Message("EntityId")),
            repeated(2, "attribute", Message("Attribute")),
            repeated(3, "role", Uint32),
            field(4, "privileges", Uint64),
            field(5, "attributes_epoch", Uint64),
            field(6, "full_name", Str),
            field(7, "battle_tag", Str),
        ],
    );

    b.message(
        "Identity",
        &[
            field(1, "account_id", Message("EntityId")),
            field(2, "game_account_id", Message("EntityId")),
        ],
    );

    b.message(
        "Role",
        &[
            field(1, "id", Uint32),
            field(2, "name", Str),
            repeated(3, "privilege", Str),
            repeated(4, "assignable_role", Uint32),
            field(5, "required", Bool),
            field(6, "unique", Bool),
            field(7, "relegation_role", Uint32),
            repeated(8, "attribute", Message("Attribute")),
        ],
    );

    b.message(
        "Invitation",
        &[
            field(1, "id", Fixed64),
            field(2, "inviter_identity", Message("Identity")),
            field(3, "invitee_identity", Message("Identity")),
            field(4, "inviter_name", Str),
            field(5, "invitee_name", Str),
            field(6, "invitation_message", Str),
            field(7, "creation_time", Uint64),
            field(8, "expiration_time", Uint64),
        ],
    );

    b.message(
        "SubscribeToFriendsRequest",
        &[
            field(1, "agent_id", Message("EntityId")),
            field(2, "object_id", Uint64),
        ],
    );

    b.message(
        "SubscribeToFriendsResponse",
        &[
            field(1, "max_friends", Uint32),
            field(2, "max_received_invitations", Uint32),
            field(3, "max_sent_invitations", Uint32),
            repeated(4, "role", Message("Role")),
            repeated(5, "friends", Message("Friend")),
            repeated(6, "sent_invitations", Message("Invitation")),
            repeated(7, "received_invitations", Message("Invitation")),
        ],
    );

    b.message(
        "BnetPresenceSubscribeRequest",
        &[
            field(1, "agent_id", Message("EntityId")),
            field(2, "entity_id", Message("EntityId")),
            field(3, "object_id", Uint64),
            repeated(4, "program_id", Fixed32),
        ],
    );

    b.message(
        "BnetPresenceUnsubscribeRequest",
        &[
            field(1, "agent_id", Message("EntityId")),
            field(2, "entity_id", Message("EntityId")),
        ],
    );

    b.message(
        "PresenceFieldKey",
        &[
            field(1, "program", Uint32),
            field(2, "group", Uint32),
            field(3, "field", Uint32),
            field(4, "index", Uint64),
        ],
    );

    b.message(
        "PresenceField",
        &[
            field(1, "key", Message("PresenceFieldKey")),
            field(2, "value", Message("BnetVariant")),
        ],
    );

    b.message(
        "PresenceFieldOperation",
        &[
            field(1, "field", Message("PresenceField")),
            field(2, "operation", Enum),
        ],
    );

    b.message(
        "BnetPresenceUpdateRequest",
        &[
            field(1, "entity_id", Message("EntityId")),
            repeated(2, "field_operation", Message("PresenceFieldOperation")),
        ],
    );

    b.message(
        "BnetPresenceQueryRequest",
        &[
            field(1, "entity_id", Message("EntityId")),
            field(2, "key", Message("PresenceFieldKey")),
        ],
    );

    b.message(
        "BnetPresenceQueryResponse",
        &[repeated(2, "field", Message("PresenceField"))],
    );

    b.message(
        "BnetVariant",
        &[
            field(2, "boolval", Bool),
            field(3, "intval", Int64),
            field(4, "floatval", Float),
            field(5, "stringval", Str),
            field(6, "blobval", Bytes),
            field(7, "messageval", Bytes),
            field(8, "fourccval", Str),
            field(9, "uintval", Uint64),
            field(10, "entityidval", Message("EntityId")),
        ],
    );

    b.message("BnetLogonUpdateRequest", &[field(1, "error_code", Uint32)]);

    b.message(
        "BnetLogonResult",
        &[
            field(1, "error_code", Uint32),
            field(2, "account", Message("EntityId")),
            repeated(3, "game_account", Message("EntityId")),
            field(4, "email", Str),
            repeated(5, "available_region", Uint32),
            field(6, "connected_region", Uint32),
            field(7, "battle_tag", Str),
            field(8, "geoip_country", Str),
        ],
    );

    b.message(
        "BnetEchoRequest",
        &[
            field(1, "time", Fixed64),
            field(2, "network_only", Bool),
            field(3, "payload", Bytes),
        ],
    );

    b.message(
        "BnetEchoResponse",
        &[field(1, "time", Fixed64), field(2, "payload", Bytes)],
    );

    b.message(
        "BnetProcessId",
        &[field(1, "Label", Uint32), field(2, "Epoch", Uint32)],
    );

    b.message(
        "BnetObjectAddress",
        &[
            field(1, "Host", Message("BnetProcessId")),
            field(2, "ObjectId", Uint64),
        ],
    );

    b.message(
        "BnetErrorInfo",
        &[
            field(1, "ObjectAddress", Message("BnetObjectAddress")),
            field(2, "Status", Uint32),
            field(3, "ServiceHash", Uint32),
            field(4, "MethodId", Uint32),
        ],
    );

    b.message(
        "BnetModuleLoadRequest",
        &[
            field(1, "ModuleHandle", Message("BnetContentHandle")),
            field(2, "Message", Bytes),
        ],
    );

    b.message("BnetEncryptRequest", &[]);

    b.message(
        "BnetModuleMessageRequest",
        &[field(1, "ModuleId", Int32), field(2, "Message", Bytes)],
    );

    b.message(
        "BnetModuleNotification",
        &[field(2, "ModuleId", Int32), field(3, "Result", Uint32)],
    );

    b.message("BnetDisconnectRequest", &[field(1, "error_code", Uint32)]);

    b.message(
        "BnetLogonQueueUpdateRequest",
        &[
            field(1, "Position", Uint32),
            field(2, "EstimatedTime", Uint64),
            field(3, "EtaDeviationInSec", Uint64),
        ],
    );

    b.message(
        "BnetPacketHeader",
        &[
            field(1, "ServiceId", Uint32),
            field(2, "MethodId", Uint32),
            field(3, "Token", Uint32),
            field(4, "ObjectId", Uint32),
            field(5, "Size", Uint32),
            field(6, "Status", Uint32),
            repeated(7, "Error", Message("BnetErrorInfo")),
            field(8, "Timeout", Uint64),
        ],
    );

    b.message(
        "BnetNotification",
        &[
            field(1, "sender_id", Message("EntityId")),
            field(2, "target_id", Message("EntityId")),
            field(3, "type", Str),
            repeated(4, "attribute", Message("Attribute")),
            field(5, "sender_account_id", Message("EntityId")),
            field(6, "target_account_id", Message("EntityId")),
            field(7, "sender_battle_tag", Str),
        ],
    );

    b.message(
        "ClientRequest",
        &[
            repeated(1, "attributes", Message("Attribute")),
            field(2, "host", Message("BnetProcessId")),
            field(3, "bnet_account_id", Message("EntityId")),
            field(4, "game_account_id", Message("EntityId")),
        ],
    );

    b.message(
        "ClientResponse",
        &[repeated(1, "attributes", Message("Attribute"))],
    );

    b.message(
        "ContentHandleRequest",
        &[
            field(1, "program_id", Fixed32),
            field(2, "stream_id", Fixed32),
            field(3, "locale", Fixed32),
        ],
    );

    b.message(
        "GameSessionLocation",
        &[
            field(1, "ip_address", Str),
            field(2, "country", Uint32),
            field(3, "city", Str),
        ],
    );

    b.message(
        "GameSessionInfo",
        &[
            field(3, "start_time", Uint32),
            field(4, "location", Message("GameSessionLocation")),
            field(5, "has_benefactor", Bool),
            field(6, "is_using_igr", Bool),
            field(7, "parental_control_active", Bool),
        ],
    );

    b.message(
        "GetGameSessionInfoRequest",
        &[field(1, "entity_id", Message("EntityId"))],
    );

    b.message(
        "GetGameSessionInfoResponse",
        &[field(2, "session_info", Message("GameSessionInfo"))],
    );

    b.message(
        "GetAccountStateRequest",
        &[
            field(1, "entity_id", Message("EntityId")),
            field(2, "program", Uint32),
            field(3, "region", Uint32),
        ],
    );

    b.message(
        "AccountLevelInfo",
        &[field(1, "preferred_region", Uint32), field(2, "country", Str)],
    );

    b.message(
        "AccountState",
        &[field(1, "account_level_info", Message("AccountLevelInfo"))],
    );

    b.message(
        "GetAccountStateResponse",
        &[field(1, "state", Message("AccountState"))],
    );
}

fn register_services(b: &mut ServiceRegistryBuilder) {
    b.service(
        "bnet.protocol.notification.NotificationListener",
        &[method(
            1,
            "on_notification_received",
            Some("BnetNotification"),
            RespSpec::NoResponse,
        )],
    );

    b.service(
        "bnet.protocol.friends.FriendsService",
        &[method(
            1,
            "subscribe_to_friends",
            Some("SubscribeToFriendsRequest"),
            RespSpec::Message("SubscribeToFriendsResponse"),
        )],
    );

    b.service(
        "bnet.protocol.channel_invitation.ChannelInvitationService",
        &[method(1, "subscribe", None, RespSpec::NotImplemented)],
    );

    b.service(
        "bnet.protocol.resources.Resources",
        &[method(
            1,
            "get_content_handle",
            Some("ContentHandleRequest"),
            RespSpec::Message("BnetContentHandle"),
        )],
    );

    b.service(
        "bnet.protocol.account.AccountService",
        &[method(
            30,
            "get_account_state",
            Some("GetAccountStateRequest"),
            RespSpec::Message("GetAccountStateResponse"),
        )],
    );

    b.service(
        "bnet.protocol.presence.PresenceService",
        &[
            method(
                1,
                "subscribe",
                Some("BnetPresenceSubscribeRequest"),
                RespSpec::Message("BnetNoData"),
            ),
            method(
                2,
                "unsubscribe",
                Some("BnetPresenceUnsubscribeRequest"),
                RespSpec::Message("BnetNoData"),
            ),
            method(
                3,
                "update",
                Some("BnetPresenceUpdateRequest"),
                RespSpec::Message("BnetNoData"),
            ),
            method(
                4,
                "query",
                Some("BnetPresenceQueryRequest"),
                RespSpec::Message("BnetPresenceQueryResponse"),
            ),
        ],
    );

    b.service(
        AUTHENTICATION_SERVER,
        &[
            method(1, "Logon", Some("BnetLogonRequest"), RespSpec::Message("BnetNoData")),
            method(
                2,
                "ModuleNotify",
                Some("BnetModuleNotification"),
                RespSpec::Message("BnetNoData"),
            ),
            method(
                3,
                "ModuleMessage",
                Some("BnetModuleMessageRequest"),
                RespSpec::Message("BnetNoData"),
            ),
            method(
                4,
                "SelectGameAccount_DEPRECATED",
                Some("EntityId"),
                RespSpec::Message("BnetNoData"),
            ),
            method(5, "GenerateTempCookie", None, RespSpec::NotImplemented),
            method(6, "SelectGameAccount", None, RespSpec::Message("BnetNoData")),
            method(7, "VerifyWebCredentials", None, RespSpec::Message("BnetNoData")),
        ],
    );

    b.service(
        CONNECTION_SERVICE,
        &[
            method(
                1,
                "Connect",
                Some("BnetConnectRequest"),
                RespSpec::Message("BnetConnectResponse"),
            ),
            method(2, "Bind", None, RespSpec::NotImplemented),
            method(
                3,
                "Echo",
                Some("BnetEchoRequest"),
                RespSpec::Message("BnetEchoResponse"),
            ),
            method(4, "ForceDisconnect", None, RespSpec::NoResponse),
            method(5, "KeepAlive", Some("BnetNoData"), RespSpec::NoResponse),
            method(6, "Encrypt", Some("BnetEncryptRequest"), RespSpec::Message("BnetNoData")),
            method(
                7,
                "RequestDisconnect",
                Some("BnetDisconnectRequest"),
                RespSpec::NoResponse,
            ),
        ],
    );

    b.service(
        AUTHENTICATION_CLIENT,
        &[
            method(1, "ModuleLoad", Some("BnetModuleLoadRequest"), RespSpec::NoResponse),
            method(
                2,
                "ModuleMessage",
                Some("BnetModuleMessageRequest"),
                RespSpec::Message("BnetNoData"),
            ),
            method(3, "AccountSettings", None, RespSpec::NotImplemented),
            method(4, "ServerStateChange", None, RespSpec::NotImplemented),
            method(5, "LogonComplete", Some("BnetLogonResult"), RespSpec::NotImplemented),
            method(6, "MemModuleLoad", None, RespSpec::NotImplemented),
            method(
                10,
                "LogonUpdate",
                Some("BnetLogonUpdateRequest"),
                RespSpec::NotImplemented,
            ),
            method(11, "VersionInfoUpdated", None, RespSpec::NotImplemented),
            method(
                12,
                "LogonQueueUpdate",
                Some("BnetLogonQueueUpdateRequest"),
                RespSpec::NotImplemented,
            ),
            method(13, "LogonQueueEnd", Some("BnetNoData"), RespSpec::NotImplemented),
            method(14, "GameAccountSelected", None, RespSpec::NotImplemented),
        ],
    );

    b.service(
        "bnet.protocol.game_utilities.GameUtilities",
        &[
            method(
                1,
                "process_client_request",
                Some("ClientRequest"),
                RespSpec::Message("ClientResponse"),
            ),
            method(2, "presence_channel_created", None, RespSpec::NotImplemented),
            method(3, "get_player_variables", None, RespSpec::NotImplemented),
            method(5, "get_load", None, RespSpec::NotImplemented),
            method(6, "process_server_request", None, RespSpec::NotImplemented),
            method(7, "notify_game_account_online", None, RespSpec::NotImplemented),
            method(8, "notify_game_account_offline", None, RespSpec::NotImplemented),
        ],
    );

    b.service(
        "bnet.protocol.channel.Channel",
        &[
            method(1, "AddMember", None, RespSpec::Message("BnetNoData")),
            method(2, "RemoveMember", None, RespSpec::Message("BnetNoData")),
            method(3, "SendMessage", None, RespSpec::Message("BnetNoData")),
            method(4, "UpdateChannelState", None, RespSpec::Message("BnetNoData")),
            method(5, "UpdateMemberState", None, RespSpec::Message("BnetNoData")),
            method(6, "Dissolve", None, RespSpec::Message("BnetNoData")),
            method(7, "SubscribeMember", None, RespSpec::Message("BnetNoData")),
            method(8, "UnsubscribeMember", None, RespSpec::Message("BnetNoData")),
        ],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeRef;

    #[test]
    fn full_table_builds() {
        let registry = registry();
        assert!(registry.len() > 80);
        for name in [
            "PowerHistory",
            "AuroraHandshake",
            "BnetPacketHeader",
            "BnetConnectRequest",
            "BnetConnectResponse",
        ] {
            assert!(registry.lookup(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn header_field_numbers() {
        let registry = registry();
        let header = registry.get(registry.lookup("BnetPacketHeader").unwrap());
        let numbers: Vec<u32> = header.fields().iter().map(|f| f.number).collect();
        assert_eq!(numbers, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(header.fields()[6].repeated);
    }

    #[test]
    fn nested_references_resolve() {
        let registry = registry();
        let handshake = registry.get(registry.lookup("AuroraHandshake").unwrap());
        let platform = registry.lookup("Platform").unwrap();
        assert_eq!(handshake.fields()[6].ty, TypeRef::Message(platform));
    }

    #[test]
    fn all_services_resolve() {
        let services = services();
        assert_eq!(services.iter().count(), 11);

        let connection = services.get_by_name(CONNECTION_SERVICE).unwrap();
        let connect = connection.method_by_name("Connect").unwrap();
        assert_eq!(connect.id, 1);
        assert!(connect.resp.expects_response());
        assert!(!connection.method(5).unwrap().resp.expects_response());
    }
}
