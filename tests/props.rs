//! Property tests: codec round-trips and splitter chunking invariance.

use proptest::prelude::*;

use aurora::encoding::{decode_varint, decode_varint_signed, encode_varint};
use aurora::packet::{encode_packet, Packet, PacketType};
use aurora::rpc::RpcHeader;
use aurora::schema;
use aurora::split::{AuroraSplitter, RpcSplitter};
use aurora::value::{MessageValue, Value};

fn entity_choice(
    id: i32,
    choice_type: i32,
    cancelable: bool,
    counts: (i32, i32),
    entities: &[i32],
    source: Option<i32>,
) -> MessageValue {
    let registry = schema::registry();
    let mut message = MessageValue::new(registry, registry.lookup("EntityChoice").unwrap());
    message.set(registry, "Id", Value::Int(i64::from(id)));
    message.set(registry, "ChoiceType", Value::Int(i64::from(choice_type)));
    message.set(registry, "Cancelable", Value::Int(i64::from(cancelable)));
    message.set(registry, "CountMin", Value::Int(i64::from(counts.0)));
    message.set(registry, "CountMax", Value::Int(i64::from(counts.1)));
    for entity in entities {
        message.push(registry, "Entities", Value::Int(i64::from(*entity)));
    }
    if let Some(source) = source {
        message.set(registry, "SourceField", Value::Int(i64::from(source)));
    }
    message
}

/// Feeds `stream` to an Aurora splitter in the given chunk sizes and
/// collects every emitted frame.
fn split_chunked(stream: &[u8], chunks: &[usize]) -> Vec<(u32, Vec<u8>)> {
    let mut splitter = AuroraSplitter::new();
    let mut frames = Vec::new();
    let mut offset = 0;
    let mut cuts = chunks.iter().copied().filter(|&c| c > 0).cycle();
    while offset < stream.len() {
        let take = cuts.next().unwrap_or(stream.len()).min(stream.len() - offset);
        splitter.feed(&stream[offset..offset + take]).unwrap();
        offset += take;
        while let Some(frame) = splitter.pull_segment() {
            frames.push(frame);
        }
    }
    frames
}

proptest! {
    #[test]
    fn varint_roundtrip(value: u64) {
        let mut buf = Vec::new();
        encode_varint(value, &mut buf);
        prop_assert!(buf.len() <= 10);

        let mut bytes = &buf[..];
        prop_assert_eq!(decode_varint(&mut bytes).unwrap(), value);
        prop_assert!(bytes.is_empty());
    }

    #[test]
    fn signed_varint_roundtrip(value: i64) {
        let mut buf = Vec::new();
        encode_varint(value as u64, &mut buf);
        if value < 0 {
            // Negative values widen to the full ten bytes.
            prop_assert_eq!(buf.len(), 10);
        }

        let mut bytes = &buf[..];
        prop_assert_eq!(decode_varint_signed(&mut bytes).unwrap(), value);
    }

    #[test]
    fn entity_choice_roundtrip(
        id: i32,
        choice_type: i32,
        cancelable: bool,
        counts: (i32, i32),
        entities in proptest::collection::vec(any::<i32>(), 0..8),
        source in proptest::option::of(any::<i32>()),
    ) {
        let registry = schema::registry();
        let message = entity_choice(id, choice_type, cancelable, counts, &entities, source);

        let encoded = message.encode_to_vec(registry);
        prop_assert_eq!(encoded.len(), message.encoded_len(registry));

        let decoded = MessageValue::decode(
            registry,
            registry.lookup("EntityChoice").unwrap(),
            &encoded[..],
        )
        .unwrap();
        prop_assert_eq!(decoded, message);
    }

    #[test]
    fn string_field_roundtrip(text: String) {
        let registry = schema::registry();
        let mut message =
            MessageValue::new(registry, registry.lookup("DebugMessage").unwrap());
        message.set(registry, "Message", Value::Str(text.clone()));

        let encoded = message.encode_to_vec(registry);
        let decoded = MessageValue::decode(
            registry,
            registry.lookup("DebugMessage").unwrap(),
            &encoded[..],
        )
        .unwrap();
        prop_assert_eq!(decoded.get_str(registry, "Message"), Some(text.as_str()));
    }

    #[test]
    fn aurora_chunking_is_invisible(
        chunks in proptest::collection::vec(1usize..48, 1..24),
        entities in proptest::collection::vec(any::<i32>(), 0..6),
    ) {
        let registry = schema::registry();
        let mut stream = Vec::new();
        let packet = Packet::new(
            PacketType::EntityChoice,
            entity_choice(1, 2, true, (0, 3), &entities, None),
        );
        stream.extend_from_slice(&encode_packet(registry, &packet));
        let ping = Packet::new(
            PacketType::Ping,
            MessageValue::new(registry, registry.lookup("Ping").unwrap()),
        );
        stream.extend_from_slice(&encode_packet(registry, &ping));

        let whole = split_chunked(&stream, &[stream.len()]);
        let chunked = split_chunked(&stream, &chunks);
        prop_assert_eq!(whole, chunked);
    }

    #[test]
    fn rpc_chunking_is_invisible(split_at in 1usize..40) {
        let body = [7u8; 5];
        let mut stream = RpcHeader::request(2, 1, 3)
            .with_size(body.len() as u32)
            .encode_frame(&body);
        stream.extend_from_slice(&RpcHeader::response(3).with_size(0).encode_frame(&[]));

        let mut whole = RpcSplitter::new();
        whole.feed(&stream).unwrap();
        let mut expected = Vec::new();
        while let Some(frame) = whole.pull_segment().unwrap() {
            expected.push(frame);
        }

        let cut = split_at.min(stream.len() - 1);
        let mut splitter = RpcSplitter::new();
        let mut actual = Vec::new();
        for part in [&stream[..cut], &stream[cut..]] {
            splitter.feed(part).unwrap();
            while let Some(frame) = splitter.pull_segment().unwrap() {
                actual.push(frame);
            }
        }
        prop_assert_eq!(expected, actual);
    }
}
