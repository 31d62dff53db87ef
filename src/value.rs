//! Dynamic message values decoded from and encoded to the wire.
//!
//! A [`MessageValue`] carries one slot per declared field of its
//! [`MessageType`](crate::registry::MessageType), in declaration order.
//! Repeated slots start as the empty sequence, singular slots as absent.
//! Encoding is two-pass: `encoded_len` measures, `encode_raw` writes,
//! so length prefixes never need a memmove.

use bytes::{Buf, BufMut};

use crate::encoding::{
    check_wire_type, decode_key, decode_varint, encode_key, encode_varint, encoded_len_varint,
    key_len, WireType,
};
use crate::error::{DecodeError, DecodeErrorKind, EncodeError};
use crate::registry::{FieldDef, Registry, TypeId, TypeRef, Width};

/// A single decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i64),
    Uint(u64),
    Float(f32),
    Double(f64),
    Bytes(Vec<u8>),
    Str(String),
    Message(MessageValue),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Uint(v) => Some(*v),
            Value::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_u64().and_then(|v| u32::try_from(v).ok())
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_i64().and_then(|v| i32::try_from(v).ok())
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&MessageValue> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }
}

/// Presence state of one declared field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldSlot {
    Absent,
    Single(Value),
    Repeated(Vec<Value>),
}

/// A decoded message: one slot per declared field.
#[derive(Clone, Debug, PartialEq)]
pub struct MessageValue {
    type_id: TypeId,
    slots: Vec<FieldSlot>,
}

impl MessageValue {
    /// Creates an empty value of the given type: repeated fields hold
    /// the empty sequence, singular fields are absent.
    pub fn new(registry: &Registry, type_id: TypeId) -> MessageValue {
        let ty = registry.get(type_id);
        let slots = ty
            .fields()
            .iter()
            .map(|f| {
                if f.repeated {
                    FieldSlot::Repeated(Vec::new())
                } else {
                    FieldSlot::Absent
                }
            })
            .collect();
        MessageValue { type_id, slots }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn type_name(&self, registry: &Registry) -> &'static str {
        registry.get(self.type_id).name()
    }

    fn slot_index(&self, registry: &Registry, name: &str) -> usize {
        let ty = registry.get(self.type_id);
        match ty.field_index_by_name(name) {
            Some(index) => index,
            None => panic!("message type {} has no field {:?}", ty.name(), name),
        }
    }

    /// Returns the value of a singular field, or `None` when absent.
    ///
    /// # Panics
    ///
    /// Panics if the type declares no field with this name.
    pub fn get<'a>(&'a self, registry: &Registry, name: &str) -> Option<&'a Value> {
        match &self.slots[self.slot_index(registry, name)] {
            FieldSlot::Single(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the elements of a repeated field.
    ///
    /// # Panics
    ///
    /// Panics if the type declares no field with this name.
    pub fn get_repeated<'a>(&'a self, registry: &Registry, name: &str) -> &'a [Value] {
        match &self.slots[self.slot_index(registry, name)] {
            FieldSlot::Repeated(values) => values,
            _ => &[],
        }
    }

    /// Sets a singular field, replacing any existing value.
    ///
    /// # Panics
    ///
    /// Panics if the type declares no field with this name.
    pub fn set(&mut self, registry: &Registry, name: &str, value: Value) -> &mut Self {
        let index = self.slot_index(registry, name);
        self.slots[index] = FieldSlot::Single(value);
        self
    }

    /// Appends an element to a repeated field.
    ///
    /// # Panics
    ///
    /// Panics if the type declares no field with this name, or if the
    /// field is not repeated.
    pub fn push(&mut self, registry: &Registry, name: &str, value: Value) -> &mut Self {
        let index = self.slot_index(registry, name);
        match &mut self.slots[index] {
            FieldSlot::Repeated(values) => values.push(value),
            _ => panic!("field {:?} is not repeated", name),
        }
        self
    }

    pub fn get_u32(&self, registry: &Registry, name: &str) -> Option<u32> {
        self.get(registry, name).and_then(Value::as_u32)
    }

    pub fn get_u64(&self, registry: &Registry, name: &str) -> Option<u64> {
        self.get(registry, name).and_then(Value::as_u64)
    }

    pub fn get_i64(&self, registry: &Registry, name: &str) -> Option<i64> {
        self.get(registry, name).and_then(Value::as_i64)
    }

    pub fn get_str<'a>(&'a self, registry: &Registry, name: &str) -> Option<&'a str> {
        self.get(registry, name).and_then(Value::as_str)
    }

    pub fn get_bytes<'a>(&'a self, registry: &Registry, name: &str) -> Option<&'a [u8]> {
        self.get(registry, name).and_then(Value::as_bytes)
    }

    pub fn get_message<'a>(&'a self, registry: &Registry, name: &str) -> Option<&'a MessageValue> {
        self.get(registry, name).and_then(Value::as_message)
    }

    /// Decodes a value of `type_id`, consuming the entire buffer.
    pub fn decode(
        registry: &Registry,
        type_id: TypeId,
        mut buf: impl Buf,
    ) -> Result<MessageValue, DecodeError> {
        merge(registry, type_id, &mut buf, 0)
    }

    /// Returns the encoded length of the value without any framing.
    pub fn encoded_len(&self, registry: &Registry) -> usize {
        let ty = registry.get(self.type_id);
        ty.fields()
            .iter()
            .zip(&self.slots)
            .map(|(field, slot)| field_encoded_len(registry, field, slot))
            .sum()
    }

    /// Encodes the value to the buffer.
    ///
    /// This method will panic if the buffer has insufficient capacity.
    pub fn encode_raw(&self, registry: &Registry, buf: &mut impl BufMut) {
        let ty = registry.get(self.type_id);
        for (field, slot) in ty.fields().iter().zip(&self.slots) {
            encode_field(registry, field, slot, buf);
        }
    }

    /// Encodes the value to the buffer, checking capacity first.
    pub fn encode(&self, registry: &Registry, buf: &mut impl BufMut) -> Result<(), EncodeError> {
        let required = self.encoded_len(registry);
        let remaining = buf.remaining_mut();
        if required > remaining {
            return Err(EncodeError::new(required, remaining));
        }
        self.encode_raw(registry, buf);
        Ok(())
    }

    /// Encodes the value to a newly allocated buffer.
    pub fn encode_to_vec(&self, registry: &Registry) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len(registry));
        self.encode_raw(registry, &mut buf);
        buf
    }
}

/// Decodes fields until `buf.remaining()` drops to `limit`.
fn merge<B: Buf>(
    registry: &Registry,
    type_id: TypeId,
    buf: &mut B,
    limit: usize,
) -> Result<MessageValue, DecodeError> {
    let ty = registry.get(type_id);
    let mut message = MessageValue::new(registry, type_id);

    while buf.remaining() > limit {
        let (number, wire_type) = decode_key(buf).map_err(|e| e.push_context(ty.name(), "?"))?;
        if buf.remaining() < limit {
            return Err(DecodeError::malformed("field key overran message boundary")
                .push_context(ty.name(), "?"));
        }
        let index = ty.field_index(number).ok_or_else(|| {
            DecodeError::new(DecodeErrorKind::UnknownField(number)).push_context(ty.name(), "?")
        })?;
        let field = &ty.fields()[index];
        let in_message = buf.remaining() - limit;

        let decoded = decode_field(registry, field, wire_type, buf, in_message)
            .map_err(|e| e.push_context(ty.name(), field.name))?;

        if buf.remaining() < limit {
            return Err(
                DecodeError::malformed("field overran message boundary")
                    .push_context(ty.name(), field.name),
            );
        }

        let slot = &mut message.slots[index];
        match decoded {
            Decoded::Single(value) => {
                if field.repeated {
                    match slot {
                        FieldSlot::Repeated(values) => values.push(value),
                        _ => unreachable!("repeated slots are pre-initialized"),
                    }
                } else {
                    match slot {
                        FieldSlot::Absent => *slot = FieldSlot::Single(value),
                        _ => {
                            return Err(DecodeError::new(DecodeErrorKind::Duplicated(number))
                                .push_context(ty.name(), field.name))
                        }
                    }
                }
            }
            Decoded::Packed(values) => match slot {
                FieldSlot::Repeated(existing) => existing.extend(values),
                _ => {
                    return Err(DecodeError::malformed("packed data for singular field")
                        .push_context(ty.name(), field.name))
                }
            },
        }
    }

    Ok(message)
}

enum Decoded {
    Single(Value),
    Packed(Vec<Value>),
}

/// Decodes one occurrence of `field`, dispatching on the declared type.
/// `available` bounds the bytes this occurrence may consume: the bytes
/// left in the enclosing message.
fn decode_field<B: Buf>(
    registry: &Registry,
    field: &FieldDef,
    wire_type: WireType,
    buf: &mut B,
    available: usize,
) -> Result<Decoded, DecodeError> {
    match field.ty {
        TypeRef::Varint { signed, .. } => {
            if field.repeated && wire_type == WireType::LengthDelimited {
                let len = decode_block_len(buf, available)?;
                return decode_packed_varints(buf, len, signed);
            }
            check_wire_type(WireType::Varint, wire_type)?;
            let raw = decode_varint(buf)?;
            Ok(Decoded::Single(varint_value(raw, signed)))
        }
        TypeRef::Fixed {
            width,
            signed,
            float,
        } => {
            if field.repeated && wire_type == WireType::LengthDelimited {
                let len = decode_block_len(buf, available)?;
                return decode_packed_fixed(buf, len, width, signed, float);
            }
            check_wire_type(field.ty.wire_type(), wire_type)?;
            let size = fixed_size(width);
            if buf.remaining() < size {
                return Err(DecodeError::malformed("truncated fixed-width value"));
            }
            Ok(Decoded::Single(fixed_value(buf, width, signed, float)))
        }
        TypeRef::Bytes => {
            check_wire_type(WireType::LengthDelimited, wire_type)?;
            let len = decode_block_len(buf, available)?;
            let mut data = vec![0u8; len];
            buf.copy_to_slice(&mut data);
            Ok(Decoded::Single(Value::Bytes(data)))
        }
        TypeRef::Str => {
            check_wire_type(WireType::LengthDelimited, wire_type)?;
            let len = decode_block_len(buf, available)?;
            let mut data = vec![0u8; len];
            buf.copy_to_slice(&mut data);
            let text = String::from_utf8(data)
                .map_err(|_| DecodeError::new(DecodeErrorKind::BadEncoding))?;
            Ok(Decoded::Single(Value::Str(text)))
        }
        TypeRef::Message(sub_type) => {
            check_wire_type(WireType::LengthDelimited, wire_type)?;
            let len = decode_block_len(buf, available)?;
            let inner_limit = buf.remaining() - len;
            let inner = merge(registry, sub_type, buf, inner_limit)?;
            Ok(Decoded::Single(Value::Message(inner)))
        }
    }
}

/// Reads a length prefix and bounds-checks it against the enclosing
/// message.
fn decode_block_len<B: Buf>(buf: &mut B, available: usize) -> Result<usize, DecodeError> {
    let before = buf.remaining();
    let len = decode_varint(buf)?;
    let prefix = before - buf.remaining();
    if len > (available.saturating_sub(prefix)) as u64 {
        return Err(DecodeError::malformed("length prefix exceeds message"));
    }
    Ok(len as usize)
}

fn decode_packed_varints<B: Buf>(
    buf: &mut B,
    len: usize,
    signed: bool,
) -> Result<Decoded, DecodeError> {
    let end = buf.remaining() - len;
    let mut values = Vec::new();
    while buf.remaining() > end {
        let raw = decode_varint(buf)?;
        if buf.remaining() < end {
            return Err(DecodeError::new(DecodeErrorKind::Misaligned));
        }
        values.push(varint_value(raw, signed));
    }
    Ok(Decoded::Packed(values))
}

fn decode_packed_fixed<B: Buf>(
    buf: &mut B,
    len: usize,
    width: Width,
    signed: bool,
    float: bool,
) -> Result<Decoded, DecodeError> {
    let size = fixed_size(width);
    if len % size != 0 {
        return Err(DecodeError::new(DecodeErrorKind::Misaligned));
    }
    let mut values = Vec::with_capacity(len / size);
    for _ in 0..len / size {
        values.push(fixed_value(buf, width, signed, float));
    }
    Ok(Decoded::Packed(values))
}

fn varint_value(raw: u64, signed: bool) -> Value {
    if signed {
        // Bit 63 set means the value was a negative two's-complement
        // integer widened to 64 bits.
        Value::Int(raw as i64)
    } else {
        Value::Uint(raw)
    }
}

fn fixed_size(width: Width) -> usize {
    match width {
        Width::W32 => 4,
        Width::W64 => 8,
    }
}

fn fixed_value<B: Buf>(buf: &mut B, width: Width, signed: bool, float: bool) -> Value {
    match (width, float, signed) {
        (Width::W32, true, _) => Value::Float(buf.get_f32_le()),
        (Width::W64, true, _) => Value::Double(buf.get_f64_le()),
        (Width::W32, false, true) => Value::Int(i64::from(buf.get_i32_le())),
        (Width::W32, false, false) => Value::Uint(u64::from(buf.get_u32_le())),
        (Width::W64, false, true) => Value::Int(buf.get_i64_le()),
        (Width::W64, false, false) => Value::Uint(buf.get_u64_le()),
    }
}

fn scalar_to_u64(value: &Value) -> u64 {
    match value {
        Value::Int(v) => *v as u64,
        Value::Uint(v) => *v,
        other => panic!("varint field holds non-integer value {other:?}"),
    }
}

fn field_encoded_len(registry: &Registry, field: &FieldDef, slot: &FieldSlot) -> usize {
    match slot {
        FieldSlot::Absent => 0,
        FieldSlot::Single(value) => single_encoded_len(registry, field, value),
        FieldSlot::Repeated(values) if values.is_empty() => 0,
        FieldSlot::Repeated(values) => {
            if field.ty.packable() {
                let payload = packed_payload_len(field, values);
                key_len(field.number) + encoded_len_varint(payload as u64) + payload
            } else {
                values
                    .iter()
                    .map(|value| single_encoded_len(registry, field, value))
                    .sum()
            }
        }
    }
}

fn single_encoded_len(registry: &Registry, field: &FieldDef, value: &Value) -> usize {
    let key = key_len(field.number);
    match field.ty {
        TypeRef::Varint { .. } => key + encoded_len_varint(scalar_to_u64(value)),
        TypeRef::Fixed { width, .. } => key + fixed_size(width),
        TypeRef::Bytes => {
            let len = value.as_bytes().map_or(0, <[u8]>::len);
            key + encoded_len_varint(len as u64) + len
        }
        TypeRef::Str => {
            let len = value.as_str().map_or(0, str::len);
            key + encoded_len_varint(len as u64) + len
        }
        TypeRef::Message(_) => match value {
            Value::Message(inner) => {
                let len = inner.encoded_len(registry);
                key + encoded_len_varint(len as u64) + len
            }
            other => panic!("message field holds non-message value {other:?}"),
        },
    }
}

fn packed_payload_len(field: &FieldDef, values: &[Value]) -> usize {
    match field.ty {
        TypeRef::Varint { .. } => values
            .iter()
            .map(|value| encoded_len_varint(scalar_to_u64(value)))
            .sum(),
        TypeRef::Fixed { width, .. } => values.len() * fixed_size(width),
        _ => unreachable!("only scalar fields pack"),
    }
}

fn encode_field(
    registry: &Registry,
    field: &FieldDef,
    slot: &FieldSlot,
    buf: &mut impl BufMut,
) {
    match slot {
        FieldSlot::Absent => {}
        FieldSlot::Single(value) => encode_single(registry, field, value, buf),
        FieldSlot::Repeated(values) if values.is_empty() => {}
        FieldSlot::Repeated(values) => {
            if field.ty.packable() {
                encode_key(field.number, WireType::LengthDelimited, buf);
                let payload = packed_payload_len(field, values);
                encode_varint(payload as u64, buf);
                for value in values {
                    encode_packed_element(field, value, buf);
                }
            } else {
                for value in values {
                    encode_single(registry, field, value, buf);
                }
            }
        }
    }
}

fn encode_single(registry: &Registry, field: &FieldDef, value: &Value, buf: &mut impl BufMut) {
    match field.ty {
        TypeRef::Varint { .. } => {
            encode_key(field.number, WireType::Varint, buf);
            encode_varint(scalar_to_u64(value), buf);
        }
        TypeRef::Fixed { .. } => {
            encode_key(field.number, field.ty.wire_type(), buf);
            encode_packed_element(field, value, buf);
        }
        TypeRef::Bytes => {
            let data = value.as_bytes().unwrap_or(&[]);
            encode_key(field.number, WireType::LengthDelimited, buf);
            encode_varint(data.len() as u64, buf);
            buf.put_slice(data);
        }
        TypeRef::Str => {
            let text = value.as_str().unwrap_or("");
            encode_key(field.number, WireType::LengthDelimited, buf);
            encode_varint(text.len() as u64, buf);
            buf.put_slice(text.as_bytes());
        }
        TypeRef::Message(_) => match value {
            Value::Message(inner) => {
                encode_key(field.number, WireType::LengthDelimited, buf);
                encode_varint(inner.encoded_len(registry) as u64, buf);
                inner.encode_raw(registry, buf);
            }
            other => panic!("message field holds non-message value {other:?}"),
        },
    }
}

/// Writes one element of a fixed or varint field without its key.
fn encode_packed_element(field: &FieldDef, value: &Value, buf: &mut impl BufMut) {
    match field.ty {
        TypeRef::Varint { .. } => encode_varint(scalar_to_u64(value), buf),
        TypeRef::Fixed {
            width,
            signed,
            float,
        } => match (width, float, signed) {
            (Width::W32, true, _) => buf.put_f32_le(value.as_f32().unwrap_or(0.0)),
            (Width::W64, true, _) => buf.put_f64_le(match value {
                Value::Double(v) => *v,
                _ => 0.0,
            }),
            (Width::W32, false, true) => buf.put_i32_le(value.as_i32().unwrap_or(0)),
            (Width::W32, false, false) => buf.put_u32_le(value.as_u32().unwrap_or(0)),
            (Width::W64, false, true) => buf.put_i64_le(value.as_i64().unwrap_or(0)),
            (Width::W64, false, false) => buf.put_u64_le(value.as_u64().unwrap_or(0)),
        },
        _ => unreachable!("only scalar fields pack"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{field, repeated, FieldType, RegistryBuilder};

    fn test_registry() -> Registry {
        let mut builder = RegistryBuilder::new();
        builder.message(
            "Tag",
            &[field(1, "Name", FieldType::Int32), field(2, "Value", FieldType::Int32)],
        );
        builder.message(
            "Entity",
            &[
                field(1, "Id", FieldType::Int32),
                repeated(2, "Tags", FieldType::Message("Tag")),
            ],
        );
        builder.message(
            "Mixed",
            &[
                field(1, "Count", FieldType::Uint32),
                repeated(2, "Values", FieldType::Int32),
                field(3, "Label", FieldType::Str),
                field(4, "Blob", FieldType::Bytes),
                field(5, "Hash", FieldType::Fixed32),
                repeated(6, "Stamps", FieldType::Fixed64),
                field(7, "Ratio", FieldType::Float),
            ],
        );
        builder.build().unwrap()
    }

    fn tag(registry: &Registry, name: i64, value: i64) -> Value {
        let mut m = MessageValue::new(registry, registry.lookup("Tag").unwrap());
        m.set(registry, "Name", Value::Int(name));
        m.set(registry, "Value", Value::Int(value));
        Value::Message(m)
    }

    #[test]
    fn roundtrip_nested_repeated() {
        let registry = test_registry();
        let entity_id = registry.lookup("Entity").unwrap();
        let mut entity = MessageValue::new(&registry, entity_id);
        entity.set(&registry, "Id", Value::Int(4));
        entity.push(&registry, "Tags", tag(&registry, 49, 1));
        entity.push(&registry, "Tags", tag(&registry, 50, 2));

        let encoded = entity.encode_to_vec(&registry);
        assert_eq!(encoded.len(), entity.encoded_len(&registry));

        let decoded = MessageValue::decode(&registry, entity_id, &encoded[..]).unwrap();
        assert_eq!(decoded, entity);
    }

    #[test]
    fn roundtrip_scalars() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let mut mixed = MessageValue::new(&registry, mixed_id);
        mixed.set(&registry, "Count", Value::Uint(7));
        mixed.push(&registry, "Values", Value::Int(-1));
        mixed.push(&registry, "Values", Value::Int(300));
        mixed.set(&registry, "Label", Value::Str("option".to_owned()));
        mixed.set(&registry, "Blob", Value::Bytes(vec![0, 1, 2]));
        mixed.set(&registry, "Hash", Value::Uint(0xDEADBEEF));
        mixed.push(&registry, "Stamps", Value::Uint(1));
        mixed.push(&registry, "Stamps", Value::Uint(u64::MAX));
        mixed.set(&registry, "Ratio", Value::Float(0.5));

        let encoded = mixed.encode_to_vec(&registry);
        let decoded = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap();
        assert_eq!(decoded, mixed);
    }

    #[test]
    fn repeated_integers_encode_packed() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let mut mixed = MessageValue::new(&registry, mixed_id);
        mixed.push(&registry, "Values", Value::Int(1));
        mixed.push(&registry, "Values", Value::Int(2));
        mixed.push(&registry, "Values", Value::Int(3));

        // One key, one length, three one-byte varints.
        let encoded = mixed.encode_to_vec(&registry);
        assert_eq!(encoded, [2 << 3 | 2, 3, 1, 2, 3]);
    }

    #[test]
    fn unpacked_repeated_integers_decode() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        // Two occurrences of field 2 as plain varints.
        let encoded = [2 << 3, 1, 2 << 3, 2];
        let decoded = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap();
        assert_eq!(
            decoded.get_repeated(&registry, "Values"),
            [Value::Int(1), Value::Int(2)]
        );
    }

    #[test]
    fn absent_fields_skipped() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let mixed = MessageValue::new(&registry, mixed_id);
        assert_eq!(mixed.encoded_len(&registry), 0);
        assert!(mixed.encode_to_vec(&registry).is_empty());
    }

    #[test]
    fn duplicate_singular_field_rejected() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let encoded = [1 << 3, 1, 1 << 3, 2];
        let err = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::Duplicated(1));
    }

    #[test]
    fn unknown_field_rejected() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let encoded = [15 << 3, 1];
        let err = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::UnknownField(15));
    }

    #[test]
    fn invalid_utf8_rejected() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let encoded = [3 << 3 | 2, 2, 0xFF, 0xFE];
        let err = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::BadEncoding);
    }

    #[test]
    fn misaligned_packed_fixed_rejected() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        // Field 6 is fixed64; five bytes cannot hold a whole element.
        let encoded = [6 << 3 | 2, 5, 0, 0, 0, 0, 0];
        let err = MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap_err();
        assert_eq!(*err.kind(), DecodeErrorKind::Misaligned);
    }

    #[test]
    fn length_prefix_beyond_message_rejected() {
        let registry = test_registry();
        let mixed_id = registry.lookup("Mixed").unwrap();
        let encoded = [4 << 3 | 2, 200, 1];
        MessageValue::decode(&registry, mixed_id, &encoded[..]).unwrap_err();
    }

    #[test]
    fn negative_int_roundtrips_through_ten_bytes() {
        let registry = test_registry();
        let tag_id = registry.lookup("Tag").unwrap();
        let mut tag = MessageValue::new(&registry, tag_id);
        tag.set(&registry, "Value", Value::Int(-7));

        let encoded = tag.encode_to_vec(&registry);
        // One key byte plus a full-width varint.
        assert_eq!(encoded.len(), 11);
        let decoded = MessageValue::decode(&registry, tag_id, &encoded[..]).unwrap();
        assert_eq!(decoded.get_i64(&registry, "Value"), Some(-7));
    }
}
