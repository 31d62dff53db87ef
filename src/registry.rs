//! Self-describing message type registry.
//!
//! Message types are declared as compact field tables and registered in
//! one batch at startup. Nested types are referenced by name and
//! resolved in a second pass, so tables may forward-reference (and even
//! mutually reference) each other. Resolved types live in a flat vector
//! owned by the registry and point at each other through [`TypeId`]
//! indices, which keeps the type graph free of owning cycles.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use crate::encoding::WireType;

/// Index of a resolved [`MessageType`] within its [`Registry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

/// Bit width of an integer or floating point field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Width {
    W32,
    W64,
}

/// A resolved field type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeRef {
    Varint { width: Width, signed: bool },
    Fixed { width: Width, signed: bool, float: bool },
    Bytes,
    Str,
    Message(TypeId),
}

impl TypeRef {
    /// The wire type a single (non-packed) value of this type uses.
    pub fn wire_type(&self) -> WireType {
        match self {
            TypeRef::Varint { .. } => WireType::Varint,
            TypeRef::Fixed {
                width: Width::W32, ..
            } => WireType::ThirtyTwoBit,
            TypeRef::Fixed {
                width: Width::W64, ..
            } => WireType::SixtyFourBit,
            TypeRef::Bytes | TypeRef::Str | TypeRef::Message(_) => WireType::LengthDelimited,
        }
    }

    /// Whether packed length-delimited encoding applies to repeated
    /// fields of this type.
    pub fn packable(&self) -> bool {
        matches!(self, TypeRef::Varint { .. } | TypeRef::Fixed { .. })
    }
}

/// A resolved field definition.
#[derive(Clone, Debug)]
pub struct FieldDef {
    pub number: u32,
    pub name: &'static str,
    pub ty: TypeRef,
    pub repeated: bool,
}

/// A resolved message type: an ordered field table with lookup by field
/// number and by name.
#[derive(Debug)]
pub struct MessageType {
    name: &'static str,
    fields: Vec<FieldDef>,
    by_number: HashMap<u32, usize>,
    by_name: HashMap<&'static str, usize>,
}

impl MessageType {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field_index(&self, number: u32) -> Option<usize> {
        self.by_number.get(&number).copied()
    }

    pub fn field_index_by_name(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }
}

/// An immutable set of resolved message types.
#[derive(Debug)]
pub struct Registry {
    types: Vec<MessageType>,
    by_name: HashMap<&'static str, TypeId>,
}

impl Registry {
    pub fn get(&self, id: TypeId) -> &MessageType {
        &self.types[id.0 as usize]
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Field type as written in a declarative table. Nested messages are
/// named; names resolve when the batch is built.
#[derive(Clone, Copy, Debug)]
pub enum FieldType {
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    Enum,
    Fixed32,
    Fixed64,
    Float,
    Bytes,
    Str,
    Message(&'static str),
}

/// One row of a declarative field table.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub number: u32,
    pub name: &'static str,
    pub ty: FieldType,
    pub repeated: bool,
}

/// A singular field row.
pub const fn field(number: u32, name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        number,
        name,
        ty,
        repeated: false,
    }
}

/// A repeated field row.
pub const fn repeated(number: u32, name: &'static str, ty: FieldType) -> FieldSpec {
    FieldSpec {
        number,
        name,
        ty,
        repeated: true,
    }
}

/// An error raised while building a registration batch: a duplicate
/// type name, a duplicate field number, or an unresolved type reference.
#[derive(Debug, PartialEq, Eq)]
pub struct RegistryError {
    message: String,
}

impl RegistryError {
    fn new(message: String) -> RegistryError {
        RegistryError { message }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid type registration: {}", self.message)
    }
}

impl Error for RegistryError {}

/// Collects declarative tables and resolves them into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    batch: Vec<(&'static str, Vec<FieldSpec>)>,
}

impl RegistryBuilder {
    pub fn new() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Declares a message type. Fields may reference any type name in
    /// the same batch, including ones declared later.
    pub fn message(&mut self, name: &'static str, fields: &[FieldSpec]) -> &mut Self {
        self.batch.push((name, fields.to_vec()));
        self
    }

    /// Resolves the batch. Pass one allocates a [`TypeId`] per declared
    /// name; pass two resolves field tables against the full name map.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut by_name = HashMap::with_capacity(self.batch.len());
        for (index, (name, _)) in self.batch.iter().enumerate() {
            if by_name.insert(*name, TypeId(index as u32)).is_some() {
                return Err(RegistryError::new(format!("duplicate type name {name:?}")));
            }
        }

        let mut types = Vec::with_capacity(self.batch.len());
        for (name, specs) in &self.batch {
            let mut fields = Vec::with_capacity(specs.len());
            let mut field_by_number = HashMap::with_capacity(specs.len());
            let mut field_by_name = HashMap::with_capacity(specs.len());
            for spec in specs {
                let ty = resolve(spec.ty, &by_name).ok_or_else(|| {
                    RegistryError::new(format!(
                        "field {}.{} references unknown type",
                        name, spec.name
                    ))
                })?;
                let index = fields.len();
                if field_by_number.insert(spec.number, index).is_some() {
                    return Err(RegistryError::new(format!(
                        "duplicate field number {} in {}",
                        spec.number, name
                    )));
                }
                field_by_name.insert(spec.name, index);
                fields.push(FieldDef {
                    number: spec.number,
                    name: spec.name,
                    ty,
                    repeated: spec.repeated,
                });
            }
            types.push(MessageType {
                name,
                fields,
                by_number: field_by_number,
                by_name: field_by_name,
            });
        }

        Ok(Registry { types, by_name })
    }
}

fn resolve(ty: FieldType, by_name: &HashMap<&'static str, TypeId>) -> Option<TypeRef> {
    Some(match ty {
        FieldType::Int32 => TypeRef::Varint {
            width: Width::W32,
            signed: true,
        },
        FieldType::Int64 | FieldType::Enum => TypeRef::Varint {
            width: Width::W64,
            signed: true,
        },
        FieldType::Uint32 => TypeRef::Varint {
            width: Width::W32,
            signed: false,
        },
        FieldType::Uint64 => TypeRef::Varint {
            width: Width::W64,
            signed: false,
        },
        // The wire treats bools as plain 32-bit varints.
        FieldType::Bool => TypeRef::Varint {
            width: Width::W32,
            signed: true,
        },
        FieldType::Fixed32 => TypeRef::Fixed {
            width: Width::W32,
            signed: false,
            float: false,
        },
        FieldType::Fixed64 => TypeRef::Fixed {
            width: Width::W64,
            signed: false,
            float: false,
        },
        FieldType::Float => TypeRef::Fixed {
            width: Width::W32,
            signed: true,
            float: true,
        },
        FieldType::Bytes => TypeRef::Bytes,
        FieldType::Str => TypeRef::Str,
        FieldType::Message(name) => TypeRef::Message(*by_name.get(name)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_references_resolve() {
        let mut builder = RegistryBuilder::new();
        builder.message("Outer", &[field(1, "Inner", FieldType::Message("Inner"))]);
        builder.message(
            "Inner",
            &[field(1, "Value", FieldType::Int32), repeated(2, "More", FieldType::Uint64)],
        );
        let registry = builder.build().unwrap();

        let outer = registry.get(registry.lookup("Outer").unwrap());
        let inner_id = registry.lookup("Inner").unwrap();
        assert_eq!(outer.fields()[0].ty, TypeRef::Message(inner_id));
        assert!(registry.get(inner_id).fields()[1].repeated);
    }

    #[test]
    fn mutual_references_resolve() {
        let mut builder = RegistryBuilder::new();
        builder.message("A", &[field(1, "B", FieldType::Message("B"))]);
        builder.message("B", &[field(1, "A", FieldType::Message("A"))]);
        builder.build().unwrap();
    }

    #[test]
    fn unknown_reference_fails() {
        let mut builder = RegistryBuilder::new();
        builder.message("Lonely", &[field(1, "Ghost", FieldType::Message("Ghost"))]);
        builder.build().unwrap_err();
    }

    #[test]
    fn duplicate_field_number_fails() {
        let mut builder = RegistryBuilder::new();
        builder.message(
            "Clash",
            &[field(1, "A", FieldType::Int32), field(1, "B", FieldType::Int32)],
        );
        builder.build().unwrap_err();
    }

    #[test]
    fn duplicate_type_name_fails() {
        let mut builder = RegistryBuilder::new();
        builder.message("Twice", &[]);
        builder.message("Twice", &[]);
        builder.build().unwrap_err();
    }

    #[test]
    fn wire_types() {
        assert_eq!(
            TypeRef::Varint {
                width: Width::W64,
                signed: false
            }
            .wire_type(),
            WireType::Varint
        );
        assert_eq!(
            TypeRef::Fixed {
                width: Width::W32,
                signed: false,
                float: false
            }
            .wire_type(),
            WireType::ThirtyTwoBit
        );
        assert_eq!(TypeRef::Bytes.wire_type(), WireType::LengthDelimited);
    }
}
