//! Service and method descriptors.
//!
//! A service's stable identity across connections is the 32-bit FNV-1a
//! hash of its fully-qualified dotted name; its numeric identity on a
//! particular connection is negotiated by the bind handshake. Method
//! tables distinguish a fire-and-forget method (`NoResponse`) from one
//! whose body type is simply not known (`NotImplemented`).

use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;

use crate::registry::{Registry, TypeId};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// 32-bit FNV-1a (xor, then multiply) over a byte string.
pub fn fnv1a_32(data: &[u8]) -> u32 {
    let mut hash = FNV_OFFSET_BASIS;
    for &byte in data {
        hash ^= u32::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Request body of a declared method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodRequest {
    Type(TypeId),
    NotImplemented,
}

/// Response body of a declared method.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodResponse {
    Type(TypeId),
    /// The method is fire-and-forget; no response is ever sent.
    NoResponse,
    /// A response exists on the wire but its type is not known.
    NotImplemented,
}

impl MethodResponse {
    /// Whether a caller should expect a response frame for this method.
    pub fn expects_response(&self) -> bool {
        !matches!(self, MethodResponse::NoResponse)
    }
}

#[derive(Clone, Copy, Debug)]
pub struct MethodDescriptor {
    pub id: u32,
    pub name: &'static str,
    pub req: MethodRequest,
    pub resp: MethodResponse,
}

/// A named service with its method table.
#[derive(Debug)]
pub struct ServiceDescriptor {
    name: &'static str,
    hash: u32,
    methods: BTreeMap<u32, MethodDescriptor>,
    by_name: HashMap<&'static str, u32>,
}

impl ServiceDescriptor {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn hash(&self) -> u32 {
        self.hash
    }

    pub fn method(&self, id: u32) -> Option<&MethodDescriptor> {
        self.methods.get(&id)
    }

    pub fn method_by_name(&self, name: &str) -> Option<&MethodDescriptor> {
        self.by_name.get(name).and_then(|id| self.methods.get(id))
    }

    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> {
        self.methods.values()
    }
}

/// All services known to the process, indexed by name hash.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    by_hash: HashMap<u32, ServiceDescriptor>,
    by_name: HashMap<&'static str, u32>,
}

impl ServiceRegistry {
    pub fn get(&self, hash: u32) -> Option<&ServiceDescriptor> {
        self.by_hash.get(&hash)
    }

    pub fn get_by_name(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.by_name.get(name).and_then(|hash| self.by_hash.get(hash))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.by_hash.values()
    }
}

/// Request column of a declarative method row. `None` means the request
/// type is not implemented.
pub type ReqSpec = Option<&'static str>;

/// Response column of a declarative method row.
#[derive(Clone, Copy, Debug)]
pub enum RespSpec {
    Message(&'static str),
    NoResponse,
    NotImplemented,
}

/// One row of a declarative method table.
#[derive(Clone, Copy, Debug)]
pub struct MethodSpec {
    pub id: u32,
    pub name: &'static str,
    pub req: ReqSpec,
    pub resp: RespSpec,
}

pub const fn method(id: u32, name: &'static str, req: ReqSpec, resp: RespSpec) -> MethodSpec {
    MethodSpec {
        id,
        name,
        req,
        resp,
    }
}

/// An error raised while resolving service tables: a duplicate service
/// hash, a duplicate method id, or a body type missing from the message
/// registry.
#[derive(Debug, PartialEq, Eq)]
pub struct ServiceError {
    message: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid service definition: {}", self.message)
    }
}

impl Error for ServiceError {}

/// Collects declarative service tables and resolves body type names
/// against a message registry.
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    services: Vec<(&'static str, Vec<MethodSpec>)>,
}

impl ServiceRegistryBuilder {
    pub fn new() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    pub fn service(&mut self, name: &'static str, methods: &[MethodSpec]) -> &mut Self {
        self.services.push((name, methods.to_vec()));
        self
    }

    pub fn build(self, registry: &Registry) -> Result<ServiceRegistry, ServiceError> {
        let mut out = ServiceRegistry::default();
        for (name, specs) in self.services {
            let hash = fnv1a_32(name.as_bytes());
            let mut methods = BTreeMap::new();
            let mut by_name = HashMap::with_capacity(specs.len());
            for spec in specs {
                let req = match spec.req {
                    Some(type_name) => MethodRequest::Type(lookup(registry, name, type_name)?),
                    None => MethodRequest::NotImplemented,
                };
                let resp = match spec.resp {
                    RespSpec::Message(type_name) => {
                        MethodResponse::Type(lookup(registry, name, type_name)?)
                    }
                    RespSpec::NoResponse => MethodResponse::NoResponse,
                    RespSpec::NotImplemented => MethodResponse::NotImplemented,
                };
                let descriptor = MethodDescriptor {
                    id: spec.id,
                    name: spec.name,
                    req,
                    resp,
                };
                if methods.insert(spec.id, descriptor).is_some() {
                    return Err(ServiceError {
                        message: format!("duplicate method id {} in {}", spec.id, name),
                    });
                }
                by_name.insert(spec.name, spec.id);
            }
            let descriptor = ServiceDescriptor {
                name,
                hash,
                methods,
                by_name,
            };
            if out.by_hash.insert(hash, descriptor).is_some() {
                return Err(ServiceError {
                    message: format!("duplicate service hash for {name}"),
                });
            }
            out.by_name.insert(name, hash);
        }
        Ok(out)
    }
}

fn lookup(registry: &Registry, service: &str, type_name: &str) -> Result<TypeId, ServiceError> {
    registry.lookup(type_name).ok_or_else(|| ServiceError {
        message: format!("service {service} references unknown type {type_name}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryBuilder;

    #[test]
    fn fnv1a_reference_values() {
        // Standard FNV-1a test vectors.
        assert_eq!(fnv1a_32(b""), 0x811c9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn service_hash_is_over_the_dotted_name() {
        let name = "bnet.protocol.connection.ConnectionService";
        let hash = fnv1a_32(name.as_bytes());
        // xor-then-multiply order: hashing a different name must differ.
        assert_ne!(hash, fnv1a_32(b"bnet.protocol.connection.connectionservice"));
    }

    #[test]
    fn build_and_lookup() {
        let mut types = RegistryBuilder::new();
        types.message("Empty", &[]);
        let registry = types.build().unwrap();

        let mut builder = ServiceRegistryBuilder::new();
        builder.service(
            "test.Echo",
            &[
                method(1, "Ping", Some("Empty"), RespSpec::Message("Empty")),
                method(2, "Nudge", Some("Empty"), RespSpec::NoResponse),
                method(3, "Mystery", None, RespSpec::NotImplemented),
            ],
        );
        let services = builder.build(&registry).unwrap();

        let echo = services.get_by_name("test.Echo").unwrap();
        assert_eq!(services.get(echo.hash()).unwrap().name(), "test.Echo");

        let ping = echo.method(1).unwrap();
        assert!(ping.resp.expects_response());
        assert!(!echo.method(2).unwrap().resp.expects_response());
        assert!(echo.method(3).unwrap().resp.expects_response());
        assert_eq!(echo.method_by_name("Nudge").unwrap().id, 2);
        assert!(echo.method(9).is_none());
    }

    #[test]
    fn unknown_body_type_fails() {
        let registry = RegistryBuilder::new().build().unwrap();
        let mut builder = ServiceRegistryBuilder::new();
        builder.service(
            "test.Broken",
            &[method(1, "Call", Some("Missing"), RespSpec::NoResponse)],
        );
        builder.build(&registry).unwrap_err();
    }
}
