//! Ports and port references.

use std::fmt;
use std::str::FromStr;

use crate::error::GraphError;
use crate::resource::ResourceKind;

/// Direction of a port relative to its pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortDirection {
    Input,
    Output,
}

/// A named, typed connection point declared by a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDesc {
    pub name: String,
    pub direction: PortDirection,
    pub kind: ResourceKind,
    /// Optional inputs may stay unconnected and resolve to an absent binding.
    pub optional: bool,
    pub description: String,
}

impl PortDesc {
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }

    /// Mark the port optional.
    pub fn optional(&mut self) -> &mut Self {
        self.optional = true;
        self
    }

    /// Attach a human-readable description.
    pub fn with_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = description.into();
        self
    }
}

/// Port declarations collected from [`RenderPass::reflect`](crate::RenderPass::reflect).
///
/// ```ignore
/// fn reflect(&self, reflection: &mut PassReflection) {
///     reflection.add_input("src", ResourceKind::texture(TextureFormat::Rgba32Float));
///     reflection
///         .add_input("mask", ResourceKind::texture(TextureFormat::R32Float))
///         .optional();
///     reflection.add_output("dst", ResourceKind::texture(TextureFormat::Rgba8Unorm));
/// }
/// ```
#[derive(Debug, Default)]
pub struct PassReflection {
    ports: Vec<PortDesc>,
}

impl PassReflection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an input port. Required unless marked [`optional`](PortDesc::optional).
    pub fn add_input(&mut self, name: impl Into<String>, kind: ResourceKind) -> &mut PortDesc {
        self.add(name.into(), PortDirection::Input, kind)
    }

    /// Declare an output port.
    pub fn add_output(&mut self, name: impl Into<String>, kind: ResourceKind) -> &mut PortDesc {
        self.add(name.into(), PortDirection::Output, kind)
    }

    fn add(&mut self, name: String, direction: PortDirection, kind: ResourceKind) -> &mut PortDesc {
        self.ports.push(PortDesc {
            name,
            direction,
            kind,
            optional: false,
            description: String::new(),
        });
        let last = self.ports.len() - 1;
        &mut self.ports[last]
    }

    /// Ports declared so far, in declaration order.
    pub fn ports(&self) -> &[PortDesc] {
        &self.ports
    }

    /// Take the declared ports, rejecting duplicate names.
    pub(crate) fn into_ports(self, pass: &str) -> Result<Vec<PortDesc>, GraphError> {
        for (i, port) in self.ports.iter().enumerate() {
            if self.ports[..i].iter().any(|p| p.name == port.name) {
                return Err(GraphError::DuplicatePortName {
                    pass: pass.to_string(),
                    port: port.name.clone(),
                });
            }
        }
        Ok(self.ports)
    }
}

/// A strongly typed `<pass>.<port>` reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortRef {
    pub pass: String,
    pub port: String,
}

impl PortRef {
    /// Reference to `port` on `pass`.
    pub fn new(pass: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            pass: pass.into(),
            port: port.into(),
        }
    }

    /// Parse `"<pass>.<port>"`, splitting at the first `.`.
    pub fn parse(reference: &str) -> Result<Self, GraphError> {
        match reference.split_once('.') {
            Some((pass, port)) if !pass.is_empty() && !port.is_empty() => Ok(Self::new(pass, port)),
            _ => Err(GraphError::InvalidReference(reference.to_string())),
        }
    }
}

impl FromStr for PortRef {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PortRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.pass, self.port)
    }
}
