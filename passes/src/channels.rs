//! Static port tables.
//!
//! Passes describe their ports as `const` channel lists and declare them from
//! `reflect` in one call.

use lumen_graph::{PassReflection, ResourceKind, TextureFormat};

/// One texture port of a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Channel {
    pub name: &'static str,
    pub description: &'static str,
    pub optional: bool,
    pub format: TextureFormat,
}

impl Channel {
    pub const fn required(
        name: &'static str,
        description: &'static str,
        format: TextureFormat,
    ) -> Self {
        Self {
            name,
            description,
            optional: false,
            format,
        }
    }

    pub const fn optional(
        name: &'static str,
        description: &'static str,
        format: TextureFormat,
    ) -> Self {
        Self {
            name,
            description,
            optional: true,
            format,
        }
    }

    pub const fn kind(&self) -> ResourceKind {
        ResourceKind::texture(self.format)
    }
}

pub fn add_inputs(reflection: &mut PassReflection, channels: &[Channel]) {
    for channel in channels {
        let port = reflection.add_input(channel.name, channel.kind());
        port.with_description(channel.description);
        if channel.optional {
            port.optional();
        }
    }
}

/// Outputs are always bound, so `optional` is ignored.
pub fn add_outputs(reflection: &mut PassReflection, channels: &[Channel]) {
    for channel in channels {
        reflection
            .add_output(channel.name, channel.kind())
            .with_description(channel.description);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_graph::PortDirection;

    const INPUTS: &[Channel] = &[
        Channel::required("color", "Radiance", TextureFormat::Rgba32Float),
        Channel::optional("mask", "Coverage mask", TextureFormat::R32Float),
    ];
    const OUTPUTS: &[Channel] = &[Channel::required("dst", "Result", TextureFormat::Rgba8Unorm)];

    #[test]
    fn test_declare_channels() {
        let mut reflection = PassReflection::new();
        add_inputs(&mut reflection, INPUTS);
        add_outputs(&mut reflection, OUTPUTS);

        let ports = reflection.ports();
        assert_eq!(ports.len(), 3);
        assert!(!ports[0].optional);
        assert!(ports[1].optional);
        assert_eq!(ports[1].description, "Coverage mask");
        assert_eq!(ports[2].direction, PortDirection::Output);
        assert_eq!(ports[2].kind, ResourceKind::texture(TextureFormat::Rgba8Unorm));
    }
}
