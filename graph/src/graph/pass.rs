//! The pass abstraction.
//!
//! A pass is an opaque unit of rendering work. The engine only knows the
//! ports it declares through [`RenderPass::reflect`] and drives it through
//! [`RenderPass::execute`] once per frame.

use crate::error::{GraphError, PassError};
use crate::graph::dictionary::FrameDictionary;
use crate::graph::port::PassReflection;
use crate::options::Options;
use crate::resource::{Resource, Texture};

/// Trait implemented by every pass type.
pub trait RenderPass: Send {
    /// Registered type name, e.g. `"ToneMapper"`.
    fn type_name(&self) -> &str;

    /// Declare the pass ports.
    ///
    /// Called once when the pass is added to a graph. The declared set must
    /// not change for the lifetime of the pass.
    fn reflect(&self, reflection: &mut PassReflection);

    /// Apply a full configuration record. Absent options take their defaults.
    fn configure(&mut self, options: &Options) -> Result<(), GraphError>;

    /// The current configuration as a record that [`configure`](Self::configure) accepts.
    fn properties(&self) -> Options {
        Options::new()
    }

    /// Do the work for one frame.
    ///
    /// Every declared output is bound; every connected input is bound.
    /// Unconnected optional inputs resolve to `None`.
    fn execute(&mut self, ctx: &mut PassContext<'_>) -> Result<(), PassError>;
}

/// A pass type that can be created from a configuration record.
///
/// Implementing this gives [`PassRegistry::register_type`](crate::PassRegistry::register_type)
/// everything it needs to build a factory.
pub trait PassType: RenderPass + Sized + 'static {
    const TYPE_NAME: &'static str;

    fn from_options(options: &Options) -> Result<Self, GraphError>;
}

/// Frame-level information handed to passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Zero-based index of the frame within the executor.
    pub index: u64,
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    pub fn new(index: u64, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Resolved resources for one pass invocation.
///
/// Inputs are shared borrows of the frame's resources. Outputs are owned by the
/// context for the duration of the call and returned to the executor after it.
pub struct PassContext<'a> {
    pass: &'a str,
    frame: FrameInfo,
    inputs: Vec<(&'a str, Option<&'a Resource>)>,
    outputs: Vec<(&'a str, Resource)>,
    dictionary: &'a mut FrameDictionary,
}

impl<'a> PassContext<'a> {
    /// Create a context with no bound ports.
    pub fn new(pass: &'a str, frame: FrameInfo, dictionary: &'a mut FrameDictionary) -> Self {
        Self {
            pass,
            frame,
            inputs: Vec::new(),
            outputs: Vec::new(),
            dictionary,
        }
    }

    /// Bind an input port. `None` is the absent binding of an unconnected optional input.
    pub fn with_input(mut self, port: &'a str, resource: Option<&'a Resource>) -> Self {
        self.inputs.push((port, resource));
        self
    }

    /// Bind an output port.
    pub fn with_output(mut self, port: &'a str, resource: Resource) -> Self {
        self.outputs.push((port, resource));
        self
    }

    /// Identifier of the executing pass.
    pub fn pass_id(&self) -> &str {
        self.pass
    }

    /// Index and resolution of the current frame.
    pub fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    /// The resource bound to an input, or `None` if the input is absent or unknown.
    pub fn input(&self, port: &str) -> Option<&'a Resource> {
        self.inputs
            .iter()
            .find(|(name, _)| *name == port)
            .and_then(|(_, resource)| *resource)
    }

    /// The texture bound to an input.
    pub fn input_texture(&self, port: &str) -> Result<&'a Texture, PassError> {
        let resource = self
            .input(port)
            .ok_or_else(|| PassError::MissingResource(port.to_string()))?;
        resource
            .as_texture()
            .ok_or_else(|| PassError::WrongResourceType {
                port: port.to_string(),
                expected: "texture",
                found: resource.type_name(),
            })
    }

    /// The texture bound to an optional input, `None` when absent.
    pub fn optional_input_texture(&self, port: &str) -> Result<Option<&'a Texture>, PassError> {
        match self.input(port) {
            None => Ok(None),
            Some(_) => self.input_texture(port).map(Some),
        }
    }

    /// The bytes of the buffer bound to an input.
    pub fn input_buffer(&self, port: &str) -> Result<&'a [u8], PassError> {
        let resource = self
            .input(port)
            .ok_or_else(|| PassError::MissingResource(port.to_string()))?;
        resource
            .as_buffer()
            .ok_or_else(|| PassError::WrongResourceType {
                port: port.to_string(),
                expected: "buffer",
                found: resource.type_name(),
            })
    }

    /// The buffer bound to an optional input, `None` when absent.
    pub fn optional_input_buffer(&self, port: &str) -> Result<Option<&'a [u8]>, PassError> {
        match self.input(port) {
            None => Ok(None),
            Some(_) => self.input_buffer(port).map(Some),
        }
    }

    /// The resource bound to an output, of either type.
    pub fn output_mut(&mut self, port: &str) -> Option<&mut Resource> {
        self.outputs
            .iter_mut()
            .find(|(name, _)| *name == port)
            .map(|(_, resource)| resource)
    }

    /// The texture bound to an output.
    pub fn output_texture_mut(&mut self, port: &str) -> Result<&mut Texture, PassError> {
        let resource = self
            .output_mut(port)
            .ok_or_else(|| PassError::MissingResource(port.to_string()))?;
        let found = resource.type_name();
        resource
            .as_texture_mut()
            .ok_or_else(|| PassError::WrongResourceType {
                port: port.to_string(),
                expected: "texture",
                found,
            })
    }

    /// The buffer bound to an output.
    pub fn output_buffer_mut(&mut self, port: &str) -> Result<&mut Vec<u8>, PassError> {
        let resource = self
            .output_mut(port)
            .ok_or_else(|| PassError::MissingResource(port.to_string()))?;
        let found = resource.type_name();
        resource
            .as_buffer_mut()
            .ok_or_else(|| PassError::WrongResourceType {
                port: port.to_string(),
                expected: "buffer",
                found,
            })
    }

    /// Remove an output from the context, e.g. to inspect it in a test.
    pub fn take_output(&mut self, port: &str) -> Option<Resource> {
        let index = self.outputs.iter().position(|(name, _)| *name == port)?;
        Some(self.outputs.swap_remove(index).1)
    }

    /// Frame dictionary shared by all passes of the frame.
    pub fn dictionary(&self) -> &FrameDictionary {
        &*self.dictionary
    }

    pub fn dictionary_mut(&mut self) -> &mut FrameDictionary {
        &mut *self.dictionary
    }

    pub(crate) fn into_outputs(self) -> Vec<(&'a str, Resource)> {
        self.outputs
    }
}
