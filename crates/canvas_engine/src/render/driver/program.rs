//! Shader program descriptions
//!
//! A [`Program`] names its shader stages and declares which uniform block
//! and sampler bindings it reads. Backends pick the stage source they
//! understand; the software backend runs [`BuiltinShader`] stages on the CPU.

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex stage
    Vertex,
    /// Fragment stage
    Fragment,
}

/// Shading programs every backend ships with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinShader {
    /// Canvas compositing: `view_projection * position`, atlas-sampled, tinted by vertex color
    Canvas,
    /// Untextured: `view_projection * model * position`, vertex color times material color
    VertexColor,
}

/// Source of one shader stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSource {
    /// SPIR-V words
    Spirv(Vec<u32>),
    /// GLSL text
    Glsl(String),
    /// HLSL text
    Hlsl(String),
    /// A program compiled into the backend
    Builtin(BuiltinShader),
}

/// Named uniform block binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniformBlockInfo {
    /// Block name
    pub name: String,
    /// Uniform binding slot
    pub binding: usize,
}

/// Named sampler binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerInfo {
    /// Sampler name
    pub name: String,
    /// Sampler group binding slot
    pub group: usize,
    /// Index inside the group
    pub index: usize,
}

/// Shader program creation parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Debug name
    pub name: String,
    /// Vertex stage
    pub vertex: Option<ShaderSource>,
    /// Fragment stage
    pub fragment: Option<ShaderSource>,
    /// Uniform blocks read by the stages
    pub uniform_blocks: Vec<UniformBlockInfo>,
    /// Samplers read by the stages
    pub samplers: Vec<SamplerInfo>,
}

impl Program {
    /// Start an empty program
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Program with both stages set to a built-in shader
    pub fn builtin(name: impl Into<String>, shader: BuiltinShader) -> Self {
        Self::new(name)
            .shader(ShaderStage::Vertex, ShaderSource::Builtin(shader))
            .shader(ShaderStage::Fragment, ShaderSource::Builtin(shader))
    }

    /// Set the source of a stage
    pub fn shader(mut self, stage: ShaderStage, source: ShaderSource) -> Self {
        match stage {
            ShaderStage::Vertex => self.vertex = Some(source),
            ShaderStage::Fragment => self.fragment = Some(source),
        }
        self
    }

    /// Declare a uniform block
    pub fn uniform_block(mut self, name: impl Into<String>, binding: usize) -> Self {
        self.uniform_blocks.push(UniformBlockInfo {
            name: name.into(),
            binding,
        });
        self
    }

    /// Declare a sampler
    pub fn sampler(mut self, name: impl Into<String>, group: usize, index: usize) -> Self {
        self.samplers.push(SamplerInfo {
            name: name.into(),
            group,
            index,
        });
        self
    }

    /// Built-in shader for a stage, if that stage is built in
    pub fn builtin_stage(&self, stage: ShaderStage) -> Option<BuiltinShader> {
        let source = match stage {
            ShaderStage::Vertex => self.vertex.as_ref(),
            ShaderStage::Fragment => self.fragment.as_ref(),
        };
        match source {
            Some(ShaderSource::Builtin(shader)) => Some(*shader),
            _ => None,
        }
    }
}
