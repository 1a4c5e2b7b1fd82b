//! Shader registry
//!
//! Shaders are registered by id with their WGSL source and compiled the
//! first time they are requested. The registry also tracks which program is
//! bound so redundant binds never reach the GPU.

use std::borrow::Cow;

use rustc_hash::FxHashMap;

use crate::render::RenderError;

/// Identifier of a registered shader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u32);

impl ShaderId {
    /// Samples the batch texture and multiplies by the vertex colour
    pub const TEXTURED: Self = Self(0);
    /// Vertex colour only
    pub const SOLID: Self = Self(1);
}

/// Source of a shader program
#[derive(Debug, Clone)]
pub struct ShaderSource {
    pub label: Cow<'static, str>,
    pub wgsl: Cow<'static, str>,
    pub vertex_entry: &'static str,
    pub fragment_entry: &'static str,
    /// Whether the program samples a texture bind group
    pub textured: bool,
}

impl ShaderSource {
    #[must_use]
    pub fn new(label: impl Into<Cow<'static, str>>, wgsl: impl Into<Cow<'static, str>>) -> Self {
        Self {
            label: label.into(),
            wgsl: wgsl.into(),
            vertex_entry: "vs_main",
            fragment_entry: "fs_main",
            textured: false,
        }
    }

    #[must_use]
    pub fn textured(mut self) -> Self {
        self.textured = true;
        self
    }
}

/// Turns a source into a backend program
pub trait ShaderCompiler {
    type Program;

    /// Compile and link `source`
    ///
    /// # Errors
    ///
    /// Returns the backend's diagnostic on failure
    fn compile(&mut self, source: &ShaderSource) -> Result<Self::Program, String>;
}

/// Result of a bind request
#[derive(Debug)]
pub enum Bound<'a, P> {
    /// The program is already bound; issue nothing
    AlreadyBound,
    /// Bind this program
    Bind(&'a P),
}

/// Compiled-on-demand shader programs keyed by [`ShaderId`]
#[derive(Debug)]
pub struct ShaderRegistry<P> {
    sources: FxHashMap<ShaderId, ShaderSource>,
    programs: FxHashMap<ShaderId, P>,
    bound: Option<ShaderId>,
    use_program_count: u64,
}

impl<P> ShaderRegistry<P> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            sources: FxHashMap::default(),
            programs: FxHashMap::default(),
            bound: None,
            use_program_count: 0,
        }
    }

    /// Register a source. Replacing a source drops its compiled program.
    pub fn register(&mut self, id: ShaderId, source: ShaderSource) {
        log::debug!("Registered shader '{}' as {id:?}", source.label);
        self.programs.remove(&id);
        if self.bound == Some(id) {
            self.bound = None;
        }
        self.sources.insert(id, source);
    }

    /// Compiled program, compiling it on first request
    ///
    /// # Errors
    ///
    /// Fails for unregistered ids and compile errors
    pub fn get_or_compile<C>(&mut self, compiler: &mut C, id: ShaderId) -> Result<&P, RenderError>
    where
        C: ShaderCompiler<Program = P>,
    {
        if !self.programs.contains_key(&id) {
            let source = self
                .sources
                .get(&id)
                .ok_or(RenderError::UnknownShader(id))?;
            let program = compiler.compile(source).map_err(|message| {
                log::error!("Shader '{}' failed to compile: {message}", source.label);
                RenderError::ShaderCompile {
                    shader: id,
                    message,
                }
            })?;
            log::debug!("Compiled shader '{}'", source.label);
            self.programs.insert(id, program);
        }
        self.programs.get(&id).ok_or(RenderError::UnknownShader(id))
    }

    /// Request `id` as the active program
    ///
    /// # Errors
    ///
    /// Fails for unregistered ids and compile errors
    pub fn bind<C>(&mut self, compiler: &mut C, id: ShaderId) -> Result<Bound<'_, P>, RenderError>
    where
        C: ShaderCompiler<Program = P>,
    {
        if self.bound == Some(id) && self.programs.contains_key(&id) {
            return Ok(Bound::AlreadyBound);
        }
        self.get_or_compile(compiler, id)?;
        self.bound = Some(id);
        self.use_program_count += 1;
        self.programs
            .get(&id)
            .map(Bound::Bind)
            .ok_or(RenderError::UnknownShader(id))
    }

    /// Forget the bound program, e.g. at the start of a new pass
    pub fn unbind_all(&mut self) {
        self.bound = None;
    }

    #[must_use]
    pub fn bound(&self) -> Option<ShaderId> {
        self.bound
    }

    /// Number of binds that reached the backend
    #[must_use]
    pub fn use_program_count(&self) -> u64 {
        self.use_program_count
    }

    #[must_use]
    pub fn is_compiled(&self, id: ShaderId) -> bool {
        self.programs.contains_key(&id)
    }

    #[must_use]
    pub fn program(&self, id: ShaderId) -> Option<&P> {
        self.programs.get(&id)
    }
}

impl<P> Default for ShaderRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Compiler that hands out numbered programs and rejects empty sources
    #[derive(Default)]
    struct FakeCompiler {
        compiled: u32,
    }

    impl ShaderCompiler for FakeCompiler {
        type Program = u32;

        fn compile(&mut self, source: &ShaderSource) -> Result<u32, String> {
            if source.wgsl.is_empty() {
                return Err("empty module".to_string());
            }
            self.compiled += 1;
            Ok(self.compiled)
        }
    }

    fn registry() -> ShaderRegistry<u32> {
        let mut registry = ShaderRegistry::new();
        registry.register(ShaderId::TEXTURED, ShaderSource::new("sprite", "fn main() {}").textured());
        registry.register(ShaderId::SOLID, ShaderSource::new("solid", "fn main() {}"));
        registry
    }

    #[test]
    fn test_rebind_is_free() {
        let mut registry = registry();
        let mut compiler = FakeCompiler::default();

        assert!(matches!(
            registry.bind(&mut compiler, ShaderId::TEXTURED),
            Ok(Bound::Bind(&1))
        ));
        assert!(matches!(
            registry.bind(&mut compiler, ShaderId::TEXTURED),
            Ok(Bound::AlreadyBound)
        ));
        assert_eq!(registry.use_program_count(), 1);
        assert_eq!(compiler.compiled, 1);
    }

    #[test]
    fn test_switch_and_unbind() {
        let mut registry = registry();
        let mut compiler = FakeCompiler::default();

        registry.bind(&mut compiler, ShaderId::TEXTURED).unwrap();
        registry.bind(&mut compiler, ShaderId::SOLID).unwrap();
        registry.bind(&mut compiler, ShaderId::TEXTURED).unwrap();
        assert_eq!(registry.use_program_count(), 3);
        // Programs are compiled once and cached
        assert_eq!(compiler.compiled, 2);

        registry.unbind_all();
        assert_eq!(registry.bound(), None);
        assert!(matches!(
            registry.bind(&mut compiler, ShaderId::TEXTURED),
            Ok(Bound::Bind(&1))
        ));
        assert_eq!(registry.use_program_count(), 4);
    }

    #[test]
    fn test_errors() {
        let mut registry = registry();
        let mut compiler = FakeCompiler::default();
        registry.register(ShaderId(7), ShaderSource::new("broken", ""));

        assert!(matches!(
            registry.bind(&mut compiler, ShaderId(9)),
            Err(RenderError::UnknownShader(ShaderId(9)))
        ));
        assert!(matches!(
            registry.bind(&mut compiler, ShaderId(7)),
            Err(RenderError::ShaderCompile { shader: ShaderId(7), .. })
        ));
        assert_eq!(registry.bound(), None);
        assert_eq!(registry.use_program_count(), 0);
    }
}
