//! Per-frame render counters

/// What one render pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Nodes reached by traversal (skipped subtrees excluded)
    pub nodes_visited: u32,
    /// Leaves that painted something
    pub leaves_painted: u32,
    /// Draw calls issued to the backend
    pub draw_calls: u32,
    /// Texture bind changes
    pub texture_binds: u32,
    /// Shader program binds actually issued
    pub shader_binds: u32,
    /// Texture uploads, first-time and dirty re-uploads
    pub texture_uploads: u32,
    /// Textures evicted to stay within the memory budget
    pub texture_evictions: u32,
}

impl RenderStats {
    /// One-line summary for logs
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "nodes: {} | painted: {} | draws: {} | tex binds: {} | shader binds: {} | uploads: {}",
            self.nodes_visited,
            self.leaves_painted,
            self.draw_calls,
            self.texture_binds,
            self.shader_binds,
            self.texture_uploads
        )
    }
}
