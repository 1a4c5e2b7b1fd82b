//! GPU texture residency
//!
//! Atlases are uploaded lazily the first time a batch needs them and kept
//! resident while they fit in the texture memory budget. Eviction is least
//! recently bound first, and a texture bound in the current frame is never
//! evicted.

use rustc_hash::FxHashMap;

use crate::animation::Atlas;
use crate::assets::AtlasId;

// ============================================================================
// Upload backend
// ============================================================================

/// Backend that creates, refreshes and frees texture objects
pub trait TextureUploader {
    type Handle;

    /// Create a texture holding the atlas image
    fn upload(&mut self, atlas: &Atlas) -> Self::Handle;

    /// Rewrite the pixels of an existing texture of the same size
    fn update(&mut self, handle: &Self::Handle, atlas: &Atlas);

    /// Free a texture
    fn release(&mut self, handle: Self::Handle);
}

/// What `bind` had to do to make a texture resident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// Already on the GPU and current
    Resident,
    /// First upload
    Uploaded,
    /// Pixels changed since the last upload and were sent again
    Reuploaded,
}

impl Residency {
    /// Whether pixel data was transferred
    #[must_use]
    pub const fn transferred(self) -> bool {
        !matches!(self, Self::Resident)
    }
}

#[derive(Debug)]
struct TextureEntry<H> {
    handle: H,
    bytes: u64,
    dimensions: (u32, u32),
    last_bound: u64,
}

// ============================================================================
// Texture Manager
// ============================================================================

/// Tracks GPU-resident atlas textures against a memory budget
#[derive(Debug)]
pub struct TextureManager<H> {
    entries: FxHashMap<AtlasId, TextureEntry<H>>,
    used: u64,
    max: u64,
    uploads: u64,
    evictions: u64,
}

impl<H> TextureManager<H> {
    /// Create a manager with a budget of `max_texture_mem` bytes
    #[must_use]
    pub fn new(max_texture_mem: u64) -> Self {
        Self {
            entries: FxHashMap::default(),
            used: 0,
            max: max_texture_mem,
            uploads: 0,
            evictions: 0,
        }
    }

    /// Make the atlas texture resident and record its use in `frame`.
    ///
    /// Uploads on first use and re-uploads when `dirty`.
    pub fn bind<U>(
        &mut self,
        id: AtlasId,
        atlas: &Atlas,
        dirty: bool,
        frame: u64,
        uploader: &mut U,
    ) -> Option<(&H, Residency)>
    where
        U: TextureUploader<Handle = H>,
    {
        let dimensions = (atlas.width(), atlas.height());
        let same_size = self.entries.get(&id).map(|e| e.dimensions == dimensions);

        let residency = match same_size {
            Some(true) if dirty => {
                if let Some(entry) = self.entries.get(&id) {
                    uploader.update(&entry.handle, atlas);
                }
                Residency::Reuploaded
            }
            Some(true) => Residency::Resident,
            Some(false) => {
                // Resized image: the old texture cannot hold it
                self.remove(id, uploader);
                self.insert(id, atlas, uploader);
                Residency::Reuploaded
            }
            None => {
                self.insert(id, atlas, uploader);
                Residency::Uploaded
            }
        };

        if residency.transferred() {
            self.uploads += 1;
            log::trace!("Texture for '{}' {:?}", atlas.name(), residency);
        }

        let entry = self.entries.get_mut(&id)?;
        entry.last_bound = frame;
        Some((&entry.handle, residency))
    }

    fn insert<U>(&mut self, id: AtlasId, atlas: &Atlas, uploader: &mut U)
    where
        U: TextureUploader<Handle = H>,
    {
        let bytes = atlas.byte_size();
        let handle = uploader.upload(atlas);
        self.used += bytes;
        self.entries.insert(
            id,
            TextureEntry {
                handle,
                bytes,
                dimensions: (atlas.width(), atlas.height()),
                last_bound: 0,
            },
        );
    }

    /// Evict least recently bound textures until usage fits the budget.
    ///
    /// Textures bound during `frame` are kept even if that leaves the
    /// manager over budget. Returns the number of evictions.
    pub fn enforce_budget<U>(&mut self, frame: u64, uploader: &mut U) -> u32
    where
        U: TextureUploader<Handle = H>,
    {
        let mut evicted = 0;
        while self.used > self.max {
            let victim = self
                .entries
                .iter()
                .filter(|(_, e)| e.last_bound < frame)
                .min_by_key(|(id, e)| (e.last_bound, **id))
                .map(|(&id, _)| id);

            let Some(id) = victim else {
                log::warn!(
                    "Texture memory over budget: {} of {} bytes in use by this frame",
                    self.used,
                    self.max
                );
                break;
            };
            if self.remove(id, uploader) {
                log::debug!("Evicted texture {id:?}");
                evicted += 1;
                self.evictions += 1;
            }
        }
        evicted
    }

    /// Free one texture. Returns false if it was not resident.
    pub fn remove<U>(&mut self, id: AtlasId, uploader: &mut U) -> bool
    where
        U: TextureUploader<Handle = H>,
    {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.used = self.used.saturating_sub(entry.bytes);
                uploader.release(entry.handle);
                true
            }
            None => false,
        }
    }

    /// Free every texture
    pub fn clear<U>(&mut self, uploader: &mut U)
    where
        U: TextureUploader<Handle = H>,
    {
        for (_, entry) in self.entries.drain() {
            uploader.release(entry.handle);
        }
        self.used = 0;
    }

    #[must_use]
    pub fn handle(&self, id: AtlasId) -> Option<&H> {
        self.entries.get(&id).map(|e| &e.handle)
    }

    #[must_use]
    pub fn is_resident(&self, id: AtlasId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Bytes currently held by resident textures
    #[must_use]
    pub fn used_texture_mem(&self) -> u64 {
        self.used
    }

    #[must_use]
    pub fn max_texture_mem(&self) -> u64 {
        self.max
    }

    pub fn set_max_texture_mem(&mut self, bytes: u64) {
        self.max = bytes;
    }

    /// Total uploads, first-time and re-uploads
    #[must_use]
    pub fn upload_count(&self) -> u64 {
        self.uploads
    }

    #[must_use]
    pub fn eviction_count(&self) -> u64 {
        self.evictions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// wgpu textures
// ============================================================================

/// A GPU texture with its view and bind group
#[derive(Debug)]
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub bind_group: wgpu::BindGroup,
    pub size: wgpu::Extent3d,
}

impl GpuTexture {
    /// Create a bind group layout for atlas textures
    pub fn bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_bind_group_layout"),
            entries: &[
                // Texture view
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    /// Nearest-neighbour sampler so cells keep crisp edges
    pub fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
        device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("atlas_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        })
    }
}

/// Uploads atlases through a wgpu device and queue
pub struct WgpuUploader<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub layout: &'a wgpu::BindGroupLayout,
    pub sampler: &'a wgpu::Sampler,
}

impl WgpuUploader<'_> {
    fn write(&self, texture: &wgpu::Texture, atlas: &Atlas, size: wgpu::Extent3d) {
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            atlas.image().as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            size,
        );
    }
}

impl TextureUploader for WgpuUploader<'_> {
    type Handle = GpuTexture;

    fn upload(&mut self, atlas: &Atlas) -> GpuTexture {
        let size = wgpu::Extent3d {
            width: atlas.width().max(1),
            height: atlas.height().max(1),
            depth_or_array_layers: 1,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(atlas.name()),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        if atlas.has_pixels() {
            self.write(&texture, atlas, size);
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("atlas_bind_group"),
            layout: self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
        });

        GpuTexture {
            texture,
            view,
            bind_group,
            size,
        }
    }

    fn update(&mut self, handle: &GpuTexture, atlas: &Atlas) {
        if atlas.has_pixels() {
            self.write(&handle.texture, atlas, handle.size);
        }
    }

    fn release(&mut self, handle: GpuTexture) {
        handle.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AtlasStore;
    use image::RgbaImage;

    /// Uploader that records calls and hands out numbered handles
    #[derive(Default)]
    struct FakeUploader {
        next: u32,
        updates: u32,
        released: Vec<u32>,
    }

    impl TextureUploader for FakeUploader {
        type Handle = u32;

        fn upload(&mut self, _atlas: &Atlas) -> u32 {
            self.next += 1;
            self.next
        }

        fn update(&mut self, _handle: &u32, _atlas: &Atlas) {
            self.updates += 1;
        }

        fn release(&mut self, handle: u32) {
            self.released.push(handle);
        }
    }

    /// Three 16x16 atlases of 1 KiB each
    fn store() -> (AtlasStore, Vec<AtlasId>) {
        let mut store = AtlasStore::new();
        let ids = ["a", "b", "c"]
            .iter()
            .map(|name| store.add(Atlas::single_image(*name, RgbaImage::new(16, 16)).unwrap()))
            .collect();
        (store, ids)
    }

    #[test]
    fn test_upload_once_then_resident() {
        let (store, ids) = store();
        let mut textures = TextureManager::new(u64::MAX);
        let mut uploader = FakeUploader::default();
        let atlas = store.get(ids[0]).unwrap();

        let (&handle, residency) = textures.bind(ids[0], atlas, false, 1, &mut uploader).unwrap();
        assert_eq!((handle, residency), (1, Residency::Uploaded));
        let (_, residency) = textures.bind(ids[0], atlas, false, 2, &mut uploader).unwrap();
        assert_eq!(residency, Residency::Resident);
        let (_, residency) = textures.bind(ids[0], atlas, true, 3, &mut uploader).unwrap();
        assert_eq!(residency, Residency::Reuploaded);

        assert_eq!(uploader.updates, 1);
        assert_eq!(textures.upload_count(), 2);
        assert_eq!(textures.used_texture_mem(), 1024);
    }

    #[test]
    fn test_evicts_least_recently_bound() {
        let (store, ids) = store();
        let mut textures = TextureManager::new(2048);
        let mut uploader = FakeUploader::default();

        for (frame, &id) in ids.iter().enumerate() {
            textures.bind(id, store.get(id).unwrap(), false, frame as u64 + 1, &mut uploader);
        }
        assert_eq!(textures.used_texture_mem(), 3072);

        let evicted = textures.enforce_budget(3, &mut uploader);
        assert_eq!(evicted, 1);
        assert!(!textures.is_resident(ids[0]));
        assert!(textures.is_resident(ids[1]) && textures.is_resident(ids[2]));
        assert_eq!(uploader.released, vec![1]);
        assert!(textures.used_texture_mem() <= textures.max_texture_mem());
    }

    #[test]
    fn test_current_frame_is_never_evicted() {
        let (store, ids) = store();
        let mut textures = TextureManager::new(1024);
        let mut uploader = FakeUploader::default();

        for &id in &ids {
            textures.bind(id, store.get(id).unwrap(), false, 7, &mut uploader);
        }
        assert_eq!(textures.enforce_budget(7, &mut uploader), 0);
        assert_eq!(textures.len(), 3);

        // Once the frame is over they become candidates
        assert_eq!(textures.enforce_budget(8, &mut uploader), 2);
        assert_eq!(textures.len(), 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let (store, ids) = store();
        let mut textures = TextureManager::new(u64::MAX);
        let mut uploader = FakeUploader::default();
        for &id in &ids {
            textures.bind(id, store.get(id).unwrap(), false, 1, &mut uploader);
        }

        assert!(textures.remove(ids[1], &mut uploader));
        assert!(!textures.remove(ids[1], &mut uploader));
        assert_eq!(textures.used_texture_mem(), 2048);

        textures.clear(&mut uploader);
        assert!(textures.is_empty());
        assert_eq!(textures.used_texture_mem(), 0);
        assert_eq!(uploader.released.len(), 3);
    }

    #[test]
    fn test_resized_atlas_gets_fresh_texture() {
        let (mut store, ids) = store();
        let mut textures = TextureManager::new(u64::MAX);
        let mut uploader = FakeUploader::default();
        textures.bind(ids[0], store.get(ids[0]).unwrap(), false, 1, &mut uploader);
        assert_eq!(textures.used_texture_mem(), 1024);

        *store.image_mut(ids[0]).unwrap() = RgbaImage::new(32, 32);
        let dirty = store.take_dirty(ids[0]);
        assert!(dirty);

        let atlas = store.get(ids[0]).unwrap();
        let (&handle, residency) = textures.bind(ids[0], atlas, dirty, 2, &mut uploader).unwrap();
        assert_eq!((handle, residency), (2, Residency::Reuploaded));
        // The old handle is released rather than updated in place
        assert_eq!(uploader.released, vec![1]);
        assert_eq!(uploader.updates, 0);
        assert_eq!(textures.used_texture_mem(), 4096);
        assert_eq!(textures.upload_count(), 2);
        assert_eq!(textures.len(), 1);
    }
}
