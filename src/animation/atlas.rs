//! Texture atlases
//!
//! An atlas is a backing image plus a list of cell rectangles over it and the
//! named sequences that order those cells. Cell geometry is fixed once the
//! atlas is built; only the pixels may change (live-drawn atlases), which the
//! asset store tracks with a dirty flag.

use std::sync::Arc;

use image::RgbaImage;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::sequence::Sequence;

// ============================================================================
// Cells
// ============================================================================

/// Collision rectangle relative to its cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hitbox {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// A sub-image of an atlas
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
    #[serde(default)]
    pub hitboxes: Vec<Hitbox>,
}

impl Cell {
    /// Create a cell with a single hitbox covering it
    #[must_use]
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            hitboxes: vec![Hitbox { x: 0, y: 0, w, h }],
        }
    }

    /// Right edge (exclusive)
    #[must_use]
    pub fn right(&self) -> u64 {
        u64::from(self.x) + u64::from(self.w)
    }

    /// Bottom edge (exclusive)
    #[must_use]
    pub fn bottom(&self) -> u64 {
        u64::from(self.y) + u64::from(self.h)
    }
}

// ============================================================================
// Atlas
// ============================================================================

/// How the cell list was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtlasKind {
    /// One cell covering the whole image
    SingleImage,
    /// Uniform grid
    SpriteSheet,
    /// Arbitrary cells from atlas data
    TextureAtlas,
}

/// Grid description for slicing a sprite sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SheetLayout {
    pub cell_width: u32,
    pub cell_height: u32,
    /// Columns to use; derived from the image width when `None`
    pub cols: Option<u32>,
    /// Rows to use; derived from the image height when `None`
    pub rows: Option<u32>,
    /// Cap on the number of cells; `rows * cols` when `None`
    pub num_cells: Option<u32>,
    /// Margin before the first cell
    pub offset: (u32, u32),
    /// Gap between neighbouring cells
    pub spacing: (u32, u32),
}

impl SheetLayout {
    /// Grid of `cell_width` x `cell_height` cells filling the image
    #[must_use]
    pub const fn new(cell_width: u32, cell_height: u32) -> Self {
        Self {
            cell_width,
            cell_height,
            cols: None,
            rows: None,
            num_cells: None,
            offset: (0, 0),
            spacing: (0, 0),
        }
    }

    #[must_use]
    pub const fn with_offset(mut self, x: u32, y: u32) -> Self {
        self.offset = (x, y);
        self
    }

    #[must_use]
    pub const fn with_spacing(mut self, x: u32, y: u32) -> Self {
        self.spacing = (x, y);
        self
    }

    #[must_use]
    pub const fn with_num_cells(mut self, n: u32) -> Self {
        self.num_cells = Some(n);
        self
    }

    fn fit(extent: u32, offset: u32, cell: u32, spacing: u32) -> u32 {
        if extent < offset + cell {
            return 0;
        }
        (extent - offset + spacing) / (cell + spacing)
    }

    /// Slice an image of `width` x `height` into row-major cells
    fn slice(&self, width: u32, height: u32) -> Vec<Cell> {
        let cols = self.cols.unwrap_or_else(|| {
            Self::fit(width, self.offset.0, self.cell_width, self.spacing.0)
        });
        let rows = self.rows.unwrap_or_else(|| {
            Self::fit(height, self.offset.1, self.cell_height, self.spacing.1)
        });
        let total = cols * rows;
        let count = self.num_cells.map_or(total, |n| n.min(total));

        (0..count)
            .map(|i| {
                let (col, row) = (i % cols, i / cols);
                Cell::new(
                    self.offset.0 + col * (self.cell_width + self.spacing.0),
                    self.offset.1 + row * (self.cell_height + self.spacing.1),
                    self.cell_width,
                    self.cell_height,
                )
            })
            .collect()
    }
}

/// Atlas data document: `{"cells": [...], "sequences": [...]}`
#[derive(Debug, Deserialize)]
struct AtlasData {
    cells: Vec<RawCell>,
    #[serde(default)]
    sequences: Vec<Sequence>,
}

/// Cell as it appears in atlas data; a missing hitbox list means "whole cell"
#[derive(Debug, Deserialize)]
struct RawCell {
    x: u32,
    y: u32,
    w: u32,
    h: u32,
    hitboxes: Option<Vec<Hitbox>>,
}

/// Cell rectangles and named sequences over a backing image
#[derive(Debug, Clone)]
pub struct Atlas {
    name: String,
    kind: AtlasKind,
    image: RgbaImage,
    cells: Vec<Cell>,
    sequences: FxHashMap<String, Arc<Sequence>>,
}

impl Atlas {
    fn build(
        name: impl Into<String>,
        kind: AtlasKind,
        image: RgbaImage,
        cells: Vec<Cell>,
    ) -> Result<Self, AtlasError> {
        let name = name.into();
        let (w, h) = image.dimensions();

        if cells.is_empty() {
            return Err(AtlasError::NoCells(name));
        }
        for (index, cell) in cells.iter().enumerate() {
            if cell.right() > u64::from(w) || cell.bottom() > u64::from(h) {
                return Err(AtlasError::CellOutOfBounds { atlas: name, index });
            }
        }

        Ok(Self {
            name,
            kind,
            image,
            cells,
            sequences: FxHashMap::default(),
        })
    }

    /// Atlas with one cell covering the whole image
    ///
    /// # Errors
    ///
    /// Returns an error if the image is empty
    pub fn single_image(name: impl Into<String>, image: RgbaImage) -> Result<Self, AtlasError> {
        let (w, h) = image.dimensions();
        let cells = if w == 0 || h == 0 {
            Vec::new()
        } else {
            vec![Cell::new(0, 0, w, h)]
        };
        Self::build(name, AtlasKind::SingleImage, image, cells)
    }

    /// Slice a sprite sheet into a uniform grid
    ///
    /// # Errors
    ///
    /// Returns an error if the layout has zero-sized cells or no cell fits
    pub fn sprite_sheet(
        name: impl Into<String>,
        image: RgbaImage,
        layout: SheetLayout,
    ) -> Result<Self, AtlasError> {
        let name = name.into();
        if layout.cell_width == 0 || layout.cell_height == 0 {
            return Err(AtlasError::InvalidLayout(name));
        }
        let (w, h) = image.dimensions();
        let cells = layout.slice(w, h);
        Self::build(name, AtlasKind::SpriteSheet, image, cells)
    }

    /// Build from atlas data
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed, a cell lies outside
    /// the image, or a sequence references a missing cell
    pub fn from_json(
        name: impl Into<String>,
        image: RgbaImage,
        json: &str,
    ) -> Result<Self, AtlasError> {
        let name = name.into();
        let data: AtlasData =
            serde_json::from_str(json).map_err(|e| AtlasError::Parse(e.to_string()))?;

        let cells = data
            .cells
            .into_iter()
            .map(|raw| match raw.hitboxes {
                Some(hitboxes) => Cell {
                    x: raw.x,
                    y: raw.y,
                    w: raw.w,
                    h: raw.h,
                    hitboxes,
                },
                None => Cell::new(raw.x, raw.y, raw.w, raw.h),
            })
            .collect();

        let mut atlas = Self::build(name, AtlasKind::TextureAtlas, image, cells)?;
        for sequence in data.sequences {
            atlas.add_sequence(sequence)?;
        }
        Ok(atlas)
    }

    /// Register a named sequence, replacing one with the same name
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence is empty or references a missing cell
    pub fn add_sequence(&mut self, sequence: Sequence) -> Result<Arc<Sequence>, AtlasError> {
        if sequence.is_empty() {
            return Err(AtlasError::EmptySequence(sequence.name));
        }
        if let Some(&cell) = sequence.cells.iter().find(|&&c| c >= self.cells.len()) {
            return Err(AtlasError::UnknownCell {
                sequence: sequence.name,
                cell,
            });
        }

        let sequence = Arc::new(sequence);
        self.sequences
            .insert(sequence.name.clone(), Arc::clone(&sequence));
        Ok(sequence)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn kind(&self) -> AtlasKind {
        self.kind
    }

    /// Backing image
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Mutable backing image. Use [`AtlasStore::image_mut`](crate::assets::AtlasStore::image_mut)
    /// so the change is uploaded.
    pub(crate) fn image_mut(&mut self) -> &mut RgbaImage {
        &mut self.image
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Whether the backing image has any pixels to upload
    #[must_use]
    pub fn has_pixels(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }

    /// Size of the backing image in bytes (RGBA8)
    #[must_use]
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height()) * 4
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    #[must_use]
    pub fn sequence(&self, name: &str) -> Option<Arc<Sequence>> {
        self.sequences.get(name).cloned()
    }

    /// All sequences, in no particular order
    pub fn sequences(&self) -> impl Iterator<Item = &Arc<Sequence>> {
        self.sequences.values()
    }
}

/// Errors that can occur while building an atlas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    /// Atlas data could not be parsed
    Parse(String),
    /// The atlas ended up with no cells
    NoCells(String),
    /// Sheet layout has zero-sized cells
    InvalidLayout(String),
    /// A cell rectangle extends past the image
    CellOutOfBounds { atlas: String, index: usize },
    /// A sequence has no cells
    EmptySequence(String),
    /// A sequence references a cell index the atlas does not have
    UnknownCell { sequence: String, cell: usize },
}

impl std::fmt::Display for AtlasError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(e) => write!(f, "Atlas parse error: {e}"),
            Self::NoCells(name) => write!(f, "Atlas '{name}' has no cells"),
            Self::InvalidLayout(name) => write!(f, "Atlas '{name}' has a zero-sized cell layout"),
            Self::CellOutOfBounds { atlas, index } => {
                write!(f, "Cell {index} of atlas '{atlas}' lies outside the image")
            }
            Self::EmptySequence(name) => write!(f, "Sequence '{name}' has no cells"),
            Self::UnknownCell { sequence, cell } => {
                write!(f, "Sequence '{sequence}' references missing cell {cell}")
            }
        }
    }
}

impl std::error::Error for AtlasError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: u32, h: u32) -> RgbaImage {
        RgbaImage::new(w, h)
    }

    #[test]
    fn test_single_image() {
        let atlas = Atlas::single_image("bg", image(32, 16)).unwrap();

        assert_eq!(atlas.kind(), AtlasKind::SingleImage);
        assert_eq!(atlas.cells(), &[Cell::new(0, 0, 32, 16)]);
        assert_eq!(atlas.byte_size(), 32 * 16 * 4);
        assert!(Atlas::single_image("empty", image(0, 0)).is_err());
    }

    #[test]
    fn test_has_pixels_after_image_emptied() {
        let mut atlas = Atlas::sprite_sheet("hero", image(8, 8), SheetLayout::new(4, 4)).unwrap();
        assert!(atlas.has_pixels());

        *atlas.image_mut() = image(0, 0);
        assert!(!atlas.has_pixels());
        assert_eq!(atlas.byte_size(), 0);
    }

    #[test]
    fn test_sprite_sheet_grid() {
        let atlas = Atlas::sprite_sheet("hero", image(64, 32), SheetLayout::new(16, 16)).unwrap();

        assert_eq!(atlas.cells().len(), 8);
        // Row-major
        assert_eq!((atlas.cells()[3].x, atlas.cells()[3].y), (48, 0));
        assert_eq!((atlas.cells()[4].x, atlas.cells()[4].y), (0, 16));
    }

    #[test]
    fn test_sprite_sheet_offset_and_spacing() {
        let layout = SheetLayout::new(10, 10)
            .with_offset(2, 2)
            .with_spacing(1, 1)
            .with_num_cells(3);
        let atlas = Atlas::sprite_sheet("tiles", image(35, 13), layout).unwrap();

        let xs: Vec<u32> = atlas.cells().iter().map(|c| c.x).collect();
        assert_eq!(xs, vec![2, 13, 24]);
        assert!(atlas.cells().iter().all(|c| c.y == 2));
    }

    #[test]
    fn test_sprite_sheet_rejects_bad_layout() {
        assert!(matches!(
            Atlas::sprite_sheet("zero", image(16, 16), SheetLayout::new(0, 16)),
            Err(AtlasError::InvalidLayout(_))
        ));
        assert!(matches!(
            Atlas::sprite_sheet("small", image(8, 8), SheetLayout::new(16, 16)),
            Err(AtlasError::NoCells(_))
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"{
            "cells": [
                {"x": 0, "y": 0, "w": 8, "h": 8, "hitboxes": [{"x": 1, "y": 1, "w": 6, "h": 6}]},
                {"x": 8, "y": 0, "w": 8, "h": 8}
            ],
            "sequences": [{"name": "blink", "cells": [0, 1, 0], "speed": 0.2, "loop": true}]
        }"#;
        let atlas = Atlas::from_json("ui", image(16, 8), json).unwrap();

        assert_eq!(atlas.kind(), AtlasKind::TextureAtlas);
        assert_eq!(atlas.cells()[0].hitboxes[0].w, 6);
        assert_eq!(atlas.cells()[1].hitboxes, vec![Hitbox { x: 0, y: 0, w: 8, h: 8 }]);

        let blink = atlas.sequence("blink").unwrap();
        assert_eq!(blink.cells, vec![0, 1, 0]);
        assert!(blink.looping);
    }

    #[test]
    fn test_from_json_rejects_out_of_bounds_and_bad_sequence() {
        let oob = r#"{"cells": [{"x": 4, "y": 0, "w": 8, "h": 8}]}"#;
        assert!(matches!(
            Atlas::from_json("a", image(8, 8), oob),
            Err(AtlasError::CellOutOfBounds { index: 0, .. })
        ));

        let bad_seq = r#"{"cells": [{"x": 0, "y": 0, "w": 8, "h": 8}],
                          "sequences": [{"name": "s", "cells": [1]}]}"#;
        assert!(matches!(
            Atlas::from_json("b", image(8, 8), bad_seq),
            Err(AtlasError::UnknownCell { cell: 1, .. })
        ));

        assert!(matches!(
            Atlas::from_json("c", image(8, 8), "not json"),
            Err(AtlasError::Parse(_))
        ));
    }
}
