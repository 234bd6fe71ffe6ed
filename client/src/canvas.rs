use pixelboard_shared::{
    check_dimensions, decode_png, encode_png, sanitize_size, Cell, PaintColor, Rgba, Snapshot,
    SnapshotError,
};
use thiserror::Error;

pub const MIN_GRID_SIZE: u32 = 4;
pub const MAX_GRID_SIZE: u32 = 2000;
pub const DEFAULT_GRID_SIZE: u32 = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CanvasError {
    #[error("Width and height must be between 4 and 2000 (got {width}x{height})")]
    InvalidDimensions { width: u32, height: u32 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Grid {
    width: u32,
    height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        let valid = |value: u32| (MIN_GRID_SIZE..=MAX_GRID_SIZE).contains(&value);
        if !(valid(width) && valid(height)) {
            return Err(CanvasError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Unsigned coordinates of `cell` if it lies on the grid.
    pub fn locate(&self, cell: Cell) -> Option<(u32, u32)> {
        let x = u32::try_from(cell.x).ok()?;
        let y = u32::try_from(cell.y).ok()?;
        (x < self.width && y < self.height).then_some((x, y))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            width: DEFAULT_GRID_SIZE,
            height: DEFAULT_GRID_SIZE,
        }
    }
}

/// One straight-alpha RGBA pixel per cell, row-major.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn blank(grid: Grid) -> Self {
        Self {
            width: grid.width,
            height: grid.height,
            pixels: vec![0; grid.width as usize * grid.height as usize * 4],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> Rgba {
        let index = self.index(x, y);
        Rgba::from_bytes([
            self.pixels[index],
            self.pixels[index + 1],
            self.pixels[index + 2],
            self.pixels[index + 3],
        ])
    }

    pub fn set(&mut self, x: u32, y: u32, color: Rgba) {
        let index = self.index(x, y);
        self.pixels[index..index + 4].copy_from_slice(&color.to_bytes());
    }

    fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }
}

impl std::fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Bitmap({}x{})", self.width, self.height)
    }
}

/// The authoritative canvas of one editor: the bitmap plus its undo and redo
/// stacks. Mutations apply the same way whether they came from this editor or
/// from a peer.
#[derive(Debug)]
pub struct CanvasStore {
    grid: Grid,
    bitmap: Bitmap,
    undo_stack: Vec<Bitmap>,
    redo_stack: Vec<Bitmap>,
}

impl Default for CanvasStore {
    fn default() -> Self {
        Self::new(Grid::default())
    }
}

impl CanvasStore {
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            bitmap: Bitmap::blank(grid),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn bitmap(&self) -> &Bitmap {
        &self.bitmap
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn pixel(&self, cell: Cell) -> Option<Rgba> {
        let (x, y) = self.grid.locate(cell)?;
        Some(self.bitmap.get(x, y))
    }

    /// Fills the `size x size` block whose top-left corner is `cell`. Parts of
    /// the block that fall off the grid are skipped. Does not touch history.
    pub fn paint(&mut self, cell: Cell, color: PaintColor, size: u32) {
        let size = sanitize_size(size);
        let color = color.to_rgba();
        for dx in 0..size {
            for dy in 0..size {
                let Some(target) = cell.offset(dx, dy) else {
                    continue;
                };
                if let Some((x, y)) = self.grid.locate(target) {
                    self.bitmap.set(x, y, color);
                }
            }
        }
    }

    /// Records the current bitmap as an undo point. Call once per stroke.
    pub fn begin_stroke(&mut self) {
        self.undo_stack.push(self.bitmap.clone());
        self.redo_stack.clear();
    }

    pub fn clear(&mut self) {
        self.begin_stroke();
        self.bitmap.clear();
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.bitmap, previous);
        self.redo_stack.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.bitmap, next);
        self.undo_stack.push(current);
        true
    }

    /// Switches to a blank canvas of the new size and drops all history.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        let grid = Grid::new(width, height)?;
        *self = Self::new(grid);
        Ok(())
    }

    /// PNG of the bitmap at one pixel per cell.
    pub fn export_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        encode_png(self.bitmap.width, self.bitmap.height, self.bitmap.as_bytes())
    }

    /// PNG of the bitmap with every cell drawn as a `cell_size` square, for
    /// saving to disk.
    pub fn export_image(&self, cell_size: u32) -> Result<Snapshot, SnapshotError> {
        let scale = cell_size.max(1);
        if scale == 1 {
            return self.export_snapshot();
        }
        let scaled_width = u64::from(self.bitmap.width) * u64::from(scale);
        let scaled_height = u64::from(self.bitmap.height) * u64::from(scale);
        check_dimensions(scaled_width, scaled_height)?;

        let scale = scale as usize;
        let width = self.bitmap.width as usize;
        let row_bytes = width * scale * 4;
        let mut pixels = Vec::with_capacity(row_bytes * self.bitmap.height as usize * scale);
        for row in self.bitmap.as_bytes().chunks_exact(width * 4) {
            let scaled_row = row
                .chunks_exact(4)
                .flat_map(|px| std::iter::repeat(px).take(scale).flatten().copied())
                .collect::<Vec<_>>();
            for _ in 0..scale {
                pixels.extend_from_slice(&scaled_row);
            }
        }
        encode_png(scaled_width as u32, scaled_height as u32, &pixels)
    }

    /// Replaces the bitmap with a decoded snapshot. Snapshots at a whole
    /// multiple of the grid size are sampled one pixel per block; any other
    /// size is copied over the overlapping region. History is left alone.
    pub fn load_snapshot(&mut self, snapshot: &Snapshot) -> Result<(), SnapshotError> {
        let image = decode_png(snapshot)?;
        let mut bitmap = Bitmap::blank(self.grid);
        let (width, height) = (self.grid.width, self.grid.height);
        let scale = if image.width % width == 0
            && image.height % height == 0
            && image.width / width == image.height / height
        {
            image.width / width
        } else {
            0
        };
        if scale > 0 {
            for y in 0..height {
                for x in 0..width {
                    let px = image.pixel(x * scale, y * scale);
                    bitmap.set(x, y, Rgba::from_bytes(px));
                }
            }
        } else {
            for y in 0..height.min(image.height) {
                for x in 0..width.min(image.width) {
                    bitmap.set(x, y, Rgba::from_bytes(image.pixel(x, y)));
                }
            }
        }
        self.bitmap = bitmap;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::opaque(255, 0, 0);
    const BLUE: Rgba = Rgba::opaque(0, 0, 255);

    fn store(width: u32, height: u32) -> CanvasStore {
        CanvasStore::new(Grid::new(width, height).unwrap())
    }

    fn painted_cells(store: &CanvasStore) -> usize {
        store
            .bitmap()
            .as_bytes()
            .chunks_exact(4)
            .filter(|px| px[3] != 0)
            .count()
    }

    #[test]
    fn paint_then_query() {
        let mut canvas = store(8, 8);
        canvas.paint(Cell::new(2, 3), PaintColor::Color(RED), 1);
        assert_eq!(canvas.pixel(Cell::new(2, 3)), Some(RED));
        assert_eq!(canvas.pixel(Cell::new(3, 3)), Some(Rgba::TRANSPARENT));
        assert_eq!(painted_cells(&canvas), 1);
    }

    #[test]
    fn brush_fills_square_block() {
        let mut canvas = store(8, 8);
        canvas.paint(Cell::new(1, 1), PaintColor::Color(BLUE), 3);
        assert_eq!(painted_cells(&canvas), 9);
        assert_eq!(canvas.pixel(Cell::new(3, 3)), Some(BLUE));
        assert_eq!(canvas.pixel(Cell::new(4, 1)), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn paint_clips_at_edges() {
        let mut canvas = store(4, 4);
        canvas.paint(Cell::new(3, 2), PaintColor::Color(RED), 4);
        assert_eq!(painted_cells(&canvas), 2);
        assert_eq!(canvas.pixel(Cell::new(3, 3)), Some(RED));

        canvas.paint(Cell::new(-1, -1), PaintColor::Color(BLUE), 2);
        assert_eq!(canvas.pixel(Cell::new(0, 0)), Some(BLUE));
        assert_eq!(painted_cells(&canvas), 3);

        canvas.paint(Cell::new(100, 100), PaintColor::Color(BLUE), 10);
        assert_eq!(painted_cells(&canvas), 3);
    }

    #[test]
    fn oversized_brush_is_clamped() {
        let mut canvas = store(40, 40);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1000);
        assert_eq!(painted_cells(&canvas), 100);
    }

    #[test]
    fn erase_makes_cells_transparent() {
        let mut canvas = store(4, 4);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 2);
        canvas.paint(Cell::new(0, 0), PaintColor::Erase, 1);
        assert_eq!(canvas.pixel(Cell::new(0, 0)), Some(Rgba::TRANSPARENT));
        assert_eq!(painted_cells(&canvas), 3);
    }

    #[test]
    fn paint_does_not_push_history() {
        let mut canvas = store(4, 4);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1);
        assert_eq!(canvas.undo_depth(), 0);
        assert!(!canvas.undo());
    }

    #[test]
    fn stroke_undoes_atomically() {
        let mut canvas = store(8, 8);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(BLUE), 1);
        let before = canvas.bitmap().clone();

        canvas.begin_stroke();
        for x in 0..5 {
            canvas.paint(Cell::new(x, 4), PaintColor::Color(RED), 1);
        }
        let after = canvas.bitmap().clone();

        assert!(canvas.undo());
        assert_eq!(canvas.bitmap(), &before);
        assert!(canvas.redo());
        assert_eq!(canvas.bitmap(), &after);
    }

    #[test]
    fn empty_stacks_are_no_ops() {
        let mut canvas = store(4, 4);
        let before = canvas.bitmap().clone();
        assert!(!canvas.undo());
        assert!(!canvas.redo());
        assert_eq!(canvas.bitmap(), &before);
    }

    #[test]
    fn new_stroke_truncates_redo() {
        let mut canvas = store(4, 4);
        canvas.begin_stroke();
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1);
        assert!(canvas.undo());
        assert_eq!(canvas.redo_depth(), 1);

        canvas.begin_stroke();
        assert_eq!(canvas.redo_depth(), 0);
        assert!(!canvas.redo());
    }

    #[test]
    fn clear_then_undo_restores() {
        let mut canvas = store(6, 6);
        canvas.begin_stroke();
        canvas.paint(Cell::new(2, 2), PaintColor::Color(RED), 3);
        let before = canvas.bitmap().clone();

        canvas.clear();
        assert_eq!(painted_cells(&canvas), 0);
        assert!(canvas.undo());
        assert_eq!(canvas.bitmap(), &before);
    }

    #[test]
    fn resize_validates_bounds() {
        let mut canvas = store(8, 8);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1);
        let before = canvas.bitmap().clone();

        assert_eq!(
            canvas.resize(3, 10),
            Err(CanvasError::InvalidDimensions {
                width: 3,
                height: 10
            })
        );
        assert!(canvas.resize(10, 2001).is_err());
        assert_eq!(canvas.bitmap(), &before);
        assert_eq!(canvas.grid(), Grid::new(8, 8).unwrap());
    }

    #[test]
    fn resize_gives_blank_canvas_without_history() {
        let mut canvas = store(8, 8);
        canvas.begin_stroke();
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1);

        canvas.resize(4, 4).unwrap();
        assert_eq!((canvas.bitmap().width(), canvas.bitmap().height()), (4, 4));
        assert_eq!(painted_cells(&canvas), 0);
        assert_eq!(canvas.undo_depth(), 0);

        canvas.resize(2000, 2000).unwrap();
        assert_eq!(canvas.grid().width(), 2000);
        assert_eq!(canvas.bitmap().as_bytes().len(), 2000 * 2000 * 4);
        assert_eq!(painted_cells(&canvas), 0);
    }

    #[test]
    fn snapshot_round_trip_is_pixel_identical() {
        let mut source = store(6, 5);
        source.paint(Cell::new(1, 1), PaintColor::Color(RED), 2);
        source.paint(Cell::new(5, 4), PaintColor::Color(Rgba::new(1, 2, 3, 40)), 1);

        let mut target = store(6, 5);
        target.begin_stroke();
        target.paint(Cell::new(0, 0), PaintColor::Color(BLUE), 1);
        target.load_snapshot(&source.export_snapshot().unwrap()).unwrap();

        assert_eq!(target.bitmap(), source.bitmap());
        assert_eq!(target.undo_depth(), 1);
    }

    #[test]
    fn scaled_export_loads_back_by_sampling() {
        let mut source = store(4, 4);
        source.paint(Cell::new(3, 0), PaintColor::Color(RED), 1);
        let image = source.export_image(20).unwrap();
        let decoded = decode_png(&image).unwrap();
        assert_eq!((decoded.width, decoded.height), (80, 80));
        assert_eq!(decoded.pixel(79, 19), RED.to_bytes());
        assert_eq!(decoded.pixel(59, 0), [0, 0, 0, 0]);

        let mut target = store(4, 4);
        target.load_snapshot(&image).unwrap();
        assert_eq!(target.bitmap(), source.bitmap());
    }

    #[test]
    fn oversized_export_is_refused() {
        let source = store(4, 4);
        assert!(matches!(
            source.export_image(u32::MAX),
            Err(SnapshotError::TooLarge { .. })
        ));
        let large = store(2000, 2000);
        assert!(matches!(
            large.export_image(3),
            Err(SnapshotError::TooLarge {
                width: 6000,
                height: 6000
            })
        ));
    }

    #[test]
    fn mismatched_snapshot_copies_overlap() {
        let mut small = store(4, 4);
        small.paint(Cell::new(0, 0), PaintColor::Color(RED), 4);
        let mut large = store(6, 5);
        large.paint(Cell::new(5, 4), PaintColor::Color(BLUE), 1);

        large.load_snapshot(&small.export_snapshot().unwrap()).unwrap();
        assert_eq!(painted_cells(&large), 16);
        assert_eq!(large.pixel(Cell::new(3, 3)), Some(RED));
        assert_eq!(large.pixel(Cell::new(5, 4)), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn bad_snapshot_leaves_bitmap_untouched() {
        let mut canvas = store(4, 4);
        canvas.paint(Cell::new(0, 0), PaintColor::Color(RED), 1);
        let before = canvas.bitmap().clone();
        let mut bytes = canvas.export_snapshot().unwrap().into_bytes();
        bytes.truncate(30);
        let broken = Snapshot::from_png_bytes(bytes).unwrap();
        assert!(canvas.load_snapshot(&broken).is_err());
        assert_eq!(canvas.bitmap(), &before);
    }
}
