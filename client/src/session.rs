use pixelboard_shared::{shade_color, Cell, PaintColor, Rgba, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE};

pub const DEFAULT_CELL_SIZE: u32 = 20;
pub const MAX_CELL_SIZE: u32 = 64;
pub const MAX_SHADE: u8 = 100;
pub const MIN_ZOOM: f64 = 0.25;
pub const MAX_ZOOM: f64 = 8.0;
pub const ZOOM_STEP: f64 = 1.25;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    Draw,
    Erase,
    PickColor,
}

/// Tool selection of one editor. Owned by the UI side and handed to the sync
/// client per operation; peers never see it.
#[derive(Clone, Debug, PartialEq)]
pub struct EditorSession {
    pub color: Rgba,
    pub tool: Tool,
    brush_size: u32,
    shade: u8,
    zoom: f64,
    cell_size: u32,
}

impl Default for EditorSession {
    fn default() -> Self {
        Self {
            color: Rgba::BLACK,
            tool: Tool::Draw,
            brush_size: MIN_BRUSH_SIZE,
            shade: 0,
            zoom: 1.0,
            cell_size: DEFAULT_CELL_SIZE,
        }
    }
}

impl EditorSession {
    pub fn with_cell_size(cell_size: u32) -> Self {
        Self {
            cell_size: cell_size.clamp(1, MAX_CELL_SIZE),
            ..Self::default()
        }
    }

    pub fn brush_size(&self) -> u32 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.brush_size = size.clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);
    }

    pub fn increase_brush(&mut self) {
        self.set_brush_size(self.brush_size + 1);
    }

    pub fn decrease_brush(&mut self) {
        self.set_brush_size(self.brush_size.saturating_sub(1));
    }

    pub fn shade(&self) -> u8 {
        self.shade
    }

    pub fn set_shade(&mut self, amount: u8) {
        self.shade = amount.min(MAX_SHADE);
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom * ZOOM_STEP);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom / ZOOM_STEP);
    }

    pub fn cell_size(&self) -> u32 {
        self.cell_size
    }

    pub fn toggle_pipette(&mut self) {
        self.tool = if self.tool == Tool::PickColor {
            Tool::Draw
        } else {
            Tool::PickColor
        };
    }

    pub fn toggle_eraser(&mut self) {
        self.tool = if self.tool == Tool::Erase {
            Tool::Draw
        } else {
            Tool::Erase
        };
    }

    /// Adopts a color read off the canvas and leaves pipette mode.
    pub fn pick(&mut self, color: Rgba) {
        self.color = color;
        self.tool = Tool::Draw;
    }

    /// Color a draw operation should put down. An explicit override skips the
    /// shade; the eraser always wins.
    pub fn paint_color(&self, override_color: Option<Rgba>) -> PaintColor {
        if self.tool == Tool::Erase {
            return PaintColor::Erase;
        }
        match override_color {
            Some(color) => color.into(),
            None => shade_color(self.color, self.shade).into(),
        }
    }

    /// Cell under a pointer position given in canvas pixels.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<Cell> {
        if !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
            return None;
        }
        let scale = f64::from(self.cell_size) * self.zoom;
        let column = (x / scale).floor();
        let row = (y / scale).floor();
        if column > f64::from(i32::MAX) || row > f64::from(i32::MAX) {
            return None;
        }
        Some(Cell::new(column as i32, row as i32))
    }
}
