use crate::style::{Layer, Rgba};

/// Anything the render pipeline can draw onto.
///
/// Coordinates are surface units with the origin at the top-left corner.
pub trait Surface {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba);

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba);

    /// Ring of `width` centred on `radius`.
    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: Rgba);

    /// Text whose top-left corner sits at `anchor`.
    fn draw_text(&mut self, anchor: (f32, f32), text: &str, color: Rgba);

    /// Called before each layer is drawn.
    fn begin_layer(&mut self, _layer: Layer) {}
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Clear(Rgba),
    BeginLayer(Layer),
    FillCircle {
        center: (f32, f32),
        radius: f32,
        color: Rgba,
    },
    StrokeCircle {
        center: (f32, f32),
        radius: f32,
        width: f32,
        color: Rgba,
    },
    Text {
        anchor: (f32, f32),
        text: String,
        color: Rgba,
    },
}

/// Surface that records draw calls instead of rasterizing them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DrawList {
    size: (u32, u32),
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Layers in the order they were started.
    pub fn layers(&self) -> Vec<Layer> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::BeginLayer(layer) => Some(*layer),
                _ => None,
            })
            .collect()
    }

    /// Commands issued while `layer` was active.
    pub fn layer_commands(&self, layer: Layer) -> Vec<&DrawCommand> {
        let mut active = None;
        let mut out = Vec::new();
        for command in &self.commands {
            match command {
                DrawCommand::BeginLayer(next) => active = Some(*next),
                DrawCommand::Clear(_) => active = None,
                other if active == Some(layer) => out.push(other),
                _ => {}
            }
        }
        out
    }
}

impl Surface for DrawList {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn clear(&mut self, color: Rgba) {
        // A clear invalidates everything drawn before it.
        self.commands.clear();
        self.commands.push(DrawCommand::Clear(color));
    }

    fn fill_circle(&mut self, center: (f32, f32), radius: f32, color: Rgba) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
        });
    }

    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, width: f32, color: Rgba) {
        self.commands.push(DrawCommand::StrokeCircle {
            center,
            radius,
            width,
            color,
        });
    }

    fn draw_text(&mut self, anchor: (f32, f32), text: &str, color: Rgba) {
        self.commands.push(DrawCommand::Text {
            anchor,
            text: text.to_owned(),
            color,
        });
    }

    fn begin_layer(&mut self, layer: Layer) {
        self.commands.push(DrawCommand::BeginLayer(layer));
    }
}
