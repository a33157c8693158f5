use crate::render::ascii::CharGrid;
use crate::viewer::{Notice, NoticeKind, Theme, ViewerController};
use egui::text::LayoutJob;
use egui::{Color32, FontId, Sense, TextFormat, Vec2};

/// Monospace glyph advance as a fraction of the font size.
pub const CHAR_WIDTH_RATIO: f32 = 0.6;
/// Line box height as a fraction of the font size.
pub const LINE_HEIGHT_RATIO: f32 = 1.11;

/// The palette field edits everything after these two glyphs.
const PALETTE_PREFIX: &str = " .";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    OpenModel,
    ToggleRotation,
    ApplyPalette(String),
    ResetPalette,
    ToggleTheme,
    ResetView,
    Screenshot,
    SaveText,
    CopyText,
}

/// What one UI pass asks of the viewer.
#[derive(Debug, Clone, Default)]
pub struct UiOutput {
    pub commands: Vec<UiCommand>,
    /// Size of the ASCII panel in physical pixels.
    pub viewport_px: (u32, u32),
    /// Drag since the last frame, as a fraction of the panel height.
    pub orbit: Vec2,
    pub dolly: f32,
}

pub struct UiState {
    palette_input: String,
    status: Option<Notice>,
}

impl UiState {
    pub fn new(palette: &str) -> Self {
        Self {
            palette_input: input_from_palette(palette),
            status: None,
        }
    }

    pub fn set_status(&mut self, notice: Notice) {
        self.status = Some(notice);
    }

    pub fn status(&self) -> Option<&Notice> {
        self.status.as_ref()
    }

    pub fn set_palette_input(&mut self, palette: &str) {
        self.palette_input = input_from_palette(palette);
    }

    pub fn show(&mut self, ctx: &egui::Context, viewer: &ViewerController) -> UiOutput {
        let mut output = UiOutput::default();
        self.controls_panel(ctx, viewer, &mut output.commands);
        self.status_panel(ctx, viewer);

        let surface = viewer.renderer().surface();
        let (foreground, background) = surface
            .map(|surface| (surface.foreground, surface.background))
            .unwrap_or_else(|| viewer.theme().colors());
        let foreground = Color32::from_rgb(foreground[0], foreground[1], foreground[2]);
        let background = Color32::from_rgb(background[0], background[1], background[2]);

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE.fill(background))
            .show(ctx, |ui| {
                let rect = ui.max_rect();
                let response = ui.allocate_rect(rect, Sense::drag());
                let pixels_per_point = ctx.pixels_per_point();
                output.viewport_px = (
                    (rect.width() * pixels_per_point).round().max(1.0) as u32,
                    (rect.height() * pixels_per_point).round().max(1.0) as u32,
                );
                if response.dragged() {
                    output.orbit = response.drag_delta() / rect.height().max(1.0);
                }
                if response.hovered() {
                    output.dolly = ui.input(|input| input.smooth_scroll_delta.y) / 50.0;
                }
                if let Some(surface) = surface {
                    paint_grid(ui.painter(), rect, &surface.grid, foreground);
                }
            });
        output
    }

    fn controls_panel(
        &mut self,
        ctx: &egui::Context,
        viewer: &ViewerController,
        commands: &mut Vec<UiCommand>,
    ) {
        egui::SidePanel::left("controls")
            .resizable(false)
            .default_width(210.0)
            .show(ctx, |ui| {
                ui.heading("ASCII Viewer");
                ui.separator();

                if ui.button("Open model…").clicked() {
                    commands.push(UiCommand::OpenModel);
                }
                let mut rotate = viewer.rotation_enabled();
                if ui.checkbox(&mut rotate, "Rotate").changed() {
                    commands.push(UiCommand::ToggleRotation);
                }
                if ui.button("Reset view").clicked() {
                    commands.push(UiCommand::ResetView);
                }

                ui.separator();
                ui.label("Characters");
                let field = ui.text_edit_singleline(&mut self.palette_input);
                let submitted = field.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
                ui.horizontal(|ui| {
                    if ui.button("Update").clicked() || submitted {
                        commands.push(UiCommand::ApplyPalette(palette_from_input(&self.palette_input)));
                    }
                    if ui.button("Reset").clicked() {
                        commands.push(UiCommand::ResetPalette);
                    }
                });

                ui.separator();
                let theme_label = match viewer.theme() {
                    Theme::Dark => "Light mode",
                    Theme::Light => "Dark mode",
                };
                if ui.button(theme_label).clicked() {
                    commands.push(UiCommand::ToggleTheme);
                }

                ui.separator();
                if ui.button("Screenshot").clicked() {
                    commands.push(UiCommand::Screenshot);
                }
                if ui.button("Save ASCII").clicked() {
                    commands.push(UiCommand::SaveText);
                }
                if ui.button("Copy ASCII").clicked() {
                    commands.push(UiCommand::CopyText);
                }

                ui.separator();
                if let Some(asset) = viewer.asset() {
                    ui.label(format!("Model: {}", asset.name()));
                    ui.label(format!("Clips: {}", asset.clips().len()));
                }
                let (cols, rows) = viewer.renderer().grid_size();
                ui.label(format!("Grid: {cols} × {rows}"));
                let stats = viewer.stats();
                ui.label(format!(
                    "GPU: {} geometries, {} textures, {} materials",
                    stats.live_geometries, stats.live_textures, stats.live_materials
                ));
                if viewer.pending_loads() > 0 {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Loading…");
                    });
                }
            });
    }

    fn status_panel(&self, ctx: &egui::Context, viewer: &ViewerController) {
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| match &self.status {
            Some(notice) => {
                let color = match notice.kind {
                    NoticeKind::Error => ui.visuals().error_fg_color,
                    NoticeKind::Info => ui.visuals().text_color(),
                };
                ui.colored_label(color, &notice.message);
            }
            None if viewer.asset().is_none() => {
                ui.label("Open a glTF model or drop one onto the window.");
            }
            None => {
                ui.label("");
            }
        });
    }
}

/// Full palette for the text in the palette field.
pub fn palette_from_input(input: &str) -> String {
    format!("{PALETTE_PREFIX}{input}")
}

/// Palette field text for a full palette.
pub fn input_from_palette(palette: &str) -> String {
    palette
        .strip_prefix(PALETTE_PREFIX)
        .unwrap_or(palette)
        .to_string()
}

/// Font metrics that make a `cols × rows` grid fill a panel of `size` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellLayout {
    pub font_size: f32,
    pub letter_spacing: f32,
    pub line_height: f32,
}

pub fn cell_layout(size: Vec2, cols: u32, rows: u32) -> CellLayout {
    let cell_width = size.x / cols.max(1) as f32;
    let line_height = size.y / rows.max(1) as f32;
    let font_size = (line_height / LINE_HEIGHT_RATIO)
        .min(cell_width / CHAR_WIDTH_RATIO)
        .max(1.0);
    CellLayout {
        font_size,
        letter_spacing: (cell_width - font_size * CHAR_WIDTH_RATIO).max(0.0),
        line_height,
    }
}

fn paint_grid(painter: &egui::Painter, rect: egui::Rect, grid: &CharGrid, color: Color32) {
    let layout = cell_layout(rect.size(), grid.cols(), grid.rows());
    let mut job = LayoutJob::default();
    job.append(
        &grid.to_text(),
        0.0,
        TextFormat {
            font_id: FontId::monospace(layout.font_size),
            color,
            extra_letter_spacing: layout.letter_spacing,
            line_height: Some(layout.line_height),
            ..Default::default()
        },
    );
    let galley = painter.layout_job(job);
    let origin = rect.center() - galley.size() / 2.0;
    painter.galley(origin, galley, color);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ascii::DEFAULT_CHARSET;

    #[test]
    fn palette_field_edits_after_prefix() {
        assert_eq!(input_from_palette(DEFAULT_CHARSET), ":-+*=%@#");
        assert_eq!(palette_from_input(":-+*=%@#"), DEFAULT_CHARSET);
        assert_eq!(input_from_palette("abc"), "abc");
        assert_eq!(palette_from_input(""), " .");
    }

    #[test]
    fn cells_fill_the_panel() {
        let layout = cell_layout(Vec2::new(820.0, 410.0), 82, 41);
        assert_eq!(layout.line_height, 10.0);
        assert!((layout.font_size - 10.0 / LINE_HEIGHT_RATIO).abs() < 1e-4);
        let advance = layout.font_size * CHAR_WIDTH_RATIO + layout.letter_spacing;
        assert!((advance - 10.0).abs() < 1e-4);
    }

    #[test]
    fn narrow_cells_shrink_the_font() {
        let layout = cell_layout(Vec2::new(60.0, 100.0), 20, 5);
        assert!((layout.font_size - 5.0).abs() < 1e-4);
        assert!(layout.letter_spacing < 1e-4);
    }

    #[test]
    fn ui_state_starts_from_config_palette() {
        let state = UiState::new(DEFAULT_CHARSET);
        assert_eq!(state.palette_input, ":-+*=%@#");
        assert!(state.status().is_none());
    }
}
