use crate::render::UiFrame;
use winit::event::WindowEvent;
use winit::window::Window;

/// Tessellated egui output for one frame.
pub struct EguiFrameOutput {
    pub clipped_primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

impl EguiFrameOutput {
    /// What the render pass needs, cleared to `clear` underneath the UI.
    pub fn ui_frame(&self, clear: [u8; 3]) -> UiFrame<'_> {
        UiFrame {
            primitives: &self.clipped_primitives,
            textures_delta: &self.textures_delta,
            pixels_per_point: self.pixels_per_point,
            clear,
        }
    }
}

/// egui context plus its winit input bridge for the main window.
pub struct EguiHost {
    context: egui::Context,
    winit_state: egui_winit::State,
}

impl EguiHost {
    pub fn new(window: &Window) -> Self {
        let context = egui::Context::default();
        let winit_state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );

        Self {
            context,
            winit_state,
        }
    }

    pub fn context(&self) -> &egui::Context {
        &self.context
    }

    /// Returns true when egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.winit_state.on_window_event(window, event).consumed
    }

    pub fn run_ui<F>(&mut self, window: &Window, run_ui: F) -> EguiFrameOutput
    where
        F: FnMut(&egui::Context),
    {
        let raw_input = self.winit_state.take_egui_input(window);
        let full_output = self.context.run(raw_input, run_ui);
        self.winit_state
            .handle_platform_output(window, full_output.platform_output);
        frame_output(
            &self.context,
            full_output.shapes,
            full_output.textures_delta,
            full_output.pixels_per_point,
        )
    }
}

fn frame_output(
    context: &egui::Context,
    shapes: Vec<egui::epaint::ClippedShape>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
) -> EguiFrameOutput {
    EguiFrameOutput {
        clipped_primitives: context.tessellate(shapes, pixels_per_point),
        textures_delta,
        pixels_per_point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_frame_carries_primitives_and_scale() {
        let context = egui::Context::default();
        let full_output = context.run(egui::RawInput::default(), |ctx| {
            egui::CentralPanel::default().show(ctx, |ui| {
                ui.label("#.:");
            });
        });
        let frame = frame_output(
            &context,
            full_output.shapes,
            full_output.textures_delta,
            full_output.pixels_per_point,
        );

        assert!(!frame.clipped_primitives.is_empty());
        assert!(frame.pixels_per_point > 0.0);

        let ui_frame = frame.ui_frame([255, 255, 255]);
        assert_eq!(ui_frame.primitives.len(), frame.clipped_primitives.len());
        assert_eq!(ui_frame.pixels_per_point, frame.pixels_per_point);
        assert_eq!(ui_frame.clear, [255, 255, 255]);
    }
}
