mod egui_host;
mod input;
mod timing;

use crate::assets::{AssetSource, GltfDecoder};
use crate::config::ViewerConfig;
use crate::export::{self, DEFAULT_IMAGE_FILE, DEFAULT_TEXT_FILE};
use crate::render::stylized::{DisplayHost, SurfaceContainer};
use crate::render::{CapturedImage, RenderContext};
use crate::ui::{UiCommand, UiOutput, UiState};
use crate::viewer::{Notice, ViewerController};
use egui_host::EguiHost;
use input::InputAction;
use timing::FrameTiming;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::error::EventLoopError;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "ASCII Viewer";

pub struct App {
    config: ViewerConfig,
    initial_model: Option<String>,
    window: Option<Arc<Window>>,
    render: Option<RenderContext>,
    egui: Option<EguiHost>,
    viewer: Option<ViewerController>,
    ui: UiState,
    timing: FrameTiming,
    capture_requested: bool,
    target_frame_duration: Duration,
    next_frame_time: Instant,
}

impl App {
    fn new(config: ViewerConfig, initial_model: Option<String>) -> Self {
        Self {
            ui: UiState::new(&config.palette),
            config,
            initial_model,
            window: None,
            render: None,
            egui: None,
            viewer: None,
            timing: FrameTiming::new(WINDOW_TITLE.to_string()),
            capture_requested: false,
            target_frame_duration: Duration::from_millis(16),
            next_frame_time: Instant::now(),
        }
    }

    fn init_viewer(&mut self, window: &Arc<Window>) -> Result<(), String> {
        let render = RenderContext::new(window.clone()).map_err(|err| err.to_string())?;
        let (width, height) = render.size();
        let host = DisplayHost::new(Some(SurfaceContainer::new("viewport")));
        let mut viewer =
            ViewerController::new(&self.config, Arc::new(GltfDecoder), host, width, height)
                .map_err(|err| err.to_string())?;
        if let Some(model) = self.initial_model.take() {
            viewer.load_asset(AssetSource::Url(model));
        }

        self.egui = Some(EguiHost::new(window));
        self.render = Some(render);
        self.viewer = Some(viewer);
        Ok(())
    }

    fn update_target_frame_duration(&mut self, window: &Window) {
        let mut target = Duration::from_millis(16);
        if let Some(monitor) = window.current_monitor() {
            if let Some(millihz) = monitor.refresh_rate_millihertz() {
                let hz = millihz as f32 / 1000.0;
                if hz > 1.0 {
                    target = Duration::from_secs_f32(1.0 / hz);
                }
            }
        }
        self.target_frame_duration = target;
        self.next_frame_time = Instant::now() + self.target_frame_duration;
    }

    /// One frame: tick the viewer, build the UI, apply its commands, present.
    fn render(&mut self) {
        let frame_start = Instant::now();
        let (Some(window), Some(render), Some(egui), Some(viewer)) = (
            self.window.clone(),
            self.render.as_mut(),
            self.egui.as_mut(),
            self.viewer.as_mut(),
        ) else {
            return;
        };

        let dt = self.timing.update(Some(&window), frame_start);
        viewer.tick(dt);
        for notice in viewer.take_notices() {
            self.ui.set_status(notice);
        }

        let ui = &mut self.ui;
        let mut ui_output = UiOutput::default();
        let frame = egui.run_ui(&window, |ctx| {
            ui_output = ui.show(ctx, viewer);
        });

        if ui_output.viewport_px != viewer.renderer().viewport() {
            viewer.resize(ui_output.viewport_px.0, ui_output.viewport_px.1);
        }
        if ui_output.orbit != egui::Vec2::ZERO {
            viewer.orbit(ui_output.orbit.x, ui_output.orbit.y);
        }
        if ui_output.dolly != 0.0 {
            viewer.dolly(ui_output.dolly);
        }
        let mut capture = std::mem::take(&mut self.capture_requested);
        for command in ui_output.commands {
            capture |= apply_command(command, viewer, ui, egui.context());
        }

        let clear = viewer
            .renderer()
            .surface()
            .map(|surface| surface.background)
            .unwrap_or([0, 0, 0]);
        match render.present(&frame.ui_frame(clear), capture) {
            Ok(Some(image)) => save_screenshot(&image, ui),
            Ok(None) => {}
            Err(err) => log::warn!("Frame failed: {}", err),
        }

        self.timing
            .set_render_ms(frame_start.elapsed().as_secs_f32() * 1000.0);
    }

    fn handle_action(&mut self, action: InputAction) {
        let command = match action {
            InputAction::None => return,
            InputAction::ToggleRotation => UiCommand::ToggleRotation,
            InputAction::ToggleTheme => UiCommand::ToggleTheme,
            InputAction::ResetPalette => UiCommand::ResetPalette,
            InputAction::OpenModel => UiCommand::OpenModel,
            InputAction::ResetView => UiCommand::ResetView,
            InputAction::Screenshot => UiCommand::Screenshot,
        };
        if let (Some(viewer), Some(egui)) = (self.viewer.as_mut(), self.egui.as_ref()) {
            self.capture_requested |= apply_command(command, viewer, &mut self.ui, egui.context());
        }
    }
}

/// Applies one UI command. Returns true when a screenshot is wanted.
fn apply_command(
    command: UiCommand,
    viewer: &mut ViewerController,
    ui: &mut UiState,
    ctx: &egui::Context,
) -> bool {
    match command {
        UiCommand::OpenModel => {
            if let Some(path) = rfd::FileDialog::new()
                .add_filter("glTF", &["gltf", "glb"])
                .pick_file()
            {
                viewer.load_asset(AssetSource::Url(path.display().to_string()));
            }
        }
        UiCommand::ToggleRotation => {
            let enabled = viewer.toggle_rotation();
            log::info!("Rotation {}", if enabled { "on" } else { "off" });
        }
        UiCommand::ApplyPalette(palette) => match viewer.set_palette(&palette) {
            Ok(()) => ui.set_palette_input(&palette),
            Err(err) => {
                log::warn!("Palette rejected: {}", err);
                ui.set_status(Notice::error(format!("Palette rejected: {err}")));
            }
        },
        UiCommand::ResetPalette => match viewer.reset_palette() {
            Ok(()) => ui.set_palette_input(&viewer.config().palette.as_string()),
            Err(err) => log::warn!("Palette reset failed: {}", err),
        },
        UiCommand::ToggleTheme => match viewer.toggle_theme() {
            Ok(theme) => log::info!("Theme set to {:?}", theme),
            Err(err) => log::warn!("Theme change failed: {}", err),
        },
        UiCommand::ResetView => viewer.reset_view(),
        UiCommand::Screenshot => return true,
        UiCommand::SaveText => {
            if let Some(path) = rfd::FileDialog::new()
                .set_file_name(DEFAULT_TEXT_FILE)
                .add_filter("Text", &["txt"])
                .save_file()
            {
                let notice = match export::save_text(&path, &viewer.ascii_text()) {
                    Ok(()) => Notice::info(format!("Saved {}", path.display())),
                    Err(err) => {
                        log::warn!("{}", err);
                        Notice::error(err.to_string())
                    }
                };
                ui.set_status(notice);
            }
        }
        UiCommand::CopyText => {
            ctx.copy_text(viewer.ascii_text());
            ui.set_status(Notice::info("ASCII copied to clipboard"));
        }
    }
    false
}

fn save_screenshot(image: &CapturedImage, ui: &mut UiState) {
    let Some(path) = rfd::FileDialog::new()
        .set_file_name(DEFAULT_IMAGE_FILE)
        .add_filter("Image", &["png", "jpg", "jpeg"])
        .save_file()
    else {
        return;
    };
    let notice = match export::save_capture(&path, image.width, image.height, &image.rgba) {
        Ok(()) => Notice::info(format!("Saved {}", display_name(&path))),
        Err(err) => {
            log::warn!("{}", err);
            Notice::error(err.to_string())
        }
    };
    ui.set_status(notice);
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(PhysicalSize::new(1280u32, 720u32))
            .with_resizable(true);

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(err) => {
                log::error!("Failed to create window: {}", err);
                event_loop.exit();
                return;
            }
        };

        if let Err(err) = self.init_viewer(&window) {
            log::error!("Failed to start viewer: {}", err);
            event_loop.exit();
            return;
        }
        self.update_target_frame_duration(&window);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match (&self.window, self.egui.as_mut()) {
            (Some(window), Some(egui)) => egui.on_window_event(window, &event),
            _ => false,
        };

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    event_loop.exit();
                    return;
                }
                let wants_keyboard = self
                    .egui
                    .as_ref()
                    .is_some_and(|egui| egui.context().wants_keyboard_input());
                if event.state == ElementState::Pressed && !event.repeat && !consumed && !wants_keyboard {
                    self.handle_action(input::map_key(event.physical_key));
                }
            }
            WindowEvent::Resized(new_size) => {
                if let Some(render) = &mut self.render {
                    render.resize(new_size);
                }
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::Moved(_) => {
                if let Some(window) = self.window.clone() {
                    self.update_target_frame_duration(&window);
                }
            }
            WindowEvent::DroppedFile(path) => {
                if let Some(viewer) = &mut self.viewer {
                    viewer.load_asset(AssetSource::Url(path.display().to_string()));
                }
            }
            WindowEvent::RedrawRequested => {
                self.render();
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let now = Instant::now();
        if now >= self.next_frame_time {
            if let Some(window) = &self.window {
                window.request_redraw();
            }
            self.next_frame_time = now + self.target_frame_duration;
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.next_frame_time));
    }
}

pub fn run(config: ViewerConfig, initial_model: Option<String>) -> Result<(), EventLoopError> {
    log::info!("{} starting", WINDOW_TITLE);
    log::info!("   R rotate, T theme, P reset palette, O open, F12 screenshot, Esc quit");

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, initial_model);
    event_loop.run_app(&mut app)?;

    log::info!("Goodbye");
    Ok(())
}
