//! The stylized renderer and the display surfaces it owns.

use crate::render::ascii::{grid_dimensions, stylize, CharGrid, StylizationConfig, StylizeError};
use crate::render::camera::PerspectiveCamera;
use crate::render::raster::Rasterizer;
use crate::render::resources::GpuResources;
use crate::scene::SceneView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(u64);

/// A visible character surface: the latest grid plus the colors it is drawn with.
#[derive(Debug, Clone)]
pub struct AsciiSurface {
    id: SurfaceId,
    pub foreground: [u8; 3],
    pub background: [u8; 3],
    pub grid: CharGrid,
}

impl AsciiSurface {
    pub fn id(&self) -> SurfaceId {
        self.id
    }
}

/// A named place on screen that holds attached surfaces.
#[derive(Debug, Clone)]
pub struct SurfaceContainer {
    name: String,
    surfaces: Vec<AsciiSurface>,
}

impl SurfaceContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            surfaces: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn attach(&mut self, surface: AsciiSurface) {
        self.surfaces.push(surface);
    }

    pub fn detach(&mut self, id: SurfaceId) -> Option<AsciiSurface> {
        let index = self.surfaces.iter().position(|surface| surface.id == id)?;
        Some(self.surfaces.remove(index))
    }

    pub fn surfaces(&self) -> &[AsciiSurface] {
        &self.surfaces
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&AsciiSurface> {
        self.surfaces.iter().find(|surface| surface.id == id)
    }

    fn surface_mut(&mut self, id: SurfaceId) -> Option<&mut AsciiSurface> {
        self.surfaces.iter_mut().find(|surface| surface.id == id)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }
}

/// The configured container, or the body fallback when it is missing.
#[derive(Debug, Clone)]
pub struct DisplayHost {
    container: Option<SurfaceContainer>,
    body: SurfaceContainer,
}

impl DisplayHost {
    pub fn new(container: Option<SurfaceContainer>) -> Self {
        if container.is_none() {
            log::error!("Display container is missing; attaching the ASCII surface to the body");
        }
        Self {
            container,
            body: SurfaceContainer::new("body"),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.container.is_none()
    }

    pub fn active(&self) -> &SurfaceContainer {
        self.container.as_ref().unwrap_or(&self.body)
    }

    fn active_mut(&mut self) -> &mut SurfaceContainer {
        self.container.as_mut().unwrap_or(&mut self.body)
    }
}

/// Base rasterizer plus character post-process. Every configuration change
/// rebuilds the surface from scratch.
pub struct StylizedRenderer {
    host: DisplayHost,
    rasterizer: Rasterizer,
    config: StylizationConfig,
    surface: Option<SurfaceId>,
    next_surface: u64,
    viewport: (u32, u32),
}

impl StylizedRenderer {
    pub fn new(
        host: DisplayHost,
        config: StylizationConfig,
        width: u32,
        height: u32,
    ) -> Result<Self, StylizeError> {
        config.validate()?;
        let mut renderer = Self {
            host,
            rasterizer: Rasterizer::new(1, 1),
            config: config.clone(),
            surface: None,
            next_surface: 0,
            viewport: (width.max(1), height.max(1)),
        };
        renderer.configure(config)?;
        Ok(renderer)
    }

    /// Replaces the surface with one built from `config`. On error the current
    /// surface stays in place.
    pub fn configure(&mut self, config: StylizationConfig) -> Result<(), StylizeError> {
        config.validate()?;

        if let Some(old) = self.surface.take() {
            self.host.active_mut().detach(old);
        }

        self.next_surface += 1;
        let id = SurfaceId(self.next_surface);
        self.host.active_mut().attach(AsciiSurface {
            id,
            foreground: config.foreground,
            background: config.background,
            grid: CharGrid::blank(1, 1),
        });
        self.surface = Some(id);
        self.config = config;
        log::debug!(
            "Stylized surface rebuilt: {} glyphs at resolution {}",
            self.config.palette.len(),
            self.config.resolution
        );

        let (width, height) = self.viewport;
        self.resize(width, height);
        Ok(())
    }

    /// Sizes the rasterizer and the surface grid for a viewport in pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
        let (cols, rows) = grid_dimensions(self.viewport.0, self.viewport.1, self.config.resolution);
        self.rasterizer.set_size(cols, rows);
        if let Some(surface) = self.surface.and_then(|id| self.host.active_mut().surface_mut(id)) {
            if (surface.grid.cols(), surface.grid.rows()) != (cols, rows) {
                surface.grid = CharGrid::blank(cols, rows);
            }
        }
    }

    pub fn render(
        &mut self,
        scene: &SceneView<'_>,
        camera: &PerspectiveCamera,
        resources: &GpuResources,
    ) {
        let Some(id) = self.surface else {
            return;
        };
        let (cols, rows) = self.grid_size();
        let frame = self.rasterizer.render(scene, camera, resources);
        let grid = stylize(frame, cols, rows, &self.config.palette, self.config.invert);
        if let Some(surface) = self.host.active_mut().surface_mut(id) {
            surface.grid = grid;
        }
    }

    pub fn config(&self) -> &StylizationConfig {
        &self.config
    }

    pub fn host(&self) -> &DisplayHost {
        &self.host
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn grid_size(&self) -> (u32, u32) {
        self.rasterizer.size()
    }

    pub fn surface(&self) -> Option<&AsciiSurface> {
        self.surface.and_then(|id| self.host.active().surface(id))
    }

    pub fn grid(&self) -> Option<&CharGrid> {
        self.surface().map(|surface| &surface.grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ascii::Palette;
    use crate::scene::Stage;

    fn renderer() -> StylizedRenderer {
        StylizedRenderer::new(
            DisplayHost::new(Some(SurfaceContainer::new("viewport"))),
            StylizationConfig::default(),
            400,
            200,
        )
        .unwrap()
    }

    #[test]
    fn container_holds_one_surface_after_reconfiguring() {
        let mut renderer = renderer();
        for palette in [" .#", " .:", "@"] {
            renderer
                .configure(StylizationConfig {
                    palette: Palette::new(palette).unwrap(),
                    ..StylizationConfig::default()
                })
                .unwrap();
            assert_eq!(renderer.host().active().len(), 1);
        }
        assert_eq!(renderer.config().palette.as_string(), "@");
    }

    #[test]
    fn invalid_config_keeps_current_surface() {
        let mut renderer = renderer();
        let before = renderer.surface().map(AsciiSurface::id);
        let result = renderer.configure(StylizationConfig {
            resolution: 2.0,
            ..StylizationConfig::default()
        });
        assert!(result.is_err());
        assert_eq!(renderer.surface().map(AsciiSurface::id), before);
        assert_eq!(renderer.host().active().len(), 1);
    }

    #[test]
    fn resolution_change_resizes_grid() {
        let mut renderer = renderer();
        assert_eq!(renderer.grid_size(), (82, 41));
        renderer
            .configure(StylizationConfig {
                resolution: 0.1,
                ..StylizationConfig::default()
            })
            .unwrap();
        assert_eq!(renderer.grid_size(), (40, 20));
        renderer.resize(800, 100);
        assert_eq!(renderer.grid_size(), (80, 10));
    }

    #[test]
    fn missing_container_falls_back_to_body() {
        let renderer = StylizedRenderer::new(
            DisplayHost::new(None),
            StylizationConfig::default(),
            100,
            100,
        )
        .unwrap();
        assert!(renderer.host().is_fallback());
        assert_eq!(renderer.host().active().name(), "body");
        assert_eq!(renderer.host().active().len(), 1);
    }

    #[test]
    fn render_fills_grid_of_sampled_size() {
        let mut renderer = renderer();
        let stage = Stage::default();
        let camera = PerspectiveCamera::new(45.0f32.to_radians(), 2.0);
        renderer.render(
            &SceneView { stage: &stage, content: None },
            &camera,
            &GpuResources::new(),
        );
        let grid = renderer.grid().unwrap();
        assert_eq!((grid.cols(), grid.rows()), (82, 41));
        assert!(grid.to_text().chars().all(|c| c == ' ' || c == '\n'));
    }
}
