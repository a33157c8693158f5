//! The viewer core: owns the displayed asset, its animation and the stylized
//! render loop, and keeps them consistent across swaps and reconfiguration.

use crate::animation::AnimationDriver;
use crate::assets::{
    reclaim, Asset, AssetDecoder, AssetLoader, AssetSource, DecodedAsset, LoadCompletion,
    LoadTicket,
};
use crate::config::ViewerConfig;
use crate::export;
use crate::render::ascii::{CharGrid, Palette, StylizationConfig, StylizeError, DEFAULT_CHARSET};
use crate::render::camera::{self, OrbitControls, PerspectiveCamera, ViewPose};
use crate::render::resources::{GpuResources, ResourceStats};
use crate::render::stylized::{DisplayHost, StylizedRenderer};
use crate::scene::{SceneView, Stage};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Spin about the asset's up axis, in radians per second.
pub const ROTATION_RATE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// White glyphs on black.
    #[default]
    Dark,
    /// Black glyphs on white.
    Light,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }

    /// `(foreground, background)`
    pub fn colors(self) -> ([u8; 3], [u8; 3]) {
        match self {
            Theme::Dark => ([255, 255, 255], [0, 0, 0]),
            Theme::Light => ([0, 0, 0], [255, 255, 255]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// A message meant for the user rather than the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

pub struct ViewerController {
    resources: GpuResources,
    stage: Stage,
    loader: AssetLoader,
    asset: Option<Asset>,
    animation: AnimationDriver,
    renderer: StylizedRenderer,
    camera: PerspectiveCamera,
    controls: OrbitControls,
    framed: ViewPose,
    fov_y: f32,
    rotation_enabled: bool,
    rotation_rate: f32,
    theme: Theme,
    /// Newest request that has finished, successfully or not.
    latest_completed: u64,
    notices: Vec<Notice>,
}

impl ViewerController {
    pub fn new(
        config: &ViewerConfig,
        decoder: Arc<dyn AssetDecoder>,
        host: DisplayHost,
        width: u32,
        height: u32,
    ) -> Result<Self, StylizeError> {
        let renderer = StylizedRenderer::new(host, config.stylization()?, width, height)?;
        let (width, height) = renderer.viewport();
        let fov_y = config.fov_radians();
        let camera = PerspectiveCamera::new(fov_y, width as f32 / height as f32);
        let controls = OrbitControls::new(camera.pose.target);
        Ok(Self {
            resources: GpuResources::new(),
            stage: Stage::default(),
            loader: AssetLoader::new(decoder),
            asset: None,
            animation: AnimationDriver::new(),
            renderer,
            framed: camera.pose,
            camera,
            controls,
            fov_y,
            rotation_enabled: config.rotate,
            rotation_rate: config.rotation_rate,
            theme: config.theme,
            latest_completed: 0,
            notices: Vec::new(),
        })
    }

    /// Starts decoding `source` in the background. The result is applied by a
    /// later [`poll_loads`](Self::poll_loads) or [`tick`](Self::tick).
    pub fn load_asset(&mut self, source: AssetSource) -> LoadTicket {
        self.loader.load(source)
    }

    pub fn poll_loads(&mut self) {
        for completion in self.loader.poll() {
            self.apply_completion(completion);
        }
    }

    /// Blocks up to `timeout` for one load to finish and applies it.
    pub fn wait_for_load(&mut self, timeout: Duration) -> bool {
        match self.loader.wait(timeout) {
            Some(completion) => {
                self.apply_completion(completion);
                true
            }
            None => false,
        }
    }

    pub fn pending_loads(&self) -> usize {
        self.loader.in_flight()
    }

    fn apply_completion(&mut self, completion: LoadCompletion) {
        let LoadCompletion {
            token,
            source_name,
            result,
        } = completion;

        if token <= self.latest_completed {
            match result {
                Ok(decoded) => {
                    let stale = Asset::install(token, decoded, &mut self.resources);
                    reclaim(Some(&stale), &mut self.resources);
                    log::debug!(
                        "Discarded '{}' (request {}): request {} already completed",
                        source_name,
                        token,
                        self.latest_completed
                    );
                }
                Err(err) => log::debug!("Ignoring failure of superseded request {}: {}", token, err),
            }
            return;
        }

        self.latest_completed = token;
        match result {
            Ok(decoded) => self.install(token, decoded),
            Err(err) => {
                log::warn!("Failed to load '{}': {}", source_name, err);
                self.notices.push(Notice::error(format!("Error loading model: {err}")));
            }
        }
    }

    fn install(&mut self, token: u64, decoded: DecodedAsset) {
        self.animation.unbind();
        if let Some(previous) = self.asset.take() {
            reclaim(Some(&previous), &mut self.resources);
        }

        let asset = Asset::install(token, decoded, &mut self.resources);
        self.framed = camera::frame(&asset.bounds(), self.fov_y);
        self.camera.pose = self.framed;
        self.controls.set_target(self.framed.target);
        self.controls.update(&mut self.camera);
        self.animation.bind(token, asset.clips());

        self.notices.push(Notice::info(format!("Loaded {}", asset.name())));
        self.asset = Some(asset);
    }

    pub fn set_rotation(&mut self, enabled: bool) {
        self.rotation_enabled = enabled;
    }

    pub fn toggle_rotation(&mut self) -> bool {
        self.rotation_enabled = !self.rotation_enabled;
        self.rotation_enabled
    }

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StylizeError> {
        let (foreground, background) = theme.colors();
        let config = StylizationConfig {
            foreground,
            background,
            ..self.renderer.config().clone()
        };
        self.reconfigure(config)?;
        self.theme = theme;
        Ok(())
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, StylizeError> {
        self.set_theme(self.theme.toggled())?;
        Ok(self.theme)
    }

    /// Replaces the glyph ramp. An empty palette is rejected and the current
    /// surface is kept.
    pub fn set_palette(&mut self, characters: &str) -> Result<(), StylizeError> {
        let config = StylizationConfig {
            palette: Palette::new(characters)?,
            ..self.renderer.config().clone()
        };
        self.reconfigure(config)
    }

    pub fn reset_palette(&mut self) -> Result<(), StylizeError> {
        self.set_palette(DEFAULT_CHARSET)
    }

    pub fn set_resolution(&mut self, resolution: f32) -> Result<(), StylizeError> {
        let config = StylizationConfig {
            resolution,
            ..self.renderer.config().clone()
        };
        self.reconfigure(config)
    }

    fn reconfigure(&mut self, config: StylizationConfig) -> Result<(), StylizeError> {
        self.renderer.configure(config)?;
        // The surface the controls listened on is gone; rebuild them in place.
        self.controls = OrbitControls::new(self.controls.target);
        Ok(())
    }

    /// Returns the camera to the pose chosen when the asset was framed.
    pub fn reset_view(&mut self) {
        self.camera.pose = self.framed;
        self.controls = OrbitControls::new(self.framed.target);
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
        let (width, height) = self.renderer.viewport();
        self.camera.set_aspect(width as f32 / height as f32);
    }

    /// Drag as a fraction of the viewport height.
    pub fn orbit(&mut self, dx_fraction: f32, dy_fraction: f32) {
        self.controls.rotate(dx_fraction, dy_fraction);
    }

    pub fn dolly(&mut self, steps: f32) {
        self.controls.dolly(steps);
    }

    /// One frame: apply finished loads, animate, spin, move the camera, draw.
    pub fn tick(&mut self, delta_seconds: f32) {
        let delta = if delta_seconds.is_finite() {
            delta_seconds.max(0.0)
        } else {
            0.0
        };

        self.poll_loads();

        if let Some(asset) = self.asset.as_mut() {
            self.animation.advance(delta, asset.graph_mut());
            if self.rotation_enabled {
                asset.rotate_by(self.rotation_rate * delta);
            }
        }
        self.controls.update(&mut self.camera);
        self.render();
    }

    fn render(&mut self) {
        let scene = SceneView {
            stage: &self.stage,
            content: self
                .asset
                .as_ref()
                .map(|asset| (asset.graph(), asset.root_matrix())),
        };
        self.renderer.render(&scene, &self.camera, &self.resources);
    }

    pub fn grid(&self) -> Option<&CharGrid> {
        self.renderer.grid()
    }

    pub fn ascii_text(&self) -> String {
        self.grid().map(export::export_text).unwrap_or_default()
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn config(&self) -> &StylizationConfig {
        self.renderer.config()
    }

    /// Pose chosen when the current asset was framed.
    pub fn framed_pose(&self) -> ViewPose {
        self.framed
    }

    /// Current camera pose, including orbit input.
    pub fn pose(&self) -> ViewPose {
        self.camera.pose
    }

    pub fn asset(&self) -> Option<&Asset> {
        self.asset.as_ref()
    }

    pub fn animation(&self) -> &AnimationDriver {
        &self.animation
    }

    pub fn stats(&self) -> ResourceStats {
        self.resources.stats()
    }

    pub fn renderer(&self) -> &StylizedRenderer {
        &self.renderer
    }
}

impl Drop for ViewerController {
    fn drop(&mut self) {
        self.animation.unbind();
        reclaim(self.asset.take().as_ref(), &mut self.resources);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::testing::{triangle_glb, ScriptedDecoder};
    use crate::assets::GltfDecoder;
    use crate::render::stylized::SurfaceContainer;
    use glam::Vec3;

    const WAIT: Duration = Duration::from_secs(5);

    fn host() -> DisplayHost {
        DisplayHost::new(Some(SurfaceContainer::new("viewport")))
    }

    fn viewer_with(decoder: Arc<dyn AssetDecoder>) -> ViewerController {
        ViewerController::new(&ViewerConfig::default(), decoder, host(), 400, 200).unwrap()
    }

    fn viewer() -> ViewerController {
        viewer_with(Arc::new(ScriptedDecoder::new()))
    }

    fn cube(name: &str) -> AssetSource {
        AssetSource::bytes(name, b"cube".to_vec())
    }

    fn load(viewer: &mut ViewerController, source: AssetSource) -> LoadTicket {
        let ticket = viewer.load_asset(source);
        assert!(viewer.wait_for_load(WAIT), "load timed out");
        ticket
    }

    #[test]
    fn cube_is_framed_at_the_origin() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));

        let pose = viewer.framed_pose();
        let expected_z = 2.0 / (2.0 * (22.5f32).to_radians().tan()) * 1.7;
        assert!((pose.position.z - expected_z).abs() < 1e-3);
        assert!((pose.position.z - 4.104).abs() < 1e-2);
        assert!((pose.position.y - 0.6).abs() < 1e-5);
        assert!(pose.target.length() < 1e-5);
        assert!(viewer.pose().position.distance(pose.position) < 1e-4);
    }

    #[test]
    fn failed_load_keeps_previous_asset() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));
        viewer.take_notices();
        let before = viewer.stats();
        let pose = viewer.framed_pose();

        load(&mut viewer, AssetSource::bytes("broken.glb", b"garbage".to_vec()));

        assert_eq!(viewer.asset().map(Asset::name), Some("cube.glb"));
        assert_eq!(viewer.stats(), before);
        assert_eq!(viewer.framed_pose(), pose);
        let notices = viewer.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Error);
        assert!(notices[0].message.contains("broken.glb"));
    }

    #[test]
    fn palette_change_rebuilds_surface() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));

        viewer.set_palette(" .#").unwrap();
        viewer.tick(0.016);
        let text = viewer.ascii_text();
        assert!(text.chars().all(|c| matches!(c, ' ' | '.' | '#' | '\n')));
        assert!(text.contains('#') || text.contains('.'));
        assert_eq!(viewer.renderer().host().active().len(), 1);

        viewer.reset_palette().unwrap();
        assert_eq!(viewer.config().palette.as_string(), DEFAULT_CHARSET);
        assert_eq!(viewer.renderer().host().active().len(), 1);
    }

    #[test]
    fn empty_palette_is_rejected() {
        let mut viewer = viewer();
        let surface = viewer.renderer().surface().map(|surface| surface.id());
        assert_eq!(viewer.set_palette(""), Err(StylizeError::EmptyPalette));
        assert_eq!(viewer.renderer().surface().map(|surface| surface.id()), surface);
        assert_eq!(viewer.config().palette.as_string(), DEFAULT_CHARSET);
    }

    #[test]
    fn superseded_load_is_discarded() {
        let decoder = Arc::new(ScriptedDecoder::new());
        let release_first = decoder.gate("first.glb");
        let mut viewer = viewer_with(decoder);

        let first = viewer.load_asset(cube("first.glb"));
        let second = viewer.load_asset(AssetSource::bytes("second.glb", b"anim".to_vec()));
        assert!(viewer.wait_for_load(WAIT));
        assert_eq!(viewer.asset().map(Asset::token), Some(second.token));

        release_first.send(()).unwrap();
        assert!(viewer.wait_for_load(WAIT));

        assert_eq!(viewer.asset().map(Asset::name), Some("second.glb"));
        assert_eq!(viewer.animation().bound_token(), Some(second.token));
        assert!(first.token < second.token);
        let stats = viewer.stats();
        assert_eq!(stats.live_total(), 3);
        assert_eq!(
            (stats.released_geometries, stats.released_textures, stats.released_materials),
            (1, 1, 1)
        );
    }

    #[test]
    fn late_success_after_newer_failure_is_discarded() {
        let decoder = Arc::new(ScriptedDecoder::new());
        let release_old = decoder.gate("old.glb");
        let mut viewer = viewer_with(decoder);
        load(&mut viewer, cube("shown.glb"));
        viewer.take_notices();

        viewer.load_asset(cube("old.glb"));
        load(&mut viewer, AssetSource::bytes("newer_broken.glb", b"garbage".to_vec()));
        assert_eq!(viewer.asset().map(Asset::name), Some("shown.glb"));

        release_old.send(()).unwrap();
        assert!(viewer.wait_for_load(WAIT));

        assert_eq!(viewer.asset().map(Asset::name), Some("shown.glb"));
        let stats = viewer.stats();
        assert_eq!(stats.live_total(), 3);
        assert_eq!(
            (stats.released_geometries, stats.released_textures, stats.released_materials),
            (1, 1, 1)
        );
        let notices = viewer.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].kind, NoticeKind::Error);
    }

    #[test]
    fn each_swap_reclaims_the_previous_asset() {
        let mut viewer = viewer();
        let sources = [
            cube("a.glb"),
            AssetSource::bytes("b.glb", b"anim".to_vec()),
            AssetSource::bytes("bad.glb", b"nope".to_vec()),
            cube("c.glb"),
            AssetSource::Url("https://example.com/d.glb".to_string()),
            cube("e.glb"),
        ];
        for source in sources {
            load(&mut viewer, source);
            assert!(viewer.asset().is_some());
            assert_eq!(viewer.stats().live_total(), 3);
            viewer.tick(0.016);
        }

        let stats = viewer.stats();
        assert_eq!(viewer.asset().map(Asset::name), Some("e.glb"));
        // a, b and c were displayed and then replaced.
        assert_eq!(stats.released_geometries, 3);
        assert_eq!(stats.released_materials, 3);
        assert_eq!(stats.released_textures, 3);
        assert!(viewer.animation().bound_token().is_none());
        assert_eq!(viewer.take_notices().iter().filter(|n| n.kind == NoticeKind::Error).count(), 2);
    }

    #[test]
    fn animated_asset_binds_first_clip() {
        let mut viewer = viewer();
        let ticket = load(&mut viewer, AssetSource::bytes("hover.glb", b"anim".to_vec()));
        assert_eq!(viewer.animation().bound_token(), Some(ticket.token));

        viewer.tick(0.5);
        let lifted = viewer
            .asset()
            .and_then(|asset| asset.graph().node(crate::scene::NodeId(0)))
            .map(|node| node.transform.translation)
            .unwrap();
        assert!((lifted.y - 0.25).abs() < 1e-4);
    }

    #[test]
    fn rotation_is_frame_rate_independent() {
        let mut fine = viewer();
        let mut coarse = viewer();
        load(&mut fine, cube("cube.glb"));
        load(&mut coarse, cube("cube.glb"));
        fine.set_rotation(true);
        coarse.set_rotation(true);

        for _ in 0..10 {
            fine.tick(0.1);
        }
        coarse.tick(1.0);

        let fine_angle = fine.asset().map(Asset::rotation).unwrap();
        let coarse_angle = coarse.asset().map(Asset::rotation).unwrap();
        assert!((fine_angle - ROTATION_RATE).abs() < 1e-5);
        assert!((fine_angle - coarse_angle).abs() < 1e-5);
    }

    #[test]
    fn disabled_rotation_holds_still() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));
        assert!(!viewer.rotation_enabled());
        viewer.tick(1.0);
        assert_eq!(viewer.asset().map(Asset::rotation), Some(0.0));
        assert!(viewer.toggle_rotation());
        viewer.tick(1.0);
        assert_eq!(viewer.asset().map(Asset::rotation), Some(ROTATION_RATE));
    }

    #[test]
    fn theme_toggle_swaps_surface_colors() {
        let mut viewer = viewer();
        assert_eq!(viewer.theme(), Theme::Dark);
        assert_eq!(viewer.toggle_theme(), Ok(Theme::Light));
        let surface = viewer.renderer().surface().unwrap();
        assert_eq!(surface.foreground, [0, 0, 0]);
        assert_eq!(surface.background, [255, 255, 255]);
        for _ in 0..5 {
            viewer.toggle_theme().unwrap();
        }
        assert_eq!(viewer.theme(), Theme::Dark);
        assert_eq!(viewer.renderer().host().active().len(), 1);
    }

    #[test]
    fn missing_container_falls_back_to_body() {
        let mut viewer = ViewerController::new(
            &ViewerConfig::default(),
            Arc::new(ScriptedDecoder::new()),
            DisplayHost::new(None),
            400,
            200,
        )
        .unwrap();
        viewer.tick(0.016);
        let host = viewer.renderer().host();
        assert!(host.is_fallback());
        assert_eq!(host.active().name(), "body");
        assert_eq!(host.active().len(), 1);
    }

    #[test]
    fn resize_tracks_grid_and_aspect() {
        let mut viewer = viewer();
        viewer.resize(800, 100);
        assert_eq!(viewer.renderer().grid_size(), (164, 20));
        assert_eq!(viewer.grid().map(|grid| (grid.cols(), grid.rows())), Some((164, 20)));
        assert_eq!(viewer.camera.aspect, 8.0);

        viewer.set_resolution(0.1).unwrap();
        assert_eq!(viewer.renderer().grid_size(), (80, 10));
    }

    #[test]
    fn loaded_cube_shows_up_in_text() {
        let mut viewer = viewer();
        viewer.tick(0.016);
        assert!(viewer.ascii_text().chars().all(|c| c == ' ' || c == '\n'));

        load(&mut viewer, cube("cube.glb"));
        viewer.set_rotation(false);
        viewer.tick(0.016);
        let text = viewer.ascii_text();
        assert_eq!(text.lines().count(), 41);
        assert!(text.lines().all(|line| line.chars().count() == 82));
        assert!(text.chars().any(|c| c != ' ' && c != '\n'));
    }

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));
        let distance = viewer.pose().distance();
        viewer.orbit(0.25, 0.0);
        viewer.tick(0.0);
        assert!((viewer.pose().distance() - distance).abs() < 1e-3);
        assert!(viewer.pose().position.x.abs() > 1.0);

        viewer.dolly(5.0);
        viewer.tick(0.0);
        assert!(viewer.pose().distance() < distance);
    }

    #[test]
    fn reset_view_restores_framing() {
        let mut viewer = viewer();
        load(&mut viewer, cube("cube.glb"));
        viewer.orbit(0.1, 0.05);
        viewer.dolly(3.0);
        viewer.tick(0.0);
        assert!(viewer.pose().position.distance(viewer.framed_pose().position) > 0.1);

        viewer.reset_view();
        viewer.tick(0.0);
        assert!(viewer.pose().position.distance(viewer.framed_pose().position) < 1e-4);
    }

    #[test]
    fn gltf_asset_end_to_end() {
        let mut viewer = viewer_with(Arc::new(GltfDecoder));
        let ticket = load(&mut viewer, AssetSource::bytes("triangle.glb", triangle_glb()));

        let asset = viewer.asset().unwrap();
        assert_eq!(asset.center(), Vec3::new(0.5, 1.5, 0.0));
        assert_eq!(viewer.animation().bound_token(), Some(ticket.token));
        let pose = viewer.framed_pose();
        assert!((pose.position.y - 0.3).abs() < 1e-5);
        viewer.tick(0.016);
        assert_eq!(viewer.stats().live_geometries, 1);
    }
}
