use std::time::{Duration, Instant};
use winit::window::Window;

/// Longest step handed to the viewer; keeps a stalled frame from jumping the animation.
const MAX_FRAME_DT: f32 = 0.25;

pub struct FrameTiming {
    last_frame_time: Option<Instant>,
    last_fps_time: Instant,
    frame_count: u32,
    pub frame_dt: f32,
    render_ms: f32,
    base_title: String,
}

impl FrameTiming {
    pub fn new(base_title: String) -> Self {
        Self {
            last_frame_time: None,
            last_fps_time: Instant::now(),
            frame_count: 0,
            frame_dt: 1.0 / 60.0,
            render_ms: 0.0,
            base_title,
        }
    }

    pub fn set_render_ms(&mut self, render_ms: f32) {
        self.render_ms = render_ms;
    }

    /// Wall-clock step since the previous call.
    pub fn update(&mut self, window: Option<&Window>, now: Instant) -> f32 {
        let dt_duration = match self.last_frame_time {
            Some(last) => now.saturating_duration_since(last),
            None => Duration::from_millis(16),
        };
        self.last_frame_time = Some(now);
        self.frame_dt = dt_duration.as_secs_f32().clamp(0.0, MAX_FRAME_DT);

        self.frame_count = self.frame_count.saturating_add(1);
        let elapsed = now.saturating_duration_since(self.last_fps_time);
        if elapsed.as_secs_f32() >= 0.5 {
            let fps = self.frame_count as f32 / elapsed.as_secs_f32();
            if let Some(window) = window {
                window.set_title(&format!(
                    "{} - {:.1} fps (render {:.2} ms)",
                    self.base_title, fps, self.render_ms
                ));
            }
            self.frame_count = 0;
            self.last_fps_time = now;
        }
        self.frame_dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_frame_assumes_sixty_hertz() {
        let mut timing = FrameTiming::new("test".to_string());
        let dt = timing.update(None, Instant::now());
        assert!((dt - 0.016).abs() < 1e-6);
    }

    #[test]
    fn delta_is_wall_clock_and_clamped() {
        let mut timing = FrameTiming::new("test".to_string());
        let start = Instant::now();
        timing.update(None, start);
        let dt = timing.update(None, start + Duration::from_millis(40));
        assert!((dt - 0.04).abs() < 1e-5);
        let dt = timing.update(None, start + Duration::from_secs(10));
        assert_eq!(dt, MAX_FRAME_DT);
    }
}
