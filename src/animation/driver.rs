use super::AnimationClip;
use crate::scene::SceneGraph;

/// Playback state of one clip inside a mixer.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationAction {
    clip: usize,
    time: f32,
    running: bool,
    looping: bool,
}

impl AnimationAction {
    fn new(clip: usize) -> Self {
        Self {
            clip,
            time: 0.0,
            running: false,
            looping: true,
        }
    }

    pub fn play(&mut self) -> &mut Self {
        self.running = true;
        self
    }

    pub fn stop(&mut self) -> &mut Self {
        self.running = false;
        self.time = 0.0;
        self
    }

    pub fn set_loop(&mut self, looping: bool) -> &mut Self {
        self.looping = looping;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

/// Owns a set of clips and the actions playing them.
#[derive(Debug, Clone, Default)]
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<AnimationAction>,
}

impl AnimationMixer {
    pub fn new(clips: Vec<AnimationClip>) -> Self {
        Self {
            clips,
            actions: Vec::new(),
        }
    }

    /// Action for the clip at `index`, created on first request.
    pub fn clip_action(&mut self, index: usize) -> Option<&mut AnimationAction> {
        if index >= self.clips.len() {
            return None;
        }
        let position = match self.actions.iter().position(|action| action.clip == index) {
            Some(position) => position,
            None => {
                self.actions.push(AnimationAction::new(index));
                self.actions.len() - 1
            }
        };
        self.actions.get_mut(position)
    }

    pub fn update(&mut self, delta: f32, graph: &mut SceneGraph) {
        for action in self.actions.iter_mut().filter(|action| action.running) {
            let Some(clip) = self.clips.get(action.clip) else {
                continue;
            };
            action.time += delta;
            if clip.duration > 0.0 {
                if action.looping {
                    action.time = action.time.rem_euclid(clip.duration);
                } else if action.time >= clip.duration {
                    action.time = clip.duration;
                    action.running = false;
                }
            }
            clip.apply(action.time, graph);
        }
    }

    pub fn stop_all_action(&mut self) {
        for action in &mut self.actions {
            action.stop();
        }
    }

    pub fn actions(&self) -> &[AnimationAction] {
        &self.actions
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }
}

#[derive(Debug)]
struct Binding {
    token: u64,
    mixer: AnimationMixer,
}

/// Drives at most one mixer, bound to the asset identified by its load token.
#[derive(Debug, Default)]
pub struct AnimationDriver {
    binding: Option<Binding>,
}

impl AnimationDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any binding. Loops the first clip when there is one.
    pub fn bind(&mut self, token: u64, clips: &[AnimationClip]) {
        self.unbind();
        let Some(first) = clips.first() else {
            log::info!("No animations found in the model.");
            return;
        };
        let mut mixer = AnimationMixer::new(vec![first.clone()]);
        if let Some(action) = mixer.clip_action(0) {
            action.set_loop(true).play();
        }
        log::info!(
            "Playing animation '{}' ({:.2}s, {} channels)",
            first.name,
            first.duration,
            first.channels.len()
        );
        self.binding = Some(Binding { token, mixer });
    }

    pub fn advance(&mut self, delta: f32, graph: &mut SceneGraph) {
        let Some(binding) = self.binding.as_mut() else {
            return;
        };
        if !delta.is_finite() || delta < 0.0 {
            return;
        }
        binding.mixer.update(delta, graph);
    }

    pub fn unbind(&mut self) {
        if let Some(mut binding) = self.binding.take() {
            binding.mixer.stop_all_action();
            log::debug!("Animation unbound from asset {}", binding.token);
        }
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn bound_token(&self) -> Option<u64> {
        self.binding.as_ref().map(|binding| binding.token)
    }

    pub fn mixer(&self) -> Option<&AnimationMixer> {
        self.binding.as_ref().map(|binding| &binding.mixer)
    }
}
