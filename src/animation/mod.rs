//! Keyframe animation clips and the driver that plays them on the live asset.

mod driver;

pub use driver::{AnimationAction, AnimationDriver, AnimationMixer};

use crate::scene::{NodeId, SceneGraph};
use glam::{Quat, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Linear,
    Step,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

impl ChannelValues {
    fn len(&self) -> usize {
        match self {
            ChannelValues::Translation(values) | ChannelValues::Scale(values) => values.len(),
            ChannelValues::Rotation(values) => values.len(),
        }
    }
}

/// One animated property of one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub target: NodeId,
    pub interpolation: Interpolation,
    pub times: Vec<f32>,
    pub values: ChannelValues,
}

impl Channel {
    /// Writes the sampled value at `time` into the target node's transform.
    fn apply(&self, time: f32, graph: &mut SceneGraph) {
        let count = self.times.len().min(self.values.len());
        if count == 0 {
            return;
        }
        let Some(node) = graph.node_mut(self.target) else {
            return;
        };
        let (i0, i1, factor) = keyframe_span(&self.times[..count], time, self.interpolation);
        match &self.values {
            ChannelValues::Translation(values) => {
                node.transform.translation = values[i0].lerp(values[i1], factor);
            }
            ChannelValues::Scale(values) => {
                node.transform.scale = values[i0].lerp(values[i1], factor);
            }
            ChannelValues::Rotation(values) => {
                node.transform.rotation = values[i0].slerp(values[i1], factor).normalize();
            }
        }
    }
}

// Surrounding keyframes and blend factor for `time`, clamped to the key range.
fn keyframe_span(times: &[f32], time: f32, interpolation: Interpolation) -> (usize, usize, f32) {
    let last = times.len() - 1;
    if time <= times[0] {
        return (0, 0, 0.0);
    }
    if time >= times[last] {
        return (last, last, 0.0);
    }
    let next = times.partition_point(|t| *t <= time).min(last);
    let prev = next.saturating_sub(1);
    if interpolation == Interpolation::Step {
        return (prev, prev, 0.0);
    }
    let span = times[next] - times[prev];
    let factor = if span > 0.0 {
        ((time - times[prev]) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    (prev, next, factor)
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .filter_map(|channel| channel.times.last().copied())
            .fold(0.0f32, f32::max);
        Self {
            name: name.into(),
            duration,
            channels,
        }
    }

    pub fn apply(&self, time: f32, graph: &mut SceneGraph) {
        for channel in &self.channels {
            channel.apply(time, graph);
        }
    }
}
