//! Base rasterizer: draws the scene into an RGBA frame that the stylization
//! pass samples.

use crate::render::camera::PerspectiveCamera;
use crate::render::resources::GpuResources;
use crate::scene::{PointLight, SceneView};
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Row-major RGBA8 image.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl Frame {
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            pixels: vec![[0, 0, 0, 255]; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[(y * self.width + x) as usize]
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn fill(&mut self, color: [u8; 4]) {
        self.pixels.fill(color);
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: [u8; 4]) {
        let index = (y * self.width + x) as usize;
        self.pixels[index] = color;
    }
}

/// Z-buffered triangle rasterizer with flat Lambert shading.
pub struct Rasterizer {
    frame: Frame,
    depth: Vec<f32>,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Self {
        let frame = Frame::new(width, height);
        let depth = vec![f32::INFINITY; frame.pixels.len()];
        Self { frame, depth }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.frame.width, self.frame.height)
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        if self.size() == (width.max(1), height.max(1)) {
            return;
        }
        *self = Self::new(width, height);
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn render(
        &mut self,
        scene: &SceneView<'_>,
        camera: &PerspectiveCamera,
        resources: &GpuResources,
    ) -> &Frame {
        let [r, g, b] = scene.stage.background;
        self.frame.fill([r, g, b, 255]);
        self.depth.fill(f32::INFINITY);

        let Some((graph, root)) = scene.content else {
            return &self.frame;
        };

        let view_proj = camera.projection_matrix() * camera.view_matrix();
        let eye = camera.pose.position;
        for (id, world) in graph.world_transforms(root) {
            let Some(mesh) = graph.node(id).and_then(|node| node.mesh.as_ref()) else {
                continue;
            };
            for primitive in &mesh.primitives {
                let Some(geometry) = resources.geometry(primitive.geometry) else {
                    continue;
                };
                let (albedo, double_sided) = resources.material_albedo(primitive.material);
                for triangle in geometry.indices.chunks_exact(3) {
                    let corners = [triangle[0], triangle[1], triangle[2]]
                        .map(|index| geometry.positions.get(index as usize).copied());
                    let [Some(a), Some(b), Some(c)] = corners else {
                        continue;
                    };
                    let world_corners = [a, b, c].map(|p| world.transform_point3(p));
                    let Some(color) =
                        shade_face(&world_corners, eye, albedo, double_sided, &scene.stage.lights)
                    else {
                        continue;
                    };
                    self.draw_triangle(&view_proj, &world_corners, color);
                }
            }
        }
        &self.frame
    }

    fn draw_triangle(&mut self, view_proj: &Mat4, corners: &[Vec3; 3], color: [u8; 4]) {
        let clip = corners.map(|corner| *view_proj * corner.extend(1.0));
        let polygon = clip_near(&clip);
        if polygon.len() < 3 {
            return;
        }

        let width = self.frame.width as f32;
        let height = self.frame.height as f32;
        let screen: Vec<Vec3> = polygon
            .iter()
            .map(|clip| {
                let ndc = clip.truncate() / clip.w;
                Vec3::new(
                    (ndc.x * 0.5 + 0.5) * width,
                    (0.5 - ndc.y * 0.5) * height,
                    ndc.z,
                )
            })
            .collect();
        for i in 1..screen.len() - 1 {
            self.fill_triangle([screen[0], screen[i], screen[i + 1]], color);
        }
    }

    fn fill_triangle(&mut self, screen: [Vec3; 3], color: [u8; 4]) {
        let width = self.frame.width as f32;
        let height = self.frame.height as f32;
        let [a, b, c] = screen;
        let area = edge(a.truncate(), b.truncate(), c.truncate());
        if area.abs() < f32::EPSILON {
            return;
        }

        let min = a.min(b).min(c);
        let max = a.max(b).max(c);
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().min(width) as u32).min(self.frame.width);
        let y1 = (max.y.ceil().min(height) as u32).min(self.frame.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b.truncate(), c.truncate(), p) / area;
                let w1 = edge(c.truncate(), a.truncate(), p) / area;
                let w2 = edge(a.truncate(), b.truncate(), p) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }
                let depth = w0 * a.z + w1 * b.z + w2 * c.z;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }
                let index = (y * self.frame.width + x) as usize;
                if depth < self.depth[index] {
                    self.depth[index] = depth;
                    self.frame.set_pixel(x, y, color);
                }
            }
        }
    }
}

/// Cuts a clip-space triangle against the near plane (`z >= 0` for a
/// zero-to-one depth range). Yields zero, three or four vertices, all with
/// positive `w`.
fn clip_near(triangle: &[Vec4; 3]) -> Vec<Vec4> {
    let mut polygon = Vec::with_capacity(4);
    for (i, &current) in triangle.iter().enumerate() {
        let next = triangle[(i + 1) % 3];
        let inside = current.z >= 0.0;
        if inside {
            polygon.push(current);
        }
        if inside != (next.z >= 0.0) {
            let t = current.z / (current.z - next.z);
            polygon.push(current.lerp(next, t));
        }
    }
    polygon
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Flat color of one face, or `None` when a single-sided face points away
/// from the eye.
fn shade_face(
    corners: &[Vec3; 3],
    eye: Vec3,
    albedo: Vec3,
    double_sided: bool,
    lights: &[PointLight],
) -> Option<[u8; 4]> {
    let [a, b, c] = *corners;
    let mut normal = (b - a).cross(c - a).normalize_or_zero();
    let centroid = (a + b + c) / 3.0;
    if normal.dot(eye - centroid) < 0.0 {
        if !double_sided {
            return None;
        }
        normal = -normal;
    }

    let mut radiance = Vec3::ZERO;
    for light in lights {
        let to_light = (light.position - centroid).normalize_or_zero();
        radiance += light.color * light.intensity * normal.dot(to_light).max(0.0);
    }
    let linear = (albedo * radiance).clamp(Vec3::ZERO, Vec3::ONE);
    let encode = |v: f32| (v.powf(1.0 / 2.2) * 255.0).round() as u8;
    Some([encode(linear.x), encode(linear.y), encode(linear.z), 255])
}
