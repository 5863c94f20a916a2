//! Video-normalized point -> overlay pixel, through the renderer's current 3D scene.

use serde::{Deserialize, Serialize};

use crate::algorithm::warp;
use crate::models::geometry::{NormalizedVideoPoint, ScreenPoint};

type Vec3 = [f64; 3];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraParams {
    pub fov_y_deg: f64,
    pub position: Vec3,
    pub look_at: Vec3,
    pub near: f64,
    pub far: f64,
}

impl CameraParams {
    /// Camera whose vertical field of view exactly covers `view_height` world
    /// units at `projection_distance`, looking down -Z at the origin.
    pub fn fitted(projection_distance: f64, view_height: f64) -> Self {
        let distance = projection_distance.max(1e-6);
        let fov_rad = 2.0 * ((view_height.max(1e-6) * 0.5) / distance).atan();
        Self {
            fov_y_deg: fov_rad.to_degrees(),
            position: [0.0, 0.0, distance],
            look_at: [0.0, 0.0, 0.0],
            near: 0.1,
            far: distance * 10.0 + 1_000.0,
        }
    }
}

/// Animated plane transform owned by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    /// Tilt around the plane's pivot line, radians. Larger means stronger perspective.
    pub tilt_rad: f64,
    /// Camera distance from its look-at target; `<= 0` keeps the camera's own position.
    pub camera_distance: f64,
}

impl Default for PlaneTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            tilt_rad: 0.0,
            camera_distance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaneGeometry {
    pub width: f64,
    pub height: f64,
    /// True when the renderer flips the video horizontally (selfie view).
    pub mirrored: bool,
    /// Local Y of the tilt pivot line (e.g. `-height / 2` for the bottom edge).
    pub pivot_y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
}

/// Everything the projector needs from the renderer for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderScene {
    pub camera: CameraParams,
    pub plane: PlaneTransform,
    pub geometry: PlaneGeometry,
    pub surface: SurfaceSize,
}

/// Maps a video-normalized point to overlay pixels.
///
/// `None` when the scene is not available yet or degenerate for this frame.
pub fn project_to_screen(
    point: NormalizedVideoPoint,
    comp: f64,
    scene: Option<&RenderScene>,
) -> Option<ScreenPoint> {
    let scene = scene?;
    let surface = scene.surface;
    if !(surface.width >= 1.0 && surface.height >= 1.0) {
        return None;
    }

    let v_plane = warp::invert(point.v, comp);
    let geometry = scene.geometry;
    let u_offset = if geometry.mirrored {
        0.5 - point.u
    } else {
        point.u - 0.5
    };
    let local = [u_offset * geometry.width, (0.5 - v_plane) * geometry.height, 0.0];

    let world = plane_world_matrix(&scene.plane, geometry.pivot_y).transform_point(local);
    let world = [world[0], world[1], world[2]];

    let eye = camera_eye(&scene.camera, scene.plane.camera_distance);
    let view = Mat4::look_at(eye, scene.camera.look_at, [0.0, 1.0, 0.0])?;
    let projection = Mat4::perspective(
        scene.camera.fov_y_deg.to_radians(),
        surface.width / surface.height,
        scene.camera.near,
        scene.camera.far,
    )?;
    let clip = projection.mul(&view).transform_point(world);
    // Behind the camera or on its plane.
    if clip[3].is_nan() || clip[3] <= 1e-9 {
        return None;
    }

    let ndc_x = clip[0] / clip[3];
    let ndc_y = clip[1] / clip[3];
    Some(ScreenPoint::new(
        (ndc_x + 1.0) * 0.5 * surface.width,
        (1.0 - ndc_y) * 0.5 * surface.height,
    ))
}

fn plane_world_matrix(plane: &PlaneTransform, pivot_y: f64) -> Mat4 {
    let scale = if plane.scale.is_finite() && plane.scale > 0.0 {
        plane.scale
    } else {
        1.0
    };
    Mat4::translation(plane.translate_x, plane.translate_y, 0.0)
        .mul(&Mat4::uniform_scale(scale))
        .mul(&Mat4::translation(0.0, pivot_y, 0.0))
        .mul(&Mat4::rotation_x(plane.tilt_rad))
        .mul(&Mat4::translation(0.0, -pivot_y, 0.0))
}

fn camera_eye(camera: &CameraParams, distance: f64) -> Vec3 {
    if !(distance.is_finite() && distance > 0.0) {
        return camera.position;
    }
    let axis = sub(camera.position, camera.look_at);
    match normalize(axis) {
        Some(dir) => [
            camera.look_at[0] + dir[0] * distance,
            camera.look_at[1] + dir[1] * distance,
            camera.look_at[2] + dir[2] * distance,
        ],
        None => camera.position,
    }
}

/// Row-major 4x4 matrix acting on column vectors.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Mat4([f64; 16]);

impl Mat4 {
    fn identity() -> Self {
        let mut m = [0.0; 16];
        m[0] = 1.0;
        m[5] = 1.0;
        m[10] = 1.0;
        m[15] = 1.0;
        Mat4(m)
    }

    fn translation(x: f64, y: f64, z: f64) -> Self {
        let mut m = Self::identity();
        m.0[3] = x;
        m.0[7] = y;
        m.0[11] = z;
        m
    }

    fn uniform_scale(s: f64) -> Self {
        let mut m = Self::identity();
        m.0[0] = s;
        m.0[5] = s;
        m.0[10] = s;
        m
    }

    fn rotation_x(angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let mut m = Self::identity();
        m.0[5] = cos;
        m.0[6] = -sin;
        m.0[9] = sin;
        m.0[10] = cos;
        m
    }

    #[rustfmt::skip]
    fn look_at(eye: Vec3, target: Vec3, up: Vec3) -> Option<Self> {
        let z = normalize(sub(eye, target))?;
        let x = normalize(cross(up, z))?;
        let y = cross(z, x);
        Some(Mat4([
            x[0], x[1], x[2], -dot(x, eye),
            y[0], y[1], y[2], -dot(y, eye),
            z[0], z[1], z[2], -dot(z, eye),
            0.0, 0.0, 0.0, 1.0,
        ]))
    }

    #[rustfmt::skip]
    fn perspective(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Option<Self> {
        let half = (fov_y_rad * 0.5).tan();
        if !(half.is_finite() && half > 0.0 && aspect > 0.0 && far > near && near > 0.0) {
            return None;
        }
        let f = 1.0 / half;
        Some(Mat4([
            f / aspect, 0.0, 0.0, 0.0,
            0.0, f, 0.0, 0.0,
            0.0, 0.0, (far + near) / (near - far), 2.0 * far * near / (near - far),
            0.0, 0.0, -1.0, 0.0,
        ]))
    }

    fn mul(&self, other: &Mat4) -> Mat4 {
        let mut out = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] = (0..4)
                    .map(|k| self.0[row * 4 + k] * other.0[k * 4 + col])
                    .sum();
            }
        }
        Mat4(out)
    }

    fn transform_point(&self, p: Vec3) -> [f64; 4] {
        let v = [p[0], p[1], p[2], 1.0];
        let mut out = [0.0; 4];
        for (row, slot) in out.iter_mut().enumerate() {
            *slot = (0..4).map(|k| self.0[row * 4 + k] * v[k]).sum();
        }
        out
    }
}

fn sub(a: Vec3, b: Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn dot(a: Vec3, b: Vec3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: Vec3, b: Vec3) -> Vec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn normalize(v: Vec3) -> Option<Vec3> {
    let len = dot(v, v).sqrt();
    if !(len.is_finite() && len > 1e-12) {
        return None;
    }
    Some([v[0] / len, v[1] / len, v[2] / len])
}
