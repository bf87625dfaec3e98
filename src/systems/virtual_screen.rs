use nalgebra::{Rotation3, Vector3};

use crate::{backend_config::PhysicalConfig, tracking::Hand, Point2D, Point3D};

/// Rotation taking tracking-space vectors into screen-world space.
///
/// Rotations apply roll (Z) first, then pitch (X), then yaw (Y). For an overhead
/// camera (|Z| > 90) the pitch sign flips, so that a positive X rotation tilts the
/// camera towards the screen in both mounting modes.
pub fn camera_rotation(rotation_degrees: &Point3D) -> Rotation3<f32> {
    let overhead = rotation_degrees.z.abs() > 90.;
    let pitch = if overhead {
        rotation_degrees.x
    } else {
        -rotation_degrees.x
    };
    Rotation3::from_axis_angle(&Vector3::y_axis(), rotation_degrees.y.to_radians())
        * Rotation3::from_axis_angle(&Vector3::x_axis(), pitch.to_radians())
        * Rotation3::from_axis_angle(&Vector3::z_axis(), rotation_degrees.z.to_radians())
}

/// Geometric model of the physical screen.
///
/// Screen-world space has its origin at the bottom-centre of the screen, X to the
/// right, Y up and Z towards the user. The screen surface passes through the origin,
/// tilted back by the screen rotation. Screen pixels have their origin at the
/// bottom-left corner.
#[derive(Debug, Clone)]
pub struct VirtualScreen {
    width_px: f32,
    height_px: f32,
    width_m: f32,
    height_m: f32,
    pixels_per_metre: f32,
    /// Unit vector up along the screen surface
    up: Point3D,
    /// Unit vector out of the screen, towards the user
    normal: Point3D,
    camera_rotation: Rotation3<f32>,
    camera_position: Point3D,
}

impl VirtualScreen {
    pub fn new(config: &PhysicalConfig) -> Self {
        let width_px = config.screen_width_px as f32;
        let height_px = config.screen_height_px as f32;
        let height_m = config.screen_height_m;

        let valid = height_px > 0. && height_m > 0. && height_m.is_finite();
        let pixels_per_metre = if valid { height_px / height_m } else { 0. };
        let width_m = if valid {
            height_m * (width_px / height_px)
        } else {
            0.
        };

        let tilt = config.screen_rotation.to_radians();

        VirtualScreen {
            width_px,
            height_px,
            width_m,
            height_m,
            pixels_per_metre,
            up: Point3D::new(0., tilt.cos(), -tilt.sin()),
            normal: Point3D::new(0., tilt.sin(), tilt.cos()),
            camera_rotation: camera_rotation(&config.camera_rotation),
            camera_position: config.camera_position,
        }
    }

    pub fn width_px(&self) -> f32 {
        self.width_px
    }

    pub fn height_px(&self) -> f32 {
        self.height_px
    }

    pub fn width_m(&self) -> f32 {
        self.width_m
    }

    pub fn height_m(&self) -> f32 {
        self.height_m
    }

    pub fn normal(&self) -> Point3D {
        self.normal
    }

    pub fn tracking_to_world(&self, p: &Point3D) -> Point3D {
        self.camera_rotation * p + self.camera_position
    }

    pub fn world_to_tracking(&self, p: &Point3D) -> Point3D {
        self.camera_rotation.inverse() * (p - self.camera_position)
    }

    /// The whole hand, moved from tracking space into screen-world space
    pub fn transform_hand(&self, hand: &Hand) -> Hand {
        hand.transformed(
            |p| self.tracking_to_world(p),
            |v| self.camera_rotation * v,
        )
    }

    /// Signed perpendicular distance (m) from the screen plane; positive in front
    pub fn distance_from_screen_plane(&self, p: &Point3D) -> f32 {
        p.dot(&self.normal)
    }

    /// Project a screen-world point onto the screen: (x px, y px, distance m)
    pub fn world_to_screen(&self, p: &Point3D) -> Point3D {
        let along_up = p.dot(&self.up);
        Point3D::new(
            (p.x + self.width_m / 2.) * self.pixels_per_metre,
            along_up * self.pixels_per_metre,
            self.distance_from_screen_plane(p),
        )
    }

    /// Tracking-space point straight to (x px, y px, distance m)
    pub fn tracking_to_screen(&self, p: &Point3D) -> Point3D {
        self.world_to_screen(&self.tracking_to_world(p))
    }

    /// Inverse of `world_to_screen`
    pub fn screen_to_world(&self, screen_px: &Point2D, distance: f32) -> Point3D {
        let metres = self.pixels_to_meters(screen_px);
        Point3D::new(metres.x - self.width_m / 2., 0., 0.) + self.up * metres.y + self.normal * distance
    }

    pub fn pixels_to_meters(&self, px: &Point2D) -> Point2D {
        if self.pixels_per_metre > 0. {
            px / self.pixels_per_metre
        } else {
            Point2D::zeros()
        }
    }

    pub fn meters_to_pixels(&self, m: &Point2D) -> Point2D {
        m * self.pixels_per_metre
    }
}
