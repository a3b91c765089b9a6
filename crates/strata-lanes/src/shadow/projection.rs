// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Perspective shadow matrices for spot and point lights.

use strata_core::math::{stable_up, Mat4, Vec3};

/// Near plane of every local-light shadow projection.
pub const LOCAL_SHADOW_NEAR: f32 = 0.1;
/// Lower bound of the far plane, so tiny radii still give a valid frustum.
pub const LOCAL_SHADOW_MIN_FAR: f32 = 0.2;
/// Number of faces rendered per point light.
pub const CUBE_FACE_COUNT: u32 = 6;

/// Look direction and up vector of each point shadow face.
///
/// Faces are ordered +X, -X, +Y, -Y, +Z, -Z. The ±Y faces use a Z up vector
/// so the look-at basis never degenerates.
pub const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

fn far_plane(radius: f32) -> f32 {
    radius.max(LOCAL_SHADOW_MIN_FAR)
}

/// World to clip matrix of a spot light's shadow map.
///
/// The field of view spans the whole outer cone.
pub fn spot_view_projection(position: Vec3, direction: Vec3, outer_angle: f32, radius: f32) -> Mat4 {
    let direction = direction.try_normalize().unwrap_or(Vec3::NEG_Y);
    let view = Mat4::look_at_rh(position, position + direction, stable_up(direction));
    let fov = (2.0 * outer_angle).clamp(1e-3, std::f32::consts::PI - 1e-3);
    let projection = Mat4::perspective_rh(fov, 1.0, LOCAL_SHADOW_NEAR, far_plane(radius));
    projection * view
}

/// World to clip matrices of the six faces of a point light's shadow.
pub fn point_face_view_projections(position: Vec3, radius: f32) -> [Mat4; 6] {
    let projection = Mat4::perspective_rh(
        std::f32::consts::FRAC_PI_2,
        1.0,
        LOCAL_SHADOW_NEAR,
        far_plane(radius),
    );
    CUBE_FACES.map(|(direction, up)| {
        projection * Mat4::look_at_rh(position, position + direction, up)
    })
}

/// Array layer of one face of point shadow `index`.
///
/// Point maps live in a 2D array with six consecutive layers per light.
pub const fn point_layer(index: u32, face: u32) -> u32 {
    index * CUBE_FACE_COUNT + face
}

/// The face whose frustum contains `direction`, following the major axis.
pub fn cube_face_for_direction(direction: Vec3) -> u32 {
    let a = direction.abs();
    if a.x >= a.y && a.x >= a.z {
        if direction.x >= 0.0 { 0 } else { 1 }
    } else if a.y >= a.z {
        if direction.y >= 0.0 { 2 } else { 3 }
    } else if direction.z >= 0.0 {
        4
    } else {
        5
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn point_layers_pack_six_faces_per_light() {
        assert_eq!(point_layer(0, 0), 0);
        assert_eq!(point_layer(0, 5), 5);
        assert_eq!(point_layer(1, 0), 6);
        assert_eq!(point_layer(1, 5), 11);
    }

    #[test]
    fn every_face_sees_its_own_axis() {
        let position = Vec3::new(1.0, 2.0, 3.0);
        let faces = point_face_view_projections(position, 6.0);
        for (face, (direction, _)) in CUBE_FACES.iter().enumerate() {
            let target = position + *direction * 3.0;
            let ndc = faces[face].project_point3(target);
            assert_relative_eq!(ndc.x, 0.0, epsilon = 1e-4);
            assert_relative_eq!(ndc.y, 0.0, epsilon = 1e-4);
            assert!((0.0..=1.0).contains(&ndc.z));
            assert_eq!(cube_face_for_direction(*direction), face as u32);
        }
    }

    #[test]
    fn face_selection_projects_inside_the_face() {
        let position = Vec3::ZERO;
        let faces = point_face_view_projections(position, 10.0);
        for direction in [
            Vec3::new(0.9, 0.3, -0.2),
            Vec3::new(-0.1, -0.8, 0.5),
            Vec3::new(0.4, 0.2, 0.7),
        ] {
            let face = cube_face_for_direction(direction) as usize;
            let ndc = faces[face].project_point3(direction * 4.0);
            assert!(ndc.x.abs() <= 1.0 && ndc.y.abs() <= 1.0, "{ndc}");
        }
    }

    #[test]
    fn spot_cone_fits_the_frustum() {
        let position = Vec3::new(2.5, 4.0, 0.0);
        let direction = (Vec3::ZERO - position).normalize();
        let outer = 25f32.to_radians();
        let matrix = spot_view_projection(position, direction, outer, 8.0);
        let on_axis = matrix.project_point3(position + direction * 4.0);
        assert_relative_eq!(on_axis.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(on_axis.y, 0.0, epsilon = 1e-4);
        assert!(on_axis.z > 0.0 && on_axis.z < 1.0);
    }

    #[test]
    fn tiny_radius_keeps_a_valid_far_plane() {
        let matrix = spot_view_projection(Vec3::ZERO, Vec3::NEG_Y, 0.4, 0.0);
        assert!(matrix.is_finite());
        let faces = point_face_view_projections(Vec3::ZERO, 0.01);
        assert!(faces.iter().all(Mat4::is_finite));
    }
}
