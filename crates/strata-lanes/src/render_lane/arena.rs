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

//! The per-frame light arena.
//!
//! Every frame the stable [`Light`] list is animated, transformed into view
//! space and written into a scratch list of [`GpuLight`] records. Nothing in
//! the arena survives the frame: indices into it, shadow slots included, are
//! only meaningful until the next [`LightArena::rebuild`].
//!
//! The records are grouped for instanced volume drawing: points with the
//! camera outside their volume, points with the camera inside, then the same
//! for spots. Each non-empty group is one [`VolumeBatch`].

use std::ops::Range;
use std::sync::Arc;
use strata_core::math::Vec3;
use strata_core::renderer::api::{BufferId, BufferUsage};
use strata_core::renderer::{
    CameraView, GpuLight, GraphicsDevice, GrowableBuffer, Light, LightKind, ResourceError,
    ShadowSlot,
};

/// Lights the storage buffer holds before its first growth.
const MIN_LIGHT_CAPACITY: u64 = 64;

/// Scale applied to light volume meshes so their tessellation covers the lit
/// region. Must match `VOLUME_SCALE` in `light_volume.wgsl`.
pub const VOLUME_SCALE: f32 = 1.05;

/// Returns `true` if a camera at the view-space origin is inside, or close
/// enough for the near plane to clip, the drawn volume of a light centered at
/// `view_position`. The boundary counts as inside.
#[inline]
pub fn camera_inside_volume(view_position: Vec3, radius: f32, near: f32) -> bool {
    view_position.length() <= radius * VOLUME_SCALE + near
}

/// A contiguous run of arena records drawn with one instanced call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBatch {
    /// Sphere or cone.
    pub kind: LightKind,
    /// Whether the camera sits inside every volume of the batch.
    pub camera_inside: bool,
    /// Arena indices, used directly as the instance range.
    pub instances: Range<u32>,
}

fn group_of(kind: LightKind, camera_inside: bool) -> u8 {
    match (kind, camera_inside) {
        (LightKind::Point, false) => 0,
        (LightKind::Point, true) => 1,
        (LightKind::Spot, false) => 2,
        (LightKind::Spot, true) => 3,
    }
}

/// Scratch storage for this frame's view-space lights.
#[derive(Debug)]
pub struct LightArena {
    records: Vec<(u8, GpuLight)>,
    lights: Vec<GpuLight>,
    batches: Vec<VolumeBatch>,
    buffer: GrowableBuffer,
}

impl Default for LightArena {
    fn default() -> Self {
        Self::new()
    }
}

impl LightArena {
    /// An empty arena; the storage buffer is allocated on first upload.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            lights: Vec::new(),
            batches: Vec::new(),
            buffer: GrowableBuffer::new(
                "lights",
                BufferUsage::STORAGE,
                std::mem::size_of::<GpuLight>() as u64,
                MIN_LIGHT_CAPACITY,
            ),
        }
    }

    /// Rebuilds the records for this frame.
    ///
    /// `register` is called in scene order for each shadow-casting light with
    /// its animated world position, and returns the slot it was granted.
    pub fn rebuild<F>(&mut self, lights: &[Light], time: f32, camera: &CameraView, mut register: F)
    where
        F: FnMut(&Light, Vec3) -> ShadowSlot,
    {
        self.records.clear();
        for light in lights {
            let world_position = light.animated_position(time);
            let slot = if light.casts_shadow {
                register(light, world_position)
            } else {
                ShadowSlot::None
            };
            let gpu = GpuLight::from_light(light, world_position, &camera.view).with_shadow_slot(slot);
            let inside = camera_inside_volume(gpu.view_position(), gpu.radius(), camera.near);
            self.records.push((group_of(light.kind, inside), gpu));
        }
        // Stable, so scene order is kept inside each group.
        self.records.sort_by_key(|(group, _)| *group);

        self.lights.clear();
        self.lights.extend(self.records.iter().map(|(_, gpu)| *gpu));

        self.batches.clear();
        let mut start = 0usize;
        while start < self.records.len() {
            let group = self.records[start].0;
            let end = self.records[start..]
                .iter()
                .position(|(g, _)| *g != group)
                .map_or(self.records.len(), |n| start + n);
            self.batches.push(VolumeBatch {
                kind: if group < 2 { LightKind::Point } else { LightKind::Spot },
                camera_inside: group % 2 == 1,
                instances: start as u32..end as u32,
            });
            start = end;
        }
    }

    /// Writes the records to the storage buffer.
    ///
    /// Returns `true` if the buffer was reallocated, invalidating bind groups.
    pub fn upload(&mut self, device: &Arc<dyn GraphicsDevice>) -> Result<bool, ResourceError> {
        self.buffer.write(device, &self.lights)
    }

    /// This frame's records, in batch order.
    pub fn lights(&self) -> &[GpuLight] {
        &self.lights
    }

    /// This frame's volume batches.
    pub fn batches(&self) -> &[VolumeBatch] {
        &self.batches
    }

    /// The storage buffer, once uploaded.
    pub fn buffer_id(&self) -> Option<BufferId> {
        self.buffer.id()
    }

    /// Number of live lights.
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    /// Returns `true` when there are no lights this frame.
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::math::{Extent2D, Mat4};

    fn camera_at_origin() -> CameraView {
        CameraView::new(
            Mat4::IDENTITY,
            Mat4::orthographic_rh(-10.0, 10.0, -10.0, 10.0, 1.0, 100.0),
            1.0,
            100.0,
            Extent2D::new(64, 64),
        )
    }

    fn point_at(z: f32, radius: f32) -> Light {
        Light::point(Vec3::new(0.0, 0.0, z), radius, Vec3::ONE, 1.0, 0.0)
    }

    fn spot_at(z: f32) -> Light {
        Light::spot(Vec3::new(0.0, 0.0, z), Vec3::ZERO, 8.0, Vec3::ONE, 1.0, 15.0, 25.0, 0.0)
    }

    #[test]
    fn boundary_is_inside() {
        assert!(camera_inside_volume(Vec3::new(0.0, 0.0, -6.3), 6.0, 0.0));
        assert!(camera_inside_volume(Vec3::new(3.0, 4.0, 0.0), 5.0 / VOLUME_SCALE, 0.0));
        assert!(!camera_inside_volume(Vec3::new(0.0, 0.0, -6.301), 6.0, 0.0));
    }

    #[test]
    fn inflated_shell_counts_as_inside() {
        // Between the light radius and the drawn mesh.
        assert!(camera_inside_volume(Vec3::new(0.0, 0.0, -6.12), 6.0, 0.0));
        // Near plane reaching into the mesh.
        assert!(camera_inside_volume(Vec3::new(0.0, 0.0, -6.5), 6.0, 0.5));
        assert!(!camera_inside_volume(Vec3::new(0.0, 0.0, -6.5), 6.0, 0.1));
    }

    #[test]
    fn camera_just_outside_radius_uses_inside_batch() {
        let mut arena = LightArena::new();
        let mut camera = camera_at_origin();
        camera.near = 0.0;
        let wanted = Vec3::new(0.0, 0.0, -6.12);
        let mut light = point_at(0.0, 6.0);
        light.base_position = wanted - light.animated_position(0.0);
        arena.rebuild(&[light], 0.0, &camera, |_, _| ShadowSlot::None);

        let distance = arena.lights()[0].view_position().length();
        assert!(distance > 6.0 && distance < 6.0 * VOLUME_SCALE);
        assert!(arena.batches()[0].camera_inside);
    }

    #[test]
    fn batches_group_kinds_and_sides() {
        let mut arena = LightArena::new();
        let camera = camera_at_origin();
        let lights = [
            spot_at(-30.0),
            point_at(-20.0, 6.0),
            point_at(-2.0, 6.0),
            spot_at(-40.0),
            point_at(-25.0, 6.0),
        ];
        // Animation moves points by at most ~0.7 at t = 0, which keeps the sides intact.
        arena.rebuild(&lights, 0.0, &camera, |_, _| ShadowSlot::None);

        assert_eq!(arena.len(), 5);
        assert_eq!(
            arena.batches(),
            &[
                VolumeBatch { kind: LightKind::Point, camera_inside: false, instances: 0..2 },
                VolumeBatch { kind: LightKind::Point, camera_inside: true, instances: 2..3 },
                VolumeBatch { kind: LightKind::Spot, camera_inside: false, instances: 3..5 },
            ]
        );
        // Scene order survives inside a group.
        assert!(arena.lights()[0].view_position().z > arena.lights()[1].view_position().z);
    }

    #[test]
    fn shadow_slots_are_requested_in_scene_order() {
        let mut arena = LightArena::new();
        let camera = camera_at_origin();
        let lights = [
            spot_at(-30.0).with_shadow(true),
            point_at(-20.0, 6.0),
            spot_at(-40.0).with_shadow(true),
        ];
        let mut next = 0;
        arena.rebuild(&lights, 0.0, &camera, |light, _| {
            assert_eq!(light.kind, LightKind::Spot);
            next += 1;
            ShadowSlot::Spot(next - 1)
        });
        assert_eq!(next, 2);
        let spots: Vec<f32> = arena
            .lights()
            .iter()
            .filter(|l| l.is_spot())
            .map(|l| l.shadow_info[1])
            .collect();
        assert_eq!(spots, vec![0.0, 1.0]);
    }

    #[test]
    fn rebuild_discards_previous_frame() {
        let mut arena = LightArena::new();
        let camera = camera_at_origin();
        arena.rebuild(&[point_at(-20.0, 6.0), point_at(-30.0, 6.0)], 0.0, &camera, |_, _| {
            ShadowSlot::None
        });
        arena.rebuild(&[], 0.0, &camera, |_, _| ShadowSlot::None);
        assert!(arena.is_empty());
        assert!(arena.batches().is_empty());
    }
}
