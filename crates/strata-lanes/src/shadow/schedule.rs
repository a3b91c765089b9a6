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

//! Per-frame shadow registration and re-render scheduling.

use strata_core::config::ShadowSettings;

/// Maximum number of shadowed spot lights per frame.
pub const MAX_SPOT_SHADOWS: u32 = 4;
/// Maximum number of shadowed point lights per frame.
pub const MAX_POINT_SHADOWS: u32 = 2;

/// The three independently scheduled shadow map kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowKind {
    /// Directional cascades.
    Cascades,
    /// Spot light maps.
    Spot,
    /// Point light cube faces.
    Point,
}

impl ShadowKind {
    const fn slot(self) -> usize {
        match self {
            ShadowKind::Cascades => 0,
            ShadowKind::Spot => 1,
            ShadowKind::Point => 2,
        }
    }
}

/// Frame counter, registration counts and re-render cadence.
///
/// Registrations are first come first served and reset every frame, so an
/// index only identifies a light within the frame it was handed out.
#[derive(Debug, Clone)]
pub struct ShadowScheduler {
    frame_index: u64,
    update_every: [u32; 3],
    rendered: [bool; 3],
    spot_count: u32,
    point_count: u32,
}

impl ShadowScheduler {
    /// A scheduler using the intervals of `settings`.
    pub fn new(settings: &ShadowSettings) -> Self {
        Self {
            frame_index: 0,
            update_every: [
                settings.cascade_update_every.max(1),
                settings.spot_update_every.max(1),
                settings.point_update_every.max(1),
            ],
            rendered: [false; 3],
            spot_count: 0,
            point_count: 0,
        }
    }

    /// Starts a new frame: clears registrations and advances the counter.
    pub fn begin_frame(&mut self) {
        self.frame_index += 1;
        self.spot_count = 0;
        self.point_count = 0;
    }

    /// Number of frames begun so far.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether `kind` must be re-rendered this frame.
    ///
    /// A kind that has never been rendered is always due.
    pub fn is_due(&self, kind: ShadowKind) -> bool {
        let slot = kind.slot();
        !self.rendered[slot] || self.frame_index % u64::from(self.update_every[slot]) == 0
    }

    /// Records that `kind` was rendered.
    pub fn mark_rendered(&mut self, kind: ShadowKind) {
        self.rendered[kind.slot()] = true;
    }

    /// Forgets every past render, e.g. after the maps were reallocated.
    pub fn invalidate(&mut self) {
        self.rendered = [false; 3];
    }

    /// Hands out the next spot shadow index, or `None` once the cap is hit.
    pub fn register_spot(&mut self) -> Option<u32> {
        Self::register(&mut self.spot_count, MAX_SPOT_SHADOWS)
    }

    /// Hands out the next point shadow index, or `None` once the cap is hit.
    pub fn register_point(&mut self) -> Option<u32> {
        Self::register(&mut self.point_count, MAX_POINT_SHADOWS)
    }

    fn register(count: &mut u32, max: u32) -> Option<u32> {
        (*count < max).then(|| {
            *count += 1;
            *count - 1
        })
    }

    /// Spot shadows registered this frame.
    pub fn spot_count(&self) -> u32 {
        self.spot_count
    }

    /// Point shadows registered this frame.
    pub fn point_count(&self) -> u32 {
        self.point_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(every: u32) -> ShadowSettings {
        ShadowSettings {
            cascade_update_every: every,
            spot_update_every: every,
            point_update_every: every,
            ..ShadowSettings::default()
        }
    }

    #[test]
    fn indices_restart_every_frame() {
        let mut scheduler = ShadowScheduler::new(&settings(1));
        scheduler.begin_frame();
        assert_eq!(scheduler.spot_count(), 0);
        scheduler.begin_frame();
        let indices: Vec<_> = (0..3).map(|_| scheduler.register_spot()).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn registrations_are_capped() {
        let mut scheduler = ShadowScheduler::new(&settings(1));
        scheduler.begin_frame();
        let spots: Vec<_> = (0..6).map(|_| scheduler.register_spot()).collect();
        assert_eq!(&spots[..4], &[Some(0), Some(1), Some(2), Some(3)]);
        assert_eq!(&spots[4..], &[None, None]);
        assert_eq!(scheduler.register_point(), Some(0));
        assert_eq!(scheduler.register_point(), Some(1));
        assert_eq!(scheduler.register_point(), None);
        assert_eq!(scheduler.point_count(), MAX_POINT_SHADOWS);
    }

    #[test]
    fn throttled_kinds_render_every_nth_frame() {
        let mut scheduler = ShadowScheduler::new(&settings(3));
        let mut rendered_on = Vec::new();
        for _ in 0..7 {
            scheduler.begin_frame();
            if scheduler.is_due(ShadowKind::Spot) {
                rendered_on.push(scheduler.frame_index());
                scheduler.mark_rendered(ShadowKind::Spot);
            }
        }
        assert_eq!(rendered_on, vec![1, 3, 6]);
    }

    #[test]
    fn invalidate_forces_a_render() {
        let mut scheduler = ShadowScheduler::new(&settings(100));
        scheduler.begin_frame();
        scheduler.mark_rendered(ShadowKind::Cascades);
        scheduler.begin_frame();
        assert!(!scheduler.is_due(ShadowKind::Cascades));
        scheduler.invalidate();
        assert!(scheduler.is_due(ShadowKind::Cascades));
    }
}
