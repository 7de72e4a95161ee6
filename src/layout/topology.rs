//! Linking, removal and lookup operations on the layout graph
//!
//! All mutation goes through these methods so the cross-links between
//! GPUs, Screens and Displays stay symmetric, and every Display linked to a
//! Screen keeps exactly one Mode per MetaMode.

use tracing::{debug, info};

use super::types::*;
use super::Layout;
use crate::errors::{LayoutError, Result};
use crate::geometry::Rect;

impl Layout {
    // ==========================================================================
    // Display <-> Screen
    // ==========================================================================

    /// Link a display to a screen. Linking twice is a no-op; a display linked
    /// elsewhere is unlinked from its old screen first.
    pub fn link_display_to_screen(&mut self, display: DisplayId, screen: ScreenId) -> Result<()> {
        let current = self.display_or_err(display)?.screen;
        self.screen_or_err(screen)?;
        if current == Some(screen) {
            return Ok(());
        }
        if current.is_some() {
            self.unlink_display_from_screen(display)?;
            // the old screen may have cascaded away, but never the new one
            self.screen_or_err(screen)?;
        }

        if let Some(d) = self.display_mut(display) {
            d.screen = Some(screen);
            d.modes.clear();
            d.cur_mode = None;
        }
        if let Some(s) = self.screen_mut(screen) {
            s.displays.push(display);
        }
        let (display_slot, screen_slot) = (display.0, screen.0);
        debug!(display = display_slot, screen = screen_slot, "Linked display to screen");
        Ok(())
    }

    /// Unlink a display from its screen, freeing its modes. A screen left
    /// without displays is removed from the layout.
    pub fn unlink_display_from_screen(&mut self, display: DisplayId) -> Result<()> {
        let Some(screen_id) = self.display_or_err(display)?.screen else {
            return Ok(());
        };

        self.retarget_display_placements(display);

        if let Some(d) = self.display_mut(display) {
            d.modes.clear();
            d.cur_mode = None;
            d.screen = None;
        }

        let now_empty = match self.screen_mut(screen_id) {
            Some(s) => {
                s.displays.retain(|id| *id != display);
                if s.primary_display == Some(display) {
                    s.primary_display = s.displays.first().copied();
                }
                s.displays.is_empty()
            }
            None => false,
        };
        let (display_slot, screen_slot) = (display.0, screen_id.0);
        debug!(display = display_slot, screen = screen_slot, "Unlinked display from screen");

        if now_empty {
            info!(screen = screen_id.0, "Screen lost its last display, removing it");
            self.remove_screen(screen_id)?;
        }
        Ok(())
    }

    /// Displays that may appear in a screen's metamodes: every display of
    /// every GPU driving the screen
    pub fn screen_candidate_displays(&self, screen: ScreenId) -> Vec<DisplayId> {
        let Some(s) = self.screen(screen) else {
            return Vec::new();
        };
        s.gpus
            .iter()
            .filter_map(|gpu| self.gpu(*gpu))
            .flat_map(|gpu| gpu.displays.iter().copied())
            .collect()
    }

    pub fn set_primary_display(&mut self, screen: ScreenId, display: DisplayId) -> Result<()> {
        if self.display_or_err(display)?.screen != Some(screen) {
            return Err(LayoutError::invariant(format!(
                "display {:?} is not linked to screen {:?}",
                display, screen
            )));
        }
        if let Some(s) = self.screen_mut(screen) {
            s.primary_display = Some(display);
        }
        Ok(())
    }

    // ==========================================================================
    // Display <-> Gpu
    // ==========================================================================

    /// Remove a display from its GPU and the layout. Its modes and
    /// modelines are released with it.
    pub fn remove_display(&mut self, display: DisplayId) -> Result<Display> {
        self.unlink_display_from_screen(display)?;
        self.retarget_display_placements(display);

        let gpu = self.display_or_err(display)?.gpu;
        if let Some(g) = gpu.and_then(|g| self.gpu_mut(g)) {
            g.displays.retain(|id| *id != display);
        }

        let mut removed = self
            .take_display(display)
            .ok_or_else(|| LayoutError::missing(format!("display {:?}", display)))?;
        removed.modes.clear();
        removed.modelines.clear();
        removed.gpu = None;
        info!(display = %removed.names.target_id, "Removed display");
        Ok(removed)
    }

    // ==========================================================================
    // Screen <-> Gpu
    // ==========================================================================

    pub fn link_screen_to_gpu(&mut self, screen: ScreenId, gpu: GpuId) -> Result<()> {
        if self.gpu(gpu).is_none() {
            return Err(LayoutError::missing(format!("GPU {:?}", gpu)));
        }
        let s = self
            .screen_mut(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        if !s.gpus.contains(&gpu) {
            s.gpus.push(gpu);
        }
        if s.display_owner.is_none() {
            self.select_display_owner(screen, None)?;
        }
        Ok(())
    }

    /// Choose the GPU that owns the screen's displays: the reported GPU if
    /// it drives the screen, else the first multi-GPU primary capable one,
    /// else the first GPU.
    pub fn select_display_owner(
        &mut self,
        screen: ScreenId,
        reported: Option<u32>,
    ) -> Result<Option<GpuId>> {
        let gpus = self.screen_or_err(screen)?.gpus.clone();

        let by_report = reported.and_then(|server_id| {
            gpus.iter()
                .copied()
                .find(|g| self.gpu(*g).is_some_and(|gpu| gpu.id == server_id))
        });
        let owner = by_report
            .or_else(|| {
                gpus.iter()
                    .copied()
                    .find(|g| self.gpu(*g).is_some_and(|gpu| gpu.caps.multigpu_primary_capable))
            })
            .or_else(|| gpus.first().copied());

        if let Some(s) = self.screen_mut(screen) {
            s.display_owner = owner;
        }
        Ok(owner)
    }

    /// Stop driving a screen with a GPU. Displays of that GPU leave the
    /// screen; a screen left without GPUs is removed.
    pub fn unlink_screen_from_gpu(&mut self, screen: ScreenId, gpu: GpuId) -> Result<()> {
        let s = self.screen_or_err(screen)?;
        if !s.gpus.contains(&gpu) {
            return Ok(());
        }
        let orphaned: Vec<DisplayId> = s
            .displays
            .iter()
            .copied()
            .filter(|d| self.display(*d).is_some_and(|d| d.gpu == Some(gpu)))
            .collect();

        for display in orphaned {
            self.unlink_display_from_screen(display)?;
            if self.screen(screen).is_none() {
                return Ok(());
            }
        }

        let remaining = match self.screen_mut(screen) {
            Some(s) => {
                s.gpus.retain(|g| *g != gpu);
                if s.display_owner == Some(gpu) {
                    s.display_owner = None;
                }
                s.gpus.len()
            }
            None => return Ok(()),
        };

        if remaining == 0 {
            info!(screen = screen.0, "Screen lost its last GPU, removing it");
            self.remove_screen(screen)?;
        } else {
            self.select_display_owner(screen, None)?;
        }
        Ok(())
    }

    // ==========================================================================
    // Removal from the layout
    // ==========================================================================

    /// Remove a screen. Its metamodes are released and its displays become
    /// unlinked; the remaining screens are renumbered.
    pub fn remove_screen(&mut self, screen: ScreenId) -> Result<Screen> {
        let displays = self.screen_or_err(screen)?.displays.clone();

        for id in self.screen_ids() {
            if let Some(s) = self.screen_mut(id)
                && s.placement.targets(screen)
            {
                s.placement = Placement::Absolute;
            }
        }

        for display in &displays {
            self.retarget_display_placements(*display);
            if let Some(d) = self.display_mut(*display) {
                d.modes.clear();
                d.cur_mode = None;
                d.screen = None;
            }
        }

        let mut removed = self
            .take_screen(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        removed.metamodes.clear();
        removed.displays.clear();
        info!(number = removed.number, "Removed screen");

        self.renumber_screens();
        Ok(removed)
    }

    /// Remove a GPU together with its displays. Screens it drove alone go
    /// with it.
    pub fn remove_gpu(&mut self, gpu: GpuId) -> Result<Gpu> {
        let displays = self
            .gpu(gpu)
            .ok_or_else(|| LayoutError::missing(format!("GPU {:?}", gpu)))?
            .displays
            .clone();
        for display in displays {
            self.remove_display(display)?;
        }

        for screen in self.screen_ids() {
            if self.screen(screen).is_some_and(|s| s.gpus.contains(&gpu)) {
                self.unlink_screen_from_gpu(screen, gpu)?;
            }
        }

        let removed = self
            .take_gpu(gpu)
            .ok_or_else(|| LayoutError::missing(format!("GPU {:?}", gpu)))?;
        info!(gpu = %removed.name, "Removed GPU");
        Ok(removed)
    }

    /// Reset every mode positioned relative to `display` to absolute
    fn retarget_display_placements(&mut self, display: DisplayId) {
        for id in self.display_ids() {
            if let Some(d) = self.display_mut(id) {
                for mode in d.modes.iter_mut().filter(|m| m.placement.targets(display)) {
                    mode.placement = Placement::Absolute;
                }
            }
        }
    }

    // ==========================================================================
    // Numbering and lookup
    // ==========================================================================

    /// Renumber screens to 0..n-1: repeatedly give the next slot to the
    /// lowest-numbered screen not yet assigned, first in list order on ties.
    pub fn renumber_screens(&mut self) {
        let ids = self.screen_ids();
        let original: Vec<i32> = ids
            .iter()
            .map(|id| self.screen(*id).map(|s| s.number).unwrap_or(i32::MAX))
            .collect();
        let mut assigned = vec![false; ids.len()];

        for slot in 0..ids.len() {
            let mut lowest: Option<usize> = None;
            for (idx, number) in original.iter().enumerate() {
                if assigned[idx] {
                    continue;
                }
                if lowest.is_none_or(|l| *number < original[l]) {
                    lowest = Some(idx);
                }
            }
            if let Some(idx) = lowest {
                assigned[idx] = true;
                if let Some(s) = self.screen_mut(ids[idx]) {
                    s.number = slot as i32;
                }
            }
        }
    }

    /// GPU-qualified name that stays unique across GPUs, e.g.
    /// `GPU-1234.DP-0`
    pub fn stable_display_name(&self, display: DisplayId) -> Option<String> {
        let d = self.display(display)?;
        let gpu = d.gpu.and_then(|g| self.gpu(g))?;
        Some(format!("{}.{}", gpu.uuid, d.names.randr))
    }

    pub fn find_display_by_name(&self, name: &str) -> Option<DisplayId> {
        self.find_display_by_name_in(&self.display_ids(), name)
    }

    /// Exact names are tried on every candidate before the generic
    /// connector class is considered; the first generic match wins.
    pub fn find_display_by_name_in(&self, candidates: &[DisplayId], name: &str) -> Option<DisplayId> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let exact = candidates.iter().copied().find(|id| {
            self.display(*id).is_some_and(|d| {
                d.names.exact_names().any(|n| n.eq_ignore_ascii_case(name))
            }) || self
                .stable_display_name(*id)
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        });

        exact.or_else(|| {
            candidates.iter().copied().find(|id| {
                self.display(*id)
                    .is_some_and(|d| d.names.type_base.eq_ignore_ascii_case(name))
            })
        })
    }

    /// The display's mode that best matches `modeline`: same visible size
    /// first, then a matching ViewPortIn, then a matching ViewPortOut. The
    /// first candidate found in a tier is kept.
    pub fn closest_mode_for_modeline(&self, display: DisplayId, modeline: &ModeLine) -> Option<usize> {
        let d = self.display(display)?;
        let target = modeline.size();
        let mut best: Option<(u8, usize)> = None;

        for (idx, mode) in d.modes.iter().enumerate() {
            let tier = if d.modeline_of(mode).is_some_and(|ml| ml.size() == target) {
                1
            } else if mode.viewport_in == target {
                2
            } else if mode.viewport_out.size() == target {
                3
            } else {
                continue;
            };

            if best.is_none_or(|(current, _)| tier < current) {
                best = Some((tier, idx));
            }
            if tier == 1 {
                break;
            }
        }
        best.map(|(_, idx)| idx)
    }

    // ==========================================================================
    // MetaModes
    // ==========================================================================

    /// Union of the panning domains of the metamode's active modes
    pub fn metamode_bounding_box(&self, screen: ScreenId, index: usize) -> Option<Rect> {
        let s = self.screen(screen)?;
        s.displays
            .iter()
            .filter_map(|id| self.display(*id))
            .filter_map(|d| d.modes.get(index))
            .filter(|m| !m.is_null())
            .map(|m| m.pan)
            .reduce(|acc, pan| acc.union(&pan))
    }

    /// Pad every linked display with trailing dummy modes until it has one
    /// mode per metamode. Dummies copy the placement of the display's most
    /// recent real mode.
    pub fn repair_metamode_alignment(&mut self, screen: ScreenId) -> Result<()> {
        let s = self.screen_or_err(screen)?;
        let count = s.metamodes.len();
        let displays = s.displays.clone();

        for id in displays {
            if let Some(d) = self.display_mut(id)
                && d.modes.len() < count
            {
                let template = d.last_real_mode().cloned().unwrap_or_default();
                let missing = count - d.modes.len();
                d.modes
                    .extend(std::iter::repeat_with(|| Mode::dummy_like(&template)).take(missing));
                debug!(display = %d.names.target_id, added = missing, "Padded display with dummy modes");
            }
        }
        Ok(())
    }

    /// Remove a metamode and the matching mode of every linked display
    pub fn remove_metamode(&mut self, screen: ScreenId, index: usize) -> Result<MetaMode> {
        let s = self
            .screen_mut(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        if index >= s.metamodes.len() {
            return Err(LayoutError::missing(format!(
                "metamode {} of screen {}",
                index, s.number
            )));
        }
        let removed = s.metamodes.remove(index);
        let remaining = s.metamodes.len();
        s.cur_metamode = match s.cur_metamode {
            _ if remaining == 0 => None,
            Some(cur) if cur > index => Some(cur - 1),
            Some(cur) if cur == index => Some(0),
            other => other,
        };
        let cur = s.cur_metamode;
        let displays = s.displays.clone();

        for id in displays {
            if let Some(d) = self.display_mut(id) {
                if index < d.modes.len() {
                    d.modes.remove(index);
                }
                d.cur_mode = cur;
            }
        }
        Ok(removed)
    }

    pub fn set_current_metamode(&mut self, screen: ScreenId, index: usize) -> Result<()> {
        let s = self
            .screen_mut(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        if index >= s.metamodes.len() {
            return Err(LayoutError::missing(format!(
                "metamode {} of screen {}",
                index, s.number
            )));
        }
        s.cur_metamode = Some(index);
        let displays = s.displays.clone();
        for id in displays {
            if let Some(d) = self.display_mut(id) {
                d.cur_mode = Some(index);
            }
        }
        Ok(())
    }

    // ==========================================================================
    // Placement
    // ==========================================================================

    /// Place one mode relative to another display of the same screen
    pub fn set_mode_placement(
        &mut self,
        display: DisplayId,
        index: usize,
        placement: Placement<DisplayId>,
    ) -> Result<()> {
        let screen = self.display_or_err(display)?.screen;
        if let Some(target) = placement.target() {
            if target == display {
                return Err(LayoutError::invariant("a display cannot be placed relative to itself"));
            }
            if self.display_or_err(target)?.screen != screen {
                return Err(LayoutError::invariant(format!(
                    "display {:?} is not on the same screen as {:?}",
                    target, display
                )));
            }
        }
        let mode = self
            .display_mut(display)
            .and_then(|d| d.modes.get_mut(index))
            .ok_or_else(|| LayoutError::missing(format!("mode {} of display {:?}", index, display)))?;
        mode.placement = placement;
        Ok(())
    }

    pub fn set_screen_placement(&mut self, screen: ScreenId, placement: Placement<ScreenId>) -> Result<()> {
        if let Some(target) = placement.target() {
            if target == screen {
                return Err(LayoutError::invariant("a screen cannot be placed relative to itself"));
            }
            self.screen_or_err(target)?;
        }
        let s = self
            .screen_mut(screen)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", screen)))?;
        s.placement = placement;
        Ok(())
    }

    /// Turn relative placements of one metamode into absolute pan offsets.
    /// Chains settle within one pass per display; cycles stop there too.
    pub fn resolve_relative_positions(&mut self, screen: ScreenId, index: usize) -> Result<()> {
        let displays = self.screen_or_err(screen)?.displays.clone();

        for _ in 0..displays.len() {
            let mut changed = false;
            for id in &displays {
                let Some(mode) = self.display(*id).and_then(|d| d.modes.get(index)) else {
                    continue;
                };
                let Placement::Relative { kind, target } = mode.placement else {
                    continue;
                };
                let Some(anchor) = self.display(target).and_then(|d| d.modes.get(index)).map(|m| m.pan) else {
                    continue;
                };

                let pan = mode.pan;
                let (x, y) = match kind {
                    RelativeKind::RightOf => (anchor.right(), anchor.top()),
                    RelativeKind::LeftOf => (anchor.left().saturating_sub(pan.width), anchor.top()),
                    RelativeKind::Above => (anchor.left(), anchor.top().saturating_sub(pan.height)),
                    RelativeKind::Below => (anchor.left(), anchor.bottom()),
                    RelativeKind::Clones => (anchor.left(), anchor.top()),
                };
                if (x, y) != (pan.x, pan.y)
                    && let Some(m) = self.display_mut(*id).and_then(|d| d.modes.get_mut(index))
                {
                    m.pan.x = x;
                    m.pan.y = y;
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        Ok(())
    }
}
