//! In-memory display topology
//!
//! The [`Layout`] owns every GPU and X screen. Displays belong to their GPU
//! but are stored in a layout-wide arena so Screens and Modes can refer to
//! them by [`DisplayId`]. Slots of removed entities are cleared, never reused.

pub mod build;
pub mod topology;
pub mod types;

pub use build::{build_layout, BuildOutcome};
pub use types::*;

use crate::errors::{LayoutError, Result};

#[derive(Debug, Default)]
pub struct Layout {
    gpus: Vec<Option<Gpu>>,
    screens: Vec<Option<Screen>>,
    displays: Vec<Option<Display>>,
    /// Displays placed on the desktop outside of any Screen
    pub aux_displays: Vec<AuxDisplay>,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_gpu(&mut self, gpu: Gpu) -> GpuId {
        self.gpus.push(Some(gpu));
        GpuId(self.gpus.len() - 1)
    }

    pub fn add_screen(&mut self, screen: Screen) -> ScreenId {
        self.screens.push(Some(screen));
        ScreenId(self.screens.len() - 1)
    }

    /// Hand ownership of `display` to `gpu`
    pub fn add_display(&mut self, gpu: GpuId, mut display: Display) -> Result<DisplayId> {
        if self.gpu(gpu).is_none() {
            return Err(LayoutError::missing(format!("GPU {:?}", gpu)));
        }
        display.gpu = Some(gpu);
        display.screen = None;
        self.displays.push(Some(display));
        let id = DisplayId(self.displays.len() - 1);
        if let Some(g) = self.gpu_mut(gpu) {
            g.displays.push(id);
        }
        Ok(id)
    }

    pub fn gpu(&self, id: GpuId) -> Option<&Gpu> {
        self.gpus.get(id.0).and_then(Option::as_ref)
    }

    pub fn gpu_mut(&mut self, id: GpuId) -> Option<&mut Gpu> {
        self.gpus.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn screen(&self, id: ScreenId) -> Option<&Screen> {
        self.screens.get(id.0).and_then(Option::as_ref)
    }

    pub fn screen_mut(&mut self, id: ScreenId) -> Option<&mut Screen> {
        self.screens.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn display(&self, id: DisplayId) -> Option<&Display> {
        self.displays.get(id.0).and_then(Option::as_ref)
    }

    pub fn display_mut(&mut self, id: DisplayId) -> Option<&mut Display> {
        self.displays.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn gpu_ids(&self) -> Vec<GpuId> {
        live_ids(&self.gpus).map(GpuId).collect()
    }

    pub fn screen_ids(&self) -> Vec<ScreenId> {
        live_ids(&self.screens).map(ScreenId).collect()
    }

    pub fn display_ids(&self) -> Vec<DisplayId> {
        live_ids(&self.displays).map(DisplayId).collect()
    }

    /// Screens in ascending screen-number order
    pub fn screens_by_number(&self) -> Vec<ScreenId> {
        let mut ids = self.screen_ids();
        ids.sort_by_key(|id| self.screen(*id).map(|s| s.number).unwrap_or(i32::MAX));
        ids
    }

    pub fn find_gpu_by_server_id(&self, server_id: u32) -> Option<GpuId> {
        self.gpu_ids()
            .into_iter()
            .find(|id| self.gpu(*id).is_some_and(|g| g.id == server_id))
    }

    pub fn find_screen_by_number(&self, number: i32) -> Option<ScreenId> {
        self.screen_ids()
            .into_iter()
            .find(|id| self.screen(*id).is_some_and(|s| s.number == number))
    }

    pub fn find_display_by_target(&self, target_id: u32) -> Option<DisplayId> {
        self.display_ids()
            .into_iter()
            .find(|id| self.display(*id).is_some_and(|d| d.target_id == target_id))
    }

    pub(crate) fn screen_or_err(&self, id: ScreenId) -> Result<&Screen> {
        self.screen(id)
            .ok_or_else(|| LayoutError::missing(format!("screen {:?}", id)))
    }

    pub(crate) fn display_or_err(&self, id: DisplayId) -> Result<&Display> {
        self.display(id)
            .ok_or_else(|| LayoutError::missing(format!("display {:?}", id)))
    }

    pub(crate) fn take_display(&mut self, id: DisplayId) -> Option<Display> {
        self.displays.get_mut(id.0).and_then(Option::take)
    }

    pub(crate) fn take_screen(&mut self, id: ScreenId) -> Option<Screen> {
        self.screens.get_mut(id.0).and_then(Option::take)
    }

    pub(crate) fn take_gpu(&mut self, id: GpuId) -> Option<Gpu> {
        self.gpus.get_mut(id.0).and_then(Option::take)
    }
}

fn live_ids<T>(arena: &[Option<T>]) -> impl Iterator<Item = usize> + '_ {
    arena
        .iter()
        .enumerate()
        .filter_map(|(idx, slot)| slot.as_ref().map(|_| idx))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_add_display_links_gpu() {
        let (layout, _screen, d1, d2) = two_display_layout();
        let gpu = layout.display(d1).unwrap().gpu.unwrap();
        assert_eq!(layout.gpu(gpu).unwrap().displays, vec![d1, d2]);
        assert_eq!(layout.find_display_by_target(2), Some(d2));
    }

    #[test]
    fn test_add_display_to_unknown_gpu() {
        let mut layout = Layout::new();
        let result = layout.add_display(GpuId(3), Display::new(1, DisplayNames::default()));
        assert!(matches!(result, Err(LayoutError::MissingReference(_))));
    }

    #[test]
    fn test_screens_by_number() {
        let mut layout = Layout::new();
        let a = layout.add_screen(Screen::new(2));
        let b = layout.add_screen(Screen::new(0));
        assert_eq!(layout.screens_by_number(), vec![b, a]);
        assert_eq!(layout.find_screen_by_number(2), Some(a));
    }
}
