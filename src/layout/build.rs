//! Build a whole [`Layout`] from a [`QuerySource`]

use tracing::{debug, info};

use super::{Display, Gpu, Layout, Screen};
use crate::config::Settings;
use crate::errors::{LayoutError, Result};
use crate::parse::metamode::add_metamodes;
use crate::parse::modeline::{parse_modelines, RefreshContext};
use crate::parse::server_info::{parse_aux_displays, parse_screen_rect};
use crate::query::{QuerySource, ScreenInfo};

/// A built layout plus every recoverable problem met on the way
#[derive(Debug)]
pub struct BuildOutcome {
    pub layout: Layout,
    pub warnings: Vec<LayoutError>,
}

/// Query everything and assemble the layout. Any query error aborts the
/// build and the partial layout is dropped; parse problems are collected as
/// warnings.
pub fn build_layout(source: &dyn QuerySource, settings: &Settings) -> Result<BuildOutcome> {
    let mut layout = Layout::new();
    let mut warnings = Vec::new();

    add_gpus(&mut layout, source, settings, &mut warnings)?;
    for info in source.screens()? {
        add_screen(&mut layout, source, &info, settings, &mut warnings)?;
    }

    let (aux, errors) = parse_aux_displays(&source.aux_displays()?, settings);
    layout.aux_displays = aux;
    warnings.extend(errors);

    layout.renumber_screens();

    info!(
        gpus = layout.gpu_ids().len(),
        screens = layout.screen_ids().len(),
        displays = layout.display_ids().len(),
        warnings = warnings.len(),
        "Built display layout"
    );
    Ok(BuildOutcome { layout, warnings })
}

fn add_gpus(
    layout: &mut Layout,
    source: &dyn QuerySource,
    settings: &Settings,
    warnings: &mut Vec<LayoutError>,
) -> Result<()> {
    let serial_table = settings.serial_video_table();

    for info in source.gpus()? {
        let mut gpu = Gpu::new(info.id, &info.name, &info.uuid);
        gpu.aggregation = info.aggregation;
        gpu.caps = info.caps;
        gpu.doublescan_in_vtotal = info
            .doublescan_in_vtotal
            .unwrap_or(settings.doublescan_in_vtotal);
        let doublescan_in_vtotal = gpu.doublescan_in_vtotal;
        let gpu_id = layout.add_gpu(gpu);

        for display_info in source.displays(info.id)? {
            let serial_video = display_info.serial_video.then(|| serial_table.clone());
            let ctx = RefreshContext {
                serial_video: serial_video.as_deref(),
                doublescan_in_vtotal,
            };
            let list = source.modelines(display_info.target_id)?;
            let (modelines, errors) = parse_modelines(&list, &ctx, settings);
            warnings.extend(errors);

            debug!(
                display = %display_info.names.target_id,
                gpu = info.id,
                modelines = modelines.len(),
                "Adding display"
            );
            let mut display = Display::new(display_info.target_id, display_info.names);
            display.modelines = modelines;
            display.serial_video = serial_video;
            layout.add_display(gpu_id, display)?;
        }
    }
    Ok(())
}

fn add_screen(
    layout: &mut Layout,
    source: &dyn QuerySource,
    info: &ScreenInfo,
    settings: &Settings,
    warnings: &mut Vec<LayoutError>,
) -> Result<()> {
    let screen = layout.add_screen(Screen::new(info.number));

    for server_id in &info.gpus {
        let gpu = layout.find_gpu_by_server_id(*server_id).ok_or_else(|| {
            LayoutError::query(
                "screens",
                format!("screen {} is driven by unknown GPU {}", info.number, server_id),
            )
        })?;
        layout.link_screen_to_gpu(screen, gpu)?;
    }
    layout.select_display_owner(screen, info.display_owner)?;

    match parse_screen_rect(&source.screen_rect(info.number)?) {
        Ok(rect) => {
            if let Some(s) = layout.screen_mut(screen) {
                s.rect = rect;
            }
        }
        Err(err) => {
            settings.report(&err);
            warnings.push(err);
        }
    }

    let list = source.metamodes(info.number)?;
    let current = source.current_metamode(info.number)?;
    warnings.extend(add_metamodes(layout, screen, &list, current.as_deref(), settings));

    if let Some(name) = &info.primary_display {
        let linked = layout.screen_or_err(screen)?.displays.clone();
        match layout.find_display_by_name_in(&linked, name) {
            Some(display) => layout.set_primary_display(screen, display)?,
            None => {
                let err = LayoutError::missing(format!(
                    "primary display '{}' is not on screen {}",
                    name, info.number
                ));
                settings.report(&err);
                warnings.push(err);
            }
        }
    }
    Ok(())
}
