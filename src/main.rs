// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

mod agents;
mod backend;
mod config;
mod error;
mod gpu;
#[cfg(test)]
mod mock_backend;
mod orchestrator;
mod params;
mod pipeline;
mod reflect;
mod registry;
mod simulation;
mod ui;
mod uniforms;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use winit::{
    event::{Event, WindowEvent},
    event_loop::EventLoop,
};

use config::ConfigRecord;
use orchestrator::Orchestrator;
use params::ParameterState;
use pipeline::FrameTiming;
use registry::ShaderSetRegistry;
use simulation::{Simulation, WINDOW_SIZE};
use ui::Overlay;

struct Args {
    simulation: Simulation,
    config: PathBuf,
}

fn usage() -> String {
    let names: Vec<_> = Simulation::ALL.iter().map(|s| s.name()).collect();
    format!("usage: visual-simulations <{}> [--config <path>]", names.join("|"))
}

fn parse_args(root: &Path) -> anyhow::Result<Args> {
    let mut args = std::env::args().skip(1);
    let Some(name) = args.next() else {
        bail!("{}", usage());
    };
    let Some(simulation) = Simulation::from_name(&name) else {
        bail!("unknown simulation '{name}'\n{}", usage());
    };

    let mut config = simulation.config_path(root);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = args
                    .next()
                    .map(PathBuf::from)
                    .with_context(|| format!("--config needs a path\n{}", usage()))?;
            }
            other => bail!("unexpected argument '{other}'\n{}", usage()),
        }
    }
    Ok(Args { simulation, config })
}

fn main() -> anyhow::Result<()> {
    use env_logger::Env;
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let Args { simulation, config } = parse_args(root)?;

    // A bad config never opens a window.
    let record = ConfigRecord::load_for(simulation, &config)?;
    let params = ParameterState::from_config(simulation, &record)?;
    let registry = ShaderSetRegistry::scan(simulation.resource_dir(root))?;

    let event_loop = EventLoop::new().context("failed to create event loop")?;
    let window = Arc::new(
        event_loop
            .create_window(
                winit::window::WindowAttributes::default()
                    .with_title(simulation.title())
                    .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_SIZE.0, WINDOW_SIZE.1)),
            )
            .context("failed to create window")?,
    );

    let (backend, mut surface) = pollster::block_on(gpu::init(window.clone()))?;
    let mut overlay = Overlay::new(&window, &backend);
    let mut orch = Orchestrator::new(backend, simulation, registry, params)?;

    let start = Instant::now();
    let mut last_frame = start;
    let mut last_fps_update = start;
    let mut frame_count = 0u32;

    event_loop.run(move |event, target| match event {
        Event::WindowEvent { event, window_id } if window_id == window.id() => {
            overlay.on_window_event(&window, &event);

            match event {
                WindowEvent::CloseRequested => {
                    if let Err(err) = orch.shutdown(&config) {
                        log::error!("{err}");
                    }
                    target.exit();
                }
                WindowEvent::Resized(size) => surface.resize(orch.backend().device(), size),
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let timing = FrameTiming {
                        time: now.duration_since(start).as_secs_f32(),
                        frame_time: now.duration_since(last_frame).as_secs_f32(),
                    };
                    last_frame = now;

                    frame_count += 1;
                    let elapsed = now.duration_since(last_fps_update).as_secs_f32();
                    if elapsed >= 1.0 {
                        let fps = frame_count as f32 / elapsed;
                        window.set_title(&format!("{} - {:.1} FPS", simulation.title(), fps));
                        frame_count = 0;
                        last_fps_update = now;
                    }

                    let (actions, output) = overlay.run(&window, &orch);
                    for action in actions {
                        if let Err(err) = action.apply(&mut orch) {
                            log::warn!("{err}");
                        }
                    }

                    match surface.acquire() {
                        Ok(texture) => {
                            let view = texture
                                .texture
                                .create_view(&wgpu::TextureViewDescriptor::default());
                            let mut frame = orch.backend().begin_frame(view);
                            orch.render_frame(&mut frame, timing);
                            let (width, height) = surface.size();
                            overlay.paint(&window, orch.backend(), &mut frame, output, [width, height]);
                            orch.backend().submit(frame);
                            texture.present();
                        }
                        Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                            surface.resize(orch.backend().device(), window.inner_size())
                        }
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Surface out of memory");
                            target.exit();
                        }
                        Err(err) => log::warn!("{err:?}"),
                    }
                }
                _ => {}
            }
        }
        Event::AboutToWait => window.request_redraw(),
        _ => {}
    })?;

    Ok(())
}
