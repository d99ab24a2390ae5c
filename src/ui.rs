// Visual Simulations - GPU Compute Canvas Orchestrator
// Copyright (c) 2025 Visual Simulations contributors
// Licensed under MIT License

use egui_wgpu::ScreenDescriptor;
use winit::window::Window;

use crate::backend::Backend;
use crate::error::SimError;
use crate::gpu::{GpuFrame, WgpuBackend};
use crate::orchestrator::Orchestrator;
use crate::params::{ParamId, ParamKind, ParamValue};

/// Requests collected while drawing the overlay, applied before the frame is encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    SetParam(ParamId, ParamValue),
    SelectShaderSet(String),
    Reset,
}

impl UiAction {
    pub fn apply<B: Backend>(self, orch: &mut Orchestrator<B>) -> Result<(), SimError> {
        match self {
            UiAction::SetParam(id, value) => orch.set_param(id, value),
            UiAction::SelectShaderSet(set) => orch.select_shader_set(&set),
            UiAction::Reset => orch.reset(),
        }
    }
}

pub struct Overlay {
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl Overlay {
    pub fn new(window: &Window, backend: &WgpuBackend) -> Self {
        let state = egui_winit::State::new(
            egui::Context::default(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
            None,
        );
        let renderer =
            egui_wgpu::Renderer::new(backend.device(), backend.surface_format(), None, 1, false);
        Self { state, renderer }
    }

    pub fn on_window_event(&mut self, window: &Window, event: &winit::event::WindowEvent) {
        // Nothing else listens for input, so the consumed flag is irrelevant.
        let _ = self.state.on_window_event(window, event);
    }

    /// Run the UI for this frame. Nothing is painted until [`Overlay::paint`].
    pub fn run<B: Backend>(
        &mut self,
        window: &Window,
        orch: &Orchestrator<B>,
    ) -> (Vec<UiAction>, egui::FullOutput) {
        let raw_input = self.state.take_egui_input(window);
        let mut actions = Vec::new();
        let full_output = self
            .state
            .egui_ctx()
            .run(raw_input, |ctx| controls(ctx, orch, &mut actions));
        (actions, full_output)
    }

    pub fn paint(
        &mut self,
        window: &Window,
        backend: &WgpuBackend,
        frame: &mut GpuFrame,
        output: egui::FullOutput,
        size_in_pixels: [u32; 2],
    ) {
        self.state
            .handle_platform_output(window, output.platform_output);

        let clipped_primitives = self
            .state
            .egui_ctx()
            .tessellate(output.shapes, output.pixels_per_point);
        let screen_descriptor = ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: output.pixels_per_point,
        };

        for (id, image_delta) in &output.textures_delta.set {
            self.renderer
                .update_texture(backend.device(), backend.queue(), *id, image_delta);
        }
        self.renderer.update_buffers(
            backend.device(),
            backend.queue(),
            &mut frame.encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut rpass = frame
                .encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui Render Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &frame.view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                })
                .forget_lifetime();
            self.renderer
                .render(&mut rpass, &clipped_primitives, &screen_descriptor);
        }

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}

fn rgb_changed(ui: &mut egui::Ui, label: &str, rgb: [f32; 3]) -> Option<[f32; 3]> {
    let mut rgb = rgb;
    ui.horizontal(|ui| {
        let changed = ui.color_edit_button_rgb(&mut rgb).changed();
        ui.label(label);
        changed
    })
    .inner
    .then_some(rgb)
}

fn param_slider<B: Backend>(
    ui: &mut egui::Ui,
    orch: &Orchestrator<B>,
    id: ParamId,
    actions: &mut Vec<UiAction>,
) {
    let range = id.range();
    match (id.kind(), orch.params().get(id)) {
        (ParamKind::Scalar, Some(ParamValue::Scalar(mut v))) => {
            let slider = egui::Slider::new(&mut v, *range.start() as f32..=*range.end() as f32)
                .text(id.label())
                .logarithmic(id == ParamId::Zoom);
            if ui.add(slider).changed() {
                actions.push(UiAction::SetParam(id, ParamValue::Scalar(v)));
            }
        }
        (ParamKind::Integer, Some(ParamValue::Integer(mut v))) => {
            let slider = egui::Slider::new(&mut v, *range.start() as i64..=*range.end() as i64)
                .text(id.label())
                .logarithmic(id == ParamId::AgentCount);
            if ui.add(slider).changed() {
                actions.push(UiAction::SetParam(id, ParamValue::Integer(v)));
            }
        }
        _ => {}
    }
}

/// The control panel. Reads the orchestrator, never mutates it.
pub fn controls<B: Backend>(ctx: &egui::Context, orch: &Orchestrator<B>, actions: &mut Vec<UiAction>) {
    let params = orch.params();
    egui::SidePanel::left("simulation_controls")
        .default_width(300.0)
        .resizable(true)
        .show(ctx, |ui| {
            ui.heading("COLORS");
            if let Some(rgb) = rgb_changed(ui, ParamId::ForegroundColor.label(), params.foreground()) {
                actions.push(UiAction::SetParam(ParamId::ForegroundColor, ParamValue::Color(rgb)));
            }
            if let Some(rgb) = rgb_changed(ui, ParamId::BackgroundColor.label(), params.background()) {
                actions.push(UiAction::SetParam(ParamId::BackgroundColor, ParamValue::Color(rgb)));
            }

            ui.separator();
            ui.heading("COMPUTE SHADERS");
            ui.horizontal_wrapped(|ui| {
                for set in orch.shader_sets() {
                    let active = set == orch.active_shader_set();
                    if ui.selectable_label(active, set.as_str()).clicked() && !active {
                        actions.push(UiAction::SelectShaderSet(set.clone()));
                    }
                }
            });

            let sliders: Vec<ParamId> = orch
                .simulation()
                .tunables()
                .iter()
                .copied()
                .filter(|id| id.kind() != ParamKind::Color)
                .collect();
            if !sliders.is_empty() {
                ui.separator();
                ui.heading("PARAMETERS");
                for id in sliders {
                    param_slider(ui, orch, id, actions);
                }
            }

            ui.separator();
            if orch.simulation().uses_agents() {
                let pending = params.pending_agent_count().unwrap_or_default();
                let active = orch.active_agent_count();
                ui.label(format!("Agents: {active} active"));
                if pending != active as i64 {
                    ui.label(
                        egui::RichText::new(format!("{pending} pending, applied on reset"))
                            .color(egui::Color32::from_rgb(220, 180, 60)),
                    );
                }
            }
            if ui.button("Reset").clicked() {
                actions.push(UiAction::Reset);
            }

            if let Some(err) = orch.last_error() {
                ui.separator();
                ui.label(egui::RichText::new(err).color(egui::Color32::from_rgb(230, 80, 80)));
            }
        });
}
