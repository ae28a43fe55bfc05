use winit::window::Window;

use crate::coords::Viewport;
use crate::device::{Gpu, SurfaceErrorAction};
use crate::input::{InputFrame, InputState};
use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget, WgpuDevice};
use crate::time::FrameTime;

use super::app::AppControl;

/// The window being drawn.
pub struct WindowCtx<'a> {
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Window size in logical pixels.
    pub fn viewport(&self) -> Viewport {
        let logical: winit::dpi::LogicalSize<f64> =
            self.window.inner_size().to_logical(self.window.scale_factor());
        Viewport::new(logical.width as f32, logical.height as f32)
    }

    #[inline]
    pub fn scale_factor(&self) -> f32 {
        self.window.scale_factor() as f32
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// `'a` is the callback, `'w` the window borrow held by `Gpu<'w>`.
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub gpu: &'a mut Gpu<'w>,
    pub device: &'a mut WgpuDevice,
    pub input: &'a InputState,
    pub input_frame: &'a InputFrame,
    pub time: FrameTime,
}

impl FrameCtx<'_, '_> {
    /// Clears the surface to `clear`, lets `record` submit geometry to the
    /// device, then encodes the recorded draws and presents.
    ///
    /// `record` is not called when no swapchain image could be acquired.
    pub fn render<F>(&mut self, clear: Color, record: F) -> AppControl
    where
        F: FnOnce(&mut WgpuDevice) -> anyhow::Result<()>,
    {
        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                return match self.gpu.handle_surface_error(err) {
                    SurfaceErrorAction::Fatal => AppControl::Exit,
                    _ => AppControl::Continue,
                };
            }
        };

        // Clear pass; dropped before the batch pass borrows the encoder.
        {
            let _rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("atlas clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: clear.a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        if let Err(e) = record(&mut *self.device) {
            log::error!("frame submission failed: {e:#}");
            return AppControl::Exit;
        }

        let rctx = RenderCtx::new(
            self.gpu.device(),
            self.gpu.queue(),
            self.gpu.surface_format(),
            self.window.viewport(),
            self.window.scale_factor(),
        );

        {
            let mut target = RenderTarget::new(&mut frame.encoder, &frame.view, frame.size);
            self.device.encode(&rctx, &mut target);
        }

        self.window.window.pre_present_notify();
        self.gpu.submit(frame);

        AppControl::Continue
    }
}
