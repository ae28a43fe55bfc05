use anyhow::{Context, Result};
use winit::dpi::LogicalSize;

use atlas_engine::coords::{PixelRect, Vec2, Viewport};
use atlas_engine::core::{App, AppControl, FrameCtx};
use atlas_engine::device::GpuInit;
use atlas_engine::input::{InputState, Key};
use atlas_engine::logging::{init_logging, LoggingConfig};
use atlas_engine::paint::Color;
use atlas_engine::render::{
    FrameRenderer, RenderDevice, RenderState, RendererConfig, Sprite, TextureFormat, TextureId,
    TextureSize, WgpuDevice,
};
use atlas_engine::text::{AtlasConfig, FontRasterizer, GlyphAtlas};
use atlas_engine::time::FixedStep;
use atlas_engine::window::{Runtime, RuntimeConfig};

const FONT_PX: f32 = 24.0;
const CHECKER: u32 = 16;
const PLAYER_SPEED: f32 = 240.0;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let font = load_font()?;
    let config = RuntimeConfig {
        title: "atlas demo".to_string(),
        initial_size: LogicalSize::new(960.0, 600.0),
        ..Default::default()
    };

    Runtime::run(config, GpuInit::default(), Demo { font, scene: None })
}

/// `ATLAS_FONT` if set, otherwise the first common system font found.
fn load_font() -> Result<Vec<u8>> {
    if let Ok(path) = std::env::var("ATLAS_FONT") {
        return std::fs::read(&path).with_context(|| format!("failed to read font {path}"));
    }

    [
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/noto/NotoSans-Regular.ttf",
        "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
        "C:\\Windows\\Fonts\\arial.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
    .context("no system font found; set ATLAS_FONT to a .ttf file")
}

// ── app ───────────────────────────────────────────────────────────────────

struct Demo {
    font: Vec<u8>,
    scene: Option<Scene>,
}

struct Scene {
    renderer: FrameRenderer,
    atlas: GlyphAtlas,
    checker: TextureId,
    line_height: f32,
    step: FixedStep,
    world: World,
}

impl App for Demo {
    fn on_start(&mut self, device: &mut WgpuDevice) -> Result<()> {
        let raster = FontRasterizer::from_bytes(&self.font, FONT_PX)?;
        let atlas = GlyphAtlas::build(device, &raster, AtlasConfig::default())
            .context("failed to build glyph atlas")?;

        let size = atlas.size();
        log::info!("glyph atlas: {} glyphs in {}x{}", atlas.len(), size.width, size.height);

        let mut renderer = FrameRenderer::new(device, RendererConfig::default())?;
        renderer.bind_atlas(&atlas);

        let checker = device.create_texture(&checkerboard(CHECKER), CHECKER, CHECKER, TextureFormat::Rgba8)?;
        renderer.bind_texture(checker, TextureSize::new(CHECKER, CHECKER));

        self.scene = Some(Scene {
            renderer,
            line_height: raster.line_height().unwrap_or(FONT_PX * 1.2),
            atlas,
            checker,
            step: FixedStep::default(),
            world: World::new(),
        });
        Ok(())
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if ctx.input_frame.quit_requested() {
            return AppControl::Exit;
        }
        let Some(scene) = self.scene.as_mut() else {
            return AppControl::Continue;
        };

        let viewport = ctx.window.viewport();
        for _ in 0..scene.step.advance(ctx.time.dt) {
            scene.world.update(scene.step.step(), ctx.input, viewport);
        }

        let fps = 1.0 / ctx.time.dt.max(1e-4);
        ctx.render(Color::from_rgba_u8(24, 26, 33, 255), |device| scene.draw(device, viewport, fps))
    }
}

impl Scene {
    fn draw(&mut self, device: &mut WgpuDevice, viewport: Viewport, fps: f32) -> Result<()> {
        let r = &mut self.renderer;
        r.begin_frame();

        // World: depth-tested, opaque.
        let tile = CHECKER as f32 * 4.0;
        let mut x = 0.0;
        while x < viewport.width {
            r.draw_sprite(
                RenderState::Opaque,
                &Sprite::new(self.checker, PixelRect::new(0, 0, CHECKER, CHECKER), Vec2::new(x, viewport.height - tile), Vec2::splat(tile)),
            );
            x += tile;
        }
        for orb in &self.world.orbs {
            r.draw_circle(RenderState::Opaque, orb.pos, orb.radius, orb.color);
        }
        let facing_left = self.world.facing < 0.0;
        r.draw_sprite(
            RenderState::Opaque,
            &Sprite::new(self.checker, PixelRect::new(0, 0, CHECKER / 2, CHECKER), self.world.player, Vec2::new(32.0, 64.0))
                .with_color(Color::from_rgba_u8(255, 200, 120, 255))
                .flipped(facing_left, false),
        );

        // UI: alpha-blended, drawn over the world.
        let panel = Color::from_straight(0.0, 0.0, 0.0, 0.55);
        r.draw_solid_rect(RenderState::AlphaBlended, Vec2::new(12.0, 12.0), Vec2::new(420.0, self.line_height * 3.0 + 16.0), panel);

        let lines = [
            format!("{fps:5.1} fps   {} draws last frame", r.last_stats().draw_calls),
            format!("orbs: {}   arrows/WASD move", self.world.orbs.len()),
            "Esc quits".to_string(),
        ];
        let mut pen = Vec2::new(24.0, 20.0 + FONT_PX);
        for line in &lines {
            r.draw_text(RenderState::AlphaBlended, &self.atlas, line, pen, 1.0, Color::WHITE);
            pen.y += self.line_height;
        }

        let title = "atlas";
        let width = self.atlas.measure(title, 2.0);
        r.draw_text(
            RenderState::AlphaBlended,
            &self.atlas,
            title,
            Vec2::new(viewport.width - width - 24.0, 20.0 + FONT_PX * 2.0),
            2.0,
            Color::from_straight(0.6, 0.8, 1.0, 0.9),
        );

        r.end_frame(device)?;
        Ok(())
    }
}

// ── world ─────────────────────────────────────────────────────────────────

struct Orb {
    pos: Vec2,
    vel: Vec2,
    radius: f32,
    color: Color,
}

struct World {
    player: Vec2,
    facing: f32,
    orbs: Vec<Orb>,
}

impl World {
    fn new() -> Self {
        let palette = [
            Color::from_rgba_u8(230, 90, 80, 255),
            Color::from_rgba_u8(90, 200, 120, 255),
            Color::from_rgba_u8(80, 140, 230, 255),
            Color::from_rgba_u8(240, 200, 70, 255),
        ];
        let orbs = (0..12)
            .map(|i| {
                let f = i as f32;
                Orb {
                    pos: Vec2::new(80.0 + f * 60.0, 120.0 + (f * 1.7).sin() * 60.0),
                    vel: Vec2::new(60.0 + f * 7.0, 45.0 - f * 9.0),
                    radius: 10.0 + (i % 4) as f32 * 6.0,
                    color: palette[i % palette.len()],
                }
            })
            .collect();

        Self { player: Vec2::new(200.0, 300.0), facing: 1.0, orbs }
    }

    fn update(&mut self, dt: f32, input: &InputState, viewport: Viewport) {
        let dx = input.axis(Key::ArrowLeft, Key::ArrowRight) + input.axis(Key::A, Key::D);
        let dy = input.axis(Key::ArrowUp, Key::ArrowDown) + input.axis(Key::W, Key::S);
        if dx != 0.0 {
            self.facing = dx.signum();
        }
        self.player += Vec2::new(dx.clamp(-1.0, 1.0), dy.clamp(-1.0, 1.0)) * (PLAYER_SPEED * dt);
        self.player.x = self.player.x.clamp(0.0, (viewport.width - 32.0).max(0.0));
        self.player.y = self.player.y.clamp(0.0, (viewport.height - 64.0).max(0.0));

        for orb in &mut self.orbs {
            orb.pos += orb.vel * dt;
            if orb.pos.x < orb.radius || orb.pos.x > viewport.width - orb.radius {
                orb.vel.x = -orb.vel.x;
                orb.pos.x = orb.pos.x.clamp(orb.radius, (viewport.width - orb.radius).max(orb.radius));
            }
            if orb.pos.y < orb.radius || orb.pos.y > viewport.height - orb.radius {
                orb.vel.y = -orb.vel.y;
                orb.pos.y = orb.pos.y.clamp(orb.radius, (viewport.height - orb.radius).max(orb.radius));
            }
        }
    }
}

fn checkerboard(size: u32) -> Vec<u8> {
    let (light, dark) = ([200, 200, 210, 255], [90, 95, 110, 255]);
    (0..size * size)
        .flat_map(|i| if ((i % size) / 4 + (i / size) / 4) % 2 == 0 { light } else { dark })
        .collect()
}
