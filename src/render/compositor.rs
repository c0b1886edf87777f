//! Composes decoded images onto the fixed output surface.

use std::io::Cursor;

use anyhow::{Context, Result};
use fast_image_resize as fir;
use image::{imageops, ImageReader, Rgba, RgbaImage};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleStrategy {
    /// Fill the surface, cropping the overflow.
    Cover,
    /// Keep the whole image visible.
    Fit,
}

/// Landscape and square images cover the surface; portrait images fit inside it.
pub fn choose_strategy(img_w: u32, img_h: u32) -> ScaleStrategy {
    if img_w >= img_h {
        ScaleStrategy::Cover
    } else {
        ScaleStrategy::Fit
    }
}

/// Where an image lands on the surface. Coordinates may be negative or exceed
/// the surface when covering.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub scale: f32,
    pub strategy: ScaleStrategy,
}

pub fn compute_draw_rect(img_w: u32, img_h: u32, surface_w: u32, surface_h: u32) -> DrawRect {
    let strategy = choose_strategy(img_w, img_h);
    let iw = img_w.max(1) as f32;
    let ih = img_h.max(1) as f32;
    let sw = surface_w as f32;
    let sh = surface_h as f32;
    let scale = match strategy {
        ScaleStrategy::Cover => (sw / iw).max(sh / ih),
        ScaleStrategy::Fit => (sw / iw).min(sh / ih),
    };
    DrawRect {
        x: sw / 2.0 - (iw / 2.0) * scale,
        y: sh / 2.0 - (ih / 2.0) * scale,
        w: iw * scale,
        h: ih * scale,
        scale,
        strategy,
    }
}

/// Left and right margins around `rect`, as `(x, y, w, h)`.
///
/// Only the side margins are cleared. The bands above and below a fitted
/// image keep whatever the surface held before.
pub fn side_margins(rect: &DrawRect, surface_w: u32, surface_h: u32) -> [(f32, f32, f32, f32); 2] {
    let sw = surface_w as f32;
    let sh = surface_h as f32;
    let margin = (sw - rect.w) / 2.0;
    [(0.0, 0.0, margin, sh), (rect.x + rect.w, 0.0, margin, sh)]
}

/// Decodes image bytes to RGBA8, applying EXIF orientation when present.
pub fn decode_rgba8(bytes: &[u8]) -> Result<RgbaImage> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to sniff image format")?
        .decode()
        .context("failed to decode image")?;
    let img = img.to_rgba8();
    Ok(match read_orientation(bytes).unwrap_or(1) {
        2 => imageops::flip_horizontal(&img),
        3 => imageops::rotate180(&img),
        4 => imageops::flip_vertical(&img),
        5 => imageops::flip_horizontal(&imageops::rotate90(&img)),
        6 => imageops::rotate90(&img),
        7 => imageops::flip_horizontal(&imageops::rotate270(&img)),
        8 => imageops::rotate270(&img),
        _ => img,
    })
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, "exif orientation");
    Some(orientation)
}

/// Image already scaled to its draw rectangle, ready to be blended per frame.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub rect: DrawRect,
    pub pixels: RgbaImage,
}

impl PreparedImage {
    /// Scales `source` once to the size of its draw rectangle on a
    /// `surface_w` x `surface_h` surface, so each fade frame only blends.
    pub fn new(source: &RgbaImage, surface_w: u32, surface_h: u32) -> Result<Self> {
        let rect = compute_draw_rect(source.width(), source.height(), surface_w, surface_h);
        let size = (rect.w.round().max(1.0) as u32, rect.h.round().max(1.0) as u32);
        if source.dimensions() == size {
            return Ok(Self {
                rect,
                pixels: source.clone(),
            });
        }

        // Lanczos sharpens large reductions; upscaled photos stay smoother with Catmull-Rom.
        let filter = if rect.scale < 1.0 {
            fir::FilterType::Lanczos3
        } else {
            fir::FilterType::CatmullRom
        };
        let view = fir::images::ImageRef::new(
            source.width(),
            source.height(),
            source.as_raw(),
            fir::PixelType::U8x4,
        )
        .context("photo buffer does not match its dimensions")?;
        let mut scaled = fir::images::Image::new(size.0, size.1, fir::PixelType::U8x4);
        fir::Resizer::new()
            .resize(
                &view,
                &mut scaled,
                Some(&fir::ResizeOptions::new().resize_alg(fir::ResizeAlg::Convolution(filter))),
            )
            .with_context(|| format!("scaling photo to {}x{}", size.0, size.1))?;
        let pixels = RgbaImage::from_raw(size.0, size.1, scaled.into_vec())
            .context("scaled photo buffer has the wrong length")?;
        Ok(Self { rect, pixels })
    }
}

/// The fixed-size output surface.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
    background: Rgba<u8>,
}

impl Surface {
    pub fn new(width: u32, height: u32, background: [u8; 3]) -> Self {
        let background = Rgba([background[0], background[1], background[2], 255]);
        Self {
            pixels: RgbaImage::from_pixel(width, height, background),
            background,
        }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn clear(&mut self) {
        let background = self.background;
        self.pixels.pixels_mut().for_each(|p| *p = background);
    }

    /// Draws `image` at `opacity`, then paints the side margins with the
    /// background at the same opacity.
    pub fn draw(&mut self, image: &PreparedImage, opacity: f32) {
        let opacity = opacity.clamp(0.0, 1.0);
        if opacity <= 0.0 {
            return;
        }
        let ox = image.rect.x.round() as i64;
        let oy = image.rect.y.round() as i64;
        let (sw, sh) = (self.width() as i64, self.height() as i64);
        let (iw, ih) = (image.pixels.width() as i64, image.pixels.height() as i64);

        let x0 = ox.max(0);
        let y0 = oy.max(0);
        let x1 = (ox + iw).min(sw);
        let y1 = (oy + ih).min(sh);
        for y in y0..y1 {
            for x in x0..x1 {
                let src = image.pixels.get_pixel((x - ox) as u32, (y - oy) as u32);
                blend(self.pixels.get_pixel_mut(x as u32, y as u32), src, opacity);
            }
        }

        let background = self.background;
        for (mx, my, mw, mh) in side_margins(&image.rect, self.width(), self.height()) {
            self.fill_rect(mx, my, mw, mh, background, opacity);
        }
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>, opacity: f32) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let x0 = (x.round() as i64).clamp(0, self.width() as i64) as u32;
        let y0 = (y.round() as i64).clamp(0, self.height() as i64) as u32;
        let x1 = ((x + w).round() as i64).clamp(0, self.width() as i64) as u32;
        let y1 = ((y + h).round() as i64).clamp(0, self.height() as i64) as u32;
        for py in y0..y1 {
            for px in x0..x1 {
                blend(self.pixels.get_pixel_mut(px, py), &color, opacity);
            }
        }
    }
}

/// Source-over blend with a global alpha.
fn blend(dst: &mut Rgba<u8>, src: &Rgba<u8>, opacity: f32) {
    let a = (src[3] as f32 / 255.0) * opacity;
    if a <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = a + da * (1.0 - a);
    for c in 0..3 {
        let s = src[c] as f32 / 255.0;
        let d = dst[c] as f32 / 255.0;
        let out = if out_a > 0.0 {
            (s * a + d * da * (1.0 - a)) / out_a
        } else {
            0.0
        };
        dst[c] = (out * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}

/// Opacity ramp of one fade-in: 0, step, 2·step, … up to exactly 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeIn {
    step: f32,
    frame: u32,
    frames: u32,
}

impl FadeIn {
    pub fn new(step: f32) -> Self {
        let step = step.clamp(f32::EPSILON, 1.0);
        Self {
            step,
            frame: 0,
            // Tolerate float error so a step of 0.01 yields exactly 100 increments.
            frames: ((1.0 / step) - 1e-3).ceil().max(1.0) as u32,
        }
    }

    pub fn restart(&mut self) {
        self.frame = 0;
    }

    pub fn is_done(&self) -> bool {
        self.frame > self.frames
    }

    /// Opacity for the next frame, or `None` once fully opaque.
    pub fn next_opacity(&mut self) -> Option<f32> {
        if self.is_done() {
            return None;
        }
        let opacity = if self.frame >= self.frames {
            1.0
        } else {
            (self.frame as f32 * self.step).min(1.0)
        };
        self.frame += 1;
        Some(opacity)
    }
}
