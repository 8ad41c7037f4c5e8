use std::io::Cursor;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use imprint::{Bindings, ColorDef, Compositor, FontCatalog, Template, TextLayer, TextShadow};

struct TempDirGuard(PathBuf);

impl TempDirGuard {
    fn new(tag: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "imprint_{tag}_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        std::fs::create_dir_all(&path).unwrap();
        Self(path)
    }
}

impl Drop for TempDirGuard {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn write_png(dir: &TempDirGuard, name: &str, img: image::RgbaImage) -> String {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    std::fs::write(dir.0.join(name), bytes).unwrap();
    name.to_string()
}

fn compositor_in(dir: &TempDirGuard) -> Compositor {
    Compositor::new(&dir.0, FontCatalog::new())
}

fn pixel(frame: &imprint::Frame, x: u32, y: u32) -> [u8; 4] {
    let idx = ((y * frame.width + x) * 4) as usize;
    frame.data[idx..idx + 4].try_into().unwrap()
}

fn local_font_bytes() -> Option<Vec<u8>> {
    [
        "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/dejavu/DejaVuSans.ttf",
        "/usr/share/fonts/TTF/DejaVuSans.ttf",
        "/System/Library/Fonts/Supplemental/Arial.ttf",
    ]
    .iter()
    .find_map(|p| std::fs::read(p).ok())
}

#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[test]
fn background_is_stretched_to_fill_exactly() {
    let dir = TempDirGuard::new("bg_stretch");

    // 2x2 source with four solid quadrant colors, stretched to 100x100.
    let mut img = image::RgbaImage::new(2, 2);
    img.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
    img.put_pixel(1, 0, image::Rgba([0, 255, 0, 255]));
    img.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
    img.put_pixel(1, 1, image::Rgba([255, 255, 0, 255]));
    let source = write_png(&dir, "bg.png", img);

    let template = Template::new("t0", "Stretch").with_background(source, 100, 100);
    let frame = compositor_in(&dir)
        .render(&template, &Bindings::new())
        .unwrap();

    assert_eq!((frame.width, frame.height), (100, 100));
    assert!(frame.premultiplied);

    // Corners keep the quadrant colors; interpolation only affects the middle.
    assert_eq!(pixel(&frame, 0, 0), [255, 0, 0, 255]);
    assert_eq!(pixel(&frame, 99, 0), [0, 255, 0, 255]);
    assert_eq!(pixel(&frame, 0, 99), [0, 0, 255, 255]);
    assert_eq!(pixel(&frame, 99, 99), [255, 255, 0, 255]);
}

#[test]
fn corrupt_background_falls_back_to_blank_surface() {
    let dir = TempDirGuard::new("bg_corrupt");
    std::fs::write(dir.0.join("broken.png"), b"definitely not a png").unwrap();

    let template = Template::new("t0", "Broken").with_background("broken.png", 40, 30);
    let frame = compositor_in(&dir)
        .render(&template, &Bindings::new())
        .unwrap();

    assert_eq!((frame.width, frame.height), (40, 30));
    assert!(frame.data.iter().all(|&b| b == 0));
}

#[test]
fn corrupt_background_warning_reaches_an_installed_subscriber() {
    let dir = TempDirGuard::new("bg_warn");
    std::fs::write(dir.0.join("broken.png"), b"definitely not a png").unwrap();
    let template = Template::new("t0", "Broken").with_background("broken.png", 40, 30);

    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(capture.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, || {
        compositor_in(&dir)
            .render(&template, &Bindings::new())
            .unwrap();
    });

    let logs = String::from_utf8(capture.0.lock().unwrap().clone()).unwrap();
    assert!(
        logs.contains("background failed to decode"),
        "expected a warning in: {logs}"
    );
    assert!(logs.contains("broken.png"));
}

#[test]
fn missing_background_file_also_falls_back() {
    let dir = TempDirGuard::new("bg_missing");
    let template = Template::new("t0", "Missing").with_background("nowhere.png", 16, 16);
    let frame = compositor_in(&dir)
        .render(&template, &Bindings::new())
        .unwrap();
    assert!(frame.data.iter().all(|&b| b == 0));
}

#[test]
fn no_background_uses_template_dimensions() {
    let dir = TempDirGuard::new("no_bg");
    let template = Template::new("t0", "Blank");
    let frame = compositor_in(&dir)
        .render(&template, &Bindings::new())
        .unwrap();
    assert_eq!((frame.width, frame.height), (800, 600));
    assert!(frame.data.iter().all(|&b| b == 0));
}

#[test]
fn render_png_encodes_a_decodable_png() {
    let dir = TempDirGuard::new("png_encode");
    let mut img = image::RgbaImage::new(3, 3);
    for px in img.pixels_mut() {
        *px = image::Rgba([10, 200, 30, 255]);
    }
    let source = write_png(&dir, "bg.png", img);

    let template = Template::new("t0", "Party Invite").with_background(source, 64, 48);
    let (png, filename) = compositor_in(&dir)
        .render_png(&template, &Bindings::new())
        .unwrap();

    assert_eq!(filename, "party-invite.png");
    let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
    assert_eq!(decoded.dimensions(), (64, 48));
    assert_eq!(decoded.get_pixel(32, 24).0, [10, 200, 30, 255]);
}

#[test]
fn text_layer_with_empty_font_catalog_is_an_error() {
    let dir = TempDirGuard::new("no_fonts");
    let template =
        Template::new("t0", "Text").with_layer_added(TextLayer::new("l0", "Hello", 10.0, 10.0));

    let err = compositor_in(&dir)
        .render(&template, &Bindings::new())
        .unwrap_err();
    assert!(err.to_string().contains("font catalog is empty"));
}

#[test]
fn repeated_renders_are_bit_identical() {
    let dir = TempDirGuard::new("deterministic");
    let mut img = image::RgbaImage::new(7, 5);
    for (x, _, px) in img.enumerate_pixels_mut() {
        *px = image::Rgba([(x * 30) as u8, 80, 160, 255]);
    }
    let source = write_png(&dir, "bg.png", img);
    let template = Template::new("t0", "Det").with_background(source, 50, 50);

    let mut compositor = compositor_in(&dir);
    let a = compositor.render(&template, &Bindings::new()).unwrap();
    let b = compositor.render(&template, &Bindings::new()).unwrap();
    assert_eq!(a.data, b.data);
}

#[test]
fn glyph_bottoms_sit_one_font_size_below_layer_y_with_local_font_if_present() {
    let Some(bytes) = local_font_bytes() else {
        return;
    };
    let mut catalog = FontCatalog::new();
    catalog.register_family("Body", bytes);

    let mut layer = TextLayer::new("l0", "Ada", 50.0, 50.0);
    layer.font_size = 24.0;
    layer.font_family = "Body".to_string();
    let mut template = Template::new("t0", "Baseline").with_layer_added(layer);
    template.width = 200;
    template.height = 120;

    let frame = Compositor::new(".", catalog)
        .render(&template, &Bindings::new())
        .unwrap();

    let mut bottom = None;
    for y in 0..frame.height {
        for x in 0..frame.width {
            if pixel(&frame, x, y)[3] != 0 {
                bottom = Some(y);
            }
        }
    }
    let bottom = bottom.expect("text layer should produce ink");

    // "Ada" has no descenders, so the lowest ink hugs the baseline at
    // y + font_size = 74 (a couple of pixels of antialiasing slack).
    assert!((70..=77).contains(&bottom), "lowest ink row {bottom}");
}

#[test]
fn layer_opacity_covers_shadow_and_fill_as_one_group_with_local_font_if_present() {
    let Some(bytes) = local_font_bytes() else {
        return;
    };
    let mut catalog = FontCatalog::new();
    catalog.register_family("Body", bytes);

    // A solid shadow directly under the glyphs: if each pass took the layer
    // opacity separately, the shadow would bleed through and stack the
    // densest pixels toward 3/4 alpha instead of 1/2.
    let mut layer = TextLayer::new("l0", "Ada", 50.0, 50.0);
    layer.font_size = 24.0;
    layer.font_family = "Body".to_string();
    layer.opacity = 0.5;
    layer.text_shadow = Some(TextShadow {
        enabled: true,
        color: ColorDef::BLACK,
        offset_x: 0.0,
        offset_y: 0.0,
        blur: 0.0,
    });
    let mut template = Template::new("t0", "GroupOpacity").with_layer_added(layer);
    template.width = 200;
    template.height = 120;

    let frame = Compositor::new(".", catalog)
        .render(&template, &Bindings::new())
        .unwrap();

    let max_alpha = frame
        .data
        .chunks_exact(4)
        .map(|px| px[3])
        .max()
        .unwrap_or(0);
    assert!(max_alpha >= 110, "expected ink near half alpha, got {max_alpha}");
    assert!(max_alpha <= 140, "shadow stacked under the fill: {max_alpha}");
}
