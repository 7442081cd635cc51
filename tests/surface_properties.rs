//! Observable behaviour of the drawing surface through its public API.

use digitpad::canvas::{BACKGROUND, DrawingSurface, Point};
use image::{Rgba, RgbaImage};

fn decode(surface: &DrawingSurface) -> RgbaImage {
    let exported = surface.export_image().unwrap();
    image::load_from_memory(&exported.png).unwrap().into_rgba8()
}

/// Count of non-background pixels along row `y`.
fn ink_in_row(img: &RgbaImage, y: u32) -> usize {
    (0..img.width())
        .filter(|&x| *img.get_pixel(x, y) != BACKGROUND)
        .count()
}

#[test]
fn extend_without_begin_draws_nothing() {
    let mut s = DrawingSurface::new(100, 100, 1.0);
    let blank = decode(&s);
    s.extend_stroke(Point::new(10.0, 10.0));
    s.extend_stroke(Point::new(90.0, 90.0));
    assert_eq!(decode(&s), blank);

    // And after the gesture ended
    s.begin_stroke(Point::new(10.0, 50.0));
    s.end_stroke();
    s.extend_stroke(Point::new(90.0, 50.0));
    assert_eq!(decode(&s), blank);
}

#[test]
fn tap_without_motion_leaves_background() {
    let mut s = DrawingSurface::new(64, 64, 1.0);
    let blank = s.export_image().unwrap();
    s.begin_stroke(Point::new(32.0, 32.0));
    s.end_stroke();
    assert_eq!(s.export_image().unwrap(), blank);
}

#[test]
fn clear_restores_initial_export() {
    let mut s = DrawingSurface::new(120, 120, 2.0);
    let fresh = s.export_image().unwrap();
    s.set_stroke_color(Rgba([200, 0, 0, 255]));
    s.begin_stroke(Point::new(5.0, 5.0));
    s.extend_stroke(Point::new(100.0, 60.0));
    s.extend_stroke(Point::new(20.0, 110.0));
    s.end_stroke();
    assert_ne!(s.export_image().unwrap(), fresh);

    s.clear();
    assert_eq!(s.export_image().unwrap(), fresh);
    // Style survives a clear
    assert_eq!(s.style().color, Rgba([200, 0, 0, 255]));
}

#[test]
fn wider_strokes_are_thicker() {
    let mut s = DrawingSurface::new(200, 200, 1.0);
    s.set_stroke_width(20.0);
    s.begin_stroke(Point::new(20.0, 40.0));
    s.extend_stroke(Point::new(80.0, 40.0));
    s.end_stroke();

    // Width changes only affect later strokes
    s.set_stroke_width(50.0);
    s.begin_stroke(Point::new(120.0, 40.0));
    s.extend_stroke(Point::new(180.0, 40.0));
    s.end_stroke();

    let img = decode(&s);
    let column_ink = |x: u32| {
        (0..img.height())
            .filter(|&y| *img.get_pixel(x, y) != BACKGROUND)
            .count()
    };
    let thin = column_ink(50);
    let thick = column_ink(150);
    assert!((18..=23).contains(&thin), "thin stroke was {thin}px");
    assert!((48..=53).contains(&thick), "thick stroke was {thick}px");
}

#[test]
fn export_dimensions_scale_with_density() {
    for (density, expected) in [(1.0, 280), (2.0, 560), (1.5, 420)] {
        let mut s = DrawingSurface::new(280, 280, density);
        s.begin_stroke(Point::new(10.0, 10.0));
        s.extend_stroke(Point::new(270.0, 270.0));
        s.end_stroke();
        let exported = s.export_image().unwrap();
        assert_eq!((exported.width, exported.height), (expected, expected));
        let img = decode(&s);
        assert_eq!(img.dimensions(), (expected, expected));
    }
}

#[test]
fn strokes_land_in_physical_space() {
    let mut s = DrawingSurface::new(100, 100, 2.0);
    s.set_stroke_width(10.0);
    s.begin_stroke(Point::new(10.0, 50.0));
    s.extend_stroke(Point::new(90.0, 50.0));
    s.end_stroke();
    let img = decode(&s);
    // Logical y=50 maps to physical row 100; 10 logical px -> ~20 physical
    let ink = ink_in_row(&img, 100);
    assert!(ink > 150, "row 100 had {ink} inked pixels");
    assert_eq!(ink_in_row(&img, 40), 0);
    let thickness = (0..img.height())
        .filter(|&y| *img.get_pixel(100, y) != BACKGROUND)
        .count();
    assert!((19..=23).contains(&thickness), "thickness was {thickness}");
}

#[test]
fn reinitialize_discards_drawing() {
    let mut s = DrawingSurface::new(50, 50, 1.0);
    s.begin_stroke(Point::new(5.0, 5.0));
    s.extend_stroke(Point::new(45.0, 45.0));
    s.initialize(80, 40, 1.0);
    assert!(!s.is_active());
    assert!(s.is_blank());
    assert_eq!(s.physical_size(), (80, 40));
}
