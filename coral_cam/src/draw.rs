//! Drawing primitives shared by the annotations of all inference modes.
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size},
    rect::Rect,
};
use lazy_static::lazy_static;
use rusttype::{Font, Scale};

/// Color of all annotations.
pub const CORAL: Rgb<u8> = Rgb([253, 94, 77]);
pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Scale of labels drawn next to inference results.
pub const LABEL_SCALE: Scale = Scale { x: 20.0, y: 20.0 };
/// Scale of the model information in the top left corner.
pub const INFO_SCALE: Scale = Scale { x: 16.0, y: 16.0 };

lazy_static! {
    static ref DEJAVU_MONO: Font<'static> = {
        let font_data: &[u8] = include_bytes!("../resources/DejaVuSansMono.ttf");
        Font::try_from_bytes(font_data).expect("failed to load font")
    };
}

/// Width and height of a rendered text.
pub fn measure(text: &str, scale: Scale) -> (i32, i32) {
    text_size(scale, &DEJAVU_MONO, text)
}

/// Draw text with its top left corner at `(x, y)`.
pub fn text(frame: &mut RgbImage, text: &str, x: i32, y: i32, scale: Scale, color: Rgb<u8>) {
    draw_text_mut(frame, color, x, y, scale, &DEJAVU_MONO, text);
}

/// Draw text on a filled background box.
pub fn boxed_text(
    frame: &mut RgbImage,
    text: &str,
    x: i32,
    y: i32,
    scale: Scale,
    background: Rgb<u8>,
    color: Rgb<u8>,
) {
    let padding = 3;
    let (width, height) = measure(text, scale);
    if width > 0 && height > 0 {
        let rect = Rect::at(x, y).of_size(
            (width + 2 * padding) as u32,
            (height + 2 * padding) as u32,
        );
        draw_filled_rect_mut(frame, rect, background);
    }
    self::text(frame, text, x + padding, y + padding, scale, color);
}

/// Draw the outline of the box between two corner points with the given line thickness.
///
/// The line grows inwards, degenerate boxes are skipped.
pub fn thick_rect(
    frame: &mut RgbImage,
    (x_min, y_min): (i32, i32),
    (x_max, y_max): (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    for offset in 0..thickness {
        let width = x_max - x_min - 2 * offset;
        let height = y_max - y_min - 2 * offset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(x_min + offset, y_min + offset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(frame, rect, color);
    }
}

/// Color of a class in the PASCAL VOC segmentation colormap.
pub fn label_color(label: usize) -> Rgb<u8> {
    let mut color = [0_u8; 3];
    let mut index = label;
    for shift in (0..8).rev() {
        for (channel, value) in color.iter_mut().enumerate() {
            *value |= (((index >> channel) & 1) << shift) as u8;
        }
        index >>= 3;
    }

    Rgb(color)
}

/// Colormap used to visualize segmentation results, one color per class.
pub fn create_pascal_label_colormap() -> Vec<Rgb<u8>> {
    (0..256).map(label_color).collect()
}
