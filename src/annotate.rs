// src/annotate.rs
//
// Output-overlay drawing: detection boxes with class labels plus the
// per-frame violation banner, rendered onto a BGR Mat ready for the
// video writer.

use crate::types::{Detection, Frame};
use anyhow::Result;
use opencv::{core, imgproc, prelude::*};

const FONT_FACE: i32 = imgproc::FONT_HERSHEY_SIMPLEX;
const FONT_SCALE: f64 = 0.5;
const THICKNESS: i32 = 1;

fn black() -> core::Scalar {
    core::Scalar::new(0.0, 0.0, 0.0, 0.0)
}

fn blue() -> core::Scalar {
    core::Scalar::new(255.0, 178.0, 50.0, 0.0)
}

fn yellow() -> core::Scalar {
    core::Scalar::new(0.0, 255.0, 255.0, 0.0)
}

fn red() -> core::Scalar {
    core::Scalar::new(0.0, 0.0, 255.0, 0.0)
}

fn green() -> core::Scalar {
    core::Scalar::new(0.0, 255.0, 0.0, 0.0)
}

/// Render the frame with its surviving detections and the violation
/// banner. Returns a BGR Mat sized like the source frame.
pub fn annotate_frame(frame: &Frame, detections: &[Detection], violation: bool) -> Result<Mat> {
    let flat = Mat::from_slice(&frame.data)?;
    let rgb = flat.reshape(3, frame.height as i32)?;

    let mut output = Mat::default();
    imgproc::cvt_color(&rgb, &mut output, imgproc::COLOR_RGB2BGR, 0)?;

    for detection in detections {
        draw_detection(&mut output, detection)?;
    }

    let text = format!("Violation: {}", violation);
    let text_color = if violation { red() } else { green() };
    imgproc::put_text(
        &mut output,
        &text,
        core::Point::new(35, 50),
        FONT_FACE,
        1.25,
        text_color,
        3,
        imgproc::LINE_8,
        false,
    )?;

    Ok(output)
}

fn draw_detection(output: &mut Mat, detection: &Detection) -> Result<()> {
    let [x1, y1, x2, y2] = detection.bbox;
    let rect = core::Rect::new(
        x1 as i32,
        y1 as i32,
        (x2 - x1) as i32,
        (y2 - y1) as i32,
    );

    imgproc::rectangle(output, rect, blue(), 3 * THICKNESS, imgproc::LINE_8, 0)?;

    let label = format!("{}:{:.2}", detection.class_name, detection.confidence);
    draw_label(output, &label, x1 as i32, y1 as i32)?;

    Ok(())
}

/// Label anchored to the top-left corner of a box, on a black background
/// rectangle sized from the rendered text.
fn draw_label(output: &mut Mat, label: &str, left: i32, top: i32) -> Result<()> {
    let mut baseline = 0;
    let size = imgproc::get_text_size(label, FONT_FACE, FONT_SCALE, THICKNESS, &mut baseline)?;

    imgproc::rectangle(
        output,
        core::Rect::new(left, top, size.width, size.height + baseline),
        black(),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        output,
        label,
        core::Point::new(left, top + size.height),
        FONT_FACE,
        FONT_SCALE,
        yellow(),
        THICKNESS,
        imgproc::LINE_AA,
        false,
    )?;

    Ok(())
}
