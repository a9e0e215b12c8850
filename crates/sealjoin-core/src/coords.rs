//! Coordinate transformation between viewer and PDF coordinate systems
//!
//! Viewer coordinates are pixels from the top-left corner of the rendered
//! page at some zoom factor. PDF coordinates are points from the bottom-left
//! corner of the MediaBox. Mapping never fails: degenerate inputs fall back
//! to sane defaults and results are clamped onto the page.

use serde::{Deserialize, Serialize};

/// Everything needed to map points on one rendered page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Viewport {
    /// Zoom factor the viewer rendered at (1.0 = 100%)
    pub scale: f64,
    pub page_width_pt: f64,
    pub page_height_pt: f64,
    /// Canvas size in pixels at scale 1.0
    pub canvas_width_px: f64,
    pub canvas_height_px: f64,
}

impl Viewport {
    /// Viewport whose canvas at scale 1.0 matches the page one pixel per point
    pub fn for_page(page_width_pt: f64, page_height_pt: f64, scale: f64) -> Self {
        Self {
            scale,
            page_width_pt,
            page_height_pt,
            canvas_width_px: page_width_pt,
            canvas_height_px: page_height_pt,
        }
    }

    pub fn to_pdf(&self, viewer_x: f64, viewer_y: f64) -> (f64, f64) {
        to_pdf_space(
            viewer_x,
            viewer_y,
            self.scale,
            self.page_width_pt,
            self.page_height_pt,
            self.canvas_width_px,
            self.canvas_height_px,
        )
    }

    pub fn to_viewer(&self, pdf_x: f64, pdf_y: f64) -> (f64, f64) {
        to_viewer_space(
            pdf_x,
            pdf_y,
            self.scale,
            self.page_width_pt,
            self.page_height_pt,
            self.canvas_width_px,
            self.canvas_height_px,
        )
    }
}

/// Convert viewer coordinates (top-left origin, pixels at `viewer_scale`) to
/// PDF coordinates (bottom-left origin, points), clamped to the page
pub fn to_pdf_space(
    viewer_x: f64,
    viewer_y: f64,
    viewer_scale: f64,
    page_width_pt: f64,
    page_height_pt: f64,
    canvas_width_px: f64,
    canvas_height_px: f64,
) -> (f64, f64) {
    let scale = effective_scale(viewer_scale);
    let (page_w, page_h) = (non_negative(page_width_pt), non_negative(page_height_pt));
    let canvas_w = effective_canvas(canvas_width_px, page_w);
    let canvas_h = effective_canvas(canvas_height_px, page_h);

    let unscaled_x = finite_or_zero(viewer_x) / scale;
    let unscaled_y = finite_or_zero(viewer_y) / scale;

    let pdf_x = unscaled_x * (page_w / canvas_w);
    // Flip Y axis
    let pdf_y = page_h - unscaled_y * (page_h / canvas_h);

    (clamp_to(pdf_x, page_w), clamp_to(pdf_y, page_h))
}

/// Inverse of [`to_pdf_space`]
pub fn to_viewer_space(
    pdf_x: f64,
    pdf_y: f64,
    viewer_scale: f64,
    page_width_pt: f64,
    page_height_pt: f64,
    canvas_width_px: f64,
    canvas_height_px: f64,
) -> (f64, f64) {
    let scale = effective_scale(viewer_scale);
    let (page_w, page_h) = (non_negative(page_width_pt), non_negative(page_height_pt));
    let canvas_w = effective_canvas(canvas_width_px, page_w);
    let canvas_h = effective_canvas(canvas_height_px, page_h);

    let pdf_x = clamp_to(finite_or_zero(pdf_x), page_w);
    let pdf_y = clamp_to(finite_or_zero(pdf_y), page_h);

    let x_ratio = if page_w > 0.0 { canvas_w / page_w } else { 1.0 };
    let y_ratio = if page_h > 0.0 { canvas_h / page_h } else { 1.0 };

    let viewer_x = pdf_x * x_ratio * scale;
    let viewer_y = (page_h - pdf_y) * y_ratio * scale;
    (viewer_x, viewer_y)
}

fn effective_scale(scale: f64) -> f64 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        1.0
    }
}

/// A missing canvas size means the canvas equals the page at scale 1
fn effective_canvas(canvas_px: f64, page_pt: f64) -> f64 {
    if canvas_px.is_finite() && canvas_px > 0.0 {
        canvas_px
    } else if page_pt > 0.0 {
        page_pt
    } else {
        1.0
    }
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn clamp_to(value: f64, max: f64) -> f64 {
    value.clamp(0.0, max)
}
