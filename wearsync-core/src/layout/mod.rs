//! Text fitting and watch face layout.

mod face;
mod fit;

pub use face::{
    day_string, time_string, DrawOp, FaceGeometry, FaceMetrics, FacePainter, FacePlan, TextStyle,
    REFERENCE_SCALE,
};
pub use fit::{LayoutError, LayoutFitter, TextMeasure};
