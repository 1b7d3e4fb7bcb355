//! Watch face layout.
//!
//! Turns the current [`RenderState`] into a list of draw operations for a
//! canvas of a given size. Rows are stacked below a third of the canvas
//! height: time, day, a delimiter line, then the weather icon with the two
//! temperatures sharing the space to its right.

use chrono::NaiveDateTime;

use super::fit::{LayoutFitter, TextMeasure};
use crate::consumer::RenderState;
use crate::models::WeatherIcon;

/// Scale every fit starts from.
pub const REFERENCE_SCALE: f32 = 48.0;

/// Fixed dimensions of the face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceMetrics {
    /// Vertical distance between rows
    pub y_offset: f32,
    pub delimiter_width: f32,
    /// Width the day string is fitted to; the icon row aligns with it
    pub day_width: f32,
    pub time_width: f32,
    pub icon_width: f32,
    pub icon_height: f32,
}

impl Default for FaceMetrics {
    fn default() -> Self {
        Self {
            y_offset: 30.0,
            delimiter_width: 40.0,
            day_width: 160.0,
            time_width: 150.0,
            icon_width: 40.0,
            icon_height: 40.0,
        }
    }
}

/// Positions derived from the canvas size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceGeometry {
    pub center_x: f32,
    pub time_y: f32,
    pub day_y: f32,
    pub delimiter_y: f32,
    pub icon_x: f32,
    pub icon_y: f32,
    /// Width each temperature is fitted to
    pub temp_target: f32,
    pub temp_max_x: f32,
    pub temp_min_x: f32,
    pub temperature_y: f32,
}

impl FaceGeometry {
    pub fn compute(metrics: &FaceMetrics, width: f32, height: f32) -> Self {
        let center_x = width / 2.0;
        let time_y = height / 3.0;
        let icon_x = center_x - metrics.day_width / 2.0;
        let icon_y = time_y + 2.0 * metrics.y_offset;

        let post_icon_x = icon_x + metrics.icon_width;
        let remaining = metrics.day_width - metrics.icon_width;

        Self {
            center_x,
            time_y,
            day_y: time_y + metrics.y_offset,
            delimiter_y: time_y + 1.5 * metrics.y_offset,
            icon_x,
            icon_y,
            temp_target: 2.0 * remaining / 5.0,
            temp_max_x: post_icon_x + remaining / 4.0,
            temp_min_x: post_icon_x + 3.0 * remaining / 4.0,
            temperature_y: icon_y + 3.0 * metrics.icon_height / 4.0,
        }
    }
}

/// Paint a text operation is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Time,
    Day,
    TempMax,
    TempMin,
}

impl TextStyle {
    pub fn is_bold(&self) -> bool {
        matches!(self, TextStyle::TempMax)
    }

    /// Day and the low temperature use the secondary colour.
    pub fn is_secondary(&self) -> bool {
        matches!(self, TextStyle::Day | TextStyle::TempMin)
    }
}

/// One call against the external paint surface. Text is centred on `x`.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Text {
        text: String,
        x: f32,
        y: f32,
        scale: f32,
        style: TextStyle,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
    },
    Icon {
        icon: WeatherIcon,
        x: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FacePlan {
    pub geometry: FaceGeometry,
    pub ops: Vec<DrawOp>,
}

pub struct FacePainter {
    fitter: LayoutFitter,
    metrics: FaceMetrics,
}

impl FacePainter {
    pub fn new(fitter: LayoutFitter, metrics: FaceMetrics) -> Self {
        Self { fitter, metrics }
    }

    /// Lays out one frame.
    ///
    /// The icon and temperatures are only drawn once a record has been
    /// received.
    pub fn plan<M>(
        &self,
        now: NaiveDateTime,
        state: &RenderState,
        width: f32,
        height: f32,
        measure: &M,
    ) -> FacePlan
    where
        M: TextMeasure + ?Sized,
    {
        let geometry = FaceGeometry::compute(&self.metrics, width, height);
        let mut ops = Vec::with_capacity(6);

        let time = time_string(now);
        let scale = self.fit(&time, self.metrics.time_width, measure);
        ops.push(DrawOp::Text {
            text: time,
            x: geometry.center_x,
            y: geometry.time_y,
            scale,
            style: TextStyle::Time,
        });

        let day = day_string(now);
        let scale = self.fit(&day, self.metrics.day_width, measure);
        ops.push(DrawOp::Text {
            text: day,
            x: geometry.center_x,
            y: geometry.day_y,
            scale,
            style: TextStyle::Day,
        });

        let half = self.metrics.delimiter_width / 2.0;
        ops.push(DrawOp::Line {
            from: (geometry.center_x - half, geometry.delimiter_y),
            to: (geometry.center_x + half, geometry.delimiter_y),
        });

        if let Some(record) = &state.record {
            ops.push(DrawOp::Icon {
                icon: state.icon,
                x: geometry.icon_x,
                y: geometry.icon_y,
            });

            for (text, x, style) in [
                (&record.temp_max_display, geometry.temp_max_x, TextStyle::TempMax),
                (&record.temp_min_display, geometry.temp_min_x, TextStyle::TempMin),
            ] {
                let scale = self.fit(text, geometry.temp_target, measure);
                ops.push(DrawOp::Text {
                    text: text.clone(),
                    x,
                    y: geometry.temperature_y,
                    scale,
                    style,
                });
            }
        }

        FacePlan { geometry, ops }
    }

    fn fit<M>(&self, text: &str, target: f32, measure: &M) -> f32
    where
        M: TextMeasure + ?Sized,
    {
        self.fitter.fit(text, target, REFERENCE_SCALE, measure)
    }
}

/// `HH:MM`, 24-hour.
pub fn time_string(now: NaiveDateTime) -> String {
    now.format("%H:%M").to_string()
}

/// Day line, e.g. `WED, JAN 07 2026`.
pub fn day_string(now: NaiveDateTime) -> String {
    now.format("%a, %b %d %Y").to_string().to_uppercase()
}
