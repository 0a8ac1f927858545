//! Animated circle driven by the mirrored environment
//!
//! The circle orbits the origin at a fixed angular step. Its color comes from
//! the `color_key` override when that holds a number, otherwise it cycles
//! through 0..=255 with the frame count.

use crate::config::schema::SketchConfig;
use crate::mirror::EnvReader;
use std::fmt;

/// One rendered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub number: u64,
    pub color: f64,
    pub angle: f64,
    pub x: f64,
    pub y: f64,
    /// Color came from the environment rather than the local cycle
    pub overridden: bool,
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frame {:>5}  color {:>7.2}{}  angle {:>6.1}  at ({:>7.2}, {:>7.2})",
            self.number,
            self.color,
            if self.overridden { "*" } else { " " },
            self.angle,
            self.x,
            self.y
        )
    }
}

/// Local animation state, owned by the consumer
pub struct Sketch {
    config: SketchConfig,
    frame: u64,
    angle: f64,
}

impl Sketch {
    pub fn new(config: SketchConfig) -> Self {
        Self {
            config,
            frame: 0,
            angle: 0.0,
        }
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frame
    }

    /// Advance one tick, reading the color override from `env`
    pub fn tick(&mut self, env: &EnvReader) -> Frame {
        let (color, overridden) = match env.number(&self.config.color_key) {
            Some(color) => (color, true),
            None => ((self.frame % 256) as f64, false),
        };

        let radians = self.angle.to_radians();
        let frame = Frame {
            number: self.frame,
            color,
            angle: self.angle,
            x: self.config.radius * radians.cos(),
            y: self.config.radius * radians.sin(),
            overridden,
        };

        self.frame += 1;
        self.angle = (self.angle + self.config.angle_step).rem_euclid(360.0);
        frame
    }
}
