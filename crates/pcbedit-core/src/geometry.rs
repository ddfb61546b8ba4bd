//! Integer board geometry. All coordinates and lengths are nanometres.

use std::fmt;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A position on the board, in nanometres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i64, y: i64) -> Self {
        Point { x, y }
    }

    /// Returns this point moved by `offset`.
    ///
    /// Panics in debug builds if a coordinate overflows; use
    /// [`Point::checked_translated`] for offsets that come from outside.
    pub fn translated(self, offset: Point) -> Point {
        self + offset
    }

    /// Returns this point moved by `offset`, or `None` if a coordinate
    /// would leave the `i64` range.
    pub fn checked_translated(self, offset: Point) -> Option<Point> {
        Some(Point::new(
            self.x.checked_add(offset.x)?,
            self.y.checked_add(offset.y)?,
        ))
    }

    /// Mirror image across the Y axis (`x` negated).
    pub fn mirrored(self) -> Point {
        Point::new(-self.x, self.y)
    }

    /// Rotates counterclockwise around the origin.
    ///
    /// Quarter turns are exact; other angles round to the nearest
    /// nanometre.
    pub fn rotated(self, angle: Angle) -> Point {
        match angle.normalized().0 {
            0 => self,
            90_000_000 => Point::new(-self.y, self.x),
            180_000_000 => Point::new(-self.x, -self.y),
            270_000_000 => Point::new(self.y, -self.x),
            micro => {
                let (sin, cos) = (micro as f64 / 1e6).to_radians().sin_cos();
                let (x, y) = (self.x as f64, self.y as f64);
                Point::new(
                    (x * cos - y * sin).round() as i64,
                    (x * sin + y * cos).round() as i64,
                )
            }
        }
    }

    /// Euclidean distance to `other`, in nanometres.
    pub fn distance_to(self, other: Point) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        dx.hypot(dy)
    }
}

/// Plain `i64` arithmetic: overflow panics in debug builds. Positions read
/// from outside go through [`Point::checked_translated`] first.
impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;

    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A strictly positive length in nanometres (trace widths, via sizes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Length(pub i64);

impl Length {
    pub const fn from_um(um: i64) -> Self {
        Length(um * 1_000)
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}nm", self.0)
    }
}

/// A rotation angle in microdegrees, counterclockwise.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Angle(pub i64);

impl Angle {
    pub const ZERO: Angle = Angle(0);

    pub const fn from_deg(deg: i64) -> Self {
        Angle(deg * 1_000_000)
    }

    /// The same angle in `[0°, 360°)`.
    pub fn normalized(self) -> Angle {
        Angle(self.0.rem_euclid(360_000_000))
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}µdeg", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translation_and_distance() {
        let p = Point::new(1_000, 2_000).translated(Point::new(2_000, 2_000));
        assert_eq!(p, Point::new(3_000, 4_000));
        assert_eq!(Point::ORIGIN.distance_to(p), 5_000.0);
        assert_eq!(p - p, Point::ORIGIN);
        assert_eq!(-p, Point::new(-3_000, -4_000));
    }

    #[test]
    fn translation_overflow_is_detected() {
        let far = Point::new(i64::MAX - 10, 0);
        assert_eq!(
            far.checked_translated(Point::new(10, 5)),
            Some(Point::new(i64::MAX, 5))
        );
        assert_eq!(far.checked_translated(Point::new(11, 0)), None);
        assert_eq!(Point::new(0, i64::MIN).checked_translated(Point::new(0, -1)), None);
    }

    #[test]
    fn quarter_turns_are_exact() {
        let p = Point::new(100, 20);
        assert_eq!(p.rotated(Angle::from_deg(90)), Point::new(-20, 100));
        assert_eq!(p.rotated(Angle::from_deg(180)), Point::new(-100, -20));
        assert_eq!(p.rotated(Angle::from_deg(-90)), Point::new(20, -100));
        assert_eq!(p.rotated(Angle::from_deg(720)), p);
        assert_eq!(p.mirrored(), Point::new(-100, 20));
    }

    #[test]
    fn arbitrary_angles_round_to_nanometres() {
        let p = Point::new(1_000, 0).rotated(Angle::from_deg(45));
        assert_eq!(p, Point::new(707, 707));
        assert_eq!(Angle(-1).normalized(), Angle(359_999_999));
    }

    #[test]
    fn length_from_micrometres() {
        assert_eq!(Length::from_um(250), Length(250_000));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn translation_preserves_distance(
                ax in -1_000_000i64..1_000_000,
                ay in -1_000_000i64..1_000_000,
                bx in -1_000_000i64..1_000_000,
                by in -1_000_000i64..1_000_000,
                dx in -1_000_000i64..1_000_000,
                dy in -1_000_000i64..1_000_000,
            ) {
                let a = Point::new(ax, ay);
                let b = Point::new(bx, by);
                let offset = Point::new(dx, dy);
                prop_assert_eq!(
                    a.translated(offset).distance_to(b.translated(offset)),
                    a.distance_to(b)
                );
                prop_assert_eq!(a.translated(offset) - offset, a);
            }
        }
    }
}
