use std::f32::consts::PI;
use std::ops::Mul;

/// 2D affine transform in row-major form:
///
/// ```text
/// | a b x |
/// | c d y |
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub x: f32,
    pub c: f32,
    pub d: f32,
    pub y: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn identity() -> Self {
        Self {
            a: 1.0,
            b: 0.0,
            x: 0.0,
            c: 0.0,
            d: 1.0,
            y: 0.0,
        }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self {
            x: tx,
            y: ty,
            ..Self::identity()
        }
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::identity()
        }
    }

    pub fn rotate(angle_rad: f32) -> Self {
        let (s, c) = angle_rad.sin_cos();

        Self {
            a: c,
            b: -s,
            x: 0.0,
            c: s,
            d: c,
            y: 0.0,
        }
    }

    pub fn multiply(&self, rhs: &Matrix) -> Matrix {
        Matrix {
            a: self.a * rhs.a + self.b * rhs.c,
            b: self.a * rhs.b + self.b * rhs.d,
            x: self.a * rhs.x + self.b * rhs.y + self.x,
            c: self.c * rhs.a + self.d * rhs.c,
            d: self.c * rhs.b + self.d * rhs.d,
            y: self.c * rhs.x + self.d * rhs.y + self.y,
        }
    }

    /// Rotation in degrees, in `[0, 360)`.
    pub fn axis_angle(&self) -> f32 {
        (-self.c).atan2(-self.d) / PI * 180.0 + 180.0
    }

    pub fn scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn translate_x(&self) -> f32 {
        self.x
    }

    pub fn translate_y(&self) -> f32 {
        self.y
    }

    /// Applies the full transform, translation included.
    pub fn map_point(&self, px: f32, py: f32) -> (f32, f32) {
        (self.a * px + self.b * py + self.x, self.c * px + self.d * py + self.y)
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Matrix) -> Matrix {
        self.multiply(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn translate_then_scale() {
        let m = Matrix::translate(10.0, 20.0) * Matrix::scale(2.0, 3.0);

        assert_eq!(m.map_point(1.0, 1.0), (12.0, 23.0));
        assert_eq!(m.scale_x(), 2.0);
        assert_eq!(m.translate_y(), 20.0);
    }

    #[test]
    fn rotation_about_origin() {
        let origin = Matrix::translate(50.0, 50.0);
        let m = origin * Matrix::rotate(PI) * Matrix::translate(-50.0, -50.0);
        let (x, y) = m.map_point(0.0, 0.0);

        assert!(approx(x, 100.0));
        assert!(approx(y, 100.0));
    }

    #[test]
    fn identity_has_zero_angle() {
        assert!(approx(Matrix::identity().axis_angle(), 0.0) || approx(Matrix::identity().axis_angle(), 360.0));
        assert!(Matrix::default().is_identity());
    }
}
