use crate::Offset3d;
use itertools::iproduct;

/// 单轴上的归一化距离平方 `(d / r)^2`. 半径为 0 时只允许 `d == 0`.
#[inline]
fn axis_term(d: isize, r: f64) -> f64 {
    if r == 0.0 {
        if d == 0 {
            0.0
        } else {
            f64::INFINITY
        }
    } else {
        (d as f64 / r).powi(2)
    }
}

/// 椭球形膨胀核.
///
/// 水平两轴 (h, w) 共用半径 `radius_xy`, z 轴单独使用 `radius_z`. 偏移量 `(dz, dh, dw)`
/// 满足 `(dh^2 + dw^2) / radius_xy^2 + dz^2 / radius_z^2 <= 1` 时属于该核.
/// 某个半径为 0 时, 该方向不膨胀. 因此二维对象使用 `radius_z = 0` 即可.
#[derive(Debug, Clone)]
pub struct DilationKernel {
    radius_xy: f64,
    radius_z: f64,
    offsets: Vec<Offset3d>,
}

impl DilationKernel {
    /// 构建膨胀核. 半径以体素为单位.
    ///
    /// 半径必须是非负有限值, 否则返回 `None`.
    pub fn new(radius_xy: f64, radius_z: f64) -> Option<Self> {
        let valid = |r: f64| r.is_finite() && r >= 0.0;
        if !valid(radius_xy) || !valid(radius_z) {
            return None;
        }
        let (rxy, rz) = (radius_xy.floor() as isize, radius_z.floor() as isize);
        let offsets = iproduct!(-rz..=rz, -rxy..=rxy, -rxy..=rxy)
            .filter(|&(dz, dh, dw)| {
                axis_term(dh, radius_xy) + axis_term(dw, radius_xy) + axis_term(dz, radius_z)
                    <= 1.0
            })
            .collect();
        Some(Self {
            radius_xy,
            radius_z,
            offsets,
        })
    }

    /// 水平方向半径.
    #[inline]
    pub fn radius_xy(&self) -> f64 {
        self.radius_xy
    }

    /// z 方向半径.
    #[inline]
    pub fn radius_z(&self) -> f64 {
        self.radius_z
    }

    /// 核内所有 `(dz, dh, dw)` 偏移量, 包括原点.
    #[inline]
    pub fn offsets(&self) -> &[Offset3d] {
        &self.offsets
    }

    /// 各轴最大可达距离 `(z, h, w)`.
    #[inline]
    pub(crate) fn reach(&self) -> (usize, usize, usize) {
        let rxy = self.radius_xy.floor() as usize;
        (self.radius_z.floor() as usize, rxy, rxy)
    }
}

#[cfg(test)]
mod tests {
    use super::DilationKernel;

    #[test]
    fn test_kernel_invalid_input() {
        assert!(DilationKernel::new(-1.0, 0.0).is_none());
        assert!(DilationKernel::new(1.0, f64::NAN).is_none());
        assert!(DilationKernel::new(f64::INFINITY, 0.0).is_none());
    }

    #[test]
    fn test_kernel_sizes() {
        assert_eq!(DilationKernel::new(0.0, 0.0).unwrap().offsets(), &[(0, 0, 0)]);
        assert_eq!(DilationKernel::new(1.0, 0.0).unwrap().offsets().len(), 5);
        assert_eq!(DilationKernel::new(2.0, 0.0).unwrap().offsets().len(), 13);
        // 3D: 6-邻域 + 原点
        assert_eq!(DilationKernel::new(1.0, 1.0).unwrap().offsets().len(), 7);
    }

    #[test]
    fn test_kernel_flat_when_z_radius_zero() {
        let k = DilationKernel::new(2.0, 0.0).unwrap();
        assert!(k.offsets().iter().all(|&(dz, _, _)| dz == 0));
        assert_eq!(k.reach(), (0, 2, 2));
    }
}
