//! 贝塞尔曲线插值

/// 牛顿迭代的最大次数
const MAX_ITERATIONS: usize = 12;
/// x(s) 残差收敛阈值
const EPSILON: f32 = 0.0005;

/// 贝塞尔缓动曲线（用于 VMD 动画插值）
///
/// 端点固定为 (0, 0) 和 (1, 1)，`(x1, y1)`、`(x2, y2)` 为两个控制点。
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BezierCurve {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::linear()
    }
}

impl BezierCurve {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 线性插值
    pub fn linear() -> Self {
        Self::new(0.25, 0.25, 0.75, 0.75)
    }

    /// 从 VMD 插值数据创建，顺序为 `[x1, y1, x2, y2]`
    pub fn from_vmd_data(data: &[u8; 4]) -> Self {
        Self {
            x1: data[0] as f32 / 127.0,
            y1: data[1] as f32 / 127.0,
            x2: data[2] as f32 / 127.0,
            y2: data[3] as f32 / 127.0,
        }
    }

    /// 两个控制点都在对角线上时曲线退化为直线
    pub fn is_linear(&self) -> bool {
        self.x1 == self.y1 && self.x2 == self.y2
    }

    /// 评估贝塞尔曲线：输入线性进度 `x`，返回缓动后的进度
    pub fn evaluate(&self, x: f32) -> f32 {
        let x = x.clamp(0.0, 1.0);
        if self.is_linear() {
            return x;
        }

        // 使用牛顿法求解 x(s) = x 的 s 值
        let mut s = x;
        for _ in 0..MAX_ITERATIONS {
            let residual = self.bezier_x(s) - x;
            if residual.abs() <= EPSILON {
                break;
            }

            let dx = self.bezier_dx(s);
            s = if dx.abs() < 1e-6 {
                // 导数为零时退回半步修正
                s - residual * 0.5
            } else {
                s - residual / dx
            };
            s = s.clamp(0.0, 1.0);
        }

        self.bezier_y(s)
    }

    fn bezier_x(&self, s: f32) -> f32 {
        let s2 = s * s;
        let s3 = s2 * s;
        let t = 1.0 - s;
        let t2 = t * t;

        3.0 * t2 * s * self.x1 + 3.0 * t * s2 * self.x2 + s3
    }

    fn bezier_y(&self, s: f32) -> f32 {
        let s2 = s * s;
        let s3 = s2 * s;
        let t = 1.0 - s;
        let t2 = t * t;

        3.0 * t2 * s * self.y1 + 3.0 * t * s2 * self.y2 + s3
    }

    fn bezier_dx(&self, s: f32) -> f32 {
        let s2 = s * s;
        let t = 1.0 - s;

        3.0 * t * t * self.x1 + 6.0 * t * s * (self.x2 - self.x1) + 3.0 * s2 * (1.0 - self.x2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_vmd_linear_data() {
        // MMD 默认的线性插值参数
        let curve = BezierCurve::from_vmd_data(&[20, 20, 107, 107]);
        assert!(curve.is_linear());
        assert_eq!(curve.evaluate(0.3), 0.3);
        assert_eq!(curve.evaluate(-1.0), 0.0);
    }

    #[test]
    fn test_ease_in_out_is_symmetric() {
        let curve = BezierCurve::new(0.5, 0.0, 0.5, 1.0);
        assert!((curve.evaluate(0.5) - 0.5).abs() < 1e-3);
        assert!(curve.evaluate(0.25) < 0.25);
        assert!(curve.evaluate(0.75) > 0.75);
        assert!((curve.evaluate(0.25) + curve.evaluate(0.75) - 1.0).abs() < 2e-3);
    }

    #[test]
    fn test_newton_residual_converges() {
        let curve = BezierCurve::from_vmd_data(&[64, 0, 64, 127]);
        for i in 1..10 {
            let x = i as f32 / 10.0;
            let mut s = x;
            // 与 evaluate 相同的迭代，检查 x(s) 的残差
            for _ in 0..MAX_ITERATIONS {
                let residual = curve.bezier_x(s) - x;
                if residual.abs() <= EPSILON {
                    break;
                }
                s = (s - residual / curve.bezier_dx(s)).clamp(0.0, 1.0);
            }
            assert!((curve.bezier_x(s) - x).abs() <= EPSILON);
            assert!((curve.bezier_y(s) - curve.evaluate(x)).abs() < 1e-6);
        }
    }

    proptest! {
        #[test]
        fn prop_endpoints_and_range(
            x1 in 0u8..=127, y1 in 0u8..=127, x2 in 0u8..=127, y2 in 0u8..=127,
            x in 0.0f32..=1.0,
        ) {
            let curve = BezierCurve::from_vmd_data(&[x1, y1, x2, y2]);
            prop_assert_eq!(curve.evaluate(0.0), 0.0);
            prop_assert_eq!(curve.evaluate(1.0), 1.0);

            let y = curve.evaluate(x);
            prop_assert!(y.is_finite());
            prop_assert!((-1e-6..=1.0 + 1e-6).contains(&y));
        }
    }
}
