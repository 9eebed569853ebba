//! 有理数类型, 用于帧率、采样宽高比等派生属性.
//!
//! 码流中的时间信息 (time_scale, num_units_in_tick) 与 SAR 均为无符号值,
//! 因此分子分母都使用 `u32`.

use std::fmt;

/// 有理数, 由分子和分母组成
///
/// 例如: 帧率 30000/1001 表示 29.97fps, SAR 16/11 表示非方形像素.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rational {
    /// 分子
    pub num: u32,
    /// 分母
    pub den: u32,
}

impl Rational {
    /// 创建新的有理数
    pub const fn new(num: u32, den: u32) -> Self {
        Self { num, den }
    }

    /// 未定义 (分母为 0)
    pub const UNDEFINED: Self = Self { num: 0, den: 0 };

    /// 判断是否有效 (分母不为 0)
    pub const fn is_valid(&self) -> bool {
        self.den != 0
    }

    /// 转换为 f64 浮点数
    ///
    /// 如果分母为 0, 返回 `f64::NAN`.
    pub fn to_f64(self) -> f64 {
        if self.den == 0 {
            return f64::NAN;
        }
        f64::from(self.num) / f64::from(self.den)
    }

    /// 对有理数进行约分
    pub fn reduce(self) -> Self {
        let g = gcd(self.num, self.den);
        if g == 0 {
            return self;
        }
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }

    /// 由 time_scale / (num_units_in_tick * ticks_per_frame) 得到帧率
    ///
    /// 乘积溢出 u32 或任一值为 0 时返回 `None`.
    pub fn from_timing(time_scale: u32, num_units_in_tick: u32, ticks_per_frame: u32) -> Option<Self> {
        let den = num_units_in_tick.checked_mul(ticks_per_frame)?;
        if time_scale == 0 || den == 0 {
            return None;
        }
        Some(Self::new(time_scale, den).reduce())
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

/// 求最大公约数 (欧几里得算法)
fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}
