//! 通用工具函数

use uuid::Uuid;

/// 整数除法，四舍五入（0.5向上）
pub fn round_half_up_div(numerator: u64, denominator: u64) -> u64 {
    debug_assert!(denominator > 0);
    (numerator + denominator / 2) / denominator
}

/// 四舍五入到 `step` 的整数倍
pub fn round_to_step(numerator: u64, denominator: u64, step: u64) -> u64 {
    round_half_up_div(numerator, denominator * step) * step
}

/// `total` 的 `percent`%，四舍五入
pub fn percent_of(total: u32, percent: u32) -> u32 {
    round_half_up_div(total as u64 * percent as u64, 100) as u32
}

/// 生成会话ID
pub fn generate_session_id() -> String {
    format!("hs-{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up_div() {
        assert_eq!(round_half_up_div(5, 10), 1);
        assert_eq!(round_half_up_div(4, 10), 0);
        assert_eq!(round_half_up_div(15, 10), 2);
        assert_eq!(round_half_up_div(25, 10), 3);
    }

    #[test]
    fn test_round_to_step() {
        assert_eq!(round_to_step(3630, 1, 100), 3600);
        assert_eq!(round_to_step(3650, 1, 100), 3700);
        assert_eq!(round_to_step(3649, 1, 100), 3600);
    }

    #[test]
    fn test_percent_of() {
        assert_eq!(percent_of(3600, 50), 1800);
        assert_eq!(percent_of(3300, 15), 495);
        assert_eq!(percent_of(2500, 0), 0);
    }

    #[test]
    fn test_generate_session_id() {
        let a = generate_session_id();
        let b = generate_session_id();
        assert!(a.starts_with("hs-"));
        assert_ne!(a, b);
    }
}
