use crate::UplinkStatus;

/// Derive an uplink's status from its hex rendering.
///
/// The hex string is read as a big-endian unsigned integer of any width. Only
/// the value 1 passes; zero, larger values, an empty string and non-hex input
/// all fail.
pub fn classify(hex: &str) -> UplinkStatus {
    if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return UplinkStatus::Failing;
    }

    // Leading zeros do not change the value, so only "1" can remain.
    if hex.trim_start_matches('0') == "1" {
        UplinkStatus::Passing
    } else {
        UplinkStatus::Failing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_is_passing() {
        assert_eq!(classify("01"), UplinkStatus::Passing);
    }

    #[test]
    fn test_zero_is_failing() {
        assert_eq!(classify("00"), UplinkStatus::Failing);
    }

    #[test]
    fn test_ff_is_failing() {
        assert_eq!(classify("FF"), UplinkStatus::Failing);
    }

    #[test]
    fn test_wide_big_endian_one_is_passing() {
        assert_eq!(classify("00000001"), UplinkStatus::Passing);
        assert_eq!(classify("1"), UplinkStatus::Passing);
    }

    #[test]
    fn test_one_in_high_byte_is_failing() {
        // 0x0100 == 256
        assert_eq!(classify("0100"), UplinkStatus::Failing);
        assert_eq!(classify("10"), UplinkStatus::Failing);
    }

    #[test]
    fn test_values_wider_than_u128_do_not_overflow() {
        let hex = format!("{}01", "00".repeat(64));
        assert_eq!(classify(&hex), UplinkStatus::Passing);
        let hex = format!("01{}", "00".repeat(64));
        assert_eq!(classify(&hex), UplinkStatus::Failing);
    }

    #[test]
    fn test_unparseable_input_is_failing() {
        assert_eq!(classify(""), UplinkStatus::Failing);
        assert_eq!(classify("0G"), UplinkStatus::Failing);
        assert_eq!(classify("-1"), UplinkStatus::Failing);
        assert_eq!(classify(" 1"), UplinkStatus::Failing);
    }

    #[test]
    fn test_is_deterministic() {
        for hex in ["01", "00", "FF", "0001", ""] {
            assert_eq!(classify(hex), classify(hex));
        }
    }
}
