//! 릴리즈 태그 버전 비교 유틸리티
//!
//! uBlock 태그는 semver가 아니다 (`1.69.0`, `1.69.1b0`, `1.70.0rc2` ...).
//! 점으로 구분된 숫자 구간과 그 뒤의 접미사(suffix)로 나눠서 비교한다.

use std::cmp::Ordering;

/// 앞뒤 공백과 선행 `v`/`V` 한 글자를 제거
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    stripped.trim().to_string()
}

/// 두 버전 문자열 비교 (`a`가 더 새로우면 `Greater`)
pub fn compare(a: &str, b: &str) -> Ordering {
    Version::parse(a).cmp(&Version::parse(b))
}

/// `latest`가 `current`보다 엄격하게 새로운지 확인
pub fn is_newer(latest: &str, current: &str) -> bool {
    compare(latest, current) == Ordering::Greater
}

/// 파싱된 버전 (숫자 구간 + 소문자 접미사)
///
/// 비교 시 짧은 쪽은 0으로 채우므로 `1.0`과 `1.0.0`은 같다.
/// `Eq`가 `Ord`와 일치하도록 끝의 0 구간은 파싱 단계에서 잘라낸다.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    numbers: Vec<u64>,
    suffix: String,
}

impl Version {
    pub fn parse(raw: &str) -> Self {
        let normalized = normalize(raw);

        // 숫자 구간: [0-9]+(\.[0-9]+)*
        let bytes = normalized.as_bytes();
        let mut end = 0;
        let mut numbers = Vec::new();
        loop {
            let start = end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end == start {
                // "1." 처럼 점 뒤에 숫자가 없으면 점은 접미사에 남긴다
                if start > 0 {
                    end = start - 1;
                }
                break;
            }
            numbers.push(normalized[start..end].parse::<u64>().unwrap_or(u64::MAX));
            if end < bytes.len() && bytes[end] == b'.' {
                end += 1;
            } else {
                break;
            }
        }

        let suffix = normalized[end..].to_lowercase();
        while numbers.last() == Some(&0) {
            numbers.pop();
        }

        Self { numbers, suffix }
    }

    pub fn numbers(&self) -> &[u64] {
        &self.numbers
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// 접미사가 있으면 정식 빌드 이전 단계로 간주
    pub fn is_prerelease(&self) -> bool {
        !self.suffix.is_empty()
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.numbers.len().max(other.numbers.len());
        for i in 0..len {
            let left = self.numbers.get(i).copied().unwrap_or(0);
            let right = other.numbers.get(i).copied().unwrap_or(0);
            match left.cmp(&right) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        // 접미사 없는 쪽이 정식 빌드 → 더 높음
        match (self.suffix.is_empty(), other.suffix.is_empty()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => self.suffix.cmp(&other.suffix),
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_prefix_and_whitespace() {
        assert_eq!(normalize(" v1.69.0 "), "1.69.0");
        assert_eq!(normalize("V2.0"), "2.0");
        assert_eq!(normalize("1.69.0"), "1.69.0");
        // 한 글자만 제거
        assert_eq!(normalize("vv1"), "v1");
    }

    #[test]
    fn parse_numbers_and_suffix() {
        let v = Version::parse("1.69.1b0");
        assert_eq!(v.numbers(), &[1, 69, 1]);
        assert_eq!(v.suffix(), "b0");
        assert!(v.is_prerelease());

        let v = Version::parse("v1.70.0RC2");
        assert_eq!(v.suffix(), "rc2");
    }

    #[test]
    fn parse_without_numeric_prefix() {
        let v = Version::parse("nightly");
        assert!(v.numbers().is_empty());
        assert_eq!(v.suffix(), "nightly");
    }

    #[test]
    fn parse_trailing_dot_stays_in_suffix() {
        let v = Version::parse("1.2.");
        assert_eq!(v.numbers(), &[1, 2]);
        assert_eq!(v.suffix(), ".");
    }

    #[test]
    fn release_outranks_suffixed_build() {
        assert_eq!(compare("1.69.1", "1.69.1b0"), Ordering::Greater);
        assert_eq!(compare("1.69.1b0", "1.69.1"), Ordering::Less);
    }

    #[test]
    fn numeric_segments_compare_numerically() {
        assert_eq!(compare("1.69.0", "1.68.9"), Ordering::Greater);
        assert_eq!(compare("1.10.0", "1.9.0"), Ordering::Greater);
        assert_eq!(compare("2", "1.99.99"), Ordering::Greater);
    }

    #[test]
    fn missing_components_are_zero() {
        assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
        assert_eq!(Version::parse("1.0"), Version::parse("1.0.0"));
        assert_eq!(compare("1.0.1", "1.0"), Ordering::Greater);
    }

    #[test]
    fn suffixes_compare_lexicographically() {
        assert_eq!(compare("1.70.0b2", "1.70.0b1"), Ordering::Greater);
        assert_eq!(compare("1.70.0rc1", "1.70.0b9"), Ordering::Greater);
    }

    #[test]
    fn is_newer_is_strict() {
        assert!(is_newer("1.69.1", "1.69.0"));
        assert!(!is_newer("1.69.0", "v1.69.0"));
    }

    #[test]
    fn ordering_is_total_over_samples() {
        let samples = [
            "1.69.0", "1.69.1b0", "1.69.1", "v1.69.1", "1.0", "1.0.0", "1", "nightly",
            "0", "1.70.0rc1", "1.70.0b9", "1.69.0.1", "",
        ];
        for a in samples {
            assert_eq!(compare(a, a), Ordering::Equal, "reflexive: {}", a);
            for b in samples {
                assert_eq!(compare(a, b), compare(b, a).reverse(), "antisymmetric: {} {}", a, b);
                for c in samples {
                    if compare(a, b) != Ordering::Less && compare(b, c) != Ordering::Less {
                        assert_ne!(compare(a, c), Ordering::Less, "transitive: {} {} {}", a, b, c);
                    }
                }
            }
        }
    }
}
