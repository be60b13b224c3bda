// Log record layout: file naming and banner text

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use super::target::Target;

const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const BANNER_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Language of the banners written around the captured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerLocale {
    #[default]
    En,
    Zh,
}

impl BannerLocale {
    /// Pick a locale from a POSIX `LANG`-style value (`zh_CN.UTF-8` -> Zh).
    pub fn from_lang(lang: &str) -> Self {
        if lang.to_ascii_lowercase().starts_with("zh") {
            BannerLocale::Zh
        } else {
            BannerLocale::En
        }
    }

    pub fn start_banner(self, target: &Target, at: DateTime<Local>) -> String {
        let ts = at.format(BANNER_TIMESTAMP_FORMAT);
        match self {
            BannerLocale::En => format!(
                "[{}] Starting probe of {}, count: {}",
                ts,
                target.address(),
                target.repeat_count()
            ),
            BannerLocale::Zh => format!(
                "[{}] 开始测试 {}，测试次数: {}",
                ts,
                target.address(),
                target.repeat_count()
            ),
        }
    }

    pub fn end_banner(self, target: &Target, at: DateTime<Local>) -> String {
        let ts = at.format(BANNER_TIMESTAMP_FORMAT);
        match self {
            BannerLocale::En => format!("[{}] Probe finished: {}", ts, target.address()),
            BannerLocale::Zh => format!("[{}] 测试结束 {}", ts, target.address()),
        }
    }

    pub fn spawn_failure(self, command: &str, reason: &str) -> String {
        match self {
            BannerLocale::En => format!("Failed to launch `{}`: {}", command, reason),
            BannerLocale::Zh => format!("无法启动 `{}`: {}", command, reason),
        }
    }
}

impl std::str::FromStr for BannerLocale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(BannerLocale::En),
            "zh" | "chinese" => Ok(BannerLocale::Zh),
            other => Err(format!("unsupported locale: {}", other)),
        }
    }
}

/// Replace characters that are unsafe in file names (IPv6 colons, path
/// separators, wildcard characters, whitespace) with `_`.
pub fn sanitize_address(address: &str) -> String {
    address
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_whitespace() || c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Deterministic log file name for one (address, run start) pair.
///
/// Second resolution; the log store disambiguates same-second collisions.
pub fn log_file_name(address: &str, run_started_at: DateTime<Local>) -> String {
    format!(
        "{}_probe_log_{}.txt",
        sanitize_address(address),
        run_started_at.format(FILE_TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::target::RepeatCount;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, h, m, s).unwrap()
    }

    #[test]
    fn test_log_file_name_format() {
        assert_eq!(
            log_file_name("10.0.0.1", at(8, 5, 7)),
            "10.0.0.1_probe_log_20240309_080507.txt"
        );
    }

    #[test]
    fn test_log_file_names_differ_across_runs() {
        let first = log_file_name("example.com", at(10, 0, 0));
        let second = log_file_name("example.com", at(10, 0, 1));
        assert_ne!(first, second);
    }

    #[test]
    fn test_sanitize_ipv6_and_separators() {
        assert_eq!(sanitize_address("fe80::1"), "fe80__1");
        assert_eq!(sanitize_address("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_address("host.local"), "host.local");
    }

    #[test]
    fn test_banners_carry_address_and_count() {
        let target = Target::new("10.0.0.1", RepeatCount::new(4).unwrap()).unwrap();

        let start = BannerLocale::En.start_banner(&target, at(9, 0, 0));
        assert_eq!(start, "[2024-03-09 09:00:00] Starting probe of 10.0.0.1, count: 4");

        let end = BannerLocale::Zh.end_banner(&target, at(9, 0, 5));
        assert_eq!(end, "[2024-03-09 09:00:05] 测试结束 10.0.0.1");
    }

    #[test]
    fn test_locale_from_lang() {
        assert_eq!(BannerLocale::from_lang("zh_CN.UTF-8"), BannerLocale::Zh);
        assert_eq!(BannerLocale::from_lang("en_US.UTF-8"), BannerLocale::En);
        assert_eq!(BannerLocale::from_lang(""), BannerLocale::En);
        assert_eq!("ZH".parse::<BannerLocale>(), Ok(BannerLocale::Zh));
        assert!("fr".parse::<BannerLocale>().is_err());
    }
}
