// Host text encoding
// Picked once per process; probe output is decoded with it.

use encoding_rs::{Encoding, UTF_8};
use std::sync::OnceLock;

static HOST_ENCODING: OnceLock<&'static Encoding> = OnceLock::new();

/// Preferred text encoding of this host
///
/// Windows: console output code page, then the OEM code page.
/// Elsewhere: charset of `LC_ALL`, `LC_CTYPE` or `LANG`. UTF-8 when unknown.
pub fn host_encoding() -> &'static Encoding {
    *HOST_ENCODING.get_or_init(detect)
}

#[cfg(windows)]
fn detect() -> &'static Encoding {
    use windows_sys::Win32::Globalization::GetOEMCP;
    use windows_sys::Win32::System::Console::GetConsoleOutputCP;

    // 0 when the process has no console
    let console = unsafe { GetConsoleOutputCP() };
    let code_page = if console != 0 { console } else { unsafe { GetOEMCP() } };
    encoding_for_code_page(code_page)
}

#[cfg(not(windows))]
fn detect() -> &'static Encoding {
    let var = |name: &str| std::env::var(name).ok();
    encoding_for_locale([var("LC_ALL"), var("LC_CTYPE"), var("LANG")])
}

/// Map a Windows code page (936, 437, 65001, ...) to an encoding
pub fn encoding_for_code_page(code_page: u32) -> &'static Encoding {
    u16::try_from(code_page)
        .ok()
        .and_then(codepage::to_encoding)
        .unwrap_or(UTF_8)
}

/// Resolve POSIX locale variables in precedence order (`LC_ALL`, `LC_CTYPE`,
/// `LANG`). The first non-empty one decides; `zh_CN.GBK@euro` -> GBK.
pub fn encoding_for_locale<I>(vars: I) -> &'static Encoding
where
    I: IntoIterator<Item = Option<String>>,
{
    let Some(locale) = vars.into_iter().flatten().find(|v| !v.is_empty()) else {
        return UTF_8;
    };
    let charset = locale
        .split_once('.')
        .map(|(_, rest)| rest.split('@').next().unwrap_or(rest))
        .unwrap_or_default();
    Encoding::for_label(charset.as_bytes()).unwrap_or(UTF_8)
}
