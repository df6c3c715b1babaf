use std::env;

pub use rust_i18n::t;

pub const SUPPORTED_LOCALES: [&str; 3] = ["en", "ko", "ja"];

/// Sets the UI locale from the CLI choice, then `LANG`, then English.
pub fn init_locale(preferred: Option<&str>) -> &'static str {
    let locale = resolve_locale(preferred, env::var("LANG").ok().as_deref());
    rust_i18n::set_locale(locale);
    locale
}

fn resolve_locale(preferred: Option<&str>, lang: Option<&str>) -> &'static str {
    preferred
        .and_then(normalize_locale)
        .or_else(|| lang.and_then(normalize_locale))
        .unwrap_or("en")
}

fn normalize_locale(locale: &str) -> Option<&'static str> {
    let lower = locale.trim().to_lowercase();
    if lower.starts_with("jp") {
        return Some("ja");
    }
    SUPPORTED_LOCALES
        .into_iter()
        .find(|code| lower.starts_with(code))
}
