//! Guessing the day and night variants of a GTK theme from its name.
//!
//! Theme families name their dark variants inconsistently. Most append
//! `-dark`, some use `-Dark`, `-Nokto`, `-Noir` or `_Darkest`, and a few swap
//! a `-Light` suffix. Known families are matched first; anything else falls
//! back to the generic rule:
//!
//! - day: strip `-dark` / `-darkest` (but not `-darker`)
//! - night: strip `-light` / `-darker` from the day variant and append
//!   `-dark` (or `-darkest` if the original used it)

use std::sync::LazyLock;

use regex::{Captures, Regex};
use umbra_core::logging::targets;

/// The variants guessed for one theme name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThemeVariants {
    /// The name the guess started from.
    pub original: String,
    /// The light variant.
    pub day: String,
    /// The dark variant.
    pub night: String,
}

impl ThemeVariants {
    /// Returns true if the original name is the night variant.
    pub fn is_night(&self) -> bool {
        self.original == self.night
    }
}

struct Patterns {
    capital_dark: Regex,
    arc_night: Regex,
    cabinet_night: Regex,
    compact_family: Regex,
    compact_night: Regex,
    waita_family: Regex,
    plata_night: Regex,
    prof_gnome: Regex,
    prof_gnome_night: Regex,
    teja_dark: Regex,
    vimix_night: Regex,
    generic_dark: Regex,
    generic_light: Regex,
}

impl Patterns {
    fn compile() -> Result<Self, regex::Error> {
        Ok(Self {
            // `-Dark` not followed by `er`; the suffix is captured and kept.
            capital_dark: Regex::new(r"-Dark(er)?")?,
            arc_night: Regex::new(r"Arc(-Darker)?")?,
            cabinet_night: Regex::new(r"-Light|-Darker")?,
            compact_family: Regex::new(r"^(Canta|ChromeOS|Materia|Orchis).*-compact$")?,
            compact_night: Regex::new(r"(-light)?-compact")?,
            waita_family: Regex::new(r"^(Layan|Macwaita|Matcha|Nextwaita)")?,
            plata_night: Regex::new(r"Plata(-Lumine)?")?,
            prof_gnome: Regex::new(r"^Prof-Gnome-(.+)-3(.*)$")?,
            prof_gnome_night: Regex::new(r"-Light(-DS)?|-Darker")?,
            teja_dark: Regex::new(r"_Dark(est)?|_Black")?,
            vimix_night: Regex::new(r"vimix(-light)?")?,
            // `-dark` or `-darkest`, but `-darker` is captured and kept.
            generic_dark: Regex::new(r"-dark(er|est)?")?,
            generic_light: Regex::new(r"-light|-darker")?,
        })
    }
}

static PATTERNS: LazyLock<Option<Patterns>> = LazyLock::new(|| match Patterns::compile() {
    Ok(patterns) => Some(patterns),
    Err(err) => {
        tracing::error!(target: targets::THEMES, error = %err, "theme variant patterns failed to compile");
        None
    }
});

/// Guess the day and night variants of `theme_name`.
///
/// ```
/// use umbra::themes::guess_variants;
///
/// let variants = guess_variants("Adwaita-dark");
/// assert_eq!(variants.day, "Adwaita");
/// assert_eq!(variants.night, "Adwaita-dark");
/// assert!(variants.is_night());
/// ```
pub fn guess_variants(theme_name: &str) -> ThemeVariants {
    let (day, night) = match PATTERNS.as_ref() {
        Some(patterns) => guess_with(patterns, theme_name),
        None => (theme_name.to_string(), theme_name.to_string()),
    };
    ThemeVariants {
        original: theme_name.to_string(),
        day,
        night,
    }
}

fn guess_with(p: &Patterns, name: &str) -> (String, String) {
    if name.contains("Adapta") {
        let day = name.replace("-Nokto", "");
        let night = day.replace("Adapta", "Adapta-Nokto");
        (day, night)
    } else if name.contains("Arc") {
        let day = replace_unless_captured(&p.capital_dark, name, "");
        let night = p.arc_night.replace_all(&day, "Arc-Dark").into_owned();
        (day, night)
    } else if name.starts_with("Cabinet") {
        let day = replace_unless_captured(&p.capital_dark, name, "-Light");
        let night = p.cabinet_night.replace_all(&day, "-Dark").into_owned();
        (day, night)
    } else if p.compact_family.is_match(name) {
        let day = name.replace("-dark", "");
        let night = p.compact_night.replace_all(&day, "-dark-compact").into_owned();
        (day, night)
    } else if name.contains("Flat-Remix-GTK") {
        flat_remix(name)
    } else if name.contains("HighContrast") {
        ("HighContrast".to_string(), "HighContrastInverse".to_string())
    } else if let Some(family) = p.waita_family.captures(name) {
        let basename = family.get(1).map_or("", |m| m.as_str());
        let day = name.replace("-dark", "");
        let rest = day
            .strip_prefix(&format!("{basename}-light"))
            .or_else(|| day.strip_prefix(basename))
            .unwrap_or(&day);
        let night = format!("{basename}-dark{rest}");
        (day, night)
    } else if name.contains("Mojave") {
        let day = name.replace("-dark", "-light");
        let night = day.replace("-light", "-dark");
        (day, night)
    } else if name.contains("Plata") {
        let day = name.replace("-Noir", "");
        let night = p.plata_night.replace_all(&day, "Plata-Noir").into_owned();
        (day, night)
    } else if p.prof_gnome.is_match(name) {
        let day = replace_unless_captured(&p.capital_dark, name, "-Light");
        let night = p.prof_gnome_night.replace_all(&day, "-Dark").into_owned();
        (day, night)
    } else if name.contains("Simply_Circles") {
        (name.replace("_Dark", "_Light"), name.replace("_Light", "_Dark"))
    } else if name.contains("Teja") {
        teja(p, name)
    } else if name.contains("vimix") {
        let day = name.replace("-dark", "");
        let night = p.vimix_night.replace_all(&day, "vimix-dark").into_owned();
        (day, night)
    } else {
        let day = p
            .generic_dark
            .replace_all(name, |caps: &Captures| match caps.get(1).map(|m| m.as_str()) {
                Some("er") => caps[0].to_string(),
                _ => String::new(),
            })
            .into_owned();
        let suffix = if name.contains("-darkest") { "-darkest" } else { "-dark" };
        let night = format!("{}{suffix}", p.generic_light.replace_all(&day, ""));
        (day, night)
    }
}

/// Replace matches of `pattern` with `replacement` unless its first capture
/// group participated, in which case the match is kept as is.
fn replace_unless_captured(pattern: &Regex, haystack: &str, replacement: &str) -> String {
    pattern
        .replace_all(haystack, |caps: &Captures| {
            if caps.get(1).is_some() {
                caps[0].to_string()
            } else {
                replacement.to_string()
            }
        })
        .into_owned()
}

fn flat_remix(name: &str) -> (String, String) {
    let solid = if name.contains("-Solid") { "-Solid" } else { "" };
    let no_border = if name.contains("-NoBorder") { "-NoBorder" } else { "" };
    let basename = name.split('-').take(4).collect::<Vec<_>>().join("-");

    let darker = if name.contains("-Darker") { "-Darker" } else { "" };
    let dark = if name.contains("-Darkest") { "-Darkest" } else { "-Dark" };
    (
        format!("{basename}{darker}{solid}"),
        format!("{basename}{dark}{solid}{no_border}"),
    )
}

fn teja(p: &Patterns, name: &str) -> (String, String) {
    let without_light = name.replace("_Light", "");
    let dark_suffix = match without_light.split('_').nth(1) {
        Some(variant) => format!("_{variant}"),
        None => "_Dark".to_string(),
    };
    let day = p.teja_dark.replace_all(name, "").into_owned();
    let night = format!("{}{dark_suffix}", day.replace("_Light", ""));
    (day, night)
}
