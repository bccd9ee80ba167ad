//! Localized step instructions.
//!
//! Lookups go (maneuver, language) → text. An unsupported language falls
//! back to English, and a maneuver with no entry falls back to the
//! language's generic "continue" text.

use waypoint_geo::CompassPoint;
use waypoint_routing_models::Maneuver;

/// Languages with their own instruction table.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "pl"];

/// Reduces a language tag such as `"pl-PL"` or `"EN_us"` to a supported
/// table code, falling back to `"en"`.
#[must_use]
pub fn normalize_language(language: &str) -> &'static str {
    let primary = language
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    SUPPORTED_LANGUAGES
        .iter()
        .find(|code| **code == primary)
        .copied()
        .unwrap_or("en")
}

#[allow(clippy::unnecessary_wraps)]
fn english(maneuver: Maneuver) -> Option<&'static str> {
    Some(match maneuver {
        Maneuver::Depart => "Depart",
        Maneuver::Arrive => "You have arrived at your destination",
        Maneuver::Continue => "Continue",
        Maneuver::Straight => "Go straight",
        Maneuver::TurnLeft => "Turn left",
        Maneuver::TurnRight => "Turn right",
        Maneuver::SlightLeft => "Bear left",
        Maneuver::SlightRight => "Bear right",
        Maneuver::SharpLeft => "Turn sharp left",
        Maneuver::SharpRight => "Turn sharp right",
        Maneuver::UTurn => "Make a U-turn",
        Maneuver::Merge => "Merge",
        Maneuver::Roundabout => "Enter the roundabout",
    })
}

fn polish(maneuver: Maneuver) -> Option<&'static str> {
    Some(match maneuver {
        Maneuver::Depart => "Rozpocznij",
        Maneuver::Arrive => "Dotarłeś do celu",
        Maneuver::Continue => "Kontynuuj",
        Maneuver::Straight => "Jedź prosto",
        Maneuver::TurnLeft => "Skręć w lewo",
        Maneuver::TurnRight => "Skręć w prawo",
        Maneuver::SlightLeft => "Skręć lekko w lewo",
        Maneuver::SlightRight => "Skręć lekko w prawo",
        Maneuver::SharpLeft => "Skręć ostro w lewo",
        Maneuver::SharpRight => "Skręć ostro w prawo",
        Maneuver::UTurn => "Zawróć",
        Maneuver::Roundabout => "Wjedź na rondo",
        Maneuver::Merge => return None,
    })
}

fn table(language: &str) -> fn(Maneuver) -> Option<&'static str> {
    match normalize_language(language) {
        "pl" => polish,
        _ => english,
    }
}

/// Instruction text for `maneuver` in `language`.
#[must_use]
pub fn instruction(maneuver: Maneuver, language: &str) -> &'static str {
    let lookup = table(language);
    lookup(maneuver)
        .or_else(|| lookup(Maneuver::Continue))
        .unwrap_or("Continue")
}

/// Localized name of a compass direction.
#[must_use]
pub fn direction_name(direction: CompassPoint, language: &str) -> &'static str {
    match (normalize_language(language), direction) {
        ("pl", CompassPoint::N) => "północ",
        ("pl", CompassPoint::NE) => "północny wschód",
        ("pl", CompassPoint::E) => "wschód",
        ("pl", CompassPoint::SE) => "południowy wschód",
        ("pl", CompassPoint::S) => "południe",
        ("pl", CompassPoint::SW) => "południowy zachód",
        ("pl", CompassPoint::W) => "zachód",
        ("pl", CompassPoint::NW) => "północny zachód",
        (_, CompassPoint::N) => "north",
        (_, CompassPoint::NE) => "northeast",
        (_, CompassPoint::E) => "east",
        (_, CompassPoint::SE) => "southeast",
        (_, CompassPoint::S) => "south",
        (_, CompassPoint::SW) => "southwest",
        (_, CompassPoint::W) => "west",
        (_, CompassPoint::NW) => "northwest",
    }
}

/// "Head north"-style text for a departure step.
#[must_use]
pub fn depart_instruction(direction: CompassPoint, language: &str) -> String {
    let name = direction_name(direction, language);
    match normalize_language(language) {
        "pl" => format!("Kieruj się na {name}"),
        _ => format!("Head {name}"),
    }
}

/// Instruction text with the street appended when one is known.
#[must_use]
pub fn instruction_onto(maneuver: Maneuver, language: &str, street: Option<&str>) -> String {
    let base = instruction(maneuver, language);
    match (street, normalize_language(language)) {
        (None, _) => base.to_string(),
        (Some(street), "pl") => format!("{base} w {street}"),
        (Some(street), _) => format!("{base} onto {street}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_and_polish_tables() {
        assert_eq!(instruction(Maneuver::TurnLeft, "en"), "Turn left");
        assert_eq!(instruction(Maneuver::TurnLeft, "pl"), "Skręć w lewo");
    }

    #[test]
    fn region_subtags_are_ignored() {
        assert_eq!(instruction(Maneuver::TurnRight, "pl-PL"), "Skręć w prawo");
        assert_eq!(instruction(Maneuver::TurnRight, "EN_us"), "Turn right");
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(instruction(Maneuver::UTurn, "xx"), "Make a U-turn");
        assert_eq!(instruction(Maneuver::UTurn, ""), "Make a U-turn");
    }

    #[test]
    fn missing_maneuver_falls_back_to_continue() {
        assert_eq!(instruction(Maneuver::Merge, "pl"), "Kontynuuj");
    }

    #[test]
    fn departure_text_is_localized() {
        assert_eq!(depart_instruction(CompassPoint::NE, "en"), "Head northeast");
        assert_eq!(
            depart_instruction(CompassPoint::S, "pl"),
            "Kieruj się na południe"
        );
    }

    #[test]
    fn street_is_appended() {
        assert_eq!(
            instruction_onto(Maneuver::TurnLeft, "en", Some("Damrak")),
            "Turn left onto Damrak"
        );
        assert_eq!(instruction_onto(Maneuver::Continue, "en", None), "Continue");
    }
}
