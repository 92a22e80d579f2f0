//! Keyword sets driving the booking dialogue.
//!
//! Intent, cancel and list checks are plain substring containment on the
//! lower-cased message. Confirmation answers are matched per word.

const BOOKING: &[&str] = &[
    "appointment",
    "book",
    "schedule",
    "slot",
    "consultation",
    "cita",
    "reserv",
    "agend",
    "turno",
    "consulta",
];

const CANCEL: &[&str] = &[
    "cancel",
    "stop",
    "quit",
    "never mind",
    "nevermind",
    "cancelar",
    "salir",
    "terminar",
    "no quiero",
];

const LIST: &[&str] = &[
    "my appointments",
    "list appointments",
    "show appointments",
    "view appointments",
    "mis citas",
    "ver citas",
    "consultar citas",
    "tengo citas",
];

const AFFIRMATIVE: &[&str] = &[
    "yes", "yeah", "yep", "ok", "okay", "sure", "correct", "si", "sí", "dale", "listo",
];

/// Any word starting with this stem confirms ("confirm", "confirmed", "confirmar").
const AFFIRMATIVE_STEM: &str = "confirm";

const NEGATIVE: &[&str] = &[
    "no", "nope", "change", "modify", "edit", "cambiar", "modificar", "editar",
];

fn contains_any(text: &str, keywords: &[&str]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k))
}

/// Lower-cased words. Apostrophes stay inside a word, so "that's" is one word.
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '’'))
        .map(|w| w.trim_matches(|c: char| c == '\'' || c == '’'))
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

pub fn is_booking_intent(text: &str) -> bool {
    contains_any(text, BOOKING)
}

pub fn is_cancel(text: &str) -> bool {
    contains_any(text, CANCEL)
}

pub fn is_list_request(text: &str) -> bool {
    contains_any(text, LIST)
}

pub fn is_affirmative(text: &str) -> bool {
    words(text).any(|w| AFFIRMATIVE.contains(&w.as_str()) || w.starts_with(AFFIRMATIVE_STEM))
}

pub fn is_negative(text: &str) -> bool {
    words(text).any(|w| NEGATIVE.contains(&w.as_str()))
}
