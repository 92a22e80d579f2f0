//! Bookable specialties and time slots.

use chrono::{NaiveTime, Timelike};

/// Substring keys mapped to canonical specialty names, checked in order.
const SPECIALTIES: &[(&str, &str)] = &[
    ("general", "General Medicine"),
    ("family", "General Medicine"),
    ("pediatr", "Pediatrics"),
    ("paediatr", "Pediatrics"),
    ("cardio", "Cardiology"),
    ("dermato", "Dermatology"),
    ("gynec", "Gynecology"),
    ("ginecolog", "Gynecology"),
    ("traumatolog", "Traumatology"),
    ("orthop", "Traumatology"),
    ("ophthalm", "Ophthalmology"),
    ("oftalmolog", "Ophthalmology"),
    ("neurolog", "Neurology"),
    ("psycholog", "Psychology"),
    ("psicolog", "Psychology"),
    ("nutrici", "Nutrition"),
    ("nutrition", "Nutrition"),
];

/// Opening blocks as `(first slot, last slot)` hours, in half-hour steps.
const BLOCKS: &[(u32, u32)] = &[(8, 12), (14, 18)];

/// Sorted, de-duplicated canonical specialty names.
pub fn specialties() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = SPECIALTIES.iter().map(|(_, name)| *name).collect();
    names.sort_unstable();
    names.dedup();
    names
}

/// Map free text to a canonical specialty.
///
/// The first table key contained in the lower-cased text wins, a canonical
/// name typed in any case also matches, and anything else is accepted as a
/// title-cased free-form specialty. Blank input yields `None`.
pub fn normalize_specialty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lowered = trimmed.to_lowercase();
    let known = SPECIALTIES
        .iter()
        .find(|(key, name)| lowered.contains(key) || lowered.contains(&name.to_lowercase()))
        .map(|(_, name)| name.to_string());
    Some(known.unwrap_or_else(|| title_case(trimmed)))
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Every bookable slot in chronological order.
pub fn slots() -> Vec<NaiveTime> {
    BLOCKS
        .iter()
        .flat_map(|&(start, end)| {
            (start * 2..=end * 2)
                .filter_map(|half| NaiveTime::from_hms_opt(half / 2, (half % 2) * 30, 0))
        })
        .collect()
}

pub fn is_slot(time: NaiveTime) -> bool {
    slots().contains(&time)
}

/// Slots split into morning (before 12:00) and afternoon.
pub fn slots_by_period() -> (Vec<NaiveTime>, Vec<NaiveTime>) {
    slots().into_iter().partition(|t| t.hour() < 12)
}
