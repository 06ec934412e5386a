//! Random choice service.
//!
//! Every generator takes a [`RandomSource`] explicitly instead of reaching for a
//! global RNG, so tests can swap in a seeded or fully scripted source.

use std::sync::Mutex;

use uuid::Uuid;

/// A fake vehicle, used to title seeded items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub brand: String,
    pub model: String,
    pub year: i64,
}

/// Source of uniform choices and fake domain values.
///
/// Implementations must be safe to share between concurrently running
/// handlers.
pub trait RandomSource: Send + Sync {
    /// Uniform index in `[0, len)`. Callers never pass `len == 0`.
    fn index(&self, len: usize) -> usize;

    /// Uniform integer in the closed range `[min, max]`.
    fn number(&self, min: i64, max: i64) -> i64;

    fn name(&self) -> String;

    fn vehicle(&self) -> Vehicle;

    fn street(&self) -> String;

    fn city(&self) -> String;

    fn country(&self) -> String;

    /// Fresh unique identifier.
    ///
    /// Unique across runs even when the choices are seeded, and never
    /// advances the seeded sequence.
    fn token(&self) -> Uuid;

    /// Uniform pick from a set of strings.
    fn pick_str<'a>(&self, set: &[&'a str]) -> Option<&'a str> {
        if set.is_empty() {
            return None;
        }
        set.get(self.index(set.len())).copied()
    }

    /// `"<street>, <city>, <country>"`.
    fn address(&self) -> String {
        format!("{}, {}, {}", self.street(), self.city(), self.country())
    }
}

/// Uniform pick from any slice. `None` when the slice is empty.
pub fn pick<'a, T>(random: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        return None;
    }
    items.get(random.index(items.len()))
}

// ============================================================================
// FakeRandom
// ============================================================================

/// [`RandomSource`] backed by `fastrand` and built-in word lists.
pub struct FakeRandom {
    rng: Mutex<fastrand::Rng>,
}

impl FakeRandom {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Reproducible sequence of choices for a given seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    fn with_rng<R>(&self, f: impl FnOnce(&mut fastrand::Rng) -> R) -> R {
        // A poisoned lock still holds a usable RNG.
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut rng)
    }

    fn word(&self, list: &[&'static str]) -> &'static str {
        self.pick_str(list).unwrap_or_default()
    }
}

impl Default for FakeRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FakeRandom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FakeRandom").finish_non_exhaustive()
    }
}

impl RandomSource for FakeRandom {
    fn index(&self, len: usize) -> usize {
        self.with_rng(|rng| rng.usize(..len.max(1)))
    }

    fn number(&self, min: i64, max: i64) -> i64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.with_rng(|rng| rng.i64(lo..=hi))
    }

    fn name(&self) -> String {
        format!("{} {}", self.word(FIRST_NAMES), self.word(LAST_NAMES))
    }

    fn vehicle(&self) -> Vehicle {
        let (brand, models) = pick(self, VEHICLES).copied().unwrap_or(FALLBACK_VEHICLE);
        Vehicle {
            brand: brand.to_string(),
            model: self.word(models).to_string(),
            year: self.number(1990, 2024),
        }
    }

    fn street(&self) -> String {
        format!(
            "{} {} {}",
            self.number(1, 9999),
            self.word(STREET_NAMES),
            self.word(STREET_SUFFIXES)
        )
    }

    fn city(&self) -> String {
        self.word(CITIES).to_string()
    }

    fn country(&self) -> String {
        self.word(COUNTRIES).to_string()
    }

    fn token(&self) -> Uuid {
        Uuid::new_v4()
    }
}

// ============================================================================
// Word lists
// ============================================================================

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bruno", "Carla", "Dmitri", "Elena", "Farid", "Greta", "Hugo", "Ines", "Jonas",
    "Kira", "Luca", "Maya", "Nikola", "Olga", "Pavel", "Quinn", "Rosa", "Stefan", "Tara",
];

const LAST_NAMES: &[&str] = &[
    "Anders", "Baker", "Costa", "Dimitrov", "Evans", "Fischer", "Garcia", "Horvat", "Ivanova",
    "Jensen", "Kovac", "Lindqvist", "Moreau", "Novak", "Okafor", "Petrovic", "Rossi", "Schmidt",
];

const VEHICLES: &[(&str, &[&str])] = &[
    ("Audi", &["A3", "A4", "Q5"]),
    ("BMW", &["320i", "X3", "M5"]),
    ("Ford", &["Focus", "Mustang", "F-150"]),
    ("Honda", &["Civic", "Accord", "CR-V"]),
    ("Toyota", &["Corolla", "Camry", "RAV4"]),
    ("Volkswagen", &["Golf", "Passat", "Tiguan"]),
    ("Volvo", &["XC60", "V70", "S90"]),
    ("Skoda", &["Octavia", "Fabia", "Superb"]),
];

const FALLBACK_VEHICLE: (&str, &[&str]) = ("Ford", &["Focus"]);

const STREET_NAMES: &[&str] = &[
    "Maple", "Oak", "Cedar", "Lake", "Hill", "Park", "Church", "Mill", "River", "Station",
];

const STREET_SUFFIXES: &[&str] = &["Street", "Avenue", "Road", "Lane", "Boulevard", "Way"];

const CITIES: &[&str] = &[
    "Springfield", "Riverton", "Lakeside", "Fairview", "Georgetown", "Kingston", "Salem",
    "Franklin", "Clinton", "Madison",
];

const COUNTRIES: &[&str] = &[
    "Austria", "Brazil", "Canada", "Denmark", "Estonia", "France", "Germany", "Hungary",
    "Italy", "Japan", "Norway", "Portugal", "Serbia", "Spain", "Sweden",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_stays_in_closed_range() {
        let random = FakeRandom::with_seed(7);
        for _ in 0..1000 {
            let n = random.number(1, 5);
            assert!((1..=5).contains(&n));
        }
    }

    #[test]
    fn number_hits_both_bounds() {
        let random = FakeRandom::with_seed(11);
        let draws: Vec<i64> = (0..500).map(|_| random.number(1, 5)).collect();
        assert!(draws.contains(&1));
        assert!(draws.contains(&5));
    }

    #[test]
    fn same_seed_same_sequence() {
        let a = FakeRandom::with_seed(42);
        let b = FakeRandom::with_seed(42);

        assert_eq!(a.name(), b.name());
        assert_eq!(a.vehicle(), b.vehicle());
    }

    #[test]
    fn seeded_tokens_differ_and_leave_draws_alone() {
        let a = FakeRandom::with_seed(42);
        let b = FakeRandom::with_seed(42);

        assert_ne!(a.token(), b.token());
        for _ in 0..10 {
            a.token();
        }
        assert_eq!(a.number(1, 1000), b.number(1, 1000));
        assert_eq!(a.name(), b.name());
    }

    #[test]
    fn pick_from_empty_is_none() {
        let random = FakeRandom::with_seed(1);
        let empty: [u8; 0] = [];
        assert!(pick(&random, &empty).is_none());
        assert!(random.pick_str(&[]).is_none());
    }

    #[test]
    fn address_has_three_parts() {
        let random = FakeRandom::with_seed(3);
        let address = random.address();
        assert_eq!(address.split(", ").count(), 3);
    }

    #[test]
    fn tokens_are_v4_and_distinct() {
        let random = FakeRandom::new();
        let a = random.token();
        let b = random.token();
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
    }
}
