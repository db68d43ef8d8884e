//! Identity population.
//!
//! Generates the root `Person` records every other generator references.
//! Heights follow a sex-specific normal distribution and weights come
//! from a BMI draw, so the two stay physically plausible together.

use crate::records::{Address, Alias, Person};
use crate::sampler::{chance, pick, IntRange, ListDraw, WeightedTable};
use chrono::{Duration, NaiveDate};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use safetynet_env::{GenError, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Streets and house-number range for one zip code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighborhood {
    pub zip_code: String,
    pub streets: Vec<String>,
    pub numbers: IntRange,
}

/// Normal height distribution, clamped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightSpec {
    pub mean_inches: f64,
    pub std_dev: f64,
    pub min_inches: u32,
    pub max_inches: u32,
}

/// A medical-history condition with the demographic filter it applies to.
///
/// The age filter is `older_than < age <= up_to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRule {
    pub condition: String,
    pub probability: f64,
    #[serde(default)]
    pub older_than: u32,
    #[serde(default)]
    pub up_to: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub race: Option<String>,
}

impl HistoryRule {
    fn rule(condition: &str, probability: f64, older_than: u32, up_to: Option<u32>) -> Self {
        Self {
            condition: condition.to_string(),
            probability,
            older_than,
            up_to,
            sex: None,
            race: None,
        }
    }

    pub fn applies(&self, age: u32, sex: &str, race: &str) -> bool {
        age > self.older_than
            && self.up_to.map_or(true, |max| age <= max)
            && self.sex.as_deref().map_or(true, |s| s == sex)
            && self.race.as_deref().map_or(true, |r| r == race)
    }
}

/// Demographic tables for person generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationTables {
    pub adult_ages: IntRange,
    pub races: WeightedTable<String>,
    pub sexes: WeightedTable<String>,
    pub first_names: BTreeMap<String, Vec<String>>,
    pub last_names: BTreeMap<String, Vec<String>>,
    pub default_last_names: Vec<String>,
    pub city: String,
    pub state: String,
    pub neighborhoods: Vec<Neighborhood>,
    pub area_codes: Vec<String>,
    pub languages: Vec<String>,
    pub alias_probability: f64,
    pub transient_probability: f64,
    pub veteran_probability: f64,
    pub heights: BTreeMap<String, HeightSpec>,
    pub bmi_mean: f64,
    pub bmi_std_dev: f64,
    pub weight_range: IntRange,
    pub history_rules: Vec<HistoryRule>,
    pub chronic_conditions: ListDraw,
    /// `(older_than, probability)`, first match wins
    pub chronic_age_chances: Vec<(u32, f64)>,
    pub chronic_base_chance: f64,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn neighborhood(zip: &str, streets: &[&str], max: u32) -> Neighborhood {
    Neighborhood {
        zip_code: zip.to_string(),
        streets: strings(streets),
        numbers: IntRange::new(100, max),
    }
}

impl Default for PopulationTables {
    fn default() -> Self {
        let first_names = [
            (
                "MALE",
                &[
                    "James", "Michael", "Robert", "David", "Carlos", "Jose", "Wei", "Minh", "Darnell", "Andre",
                    "Samuel", "Daniel", "Kevin", "Tyrone", "Luis", "Hiroshi", "Joseph", "Ahmed", "Ivan", "Thomas",
                ][..],
            ),
            (
                "FEMALE",
                &[
                    "Mary", "Jennifer", "Linda", "Maria", "Sofia", "Mei", "Lan", "Keisha", "Aaliyah", "Emily",
                    "Grace", "Ana", "Priya", "Yuki", "Sarah", "Fatima", "Olga", "Jessica", "Nicole", "Rosa",
                ],
            ),
        ]
        .iter()
        .map(|(sex, names)| (sex.to_string(), strings(names)))
        .collect();

        let last_names = [
            ("WHITE", &["Smith", "Johnson", "Miller", "Anderson", "Olson", "Peterson", "Clark", "Hansen"][..]),
            ("BLACK", &["Washington", "Jackson", "Williams", "Robinson", "Harris", "Brooks", "Coleman"]),
            ("HISPANIC", &["Garcia", "Martinez", "Rodriguez", "Hernandez", "Lopez", "Gonzalez", "Ramirez"]),
            ("ASIAN", &["Nguyen", "Chen", "Kim", "Tran", "Wang", "Park", "Tanaka", "Patel"]),
            ("NATIVE_AMERICAN", &["Begay", "Yazzie", "Jim", "Tso", "Whitehorse", "Sampson"]),
        ]
        .iter()
        .map(|(race, names)| (race.to_string(), strings(names)))
        .collect();

        let neighborhoods = vec![
            neighborhood("98101", &["1st Ave", "2nd Ave", "3rd Ave", "Pike St", "Pine St", "Union St", "Madison St"], 2000),
            neighborhood("98102", &["Broadway", "E Olive Way", "E John St", "E Denny Way", "E Roy St", "E Mercer St"], 1500),
            neighborhood("98103", &["N 45th St", "Stone Way N", "Wallingford Ave N", "Greenwood Ave N", "Fremont Ave N"], 2000),
            neighborhood("98104", &["1st Ave S", "2nd Ave S", "S Jackson St", "S King St", "S Main St", "S Dearborn St"], 1500),
            neighborhood("98105", &["University Way NE", "15th Ave NE", "Roosevelt Way NE", "NE 45th St", "NE 50th St"], 2000),
            neighborhood("98106", &["California Ave SW", "Fauntleroy Way SW", "SW Alaska St", "SW Genesee St"], 3000),
            neighborhood("98107", &["NW Market St", "NW Leary Way", "NW 65th St", "24th Ave NW", "32nd Ave NW"], 2000),
            neighborhood("98108", &["S Bailey St", "S Cloverdale St", "S Henderson St", "S Morgan St", "S Othello St"], 1500),
            neighborhood("98109", &["Queen Anne Ave N", "1st Ave N", "W Galer St", "W Highland Dr", "W McGraw St"], 2000),
            neighborhood("98112", &["E Madison St", "E Union St", "E Pike St", "E Galer St", "E Aloha St"], 1500),
        ];

        let heights = [
            (
                "MALE",
                HeightSpec {
                    mean_inches: 69.0,
                    std_dev: 3.0,
                    min_inches: 60,
                    max_inches: 78,
                },
            ),
            (
                "FEMALE",
                HeightSpec {
                    mean_inches: 64.0,
                    std_dev: 3.0,
                    min_inches: 58,
                    max_inches: 74,
                },
            ),
        ]
        .into_iter()
        .map(|(sex, spec)| (sex.to_string(), spec))
        .collect();

        let mut pregnancy = HistoryRule::rule("Pregnancy", 0.1, 35, None);
        pregnancy.sex = Some("FEMALE".into());
        let mut breast_cancer = HistoryRule::rule("Breast Cancer", 0.05, 40, None);
        breast_cancer.sex = Some("FEMALE".into());
        let mut sickle_cell = HistoryRule::rule("Sickle Cell Disease", 0.15, 0, None);
        sickle_cell.race = Some("BLACK".into());
        let mut hispanic_diabetes = HistoryRule::rule("Diabetes", 0.1, 0, None);
        hispanic_diabetes.race = Some("HISPANIC".into());

        let history_rules = vec![
            HistoryRule::rule("Hypertension", 0.4, 65, None),
            HistoryRule::rule("Diabetes", 0.3, 65, None),
            HistoryRule::rule("Heart Disease", 0.25, 65, None),
            HistoryRule::rule("COPD", 0.2, 65, None),
            HistoryRule::rule("Hypertension", 0.25, 45, Some(65)),
            HistoryRule::rule("Diabetes", 0.15, 45, Some(65)),
            HistoryRule::rule("Heart Disease", 0.1, 45, Some(65)),
            pregnancy,
            breast_cancer,
            sickle_cell,
            hispanic_diabetes,
        ];

        Self {
            adult_ages: IntRange::new(18, 85),
            races: WeightedTable::from_items(&["WHITE", "BLACK", "HISPANIC", "ASIAN", "NATIVE_AMERICAN", "OTHER"]),
            sexes: WeightedTable::from_items(&["MALE", "FEMALE"]),
            first_names,
            last_names,
            default_last_names: strings(&["Taylor", "Moore", "Lee", "Walker", "Young", "Allen", "King", "Wright"]),
            city: "Seattle".into(),
            state: "WA".into(),
            neighborhoods,
            area_codes: strings(&["206", "425", "360", "509"]),
            languages: strings(&["EN", "ES", "ZH", "KO", "VI", "RU", "AR", "HI"]),
            alias_probability: 0.15,
            transient_probability: 0.15,
            veteran_probability: 0.08,
            heights,
            bmi_mean: 27.0,
            bmi_std_dev: 5.0,
            weight_range: IntRange::new(90, 400),
            history_rules,
            chronic_conditions: ListDraw::new(
                1.0,
                &[(1, 0.5), (2, 0.3), (3, 0.15), (4, 0.05)],
                &[
                    "HYPERTENSION",
                    "DIABETES_TYPE_2",
                    "HIGH_CHOLESTEROL",
                    "ASTHMA",
                    "COPD",
                    "ARTHRITIS",
                    "DEPRESSION",
                    "ANXIETY",
                    "HEART_DISEASE",
                    "KIDNEY_DISEASE",
                    "THYROID_DISORDER",
                    "MIGRAINE",
                    "BACK_PAIN",
                    "OSTEOPOROSIS",
                ],
            ),
            chronic_age_chances: vec![(65, 0.8), (50, 0.6), (30, 0.3)],
            chronic_base_chance: 0.1,
        }
    }
}

/// Builds persons from `PopulationTables`.
#[derive(Debug, Clone, Copy)]
pub struct PopulationGenerator<'a> {
    tables: &'a PopulationTables,
}

impl<'a> PopulationGenerator<'a> {
    pub fn new(tables: &'a PopulationTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PopulationTables {
        self.tables
    }

    /// One adult, aged as of `on`.
    pub fn generate_adult<R: Rng + ?Sized>(&self, rng: &mut R, on: NaiveDate) -> Result<Person, GenError> {
        self.generate_person(rng, on, self.tables.adult_ages)
    }

    /// One person whose age on `on` falls in `ages`.
    pub fn generate_person<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        on: NaiveDate,
        ages: IntRange,
    ) -> Result<Person, GenError> {
        let t = self.tables;
        let sex = t.sexes.sample_cloned(rng)?;
        let race = t.races.sample_cloned(rng)?;

        let first_pool = t
            .first_names
            .get(&sex)
            .ok_or_else(|| GenError::invalid_config(format!("no first names for sex {}", sex)))?;
        let first_name = pick(rng, first_pool)?.clone();
        let last_pool = t.last_names.get(&race).unwrap_or(&t.default_last_names);
        let last_name = pick(rng, last_pool)?.clone();

        let age = ages.sample(rng);
        // Days back from `on`, landing somewhere inside the target birth year
        let days_back = i64::from(age) * 365 + i64::from(age / 4) + rng.gen_range(0..365);
        let date_of_birth = on - Duration::days(days_back);

        let height_inches = self.height(rng, &sex)?;
        let weight_lbs = self.weight(rng, height_inches)?;

        let aliases = if chance(rng, t.alias_probability) {
            vec![Alias {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                source: "NCIC".into(),
                confidence: (rng.gen_range(0.6..0.95_f64) * 100.0).round() / 100.0,
            }]
        } else {
            Vec::new()
        };

        let language_count = rng.gen_range(1..=2);
        let languages = WeightedTable::uniform(t.languages.iter().cloned())
            .sample_distinct(rng, language_count)
            .into_iter()
            .cloned()
            .collect();

        let mut person = Person {
            person_id: PersonId::from_rng(rng),
            first_name,
            last_name,
            date_of_birth,
            sex,
            race,
            height_inches,
            weight_lbs,
            address: self.address(rng)?,
            phone: self.phone(rng)?,
            languages,
            aliases,
            veteran_status: chance(rng, t.veteran_probability),
            is_transient: chance(rng, t.transient_probability),
            medical_history: Vec::new(),
            chronic_conditions: Vec::new(),
            inmate: None,
        };

        let age_now = person.age_on(on);
        person.medical_history = self.medical_history(rng, age_now, &person.sex, &person.race);
        person.chronic_conditions = self.chronic_conditions(rng, age_now)?;
        Ok(person)
    }

    /// `First Last` for staff and third parties that are not tracked persons.
    pub fn full_name<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, GenError> {
        let t = self.tables;
        let sex = t.sexes.sample(rng)?;
        let first_pool = t
            .first_names
            .get(sex)
            .ok_or_else(|| GenError::invalid_config(format!("no first names for sex {}", sex)))?;
        let first = pick(rng, first_pool)?;
        let last_pool = match t.races.sample(rng) {
            Ok(race) => t.last_names.get(race).unwrap_or(&t.default_last_names),
            Err(_) => &t.default_last_names,
        };
        let last = pick(rng, last_pool)?;
        Ok(format!("{} {}", first, last))
    }

    /// Staff sign-off in the `1234, LASTNAME` form used on jail logs.
    pub fn staff_signature<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, GenError> {
        let last = pick(rng, &self.tables.default_last_names)?;
        Ok(format!("{:04}, {}", rng.gen_range(0..10_000), last.to_uppercase()))
    }

    /// A street address inside one of the configured neighborhoods.
    pub fn address<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Address, GenError> {
        let hood = pick(rng, &self.tables.neighborhoods)?;
        let street = pick(rng, &hood.streets)?;
        Ok(Address {
            street: format!("{} {}", hood.numbers.sample(rng), street),
            city: self.tables.city.clone(),
            state: self.tables.state.clone(),
            zip_code: hood.zip_code.clone(),
        })
    }

    /// `(AAA) NNN-NNNN` with a local area code.
    pub fn phone<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String, GenError> {
        let area = pick(rng, &self.tables.area_codes)?;
        Ok(format!(
            "({}) {:03}-{:04}",
            area,
            rng.gen_range(200..1000),
            rng.gen_range(0..10_000)
        ))
    }

    /// Independent draws for every rule that applies, deduplicated.
    pub fn medical_history<R: Rng + ?Sized>(&self, rng: &mut R, age: u32, sex: &str, race: &str) -> Vec<String> {
        let mut history: Vec<String> = Vec::new();
        for rule in &self.tables.history_rules {
            if rule.applies(age, sex, race) && chance(rng, rule.probability) && !history.contains(&rule.condition) {
                history.push(rule.condition.clone());
            }
        }
        history
    }

    pub fn chronic_conditions<R: Rng + ?Sized>(&self, rng: &mut R, age: u32) -> Result<Vec<String>, GenError> {
        let t = self.tables;
        let p = t
            .chronic_age_chances
            .iter()
            .find(|(older_than, _)| age > *older_than)
            .map(|(_, p)| *p)
            .unwrap_or(t.chronic_base_chance);
        t.chronic_conditions.draw_with(rng, p)
    }

    fn height<R: Rng + ?Sized>(&self, rng: &mut R, sex: &str) -> Result<u32, GenError> {
        let spec = match self.tables.heights.get(sex) {
            Some(spec) => *spec,
            None => return Ok(66),
        };
        let normal = Normal::new(spec.mean_inches, spec.std_dev)
            .map_err(|e| GenError::invalid_config(format!("height distribution: {}", e)))?;
        let sampled = normal.sample(rng).round();
        Ok((sampled.max(0.0) as u32).clamp(spec.min_inches, spec.max_inches))
    }

    fn weight<R: Rng + ?Sized>(&self, rng: &mut R, height_inches: u32) -> Result<u32, GenError> {
        let t = self.tables;
        let normal = Normal::new(t.bmi_mean, t.bmi_std_dev)
            .map_err(|e| GenError::invalid_config(format!("bmi distribution: {}", e)))?;
        let bmi = normal.sample(rng).clamp(18.0, 40.0);
        let meters = f64::from(height_inches) * 0.0254;
        let lbs = (bmi * meters * meters * 2.20462).round() as u32;
        Ok(lbs.clamp(t.weight_range.min, t.weight_range.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    #[test]
    fn test_generated_adults_are_plausible() {
        let tables = PopulationTables::default();
        let generator = PopulationGenerator::new(&tables);
        let mut rng = ChaCha8Rng::seed_from_u64(7);

        for _ in 0..200 {
            let person = generator.generate_adult(&mut rng, today()).unwrap();
            let age = person.age_on(today());
            assert!((17..=86).contains(&age), "age {}", age);
            assert!((58..=78).contains(&person.height_inches));
            assert!((90..=400).contains(&person.weight_lbs));
            assert!(!person.languages.is_empty() && person.languages.len() <= 2);
            assert_eq!(person.address.city, "Seattle");
            assert!(person.inmate.is_none());
        }
    }

    #[test]
    fn test_same_seed_same_person() {
        let tables = PopulationTables::default();
        let generator = PopulationGenerator::new(&tables);
        let a = generator
            .generate_adult(&mut ChaCha8Rng::seed_from_u64(99), today())
            .unwrap();
        let b = generator
            .generate_adult(&mut ChaCha8Rng::seed_from_u64(99), today())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_history_rules_respect_filters() {
        let tables = PopulationTables::default();
        let pregnancy = tables
            .history_rules
            .iter()
            .find(|r| r.condition == "Pregnancy")
            .unwrap();
        assert!(pregnancy.applies(40, "FEMALE", "WHITE"));
        assert!(!pregnancy.applies(40, "MALE", "WHITE"));

        let middle_age = tables
            .history_rules
            .iter()
            .find(|r| r.condition == "Hypertension" && r.up_to == Some(65))
            .unwrap();
        assert!(middle_age.applies(50, "MALE", "ASIAN"));
        assert!(!middle_age.applies(70, "MALE", "ASIAN"));
    }

    #[test]
    fn test_medical_history_has_no_duplicates() {
        let mut tables = PopulationTables::default();
        for rule in &mut tables.history_rules {
            rule.probability = 1.0;
        }
        let generator = PopulationGenerator::new(&tables);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let history = generator.medical_history(&mut rng, 70, "FEMALE", "HISPANIC");
        let diabetes = history.iter().filter(|c| c.as_str() == "Diabetes").count();
        assert_eq!(diabetes, 1);
        assert!(history.contains(&"Breast Cancer".to_string()));
    }

    #[test]
    fn test_phone_format() {
        let tables = PopulationTables::default();
        let generator = PopulationGenerator::new(&tables);
        let phone = generator.phone(&mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(phone.len(), "(206) 555-0100".len());
        assert!(phone.starts_with('('));
    }
}
