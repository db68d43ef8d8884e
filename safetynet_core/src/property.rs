//! Property and evidence records.
//!
//! Property links to an arrest (evidence) or a CAD incident and, optionally,
//! to an owning person. Callers pass existing identifiers only.

use crate::records::{PropertyRecord, PropertyType};
use crate::sampler::{chance, pick, IntRange, WeightedTable};
use chrono::NaiveDateTime;
use rand::Rng;
use safetynet_env::{GenError, PersonId, RecordId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyCategory {
    pub subcategories: Vec<String>,
    pub value: IntRange,
    pub serial_probability: f64,
}

/// Unit of measure for a category, optionally narrowed to one subcategory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRule {
    pub category: String,
    #[serde(default)]
    pub subcategory: Option<String>,
    pub unit: String,
    pub quantity: IntRange,
}

impl UnitRule {
    fn new(category: &str, subcategory: Option<&str>, unit: &str, quantity: IntRange) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.map(str::to_string),
            unit: unit.into(),
            quantity,
        }
    }

    fn matches(&self, category: &str, subcategory: &str) -> bool {
        self.category == category && self.subcategory.as_deref().map_or(true, |s| s == subcategory)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyTables {
    pub property_types: WeightedTable<PropertyType>,
    pub categories: BTreeMap<String, PropertyCategory>,
    /// First matching rule wins
    pub units: Vec<UnitRule>,
    pub default_unit: String,
    pub default_quantity: IntRange,
    pub dispositions: WeightedTable<String>,
    pub locker_rows: Vec<String>,
    pub locker_numbers: IntRange,
    pub shelf_rows: Vec<String>,
    pub shelf_numbers: IntRange,
    /// Chance a standalone property record names an owner
    pub owner_probability: f64,
}

impl Default for PropertyTables {
    fn default() -> Self {
        let category = |subs: &[&str], min: u32, max: u32, serial: f64| PropertyCategory {
            subcategories: subs.iter().map(|s| s.to_string()).collect(),
            value: IntRange::new(min, max),
            serial_probability: serial,
        };
        let categories = [
            ("WEAPON", category(&["FIREARM", "KNIFE", "BAT", "TASER", "PEPPER_SPRAY", "BRASS_KNUCKLES", "MACHETE"], 100, 2000, 0.95)),
            ("AMMUNITION", category(&["9MM", "45_ACP", "223_REM", "12_GAUGE", "22_LR", "40_S_W", "308_WIN"], 10, 500, 0.0)),
            ("DRUG", category(&["MARIJUANA", "METHAMPHETAMINE", "HEROIN", "COCAINE", "PRESCRIPTION", "FENTANYL", "ECSTASY", "XANAX"], 10, 1000, 0.0)),
            ("ELECTRONICS", category(&["PHONE", "LAPTOP", "TABLET", "CAMERA", "GAMING_SYSTEM", "DRONE", "SMARTWATCH", "HEADPHONES"], 50, 2500, 0.7)),
            ("COMPUTER_ACCESSORY", category(&["MONITOR", "KEYBOARD", "MOUSE", "EXTERNAL_DRIVE", "ROUTER", "PRINTER"], 10, 800, 0.5)),
            ("MOBILE_ACCESSORY", category(&["CHARGER", "CASE", "POWER_BANK", "EARBUDS", "SCREEN_PROTECTOR"], 5, 300, 0.3)),
            ("JEWELRY", category(&["RING", "NECKLACE", "WATCH", "BRACELET", "EARRINGS", "ANKLET", "BROOCH"], 100, 10000, 0.2)),
            ("VEHICLE_PART", category(&["CATALYTIC_CONVERTER", "TIRE", "RIM", "STEREO", "BATTERY", "LICENSE_PLATE"], 50, 1500, 0.6)),
            ("TOOLS", category(&["DRILL", "SAW", "WRENCH_SET", "GENERATOR", "GRINDER", "LADDER"], 20, 1500, 0.5)),
            ("MUSICAL_INSTRUMENT", category(&["GUITAR", "KEYBOARD", "VIOLIN", "DRUM_KIT", "TRUMPET", "AMPLIFIER"], 100, 5000, 0.5)),
            ("SPORTS_EQUIPMENT", category(&["BICYCLE", "GOLF_CLUBS", "SKATEBOARD", "SKIS", "SNOWBOARD", "KAYAK"], 20, 1500, 0.3)),
            ("HOUSEHOLD", category(&["TELEVISION", "MICROWAVE", "VACUUM", "FURNITURE", "APPLIANCE", "LAMP"], 30, 2000, 0.4)),
            ("ART", category(&["PAINTING", "SCULPTURE", "PRINT", "PHOTOGRAPH", "POTTERY"], 100, 20000, 0.0)),
            ("ANTIQUES", category(&["CLOCK", "FURNITURE", "COIN_COLLECTION", "VASE", "SILVERWARE"], 50, 15000, 0.1)),
            ("CLOTHING", category(&["JACKET", "SHOES", "HANDBAG", "HAT", "SUNGLASSES", "BACKPACK"], 20, 500, 0.1)),
            ("CURRENCY", category(&["CASH", "COINS", "GIFT_CARDS", "MONEY_ORDER"], 1, 1000, 0.0)),
            ("DOCUMENT", category(&["ID", "CREDIT_CARD", "CHECKBOOK", "PASSPORT", "TITLE", "SOCIAL_SECURITY_CARD"], 5, 100, 0.0)),
        ]
        .into_iter()
        .map(|(name, spec)| (name.to_string(), spec))
        .collect();

        Self {
            property_types: WeightedTable::new(vec![
                (PropertyType::Evidence, 40.0),
                (PropertyType::Found, 30.0),
                (PropertyType::Stolen, 20.0),
                (PropertyType::Seized, 10.0),
            ]),
            categories,
            units: vec![
                UnitRule::new("DRUG", Some("PRESCRIPTION"), "PILLS", IntRange::new(5, 60)),
                UnitRule::new("DRUG", None, "GRAMS", IntRange::new(1, 500)),
                UnitRule::new("AMMUNITION", None, "ROUNDS", IntRange::new(10, 200)),
                UnitRule::new("CURRENCY", None, "USD", IntRange::new(1, 1)),
                UnitRule::new("CLOTHING", Some("SHOES"), "PAIR", IntRange::new(1, 3)),
            ],
            default_unit: "EACH".into(),
            default_quantity: IntRange::new(1, 10),
            dispositions: WeightedTable::from_items(&["HELD", "RELEASED", "DESTROYED", "AUCTION"]),
            locker_rows: vec!["A".into(), "B".into(), "C".into()],
            locker_numbers: IntRange::new(1, 100),
            shelf_rows: ["A", "B", "C", "D", "E", "F", "G"].iter().map(|s| s.to_string()).collect(),
            shelf_numbers: IntRange::new(1, 20),
            owner_probability: 0.5,
        }
    }
}

/// Parents a property record hangs off.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PropertyLink {
    pub arrest_id: Option<RecordId>,
    pub cad_incident_id: Option<RecordId>,
    pub owner_person_id: Option<PersonId>,
}

impl PropertyLink {
    pub fn arrest(arrest_id: RecordId, cad_incident_id: Option<RecordId>, owner: PersonId) -> Self {
        Self {
            arrest_id: Some(arrest_id),
            cad_incident_id,
            owner_person_id: Some(owner),
        }
    }

    pub fn incident(cad_incident_id: RecordId, owner_person_id: Option<PersonId>) -> Self {
        Self {
            arrest_id: None,
            cad_incident_id: Some(cad_incident_id),
            owner_person_id,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PropertyGenerator<'a> {
    tables: &'a PropertyTables,
}

impl<'a> PropertyGenerator<'a> {
    pub fn new(tables: &'a PropertyTables) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &PropertyTables {
        self.tables
    }

    /// One property record.
    ///
    /// `property_type` and `description` override the drawn values when
    /// given; evidence spawned by an arrest uses both.
    pub fn generate<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        link: PropertyLink,
        property_type: Option<PropertyType>,
        description: Option<String>,
        logged_at: NaiveDateTime,
    ) -> Result<PropertyRecord, GenError> {
        let t = self.tables;
        let property_type = match property_type {
            Some(kind) => kind,
            None => *t.property_types.sample(rng)?,
        };

        let names: Vec<&String> = t.categories.keys().collect();
        let category = (*pick(rng, &names)?).clone();
        let spec = &t.categories[&category];
        let subcategory = pick(rng, &spec.subcategories)?.clone();

        let serial_number = if chance(rng, spec.serial_probability) {
            Some(format!("SN{:06}", rng.gen_range(0..1_000_000)))
        } else {
            None
        };

        let (unit_of_measure, quantity) = match t.units.iter().find(|r| r.matches(&category, &subcategory)) {
            Some(rule) => (rule.unit.clone(), rule.quantity.sample(rng)),
            None => (t.default_unit.clone(), t.default_quantity.sample(rng)),
        };

        let description = description.unwrap_or_else(|| {
            let serial = serial_number
                .as_ref()
                .map(|sn| format!(" ({})", sn))
                .unwrap_or_default();
            format!("{}{} {}.", title_case(&subcategory), serial, property_type.action_phrase())
        });

        let record = PropertyRecord {
            property_id: RecordId::from_rng(rng),
            property_type,
            case_number: format!("PROP{:06}", rng.gen_range(0..1_000_000)),
            arrest_id: link.arrest_id,
            cad_incident_id: link.cad_incident_id,
            owner_person_id: link.owner_person_id,
            description,
            category,
            subcategory,
            serial_number,
            value_estimated: spec.value.sample(rng),
            quantity,
            unit_of_measure,
            logged_datetime: logged_at,
            evidence_locker: format!(
                "LOCKER_{}{}",
                pick(rng, &t.locker_rows)?,
                t.locker_numbers.sample(rng)
            ),
            storage_bin: format!("SHELF-{}-{}", pick(rng, &t.shelf_rows)?, t.shelf_numbers.sample(rng)),
            disposition: t.dispositions.sample_cloned(rng)?,
        };
        trace!("Property {} ({:?})", record.property_id, record.property_type);
        Ok(record)
    }
}

/// `GAMING_SYSTEM` → `Gaming System`.
fn title_case(code: &str) -> String {
    code.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap().and_hms_opt(14, 0, 0).unwrap()
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("GAMING_SYSTEM"), "Gaming System");
        assert_eq!(title_case("9MM"), "9mm");
        assert_eq!(title_case("PHONE"), "Phone");
    }

    #[test]
    fn test_evidence_override_keeps_link_and_description() {
        let tables = PropertyTables::default();
        let generator = PropertyGenerator::new(&tables);
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let arrest_id = RecordId::from_seed(3);
        let owner = PersonId::from_seed(4);

        let record = generator
            .generate(
                &mut rng,
                PropertyLink::arrest(arrest_id, None, owner),
                Some(PropertyType::Evidence),
                Some("BODY_CAMERA collected as evidence.".into()),
                at(),
            )
            .unwrap();

        assert_eq!(record.property_type, PropertyType::Evidence);
        assert_eq!(record.arrest_id, Some(arrest_id));
        assert_eq!(record.owner_person_id, Some(owner));
        assert_eq!(record.description, "BODY_CAMERA collected as evidence.");
        assert_eq!(record.logged_datetime, at());
    }

    #[test]
    fn test_category_rules_hold() {
        let tables = PropertyTables::default();
        let generator = PropertyGenerator::new(&tables);
        let mut rng = ChaCha8Rng::seed_from_u64(12);
        let cad = RecordId::from_seed(9);

        for _ in 0..500 {
            let record = generator
                .generate(&mut rng, PropertyLink::incident(cad, None), None, None, at())
                .unwrap();
            let spec = &tables.categories[&record.category];
            assert!(spec.subcategories.contains(&record.subcategory));
            assert!(spec.value.contains(record.value_estimated));
            if spec.serial_probability == 0.0 {
                assert!(record.serial_number.is_none());
            }
            match record.category.as_str() {
                "AMMUNITION" => assert_eq!(record.unit_of_measure, "ROUNDS"),
                "CURRENCY" => assert_eq!(record.quantity, 1),
                "DRUG" if record.subcategory == "PRESCRIPTION" => assert_eq!(record.unit_of_measure, "PILLS"),
                "DRUG" => assert_eq!(record.unit_of_measure, "GRAMS"),
                _ => {}
            }
            assert!(record.description.ends_with(&format!("{}.", record.property_type.action_phrase())));
        }
    }
}
