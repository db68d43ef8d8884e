//! Person Index - The Single Owner of Identity Records
//!
//! Every downstream generator that touches a person's derived state goes
//! through `PersonIndex::context`. The context creates the inmate
//! extension on first use and applies writes to timestamp-stamped slots.
//!
//! # Precedence
//!
//! A stamped write only lands if its event time is at or after the time
//! already stored in the slot (last-write-wins by event time; ties go to
//! the later writer). Processing order therefore never decides the final
//! state: a booking from March handled after a release from June cannot
//! flip the person back to IN_CUSTODY.
//!
//! Custody and probation are separate slots, so a person can be RELEASED
//! and on ACTIVE probation at the same time.

use crate::records::Person;
use crate::records::SentenceType;
use chrono::{NaiveDate, NaiveDateTime};
use rand::Rng;
use safetynet_env::{GenError, PersonId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// A value together with the event time that wrote it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stamped<T> {
    pub value: T,
    pub at: NaiveDateTime,
}

/// Writes `value` into `slot` unless the slot holds a later stamp.
///
/// Returns true when the write was applied.
pub fn stamp<T>(slot: &mut Option<Stamped<T>>, value: T, at: NaiveDateTime) -> bool {
    match slot {
        Some(existing) if at < existing.at => false,
        _ => {
            *slot = Some(Stamped { value, at });
            true
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodyStatus {
    InCustody,
    Sentenced,
    Released,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbationStatus {
    None,
    Active,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParoleStatus {
    None,
    Consideration,
    Active,
    Completed,
}

impl ParoleStatus {
    /// Parole states that carry an offense and timing.
    pub fn is_pending_or_active(&self) -> bool {
        matches!(self, ParoleStatus::Consideration | ParoleStatus::Active)
    }
}

/// Derived-state extension added to a person by the jail lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InmateState {
    pub incarceration_site: Option<Stamped<String>>,
    pub inmate_key: Option<Stamped<String>>,
    pub inmate_received_date: Option<Stamped<NaiveDateTime>>,
    pub incarceration_status: Option<Stamped<CustodyStatus>>,
    pub earliest_release_date: Option<Stamped<Option<NaiveDate>>>,
    pub release_datetime: Option<Stamped<NaiveDateTime>>,
    pub probation_status: Option<Stamped<ProbationStatus>>,
    pub probation_officer_name: Option<String>,
    pub probation_officer_phone: Option<String>,
    pub parole_status: Option<Stamped<ParoleStatus>>,
    pub parole_offense: Option<String>,
    pub parole_timing: Option<String>,
    pub gang_membership: Option<Stamped<String>>,
    pub ccis_offender_key: Option<Stamped<String>>,
    pub is_multistate_offender: bool,
    pub bookings_recorded: u32,
}

impl InmateState {
    pub fn custody_status(&self) -> Option<CustodyStatus> {
        self.incarceration_status.as_ref().map(|s| s.value)
    }

    pub fn probation(&self) -> Option<ProbationStatus> {
        self.probation_status.as_ref().map(|s| s.value)
    }

    pub fn parole(&self) -> Option<ParoleStatus> {
        self.parole_status.as_ref().map(|s| s.value)
    }

    pub fn inmate_key(&self) -> Option<&str> {
        self.inmate_key.as_ref().map(|s| s.value.as_str())
    }

    pub fn gang(&self) -> Option<&str> {
        self.gang_membership.as_ref().map(|s| s.value.as_str())
    }

    pub fn ccis_key(&self) -> Option<&str> {
        self.ccis_offender_key.as_ref().map(|s| s.value.as_str())
    }
}

/// Everything a booking writes onto the person.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingUpdate {
    pub booked_at: NaiveDateTime,
    pub incarceration_site: String,
    pub inmate_key: String,
    pub probation: ProbationStatus,
    pub probation_officer: Option<(String, String)>,
    pub parole: ParoleStatus,
    pub parole_offense: Option<String>,
    pub parole_timing: Option<String>,
    pub gang_membership: String,
    pub ccis_offender_key: String,
    pub is_multistate_offender: bool,
}

/// Everything a sentence writes onto the person.
#[derive(Debug, Clone, PartialEq)]
pub struct SentenceUpdate {
    pub sentenced_at: NaiveDateTime,
    pub sentence_type: SentenceType,
    pub end_date: Option<NaiveDate>,
    /// Used only if the person has no probation officer yet
    pub fallback_officer: (String, String),
}

/// Mutable view of one person's derived state.
pub struct PersonContext<'a> {
    person: &'a mut Person,
}

impl<'a> PersonContext<'a> {
    pub fn person(&self) -> &Person {
        self.person
    }

    /// The inmate extension, created on first access.
    pub fn inmate(&mut self) -> &mut InmateState {
        self.person.inmate.get_or_insert_with(InmateState::default)
    }

    /// Applies a booking: site, key, IN_CUSTODY, probation and parole.
    pub fn record_booking(&mut self, update: BookingUpdate) {
        let at = update.booked_at;
        let inmate = self.inmate();
        inmate.bookings_recorded += 1;

        stamp(&mut inmate.incarceration_site, update.incarceration_site, at);
        stamp(&mut inmate.inmate_key, update.inmate_key, at);
        stamp(&mut inmate.inmate_received_date, at, at);
        stamp(&mut inmate.incarceration_status, CustodyStatus::InCustody, at);

        if stamp(&mut inmate.probation_status, update.probation, at) {
            if let Some((name, phone)) = update.probation_officer {
                inmate.probation_officer_name = Some(name);
                inmate.probation_officer_phone = Some(phone);
            }
        }

        if stamp(&mut inmate.parole_status, update.parole, at) {
            inmate.parole_offense = update.parole_offense;
            inmate.parole_timing = update.parole_timing;
        }

        stamp(&mut inmate.gang_membership, update.gang_membership, at);
        stamp(&mut inmate.ccis_offender_key, update.ccis_offender_key, at);
        inmate.is_multistate_offender |= update.is_multistate_offender;
    }

    /// Applies a sentence: earliest release, SENTENCED or probation ACTIVE.
    pub fn record_sentence(&mut self, update: SentenceUpdate) {
        let at = update.sentenced_at;
        let inmate = self.inmate();
        stamp(&mut inmate.earliest_release_date, update.end_date, at);

        if update.sentence_type.is_custodial() {
            stamp(&mut inmate.incarceration_status, CustodyStatus::Sentenced, at);
        } else if update.sentence_type.activates_probation()
            && stamp(&mut inmate.probation_status, ProbationStatus::Active, at)
        {
            // Keep an officer assigned by an earlier step
            if inmate.probation_officer_name.is_none() {
                let (name, phone) = update.fallback_officer;
                inmate.probation_officer_name = Some(name);
                inmate.probation_officer_phone = Some(phone);
            }
        }
    }

    /// Applies a release: final release time and RELEASED.
    pub fn record_release(&mut self, released_at: NaiveDateTime) {
        let inmate = self.inmate();
        stamp(&mut inmate.release_datetime, released_at, released_at);
        stamp(&mut inmate.incarceration_status, CustodyStatus::Released, released_at);
    }
}

/// Identity key → the one canonical `Person`.
#[derive(Debug, Clone, Default)]
pub struct PersonIndex {
    persons: HashMap<PersonId, Person>,
    order: Vec<PersonId>,
}

impl PersonIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a person; a second person with the same key is rejected.
    pub fn insert(&mut self, person: Person) -> Result<(), GenError> {
        let id = person.person_id;
        if self.persons.contains_key(&id) {
            return Err(GenError::DuplicateIdentity(id.to_string()));
        }
        self.order.push(id);
        self.persons.insert(id, person);
        Ok(())
    }

    pub fn get(&self, id: &PersonId) -> Option<&Person> {
        self.persons.get(id)
    }

    /// Like `get`, but a missing person is a contract violation.
    pub fn require(&self, id: &PersonId) -> Result<&Person, GenError> {
        self.persons
            .get(id)
            .ok_or_else(|| GenError::missing_parent("person", id))
    }

    pub fn contains(&self, id: &PersonId) -> bool {
        self.persons.contains_key(id)
    }

    /// Mutable derived-state context for an existing person.
    pub fn context(&mut self, id: &PersonId) -> Result<PersonContext<'_>, GenError> {
        let person = self
            .persons
            .get_mut(id)
            .ok_or_else(|| GenError::missing_parent("person", id))?;
        Ok(PersonContext { person })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Person keys in insertion order.
    pub fn ids(&self) -> &[PersonId] {
        &self.order
    }

    /// Persons in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Person> {
        self.order.iter().filter_map(|id| self.persons.get(id))
    }

    /// Uniformly picks a person key.
    pub fn random_id<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<PersonId, GenError> {
        if self.order.is_empty() {
            return Err(GenError::EmptyCollection("persons"));
        }
        Ok(self.order[rng.gen_range(0..self.order.len())])
    }

    /// Moves every person from a worker partition into this index.
    pub fn merge(&mut self, other: PersonIndex) -> Result<usize, GenError> {
        let PersonIndex { mut persons, order } = other;
        let mut merged = 0;
        for id in order {
            if let Some(person) = persons.remove(&id) {
                self.insert(person)?;
                merged += 1;
            }
        }
        trace!("Merged {} persons into index", merged);
        Ok(merged)
    }

    /// Persons in insertion order, consuming the index.
    pub fn into_persons(self) -> Vec<Person> {
        let PersonIndex { mut persons, order } = self;
        order.into_iter().filter_map(|id| persons.remove(&id)).collect()
    }

    pub fn reset(&mut self) {
        self.persons.clear();
        self.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Address;
    use chrono::{Duration, NaiveDate};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn person(seed: u64) -> Person {
        Person {
            person_id: PersonId::from_seed(seed),
            first_name: "Lee".into(),
            last_name: "Park".into(),
            date_of_birth: NaiveDate::from_ymd_opt(1985, 2, 1).unwrap(),
            sex: "MALE".into(),
            race: "ASIAN".into(),
            height_inches: 70,
            weight_lbs: 170,
            address: Address::default(),
            phone: String::new(),
            languages: vec![],
            aliases: vec![],
            veteran_status: false,
            is_transient: false,
            medical_history: vec![],
            chronic_conditions: vec![],
            inmate: None,
        }
    }

    fn t(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .and_then(|d| d.and_hms_opt(9, 0, 0))
            .unwrap()
    }

    fn booking(at: NaiveDateTime, key: &str, probation: ProbationStatus) -> BookingUpdate {
        booking_with_ccis(at, key, probation, "CCIS-100001")
    }

    fn booking_with_ccis(at: NaiveDateTime, key: &str, probation: ProbationStatus, ccis: &str) -> BookingUpdate {
        BookingUpdate {
            booked_at: at,
            incarceration_site: "King County Correctional Facility".into(),
            inmate_key: key.into(),
            probation,
            probation_officer: match probation {
                ProbationStatus::None => None,
                _ => Some(("Rae Lind".into(), "(206) 555-0101".into())),
            },
            parole: ParoleStatus::None,
            parole_offense: None,
            parole_timing: None,
            gang_membership: "NONE".into(),
            ccis_offender_key: ccis.into(),
            is_multistate_offender: false,
        }
    }

    fn sentence(at: NaiveDateTime, sentence_type: SentenceType) -> SentenceUpdate {
        SentenceUpdate {
            sentenced_at: at,
            sentence_type,
            end_date: Some(at.date() + Duration::days(180)),
            fallback_officer: ("Sam Ortiz".into(), "(206) 555-0199".into()),
        }
    }

    #[test]
    fn test_stamp_is_last_write_wins_by_time() {
        let mut slot = None;
        assert!(stamp(&mut slot, "a", t(10)));
        assert!(!stamp(&mut slot, "b", t(5)));
        assert!(stamp(&mut slot, "c", t(10)));
        assert_eq!(slot.map(|s| s.value), Some("c"));
    }

    #[test]
    fn test_booking_creates_inmate_extension() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(1);
        index.insert(person(1)).unwrap();
        assert!(index.get(&id).unwrap().inmate.is_none());

        index.context(&id).unwrap().record_booking(booking(t(1), "IN100001", ProbationStatus::None));
        let inmate = index.get(&id).unwrap().inmate.as_ref().unwrap();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::InCustody));
        assert_eq!(inmate.inmate_key(), Some("IN100001"));
        assert_eq!(inmate.bookings_recorded, 1);
    }

    #[test]
    fn test_sentence_then_release_ordering() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(2);
        index.insert(person(2)).unwrap();
        let mut ctx = index.context(&id).unwrap();
        ctx.record_booking(booking(t(1), "IN1", ProbationStatus::None));
        ctx.record_sentence(sentence(t(3), SentenceType::JailTime));
        assert_eq!(ctx.inmate().custody_status(), Some(CustodyStatus::Sentenced));
        ctx.record_release(t(20));
        assert_eq!(ctx.inmate().custody_status(), Some(CustodyStatus::Released));
        assert!(ctx.inmate().earliest_release_date.is_some());
    }

    #[test]
    fn test_stale_booking_does_not_undo_release() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(3);
        index.insert(person(3)).unwrap();
        let mut ctx = index.context(&id).unwrap();
        ctx.record_booking(booking(t(10), "IN-NEW", ProbationStatus::None));
        ctx.record_release(t(15));
        // An older booking processed afterwards
        ctx.record_booking(booking(t(2), "IN-OLD", ProbationStatus::Inactive));

        let inmate = ctx.inmate();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::Released));
        assert_eq!(inmate.inmate_key(), Some("IN-NEW"));
        assert_eq!(inmate.probation(), Some(ProbationStatus::None));
        assert_eq!(inmate.bookings_recorded, 2);
    }

    #[test]
    fn test_stale_booking_keeps_newer_offender_fields() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(7);
        index.insert(person(7)).unwrap();
        let mut ctx = index.context(&id).unwrap();

        let mut newer = booking_with_ccis(t(10), "IN-NEW", ProbationStatus::None, "CCIS-NEW");
        newer.gang_membership = "KNOWN_ASSOCIATE".into();
        ctx.record_booking(newer);
        ctx.record_booking(booking_with_ccis(t(2), "IN-OLD", ProbationStatus::None, "CCIS-OLD"));

        let inmate = ctx.inmate();
        assert_eq!(inmate.inmate_key(), Some("IN-NEW"));
        assert_eq!(inmate.ccis_key(), Some("CCIS-NEW"));
        assert_eq!(inmate.gang(), Some("KNOWN_ASSOCIATE"));
    }

    #[test]
    fn test_probation_sentence_coexists_with_release() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(4);
        index.insert(person(4)).unwrap();
        let mut ctx = index.context(&id).unwrap();
        ctx.record_booking(booking(t(1), "IN4", ProbationStatus::Inactive));
        ctx.record_sentence(sentence(t(4), SentenceType::Probation));
        ctx.record_release(t(6));

        let inmate = ctx.inmate();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::Released));
        assert_eq!(inmate.probation(), Some(ProbationStatus::Active));
        // Officer from the booking is kept
        assert_eq!(inmate.probation_officer_name.as_deref(), Some("Rae Lind"));
    }

    #[test]
    fn test_probation_sentence_assigns_fallback_officer() {
        let mut index = PersonIndex::new();
        let id = PersonId::from_seed(5);
        index.insert(person(5)).unwrap();
        let mut ctx = index.context(&id).unwrap();
        ctx.record_booking(booking(t(1), "IN5", ProbationStatus::None));
        ctx.record_sentence(sentence(t(2), SentenceType::Diversion));
        assert_eq!(ctx.inmate().probation_officer_name.as_deref(), Some("Sam Ortiz"));
    }

    #[test]
    fn test_missing_person_is_contract_violation() {
        let mut index = PersonIndex::new();
        let err = index.context(&PersonId::from_seed(9)).err().unwrap();
        assert!(err.is_contract_violation());

        let mut rng = ChaCha8Rng::seed_from_u64(1);
        assert!(matches!(index.random_id(&mut rng), Err(GenError::EmptyCollection(_))));
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut index = PersonIndex::new();
        index.insert(person(6)).unwrap();
        assert!(matches!(index.insert(person(6)), Err(GenError::DuplicateIdentity(_))));
    }

    #[test]
    fn test_merge_preserves_partition_order() {
        let mut world = PersonIndex::new();
        world.insert(person(1)).unwrap();
        let mut worker = PersonIndex::new();
        worker.insert(person(3)).unwrap();
        worker.insert(person(2)).unwrap();

        assert_eq!(world.merge(worker).unwrap(), 2);
        let ids: Vec<PersonId> = world.ids().to_vec();
        assert_eq!(ids, vec![PersonId::from_seed(1), PersonId::from_seed(3), PersonId::from_seed(2)]);

        let mut clash = PersonIndex::new();
        clash.insert(person(2)).unwrap();
        assert!(world.merge(clash).is_err());

        world.reset();
        assert!(world.is_empty());
    }
}
