//! Jail Lifecycle Generator
//!
//! Drives `Arrest → Booking → {Sentence, BailBond, JailIncident} → JailLog
//! stream`. Every stage that changes a person's derived state goes through
//! `PersonIndex::context`, so booking, sentencing and release all stamp the
//! same canonical record.
//!
//! # Ordering
//!
//! Child artifacts fall inside the booking's stay: strictly after the
//! booking time and strictly before the release (or the anchor, for
//! persons still in custody). Log entries that would land outside the stay
//! are dropped rather than clamped, so the stream never shows two events
//! at the booking or release instant.

use crate::jail_tables::{JailTables, YearField};
use crate::person_index::{BookingUpdate, PersonIndex, ProbationStatus, SentenceUpdate};
use crate::population::{PopulationGenerator, PopulationTables};
use crate::records::{
    Address, Arrest, BailBond, ChargeSeverity, CorrectionsFacility, JailBooking, JailIncident, JailLog,
    JailProgram, JailSentence, LogAction, SentenceType,
};
use crate::sampler::{chance, pick, WeightedTable};
use chrono::{Datelike, Duration, NaiveDateTime};
use rand::Rng;
use safetynet_env::{GenError, PersonId, RecordId};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Release type recorded for bookings still open at the anchor.
pub const STILL_IN_CUSTODY: &str = "IN_CUSTODY";

/// Minutes an arrest needs before the anchor to be bookable.
pub const BOOKING_MARGIN_MINUTES: i64 = 60;

/// Everything generated downstream of one booking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingArtifacts {
    pub sentence: Option<JailSentence>,
    pub bail_bond: Option<BailBond>,
    pub incident: Option<JailIncident>,
    pub logs: Vec<JailLog>,
}

#[derive(Debug, Clone, Copy)]
pub struct JailLifecycle<'a> {
    tables: &'a JailTables,
    population: PopulationGenerator<'a>,
}

impl<'a> JailLifecycle<'a> {
    pub fn new(tables: &'a JailTables, population: &'a PopulationTables) -> Self {
        Self {
            tables,
            population: PopulationGenerator::new(population),
        }
    }

    pub fn tables(&self) -> &JailTables {
        self.tables
    }

    // =========================================================================
    // BOOKING
    // =========================================================================

    /// True when the arrest leaves room for a booking before `anchor`.
    pub fn can_book(&self, arrest: &Arrest, anchor: NaiveDateTime) -> bool {
        arrest.arrest_datetime + Duration::minutes(BOOKING_MARGIN_MINUTES) <= anchor
    }

    /// Books the arrested person and stamps the booking onto them.
    ///
    /// A stay that would run past `anchor` stays open: no release time,
    /// days served counted up to the anchor. A booking delay that would
    /// cross the anchor is cut to one minute before it.
    pub fn book<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        arrest: &Arrest,
        persons: &mut PersonIndex,
        anchor: NaiveDateTime,
    ) -> Result<JailBooking, GenError> {
        let t = self.tables;
        persons.require(&arrest.person_id)?;
        if !self.can_book(arrest, anchor) {
            return Err(GenError::OutsideWindow(format!(
                "arrest {} at {} is within {} minutes of {}",
                arrest.arrest_id, arrest.arrest_datetime, BOOKING_MARGIN_MINUTES, anchor
            )));
        }

        let booking_datetime = (arrest.arrest_datetime
            + Duration::hours(i64::from(t.booking_delay_hours.sample(rng))))
        .min(anchor - Duration::minutes(1));
        let facility = pick(rng, &t.facilities)?;
        let housing_assignment = format!(
            "BLOCK_{}{}",
            pick(rng, &t.housing_blocks)?,
            t.housing_cells.sample(rng)
        );
        let special_housing = t
            .special_housing
            .iter()
            .filter(|(_, p)| chance(rng, *p))
            .map(|(name, _)| name.clone())
            .collect();

        let stay = i64::from(t.stay_days.sample(rng).max(1));
        let release = booking_datetime + Duration::days(stay);
        let (release_datetime, release_type, days_served) = if release <= anchor {
            (Some(release), t.release_types.sample_cloned(rng)?, stay)
        } else {
            (None, STILL_IN_CUSTODY.to_string(), (anchor - booking_datetime).num_days().max(0))
        };

        let inmate_number = format!("IN{:06}", rng.gen_range(0..1_000_000));
        let booking = JailBooking {
            booking_id: RecordId::from_rng(rng),
            person_id: arrest.person_id,
            arrest_id: arrest.arrest_id,
            booking_number: format!("BK{}{:06}", booking_datetime.year(), rng.gen_range(0..1_000_000)),
            inmate_number: inmate_number.clone(),
            booking_datetime,
            facility: facility.name.clone(),
            housing_assignment,
            classification_level: t.classification.sample_cloned(rng)?,
            special_housing,
            suicide_risk_level: t.suicide_risk.sample_cloned(rng)?,
            medical_alerts: t.medical_alerts.draw(rng)?,
            charges_at_booking: arrest.charges.clone(),
            bail_amount: arrest.bail_amount,
            bail_posted: arrest.bail_amount > 0 && chance(rng, t.bail_posted_probability),
            programs_enrolled: t.booking_programs.draw(rng)?,
            release_datetime,
            release_type,
            days_served,
        };

        let update = self.booking_update(rng, &booking, inmate_number)?;
        persons.context(&booking.person_id)?.record_booking(update);

        debug!(
            "Booked {} at {} for {} day(s)",
            booking.person_id, booking.facility, booking.days_served
        );
        Ok(booking)
    }

    fn booking_update<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        inmate_key: String,
    ) -> Result<BookingUpdate, GenError> {
        let t = self.tables;
        let probation = *t.probation.sample(rng)?;
        let probation_officer = if probation != ProbationStatus::None {
            Some((self.population.full_name(rng)?, self.population.phone(rng)?))
        } else {
            None
        };
        let parole = *t.parole.sample(rng)?;
        let (parole_offense, parole_timing) = if parole.is_pending_or_active() {
            (
                Some(t.parole_offenses.sample_cloned(rng)?),
                Some(t.parole_timings.sample_cloned(rng)?),
            )
        } else {
            (None, None)
        };
        let gang_membership = if chance(rng, t.gang_probability) {
            t.gang_membership.sample_cloned(rng)?
        } else {
            "NONE".to_string()
        };

        Ok(BookingUpdate {
            booked_at: booking.booking_datetime,
            incarceration_site: booking.facility.clone(),
            inmate_key,
            probation,
            probation_officer,
            parole,
            parole_offense,
            parole_timing,
            gang_membership,
            ccis_offender_key: format!("CCIS-{:06}", rng.gen_range(0..1_000_000)),
            is_multistate_offender: chance(rng, t.multistate_probability),
        })
    }

    // =========================================================================
    // BOOKING CHILDREN
    // =========================================================================

    /// Runs every downstream stage for one booking.
    ///
    /// Sentence, bail bond and incident each occur with their configured
    /// probability; the log stream is always produced.
    pub fn follow_up<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        persons: &mut PersonIndex,
        anchor: NaiveDateTime,
    ) -> Result<BookingArtifacts, GenError> {
        let t = self.tables;
        let sentence = if chance(rng, t.sentence_probability) {
            Some(self.sentence(rng, booking, persons, anchor)?)
        } else {
            None
        };
        let bail_bond = if booking.bail_posted && chance(rng, t.bond_probability) {
            Some(self.bail_bond(rng, booking, anchor)?)
        } else {
            None
        };
        let incident = if chance(rng, t.incident_probability) {
            Some(self.incident(rng, booking, anchor)?)
        } else {
            None
        };
        let logs = self.logs(rng, booking, persons, anchor)?;
        Ok(BookingArtifacts {
            sentence,
            bail_bond,
            incident,
            logs,
        })
    }

    /// A sentence handed down during the stay.
    pub fn sentence<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        persons: &mut PersonIndex,
        anchor: NaiveDateTime,
    ) -> Result<JailSentence, GenError> {
        let t = self.tables;
        let inmate_key = persons
            .require(&booking.person_id)?
            .inmate
            .as_ref()
            .and_then(|state| state.inmate_key())
            .map(str::to_string);

        let severity = booking
            .charges_at_booking
            .iter()
            .map(|c| c.severity)
            .min()
            .unwrap_or(ChargeSeverity::Misdemeanor);
        let sentence_type = *t.sentence_types.sample(rng, &severity)?.value;

        let (total_days, notes, good_time_eligible) = match t.terms(sentence_type) {
            Some(terms) => {
                let total = if terms.days.is_empty() { 0 } else { *pick(rng, &terms.days)? };
                let note = if terms.notes.is_empty() {
                    None
                } else {
                    Some(pick(rng, &terms.notes)?.clone())
                };
                (total, note, terms.good_time_eligible)
            }
            None => (0, None, false),
        };
        let time_served_days = rng.gen_range(0..=total_days.min(t.max_time_served_days).max(0));

        let sentence_date = within_stay(rng, booking, anchor);
        let start_date =
            sentence_date.date() + Duration::days(i64::from(t.sentence_start_delay_days.sample(rng)));
        let end_date = (total_days > 0).then(|| start_date + Duration::days(total_days));

        let definite_stated_term_years = if matches!(sentence_type, SentenceType::Prison | SentenceType::JailTime) {
            years(rng, &t.definite_term)
        } else {
            None
        };
        let minimum_years = years(rng, &t.minimum_term);
        let maximum_years = match minimum_years {
            Some(min) => years(rng, &t.maximum_term).map(|extra| round_tenth(min + extra)),
            None => None,
        };

        let statute = booking
            .charges_at_booking
            .iter()
            .find(|c| c.severity == severity)
            .map(|c| c.statute.clone())
            .unwrap_or_default();

        let sentence = JailSentence {
            sentence_id: RecordId::from_rng(rng),
            person_id: booking.person_id,
            booking_id: booking.booking_id,
            court_case_number: format!("CR-{:06}", rng.gen_range(0..1_000_000)),
            sentence_date,
            offense_description: t.offense_descriptions.sample_cloned(rng)?,
            statute,
            sentence_type,
            total_days,
            time_served_days,
            start_date,
            end_date,
            good_time_eligible,
            notes,
            definite_stated_term_years,
            minimum_years,
            maximum_years,
            return_violator_years: years(rng, &t.return_violator),
            gun_years: years(rng, &t.gun_term),
            commitment_county_years: years(rng, &t.commitment_county),
            inmate_key,
        };

        let fallback_officer = (self.population.full_name(rng)?, self.population.phone(rng)?);
        persons.context(&booking.person_id)?.record_sentence(SentenceUpdate {
            sentenced_at: sentence.sentence_date,
            sentence_type,
            end_date,
            fallback_officer,
        });
        trace!("Sentence {:?} for booking {}", sentence_type, booking.booking_id);
        Ok(sentence)
    }

    /// A bond against a booking whose bail was posted.
    pub fn bail_bond<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        anchor: NaiveDateTime,
    ) -> Result<BailBond, GenError> {
        let t = self.tables;
        let bond_type = t.bond_types.sample_cloned(rng)?;
        let amount = *pick(rng, &t.bond_amounts)?;
        let posted = chance(rng, t.bond_posted_probability);

        let (posted_datetime, poster_name, receipt_number) = if posted {
            (
                Some(within_stay(rng, booking, anchor)),
                Some(self.population.full_name(rng)?),
                Some(format!("RCPT-{:06}", rng.gen_range(0..1_000_000))),
            )
        } else {
            (None, None, None)
        };
        let bondsman_company = if posted && bond_type == "SURETY" {
            Some(pick(rng, &t.bondsmen)?.clone())
        } else {
            None
        };

        Ok(BailBond {
            bond_id: RecordId::from_rng(rng),
            person_id: booking.person_id,
            booking_id: booking.booking_id,
            bond_type,
            amount,
            posted,
            posted_datetime,
            poster_name,
            bondsman_company,
            receipt_number,
            conditions: t.bond_conditions.draw(rng)?,
            exonerated: chance(rng, t.bond_exonerated_probability),
        })
    }

    /// An in-custody incident during the stay.
    pub fn incident<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        anchor: NaiveDateTime,
    ) -> Result<JailIncident, GenError> {
        let t = self.tables;
        let staff_count = t.incident_staff.sample(rng).max(1);
        let mut involved_staff = Vec::with_capacity(staff_count as usize);
        for _ in 0..staff_count {
            involved_staff.push(self.population.full_name(rng)?);
        }
        let referral = t.incident_referrals.sample_cloned(rng)?;

        Ok(JailIncident {
            incident_id: RecordId::from_rng(rng),
            booking_id: booking.booking_id,
            person_id: booking.person_id,
            incident_datetime: within_stay(rng, booking, anchor),
            incident_type: t.incident_types.sample_cloned(rng)?,
            location: t.incident_locations.sample_cloned(rng)?,
            involved_staff,
            description: t.incident_descriptions.sample_cloned(rng)?,
            actions_taken: t.incident_actions.draw(rng)?,
            referral_to_outside_agency: (referral != "NONE").then_some(referral),
        })
    }

    // =========================================================================
    // LOG STREAM
    // =========================================================================

    /// The chronological log stream for one booking.
    ///
    /// BOOKED opens the stream and RELEASED (when the stay has ended)
    /// closes it; the release also stamps RELEASED onto the person.
    pub fn logs<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booking: &JailBooking,
        persons: &mut PersonIndex,
        anchor: NaiveDateTime,
    ) -> Result<Vec<JailLog>, GenError> {
        let t = self.tables;
        persons.require(&booking.person_id)?;

        let start = booking.booking_datetime;
        let end = booking.release_datetime.unwrap_or(anchor);
        let stay_days = (end - start).num_days().max(0);
        let mut stream = LogStream::new(booking, start, end);

        let booked_by = self.population.staff_signature(rng)?;
        stream.push_boundary(
            rng,
            start,
            LogAction::Booked,
            &[
                ("booking_number", booking.booking_number.clone()),
                ("housing", booking.housing_assignment.clone()),
            ],
            booked_by.clone(),
        );

        let intake_at = start + minutes(t.property_intake_minutes.sample(rng));
        let items_logged = t.property_items.sample(rng).to_string();
        stream.push(
            rng,
            intake_at,
            LogAction::PropertyIntake,
            &[("items_logged", items_logged)],
            booked_by,
        );

        if chance(rng, t.medical_intake_probability) {
            let at = start + minutes(t.medical_intake_minutes.sample(rng));
            let nurse = self.population.full_name(rng)?;
            stream.push(
                rng,
                at,
                LogAction::MedicalIntake,
                &[
                    ("nurse", nurse.clone()),
                    ("alerts", booking.medical_alerts.join(",")),
                ],
                nurse,
            );
        }

        if chance(rng, t.housing_change_probability) {
            let at = start + Duration::hours(i64::from(t.housing_change_hours.sample(rng)));
            let to = format!("BLOCK_{}{}", pick(rng, &t.housing_blocks)?, t.housing_cells.sample(rng));
            let actor = self.population.staff_signature(rng)?;
            stream.push(
                rng,
                at,
                LogAction::HousingChange,
                &[("from", booking.housing_assignment.clone()), ("to", to)],
                actor,
            );
        }

        if chance(rng, t.court_probability) {
            let at = start + Duration::days(i64::from(t.court_days.sample(rng)));
            let details = [
                ("court", t.courts.sample_cloned(rng)?),
                ("result", t.court_results.sample_cloned(rng)?),
            ];
            stream.push(rng, at, LogAction::CourtAppearance, &details, "SYSTEM".into());
        }

        let visitors = rng.gen_range(0..=(stay_days / 14).min(i64::from(t.max_visitors)));
        for _ in 0..visitors {
            let at = day_at(rng, start, 1, stay_days.max(1), 9, 19);
            let details = [
                ("visitor", self.population.full_name(rng)?),
                ("relation", t.visitor_relations.sample_cloned(rng)?),
                ("duration_minutes", t.visit_minutes.sample(rng).to_string()),
            ];
            stream.push(rng, at, LogAction::VisitorCheckin, &details, "VISITATION_DESK".into());
        }

        let calls = rng.gen_range(0..=(1 + stay_days / 7).min(i64::from(t.max_phone_calls)));
        for _ in 0..calls {
            let at = day_at(rng, start, 0, stay_days, 8, 21);
            let details = [
                ("callee", self.population.full_name(rng)?),
                ("relation", t.phone_relations.sample_cloned(rng)?),
                ("duration_minutes", t.call_minutes.sample(rng).to_string()),
            ];
            stream.push(rng, at, LogAction::PhoneCall, &details, "INMATE_PHONE".into());
        }

        if chance(rng, t.disciplinary_probability) {
            let at = day_at(rng, start, 1, stay_days.max(1), 9, 18);
            let details = [
                ("action", t.disciplinary_actions.sample_cloned(rng)?),
                ("reason", t.disciplinary_reasons.sample_cloned(rng)?),
            ];
            let actor = self.population.staff_signature(rng)?;
            stream.push(rng, at, LogAction::Disciplinary, &details, actor);
        }

        for program in &booking.programs_enrolled {
            let enrolled_at = start + Duration::days(i64::from(t.program_enroll_days.sample(rng)));
            stream.push(
                rng,
                enrolled_at,
                LogAction::ProgramEnroll,
                &[("program", program.clone())],
                "PROGRAMS_DESK".into(),
            );
            if chance(rng, t.program_complete_probability) {
                let at = enrolled_at + Duration::days(i64::from(t.program_complete_days.sample(rng)));
                stream.push(
                    rng,
                    at,
                    LogAction::ProgramComplete,
                    &[("program", program.clone())],
                    "PROGRAMS_DESK".into(),
                );
            }
        }

        if let Some(released_at) = booking.release_datetime {
            let actor = self.population.staff_signature(rng)?;
            stream.push_boundary(
                rng,
                released_at,
                LogAction::Released,
                &[("release_type", booking.release_type.clone())],
                actor,
            );
            persons.context(&booking.person_id)?.record_release(released_at);
        }

        let logs = stream.finish();
        trace!("{} log entries for booking {}", logs.len(), booking.booking_id);
        Ok(logs)
    }

    // =========================================================================
    // FACILITIES AND PROGRAMS
    // =========================================================================

    /// The facility catalog as records.
    pub fn facilities<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<CorrectionsFacility>, GenError> {
        self.tables
            .facilities
            .iter()
            .map(|spec| {
                Ok(CorrectionsFacility {
                    facility_id: RecordId::from_rng(rng),
                    name: spec.name.clone(),
                    address: Address {
                        street: spec.street.clone(),
                        city: spec.city.clone(),
                        state: "WA".into(),
                        zip_code: spec.zip_code.clone(),
                    },
                    capacity: spec.capacity,
                    security_level: spec.security_level.clone(),
                    contact_phone: self.population.phone(rng)?,
                })
            })
            .collect()
    }

    /// One record per configured program, enrolling booked persons.
    pub fn programs<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        booked: &[PersonId],
        anchor: NaiveDateTime,
    ) -> Result<Vec<JailProgram>, GenError> {
        if booked.is_empty() {
            return Err(GenError::EmptyCollection("bookings"));
        }
        let t = self.tables;
        let mut pool: Vec<PersonId> = Vec::with_capacity(booked.len());
        for id in booked {
            if !pool.contains(id) {
                pool.push(*id);
            }
        }

        let mut programs = Vec::with_capacity(t.programs.len());
        for spec in &t.programs {
            let capacity = t.program_capacity.sample(rng);
            let enroll = (t.program_enrollment.sample(rng).min(capacity) as usize).min(pool.len());
            let enrolled_person_ids: Vec<PersonId> = WeightedTable::uniform(pool.iter().copied())
                .sample_distinct(rng, enroll)
                .into_iter()
                .copied()
                .collect();

            let rest: Vec<PersonId> = pool
                .iter()
                .filter(|id| !enrolled_person_ids.contains(id))
                .copied()
                .collect();
            let waitlist = (t.program_waitlist.sample(rng) as usize).min(rest.len());
            let waitlist_person_ids = WeightedTable::uniform(rest.iter().copied())
                .sample_distinct(rng, waitlist)
                .into_iter()
                .copied()
                .collect();

            let offset = i64::from(t.program_start_days_after.sample(rng))
                - i64::from(t.program_start_days_before.sample(rng));
            let start_date = anchor.date() + Duration::days(offset);
            let duration = *pick(rng, &t.program_durations)?;

            programs.push(JailProgram {
                program_id: RecordId::from_rng(rng),
                name: spec.name.clone(),
                category: spec.category.clone(),
                provider: t.program_providers.sample_cloned(rng)?,
                location: t.program_locations.sample_cloned(rng)?,
                schedule: t.program_schedules.sample_cloned(rng)?,
                capacity,
                enrolled_person_ids,
                waitlist_person_ids,
                start_date,
                end_date: start_date + Duration::days(duration),
                active: chance(rng, t.program_active_probability),
            });
        }
        Ok(programs)
    }
}

// =============================================================================
// HELPERS
// =============================================================================

/// Accumulates log entries, dropping anything outside the open stay.
struct LogStream<'b> {
    booking: &'b JailBooking,
    start: NaiveDateTime,
    end: NaiveDateTime,
    entries: Vec<JailLog>,
}

impl<'b> LogStream<'b> {
    fn new(booking: &'b JailBooking, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            booking,
            start,
            end,
            entries: Vec::new(),
        }
    }

    /// Intermediate entry; kept only if strictly inside the stay.
    fn push<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        at: NaiveDateTime,
        action: LogAction,
        details: &[(&str, String)],
        actor: String,
    ) {
        if at > self.start && at < self.end {
            self.push_boundary(rng, at, action, details, actor);
        }
    }

    fn push_boundary<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        at: NaiveDateTime,
        action: LogAction,
        details: &[(&str, String)],
        actor: String,
    ) {
        self.entries.push(JailLog {
            log_id: RecordId::from_rng(rng),
            booking_id: self.booking.booking_id,
            person_id: self.booking.person_id,
            log_datetime: at,
            action,
            details: details
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<String, String>>(),
            actor,
        });
    }

    /// Stable sort keeps BOOKED ahead of anything sharing its instant.
    fn finish(mut self) -> Vec<JailLog> {
        self.entries.sort_by_key(|log| log.log_datetime);
        self.entries
    }
}

fn minutes(m: u32) -> Duration {
    Duration::minutes(i64::from(m))
}

/// A moment strictly inside the booking's stay.
fn within_stay<R: Rng + ?Sized>(rng: &mut R, booking: &JailBooking, anchor: NaiveDateTime) -> NaiveDateTime {
    let start = booking.booking_datetime;
    let end = booking.release_datetime.unwrap_or(anchor);
    let span = (end - start).num_seconds();
    if span < 2 {
        return start;
    }
    start + Duration::seconds(rng.gen_range(1..span))
}

/// `day` days into the stay (calendar), at a random minute in `[from_hour, to_hour]`.
fn day_at<R: Rng + ?Sized>(
    rng: &mut R,
    start: NaiveDateTime,
    min_day: i64,
    max_day: i64,
    from_hour: u32,
    to_hour: u32,
) -> NaiveDateTime {
    let day = if max_day <= min_day { min_day } else { rng.gen_range(min_day..=max_day) };
    let hour = rng.gen_range(from_hour..=to_hour);
    let minute = rng.gen_range(0..60);
    let date = start.date() + Duration::days(day);
    date.and_hms_opt(hour, minute, 0).unwrap_or(start)
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn years<R: Rng + ?Sized>(rng: &mut R, field: &YearField) -> Option<f64> {
    if !chance(rng, field.probability) {
        return None;
    }
    let value = if field.max > field.min {
        rng.gen_range(field.min..field.max)
    } else {
        field.min
    };
    Some(round_tenth(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::person_index::CustodyStatus;
    use crate::records::Charge;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn anchor() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    fn setup(rng: &mut ChaCha8Rng, pop: &PopulationTables) -> (PersonIndex, Arrest) {
        let person = PopulationGenerator::new(pop).generate_adult(rng, anchor().date()).unwrap();
        let person_id = person.person_id;
        let mut persons = PersonIndex::new();
        persons.insert(person).unwrap();
        let arrest = Arrest {
            arrest_id: RecordId::from_seed(10),
            person_id,
            cad_incident_id: None,
            arrest_datetime: anchor() - Duration::days(500),
            arrest_location: "Street near 100 Pike St".into(),
            arresting_officer: "Sam Lee".into(),
            arrest_type: "ON_VIEW".into(),
            arrest_method: "HANDCUFFS".into(),
            charges: vec![Charge {
                description: "Burglary".into(),
                category: "PROPERTY".into(),
                severity: ChargeSeverity::Felony,
                statute: "RCW 9.52".into(),
            }],
            use_of_force: false,
            force_type: None,
            injuries_sustained: false,
            miranda_read: true,
            miranda_datetime: None,
            bail_amount: 10_000,
            evidence_collected: vec![],
            evidence_property_ids: vec![],
        };
        (persons, arrest)
    }

    #[test]
    fn test_booking_stamps_person_in_custody() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let (mut persons, arrest) = setup(&mut rng, &pop);

        let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
        let inmate = persons.get(&arrest.person_id).unwrap().inmate.as_ref().unwrap();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::InCustody));
        assert_eq!(inmate.inmate_key(), Some(booking.inmate_number.as_str()));
        assert_eq!(
            inmate.incarceration_site.as_ref().map(|s| s.value.as_str()),
            Some(booking.facility.as_str())
        );
        assert!(booking.booking_datetime > arrest.arrest_datetime);
    }

    #[test]
    fn test_release_log_flips_status_and_closes_stream() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let (mut persons, arrest) = setup(&mut rng, &pop);

        let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
        // 500 days back with a stay of at most 365 always closes
        let released_at = booking.release_datetime.unwrap();
        let logs = lifecycle.logs(&mut rng, &booking, &mut persons, anchor()).unwrap();

        assert_eq!(logs.first().map(|l| l.action), Some(LogAction::Booked));
        assert_eq!(logs.last().map(|l| l.action), Some(LogAction::Released));
        assert!(logs.windows(2).all(|w| w[0].log_datetime <= w[1].log_datetime));
        for log in &logs[1..logs.len() - 1] {
            assert!(log.log_datetime > booking.booking_datetime && log.log_datetime < released_at);
        }
        let inmate = persons.get(&arrest.person_id).unwrap().inmate.as_ref().unwrap();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::Released));
    }

    #[test]
    fn test_open_stay_has_no_release() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let (mut persons, mut arrest) = setup(&mut rng, &pop);
        arrest.arrest_datetime = anchor() - Duration::hours(12);

        let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
        assert!(booking.release_datetime.is_none());
        assert_eq!(booking.release_type, STILL_IN_CUSTODY);
        let logs = lifecycle.logs(&mut rng, &booking, &mut persons, anchor()).unwrap();
        assert!(logs.iter().all(|l| l.action != LogAction::Released));
    }

    #[test]
    fn test_arrest_near_anchor_books_inside_window() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let (mut persons, mut arrest) = setup(&mut rng, &pop);

        arrest.arrest_datetime = anchor() - Duration::minutes(10);
        assert!(!lifecycle.can_book(&arrest, anchor()));
        let err = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap_err();
        assert!(matches!(err, GenError::OutsideWindow(_)));

        arrest.arrest_datetime = anchor() - Duration::minutes(90);
        for _ in 0..20 {
            let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
            assert!(booking.booking_datetime >= arrest.arrest_datetime);
            assert!(booking.booking_datetime < anchor());
            assert!(booking.release_datetime.is_none());

            let sentence = lifecycle.sentence(&mut rng, &booking, &mut persons, anchor()).unwrap();
            assert!(sentence.sentence_date > booking.booking_datetime);
            assert!(sentence.sentence_date < anchor());
        }
    }

    #[test]
    fn test_late_release_wins_over_earlier_probation_sentence() {
        let (mut jail, pop) = (JailTables::default(), PopulationTables::default());
        jail.sentence_types = jail
            .sentence_types
            .clone()
            .with_entry(ChargeSeverity::Felony, WeightedTable::new(vec![(SentenceType::Probation, 1.0)]));
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        let (mut persons, arrest) = setup(&mut rng, &pop);

        let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
        let sentence = lifecycle.sentence(&mut rng, &booking, &mut persons, anchor()).unwrap();
        assert!(sentence.sentence_date > booking.booking_datetime);
        lifecycle.logs(&mut rng, &booking, &mut persons, anchor()).unwrap();

        let inmate = persons.get(&arrest.person_id).unwrap().inmate.as_ref().unwrap();
        assert_eq!(inmate.custody_status(), Some(CustodyStatus::Released));
        assert_eq!(inmate.probation(), Some(ProbationStatus::Active));
        assert!(inmate.probation_officer_name.is_some());
    }

    #[test]
    fn test_sentence_dates_are_consistent() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let (mut persons, arrest) = setup(&mut rng, &pop);
        let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();

        for _ in 0..100 {
            let s = lifecycle.sentence(&mut rng, &booking, &mut persons, anchor()).unwrap();
            assert!(s.time_served_days <= s.total_days.max(0).min(45));
            match s.end_date {
                Some(end) => assert_eq!((end - s.start_date).num_days(), s.total_days),
                None => assert_eq!(s.total_days, 0),
            }
            if let (Some(min), Some(max)) = (s.minimum_years, s.maximum_years) {
                assert!(max > min);
            }
            assert!(s.maximum_years.is_none() || s.minimum_years.is_some());
        }
    }

    #[test]
    fn test_programs_require_bookings() {
        let (jail, pop) = (JailTables::default(), PopulationTables::default());
        let lifecycle = JailLifecycle::new(&jail, &pop);
        let mut rng = ChaCha8Rng::seed_from_u64(6);
        let result = lifecycle.programs(&mut rng, &[], anchor());
        assert!(matches!(result, Err(GenError::EmptyCollection("bookings"))));

        let booked: Vec<PersonId> = (0..8).map(PersonId::from_seed).collect();
        let programs = lifecycle.programs(&mut rng, &booked, anchor()).unwrap();
        assert_eq!(programs.len(), jail.programs.len());
        for program in programs {
            assert!(program.enrolled_person_ids.len() as u32 <= program.capacity);
            for id in &program.waitlist_person_ids {
                assert!(!program.enrolled_person_ids.contains(id));
            }
            assert!(program.end_date > program.start_date);
        }
    }

    proptest! {
        #[test]
        fn prop_booking_release_ordering(seed in any::<u64>(), days_back in 1i64..900) {
            let (jail, pop) = (JailTables::default(), PopulationTables::default());
            let lifecycle = JailLifecycle::new(&jail, &pop);
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (mut persons, mut arrest) = setup(&mut rng, &pop);
            arrest.arrest_datetime = anchor() - Duration::days(days_back);

            let booking = lifecycle.book(&mut rng, &arrest, &mut persons, anchor()).unwrap();
            if let Some(release) = booking.release_datetime {
                prop_assert!(release > booking.booking_datetime);
                prop_assert_eq!((release - booking.booking_datetime).num_days(), booking.days_served);
            }
            let artifacts = lifecycle.follow_up(&mut rng, &booking, &mut persons, anchor()).unwrap();
            for log in &artifacts.logs {
                prop_assert_eq!(log.booking_id, booking.booking_id);
                prop_assert!(log.log_datetime >= booking.booking_datetime);
            }
            if let Some(incident) = artifacts.incident {
                prop_assert!(incident.incident_datetime >= booking.booking_datetime);
            }
        }
    }
}
