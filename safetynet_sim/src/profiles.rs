//! Named run profiles.

use serde::Serialize;

/// Run shape: how many records of each kind, and how to split the work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunConfig {
    pub persons: usize,
    pub cad_incidents: usize,
    pub ems_incidents: usize,
    pub arrests: usize,
    /// Arrests that go on to a booking; capped at the arrest count
    pub bookings: usize,
    /// Property records linked to CAD incidents rather than arrests
    pub standalone_property: usize,
    /// Chance an EMS incident is dispatched from a CAD call
    pub ems_cad_link_probability: f64,
    /// Parallel EMS workers, each with a private pool and person index
    pub workers: usize,
    pub window_days: i64,
    /// Overrides the configured identity reuse probability
    pub reuse_probability: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            persons: 500,
            cad_incidents: 400,
            ems_incidents: 1000,
            arrests: 200,
            bookings: 150,
            standalone_property: 100,
            ems_cad_link_probability: 0.3,
            workers: 2,
            window_days: 730,
            reuse_probability: None,
        }
    }
}

impl RunConfig {
    /// Multiplies every count by `factor`, keeping at least one of each
    /// count that was non-zero.
    pub fn scaled(mut self, factor: f64) -> Self {
        let scale = |n: usize| {
            if n == 0 {
                0
            } else {
                ((n as f64 * factor).round() as usize).max(1)
            }
        };
        self.persons = scale(self.persons);
        self.cad_incidents = scale(self.cad_incidents);
        self.ems_incidents = scale(self.ems_incidents);
        self.arrests = scale(self.arrests);
        self.bookings = scale(self.bookings).min(self.arrests);
        self.standalone_property = scale(self.standalone_property);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// Profile identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileId {
    /// Tiny run touching every phase
    Smoke,

    /// Default mix
    Standard,

    /// EMS dominated, 4 workers
    EmsHeavy,

    /// Raised reuse probability to exercise the recurrence pool
    FrequentCallers,

    /// Booking dominated
    JailHeavy,

    /// Large counts, 8 workers
    Stress,
}

impl ProfileId {
    /// Returns a list of all profiles.
    pub fn all() -> Vec<ProfileId> {
        vec![
            ProfileId::Smoke,
            ProfileId::Standard,
            ProfileId::EmsHeavy,
            ProfileId::FrequentCallers,
            ProfileId::JailHeavy,
            ProfileId::Stress,
        ]
    }

    /// Returns the profile name.
    pub fn name(&self) -> &'static str {
        match self {
            ProfileId::Smoke => "smoke",
            ProfileId::Standard => "standard",
            ProfileId::EmsHeavy => "ems_heavy",
            ProfileId::FrequentCallers => "frequent_callers",
            ProfileId::JailHeavy => "jail_heavy",
            ProfileId::Stress => "stress",
        }
    }

    /// Returns a description of the profile.
    pub fn description(&self) -> &'static str {
        match self {
            ProfileId::Smoke => "A few records of every kind, all phases",
            ProfileId::Standard => "Default mix of persons, calls, EMS, arrests and bookings",
            ProfileId::EmsHeavy => "EMS dominated across 4 parallel workers",
            ProfileId::FrequentCallers => "High identity reuse to exercise spacing and caps",
            ProfileId::JailHeavy => "Most arrests booked, long jail log streams",
            ProfileId::Stress => "Large counts across 8 workers",
        }
    }

    /// Returns the run shape for this profile.
    pub fn run_config(&self) -> RunConfig {
        match self {
            ProfileId::Smoke => RunConfig {
                persons: 20,
                cad_incidents: 15,
                ems_incidents: 25,
                arrests: 10,
                bookings: 8,
                standalone_property: 5,
                workers: 1,
                ..Default::default()
            },
            ProfileId::Standard => RunConfig::default(),
            ProfileId::EmsHeavy => RunConfig {
                persons: 300,
                cad_incidents: 600,
                ems_incidents: 5000,
                arrests: 50,
                bookings: 30,
                standalone_property: 20,
                ems_cad_link_probability: 0.5,
                workers: 4,
                ..Default::default()
            },
            ProfileId::FrequentCallers => RunConfig {
                persons: 100,
                cad_incidents: 100,
                ems_incidents: 2000,
                arrests: 20,
                bookings: 10,
                standalone_property: 10,
                workers: 2,
                reuse_probability: Some(0.6),
                ..Default::default()
            },
            ProfileId::JailHeavy => RunConfig {
                persons: 400,
                cad_incidents: 300,
                ems_incidents: 100,
                arrests: 800,
                bookings: 700,
                standalone_property: 50,
                workers: 1,
                ..Default::default()
            },
            ProfileId::Stress => RunConfig {
                persons: 5000,
                cad_incidents: 5000,
                ems_incidents: 40_000,
                arrests: 3000,
                bookings: 2500,
                standalone_property: 1000,
                workers: 8,
                ..Default::default()
            },
        }
    }
}

impl std::fmt::Display for ProfileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ProfileId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smoke" | "tiny" => Ok(ProfileId::Smoke),
            "standard" | "default" => Ok(ProfileId::Standard),
            "ems_heavy" | "emsheavy" | "ems" => Ok(ProfileId::EmsHeavy),
            "frequent_callers" | "frequentcallers" | "frequent" => Ok(ProfileId::FrequentCallers),
            "jail_heavy" | "jailheavy" | "jail" => Ok(ProfileId::JailHeavy),
            "stress" => Ok(ProfileId::Stress),
            _ => Err(format!("Unknown profile: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_names_parse_back() {
        for profile in ProfileId::all() {
            assert_eq!(profile.name().parse::<ProfileId>(), Ok(profile));
        }
        assert_eq!("EMS".parse::<ProfileId>(), Ok(ProfileId::EmsHeavy));
        assert!("nope".parse::<ProfileId>().is_err());
    }

    #[test]
    fn test_bookings_never_exceed_arrests() {
        for profile in ProfileId::all() {
            let run = profile.run_config();
            assert!(run.bookings <= run.arrests, "{}", profile);
            assert!(run.workers >= 1);
        }
    }

    #[test]
    fn test_scaling() {
        let run = ProfileId::Smoke.run_config().scaled(0.01);
        assert_eq!(run.persons, 1);
        assert_eq!(run.bookings, 1);

        let run = ProfileId::Standard.run_config().scaled(2.0);
        assert_eq!(run.ems_incidents, 2000);
        assert!(run.bookings <= run.arrests);
    }
}
