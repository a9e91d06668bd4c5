//! Health and readiness probes.
//!
//! A probe is a named boolean flag; a probe group is "OK" iff every
//! contained probe is OK. Probe reads and writes are concurrent; the group
//! narration reports the names of failing probes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use keel_core::{Error, Result};

/// A named boolean flag indicating a sub-condition of service health.
///
/// Cloning a probe yields another handle on the same flag.
#[derive(Debug, Clone)]
pub struct Probe {
    name: Arc<str>,
    ok: Arc<AtomicBool>,
}

impl Probe {
    fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            ok: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the probe name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the current state.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.ok.load(Ordering::SeqCst)
    }

    /// Flips the probe.
    pub fn set_ok(&self, ok: bool) {
        self.ok.store(ok, Ordering::SeqCst);
    }
}

/// Result of checking a probe group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeReport {
    /// True iff every probe in the group is OK.
    pub ok: bool,
    /// Names of the failing probes, in registration order.
    pub failing: Vec<String>,
}

/// A named collection of probes with unique names.
#[derive(Debug)]
pub struct ProbeGroup {
    name: String,
    probes: RwLock<Vec<Probe>>,
}

impl ProbeGroup {
    /// Creates an empty group.
    ///
    /// # Errors
    ///
    /// Returns an error when the group name fails probe-name validation.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            probes: RwLock::new(Vec::new()),
        })
    }

    /// Returns the group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registers a probe, initially OK.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid names or duplicates within the group.
    pub fn register(&self, name: &str) -> Result<Probe> {
        validate_name(name)?;
        let mut probes = self
            .probes
            .write()
            .map_err(|_| Error::internal("probe group lock poisoned"))?;
        if probes.iter().any(|p| p.name() == name) {
            return Err(Error::invalid_input(format!(
                "probe '{name}' already registered in group '{}'",
                self.name
            )));
        }
        let probe = Probe::new(name);
        probes.push(probe.clone());
        Ok(probe)
    }

    /// Checks every probe and collects the failing names.
    #[must_use]
    pub fn check(&self) -> ProbeReport {
        let probes = match self.probes.read() {
            Ok(probes) => probes,
            Err(_) => {
                return ProbeReport {
                    ok: false,
                    failing: vec!["<poisoned>".to_string()],
                }
            }
        };
        let failing: Vec<String> = probes
            .iter()
            .filter(|p| !p.ok())
            .map(|p| p.name().to_string())
            .collect();
        ProbeReport {
            ok: failing.is_empty(),
            failing,
        }
    }

    /// Renders the group status as `"<group>:OK"` or
    /// `"<group>:<name1>,<name2>"`.
    #[must_use]
    pub fn narrate(&self) -> (bool, String) {
        let report = self.check();
        if report.ok {
            (true, format!("{}:OK", self.name))
        } else {
            (false, format!("{}:{}", self.name, report.failing.join(",")))
        }
    }
}

/// Validates a probe or group name: at least three characters from
/// `[a-zA-Z0-9_/-]`.
fn validate_name(name: &str) -> Result<()> {
    if name.len() < 3 {
        return Err(Error::invalid_input(format!(
            "probe name '{name}' is too short (minimum 3 characters)"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '/' || c == '-')
    {
        return Err(Error::invalid_input(format!(
            "probe name '{name}' contains characters outside [a-zA-Z0-9_/-]"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn two_character_names_are_rejected() {
        let group = ProbeGroup::new("readiness").unwrap();
        assert!(group.register("ab").is_err());
        assert!(group.register("abc").is_ok());
    }

    #[test]
    fn invalid_characters_are_rejected() {
        let group = ProbeGroup::new("readiness").unwrap();
        assert!(group.register("has space").is_err());
        assert!(group.register("db/primary-1_a").is_ok());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let group = ProbeGroup::new("readiness").unwrap();
        group.register("db0").unwrap();
        assert!(group.register("db0").is_err());
    }

    #[test]
    fn empty_group_is_ok() {
        let group = ProbeGroup::new("healthiness").unwrap();
        let (ok, text) = group.narrate();
        assert!(ok);
        assert_eq!(text, "healthiness:OK");
    }

    #[test]
    fn failing_probes_are_narrated() {
        let group = ProbeGroup::new("readiness").unwrap();
        let db = group.register("db0").unwrap();
        let cache = group.register("cache").unwrap();
        let queue = group.register("queue").unwrap();

        assert!(group.check().ok);

        cache.set_ok(false);
        queue.set_ok(false);
        let (ok, text) = group.narrate();
        assert!(!ok);

        let (prefix, failing) = text.split_once(':').unwrap();
        assert_eq!(prefix, "readiness");
        let names: HashSet<&str> = failing.split(',').collect();
        assert_eq!(names, HashSet::from(["cache", "queue"]));

        // Recovery flips the group back to OK.
        cache.set_ok(true);
        queue.set_ok(true);
        db.set_ok(true);
        assert!(group.check().ok);
    }

    #[test]
    fn probe_handles_share_state() {
        let group = ProbeGroup::new("readiness").unwrap();
        let probe = group.register("db0").unwrap();
        let clone = probe.clone();
        clone.set_ok(false);
        assert!(!probe.ok());
        assert_eq!(group.check().failing, vec!["db0".to_string()]);
    }

    #[test]
    fn concurrent_flips_are_safe() {
        let group = Arc::new(ProbeGroup::new("readiness").unwrap());
        let probe = group.register("db0").unwrap();
        let mut handles = Vec::new();
        for i in 0..8 {
            let probe = probe.clone();
            let group = Arc::clone(&group);
            handles.push(std::thread::spawn(move || {
                for j in 0..100 {
                    probe.set_ok((i + j) % 2 == 0);
                    let _ = group.check();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
