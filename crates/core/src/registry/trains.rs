use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::{
    error::{BookingError, Result, ValidationError},
    train::{ClassSpec, Train, AC_CLASS, SLEEPER_CLASS},
};

/// Trains keyed by number, plus the class set every booking is checked against.
#[derive(Debug, Clone)]
pub struct TrainRegistry {
    classes: Vec<ClassSpec>,
    trains: BTreeMap<String, Train>,
}

impl Default for TrainRegistry {
    fn default() -> Self {
        Self::new(ClassSpec::defaults())
    }
}

impl TrainRegistry {
    /// Empty registry using `classes` as the class set and default capacities.
    pub fn new(classes: Vec<ClassSpec>) -> Self {
        Self {
            classes,
            trains: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the five stock trains.
    pub fn seeded(classes: Vec<ClassSpec>) -> Self {
        let mut registry = Self::new(classes);
        registry.seed_defaults();
        registry
    }

    /// Rebuild a registry from persisted parts.
    pub fn from_parts(classes: Vec<ClassSpec>, trains: impl IntoIterator<Item = Train>) -> Self {
        Self {
            classes,
            trains: trains
                .into_iter()
                .map(|train| (train.number.clone(), train))
                .collect(),
        }
    }

    fn seed_defaults(&mut self) {
        let defaults = self.classes.clone();
        let stock = [
            ("12345", "Rajdhani Express", Some((30, 60))),
            ("23456", "Shatabdi Express", Some((40, 40))),
            ("34567", "Duronto Express", None),
            ("45678", "Garib Rath", None),
            ("56789", "Jan Shatabdi", None),
        ];
        for (number, name, custom) in stock {
            let classes = match custom {
                Some((ac, sleeper)) => defaults
                    .iter()
                    .map(|spec| match spec.name.as_str() {
                        AC_CLASS => ClassSpec::new(AC_CLASS, ac),
                        SLEEPER_CLASS => ClassSpec::new(SLEEPER_CLASS, sleeper),
                        _ => spec.clone(),
                    })
                    .collect(),
                None => defaults.clone(),
            };
            self.add(number, name, &classes);
        }
    }

    /// Register a train. Returns `false` if the number is already taken.
    pub fn add(&mut self, number: &str, name: &str, classes: &[ClassSpec]) -> bool {
        let number = number.trim();
        if self.trains.contains_key(number) {
            return false;
        }
        self.trains
            .insert(number.to_string(), Train::new(number, name.trim(), classes));
        info!(train = %number, name = %name.trim(), "Train added");
        true
    }

    /// Register a train with the configured default capacities.
    pub fn add_default(&mut self, number: &str, name: &str) -> bool {
        let classes = self.classes.clone();
        self.add(number, name, &classes)
    }

    /// Look up a train by number.
    pub fn get(&self, number: &str) -> Result<&Train> {
        self.trains
            .get(number.trim())
            .ok_or_else(|| BookingError::TrainNotFound(number.trim().to_string()))
    }

    /// Mutable lookup by number.
    pub fn get_mut(&mut self, number: &str) -> Result<&mut Train> {
        self.trains
            .get_mut(number.trim())
            .ok_or_else(|| BookingError::TrainNotFound(number.trim().to_string()))
    }

    /// Whether a train with this number exists.
    pub fn contains(&self, number: &str) -> bool {
        self.trains.contains_key(number.trim())
    }

    /// All trains, ordered by number.
    pub fn all(&self) -> impl Iterator<Item = &Train> {
        self.trains.values()
    }

    /// Number of registered trains.
    pub fn len(&self) -> usize {
        self.trains.len()
    }

    /// Whether no trains are registered.
    pub fn is_empty(&self) -> bool {
        self.trains.is_empty()
    }

    /// The configured class set with default capacities.
    pub fn classes(&self) -> &[ClassSpec] {
        &self.classes
    }

    /// Match a class name case-insensitively against the class set and return
    /// its canonical spelling.
    pub fn resolve_class(&self, class: &str) -> Result<String> {
        let needle = class.trim();
        self.classes
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(needle))
            .map(|spec| spec.name.clone())
            .ok_or_else(|| BookingError::InvalidClassType {
                class: needle.to_string(),
                valid: self
                    .classes
                    .iter()
                    .map(|spec| spec.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Adopt a configured class set on a restored registry.
    ///
    /// Configured classes keep the registry's spelling when they already exist
    /// and are added to every train that lacks them. Classes missing from
    /// `configured` stay only while some train still has seats booked or a
    /// waitlist in them. Returns whether the class set changed.
    pub fn merge_classes(&mut self, configured: &[ClassSpec]) -> Result<bool> {
        if let Some(spec) = configured.iter().find(|spec| spec.seats == 0) {
            return Err(ValidationError::InvalidSeatCount(spec.seats).into());
        }

        let mut merged: Vec<ClassSpec> = Vec::with_capacity(configured.len());
        for spec in configured {
            if merged
                .iter()
                .any(|known| known.name.eq_ignore_ascii_case(&spec.name))
            {
                continue;
            }
            let name = self
                .classes
                .iter()
                .find(|known| known.name.eq_ignore_ascii_case(&spec.name))
                .map_or_else(|| spec.name.trim().to_string(), |known| known.name.clone());
            merged.push(ClassSpec::new(name, spec.seats));
        }

        for known in &self.classes {
            if merged
                .iter()
                .any(|spec| spec.name.eq_ignore_ascii_case(&known.name))
            {
                continue;
            }
            if self.class_in_use(&known.name) {
                warn!(class = %known.name, "Class missing from configuration is still in use; keeping it");
                merged.push(known.clone());
            } else {
                warn!(class = %known.name, "Class removed by configuration");
            }
        }

        for spec in &merged {
            for train in self.trains.values_mut() {
                if train.seat_class(&spec.name).is_err() {
                    train.configure_class(&spec.name, spec.seats)?;
                }
            }
        }

        let changed = merged != self.classes;
        if changed {
            info!(
                classes = %merged.iter().map(|spec| spec.name.as_str()).collect::<Vec<_>>().join(", "),
                "Class set updated from configuration"
            );
        }
        self.classes = merged;
        Ok(changed)
    }

    fn class_in_use(&self, class: &str) -> bool {
        self.trains.values().any(|train| {
            train
                .occupancy(class)
                .map(|occupancy| occupancy.booked > 0 || occupancy.waitlisted > 0)
                .unwrap_or(false)
        })
    }

    /// Change the seat total of one class on one train.
    pub fn configure_seats(&mut self, number: &str, class: &str, total: u32) -> Result<()> {
        let class = self.resolve_class(class)?;
        self.get_mut(number)?.configure_class(&class, total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_registry_has_stock_trains() -> anyhow::Result<()> {
        let registry = TrainRegistry::seeded(ClassSpec::defaults());
        assert_eq!(registry.len(), 5);

        let rajdhani = registry.get("12345")?;
        assert_eq!(rajdhani.name, "Rajdhani Express");
        assert_eq!(rajdhani.occupancy(AC_CLASS)?.total, 30);
        assert_eq!(rajdhani.occupancy(SLEEPER_CLASS)?.total, 60);

        let shatabdi = registry.get("23456")?;
        assert_eq!(shatabdi.occupancy(AC_CLASS)?.total, 40);
        assert_eq!(shatabdi.occupancy(SLEEPER_CLASS)?.total, 40);

        for number in ["34567", "45678", "56789"] {
            let train = registry.get(number)?;
            assert_eq!(train.occupancy(AC_CLASS)?.total, 20);
            assert_eq!(train.occupancy(SLEEPER_CLASS)?.total, 50);
        }
        Ok(())
    }

    #[test]
    fn add_does_not_overwrite() -> anyhow::Result<()> {
        let mut registry = TrainRegistry::default();
        assert!(registry.add_default("99999", "First"));
        assert!(!registry.add_default("99999", "Second"));
        assert_eq!(registry.get("99999")?.name, "First");
        Ok(())
    }

    #[test]
    fn missing_train_is_reported() {
        let registry = TrainRegistry::default();
        assert!(matches!(
            registry.get("00000"),
            Err(BookingError::TrainNotFound(number)) if number == "00000"
        ));
    }

    #[test]
    fn class_resolution_is_case_insensitive() -> anyhow::Result<()> {
        let registry = TrainRegistry::default();
        assert_eq!(registry.resolve_class("ac")?, AC_CLASS);
        assert_eq!(registry.resolve_class(" SLEEPER ")?, SLEEPER_CLASS);
        assert!(matches!(
            registry.resolve_class("Chair"),
            Err(BookingError::InvalidClassType { .. })
        ));
        Ok(())
    }

    #[test]
    fn merge_adds_configured_classes_to_every_train() -> anyhow::Result<()> {
        let mut registry = TrainRegistry::seeded(ClassSpec::defaults());
        let configured = vec![
            ClassSpec::new("ac", 24),
            ClassSpec::new(SLEEPER_CLASS, 50),
            ClassSpec::new("Chair", 70),
        ];
        assert!(registry.merge_classes(&configured)?);

        assert_eq!(registry.resolve_class("chair")?, "Chair");
        assert_eq!(registry.resolve_class("AC")?, AC_CLASS);
        for train in registry.all() {
            assert_eq!(train.occupancy("Chair")?.total, 70);
        }
        assert_eq!(registry.get("12345")?.occupancy(AC_CLASS)?.total, 30);

        assert!(registry.add_default("99999", "New"));
        assert_eq!(registry.get("99999")?.occupancy(AC_CLASS)?.total, 24);
        assert!(!registry.merge_classes(&configured)?);
        Ok(())
    }

    #[test]
    fn merge_keeps_dropped_class_while_in_use() -> anyhow::Result<()> {
        let mut registry = TrainRegistry::seeded(ClassSpec::defaults());
        registry.get_mut("34567")?.book_seat(SLEEPER_CLASS)?;

        registry.merge_classes(&[ClassSpec::new(AC_CLASS, 20)])?;
        let names: Vec<_> = registry.classes().iter().map(|spec| spec.name.as_str()).collect();
        assert_eq!(names, vec![AC_CLASS, SLEEPER_CLASS]);

        registry.get_mut("34567")?.cancel_seat(SLEEPER_CLASS)?;
        registry.merge_classes(&[ClassSpec::new(AC_CLASS, 20)])?;
        assert!(matches!(
            registry.resolve_class(SLEEPER_CLASS),
            Err(BookingError::InvalidClassType { .. })
        ));
        Ok(())
    }

    #[test]
    fn merge_rejects_zero_seat_class_untouched() {
        let mut registry = TrainRegistry::seeded(ClassSpec::defaults());
        assert!(registry
            .merge_classes(&[ClassSpec::new("Chair", 0)])
            .is_err());
        assert_eq!(registry.classes(), ClassSpec::defaults().as_slice());
    }
}
