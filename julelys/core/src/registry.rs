//! Sequence Registry
//!
//! Every sequence a client can ask for, built-in or user-authored, in
//! registration order. Entries are recipes: each activation builds a fresh
//! [`Sequence`] instance from its entry.

use std::sync::Arc;

use crate::color::Color;
use crate::controller::ControlError;
use crate::script::{ScriptEngine, ScriptSequence};
use crate::store::sequence_id;
use crate::sequence::{
    FadeColor, MatrixRain, RainbowCycle, Sequence, SequenceInfo, Starfield, TestColor, TestRed,
    Twist,
};

/// The sequences compiled into the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinSequence {
    /// White spiral
    Twist,
    /// Row-by-row red sweep
    TestRed,
    /// Full-grid color test
    TestColor,
    /// Rainbow wheel
    Rainbow,
    /// White stars
    Stars,
    /// Colored bursts
    Fireworks,
    /// Green drops
    TheMatrix,
    /// Drops in four colors
    TheMatrixColors,
    /// Red and white drops
    Dannebrog,
    /// Endless red/green fade
    FadeColor,
}

impl BuiltinSequence {
    /// Registration order
    pub const ALL: [BuiltinSequence; 10] = [
        Self::Twist,
        Self::TestRed,
        Self::TestColor,
        Self::Rainbow,
        Self::Stars,
        Self::Fireworks,
        Self::TheMatrix,
        Self::TheMatrixColors,
        Self::Dannebrog,
        Self::FadeColor,
    ];

    /// Identifying metadata
    #[must_use]
    pub fn info(self) -> SequenceInfo {
        let (id, name, description) = match self {
            Self::Twist => (
                "Twist",
                "Twist",
                "A white spiral climbing the flagpole.",
            ),
            Self::TestRed => (
                "TestRed",
                "Test red",
                "Tests one LED at a time on each string in red.",
            ),
            Self::TestColor => (
                "TestAll",
                "Test Color",
                "Tests all four channels: red, green, blue and white.",
            ),
            Self::Rainbow => ("rainbow", "Rainbow", "Rainbow effect"),
            Self::Stars => ("Stars", "Stars", "Star effect, white only"),
            Self::Fireworks => (
                "Fireworks",
                "Fireworks",
                "Fireworks bursting in different colors",
            ),
            Self::TheMatrix => ("TheMatrix", "The Matrix", "The Matrix in green"),
            Self::TheMatrixColors => (
                "TheMatrixColors",
                "The Matrix with 4 colors",
                "The Matrix in green, red, white and yellow",
            ),
            Self::Dannebrog => (
                "Dannebrog",
                "Dannebrog",
                "The Matrix in the colors of the Danish flag",
            ),
            Self::FadeColor => (
                "FadeColor",
                "Fade Color",
                "Every other LED fades red up and down against green",
            ),
        };
        SequenceInfo::new(id, name, description)
    }

    /// Build a fresh instance
    #[must_use]
    pub fn instantiate(self) -> Sequence {
        match self {
            Self::Twist => Sequence::Twist(Twist::default()),
            Self::TestRed => Sequence::TestRed(TestRed::new()),
            Self::TestColor => Sequence::TestColor(TestColor::new()),
            Self::Rainbow => Sequence::Rainbow(RainbowCycle::new(5)),
            Self::Stars => Sequence::Starfield(Starfield::stars(Color::TRUE_WHITE)),
            Self::Fireworks => Sequence::Starfield(Starfield::fireworks()),
            Self::TheMatrix => Sequence::MatrixRain(MatrixRain::green()),
            Self::TheMatrixColors => Sequence::MatrixRain(MatrixRain::four_colors()),
            Self::Dannebrog => Sequence::MatrixRain(MatrixRain::dannebrog()),
            Self::FadeColor => Sequence::FadeColor(FadeColor::new()),
        }
    }
}

/// Where an entry's body comes from
#[derive(Clone, Debug)]
pub enum SequenceSource {
    /// Compiled in
    Builtin(BuiltinSequence),
    /// Script text run by the configured engine
    Script {
        /// Script body
        code: Arc<str>,
    },
}

/// One registered sequence
#[derive(Clone, Debug)]
pub struct SequenceEntry {
    /// Identifying metadata
    pub info: SequenceInfo,
    /// Body recipe
    pub source: SequenceSource,
}

impl SequenceEntry {
    /// Whether the entry was authored at runtime
    #[must_use]
    pub fn is_custom(&self) -> bool {
        matches!(self.source, SequenceSource::Script { .. })
    }

    /// Script text, `None` for built-ins
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match &self.source {
            SequenceSource::Builtin(_) => None,
            SequenceSource::Script { code } => Some(code),
        }
    }

    /// Build a fresh runnable instance
    pub fn instantiate(&self, engine: &Arc<dyn ScriptEngine>) -> Sequence {
        match &self.source {
            SequenceSource::Builtin(builtin) => builtin.instantiate(),
            SequenceSource::Script { code } => Sequence::Script(ScriptSequence::new(
                self.info.name.clone(),
                Arc::clone(code),
                Arc::clone(engine),
            )),
        }
    }
}

/// Ordered catalogue of known sequences
#[derive(Clone, Debug, Default)]
pub struct SequenceRegistry {
    entries: Vec<SequenceEntry>,
}

impl SequenceRegistry {
    /// Registry holding no sequences
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the built-in catalogue
    #[must_use]
    pub fn with_builtins() -> Self {
        let entries = BuiltinSequence::ALL
            .iter()
            .map(|builtin| SequenceEntry {
                info: builtin.info(),
                source: SequenceSource::Builtin(*builtin),
            })
            .collect();
        Self { entries }
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Metadata of every entry, in registration order
    #[must_use]
    pub fn infos(&self) -> Vec<SequenceInfo> {
        self.entries.iter().map(|entry| entry.info.clone()).collect()
    }

    /// Look up an entry by display name
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SequenceEntry> {
        self.entries.iter().find(|entry| entry.info.name == name)
    }

    /// The entry a new sequence called `name` would clash with
    ///
    /// Names clash when they are equal or map to the same storage id, so
    /// "Snow Fall" and "snow fall" cannot both exist.
    #[must_use]
    pub fn conflicting(&self, name: &str) -> Option<&SequenceEntry> {
        let id = sequence_id(name);
        self.entries.iter().find(|entry| {
            entry.info.name == name || entry.info.id == id || sequence_id(&entry.info.name) == id
        })
    }

    /// Entries whose name appears in `names`, in registration order
    ///
    /// Unknown names simply match nothing.
    #[must_use]
    pub fn resolve(&self, names: &[String]) -> Vec<&SequenceEntry> {
        self.entries
            .iter()
            .filter(|entry| names.iter().any(|name| *name == entry.info.name))
            .collect()
    }

    /// Register a script sequence
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::SequenceExists`] if the name or id is taken.
    pub fn add_script(&mut self, info: SequenceInfo, code: Arc<str>) -> Result<(), ControlError> {
        let taken = self
            .entries
            .iter()
            .any(|entry| entry.info.name == info.name || entry.info.id == info.id);
        if taken {
            return Err(ControlError::SequenceExists(info.name));
        }
        self.entries.push(SequenceEntry {
            info,
            source: SequenceSource::Script { code },
        });
        Ok(())
    }

    /// Replace the body, and optionally the description, of a script sequence
    ///
    /// Returns the updated metadata.
    ///
    /// # Errors
    ///
    /// Returns [`ControlError::UnknownSequence`] if no entry has that name,
    /// or [`ControlError::NotCustom`] for built-ins.
    pub fn update_script(
        &mut self,
        name: &str,
        description: Option<String>,
        code: Arc<str>,
    ) -> Result<SequenceInfo, ControlError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.info.name == name)
            .ok_or_else(|| ControlError::UnknownSequence(name.to_string()))?;
        if !entry.is_custom() {
            return Err(ControlError::NotCustom(name.to_string()));
        }
        if let Some(description) = description {
            entry.info.description = description;
        }
        entry.source = SequenceSource::Script { code };
        Ok(entry.info.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(entries: &[&SequenceEntry]) -> Vec<String> {
        entries.iter().map(|entry| entry.info.name.clone()).collect()
    }

    #[test]
    fn test_builtin_catalogue_order() {
        let registry = SequenceRegistry::with_builtins();
        let ids: Vec<String> = registry.infos().into_iter().map(|info| info.id).collect();
        assert_eq!(
            ids,
            vec![
                "Twist",
                "TestRed",
                "TestAll",
                "rainbow",
                "Stars",
                "Fireworks",
                "TheMatrix",
                "TheMatrixColors",
                "Dannebrog",
                "FadeColor",
            ]
        );
    }

    #[test]
    fn test_resolve_filters_in_registry_order() {
        let registry = SequenceRegistry::with_builtins();
        let request = vec![
            "Rainbow".to_string(),
            "DoesNotExist".to_string(),
            "Twist".to_string(),
        ];
        assert_eq!(names(&registry.resolve(&request)), vec!["Twist", "Rainbow"]);
        assert!(registry.resolve(&["DoesNotExist".to_string()]).is_empty());
    }

    #[test]
    fn test_add_script_rejects_duplicates() {
        let mut registry = SequenceRegistry::with_builtins();
        let info = SequenceInfo::new("snow", "Snow", "Falling snow");
        registry.add_script(info.clone(), Arc::from("a")).unwrap();
        assert_eq!(registry.len(), BuiltinSequence::ALL.len() + 1);

        let err = registry.add_script(info, Arc::from("b")).unwrap_err();
        assert!(matches!(err, ControlError::SequenceExists(name) if name == "Snow"));
        assert!(matches!(
            registry.add_script(SequenceInfo::new("x", "Twist", ""), Arc::from("c")),
            Err(ControlError::SequenceExists(_))
        ));
    }

    #[test]
    fn test_add_script_rejects_duplicate_id() {
        let mut registry = SequenceRegistry::empty();
        registry
            .add_script(SequenceInfo::new("snow_fall", "Snow Fall", ""), Arc::from("a"))
            .unwrap();

        let err = registry
            .add_script(SequenceInfo::new("snow_fall", "snow fall", ""), Arc::from("b"))
            .unwrap_err();
        assert!(matches!(err, ControlError::SequenceExists(name) if name == "snow fall"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("Snow Fall").and_then(SequenceEntry::code), Some("a"));
    }

    #[test]
    fn test_conflicting_names() {
        let mut registry = SequenceRegistry::with_builtins();
        registry
            .add_script(SequenceInfo::new("snow_fall", "Snow Fall", ""), Arc::from("a"))
            .unwrap();

        let clash = |name: &str| registry.conflicting(name).map(|e| e.info.name.clone());
        assert_eq!(clash("Snow Fall").as_deref(), Some("Snow Fall"));
        assert_eq!(clash("snow fall").as_deref(), Some("Snow Fall"));
        assert_eq!(clash("SNOW/FALL").as_deref(), Some("Snow Fall"));
        assert_eq!(clash("rainbow").as_deref(), Some("Rainbow"));
        assert_eq!(clash("Snowfall"), None);
    }

    #[test]
    fn test_update_script() {
        let mut registry = SequenceRegistry::empty();
        registry
            .add_script(SequenceInfo::new("snow", "Snow", "old"), Arc::from("a"))
            .unwrap();

        let info = registry.update_script("Snow", None, Arc::from("b")).unwrap();
        assert_eq!(info.description, "old");
        assert_eq!(registry.find("Snow").and_then(SequenceEntry::code), Some("b"));

        let info = registry
            .update_script("Snow", Some("new".into()), Arc::from("c"))
            .unwrap();
        assert_eq!(info.description, "new");
    }

    #[test]
    fn test_update_rejects_builtins_and_unknown() {
        let mut registry = SequenceRegistry::with_builtins();
        assert!(matches!(
            registry.update_script("Twist", None, Arc::from("x")),
            Err(ControlError::NotCustom(_))
        ));
        assert!(matches!(
            registry.update_script("Nope", None, Arc::from("x")),
            Err(ControlError::UnknownSequence(_))
        ));
    }

    #[test]
    fn test_instantiate_builds_fresh_variants() {
        let engine: Arc<dyn ScriptEngine> = Arc::new(crate::script::UnavailableEngine);
        let registry = SequenceRegistry::with_builtins();
        let rainbow = registry.find("Rainbow").unwrap().instantiate(&engine);
        assert_eq!(rainbow.kind(), "rainbow");
        assert_eq!(
            registry.find("Dannebrog").unwrap().instantiate(&engine).kind(),
            "matrix_rain"
        );
    }
}
