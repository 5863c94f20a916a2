use serde::{Deserialize, Serialize};

/// Запрошенная глубина объяснения.
///
/// Упорядочено: `Light < Medium < Hard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Light,
    Medium,
    Hard,
}

impl DetailLevel {
    /// Уровень по мгновенному давлению стилуса (0..1).
    pub fn from_pressure(pressure: f64) -> Self {
        let p = if pressure.is_finite() { pressure } else { 0.0 };
        if p < 0.33 {
            DetailLevel::Light
        } else if p < 0.66 {
            DetailLevel::Medium
        } else {
            DetailLevel::Hard
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetailLevel::Light => "light",
            DetailLevel::Medium => "medium",
            DetailLevel::Hard => "hard",
        }
    }
}

impl std::fmt::Display for DetailLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pressure_bands_map_to_levels() {
        assert_eq!(DetailLevel::from_pressure(0.1), DetailLevel::Light);
        assert_eq!(DetailLevel::from_pressure(0.33), DetailLevel::Medium);
        assert_eq!(DetailLevel::from_pressure(0.5), DetailLevel::Medium);
        assert_eq!(DetailLevel::from_pressure(0.66), DetailLevel::Hard);
        assert_eq!(DetailLevel::from_pressure(f64::NAN), DetailLevel::Light);
    }

    #[test]
    fn levels_are_ordered() {
        assert!(DetailLevel::Light < DetailLevel::Medium);
        assert!(DetailLevel::Medium < DetailLevel::Hard);
        assert_eq!(
            serde_json::to_string(&DetailLevel::Hard).expect("serialize level"),
            "\"hard\""
        );
    }
}
