use serde::{Deserialize, Serialize};

/// Deployment mode of the hosting application (`NODE_ENV`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunMode {
    #[default]
    Development,
    Production,
}

impl RunMode {
    /// Only the exact value `production` selects production mode.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("production") => RunMode::Production,
            _ => RunMode::Development,
        }
    }

    pub fn is_production(self) -> bool {
        matches!(self, RunMode::Production)
    }
}

/// Whether an override flag is set. Any non-empty value counts, including
/// `0` and `false`; only unset or empty leaves it off.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_production_is_production() {
        assert_eq!(RunMode::from_env_value(Some("production")), RunMode::Production);
        assert_eq!(RunMode::from_env_value(Some(" production ")), RunMode::Production);
        assert_eq!(RunMode::from_env_value(Some("development")), RunMode::Development);
        assert_eq!(RunMode::from_env_value(Some("Production")), RunMode::Development);
        assert_eq!(RunMode::from_env_value(None), RunMode::Development);
    }

    #[test]
    fn any_set_value_turns_a_flag_on() {
        assert!(parse_flag(Some("true")));
        assert!(parse_flag(Some("1")));
        assert!(parse_flag(Some("false")));
        assert!(parse_flag(Some("0")));
        assert!(parse_flag(Some(" ")));
        assert!(!parse_flag(Some("")));
        assert!(!parse_flag(None));
    }
}
